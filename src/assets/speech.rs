use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::Config;
use crate::{Result, WikicastError};

/// Fixed narration voice
pub const LANGUAGE_CODE: &str = "en-US";
pub const SSML_GENDER: &str = "MALE";
pub const AUDIO_ENCODING: &str = "MP3";

/// Header carrying the API key, so the key never appears in a request URL
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Per-request input limit of the synthesis service, in bytes
pub const MAX_INPUT_BYTES: usize = 5000;

/// Trait for turning text into an audio file
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` in one request and write the audio to `dest`.
    /// Returns the number of audio bytes written.
    async fn synthesize(&self, text: &str, dest: &Path) -> Result<u64>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection,
    audio_config: AudioConfig,
}

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection {
    language_code: &'static str,
    ssml_gender: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    message: String,
    #[serde(default)]
    status: String,
}

/// Google Cloud Text-to-Speech client (REST)
pub struct GoogleSpeechClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    access_token: Option<String>,
}

impl GoogleSpeechClient {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: crate::utils::http_client(config)?,
            endpoint: config.speech.endpoint.clone(),
            api_key: config.speech.api_key.clone(),
            access_token: config.speech.access_token.clone(),
        })
    }
}

/// Build the JSON request for the fixed voice
fn build_request(text: &str) -> SynthesizeRequest<'_> {
    SynthesizeRequest {
        input: SynthesisInput { text },
        voice: VoiceSelection {
            language_code: LANGUAGE_CODE,
            ssml_gender: SSML_GENDER,
        },
        audio_config: AudioConfig {
            audio_encoding: AUDIO_ENCODING,
        },
    }
}

/// Reject inputs the service would refuse, before any request is made
fn check_input(text: &str) -> Result<()> {
    if text.len() > MAX_INPUT_BYTES {
        return Err(WikicastError::Synthesis(format!(
            "Summary is {} bytes, above the {} byte per-request limit",
            text.len(),
            MAX_INPUT_BYTES
        ))
        .into());
    }
    Ok(())
}

/// Decode the base64 audio payload of a successful response
fn decode_audio(body: &str) -> Result<Vec<u8>> {
    let response: SynthesizeResponse = serde_json::from_str(body)
        .map_err(|e| WikicastError::Synthesis(format!("Malformed response: {}", e)))?;

    let encoded = response
        .audio_content
        .ok_or_else(|| WikicastError::Synthesis("Response has no audioContent".to_string()))?;

    let audio = base64::engine::general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| WikicastError::Synthesis(format!("Invalid audioContent: {}", e)))?;

    if audio.is_empty() {
        return Err(WikicastError::Synthesis("Service returned empty audio".to_string()).into());
    }

    Ok(audio)
}

/// Turn an error response body into a readable message
fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<GoogleErrorBody>(body) {
        Ok(parsed) if parsed.error.status.is_empty() => {
            format!("HTTP {}: {}", status, parsed.error.message)
        }
        Ok(parsed) => format!(
            "HTTP {} {}: {}",
            status, parsed.error.status, parsed.error.message
        ),
        Err(_) => format!("HTTP {}", status),
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleSpeechClient {
    async fn synthesize(&self, text: &str, dest: &Path) -> Result<u64> {
        check_input(text)?;

        let mut request = self.client.post(&self.endpoint).json(&build_request(text));
        request = match (&self.api_key, &self.access_token) {
            (Some(key), _) => request.header(API_KEY_HEADER, key.as_str()),
            (None, Some(token)) => request.bearer_auth(token),
            (None, None) => {
                return Err(WikicastError::Synthesis(format!(
                    "No credentials: set {} or {}",
                    crate::config::API_KEY_ENV,
                    crate::config::ACCESS_TOKEN_ENV
                ))
                .into())
            }
        };

        tracing::info!(
            "Synthesizing speech ({} bytes of text, voice {} {})",
            text.len(),
            LANGUAGE_CODE,
            SSML_GENDER
        );

        let response = request.send().await.map_err(|e| {
            WikicastError::Synthesis(format!("Request failed: {}", e.without_url()))
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| WikicastError::Synthesis(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(WikicastError::Synthesis(describe_error(status, &body)).into());
        }

        let audio = decode_audio(&body)?;
        fs_err::write(dest, &audio)
            .map_err(|e| WikicastError::Synthesis(e.to_string()))?;

        tracing::info!("Audio saved to: {}", dest.display());
        Ok(audio.len() as u64)
    }
}
