use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

use crate::config::Config;
use crate::{Result, WikicastError};

/// Measures the playback length of an audio file
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DurationProbe: Send + Sync {
    /// Duration in seconds. Never a default: an unreadable file is an error.
    async fn probe_duration(&self, audio_path: &Path) -> Result<f64>;
}

/// Reads the container duration reported by ffprobe
pub struct FfprobeProbe {
    ffprobe_path: String,
}

impl FfprobeProbe {
    pub fn new(config: &Config) -> Self {
        Self {
            ffprobe_path: config.app.ffprobe_path.clone(),
        }
    }
}

#[async_trait]
impl DurationProbe for FfprobeProbe {
    async fn probe_duration(&self, audio_path: &Path) -> Result<f64> {
        validate_audio_file(audio_path)?;

        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v", "quiet",
                "-print_format", "json",
                "-show_format",
                "-show_streams",
                &audio_path.to_string_lossy(),
            ])
            .output()
            .await
            .map_err(|e| {
                WikicastError::Probe(format!("Failed to run {}: {}", self.ffprobe_path, e))
            })?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(WikicastError::Probe(format!(
                "Failed to analyze {} with ffprobe: {}",
                audio_path.display(),
                error.trim()
            ))
            .into());
        }

        let duration = parse_ffprobe_output(&output.stdout)?;
        tracing::debug!("Measured {}: {:.3}s", audio_path.display(), duration);
        Ok(duration)
    }
}

/// The file must exist and hold at least one byte before ffprobe is asked about it
fn validate_audio_file(path: &Path) -> Result<()> {
    if !path.is_file() {
        let message = format!("Audio file not found: {}", path.display());
        return Err(WikicastError::Probe(message).into());
    }

    let metadata = fs_err::metadata(path).map_err(|e| WikicastError::Probe(e.to_string()))?;
    if metadata.len() == 0 {
        let message = format!("Audio file is empty: {}", path.display());
        return Err(WikicastError::Probe(message).into());
    }

    Ok(())
}

/// Extract `format.duration` from `ffprobe -print_format json` output.
///
/// The report must list an audio stream and a positive, finite duration.
pub fn parse_ffprobe_output(stdout: &[u8]) -> Result<f64> {
    let info: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| WikicastError::Probe(format!("Unreadable ffprobe output: {}", e)))?;

    let empty_vec = vec![];
    let streams = info["streams"].as_array().unwrap_or(&empty_vec);
    let has_audio = streams
        .iter()
        .any(|stream| stream["codec_type"].as_str() == Some("audio"));
    if !has_audio {
        let message = "File does not contain any audio streams".to_string();
        return Err(WikicastError::Probe(message).into());
    }

    let duration = info["format"]["duration"]
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| WikicastError::Probe("ffprobe reported no duration".to_string()))?;

    if !duration.is_finite() || duration <= 0.0 {
        return Err(WikicastError::Probe(format!("Invalid audio duration: {}", duration)).into());
    }

    Ok(duration)
}
