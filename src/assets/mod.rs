use async_trait::async_trait;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::io::Write;
use std::path::Path;

pub mod speech;

use crate::config::Config;
use crate::{Result, WikicastError};

pub use speech::{GoogleSpeechClient, SpeechSynthesizer};

/// Trait for fetching a remote image into a local file
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Download `url` verbatim to `dest`, returning the number of bytes written.
    ///
    /// The parent directory of `dest` must already exist.
    async fn download_image(&self, url: &str, dest: &Path) -> Result<u64>;
}

/// HTTP(S) image downloader
pub struct HttpImageFetcher {
    client: Client,
    show_progress: bool,
}

impl HttpImageFetcher {
    pub fn new(config: &Config, show_progress: bool) -> Result<Self> {
        Ok(Self {
            client: crate::utils::http_client(config)?,
            show_progress,
        })
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new(total);
        let template =
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}";
        if let Ok(style) = ProgressStyle::default_bar().template(template) {
            progress.set_style(style);
        }
        progress.set_message("Downloading image...");
        progress
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn download_image(&self, url: &str, dest: &Path) -> Result<u64> {
        let url = crate::utils::validate_and_normalize_url(url)
            .map_err(|e| WikicastError::Download(e.to_string()))?;

        tracing::info!("Downloading image to: {}", dest.display());

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WikicastError::Download(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WikicastError::Download(format!("{}: HTTP {}", url, status)).into());
        }

        let progress = self.progress_bar(response.content_length().unwrap_or(0));

        let downloaded = match write_body(response, dest, &url, &progress).await {
            Ok(downloaded) => downloaded,
            Err(err) => {
                progress.abandon_with_message("Download failed");
                return Err(err);
            }
        };
        progress.finish_with_message("Download complete");

        tracing::info!("Image saved ({})", crate::utils::format_file_size(downloaded));
        Ok(downloaded)
    }
}

/// Stream the response body into `dest`, advancing `progress` per chunk
async fn write_body(
    response: reqwest::Response,
    dest: &Path,
    url: &str,
    progress: &ProgressBar,
) -> Result<u64> {
    let mut file = fs_err::File::create(dest)
        .map_err(|e| WikicastError::Download(e.to_string()))?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| WikicastError::Download(format!("{}: {}", url, e)))?;
        file.write_all(&chunk)
            .map_err(|e| WikicastError::Download(e.to_string()))?;
        downloaded += chunk.len() as u64;
        progress.set_position(downloaded);
    }

    file.flush().map_err(|e| WikicastError::Download(e.to_string()))?;
    Ok(downloaded)
}
