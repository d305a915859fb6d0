//! Wikicast - A Rust CLI tool that turns a Wikipedia article into a narrated video
//!
//! This library resolves an article's lead image and introduction through the MediaWiki API,
//! narrates the introduction with Google Cloud Text-to-Speech and muxes both into an MP4
//! with ffmpeg.

pub mod assets;
pub mod cli;
pub mod config;
pub mod content;
pub mod output;
pub mod pipeline;
pub mod probe;
pub mod utils;
pub mod video;

pub use cli::{Cli, OutputFormat};
pub use config::Config;
pub use content::{ArticleContent, ContentResolver};
pub use pipeline::{NarrationPipeline, NarrationResult, OutputLayout};
pub use probe::{DurationProbe, FfprobeProbe};
pub use video::{EncodeEvent, EncodeJob, VideoEncoder};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to wikicast
#[derive(thiserror::Error, Debug)]
pub enum WikicastError {
    #[error("No Wikipedia article found for title: {0}")]
    NotFound(String),

    #[error("Article has no primary image: {0}")]
    NoImage(String),

    #[error("Content service error: {0}")]
    ContentService(String),

    #[error("Image download failed: {0}")]
    Download(String),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("Audio duration probe failed: {0}")]
    Probe(String),

    #[error("Video encoding failed: {0}")]
    Encoding(String),

    #[error("Output directory already exists: {0}")]
    DirectoryExists(String),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl WikicastError {
    /// Process exit code reported for this failure kind
    pub fn exit_code(&self) -> u8 {
        match self {
            WikicastError::Input(_) => 2,
            WikicastError::Config(_) => 3,
            WikicastError::DirectoryExists(_) => 10,
            WikicastError::NotFound(_) => 11,
            WikicastError::NoImage(_) => 12,
            WikicastError::ContentService(_) => 13,
            WikicastError::Download(_) => 14,
            WikicastError::Synthesis(_) => 15,
            WikicastError::Probe(_) => 16,
            WikicastError::Encoding(_) => 17,
        }
    }
}

/// Exit code for an arbitrary error chain, falling back to 1 for untyped failures
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<WikicastError>())
        .map(WikicastError::exit_code)
        .unwrap_or(1)
}
