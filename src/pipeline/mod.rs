use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use crate::assets::{GoogleSpeechClient, HttpImageFetcher, ImageFetcher, SpeechSynthesizer};
use crate::config::Config;
use crate::content::{resolve_content, ArticleContent, ContentResolver, WikipediaClient};
use crate::probe::{DurationProbe, FfprobeProbe};
use crate::video::{EncodeJob, FfmpegEncoder, VideoEncoder};
use crate::{Result, WikicastError};

pub const IMAGE_FILE: &str = "image.jpg";
pub const AUDIO_FILE: &str = "audio.mp3";
pub const VIDEO_FILE: &str = "video.mp4";

/// Per-title output directory and the artifacts inside it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputLayout {
    pub dir: PathBuf,
    pub image: PathBuf,
    pub audio: PathBuf,
    pub video: PathBuf,
}

impl OutputLayout {
    /// Layout for `title` under `files_dir`. The title is used verbatim as the folder name.
    ///
    /// Titles that would resolve outside `files_dir` (absolute paths, drive prefixes,
    /// `..` segments) are rejected with `WikicastError::Input` rather than rewritten.
    pub fn for_title(files_dir: &Path, title: &str) -> Result<Self> {
        let escapes = Path::new(title).components().any(|component| {
            matches!(
                component,
                Component::RootDir | Component::Prefix(_) | Component::ParentDir
            )
        });
        if escapes {
            return Err(WikicastError::Input(format!(
                "Title cannot be used as a folder under {}: {}",
                files_dir.display(),
                title
            ))
            .into());
        }

        let dir = files_dir.join(title);
        Ok(Self {
            image: dir.join(IMAGE_FILE),
            audio: dir.join(AUDIO_FILE),
            video: dir.join(VIDEO_FILE),
            dir,
        })
    }
}

/// Whether the title contributes a folder of its own, i.e. is not empty or `.`
fn names_folder(title: &str) -> bool {
    Path::new(title)
        .components()
        .any(|component| matches!(component, Component::Normal(_)))
}

/// Report of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationResult {
    pub title: String,
    pub article_url: String,
    pub image_url: String,
    pub layout: OutputLayout,
    pub summary_chars: usize,
    pub image_bytes: u64,
    pub audio_bytes: u64,
    pub audio_duration_secs: f64,
    pub elapsed_secs: f64,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// Main narration pipeline
pub struct NarrationPipeline {
    config: Config,
    resolver: Box<dyn ContentResolver>,
    fetcher: Box<dyn ImageFetcher>,
    synthesizer: Box<dyn SpeechSynthesizer>,
    probe: Box<dyn DurationProbe>,
    encoder: Box<dyn VideoEncoder>,
    show_progress: bool,
}

impl NarrationPipeline {
    /// Create a pipeline backed by Wikipedia, Google Text-to-Speech and ffmpeg
    pub fn new(config: Config, show_progress: bool) -> Result<Self> {
        let resolver = WikipediaClient::new(&config)?;
        let fetcher = HttpImageFetcher::new(&config, show_progress)?;
        let synthesizer = GoogleSpeechClient::new(&config)?;
        let probe = FfprobeProbe::new(&config);
        let encoder = FfmpegEncoder::new(&config);

        let mut pipeline = Self::with_collaborators(
            config,
            Box::new(resolver),
            Box::new(fetcher),
            Box::new(synthesizer),
            Box::new(probe),
            Box::new(encoder),
        );
        pipeline.show_progress = show_progress;
        Ok(pipeline)
    }

    /// Create a pipeline from explicit collaborators
    pub fn with_collaborators(
        config: Config,
        resolver: Box<dyn ContentResolver>,
        fetcher: Box<dyn ImageFetcher>,
        synthesizer: Box<dyn SpeechSynthesizer>,
        probe: Box<dyn DurationProbe>,
        encoder: Box<dyn VideoEncoder>,
    ) -> Self {
        Self {
            config,
            resolver,
            fetcher,
            synthesizer,
            probe,
            encoder,
            show_progress: false,
        }
    }

    /// Produce image, audio and video for `title` under `<files_dir>/<title>/`.
    ///
    /// Nothing is written until the article and its image have been resolved, so a
    /// missing article or image leaves the filesystem untouched.
    pub async fn run(&self, title: &str) -> Result<NarrationResult> {
        let started = Instant::now();
        let layout = OutputLayout::for_title(&self.config.app.files_dir, title)?;
        let has_folder = names_folder(title);

        // An empty title maps onto the files root itself; let the lookup reject it first
        if has_folder && layout.dir.exists() {
            return Err(WikicastError::DirectoryExists(layout.dir.display().to_string()).into());
        }

        let content = resolve_content(self.resolver.as_ref(), title).await?;

        if !has_folder {
            return Err(WikicastError::Input(format!(
                "Title does not name an output folder: {:?}",
                title
            ))
            .into());
        }

        self.create_output_dir(&layout)?;

        match self.materialize(&content, &layout).await {
            Ok((image_bytes, audio_bytes, audio_duration_secs)) => Ok(NarrationResult {
                title: title.to_string(),
                article_url: crate::utils::article_url(title),
                image_url: content.image_url,
                layout,
                summary_chars: content.summary.chars().count(),
                image_bytes,
                audio_bytes,
                audio_duration_secs,
                elapsed_secs: started.elapsed().as_secs_f64(),
                completed_at: chrono::Utc::now(),
            }),
            Err(err) => {
                if self.config.app.cleanup_on_failure {
                    tracing::warn!("Removing partial output: {}", layout.dir.display());
                    if let Err(cleanup_err) = fs_err::remove_dir_all(&layout.dir) {
                        tracing::error!("Cleanup failed: {}", cleanup_err);
                    }
                } else {
                    tracing::warn!("Partial output left in: {}", layout.dir.display());
                }
                Err(err)
            }
        }
    }

    /// Create the files root and the exclusive title directory
    fn create_output_dir(&self, layout: &OutputLayout) -> Result<()> {
        fs_err::create_dir_all(&self.config.app.files_dir)
            .context("Failed to create files directory")?;

        match fs_err::create_dir(&layout.dir) {
            Ok(()) => {
                tracing::debug!("Created output directory: {}", layout.dir.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(WikicastError::DirectoryExists(layout.dir.display().to_string()).into())
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to create output directory")),
        }
    }

    /// Download, synthesize, measure and assemble, strictly one after another
    async fn materialize(
        &self,
        content: &ArticleContent,
        layout: &OutputLayout,
    ) -> Result<(u64, u64, f64)> {
        let image_bytes = self
            .fetcher
            .download_image(&content.image_url, &layout.image)
            .await?;

        let audio_bytes = self
            .with_spinner(
                "Synthesizing speech...",
                self.synthesizer.synthesize(&content.summary, &layout.audio),
            )
            .await?;

        let duration = self.probe.probe_duration(&layout.audio).await?;
        tracing::info!("Audio duration: {}", crate::utils::format_duration(duration));

        let job = EncodeJob {
            image_path: layout.image.clone(),
            audio_path: layout.audio.clone(),
            duration_secs: duration,
            output_path: layout.video.clone(),
        };
        self.with_spinner("Encoding video...", self.encoder.assemble(&job))
            .await?;

        Ok((image_bytes, audio_bytes, duration))
    }

    async fn with_spinner<T, F>(&self, message: &'static str, stage: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let progress = if self.show_progress {
            let spinner = ProgressBar::new_spinner();
            let template = "{spinner:.green} [{elapsed_precise}] {msg}";
            if let Ok(style) = ProgressStyle::default_spinner().template(template) {
                spinner.set_style(style);
            }
            spinner.enable_steady_tick(Duration::from_millis(100));
            spinner
        } else {
            ProgressBar::hidden()
        };
        progress.set_message(message);

        let result = stage.await;
        match &result {
            Ok(_) => progress.finish_and_clear(),
            Err(_) => progress.abandon(),
        }
        result
    }
}
