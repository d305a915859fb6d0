use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::config::Config;
use crate::{Result, WikicastError};

/// Fixed encoding profile for every narrated video
pub struct EncodeProfile {
    pub fps: u32,
    pub video_codec: &'static str,
    pub width: u32,
    pub video_bitrate: &'static str,
    pub audio_codec: &'static str,
    pub audio_bitrate: &'static str,
    pub audio_channels: u32,
    pub pixel_format: &'static str,
    pub format: &'static str,
}

pub const PROFILE: EncodeProfile = EncodeProfile {
    fps: 25,
    video_codec: "libx264",
    width: 640,
    video_bitrate: "1024k",
    audio_codec: "aac",
    audio_bitrate: "128k",
    audio_channels: 2,
    pixel_format: "yuv420p",
    format: "mp4",
};

/// One still-image + audio encode
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeJob {
    pub image_path: PathBuf,
    pub audio_path: PathBuf,
    /// How long the image is shown, normally the probed audio duration
    pub duration_secs: f64,
    pub output_path: PathBuf,
}

/// Notifications emitted while encoding
#[derive(Debug, Clone, PartialEq)]
pub enum EncodeEvent {
    Started { command: String },
    Failed { detail: String },
    Finished { output: PathBuf },
}

/// Receives encode notifications
pub type EncodeObserver = Box<dyn Fn(&EncodeEvent) + Send + Sync>;

/// Trait for muxing a looped still image and an audio track into a video
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoEncoder: Send + Sync {
    /// Encode `job`, failing with `WikicastError::Encoding` on any encoder failure
    async fn assemble(&self, job: &EncodeJob) -> Result<()>;
}

/// Log an encode notification
pub fn log_event(event: &EncodeEvent) {
    match event {
        EncodeEvent::Started { command } => tracing::info!("ffmpeg process started: {}", command),
        EncodeEvent::Failed { detail } => tracing::error!("ffmpeg failed: {}", detail),
        EncodeEvent::Finished { output } => {
            tracing::info!("Video created in: {}", output.display())
        }
    }
}

/// Video encoder driving the ffmpeg binary
pub struct FfmpegEncoder {
    ffmpeg_path: String,
    timeout: Option<Duration>,
    observer: EncodeObserver,
}

impl FfmpegEncoder {
    pub fn new(config: &Config) -> Self {
        Self {
            ffmpeg_path: config.app.ffmpeg_path.clone(),
            timeout: config.encode_timeout(),
            observer: Box::new(log_event),
        }
    }

    /// Replace the default logging observer
    pub fn with_observer(mut self, observer: EncodeObserver) -> Self {
        self.observer = observer;
        self
    }

    fn fail(&self, detail: String) -> anyhow::Error {
        (self.observer)(&EncodeEvent::Failed { detail: detail.clone() });
        WikicastError::Encoding(detail).into()
    }
}

/// ffmpeg arguments for a job under the fixed profile
pub fn build_args(job: &EncodeJob) -> Vec<String> {
    let duration = format!("{:.3}", job.duration_secs);
    let fps = PROFILE.fps.to_string();

    vec![
        "-hide_banner".to_string(),
        // never overwrite
        "-n".to_string(),
        "-loop".to_string(),
        "1".to_string(),
        "-framerate".to_string(),
        fps.clone(),
        "-t".to_string(),
        duration.clone(),
        "-i".to_string(),
        job.image_path.to_string_lossy().into_owned(),
        "-i".to_string(),
        job.audio_path.to_string_lossy().into_owned(),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "1:a:0".to_string(),
        "-c:v".to_string(),
        PROFILE.video_codec.to_string(),
        "-b:v".to_string(),
        PROFILE.video_bitrate.to_string(),
        "-r".to_string(),
        fps,
        // libx264 with yuv420p needs an even height
        "-vf".to_string(),
        format!("scale={}:-2", PROFILE.width),
        "-pix_fmt".to_string(),
        PROFILE.pixel_format.to_string(),
        "-c:a".to_string(),
        PROFILE.audio_codec.to_string(),
        "-b:a".to_string(),
        PROFILE.audio_bitrate.to_string(),
        "-ac".to_string(),
        PROFILE.audio_channels.to_string(),
        "-t".to_string(),
        duration,
        "-f".to_string(),
        PROFILE.format.to_string(),
        job.output_path.to_string_lossy().into_owned(),
    ]
}

/// Shell-like rendering of a command line for diagnostics
pub fn describe_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(|arg| {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                format!("\"{}\"", arg)
            } else {
                arg.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl VideoEncoder for FfmpegEncoder {
    async fn assemble(&self, job: &EncodeJob) -> Result<()> {
        if !job.duration_secs.is_finite() || job.duration_secs <= 0.0 {
            let message = format!("Invalid video duration: {}", job.duration_secs);
            return Err(WikicastError::Encoding(message).into());
        }

        let args = build_args(job);
        (self.observer)(&EncodeEvent::Started {
            command: describe_command(&self.ffmpeg_path, &args),
        });

        let mut command = Command::new(&self.ffmpeg_path);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let run = command.output();

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(output) => output,
                Err(_) => {
                    let detail = format!("ffmpeg timed out after {}s", limit.as_secs());
                    return Err(self.fail(detail));
                }
            },
            None => run.await,
        };

        let output = match output {
            Ok(output) => output,
            Err(e) => return Err(self.fail(format!("Failed to run {}: {}", self.ffmpeg_path, e))),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = format!("ffmpeg exited with {}: {}", output.status, stderr.trim());
            return Err(self.fail(detail));
        }

        (self.observer)(&EncodeEvent::Finished {
            output: job.output_path.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{DurationProbe, FfprobeProbe};
    use std::sync::{Arc, Mutex};

    fn job(duration_secs: f64) -> EncodeJob {
        EncodeJob {
            image_path: PathBuf::from("files/Albert Einstein/image.jpg"),
            audio_path: PathBuf::from("files/Albert Einstein/audio.mp3"),
            duration_secs,
            output_path: PathBuf::from("files/Albert Einstein/video.mp4"),
        }
    }

    fn recording_encoder(ffmpeg_path: &str) -> (FfmpegEncoder, Arc<Mutex<Vec<EncodeEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);

        let mut config = Config::default();
        config.app.ffmpeg_path = ffmpeg_path.to_string();
        let encoder = FfmpegEncoder::new(&config)
            .with_observer(Box::new(move |event| sink.lock().unwrap().push(event.clone())));

        (encoder, events)
    }

    fn flag_value<'a>(args: &'a [String], flag: &str) -> Vec<&'a str> {
        args.windows(2)
            .filter(|pair| pair[0] == flag)
            .map(|pair| pair[1].as_str())
            .collect()
    }

    #[test]
    fn test_build_args_uses_fixed_profile() {
        let args = build_args(&job(12.5));

        assert_eq!(flag_value(&args, "-t"), vec!["12.500", "12.500"]);
        assert_eq!(flag_value(&args, "-loop"), vec!["1"]);
        assert_eq!(flag_value(&args, "-framerate"), vec!["25"]);
        assert_eq!(flag_value(&args, "-r"), vec!["25"]);
        assert_eq!(flag_value(&args, "-c:v"), vec!["libx264"]);
        assert_eq!(flag_value(&args, "-b:v"), vec!["1024k"]);
        assert_eq!(flag_value(&args, "-vf"), vec!["scale=640:-2"]);
        assert_eq!(flag_value(&args, "-pix_fmt"), vec!["yuv420p"]);
        assert_eq!(flag_value(&args, "-b:a"), vec!["128k"]);
        assert_eq!(flag_value(&args, "-ac"), vec!["2"]);
        assert_eq!(flag_value(&args, "-f"), vec!["mp4"]);
        assert_eq!(
            flag_value(&args, "-i"),
            vec!["files/Albert Einstein/image.jpg", "files/Albert Einstein/audio.mp3"]
        );
        assert_eq!(args.last().map(String::as_str), Some("files/Albert Einstein/video.mp4"));
    }

    #[test]
    fn test_describe_command_quotes_spaces() {
        let described = describe_command("ffmpeg", &["-i".to_string(), "a b.jpg".to_string()]);
        assert_eq!(described, "ffmpeg -i \"a b.jpg\"");
    }

    #[tokio::test]
    async fn test_invalid_duration_is_rejected_before_spawn() {
        let (encoder, events) = recording_encoder("ffmpeg");

        for duration in [0.0, -1.0, f64::NAN] {
            let err = encoder.assemble(&job(duration)).await.unwrap_err();
            assert!(matches!(
                err.downcast_ref::<WikicastError>(),
                Some(WikicastError::Encoding(_))
            ));
        }
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_binary_emits_start_and_error() {
        let (encoder, events) = recording_encoder("/nonexistent/ffmpeg");

        let err = encoder.assemble(&job(1.0)).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<WikicastError>(), Some(WikicastError::Encoding(_))));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        let expected_prefix = "/nonexistent/ffmpeg -hide_banner";
        assert!(matches!(
            &events[0],
            EncodeEvent::Started { command } if command.starts_with(expected_prefix)
        ));
        assert!(matches!(
            &events[1],
            EncodeEvent::Failed { detail } if detail.contains("Failed to run")
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_emits_error() {
        let (encoder, events) = recording_encoder("false");

        let err = encoder.assemble(&job(1.0)).await.unwrap_err();
        assert!(err.to_string().contains("ffmpeg exited with"));
        assert!(matches!(events.lock().unwrap().last(), Some(EncodeEvent::Failed { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_emits_start_and_end() {
        let (encoder, events) = recording_encoder("true");

        encoder.assemble(&job(1.0)).await.unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], EncodeEvent::Started { .. }));
        assert_eq!(
            events[1],
            EncodeEvent::Finished {
                output: PathBuf::from("files/Albert Einstein/video.mp4")
            }
        );
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg and ffprobe on PATH"]
    async fn test_output_duration_matches_request() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("image.jpg");
        let audio = dir.path().join("audio.mp3");
        let video = dir.path().join("video.mp4");

        for (args, path) in [
            (
                vec!["-f", "lavfi", "-i", "color=c=blue:s=800x601", "-frames:v", "1"],
                &image,
            ),
            (vec!["-f", "lavfi", "-i", "sine=frequency=440:duration=3"], &audio),
        ] {
            let status = Command::new("ffmpeg")
                .arg("-y")
                .args(&args)
                .arg(path)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .unwrap();
            assert!(status.success());
        }

        let ffprobe = FfprobeProbe::new(&Config::default());
        let duration = ffprobe.probe_duration(&audio).await.unwrap();
        let encoder = FfmpegEncoder::new(&Config::default());
        encoder
            .assemble(&EncodeJob {
                image_path: image,
                audio_path: audio,
                duration_secs: duration,
                output_path: video.clone(),
            })
            .await
            .unwrap();

        let video_duration = ffprobe.probe_duration(&video).await.unwrap();
        assert!(
            (video_duration - duration).abs() < 0.1,
            "{} vs {}",
            video_duration,
            duration
        );
    }
}
