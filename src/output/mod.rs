use anyhow::Result;

use crate::cli::OutputFormat;
use crate::pipeline::NarrationResult;
use crate::utils::{format_duration, format_file_size};

/// Render a run report in the requested format
pub fn format_report(result: &NarrationResult, format: &OutputFormat) -> Result<String> {
    let content = match format {
        OutputFormat::Text => format_as_text(result),
        OutputFormat::Json => serde_json::to_string_pretty(result)?,
    };

    Ok(content)
}

/// Print a run report to stdout
pub fn print_to_console(result: &NarrationResult, format: &OutputFormat) -> Result<()> {
    println!("{}", format_report(result, format)?);
    Ok(())
}

fn format_as_text(result: &NarrationResult) -> String {
    let mut lines = vec![
        format!("Article:  {} ({})", result.title, result.article_url),
        format!(
            "Image:    {} ({})",
            result.layout.image.display(),
            format_file_size(result.image_bytes)
        ),
        format!(
            "Audio:    {} ({}, {})",
            result.layout.audio.display(),
            format_file_size(result.audio_bytes),
            format_duration(result.audio_duration_secs)
        ),
        format!("Video:    {}", result.layout.video.display()),
    ];
    lines.push(format!(
        "Summary of {} characters narrated in {:.1}s",
        result.summary_chars, result.elapsed_secs
    ));
    lines.join("\n")
}
