use clap::{Parser, ValueEnum};
use std::io::{BufRead, Write};
use std::path::PathBuf;

use crate::{Result, WikicastError};

/// Prompt shown when no title is given on the command line
pub const TITLE_PROMPT: &str = "Enter a Wikipedia article title: ";

#[derive(Parser, Debug)]
#[command(
    name = "wikicast",
    about = "Wikicast - Turn a Wikipedia article into a short narrated video",
    version,
    long_about = "Fetches the lead image and introduction of a Wikipedia article, narrates the \
                  introduction with Google Cloud Text-to-Speech and combines both into an MP4 \
                  under ./files/<title>/ using ffmpeg."
)]
pub struct Cli {
    /// Article title (prompts interactively if not specified)
    #[arg(value_name = "TITLE")]
    pub title: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long)]
    pub quiet: bool,

    /// Root directory for per-title output folders
    #[arg(long, value_name = "DIR", env = "WIKICAST_FILES_DIR")]
    pub files_dir: Option<PathBuf>,

    /// Remove the partially written output folder when a stage fails
    #[arg(long)]
    pub cleanup_on_failure: bool,

    /// Format of the final run report
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Show current configuration and exit
    #[arg(long)]
    pub show_config: bool,
}

#[derive(ValueEnum, Clone, Debug)]
pub enum OutputFormat {
    /// Human readable summary
    Text,
    /// JSON report
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Ask the operator for a single line and return it trimmed.
///
/// Blocks until a line (or end of input) arrives. The answer is not validated:
/// empty titles and titles with path separators are passed through as typed.
pub fn prompt_line<R: BufRead, W: Write>(
    prompt: &str,
    mut input: R,
    mut output: W,
) -> Result<String> {
    write!(output, "{}", console::style(prompt).bold())
        .and_then(|_| output.flush())
        .map_err(|e| WikicastError::Input(format!("Failed to write prompt: {}", e)))?;

    let mut answer = String::new();
    let read = input
        .read_line(&mut answer)
        .map_err(|e| WikicastError::Input(format!("Failed to read title: {}", e)))?;

    if read == 0 {
        return Err(WikicastError::Input("No title entered (end of input)".to_string()).into());
    }

    Ok(answer.trim().to_string())
}

/// Resolve the article title from the command line or the interactive prompt
pub fn read_title(cli: &Cli) -> Result<String> {
    match &cli.title {
        Some(title) => Ok(title.trim().to_string()),
        None => {
            let stdin = std::io::stdin();
            prompt_line(TITLE_PROMPT, stdin.lock(), std::io::stdout())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_prompt_trims_answer() {
        let mut out = Vec::new();
        let title =
            prompt_line(TITLE_PROMPT, Cursor::new("  Albert Einstein \n"), &mut out).unwrap();
        assert_eq!(title, "Albert Einstein");
        assert!(String::from_utf8_lossy(&out).contains("Enter a Wikipedia article title"));
    }

    #[test]
    fn test_prompt_passes_empty_and_unsafe_titles_through() {
        assert_eq!(prompt_line("> ", Cursor::new("\n"), Vec::new()).unwrap(), "");
        assert_eq!(prompt_line("> ", Cursor::new("AC/DC\n"), Vec::new()).unwrap(), "AC/DC");
    }

    #[test]
    fn test_prompt_end_of_input_is_input_error() {
        let err = prompt_line("> ", Cursor::new(""), Vec::new()).unwrap_err();
        assert!(matches!(err.downcast_ref::<WikicastError>(), Some(WikicastError::Input(_))));
    }

    #[test]
    fn test_positional_title_skips_prompt() {
        let cli = Cli::parse_from(["wikicast", " Rust (programming language) "]);
        assert_eq!(read_title(&cli).unwrap(), "Rust (programming language)");
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["wikicast"]);
        assert!(cli.title.is_none());
        assert!(!cli.cleanup_on_failure);
        assert!(!cli.show_config);
        assert_eq!(cli.format.to_string(), "text");
    }
}
