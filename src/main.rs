use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wikicast::{cli, output, utils, Cli, Config, NarrationPipeline};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose { "wikicast=debug" } else { "wikicast=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:?}", err);
            ExitCode::from(wikicast::exit_code_for(&err))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(files_dir) = &cli.files_dir {
        config.app.files_dir = files_dir.clone();
    }
    if cli.cleanup_on_failure {
        config.app.cleanup_on_failure = true;
    }

    if cli.show_config {
        config.display();
        return Ok(());
    }

    let title = cli::read_title(&cli)?;

    // Missing tools only surface as warnings; the encode stage reports the real failure
    let missing_deps =
        utils::check_dependencies(&config.app.ffmpeg_path, &config.app.ffprobe_path).await;
    if !missing_deps.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing_deps {
            eprintln!("   • {}", dep);
        }
    }

    let pipeline = NarrationPipeline::new(config, !cli.quiet)?;

    tracing::info!("Starting narration for title: {}", title);
    let result = pipeline.run(&title).await?;

    output::print_to_console(&result, &cli.format)?;
    Ok(())
}
