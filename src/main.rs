//! u-fertility: cycles-to-pregnancy statistics from a participant table.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use u_fertility::config::AnalysisConfig;
use u_fertility::pipeline;
use u_fertility::render::{write_console_summary, JsonRenderer};
use u_fertility::source::{DataSource, FileSource};

#[derive(Parser, Debug)]
#[command(
    name = "u-fertility",
    version,
    about = "Cumulative pregnancy probability and covariate correlations"
)]
struct Cli {
    /// Whitespace-delimited participant table (header line first)
    #[arg(default_value = "data.list")]
    input: PathBuf,

    /// TOML file overriding the analysis defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for JSON artifacts (overrides the config file)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    let mut config = AnalysisConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }

    let loaded = FileSource
        .read_all(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    if loaded.skipped > 0 {
        info!(skipped = loaded.skipped, "some input rows were malformed and skipped");
    }

    let mut renderer = JsonRenderer::new(&config.output_dir);
    let report = pipeline::run(&loaded.store, &config, &mut renderer);

    let stdout = io::stdout();
    write_console_summary(&report, &mut stdout.lock()).context("writing summary")?;
    Ok(())
}
