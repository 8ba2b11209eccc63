use anyhow::{Context, Result};
use clap::Parser;
use evaltime::{cli::Cli, config::TimingConfig, report, run_dir::RunDirectory};
use std::fs;
use std::io::Write;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_config(args: &Cli) -> Result<TimingConfig> {
    let config = match &args.config {
        Some(path) => TimingConfig::from_toml(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TimingConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let config = load_config(&args)?;

    let run = RunDirectory::open(&args.input_dir, &config)
        .with_context(|| format!("Failed to open run directory {}", args.input_dir.display()))?;
    let stats = run
        .analyze(&config)
        .with_context(|| format!("Failed to analyze {}", args.input_dir.display()))?;

    let rendered = report::render(&stats, args.format)?;

    match &args.output {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("Failed to write report to {}", path.display()))?,
        None => std::io::stdout()
            .write_all(rendered.as_bytes())
            .context("Failed to write report to stdout")?,
    }

    Ok(())
}
