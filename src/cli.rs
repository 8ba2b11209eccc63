//! CLI argument parsing for evaltime

use crate::report::OutputFormat;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "evaltime")]
#[command(version)]
#[command(
    about = "Attribute compute time of a property-estimation run to its calculation layers",
    long_about = None
)]
pub struct Cli {
    /// Run directory holding the driver log, worker-logs/ and per-iteration results
    #[arg(value_name = "INPUT_DIR")]
    pub input_dir: PathBuf,

    /// Write the report to this file instead of stdout
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Output format (json, text or csv)
    #[arg(long = "format", value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// TOML file overriding the timing heuristics
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}
