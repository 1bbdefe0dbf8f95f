use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ffbench")]
#[command(about = "FFmpeg hardware decode/encode benchmark", long_about = None)]
pub struct Cli {
    /// Directory holding the test source files (defaults to current directory)
    #[arg(value_name = "DIRECTORY")]
    pub directory: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// GPU vendor to benchmark (nvidia or intel)
    #[arg(long, value_name = "VENDOR")]
    pub gpu: Option<String>,

    /// Parallel probe streams per matrix cell (overrides config)
    #[arg(long)]
    pub streams: Option<usize>,

    /// GPU device index (overrides config)
    #[arg(long)]
    pub device: Option<u32>,

    /// Run encode probes instead of decode probes
    #[arg(long)]
    pub encode: bool,

    /// Treat sources as raw (uncontained) streams
    #[arg(long)]
    pub raw: bool,

    /// Decode raw sources with the software SpeedHQ path
    #[arg(long, requires = "raw")]
    pub speedhq: bool,

    /// Only benchmark software decoding/encoding
    #[arg(long)]
    pub software_only: bool,

    /// Result file path (overrides config)
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check if ffmpeg is installed and runnable
    CheckFfmpeg,

    /// Show the acceleration-mode axis for the configured vendor
    ListModes,

    /// Show the probe commands without executing (dry run)
    DryRun {
        /// Directory to scan (defaults to current directory)
        directory: Option<PathBuf>,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}
