use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "converto")]
#[command(author, version, about = "Convert files through a remote conversion service")]
pub struct Cli {
    /// Files to convert
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Target format for every file (e.g. mp4, mp3, jpg, pdf).
    /// Each file gets a suggested format when omitted.
    #[arg(short, long)]
    pub format: Option<String>,

    /// Path to config file
    #[arg(short, long, env = "CONVERTO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the planned target formats without converting
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Write logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}
