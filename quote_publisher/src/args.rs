//! Command-line arguments for the quote publisher.
use clap::Parser;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the session settings file.
    #[clap(default_value = "config/executor.cfg")]
    pub config: String,
}
