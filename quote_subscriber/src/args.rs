//! Command-line arguments for the quote subscriber.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use clap::Parser;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the session settings file.
    #[clap(default_value = "config/subscriber.cfg")]
    pub config: String,
}
