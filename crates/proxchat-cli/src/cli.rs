//! Command-line interface definitions and parsing

use clap::Parser;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Display name of the local endpoint
    #[arg(short, long, default_value = "alice")]
    pub name: String,

    /// Display name of the simulated remote endpoint
    #[arg(short, long, default_value = "bob")]
    pub peer: String,

    /// Discovery window in seconds
    #[arg(long, default_value_t = 2)]
    pub scan_window: u64,

    /// Message to open the conversation with
    #[arg(short, long, default_value = "hello over the air")]
    pub message: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
