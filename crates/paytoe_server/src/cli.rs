//! Command-line interface for paytoe.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Paytoe - pay-per-play tic-tac-toe behind an x402 paywall
#[derive(Parser, Debug)]
#[command(name = "paytoe")]
#[command(about = "Pay-per-play tic-tac-toe server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP game server
    Serve {
        /// TOML config file; environment variables override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the payment requirement the server would publish
    Requirements {
        /// TOML config file; environment variables override it
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
