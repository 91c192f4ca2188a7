//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI parser for `triage`.
#[derive(Debug, Parser)]
#[command(name = "triage", version, about = "Classify a repository's open issues with an AI analysis service")]
pub struct Cli {
    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the dashboard API.
    Serve {
        /// Interface to bind.
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on.
        #[arg(long, default_value_t = 3001)]
        port: u16,
    },
    /// Run one analysis to completion and print the results.
    Analyze {
        /// Replay port interactions from a cassette instead of calling the services.
        #[arg(long)]
        replay: Option<PathBuf>,
    },
}
