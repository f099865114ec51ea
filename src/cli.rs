//! Command-line interface.

use clap::{Parser, Subcommand};

/// Conversational PDF assistant backend.
#[derive(Parser, Debug)]
#[command(name = "doc-assistant", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve {
        /// Listen address, overriding BIND_ADDR
        #[arg(long)]
        bind: Option<String>,
    },

    /// Delete every cached document, index and the manifest under DATA_DIR
    Purge,
}

impl Cli {
    /// Subcommand to run, `serve` when none was given.
    pub fn command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or(Commands::Serve { bind: None })
    }
}
