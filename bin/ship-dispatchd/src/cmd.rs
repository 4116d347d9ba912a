use std::path::PathBuf;

use clap::Parser;
use ship_dispatch::{ConfigError, DispatchError, StoreError};

/// Main command enumeration for the ship-dispatchd daemon
#[derive(Parser, Debug)]
#[command(infer_subcommands = true, version)]
pub enum MainCmd {
    /// Run a single handler configured from flags
    Run(crate::run::Cmd),
    /// Run every handler listed in a configuration file
    Serve(crate::serve::Cmd),
}

/// Error types for the main command system
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The log file could not be created
    #[error("Failed to create log file {}: {source}", .path.display())]
    LogFile {
        /// Path of the log file
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// The configuration file could not be read
    #[error("Failed to read config file {}: {source}", .path.display())]
    ConfigRead {
        /// Path of the configuration file
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// The configuration file is not valid
    #[error("Invalid config file {}: {source}", .path.display())]
    ConfigParse {
        /// Path of the configuration file
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },
    /// The store could not be opened
    #[error("Failed to open store: {0}")]
    Store(#[from] StoreError),
    /// The dispatcher could not be created
    #[error("Dispatcher error: {0}")]
    Config(#[from] ConfigError),
    /// A handler session failed
    #[error("Handler error: {0}")]
    Dispatch(#[from] DispatchError),
    /// A handler thread could not be started
    #[error("Failed to spawn handler thread: {0}")]
    Spawn(std::io::Error),
    /// Some handlers run by `serve` failed
    #[error("{failed} of {total} handlers failed")]
    HandlersFailed {
        /// Number of failed handlers
        failed: usize,
        /// Number of handlers
        total: usize,
    },
    /// The summary could not be written
    #[error("Failed to write summary: {0}")]
    Output(#[from] serde_json::Error),
}

impl MainCmd {
    /// Execute the main command
    pub fn run(&self) -> Result<(), Error> {
        match self {
            Self::Run(cmd) => cmd.run(),
            Self::Serve(cmd) => cmd.run(),
        }
    }
}
