//! Serve module for running every handler of a configuration file.

mod cmd;
mod config;

pub use cmd::*;
pub use config::*;

// Re-export from common module
pub use crate::common::{
    run_handler, ConnectionConfig, HandlerSummary, LogArgs, ReconnectArgs, StoreArgs,
};
