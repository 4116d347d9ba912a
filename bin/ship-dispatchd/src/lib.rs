//! `ship-dispatchd`: runs sandboxed wasm handlers against state-history endpoints.
//!
//! The `run` command drives a single handler configured from flags. The `serve` command loads a
//! JSON file describing connections and handlers and runs every handler against one shared
//! [`Dispatcher`](ship_dispatch::Dispatcher).

mod cmd;
pub use cmd::*;

/// Argument groups and helpers shared between the commands.
pub mod common;

/// Run a single handler configured from flags.
pub mod run;

/// Run every handler listed in a configuration file.
pub mod serve;
