//! Run module for driving a single handler from flags.

mod cmd;

pub use cmd::*;

// Re-export from common module
pub use crate::common::{
    run_handler, ConnectionConfig, HandlerSummary, LogArgs, ReconnectArgs, StoreArgs,
    SubscriptionArgs,
};
