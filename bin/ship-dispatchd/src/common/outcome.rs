use serde::Serialize;
use ship_dispatch::{Name, SessionOutcome};

/// What a handler did across all of its sessions. Printed as JSON when the handler stops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerSummary {
    /// The handler.
    pub handler: Name,
    /// Number of sessions created, reconnects included.
    pub sessions: u32,
    /// Blocks committed across all sessions.
    pub blocks_processed: u64,
    /// Last block committed.
    pub last_block: Option<u32>,
}

impl HandlerSummary {
    /// A summary of a handler that has not run yet.
    pub const fn new(handler: Name) -> Self {
        Self { handler, sessions: 0, blocks_processed: 0, last_block: None }
    }

    /// Adds a finished session.
    pub fn record(&mut self, outcome: &SessionOutcome) {
        self.blocks_processed += outcome.blocks_processed;
        self.last_block = outcome.last_block.or(self.last_block);
    }
}
