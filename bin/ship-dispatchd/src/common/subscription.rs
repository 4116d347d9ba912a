use clap::Parser;
use ship_dispatch::{constants::ship::UNBOUNDED_BLOCK_NUM, SubscriptionConfig};

/// Block subscription arguments
#[derive(Parser, Debug, Clone)]
pub struct SubscriptionArgs {
    /// First block to request
    #[arg(long = "ship.start-block", default_value = "0")]
    pub start_block: u32,

    /// One past the last block to request. Unbounded if not specified.
    #[arg(long = "ship.end-block")]
    pub end_block: Option<u32>,

    /// Number of blocks the endpoint may send before waiting for an acknowledgement.
    /// Blocks are not acknowledged if not specified.
    #[arg(long = "ship.max-in-flight")]
    pub max_in_flight: Option<u32>,

    /// Only request irreversible blocks
    #[arg(long = "ship.irreversible-only")]
    pub irreversible_only: bool,
}

impl SubscriptionArgs {
    /// Builds the subscription every session issues.
    pub fn config(&self) -> SubscriptionConfig {
        let mut config = SubscriptionConfig::default().with_start_block(self.start_block);
        config.end_block = self.end_block.unwrap_or(UNBOUNDED_BLOCK_NUM);
        if let Some(max_in_flight) = self.max_in_flight {
            config = config.with_max_messages_in_flight(max_in_flight);
        }
        config.irreversible_only = self.irreversible_only;
        config
    }
}
