use alloy_primitives::{Bytes, B256};

use crate::constants::ship::{UNBOUNDED_BLOCK_NUM, UNBOUNDED_MESSAGES_IN_FLIGHT};

/// A block identified by its number and id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BlockPosition {
    /// The block number.
    pub block_num: u32,
    /// The block id.
    pub block_id: B256,
}

impl BlockPosition {
    /// Creates a new block position.
    pub const fn new(block_num: u32, block_id: B256) -> Self {
        Self { block_num, block_id }
    }
}

/// The endpoint's answer to a status request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusResult {
    /// The head block.
    pub head: BlockPosition,
    /// The last irreversible block.
    pub last_irreversible: BlockPosition,
    /// First block with traces available.
    pub trace_begin_block: u32,
    /// One past the last block with traces available.
    pub trace_end_block: u32,
    /// First block with chain-state deltas available.
    pub chain_state_begin_block: u32,
    /// One past the last block with chain-state deltas available.
    pub chain_state_end_block: u32,
}

/// A block subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlocksRequest {
    /// First block to deliver.
    pub start_block_num: u32,
    /// One past the last block to deliver.
    pub end_block_num: u32,
    /// How many results the endpoint may send before waiting for an acknowledgement.
    pub max_messages_in_flight: u32,
    /// Blocks the client already has; the endpoint resumes after the last one that matches.
    pub have_positions: Vec<BlockPosition>,
    /// Only deliver irreversible blocks.
    pub irreversible_only: bool,
    /// Include the signed block.
    pub fetch_block: bool,
    /// Include the action traces.
    pub fetch_traces: bool,
    /// Include the table deltas.
    pub fetch_deltas: bool,
}

/// One delivered block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlocksResult {
    /// The head block at the time of delivery.
    pub head: BlockPosition,
    /// The last irreversible block at the time of delivery.
    pub last_irreversible: BlockPosition,
    /// The delivered block, absent when the endpoint has nothing newer.
    pub this_block: Option<BlockPosition>,
    /// The delivered block's predecessor.
    pub prev_block: Option<BlockPosition>,
    /// The serialized signed block.
    pub block: Option<Bytes>,
    /// The serialized traces.
    pub traces: Option<Bytes>,
    /// The serialized table deltas.
    pub deltas: Option<Bytes>,
}

/// Parameters of the block subscription a session issues once the status is known.
///
/// The default subscribes to every block from block 0 with no filtering and no acknowledgement
/// window.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubscriptionConfig {
    /// First block to request.
    pub start_block: u32,
    /// One past the last block to request.
    pub end_block: u32,
    /// Acknowledgement window. [`u32::MAX`] disables acknowledgements.
    pub max_messages_in_flight: u32,
    /// Only request irreversible blocks.
    pub irreversible_only: bool,
    /// Request signed blocks.
    pub fetch_block: bool,
    /// Request traces.
    pub fetch_traces: bool,
    /// Request deltas.
    pub fetch_deltas: bool,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            start_block: 0,
            end_block: UNBOUNDED_BLOCK_NUM,
            max_messages_in_flight: UNBOUNDED_MESSAGES_IN_FLIGHT,
            irreversible_only: false,
            fetch_block: true,
            fetch_traces: true,
            fetch_deltas: true,
        }
    }
}

impl SubscriptionConfig {
    /// Sets the first block to request.
    pub const fn with_start_block(mut self, start_block: u32) -> Self {
        self.start_block = start_block;
        self
    }

    /// Sets the acknowledgement window.
    pub const fn with_max_messages_in_flight(mut self, max_messages_in_flight: u32) -> Self {
        self.max_messages_in_flight = max_messages_in_flight;
        self
    }

    /// Whether the session must acknowledge each processed block.
    pub const fn requires_ack(&self) -> bool {
        self.max_messages_in_flight != UNBOUNDED_MESSAGES_IN_FLIGHT
    }

    /// Builds the blocks request. The range is not clamped to the endpoint's status: the endpoint
    /// waits for blocks that do not exist yet.
    pub fn blocks_request(&self) -> BlocksRequest {
        BlocksRequest {
            start_block_num: self.start_block,
            end_block_num: self.end_block,
            max_messages_in_flight: self.max_messages_in_flight,
            have_positions: Vec::new(),
            irreversible_only: self.irreversible_only,
            fetch_block: self.fetch_block,
            fetch_traces: self.fetch_traces,
            fetch_deltas: self.fetch_deltas,
        }
    }
}
