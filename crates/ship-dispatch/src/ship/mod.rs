//! State-history protocol messages.
//!
//! The state-history endpoint speaks a small request/response protocol:
//!
//! 1. On connect the endpoint sends its schema as a text frame (the handshake).
//! 2. The client asks for the chain status with a [`ShipRequest::Status`].
//! 3. The client subscribes with a [`ShipRequest::Blocks`] built from the status and a
//!    [`SubscriptionConfig`].
//! 4. The endpoint streams one [`ShipResult::Blocks`] per block until either side closes.
//!
//! Only the parts of the protocol the dispatcher depends on are modelled here. Block, trace and
//! delta bodies stay opaque [`Bytes`](alloy_primitives::Bytes).

mod message;
mod types;

pub use message::*;
pub use types::*;
