//! The transport collaborator: delivers state-history events to a [`StreamSession`].
//!
//! A session only reacts to four events: the handshake, the status result, a blocks result and
//! the closure of the connection. Framing and encoding stay behind the [`Transport`] trait.
//!
//! [`StreamSession`]: crate::StreamSession

use core::future::Future;

use alloy_primitives::Bytes;

use crate::{
    BlocksResult, ConnectionEndpoint, ConnectionError, ShipRequest, StatusResult, TransportError,
};

mod ws;
pub use ws::*;

/// An event received from the state-history endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The endpoint sent its schema.
    Handshake(String),
    /// The endpoint answered the status request.
    Status(StatusResult),
    /// The endpoint delivered a block.
    Blocks {
        /// The decoded result.
        result: BlocksResult,
        /// The complete serialized result, as handed to the handler.
        payload: Bytes,
    },
    /// The connection is closed. `retry` hints whether re-creating the session may succeed.
    Closed {
        /// Advisory retry hint.
        retry: bool,
    },
}

/// An open connection to a state-history endpoint.
pub trait Transport {
    /// Sends a request.
    fn send(&mut self, request: ShipRequest) -> impl Future<Output = Result<(), TransportError>>;

    /// Waits for the next event. After [`TransportEvent::Closed`] no further events are read.
    fn next_event(&mut self) -> impl Future<Output = Result<TransportEvent, TransportError>>;
}

/// Opens [`Transport`]s to endpoints.
pub trait Connector {
    /// The transport this connector opens.
    type Transport: Transport;

    /// Connects to `endpoint`.
    fn connect(
        &self,
        endpoint: &ConnectionEndpoint,
    ) -> impl Future<Output = Result<Self::Transport, ConnectionError>>;
}
