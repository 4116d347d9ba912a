use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use alloy_primitives::{Bytes, B256};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::{
    BlockPosition, BlocksResult, ConnectionEndpoint, ConnectionError, Connector, ShipRequest,
    StatusResult, Transport, TransportError, TransportEvent,
};

/// A status event whose head and last irreversible block are `head`.
pub fn status_event(head: u32) -> TransportEvent {
    let position = BlockPosition::new(head, B256::with_last_byte(head as u8));
    TransportEvent::Status(StatusResult {
        head: position,
        last_irreversible: position,
        ..Default::default()
    })
}

/// A blocks event for block `block_num` carrying `payload`.
pub fn blocks_event(block_num: u32, payload: &[u8]) -> TransportEvent {
    let position = BlockPosition::new(block_num, B256::with_last_byte(block_num as u8));
    TransportEvent::Blocks {
        result: BlocksResult { this_block: Some(position), head: position, ..Default::default() },
        payload: Bytes::copy_from_slice(payload),
    }
}

#[derive(Debug)]
struct PendingConnection {
    events: UnboundedReceiver<TransportEvent>,
    requests: Arc<Mutex<Vec<ShipRequest>>>,
}

/// A [`Connector`] whose endpoints are scripted through [`MockRemote`]s.
///
/// Connecting to an endpoint without a remote fails with [`ConnectionError::Connect`]. Each
/// remote serves one connection.
#[derive(Debug, Default)]
pub struct MockConnector {
    pending: Mutex<HashMap<ConnectionEndpoint, PendingConnection>>,
    connections: Mutex<Vec<ConnectionEndpoint>>,
}

impl MockConnector {
    /// Creates a connector with no remotes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the next connection to `endpoint`. Replaces any unused remote for it.
    pub fn remote(&self, endpoint: &ConnectionEndpoint) -> MockRemote {
        let (sender, events) = unbounded_channel();
        let requests = Arc::new(Mutex::new(Vec::new()));
        self.pending
            .lock()
            .unwrap()
            .insert(endpoint.clone(), PendingConnection { events, requests: requests.clone() });
        MockRemote { events: sender, requests }
    }

    /// Every endpoint connected to so far, in order.
    pub fn connections(&self) -> Vec<ConnectionEndpoint> {
        self.connections.lock().unwrap().clone()
    }
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(
        &self,
        endpoint: &ConnectionEndpoint,
    ) -> Result<MockTransport, ConnectionError> {
        self.connections.lock().unwrap().push(endpoint.clone());
        let pending = self.pending.lock().unwrap().remove(endpoint).ok_or_else(|| {
            ConnectionError::Connect {
                endpoint: endpoint.clone(),
                reason: "connection refused".to_string(),
            }
        })?;
        Ok(MockTransport { events: pending.events, requests: pending.requests })
    }
}

/// The endpoint side of a scripted connection.
///
/// Events are queued in order and delivered as the session reads them. Dropping the remote ends
/// the stream abruptly, which the session sees as `Closed { retry: true }`.
#[derive(Debug)]
pub struct MockRemote {
    events: UnboundedSender<TransportEvent>,
    requests: Arc<Mutex<Vec<ShipRequest>>>,
}

impl MockRemote {
    /// Queues an event.
    pub fn send(&self, event: TransportEvent) {
        // The session may already be gone.
        let _ = self.events.send(event);
    }

    /// Queues the handshake.
    pub fn handshake(&self) {
        self.send(TransportEvent::Handshake("{\"version\":\"eosio::abi/1.1\"}".to_string()));
    }

    /// Queues a closure.
    pub fn close(&self, retry: bool) {
        self.send(TransportEvent::Closed { retry });
    }

    /// Every request the session sent so far.
    pub fn requests(&self) -> Vec<ShipRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Waits up to five seconds until the session has sent `count` requests.
    pub fn wait_for_requests(&self, count: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if self.requests.lock().unwrap().len() >= count {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }
}

/// The session side of a scripted connection.
#[derive(Debug)]
pub struct MockTransport {
    events: UnboundedReceiver<TransportEvent>,
    requests: Arc<Mutex<Vec<ShipRequest>>>,
}

impl Transport for MockTransport {
    async fn send(&mut self, request: ShipRequest) -> Result<(), TransportError> {
        self.requests.lock().unwrap().push(request);
        Ok(())
    }

    async fn next_event(&mut self) -> Result<TransportEvent, TransportError> {
        Ok(self.events.recv().await.unwrap_or(TransportEvent::Closed { retry: true }))
    }
}
