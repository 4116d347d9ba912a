use alloy_primitives::Bytes;
use auto_impl::auto_impl;

use crate::{
    BlocksResult, ConnectionEndpoint, Connector, DispatchError, ExecutionTrap, Name,
    ProtocolError, ShipRequest, StatusResult, StoreError, SubscriptionConfig, Transport,
    TransportEvent,
};

/// State of a [`StreamSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum SessionState {
    /// No transport is open.
    #[display("disconnected")]
    Disconnected,
    /// The transport is open; waiting for the handshake.
    #[display("connected")]
    Connected,
    /// The status request is out; waiting for the status result.
    #[display("requesting status")]
    Requesting,
    /// Subscribed; blocks are being delivered.
    #[display("active")]
    Active,
    /// The endpoint closed the transport.
    #[display("closed")]
    Closed,
}

/// Executes delivered blocks. Implemented by [`ExecutionContext`](crate::ExecutionContext).
#[auto_impl(&mut, Box)]
pub trait BlockHandler {
    /// Identity of the handler, used in logs.
    fn name(&self) -> Name;

    /// Drops state staged by a previous block.
    fn reset(&mut self);

    /// Sets the payload of the block about to run.
    fn load(&mut self, payload: Bytes);

    /// Runs the handler's entry point.
    fn invoke(&mut self) -> Result<(), ExecutionTrap>;

    /// Atomically applies the block's staged writes, then resets.
    fn commit(&mut self) -> Result<(), StoreError>;
}

/// How a session that reached [`SessionState::Closed`] ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Number of blocks executed and committed.
    pub blocks_processed: u64,
    /// The endpoint's advisory retry hint.
    pub retry: bool,
    /// The last committed block, when the endpoint reported its number.
    pub last_block: Option<u32>,
}

/// Drives one handler's connection: handshake, status, subscription, then one
/// `reset -> load -> invoke -> commit` cycle per delivered block, in delivery order.
///
/// A block runs to completion before the next event is read. A trap discards the block's staged
/// writes and ends the session.
#[derive(Debug)]
pub struct StreamSession<H> {
    handler: H,
    subscription: SubscriptionConfig,
    state: SessionState,
    outcome: SessionOutcome,
}

impl<H: BlockHandler> StreamSession<H> {
    /// Creates a session in [`SessionState::Disconnected`].
    pub fn new(handler: H, subscription: SubscriptionConfig) -> Self {
        Self {
            handler,
            subscription,
            state: SessionState::Disconnected,
            outcome: SessionOutcome::default(),
        }
    }

    /// The current state.
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Connects to `endpoint` and processes events until the endpoint closes the transport or an
    /// error ends the session.
    pub async fn run<C: Connector>(
        &mut self,
        connector: &C,
        endpoint: &ConnectionEndpoint,
    ) -> Result<SessionOutcome, DispatchError> {
        let handler = self.handler.name();
        let mut transport = connector.connect(endpoint).await?;
        self.transition(SessionState::Connected);
        tracing::debug!(%handler, %endpoint, "Transport open");

        loop {
            let event = match transport.next_event().await {
                Ok(event) => event,
                Err(err) => return Err(self.fail(err.into())),
            };
            match self.on_event(&mut transport, event).await {
                Ok(Some(outcome)) => return Ok(outcome),
                Ok(None) => {}
                Err(err) => return Err(self.fail(err)),
            }
        }
    }

    /// Handles one transport event. Returns the outcome once the session is closed.
    pub async fn on_event<T: Transport>(
        &mut self,
        transport: &mut T,
        event: TransportEvent,
    ) -> Result<Option<SessionOutcome>, DispatchError> {
        match (self.state, event) {
            (SessionState::Connected, TransportEvent::Handshake(schema)) => {
                tracing::debug!(
                    handler = %self.handler.name(),
                    schema_len = schema.len(),
                    "Received handshake"
                );
                self.transition(SessionState::Requesting);
                transport.send(ShipRequest::Status).await?;
            }
            (SessionState::Requesting, TransportEvent::Status(status)) => {
                self.on_status(&status);
                transport.send(self.subscription.blocks_request().into()).await?;
                self.transition(SessionState::Active);
            }
            (SessionState::Active, TransportEvent::Blocks { result, payload }) => {
                self.on_block(&result, payload)?;
                if self.subscription.requires_ack() {
                    transport.send(ShipRequest::AckBlocks { num_messages: 1 }).await?;
                }
            }
            (_, TransportEvent::Closed { retry }) => {
                self.transition(SessionState::Closed);
                self.outcome.retry = retry;
                tracing::warn!(
                    handler = %self.handler.name(),
                    retry,
                    blocks = self.outcome.blocks_processed,
                    "Session closed by endpoint"
                );
                return Ok(Some(self.outcome));
            }
            (state, event) => {
                let message = event_kind(&event);
                return Err(ProtocolError::UnexpectedMessage { state, message }.into());
            }
        }
        Ok(None)
    }

    fn on_status(&self, status: &StatusResult) {
        tracing::info!(
            handler = %self.handler.name(),
            head = status.head.block_num,
            last_irreversible = status.last_irreversible.block_num,
            start_block = self.subscription.start_block,
            "Subscribing to blocks"
        );
    }

    fn on_block(&mut self, result: &BlocksResult, payload: Bytes) -> Result<(), DispatchError> {
        let block_num = result.this_block.map(|block| block.block_num);
        tracing::debug!(
            handler = %self.handler.name(),
            ?block_num,
            len = payload.len(),
            "Processing block"
        );

        self.handler.reset();
        self.handler.load(payload);
        if let Err(trap) = self.handler.invoke() {
            self.handler.reset();
            return Err(trap.at_block(block_num).into());
        }
        self.handler.commit()?;

        self.outcome.blocks_processed += 1;
        if block_num.is_some() {
            self.outcome.last_block = block_num;
        }
        Ok(())
    }

    fn transition(&mut self, state: SessionState) {
        tracing::info!(
            handler = %self.handler.name(),
            from = %self.state,
            to = %state,
            "Session transition"
        );
        self.state = state;
    }

    fn fail(&mut self, err: DispatchError) -> DispatchError {
        tracing::warn!(handler = %self.handler.name(), state = %self.state, %err, "Session failed");
        self.state = SessionState::Closed;
        err
    }
}

const fn event_kind(event: &TransportEvent) -> &'static str {
    match event {
        TransportEvent::Handshake(_) => "handshake",
        TransportEvent::Status(_) => "status result",
        TransportEvent::Blocks { .. } => "blocks result",
        TransportEvent::Closed { .. } => "closure",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_utils::{blocks_event, status_event, MockConnector, RecordingHandler},
        ConnectionEndpoint, ShipRequest,
    };

    fn endpoint() -> ConnectionEndpoint {
        ConnectionEndpoint::new("127.0.0.1", "8080")
    }

    #[tokio::test]
    async fn test_full_session() {
        let connector = MockConnector::new();
        let remote = connector.remote(&endpoint());
        remote.handshake();
        remote.send(status_event(10));
        for (num, payload) in [(1, "b0"), (2, "b1"), (3, "b2")] {
            remote.send(blocks_event(num, payload.as_bytes()));
        }
        remote.close(false);

        let mut handler = RecordingHandler::default();
        let mut session = StreamSession::new(&mut handler, SubscriptionConfig::default());
        let outcome = session.run(&connector, &endpoint()).await.unwrap();

        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(
            outcome,
            SessionOutcome { blocks_processed: 3, retry: false, last_block: Some(3) }
        );
        assert_eq!(handler.commits, 3);
        assert_eq!(handler.invoked.len(), 3);
        let requests = remote.requests();
        assert_eq!(requests[0], ShipRequest::Status);
        assert!(matches!(
            &requests[1],
            ShipRequest::Blocks(request) if request.start_block_num == 0
        ));
        assert_eq!(requests.len(), 2);
    }

    #[tokio::test]
    async fn test_acks_each_block_when_window_is_finite() {
        let connector = MockConnector::new();
        let remote = connector.remote(&endpoint());
        remote.handshake();
        remote.send(status_event(10));
        remote.send(blocks_event(1, b"b0"));
        remote.send(blocks_event(2, b"b1"));
        remote.close(true);

        let mut handler = RecordingHandler::default();
        let subscription = SubscriptionConfig::default().with_max_messages_in_flight(4);
        let outcome = StreamSession::new(&mut handler, subscription)
            .run(&connector, &endpoint())
            .await
            .unwrap();

        assert!(outcome.retry);
        let acks = remote
            .requests()
            .into_iter()
            .filter(|request| matches!(request, ShipRequest::AckBlocks { num_messages: 1 }))
            .count();
        assert_eq!(acks, 2);
    }

    #[tokio::test]
    async fn test_block_before_status_is_protocol_error() {
        let connector = MockConnector::new();
        let remote = connector.remote(&endpoint());
        remote.handshake();
        remote.send(blocks_event(1, b"b0"));

        let mut handler = RecordingHandler::default();
        let mut session = StreamSession::new(&mut handler, SubscriptionConfig::default());
        let err = session.run(&connector, &endpoint()).await.unwrap_err();

        assert!(matches!(
            err,
            DispatchError::Protocol(ProtocolError::UnexpectedMessage {
                state: SessionState::Requesting,
                message: "blocks result",
            })
        ));
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(handler.commits, 0);
    }

    #[tokio::test]
    async fn test_trap_discards_block_and_ends_session() {
        let connector = MockConnector::new();
        let remote = connector.remote(&endpoint());
        remote.handshake();
        remote.send(status_event(10));
        remote.send(blocks_event(1, b"b0"));
        remote.send(blocks_event(2, b"!b1"));
        remote.send(blocks_event(3, b"b2"));
        remote.close(false);

        let mut handler = RecordingHandler::default();
        let err = StreamSession::new(&mut handler, SubscriptionConfig::default())
            .run(&connector, &endpoint())
            .await
            .unwrap_err();

        let DispatchError::Trap(trap) = err else { panic!("expected trap, got {err:?}") };
        assert_eq!(trap.block_num, Some(2));
        assert_eq!(handler.commits, 1);
        assert_eq!(handler.invoked.len(), 2);
        assert!(handler.loaded.is_none());
    }

    #[tokio::test]
    async fn test_unknown_endpoint_is_connection_error() {
        let connector = MockConnector::new();
        let mut handler = RecordingHandler::default();
        let err = StreamSession::new(&mut handler, SubscriptionConfig::default())
            .run(&connector, &endpoint())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
