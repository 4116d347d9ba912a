use core::fmt;

use alloy_primitives::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{error::ProtocolError as WsProtocolError, Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};

use crate::{
    ConnectionEndpoint, ConnectionError, Connector, ProtocolError, ShipRequest, ShipResult,
    Transport, TransportError, TransportEvent,
};

/// Connects to state-history endpoints over plain websockets.
#[derive(Debug, Clone, Copy, Default)]
#[non_exhaustive]
pub struct WsConnector;

impl WsConnector {
    /// Creates a new connector.
    pub const fn new() -> Self {
        Self
    }
}

impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self, endpoint: &ConnectionEndpoint) -> Result<WsTransport, ConnectionError> {
        let url = format!("ws://{endpoint}");
        let (stream, _) = connect_async(url.as_str()).await.map_err(|err| {
            ConnectionError::Connect { endpoint: endpoint.clone(), reason: err.to_string() }
        })?;
        tracing::debug!(%url, "Websocket connected");
        Ok(WsTransport { stream, handshake_received: false })
    }
}

/// A websocket connection speaking the state-history protocol.
///
/// The first message is the schema. Every later message is a binary `result`.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    handshake_received: bool,
}

impl fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsTransport")
            .field("handshake_received", &self.handshake_received)
            .finish_non_exhaustive()
    }
}

impl WsTransport {
    fn handshake(&mut self, schema: String) -> TransportEvent {
        self.handshake_received = true;
        TransportEvent::Handshake(schema)
    }
}

fn decode_result(data: Vec<u8>) -> Result<TransportEvent, TransportError> {
    let event = match ShipResult::decode(&data).map_err(ProtocolError::from)? {
        ShipResult::Status(status) => TransportEvent::Status(status),
        ShipResult::Blocks(result) => TransportEvent::Blocks { result, payload: Bytes::from(data) },
    };
    Ok(event)
}

impl Transport for WsTransport {
    async fn send(&mut self, request: ShipRequest) -> Result<(), TransportError> {
        let data = request.encode().map_err(ProtocolError::from)?;
        self.stream
            .send(Message::Binary(data))
            .await
            .map_err(|err| ConnectionError::Io(err.to_string()))?;
        Ok(())
    }

    async fn next_event(&mut self) -> Result<TransportEvent, TransportError> {
        loop {
            let message = match self.stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(WsError::Protocol(WsProtocolError::ResetWithoutClosingHandshake))) |
                None => return Ok(TransportEvent::Closed { retry: true }),
                Some(Err(err)) => return Err(ConnectionError::Io(err.to_string()).into()),
            };

            match message {
                Message::Text(schema) if !self.handshake_received => {
                    return Ok(self.handshake(schema))
                }
                Message::Binary(data) if !self.handshake_received => {
                    let schema = String::from_utf8(data).map_err(|_| {
                        ProtocolError::UnexpectedFrame("non-utf8 schema".to_string())
                    })?;
                    return Ok(self.handshake(schema));
                }
                Message::Binary(data) => return decode_result(data),
                Message::Text(_) => {
                    return Err(ProtocolError::UnexpectedFrame("text".to_string()).into())
                }
                Message::Close(frame) => {
                    tracing::debug!(?frame, "Websocket closed by endpoint");
                    return Ok(TransportEvent::Closed { retry: false });
                }
                // tungstenite answers pings itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }
}
