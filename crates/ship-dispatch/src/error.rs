//! Error types surfaced by [`Dispatcher::create`](crate::Dispatcher::create).
//!
//! Every failure of a `create()` call is one of the kinds below, wrapped in [`DispatchError`]:
//!
//! - [`ConfigError`]: the handler cannot be started. Raised before any session starts.
//! - [`ConnectionError`]: the transport failed. Re-establishing the session is the caller's
//!   decision.
//! - [`ProtocolError`]: the endpoint sent something malformed or out of sequence.
//! - [`ExecutionTrap`]: the handler faulted on a block. The block's staged writes are discarded.
//! - [`StoreError`]: committing a block's writes failed. Nothing of the block is visible.

use std::path::PathBuf;

use crate::{ConnectionEndpoint, DecodeError, LengthOverflow, Name, SessionState};

/// The handler cannot be started.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The module is unreadable or not a valid module.
    #[error("failed to load module {}: {reason}", .path.display())]
    ModuleLoad {
        /// Path of the module
        path: PathBuf,
        /// Why loading failed
        reason: String,
    },
    /// The module imports something the capability table does not provide.
    #[error("unresolved import {module}::{name}")]
    UnresolvedImport {
        /// Import namespace
        module: String,
        /// Import name
        name: String,
    },
    /// The module lacks an export the dispatcher requires.
    #[error("module does not export {kind} `{name}`")]
    MissingExport {
        /// Kind of the missing export
        kind: &'static str,
        /// Name of the missing export
        name: String,
    },
    /// An export has the wrong function signature.
    #[error("module export `{name}` must have signature {expected}")]
    InvalidSignature {
        /// Name of the export
        name: String,
        /// The required signature
        expected: &'static str,
    },
    /// The invocation arguments cannot be encoded.
    #[error("invalid invocation arguments: {0}")]
    Arguments(#[from] LengthOverflow),
    /// Instantiating the module failed.
    #[error("failed to instantiate module: {0}")]
    Instantiation(String),
    /// Building the capability table failed.
    #[error("failed to build capability table: {0}")]
    CapabilityTable(String),
    /// No endpoint is registered for the handler.
    #[error("no connection registered for handler {0}")]
    UnknownConnection(Name),
}

/// The transport to the state-history endpoint failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// Opening the connection failed.
    #[error("failed to connect to {endpoint}: {reason}")]
    Connect {
        /// The endpoint being connected to
        endpoint: ConnectionEndpoint,
        /// Why connecting failed
        reason: String,
    },
    /// The established connection failed.
    #[error("connection failed: {0}")]
    Io(String),
}

impl ConnectionError {
    /// Whether re-creating the session may succeed. Advisory only.
    pub const fn is_retryable(&self) -> bool {
        true
    }
}

/// The endpoint sent a malformed or out-of-sequence message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A binary message could not be decoded.
    #[error("malformed message: {0}")]
    Decode(#[from] DecodeError),
    /// A message arrived in a state that does not accept it.
    #[error("unexpected {message} while {state}")]
    UnexpectedMessage {
        /// The session state when the message arrived
        state: SessionState,
        /// The kind of message
        message: &'static str,
    },
    /// A frame of a kind the protocol does not use.
    #[error("unexpected frame: {0}")]
    UnexpectedFrame(String),
    /// A request could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(#[from] LengthOverflow),
}

/// The handler faulted while processing a block.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("handler {handler} trapped in `{entry_point}`{}: {reason}", block_suffix(.block_num))]
pub struct ExecutionTrap {
    /// The handler that trapped.
    pub handler: Name,
    /// The entry point that was running.
    pub entry_point: String,
    /// The block being processed, when known.
    pub block_num: Option<u32>,
    /// Trap description from the sandbox.
    pub reason: String,
}

fn block_suffix(block_num: &Option<u32>) -> String {
    block_num.map(|num| format!(" at block {num}")).unwrap_or_default()
}

impl ExecutionTrap {
    /// Attaches the number of the block being processed.
    pub fn at_block(mut self, block_num: Option<u32>) -> Self {
        self.block_num = block_num;
        self
    }
}

/// The store rejected an operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A write targeted a context outside the view's declared write contexts.
    #[error("context {context} is not writable by this handler")]
    ContextNotWritable {
        /// The rejected context
        context: Name,
    },
    /// The storage backend failed.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// A failure reported by a [`Transport`](crate::Transport).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The connection failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// The endpoint violated the protocol.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Any failure of a [`Dispatcher::create`](crate::Dispatcher::create) call.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The handler cannot be started.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The transport failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    /// The endpoint violated the protocol.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// The handler trapped.
    #[error(transparent)]
    Trap(#[from] ExecutionTrap),
    /// Committing a block failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The session's event loop could not be created.
    #[error("failed to build session runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl From<TransportError> for DispatchError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Connection(err) => Self::Connection(err),
            TransportError::Protocol(err) => Self::Protocol(err),
        }
    }
}

impl DispatchError {
    /// Whether the caller may re-create the session.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(err) if err.is_retryable())
    }
}
