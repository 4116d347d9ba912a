//! Runs sandboxed wasm handlers against a live state-history block stream.
//!
//! A [`Dispatcher`] loads a handler module, binds it to the [`CapabilityTable`] and a
//! [`StoreView`] scoped to the handler's write contexts, then drives a [`StreamSession`] against
//! the endpoint registered for the handler. Every delivered block runs through the handler's
//! [`ExecutionContext`] as `reset -> load -> invoke -> commit`, strictly in delivery order.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod constants;

mod codec;
pub use codec::*;

mod context;
pub use context::*;

mod dispatcher;
pub use dispatcher::*;

mod error;
pub use error::*;

mod host;
pub use host::*;

mod name;
pub use name::*;

mod registry;
pub use registry::*;

mod session;
pub use session::*;

mod ship;
pub use ship::*;

mod store;
pub use store::*;

mod transport;
pub use transport::*;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use alloy_primitives::Bytes;
