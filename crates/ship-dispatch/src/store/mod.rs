//! The key-value store behind a handler's [`StoreView`].
//!
//! Keys are scoped by a write-context [`Name`]. Backends only need point reads, prefix scans and
//! an atomic batch write; staging and read-your-writes live in [`StoreView`].

use core::fmt::Debug;

use alloy_primitives::Bytes;
use auto_impl::auto_impl;

use crate::{Name, StoreError};

mod memory;
pub use memory::*;

#[cfg(feature = "redb")]
mod redb_store;
#[cfg(feature = "redb")]
pub use redb_store::*;

mod view;
pub use view::*;

/// A stored key and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    /// Key within the context.
    pub key: Bytes,
    /// Stored value.
    pub value: Bytes,
}

/// One mutation in a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOp {
    /// Context the key lives in.
    pub context: Name,
    /// Key within the context.
    pub key: Bytes,
    /// New value, or `None` to erase the key.
    pub value: Option<Bytes>,
}

/// A set of mutations applied all-or-nothing by [`KvStore::write`].
#[derive(Debug, Clone, Default, PartialEq, Eq, derive_more::Deref)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a mutation.
    pub fn push(&mut self, context: Name, key: Bytes, value: Option<Bytes>) {
        self.ops.push(WriteOp { context, key, value });
    }

    /// Consumes the batch, returning its mutations in insertion order.
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Storage backend for handler state.
#[auto_impl(&, Box, Arc)]
pub trait KvStore: Debug + Send + Sync {
    /// Reads the value stored under `key` in `context`.
    fn get(&self, context: Name, key: &[u8]) -> Result<Option<Bytes>, StoreError>;

    /// Returns every entry of `context` whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, context: Name, prefix: &[u8]) -> Result<Vec<KvEntry>, StoreError>;

    /// Applies `batch` atomically: either every mutation becomes visible or none does.
    fn write(&self, batch: WriteBatch) -> Result<(), StoreError>;
}
