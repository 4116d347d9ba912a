use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        PoisonError, RwLock,
    },
};

use alloy_primitives::Bytes;

use crate::{KvEntry, KvStore, Name, StoreError, WriteBatch};

/// An in-process [`KvStore`].
///
/// Counts the batches it applies, which makes it the store of choice for tests that check how
/// many blocks were committed.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<(Name, Vec<u8>), Bytes>>,
    commits: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batches applied so far.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Number of stored entries across all contexts.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryStore {
    fn get(&self, context: Name, key: &[u8]) -> Result<Option<Bytes>, StoreError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(&(context, key.to_vec())).cloned())
    }

    fn scan_prefix(&self, context: Name, prefix: &[u8]) -> Result<Vec<KvEntry>, StoreError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .range((context, prefix.to_vec())..)
            .take_while(|((ctx, key), _)| *ctx == context && key.starts_with(prefix))
            .map(|((_, key), value)| KvEntry {
                key: Bytes::copy_from_slice(key),
                value: value.clone(),
            })
            .collect())
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        // Readers never observe a partially applied batch.
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for op in batch.into_ops() {
            match op.value {
                Some(value) => entries.insert((op.context, op.key.to_vec()), value),
                None => entries.remove(&(op.context, op.key.to_vec())),
            };
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
