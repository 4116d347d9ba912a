use std::{
    collections::{BTreeMap, BTreeSet},
    mem,
    sync::Arc,
};

use alloy_primitives::Bytes;

use crate::{KvEntry, KvStore, Name, StoreError, WriteBatch};

/// A handler's staged view of the store.
///
/// Writes are staged in memory and read back by later reads of the same view. Nothing reaches
/// the store until [`write_and_reset`](Self::write_and_reset) applies every staged write in a
/// single batch. Reads may target any context; writes are limited to the declared write
/// contexts unless the view is privileged.
#[derive(Debug)]
pub struct StoreView {
    store: Arc<dyn KvStore>,
    write_contexts: BTreeSet<Name>,
    privileged: bool,
    /// Staged writes. `None` marks an erased key.
    staged: BTreeMap<(Name, Vec<u8>), Option<Bytes>>,
}

impl StoreView {
    /// Creates a view over `store`.
    pub fn new(
        store: Arc<dyn KvStore>,
        write_contexts: impl IntoIterator<Item = Name>,
        privileged: bool,
    ) -> Self {
        Self {
            store,
            write_contexts: write_contexts.into_iter().collect(),
            privileged,
            staged: BTreeMap::new(),
        }
    }

    /// Whether this view may write to `context`.
    pub fn can_write(&self, context: Name) -> bool {
        self.privileged || self.write_contexts.contains(&context)
    }

    /// Number of staged writes.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Reads `key` in `context`, seeing this view's staged writes first.
    pub fn get(&self, context: Name, key: &[u8]) -> Result<Option<Bytes>, StoreError> {
        match self.staged.get(&(context, key.to_vec())) {
            Some(staged) => Ok(staged.clone()),
            None => self.store.get(context, key),
        }
    }

    /// Stages `key = value` in `context`.
    pub fn set(&mut self, context: Name, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.ensure_writable(context)?;
        self.staged.insert((context, key.to_vec()), Some(Bytes::copy_from_slice(value)));
        Ok(())
    }

    /// Stages the removal of `key` in `context`.
    pub fn erase(&mut self, context: Name, key: &[u8]) -> Result<(), StoreError> {
        self.ensure_writable(context)?;
        self.staged.insert((context, key.to_vec()), None);
        Ok(())
    }

    /// Returns every entry of `context` whose key starts with `prefix`, staged writes included,
    /// in key order.
    pub fn scan(&self, context: Name, prefix: &[u8]) -> Result<Vec<KvEntry>, StoreError> {
        let mut merged: BTreeMap<Vec<u8>, Bytes> = self
            .store
            .scan_prefix(context, prefix)?
            .into_iter()
            .map(|entry| (entry.key.to_vec(), entry.value))
            .collect();

        let staged = self
            .staged
            .range((context, prefix.to_vec())..)
            .take_while(|((ctx, key), _)| *ctx == context && key.starts_with(prefix));
        for ((_, key), value) in staged {
            match value {
                Some(value) => merged.insert(key.clone(), value.clone()),
                None => merged.remove(key),
            };
        }

        Ok(merged.into_iter().map(|(key, value)| KvEntry { key: key.into(), value }).collect())
    }

    /// Drops every staged write.
    pub fn reset(&mut self) {
        self.staged.clear();
    }

    /// Applies every staged write to the store in one batch, then drops them.
    ///
    /// The staged writes are dropped even when the store rejects the batch.
    pub fn write_and_reset(&mut self) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        for ((context, key), value) in mem::take(&mut self.staged) {
            batch.push(context, key.into(), value);
        }
        self.store.write(batch)
    }

    fn ensure_writable(&self, context: Name) -> Result<(), StoreError> {
        if self.can_write(context) {
            Ok(())
        } else {
            Err(StoreError::ContextNotWritable { context })
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::bytes;

    use super::*;
    use crate::MemoryStore;

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    fn view(store: &Arc<MemoryStore>, privileged: bool) -> StoreView {
        StoreView::new(store.clone(), [name("mine")], privileged)
    }

    #[test]
    fn test_read_your_writes() {
        let store = Arc::new(MemoryStore::new());
        let mut view = view(&store, false);

        view.set(name("mine"), b"k", b"v1").unwrap();
        assert_eq!(view.get(name("mine"), b"k").unwrap(), Some(bytes!("7631")));
        assert_eq!(store.get(name("mine"), b"k").unwrap(), None);

        view.erase(name("mine"), b"k").unwrap();
        assert_eq!(view.get(name("mine"), b"k").unwrap(), None);
    }

    #[test]
    fn test_writes_limited_to_declared_contexts() {
        let store = Arc::new(MemoryStore::new());
        let mut view = view(&store, false);
        assert_eq!(
            view.set(name("theirs"), b"k", b"v").unwrap_err(),
            StoreError::ContextNotWritable { context: name("theirs") }
        );
        assert!(view.erase(name("theirs"), b"k").is_err());
        assert!(view.get(name("theirs"), b"k").unwrap().is_none());

        let mut privileged = self::view(&store, true);
        privileged.set(name("theirs"), b"k", b"v").unwrap();
    }

    #[test]
    fn test_reset_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let mut view = view(&store, false);
        view.set(name("mine"), b"k", b"v").unwrap();
        view.reset();
        view.reset();
        assert_eq!(view.staged_len(), 0);
        assert_eq!(view.get(name("mine"), b"k").unwrap(), None);
    }

    #[test]
    fn test_write_and_reset_applies_batch() {
        let store = Arc::new(MemoryStore::new());
        let mut view = view(&store, false);
        view.set(name("mine"), b"a", b"1").unwrap();
        view.set(name("mine"), b"b", b"2").unwrap();
        view.write_and_reset().unwrap();

        assert_eq!(view.staged_len(), 0);
        assert_eq!(store.commit_count(), 1);
        assert_eq!(store.get(name("mine"), b"b").unwrap(), Some(bytes!("32")));

        // An empty block still commits.
        view.write_and_reset().unwrap();
        assert_eq!(store.commit_count(), 2);
    }

    #[test]
    fn test_scan_merges_staged_writes() {
        let store = Arc::new(MemoryStore::new());
        let mut view = view(&store, false);
        view.set(name("mine"), b"p1", b"old").unwrap();
        view.set(name("mine"), b"p2", b"gone").unwrap();
        view.write_and_reset().unwrap();

        view.set(name("mine"), b"p1", b"new").unwrap();
        view.erase(name("mine"), b"p2").unwrap();
        view.set(name("mine"), b"p3", b"added").unwrap();
        view.set(name("mine"), b"q1", b"other").unwrap();

        let entries = view.scan(name("mine"), b"p").unwrap();
        let entries: Vec<_> =
            entries.iter().map(|e| (e.key.as_ref(), e.value.as_ref())).collect();
        assert_eq!(entries, vec![(&b"p1"[..], &b"new"[..]), (&b"p3"[..], &b"added"[..])]);
    }
}
