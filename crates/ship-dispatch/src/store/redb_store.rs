use std::path::Path;

use alloy_primitives::Bytes;
use redb::{Database, TableDefinition};

use crate::{
    constants::store::{CONTEXT_PREFIX_LEN, KV_TABLE_NAME},
    KvEntry, KvStore, Name, StoreError, WriteBatch,
};

const KV_TABLE: TableDefinition<'static, &[u8], &[u8]> = TableDefinition::new(KV_TABLE_NAME);

fn backend(err: impl Into<redb::Error>) -> StoreError {
    StoreError::Backend(err.into().to_string())
}

/// Table key: the context's value in big-endian so that a context's keys are contiguous.
fn table_key(context: Name, key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(CONTEXT_PREFIX_LEN + key.len());
    out.extend_from_slice(&context.value().to_be_bytes());
    out.extend_from_slice(key);
    out
}

/// A persistent [`KvStore`] backed by a single redb table.
///
/// Each [`WriteBatch`] is applied in one write transaction, so a batch is durable and visible in
/// full or not at all.
#[derive(Debug)]
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Opens the database at `path`, creating it and its table if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref()).map_err(backend)?;
        let write_txn = db.begin_write().map_err(backend)?;
        write_txn.open_table(KV_TABLE).map_err(backend)?;
        write_txn.commit().map_err(backend)?;
        Ok(Self { db })
    }
}

impl KvStore for RedbStore {
    fn get(&self, context: Name, key: &[u8]) -> Result<Option<Bytes>, StoreError> {
        let read_txn = self.db.begin_read().map_err(backend)?;
        let table = read_txn.open_table(KV_TABLE).map_err(backend)?;
        let value = table.get(table_key(context, key).as_slice()).map_err(backend)?;
        Ok(value.map(|value| Bytes::copy_from_slice(value.value())))
    }

    fn scan_prefix(&self, context: Name, prefix: &[u8]) -> Result<Vec<KvEntry>, StoreError> {
        let read_txn = self.db.begin_read().map_err(backend)?;
        let table = read_txn.open_table(KV_TABLE).map_err(backend)?;
        let start = table_key(context, prefix);

        let mut entries = Vec::new();
        for item in table.range(start.as_slice()..).map_err(backend)? {
            let (key, value) = item.map_err(backend)?;
            let key = key.value();
            if !key.starts_with(&start) {
                break;
            }
            entries.push(KvEntry {
                key: Bytes::copy_from_slice(&key[CONTEXT_PREFIX_LEN..]),
                value: Bytes::copy_from_slice(value.value()),
            });
        }
        Ok(entries)
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write().map_err(backend)?;
        {
            let mut table = write_txn.open_table(KV_TABLE).map_err(backend)?;
            for op in batch.into_ops() {
                let key = table_key(op.context, &op.key);
                match op.value {
                    Some(value) => {
                        table.insert(key.as_slice(), value.as_ref()).map_err(backend)?;
                    }
                    None => {
                        table.remove(key.as_slice()).map_err(backend)?;
                    }
                }
            }
        }
        write_txn.commit().map_err(backend)
    }
}
