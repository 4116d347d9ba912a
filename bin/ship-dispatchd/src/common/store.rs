use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use ship_dispatch::{KvStore, MemoryStore, RedbStore, StoreError};

/// Store configuration arguments
#[derive(Parser, Debug, Clone)]
pub struct StoreArgs {
    /// Path of the redb database handler state is kept in. Created if missing.
    #[arg(long = "store.path", default_value = "ship-dispatch.redb", conflicts_with = "memory")]
    pub path: PathBuf,

    /// Keep handler state in memory only. Nothing survives the process.
    #[arg(long = "store.memory")]
    pub memory: bool,
}

impl StoreArgs {
    /// Opens the configured store.
    pub fn open(&self) -> Result<Arc<dyn KvStore>, StoreError> {
        if self.memory {
            tracing::info!("Using in-memory store");
            return Ok(Arc::new(MemoryStore::new()));
        }
        tracing::info!(path = %self.path.display(), "Opening store");
        Ok(Arc::new(RedbStore::open(&self.path)?))
    }
}
