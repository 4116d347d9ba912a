//! Constants shared by the dispatcher, the sandbox bridge and the state-history transport.

/// Constants describing the sandbox import/export boundary.
pub mod sandbox {
    /// The single namespace every host function is registered under.
    pub const HOST_NAMESPACE: &str = "env";
    /// The exported function invoked once per delivered block.
    pub const ENTRY_POINT: &str = "start";
    /// The argument passed to [`ENTRY_POINT`]. Handlers must not interpret it.
    pub const ENTRY_ARGUMENT: u32 = 0;
    /// The exported linear memory every host function copies into.
    pub const MEMORY_EXPORT: &str = "memory";
    /// The exported function table the allocation callback index refers to.
    pub const FUNCTION_TABLE_EXPORT: &str = "__indirect_function_table";
}

/// Constants for the state-history protocol.
pub mod ship {
    /// Variant index of the status request.
    pub const STATUS_REQUEST_INDEX: u32 = 0;
    /// Variant index of the blocks request.
    pub const BLOCKS_REQUEST_INDEX: u32 = 1;
    /// Variant index of the blocks acknowledgement request.
    pub const BLOCKS_ACK_REQUEST_INDEX: u32 = 2;
    /// Variant index of the status result.
    pub const STATUS_RESULT_INDEX: u32 = 0;
    /// Variant index of the blocks result.
    pub const BLOCKS_RESULT_INDEX: u32 = 1;
    /// Block number meaning "no upper bound" in a blocks request.
    pub const UNBOUNDED_BLOCK_NUM: u32 = u32::MAX;
    /// Messages in flight meaning "never wait for acknowledgements".
    pub const UNBOUNDED_MESSAGES_IN_FLIGHT: u32 = u32::MAX;
}

/// Constants for the persistent store.
pub mod store {
    /// Name of the redb table holding every context's keys.
    pub const KV_TABLE_NAME: &str = "kv";
    /// Width of the context prefix on every persisted key.
    pub const CONTEXT_PREFIX_LEN: usize = 8;
}
