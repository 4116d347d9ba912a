//! The capability table: the only bridge between a sandboxed handler and host state.
//!
//! Every host function lives in the [`HOST_NAMESPACE`] namespace and works on sandbox offsets.
//! Data flowing into the sandbox goes through the module's own allocation callback: the host
//! calls `cb_alloc(cb_alloc_data, size)`, bounds-checks the returned offset and copies exactly
//! `size` bytes there. No native address ever crosses the boundary.

use core::fmt;

use alloy_primitives::Bytes;
use wasmtime::{Engine, ExternType, Instance, Linker, Module, Store, ValType};

use crate::{
    constants::sandbox::{ENTRY_POINT, FUNCTION_TABLE_EXPORT, HOST_NAMESPACE, MEMORY_EXPORT},
    ConfigError, LengthOverflow, Name, StoreError, StoreView,
};

mod functions;

/// Names of the host functions a module may import from [`HOST_NAMESPACE`].
pub const HOST_FUNCTIONS: &[&str] = &[
    "get_args",
    "get_bin",
    "kv_get",
    "kv_set",
    "kv_erase",
    "kv_scan",
    "abort",
    "eosio_assert_message",
    "prints_l",
];

/// Host functions that hand data to the module through its allocation callback.
pub const ALLOCATING_FUNCTIONS: &[&str] = &["get_args", "get_bin", "kv_get", "kv_scan"];

/// Host state reachable from host functions for one handler instance.
#[derive(Debug)]
pub struct HostState {
    /// The handler the instance belongs to.
    pub handler: Name,
    /// Frozen invocation arguments.
    pub args: Bytes,
    /// Payload of the block being processed. Empty before the first block.
    pub payload: Bytes,
    /// The handler's staged view of the store.
    pub view: StoreView,
}

impl HostState {
    /// Creates the host state for a handler with an empty payload.
    pub fn new(handler: Name, args: Bytes, view: StoreView) -> Self {
        Self { handler, args, payload: Bytes::new(), view }
    }
}

/// A failure inside a host function. Traps the running invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The module does not export something the host function needs.
    #[error("module does not export `{0}`")]
    MissingExport(&'static str),
    /// The allocation callback index does not name a function.
    #[error("allocation callback {0} is not a function")]
    InvalidCallback(u32),
    /// A sandbox range lies outside linear memory.
    #[error("memory access out of bounds: offset {offset}, length {len}")]
    OutOfBounds {
        /// Start of the range
        offset: u64,
        /// Length of the range
        len: u64,
    },
    /// Data to copy into the sandbox does not fit a 32-bit size.
    #[error("{0} bytes do not fit in sandbox memory")]
    TooLarge(usize),
    /// A store access failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The handler called `abort`.
    #[error("abort called")]
    Abort,
    /// The handler failed an assertion.
    #[error("assertion failed: {0}")]
    AssertionFailed(String),
}

impl From<LengthOverflow> for HostError {
    fn from(err: LengthOverflow) -> Self {
        Self::TooLarge(err.0)
    }
}

/// The fixed set of host functions, built once per [`Engine`] and shared by every handler.
pub struct CapabilityTable {
    linker: Linker<HostState>,
}

impl fmt::Debug for CapabilityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityTable").field("functions", &HOST_FUNCTIONS).finish()
    }
}

impl CapabilityTable {
    /// Registers every host function against `engine`.
    pub fn new(engine: &Engine) -> Result<Self, ConfigError> {
        let mut linker = Linker::new(engine);
        functions::register(&mut linker)
            .map_err(|err| ConfigError::CapabilityTable(format!("{err:#}")))?;
        Ok(Self { linker })
    }

    /// The engine modules must be compiled with.
    pub fn engine(&self) -> &Engine {
        self.linker.engine()
    }

    /// Checks `module` against the table.
    ///
    /// Every import must be one of [`HOST_FUNCTIONS`]. The module must export its memory, the
    /// entry point as `start(i32)` and every function named in `handler_names`. A module importing
    /// any of [`ALLOCATING_FUNCTIONS`] must also export its function table.
    pub fn resolve(&self, module: &Module, handler_names: &[String]) -> Result<(), ConfigError> {
        let mut allocates = false;
        for import in module.imports() {
            let known = import.module() == HOST_NAMESPACE &&
                HOST_FUNCTIONS.contains(&import.name()) &&
                matches!(import.ty(), ExternType::Func(_));
            if !known {
                return Err(ConfigError::UnresolvedImport {
                    module: import.module().to_string(),
                    name: import.name().to_string(),
                });
            }
            allocates |= ALLOCATING_FUNCTIONS.contains(&import.name());
        }

        let export = |name: &str| module.get_export(name);
        if !matches!(export(MEMORY_EXPORT), Some(ExternType::Memory(_))) {
            return Err(ConfigError::MissingExport {
                kind: "memory",
                name: MEMORY_EXPORT.to_string(),
            });
        }
        let functions =
            core::iter::once(ENTRY_POINT).chain(handler_names.iter().map(String::as_str));
        for name in functions {
            if !matches!(export(name), Some(ExternType::Func(_))) {
                return Err(ConfigError::MissingExport { kind: "function", name: name.to_string() });
            }
        }
        if let Some(ExternType::Func(ty)) = export(ENTRY_POINT) {
            let mut params = ty.params();
            let takes_i32 = matches!(params.next(), Some(ValType::I32)) && params.next().is_none();
            if !takes_i32 || ty.results().len() != 0 {
                return Err(ConfigError::InvalidSignature {
                    name: ENTRY_POINT.to_string(),
                    expected: "(i32) -> ()",
                });
            }
        }
        if allocates && !matches!(export(FUNCTION_TABLE_EXPORT), Some(ExternType::Table(_))) {
            return Err(ConfigError::MissingExport {
                kind: "table",
                name: FUNCTION_TABLE_EXPORT.to_string(),
            });
        }
        Ok(())
    }

    /// Instantiates `module` with `state` as its host state.
    pub fn instantiate(
        &self,
        module: &Module,
        state: HostState,
    ) -> Result<(Store<HostState>, Instance), ConfigError> {
        let mut store = Store::new(self.engine(), state);
        let instance = self
            .linker
            .instantiate(&mut store, module)
            .map_err(|err| ConfigError::Instantiation(format!("{err:#}")))?;
        Ok((store, instance))
    }
}
