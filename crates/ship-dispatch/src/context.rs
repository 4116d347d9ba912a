use core::fmt;

use alloy_primitives::Bytes;
use wasmtime::{Instance, Module, Store};

use crate::{
    constants::sandbox::{ENTRY_ARGUMENT, ENTRY_POINT},
    BlockHandler, CapabilityTable, ConfigError, ExecutionTrap, HostState, Name, StoreError,
    StoreView,
};

/// One handler's sandbox instance and host state, reused for every block of a session.
///
/// Per block the session runs [`reset`](Self::reset), [`load`](Self::load),
/// [`invoke`](Self::invoke) and, only when the invocation succeeded, [`commit`](Self::commit).
pub struct ExecutionContext {
    store: Store<HostState>,
    instance: Instance,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("handler", &self.handler())
            .field("payload_len", &self.payload().len())
            .field("staged", &self.view().staged_len())
            .finish_non_exhaustive()
    }
}

impl ExecutionContext {
    /// Instantiates `module` for `handler` with frozen `args` and an empty payload.
    pub fn new(
        capabilities: &CapabilityTable,
        module: &Module,
        handler: Name,
        args: Bytes,
        view: StoreView,
    ) -> Result<Self, ConfigError> {
        let (store, instance) =
            capabilities.instantiate(module, HostState::new(handler, args, view))?;
        Ok(Self { store, instance })
    }

    /// The handler this context runs.
    pub fn handler(&self) -> Name {
        self.store.data().handler
    }

    /// The frozen invocation arguments.
    pub fn args(&self) -> &Bytes {
        &self.store.data().args
    }

    /// The payload of the block being processed.
    pub fn payload(&self) -> &Bytes {
        &self.store.data().payload
    }

    /// The handler's staged view of the store.
    pub fn view(&self) -> &StoreView {
        &self.store.data().view
    }

    /// Drops staged writes and the current payload. Arguments and the instance are kept.
    pub fn reset(&mut self) {
        let state = self.store.data_mut();
        state.view.reset();
        state.payload = Bytes::new();
    }

    /// Sets the payload `get_bin` hands to the handler.
    pub fn load(&mut self, payload: Bytes) {
        self.store.data_mut().payload = payload;
    }

    /// Runs the exported function `entry_point` with the fixed entry argument.
    ///
    /// Any fault inside the sandbox, including a failed host function, is an [`ExecutionTrap`].
    pub fn invoke(&mut self, entry_point: &str) -> Result<(), ExecutionTrap> {
        let handler = self.handler();
        let trap = |err: wasmtime::Error| ExecutionTrap {
            handler,
            entry_point: entry_point.to_string(),
            block_num: None,
            reason: err.root_cause().to_string(),
        };
        let func =
            self.instance.get_typed_func::<u32, ()>(&mut self.store, entry_point).map_err(trap)?;
        func.call(&mut self.store, ENTRY_ARGUMENT).map_err(trap)
    }

    /// Atomically applies the staged writes, then resets.
    ///
    /// The staged writes are dropped even when the store rejects them.
    pub fn commit(&mut self) -> Result<(), StoreError> {
        let result = self.store.data_mut().view.write_and_reset();
        self.reset();
        result
    }
}

impl BlockHandler for ExecutionContext {
    fn name(&self) -> Name {
        self.handler()
    }

    fn reset(&mut self) {
        Self::reset(self)
    }

    fn load(&mut self, payload: Bytes) {
        Self::load(self, payload)
    }

    fn invoke(&mut self) -> Result<(), ExecutionTrap> {
        Self::invoke(self, ENTRY_POINT)
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        Self::commit(self)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy_primitives::bytes;
    use wasmtime::Engine;

    use super::*;
    use crate::{
        encode_args,
        test_utils::{recorded_value, recording_handler_wat},
        KvStore, MemoryStore,
    };

    fn context(store: &Arc<MemoryStore>) -> ExecutionContext {
        let ctx: Name = "ctx".parse().unwrap();
        let capabilities = CapabilityTable::new(&Engine::default()).unwrap();
        let module = Module::new(capabilities.engine(), recording_handler_wat(ctx)).unwrap();
        let view = StoreView::new(store.clone(), [ctx], false);
        let args = encode_args(&["x"]).unwrap();
        ExecutionContext::new(&capabilities, &module, "h1".parse().unwrap(), args, view).unwrap()
    }

    #[test]
    fn test_block_cycle_commits_once() {
        let store = Arc::new(MemoryStore::new());
        let mut context = context(&store);
        assert!(context.payload().is_empty());

        context.reset();
        context.load(bytes!("b0"));
        context.invoke(ENTRY_POINT).unwrap();
        assert_eq!(context.view().staged_len(), 1);
        context.commit().unwrap();

        assert_eq!(store.commit_count(), 1);
        assert!(context.payload().is_empty());
        let value = store.get("ctx".parse().unwrap(), &[0xb0]).unwrap().unwrap();
        assert_eq!(recorded_value(&value), (1, encode_args(&["x"]).unwrap()));
    }

    #[test]
    fn test_reset_discards_previous_block() {
        let store = Arc::new(MemoryStore::new());
        let mut context = context(&store);
        context.load(bytes!("b0"));
        context.invoke(ENTRY_POINT).unwrap();
        context.reset();
        context.reset();

        assert_eq!(context.view().staged_len(), 0);
        assert_eq!(context.args(), &encode_args(&["x"]).unwrap());
    }

    #[test]
    fn test_trap_is_reported() {
        let store = Arc::new(MemoryStore::new());
        let mut context = context(&store);
        context.load(bytes!("21"));
        let trap = context.invoke(ENTRY_POINT).unwrap_err();

        assert_eq!(trap.handler, "h1".parse().unwrap());
        assert_eq!(trap.entry_point, ENTRY_POINT);
        assert!(trap.reason.contains("unreachable"), "{}", trap.reason);
    }

    #[test]
    fn test_missing_entry_point_traps() {
        let store = Arc::new(MemoryStore::new());
        let mut context = context(&store);
        let trap = context.invoke("nope").unwrap_err();
        assert_eq!(trap.entry_point, "nope");
    }
}
