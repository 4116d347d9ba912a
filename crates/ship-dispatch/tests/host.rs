//! Tests for the store and logging host functions, driven through a real sandbox instance.

use std::sync::Arc;

use alloy_primitives::Bytes;
use rstest::rstest;
use ship_dispatch::{
    constants::sandbox::ENTRY_POINT, test_utils::store_probe_wat, CapabilityTable,
    ExecutionContext, KvStore, MemoryStore, Name, StoreView,
};
use wasmtime::{Engine, Module};

fn ctx() -> Name {
    "probe".parse().unwrap()
}

fn probe(store: &Arc<MemoryStore>) -> ExecutionContext {
    let capabilities = CapabilityTable::new(&Engine::default()).unwrap();
    let module = Module::new(capabilities.engine(), store_probe_wat(ctx())).unwrap();
    capabilities.resolve(&module, &[]).unwrap();
    let view = StoreView::new(store.clone(), [ctx()], false);
    ExecutionContext::new(&capabilities, &module, "h1".parse().unwrap(), Bytes::new(), view)
        .unwrap()
}

fn run_block(context: &mut ExecutionContext, payload: &'static [u8]) {
    context.reset();
    context.load(Bytes::from_static(payload));
    context.invoke(ENTRY_POINT).unwrap();
    context.commit().unwrap();
}

fn stored_u32(store: &MemoryStore, key: &[u8]) -> Option<u32> {
    store
        .get(ctx(), key)
        .unwrap()
        .map(|value| u32::from_le_bytes(value.as_ref().try_into().unwrap()))
}

#[test]
fn test_kv_get_sees_committed_state() {
    let store = Arc::new(MemoryStore::new());
    let mut context = probe(&store);

    run_block(&mut context, b"b1");
    assert_eq!(stored_u32(&store, b"count"), Some(1));
    run_block(&mut context, b"b2");
    assert_eq!(stored_u32(&store, b"count"), Some(2));
}

#[test]
fn test_kv_scan_merges_staged_writes() {
    let store = Arc::new(MemoryStore::new());
    let mut context = probe(&store);

    // First block: only the staged `count` exists when scanning.
    run_block(&mut context, b"b1");
    assert_eq!(stored_u32(&store, b"seen"), Some(1));
    // Second block: committed `count` and `seen`.
    run_block(&mut context, b"b2");
    assert_eq!(stored_u32(&store, b"seen"), Some(2));
}

#[test]
fn test_kv_erase() {
    let store = Arc::new(MemoryStore::new());
    let mut context = probe(&store);

    run_block(&mut context, b"b1");
    run_block(&mut context, b"x2");
    assert_eq!(stored_u32(&store, b"count"), None);
    run_block(&mut context, b"b3");
    assert_eq!(stored_u32(&store, b"count"), Some(1));
}

#[rstest]
#[case::failed_assertion(b"a1", "assertion failed: count")]
#[case::abort(b"z1", "abort called")]
fn test_guest_failures_trap(#[case] payload: &'static [u8], #[case] reason: &str) {
    let store = Arc::new(MemoryStore::new());
    let mut context = probe(&store);
    run_block(&mut context, b"b1");

    context.reset();
    context.load(Bytes::from_static(payload));
    let trap = context.invoke(ENTRY_POINT).unwrap_err();
    assert_eq!(trap.reason, reason);

    context.reset();
    assert_eq!(store.commit_count(), 1);
    assert_eq!(stored_u32(&store, b"count"), Some(1));
}
