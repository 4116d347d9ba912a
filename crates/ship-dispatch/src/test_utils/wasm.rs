//! Handler modules in the wasm text format. Wasmtime compiles them directly.

use std::path::{Path, PathBuf};

use alloy_primitives::Bytes;

use crate::Name;

/// Allocation callback shared by the fixtures: a bump allocator at table index 0.
///
/// `cb_alloc_data` points at an 8-byte slot that receives the allocated `(ptr, len)`.
const ALLOCATOR: &str = r#"
  (table (export "__indirect_function_table") 1 funcref)
  (elem (i32.const 0) $alloc)
  (global $heap (mut i32) (i32.const 1024))
  (func $alloc (param $slot i32) (param $size i32) (result i32)
    (local $ptr i32)
    (local.set $ptr (global.get $heap))
    (global.set $heap (i32.add (global.get $heap) (local.get $size)))
    (i32.store (local.get $slot) (local.get $ptr))
    (i32.store offset=4 (local.get $slot) (local.get $size))
    (local.get $ptr))
"#;

/// A handler that records every block it sees.
///
/// For each block it stores, in `context`, key = payload and value = invocation counter
/// (u32 little-endian) followed by the raw `get_args` bytes. After staging that write it traps
/// with `unreachable` when the payload starts with `!`.
pub fn recording_handler_wat(context: Name) -> String {
    let context = context.value() as i64;
    format!(
        r#"(module
  (import "env" "get_args" (func $get_args (param i32 i32)))
  (import "env" "get_bin" (func $get_bin (param i32 i32)))
  (import "env" "kv_set" (func $kv_set (param i64 i32 i32 i32 i32)))
  (memory (export "memory") 1)
  {ALLOCATOR}
  (global $count (mut i32) (i32.const 0))
  (func (export "start") (param i32)
    (local $value i32)
    (global.set $heap (i32.const 1024))
    (global.set $count (i32.add (global.get $count) (i32.const 1)))
    ;; payload slot at 0, args slot at 8
    (call $get_bin (i32.const 0) (i32.const 0))
    (call $get_args (i32.const 8) (i32.const 0))
    (local.set $value (global.get $heap))
    (i32.store (local.get $value) (global.get $count))
    (memory.copy
      (i32.add (local.get $value) (i32.const 4))
      (i32.load (i32.const 8))
      (i32.load (i32.const 12)))
    (call $kv_set
      (i64.const {context})
      (i32.load (i32.const 0))
      (i32.load (i32.const 4))
      (local.get $value)
      (i32.add (i32.load (i32.const 12)) (i32.const 4)))
    (if (i32.gt_u (i32.load (i32.const 4)) (i32.const 0))
      (then
        (if (i32.eq (i32.load8_u (i32.load (i32.const 0))) (i32.const 33))
          (then unreachable))))))"#
    )
}

/// Splits a value written by [`recording_handler_wat`] into its counter and argument bytes.
pub fn recorded_value(value: &[u8]) -> (u32, Bytes) {
    let (count, args) = value.split_at(4);
    (u32::from_le_bytes(count.try_into().unwrap()), Bytes::copy_from_slice(args))
}

/// A handler exercising the store and logging host functions.
///
/// Per block, in `context`:
/// - increments the u32 stored under `count` (read back with `kv_get`),
/// - stores under `seen` the number of entries `kv_scan` finds for the empty prefix,
/// - logs `count` through `prints_l`,
/// - erases `count` when the payload starts with `x`,
/// - fails an `eosio_assert_message` when the payload starts with `a`,
/// - calls `abort` when the payload starts with `z`.
pub fn store_probe_wat(context: Name) -> String {
    let context = context.value() as i64;
    format!(
        r#"(module
  (import "env" "get_bin" (func $get_bin (param i32 i32)))
  (import "env" "kv_get" (func $kv_get (param i64 i32 i32 i32 i32) (result i32)))
  (import "env" "kv_set" (func $kv_set (param i64 i32 i32 i32 i32)))
  (import "env" "kv_erase" (func $kv_erase (param i64 i32 i32)))
  (import "env" "kv_scan" (func $kv_scan (param i64 i32 i32 i32 i32) (result i32)))
  (import "env" "prints_l" (func $prints_l (param i32 i32)))
  (import "env" "eosio_assert_message" (func $assert (param i32 i32 i32)))
  (import "env" "abort" (func $abort))
  (memory (export "memory") 1)
  (data (i32.const 512) "count")
  (data (i32.const 520) "seen")
  {ALLOCATOR}
  (func (export "start") (param i32)
    (local $count i32)
    (local $first i32)
    (global.set $heap (i32.const 1024))
    ;; count: value slot at 0, stored at 600
    (if (call $kv_get
          (i64.const {context}) (i32.const 512) (i32.const 5) (i32.const 0) (i32.const 0))
      (then (local.set $count (i32.load (i32.load (i32.const 0))))))
    (i32.store (i32.const 600) (i32.add (local.get $count) (i32.const 1)))
    (call $kv_set (i64.const {context}) (i32.const 512) (i32.const 5) (i32.const 600) (i32.const 4))
    ;; seen: scan slot at 8, stored at 604
    (i32.store (i32.const 604)
      (call $kv_scan
        (i64.const {context}) (i32.const 512) (i32.const 0) (i32.const 8) (i32.const 0)))
    (call $kv_set (i64.const {context}) (i32.const 520) (i32.const 4) (i32.const 604) (i32.const 4))
    (call $prints_l (i32.const 512) (i32.const 5))
    ;; payload slot at 16
    (call $get_bin (i32.const 16) (i32.const 0))
    (if (i32.gt_u (i32.load (i32.const 20)) (i32.const 0))
      (then (local.set $first (i32.load8_u (i32.load (i32.const 16))))))
    (if (i32.eq (local.get $first) (i32.const 120))
      (then (call $kv_erase (i64.const {context}) (i32.const 512) (i32.const 5))))
    (if (i32.eq (local.get $first) (i32.const 97))
      (then (call $assert (i32.const 0) (i32.const 512) (i32.const 5))))
    (if (i32.eq (local.get $first) (i32.const 122))
      (then (call $abort)))))"#
    )
}

/// A module importing a function the capability table does not provide.
pub fn unresolved_import_wat() -> String {
    r#"(module
  (import "env" "send_email" (func (param i32 i32)))
  (memory (export "memory") 1)
  (func (export "start") (param i32)))"#
        .to_string()
}

/// A module without the entry point.
pub fn missing_entry_wat() -> String {
    r#"(module
  (memory (export "memory") 1)
  (func (export "on_block") (param i32)))"#
        .to_string()
}

/// A module whose entry point takes no argument.
pub fn wrong_entry_signature_wat() -> String {
    r#"(module
  (memory (export "memory") 1)
  (func (export "start")))"#
        .to_string()
}

/// A module importing `get_bin` without exporting a function table for its allocation callback.
pub fn missing_table_wat() -> String {
    r#"(module
  (import "env" "get_bin" (func (param i32 i32)))
  (memory (export "memory") 1)
  (func (export "start") (param i32)))"#
        .to_string()
}

/// Writes `wat` to `dir/file_name` and returns the path.
pub fn write_module(dir: &Path, file_name: &str, wat: &str) -> PathBuf {
    let path = dir.join(file_name);
    std::fs::write(&path, wat).unwrap();
    path
}
