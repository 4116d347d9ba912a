use wasmtime::{Caller, Extern, Linker, Memory, Ref};

use super::{HostError, HostState};
use crate::{
    codec::{write_bytes, write_varuint32},
    constants::sandbox::{FUNCTION_TABLE_EXPORT, HOST_NAMESPACE, MEMORY_EXPORT},
    Name,
};

pub(super) fn register(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
    linker.func_wrap(
        HOST_NAMESPACE,
        "get_args",
        |mut caller: Caller<'_, HostState>, cb_alloc_data: u32, cb_alloc: u32| {
            let args = caller.data().args.clone();
            set_data(&mut caller, cb_alloc_data, cb_alloc, &args)
        },
    )?;
    linker.func_wrap(
        HOST_NAMESPACE,
        "get_bin",
        |mut caller: Caller<'_, HostState>, cb_alloc_data: u32, cb_alloc: u32| {
            let payload = caller.data().payload.clone();
            set_data(&mut caller, cb_alloc_data, cb_alloc, &payload)
        },
    )?;

    linker.func_wrap(
        HOST_NAMESPACE,
        "kv_get",
        |mut caller: Caller<'_, HostState>,
         context: u64,
         key: u32,
         key_len: u32,
         cb_alloc_data: u32,
         cb_alloc: u32|
         -> wasmtime::Result<u32> {
            let key = read_bytes(&mut caller, key, key_len)?;
            let value =
                caller.data().view.get(Name::from(context), &key).map_err(HostError::from)?;
            match value {
                Some(value) => {
                    set_data(&mut caller, cb_alloc_data, cb_alloc, &value)?;
                    Ok(1)
                }
                None => Ok(0),
            }
        },
    )?;
    linker.func_wrap(
        HOST_NAMESPACE,
        "kv_set",
        |mut caller: Caller<'_, HostState>,
         context: u64,
         key: u32,
         key_len: u32,
         value: u32,
         value_len: u32|
         -> wasmtime::Result<()> {
            let key = read_bytes(&mut caller, key, key_len)?;
            let value = read_bytes(&mut caller, value, value_len)?;
            let context = Name::from(context);
            caller.data_mut().view.set(context, &key, &value).map_err(HostError::from)?;
            Ok(())
        },
    )?;
    linker.func_wrap(
        HOST_NAMESPACE,
        "kv_erase",
        |mut caller: Caller<'_, HostState>,
         context: u64,
         key: u32,
         key_len: u32|
         -> wasmtime::Result<()> {
            let key = read_bytes(&mut caller, key, key_len)?;
            caller.data_mut().view.erase(Name::from(context), &key).map_err(HostError::from)?;
            Ok(())
        },
    )?;
    linker.func_wrap(
        HOST_NAMESPACE,
        "kv_scan",
        |mut caller: Caller<'_, HostState>,
         context: u64,
         prefix: u32,
         prefix_len: u32,
         cb_alloc_data: u32,
         cb_alloc: u32|
         -> wasmtime::Result<u32> {
            let prefix = read_bytes(&mut caller, prefix, prefix_len)?;
            let entries =
                caller.data().view.scan(Name::from(context), &prefix).map_err(HostError::from)?;
            let count =
                u32::try_from(entries.len()).map_err(|_| HostError::TooLarge(entries.len()))?;

            // vector<pair<bytes, bytes>>
            let mut out = Vec::new();
            write_varuint32(&mut out, count);
            for entry in &entries {
                write_bytes(&mut out, &entry.key).map_err(HostError::from)?;
                write_bytes(&mut out, &entry.value).map_err(HostError::from)?;
            }
            set_data(&mut caller, cb_alloc_data, cb_alloc, &out)?;
            Ok(count)
        },
    )?;

    linker.func_wrap(HOST_NAMESPACE, "abort", |_: Caller<'_, HostState>| -> wasmtime::Result<()> {
        Err(HostError::Abort.into())
    })?;
    linker.func_wrap(
        HOST_NAMESPACE,
        "eosio_assert_message",
        |mut caller: Caller<'_, HostState>,
         test: u32,
         msg: u32,
         msg_len: u32|
         -> wasmtime::Result<()> {
            if test != 0 {
                return Ok(());
            }
            let msg = read_bytes(&mut caller, msg, msg_len)?;
            Err(HostError::AssertionFailed(String::from_utf8_lossy(&msg).into_owned()).into())
        },
    )?;
    linker.func_wrap(
        HOST_NAMESPACE,
        "prints_l",
        |mut caller: Caller<'_, HostState>, msg: u32, len: u32| -> wasmtime::Result<()> {
            let msg = read_bytes(&mut caller, msg, len)?;
            let handler = caller.data().handler;
            let line = String::from_utf8_lossy(&msg);
            tracing::info!(target: "ship_dispatch::guest", %handler, "{line}");
            Ok(())
        },
    )?;

    Ok(())
}

fn memory(caller: &mut Caller<'_, HostState>) -> Result<Memory, HostError> {
    caller
        .get_export(MEMORY_EXPORT)
        .and_then(Extern::into_memory)
        .ok_or(HostError::MissingExport(MEMORY_EXPORT))
}

/// Copies `len` bytes at sandbox offset `ptr` out of linear memory.
fn read_bytes(
    caller: &mut Caller<'_, HostState>,
    ptr: u32,
    len: u32,
) -> Result<Vec<u8>, HostError> {
    let memory = memory(caller)?;
    let out_of_bounds = HostError::OutOfBounds { offset: ptr.into(), len: len.into() };
    let start = ptr as usize;
    let end = start.checked_add(len as usize).ok_or_else(|| out_of_bounds.clone())?;
    memory.data(&*caller).get(start..end).map(<[u8]>::to_vec).ok_or(out_of_bounds)
}

/// Hands `data` to the sandbox: asks the module's allocation callback for `data.len()` bytes and
/// copies `data` to the offset it returns.
fn set_data(
    caller: &mut Caller<'_, HostState>,
    cb_alloc_data: u32,
    cb_alloc: u32,
    data: &[u8],
) -> wasmtime::Result<()> {
    let size = u32::try_from(data.len()).map_err(|_| HostError::TooLarge(data.len()))?;
    let table = caller
        .get_export(FUNCTION_TABLE_EXPORT)
        .and_then(Extern::into_table)
        .ok_or(HostError::MissingExport(FUNCTION_TABLE_EXPORT))?;
    let alloc = match table.get(&mut *caller, cb_alloc.into()) {
        Some(Ref::Func(Some(func))) => func,
        _ => return Err(HostError::InvalidCallback(cb_alloc).into()),
    };
    let ptr =
        alloc.typed::<(u32, u32), u32>(&*caller)?.call(&mut *caller, (cb_alloc_data, size))?;

    memory(caller)?
        .write(&mut *caller, ptr as usize, data)
        .map_err(|_| HostError::OutOfBounds { offset: ptr.into(), len: size.into() })?;
    Ok(())
}
