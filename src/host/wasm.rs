// Trusted WebAssembly host: compiles resolved source (text or binary form),
// runs its initialization in a per-module store, and wires registered entry
// points into the capability registry.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;
use tracing::debug;
use wasmtime::{Caller, Engine, Extern, Instance, Linker, Module, Store, TypedFunc};

use crate::error::LoaderError;
use crate::registry::{CapabilityDescriptor, CapabilityRegistry, InvokeFn, LaunchContext};

use super::traits::ModuleHost;

/// Import namespace the host exposes to every module.
const IMPORT_MODULE: &str = "loader";
/// Registration entry point within [`IMPORT_MODULE`]. Signature:
/// `(name_ptr, name_len, version_ptr, version_len, entry_ptr, entry_len)`.
const REGISTER_IMPORT: &str = "register";
/// Optional export run once right after instantiation.
const INIT_EXPORT: &str = "init";
/// Memory export a module must provide to register or be invoked.
const MEMORY_EXPORT: &str = "memory";

const WASM_PAGE: usize = 65_536;

/// Registration captured while a module's initialization runs.
struct PendingRegistration {
    name: String,
    version: String,
    entry: String,
}

#[derive(Default)]
struct HostState {
    pending: Vec<PendingRegistration>,
}

/// A retained instance. Dispatch is serialized through the mutex because a
/// store supports one caller at a time.
struct InstanceCell {
    store: Store<HostState>,
    instance: Instance,
    // Offset and capacity of the payload scratch region, once grown.
    scratch: Option<(usize, usize)>,
}

pub struct WasmHost {
    engine: Engine,
}

impl WasmHost {
    pub fn new() -> Self {
        Self {
            engine: Engine::default(),
        }
    }

    fn instantiate(&self, source: &str) -> Result<(Vec<PendingRegistration>, InstanceCell)> {
        let module = Module::new(&self.engine, source).context("compile module source")?;

        let mut linker: Linker<HostState> = Linker::new(&self.engine);
        linker.func_wrap(
            IMPORT_MODULE,
            REGISTER_IMPORT,
            |mut caller: Caller<'_, HostState>,
             name_ptr: i32,
             name_len: i32,
             version_ptr: i32,
             version_len: i32,
             entry_ptr: i32,
             entry_len: i32|
             -> Result<()> {
                let memory = caller
                    .get_export(MEMORY_EXPORT)
                    .and_then(Extern::into_memory)
                    .ok_or_else(|| anyhow!("register called without a memory export"))?;
                let (name, version, entry) = {
                    let data = memory.data(&caller);
                    (
                        guest_str(data, name_ptr, name_len)?.to_string(),
                        guest_str(data, version_ptr, version_len)?.to_string(),
                        guest_str(data, entry_ptr, entry_len)?.to_string(),
                    )
                };
                caller
                    .data_mut()
                    .pending
                    .push(PendingRegistration {
                        name,
                        version,
                        entry,
                    });
                Ok(())
            },
        )?;

        let mut store = Store::new(&self.engine, HostState::default());

        // The wasm start section runs during instantiation and may already
        // call register.
        let instance = linker
            .instantiate(&mut store, &module)
            .context("instantiate module")?;

        if let Some(init) = instance.get_func(&mut store, INIT_EXPORT) {
            let init = init
                .typed::<(), ()>(&store)
                .context("init export has a non-empty signature")?;
            init.call(&mut store, ()).context("init trapped")?;
        }

        let pending = std::mem::take(&mut store.data_mut().pending);
        Ok((
            pending,
            InstanceCell {
                store,
                instance,
                scratch: None,
            },
        ))
    }
}

impl Default for WasmHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleHost for WasmHost {
    fn execute(
        &self,
        name: &str,
        source: &str,
        registry: &CapabilityRegistry,
    ) -> Result<(), LoaderError> {
        let (pending, cell) =
            self.instantiate(source)
                .map_err(|e| LoaderError::ExecutionFailed {
                    name: name.to_string(),
                    reason: format!("{:#}", e),
                })?;

        if pending.is_empty() {
            debug!("module {} executed without registering anything", name);
            return Ok(());
        }

        // The instance stays alive for as long as any of its capabilities do.
        let cell = Arc::new(Mutex::new(cell));
        for registration in pending {
            let module = name.to_string();
            let entry = registration.entry;
            let cell = Arc::clone(&cell);
            let invoke: InvokeFn =
                Arc::new(move |context: &LaunchContext| dispatch(&cell, &module, &entry, context));
            registry.register(CapabilityDescriptor {
                name: registration.name,
                version: registration.version,
                invoke,
            });
        }
        Ok(())
    }
}

/// Serialize `context` into guest memory and call the entry export with the
/// payload's location.
fn dispatch(
    cell: &Mutex<InstanceCell>,
    module: &str,
    entry: &str,
    context: &LaunchContext,
) -> Result<()> {
    let payload = serde_json::to_vec(context).context("serialize launch context")?;

    let mut guard = cell.lock();
    let cell = &mut *guard;

    let memory = cell
        .instance
        .get_memory(&mut cell.store, MEMORY_EXPORT)
        .ok_or_else(|| anyhow!("module {} has no memory export", module))?;
    let entry_func: TypedFunc<(i32, i32), ()> = cell
        .instance
        .get_func(&mut cell.store, entry)
        .ok_or_else(|| anyhow!("module {} has no {} export", module, entry))?
        .typed(&cell.store)
        .with_context(|| format!("export {} has the wrong signature", entry))?;

    // Scratch pages sit past the module's own data and are reused across
    // dispatches, growing only when a payload outgrows them.
    let offset = match cell.scratch {
        Some((offset, capacity)) if payload.len() <= capacity => offset,
        _ => {
            let pages = payload.len().div_ceil(WASM_PAGE).max(1);
            let previous = memory
                .grow(&mut cell.store, pages as u64)
                .context("grow guest memory")?;
            let offset = previous as usize * WASM_PAGE;
            cell.scratch = Some((offset, pages * WASM_PAGE));
            offset
        }
    };

    memory
        .write(&mut cell.store, offset, &payload)
        .context("write launch context")?;

    let ptr = i32::try_from(offset).context("payload offset exceeds i32 range")?;
    let len = i32::try_from(payload.len()).context("payload length exceeds i32 range")?;
    entry_func
        .call(&mut cell.store, (ptr, len))
        .with_context(|| format!("export {} trapped", entry))?;
    Ok(())
}

/// Borrow a UTF-8 string out of guest memory, bounds-checked.
fn guest_str(data: &[u8], ptr: i32, len: i32) -> Result<&str> {
    let start = usize::try_from(ptr).map_err(|_| anyhow!("negative guest pointer"))?;
    let len = usize::try_from(len).map_err(|_| anyhow!("negative guest length"))?;
    let end = start
        .checked_add(len)
        .ok_or_else(|| anyhow!("guest range overflows"))?;
    let bytes = data
        .get(start..end)
        .ok_or_else(|| anyhow!("guest range {}..{} outside memory", start, end))?;
    std::str::from_utf8(bytes).context("guest string is not UTF-8")
}
