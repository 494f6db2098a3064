//! glbridge runtime
//!
//! This crate hosts a wasm32 module compiled against a POSIX-like threading
//! and C ABI, and lets it drive a WebGL2-style graphics context. The module
//! only sees a shared linear memory and a fixed catalogue of imports; the
//! bridge translates those imports into host calls.
//!
//! # Architecture
//!
//! - `memory`: typed and string marshaling over linear memory
//! - `allocator`: guest allocator hooks (`_malloc` / `_free` exports)
//! - `handles`: dense per-kind handle tables for host graphics objects
//! - `gl`: the graphics binding (one method per bound operation)
//! - `setjmp`: setjmp/longjmp registration emulation
//! - `quad`: binary128 float emulation with `f64` stand-in arithmetic
//! - `catalogue`: the closed import catalogue with declared signatures
//! - `linker`: registers the catalogue on a `wasmtime::Linker` and dispatches
//! - `threads`: wasi-threads style spawning of worker execution contexts
//! - `context`: per-store execution context state
//! - `engine`: engine setup and the main-context boot sequence

pub mod allocator;
pub mod catalogue;
pub mod context;
pub mod engine;
pub mod gl;
pub mod handles;
pub mod linker;
pub mod memory;
pub mod quad;
pub mod setjmp;
pub mod threads;

pub use allocator::{BumpAllocator, GuestAllocator};
pub use catalogue::{Import, ImportGroup};
pub use context::{ContextRole, ContextState};
pub use engine::{Bridge, LinkerHook, MainContext};
pub use gl::{GlBinding, ProgramBinding};
pub use handles::{HandleKind, HandleTable};
pub use memory::{GuestMemory, LinearMemory, MemoryError, Value, ValueKind};
pub use threads::{ThreadBoot, ThreadDescriptor, ThreadOutcome, ThreadRegistry, ThreadSpawner};

pub use glbridge_graphics as graphics;

/// Error raised by a single import call.
///
/// Every variant aborts the call that produced it; the calling context traps.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    /// The call referenced a handle that was never allocated or was released.
    #[error("unknown {kind} handle {handle}")]
    HandleNotFound { kind: HandleKind, handle: u32 },
    /// An enumeration or flag outside its accepted closed set.
    #[error("{op}: invalid argument: {detail}")]
    InvalidArgument { op: &'static str, detail: String },
    /// The binding is intentionally stubbed.
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
    /// No graphics context is attached to the calling execution context.
    #[error("{0}: graphics context is not available in this execution context")]
    HostNotReady(&'static str),
    /// The guest allocator returned a null pointer.
    #[error("guest allocation of {size} bytes failed")]
    AllocationFailure { size: u32 },
    /// Linear memory access failed.
    #[error(transparent)]
    Memory(#[from] MemoryError),
    /// The host graphics context refused to create an object.
    #[error("{0}: host refused to create the object")]
    HostRefused(&'static str),
    /// A call back into the guest (allocator export) failed.
    #[error("guest export `{export}` failed: {message}")]
    GuestCall { export: String, message: String },
}

/// Error raised while booting an execution context.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BootError {
    #[error("module compilation failed: {0}")]
    Compile(String),
    #[error("shared memory creation failed: {0}")]
    Memory(String),
    #[error("import linking failed: {0}")]
    Link(String),
    #[error("instantiation failed: {0}")]
    Instantiate(String),
    #[error("module does not export `{0}`")]
    MissingExport(String),
    /// The entry export started running and trapped.
    #[error("`{export}` trapped: {message}")]
    Trap {
        export: String,
        message: String,
        /// Set when the trap was raised by a failing import call.
        bridge: Option<BridgeError>,
    },
}

impl BootError {
    /// Whether the failure happened before the entry export ran.
    pub fn is_boot_failure(&self) -> bool {
        !matches!(self, BootError::Trap { .. })
    }

    pub(crate) fn trap(export: &str, err: wasmtime::Error) -> Self {
        BootError::Trap {
            export: export.to_string(),
            message: format!("{err:#}"),
            bridge: err.downcast_ref::<BridgeError>().cloned(),
        }
    }
}

/// Bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct BridgeConfig {
    /// Initial shared memory size in 64 KiB pages.
    pub initial_memory_pages: u32,
    /// Maximum shared memory size in pages (shared memories need one).
    pub maximum_memory_pages: u32,
    /// Export used to allocate guest memory.
    pub malloc_export: String,
    /// Export used to release guest memory.
    pub free_export: String,
    /// Export every spawned thread enters with `(tid, start_arg)`.
    pub thread_start_export: String,
    /// Export the main context runs.
    pub entry_export: String,
    /// Trace every import call with its raw arguments.
    pub trace_imports: bool,
    /// Define imports missing from the catalogue as traps instead of
    /// failing instantiation.
    pub trap_unknown_imports: bool,
    /// OS thread name prefix for spawned contexts.
    pub thread_name_prefix: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            initial_memory_pages: 17,   // 1.06 MB
            maximum_memory_pages: 17,
            malloc_export: "_malloc".into(),
            free_export: "_free".into(),
            thread_start_export: "wasi_thread_start".into(),
            entry_export: "_start".into(),
            trace_imports: false,
            trap_unknown_imports: false,
            thread_name_prefix: "glbridge-thread".into(),
        }
    }
}

impl BridgeConfig {
    /// Check the memory limits before any store is created.
    pub fn validate(&self) -> Result<(), BootError> {
        if self.initial_memory_pages > self.maximum_memory_pages {
            return Err(BootError::Memory(format!(
                "initial pages {} exceed maximum pages {}",
                self.initial_memory_pages, self.maximum_memory_pages
            )));
        }
        if self.maximum_memory_pages > memory::MAX_PAGES {
            return Err(BootError::Memory(format!(
                "maximum pages {} exceed the wasm32 limit of {}",
                self.maximum_memory_pages,
                memory::MAX_PAGES
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_threaded_module_layout() {
        let config = BridgeConfig::default();
        assert_eq!(config.initial_memory_pages, 17);
        assert_eq!(config.maximum_memory_pages, 17);
        assert_eq!(config.malloc_export, "_malloc");
        assert_eq!(config.thread_start_export, "wasi_thread_start");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_rejects_inverted_limits() {
        let config = BridgeConfig {
            initial_memory_pages: 32,
            maximum_memory_pages: 16,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BootError::Memory(_))));
    }

    #[test]
    fn bridge_error_survives_wasmtime_error_round_trip() {
        let err = wasmtime::Error::new(BridgeError::NotImplemented("glScissor"));
        let boot = BootError::trap("_start", err);
        match boot {
            BootError::Trap { bridge, .. } => {
                assert_eq!(bridge, Some(BridgeError::NotImplemented("glScissor")));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
