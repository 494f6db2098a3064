//! Engine configuration and the main-context boot sequence.
//!
//! A [`Bridge`] owns the wasmtime engine (threads enabled) and the bridge
//! configuration. Booting a compiled module creates the shared memory, the
//! thread spawner and the main execution context; the graphics context can
//! be supplied at boot or attached later.

use std::fmt;
use std::sync::Arc;

use log::debug;
use wasmtime::{Engine, Instance, Linker, MemoryType, Module, SharedMemory, Store, Val};

use glbridge_graphics::GraphicsContext;

use crate::context::{ContextRole, ContextState};
use crate::gl::GlBinding;
use crate::linker;
use crate::threads::{ThreadOutcome, ThreadRegistry, ThreadSpawner};
use crate::{BootError, BridgeConfig};

/// Extra linker setup run for every execution context, main and spawned.
///
/// This is where an embedder links its POSIX/WASI shim.
pub type LinkerHook =
    Arc<dyn Fn(&mut Linker<ContextState>) -> wasmtime::Result<()> + Send + Sync>;

/// Engine and configuration shared by every context of one module.
#[derive(Clone)]
pub struct Bridge {
    engine: Engine,
    config: Arc<BridgeConfig>,
    hook: Option<LinkerHook>,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Result<Self, BootError> {
        config.validate()?;

        let mut engine_config = wasmtime::Config::new();
        engine_config.wasm_threads(true);
        let engine =
            Engine::new(&engine_config).map_err(|err| BootError::Compile(format!("{err:#}")))?;

        Ok(Bridge {
            engine,
            config: Arc::new(config),
            hook: None,
        })
    }

    /// Install the linker hook used by every context booted afterwards.
    pub fn with_linker_hook(mut self, hook: LinkerHook) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Compile a module from binary or text format.
    pub fn compile(&self, bytes: &[u8]) -> Result<Module, BootError> {
        Module::new(&self.engine, bytes).map_err(|err| BootError::Compile(format!("{err:#}")))
    }

    /// Boot the main execution context.
    ///
    /// Nothing runs yet apart from the module's start function; call
    /// [`MainContext::run`] to enter the entry export.
    pub fn boot(
        &self,
        module: &Module,
        graphics: Option<Box<dyn GraphicsContext>>,
    ) -> Result<MainContext, BootError> {
        let memory = SharedMemory::new(
            &self.engine,
            MemoryType::shared(
                self.config.initial_memory_pages,
                self.config.maximum_memory_pages,
            ),
        )
        .map_err(|err| BootError::Memory(format!("{err:#}")))?;

        let spawner = ThreadSpawner::new(
            self.engine.clone(),
            module.clone(),
            memory.clone(),
            self.config.clone(),
            self.hook.clone(),
        );
        let mut state = ContextState::new(
            ContextRole::Main,
            self.config.clone(),
            memory.clone(),
            spawner.clone(),
        );
        if let Some(graphics) = graphics {
            state.set_gl(GlBinding::new(graphics));
        }

        let mut store = Store::new(&self.engine, state);
        let instance = linker::instantiate(&mut store, module, self.hook.as_ref())?;
        debug!(
            "main context booted ({} pages of shared memory)",
            self.config.initial_memory_pages
        );

        Ok(MainContext {
            store,
            instance,
            memory,
            spawner,
        })
    }

    /// Compile and boot in one step.
    pub fn load(
        &self,
        bytes: &[u8],
        graphics: Option<Box<dyn GraphicsContext>>,
    ) -> Result<MainContext, BootError> {
        let module = self.compile(bytes)?;
        self.boot(&module, graphics)
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.config)
            .field("hook", &self.hook.is_some())
            .finish_non_exhaustive()
    }
}

/// The main execution context of a booted module.
pub struct MainContext {
    store: Store<ContextState>,
    instance: Instance,
    memory: SharedMemory,
    spawner: ThreadSpawner,
}

impl MainContext {
    /// Supply (or replace) the graphics context.
    pub fn attach_graphics(&mut self, graphics: Box<dyn GraphicsContext>) {
        self.store.data_mut().set_gl(GlBinding::new(graphics));
        debug!("graphics context attached");
    }

    /// Remove the graphics context, dropping every handle table.
    pub fn detach_graphics(&mut self) -> Option<Box<dyn GraphicsContext>> {
        self.store.data_mut().remove_gl().map(GlBinding::into_host)
    }

    pub fn gl(&self) -> Option<&GlBinding> {
        self.store.data().gl()
    }

    /// The attached graphics context as its concrete type.
    pub fn graphics<T: 'static>(&self) -> Option<&T> {
        self.gl().and_then(|gl| gl.host_as::<T>())
    }

    pub fn graphics_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.store
            .data_mut()
            .gl_mut()
            .and_then(|gl| gl.host_as_mut::<T>())
    }

    /// Run the configured entry export, `() -> ()`.
    pub fn run(&mut self) -> Result<(), BootError> {
        let entry = self.store.data().config().entry_export.clone();
        let func = self
            .instance
            .get_typed_func::<(), ()>(&mut self.store, &entry)
            .map_err(|_| BootError::MissingExport(entry.clone()))?;
        func.call(&mut self.store, ())
            .map_err(|err| BootError::trap(&entry, err))
    }

    /// Call any export with untyped values.
    pub fn call(&mut self, export: &str, params: &[Val]) -> Result<Vec<Val>, BootError> {
        let func = self
            .instance
            .get_func(&mut self.store, export)
            .ok_or_else(|| BootError::MissingExport(export.to_string()))?;
        let mut results = vec![Val::I32(0); func.ty(&self.store).results().len()];
        func.call(&mut self.store, params, &mut results)
            .map_err(|err| BootError::trap(export, err))?;
        Ok(results)
    }

    pub fn memory(&self) -> &SharedMemory {
        &self.memory
    }

    pub fn instance(&self) -> Instance {
        self.instance
    }

    pub fn store(&self) -> &Store<ContextState> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store<ContextState> {
        &mut self.store
    }

    pub fn threads(&self) -> &ThreadRegistry {
        self.spawner.registry()
    }

    /// Wait for every spawned thread, including nested spawns.
    pub fn join_threads(&self) -> Vec<ThreadOutcome> {
        self.spawner.registry().join_all()
    }
}

impl fmt::Debug for MainContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainContext")
            .field("state", self.store.data())
            .field("spawner", &self.spawner)
            .finish_non_exhaustive()
    }
}
