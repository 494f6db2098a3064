//! wasi-threads style thread spawning.
//!
//! `wasi.thread-spawn(start_arg)` draws a fresh id from a counter shared by
//! every context, hands a [`ThreadDescriptor`] to a new OS thread over a
//! one-shot channel and returns the id without waiting. The new thread
//! boots its own execution context against the same shared memory and
//! compiled module, then enters the module's thread-start export.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error};
use spin::Mutex;
use wasmtime::{Engine, Module, SharedMemory, Store};

use crate::context::{ContextRole, ContextState};
use crate::engine::LinkerHook;
use crate::linker;
use crate::{BootError, BridgeConfig};

/// Largest id wasi-threads lets a thread carry.
pub const MAX_THREAD_ID: u32 = 0x1FFF_FFFF;

/// Everything a new execution context needs; consumed exactly once.
pub struct ThreadDescriptor {
    pub id: u32,
    pub counter: Arc<AtomicU32>,
    pub memory: SharedMemory,
    pub module: Module,
    pub start_arg: u32,
}

impl fmt::Debug for ThreadDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadDescriptor")
            .field("id", &self.id)
            .field("start_arg", &format_args!("{:#x}", self.start_arg))
            .finish_non_exhaustive()
    }
}

/// Boot sequence of a spawned context.
#[derive(Debug, Clone, PartialEq)]
pub enum ThreadBoot {
    Uninitialized,
    Instantiated,
    Running,
    Finished,
    /// Boot failed before the thread-start export ran.
    Failed(BootError),
    /// The thread-start export trapped.
    Trapped(BootError),
    /// The OS thread panicked.
    Panicked(String),
}

impl ThreadBoot {
    fn name(&self) -> &'static str {
        match self {
            ThreadBoot::Uninitialized => "uninitialized",
            ThreadBoot::Instantiated => "instantiated",
            ThreadBoot::Running => "running",
            ThreadBoot::Finished => "finished",
            ThreadBoot::Failed(_) => "failed",
            ThreadBoot::Trapped(_) => "trapped",
            ThreadBoot::Panicked(_) => "panicked",
        }
    }

    fn advance(&mut self, id: u32, next: ThreadBoot) {
        debug!("thread {id}: {} -> {}", self.name(), next.name());
        *self = next;
    }

    /// Record a failure; boot failures and traps stay distinguishable.
    fn fail(&mut self, id: u32, err: BootError) {
        let what = if err.is_boot_failure() { "failed to boot" } else { "trapped" };
        error!("thread {id} {what}: {err}");
        let next = match self {
            ThreadBoot::Uninitialized | ThreadBoot::Instantiated => ThreadBoot::Failed(err),
            _ => ThreadBoot::Trapped(err),
        };
        self.advance(id, next);
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ThreadBoot::Finished
                | ThreadBoot::Failed(_)
                | ThreadBoot::Trapped(_)
                | ThreadBoot::Panicked(_)
        )
    }
}

/// Final state of one spawned thread.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadOutcome {
    pub id: u32,
    pub boot: ThreadBoot,
}

impl ThreadOutcome {
    pub fn is_finished(&self) -> bool {
        self.boot == ThreadBoot::Finished
    }
}

/// Join handles of every spawned thread.
#[derive(Clone, Default)]
pub struct ThreadRegistry {
    handles: Arc<Mutex<Vec<(u32, JoinHandle<ThreadOutcome>)>>>,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, id: u32, handle: JoinHandle<ThreadOutcome>) {
        self.handles.lock().push((id, handle));
    }

    /// Threads spawned and not yet joined.
    pub fn pending(&self) -> usize {
        self.handles.lock().len()
    }

    /// Join every thread, including ones spawned by threads being joined.
    /// Outcomes are returned in join order.
    pub fn join_all(&self) -> Vec<ThreadOutcome> {
        let mut outcomes = Vec::new();
        loop {
            let batch: Vec<_> = self.handles.lock().drain(..).collect();
            if batch.is_empty() {
                return outcomes;
            }
            for (id, handle) in batch {
                let outcome = handle.join().unwrap_or_else(|panic| {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".into());
                    error!("thread {id} panicked: {message}");
                    ThreadOutcome {
                        id,
                        boot: ThreadBoot::Panicked(message),
                    }
                });
                outcomes.push(outcome);
            }
        }
    }
}

impl fmt::Debug for ThreadRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadRegistry")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Spawns execution contexts sharing one memory and module.
///
/// Cloned into every context so threads can spawn threads.
#[derive(Clone)]
pub struct ThreadSpawner {
    engine: Engine,
    module: Module,
    memory: SharedMemory,
    counter: Arc<AtomicU32>,
    config: Arc<BridgeConfig>,
    hook: Option<LinkerHook>,
    registry: ThreadRegistry,
}

impl ThreadSpawner {
    pub fn new(
        engine: Engine,
        module: Module,
        memory: SharedMemory,
        config: Arc<BridgeConfig>,
        hook: Option<LinkerHook>,
    ) -> Self {
        ThreadSpawner {
            engine,
            module,
            memory,
            // The first spawned thread is 1; 0 is never a valid tid.
            counter: Arc::new(AtomicU32::new(1)),
            config,
            hook,
            registry: ThreadRegistry::new(),
        }
    }

    pub fn registry(&self) -> &ThreadRegistry {
        &self.registry
    }

    /// Id the next spawn will receive.
    pub fn next_id(&self) -> u32 {
        self.counter.load(Ordering::SeqCst)
    }

    /// Start a thread entering the module with `start_arg`.
    ///
    /// Returns the new id immediately, or -1 when no thread could be created.
    pub fn spawn(&self, start_arg: u32) -> i32 {
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        if id == 0 || id > MAX_THREAD_ID {
            error!("thread-spawn: thread ids exhausted");
            return -1;
        }

        let (tx, rx) = mpsc::sync_channel::<ThreadDescriptor>(1);
        let worker = self.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}-{id}", self.config.thread_name_prefix))
            .spawn(move || match rx.recv() {
                Ok(descriptor) => worker.run(descriptor),
                Err(_) => ThreadOutcome {
                    id,
                    boot: ThreadBoot::Failed(BootError::Instantiate(
                        "thread descriptor was never delivered".into(),
                    )),
                },
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                error!("thread-spawn: cannot create OS thread for {id}: {err}");
                return -1;
            }
        };

        let descriptor = ThreadDescriptor {
            id,
            counter: self.counter.clone(),
            memory: self.memory.clone(),
            module: self.module.clone(),
            start_arg,
        };
        if tx.send(descriptor).is_err() {
            error!("thread-spawn: thread {id} exited before its descriptor arrived");
        }
        self.registry.insert(id, handle);
        debug!("thread {id} spawned (start_arg {start_arg:#x})");
        id as i32
    }

    /// Boot sequence of a spawned context, on its own OS thread.
    fn run(self, descriptor: ThreadDescriptor) -> ThreadOutcome {
        let ThreadDescriptor {
            id,
            memory,
            module,
            start_arg,
            ..
        } = descriptor;
        let mut boot = ThreadBoot::Uninitialized;
        let entry = self.config.thread_start_export.clone();
        let hook = self.hook.clone();
        let engine = self.engine.clone();

        let state = ContextState::new(ContextRole::Thread(id), self.config.clone(), memory, self);
        let mut store = Store::new(&engine, state);

        let instance = match linker::instantiate(&mut store, &module, hook.as_ref()) {
            Ok(instance) => instance,
            Err(err) => {
                boot.fail(id, err);
                return ThreadOutcome { id, boot };
            }
        };
        boot.advance(id, ThreadBoot::Instantiated);

        let start = match instance.get_typed_func::<(i32, i32), ()>(&mut store, &entry) {
            Ok(start) => start,
            Err(_) => {
                boot.fail(id, BootError::MissingExport(entry));
                return ThreadOutcome { id, boot };
            }
        };
        boot.advance(id, ThreadBoot::Running);

        match start.call(&mut store, (id as i32, start_arg as i32)) {
            Ok(()) => boot.advance(id, ThreadBoot::Finished),
            Err(err) => boot.fail(id, BootError::trap(&entry, err)),
        }
        ThreadOutcome { id, boot }
    }
}

impl fmt::Debug for ThreadSpawner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadSpawner")
            .field("next_id", &self.next_id())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_failures_and_traps_are_distinct() {
        let mut early = ThreadBoot::Uninitialized;
        early.fail(1, BootError::Link("unknown import".into()));
        assert!(matches!(early, ThreadBoot::Failed(BootError::Link(_))));

        let mut late = ThreadBoot::Uninitialized;
        late.advance(2, ThreadBoot::Instantiated);
        late.advance(2, ThreadBoot::Running);
        late.fail(
            2,
            BootError::Trap {
                export: "wasi_thread_start".into(),
                message: "unreachable".into(),
                bridge: None,
            },
        );
        assert!(matches!(late, ThreadBoot::Trapped(_)));
        assert!(late.is_terminal());
    }

    #[test]
    fn missing_export_after_instantiation_is_boot_failure() {
        let mut boot = ThreadBoot::Uninitialized;
        boot.advance(3, ThreadBoot::Instantiated);
        boot.fail(3, BootError::MissingExport("wasi_thread_start".into()));
        assert_eq!(
            boot,
            ThreadBoot::Failed(BootError::MissingExport("wasi_thread_start".into()))
        );
    }

    #[test]
    fn registry_joins_everything_and_reports_panics() {
        let registry = ThreadRegistry::new();
        registry.insert(
            1,
            thread::spawn(|| ThreadOutcome {
                id: 1,
                boot: ThreadBoot::Finished,
            }),
        );
        registry.insert(2, thread::spawn(|| -> ThreadOutcome { panic!("boom") }));
        assert_eq!(registry.pending(), 2);

        let outcomes = registry.join_all();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_finished());
        assert_eq!(outcomes[1].boot, ThreadBoot::Panicked("boom".into()));
        assert_eq!(registry.pending(), 0);
    }
}
