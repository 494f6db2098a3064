//! Per-store execution context state.
//!
//! Every execution context (the main one and each spawned thread) owns a
//! `wasmtime::Store<ContextState>`. The state carries the context's own jump
//! and quad-float emulators, a handle on the shared memory, and the spawner
//! used by `wasi.thread-spawn`. Only the main context ever holds a graphics
//! binding.

use std::fmt;
use std::sync::Arc;

use wasmtime::SharedMemory;

use crate::gl::GlBinding;
use crate::quad::QuadEmulator;
use crate::setjmp::JumpState;
use crate::threads::ThreadSpawner;
use crate::BridgeConfig;

/// Which execution context a store belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextRole {
    Main,
    Thread(u32),
}

impl fmt::Display for ContextRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextRole::Main => f.write_str("main"),
            ContextRole::Thread(id) => write!(f, "thread {id}"),
        }
    }
}

/// Store data of one execution context.
pub struct ContextState {
    role: ContextRole,
    config: Arc<BridgeConfig>,
    memory: SharedMemory,
    spawner: ThreadSpawner,
    pub(crate) jumps: JumpState,
    pub(crate) quad: QuadEmulator,
    gl: Option<Box<GlBinding>>,
}

impl ContextState {
    pub fn new(
        role: ContextRole,
        config: Arc<BridgeConfig>,
        memory: SharedMemory,
        spawner: ThreadSpawner,
    ) -> Self {
        ContextState {
            role,
            config,
            memory,
            spawner,
            jumps: JumpState::new(),
            quad: QuadEmulator::new(),
            gl: None,
        }
    }

    pub fn role(&self) -> ContextRole {
        self.role
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn memory(&self) -> &SharedMemory {
        &self.memory
    }

    pub fn spawner(&self) -> &ThreadSpawner {
        &self.spawner
    }

    pub fn jumps(&self) -> &JumpState {
        &self.jumps
    }

    /// Attach the graphics binding. Thread contexts never get one.
    pub fn set_gl(&mut self, gl: GlBinding) {
        self.gl = Some(Box::new(gl));
    }

    pub fn gl(&self) -> Option<&GlBinding> {
        self.gl.as_deref()
    }

    pub fn gl_mut(&mut self) -> Option<&mut GlBinding> {
        self.gl.as_deref_mut()
    }

    pub fn has_gl(&self) -> bool {
        self.gl.is_some()
    }

    /// Detach the binding for the duration of one import call, so the
    /// caller can be borrowed again for allocator calls into the guest.
    pub(crate) fn take_gl(&mut self) -> Option<Box<GlBinding>> {
        self.gl.take()
    }

    pub(crate) fn restore_gl(&mut self, gl: Box<GlBinding>) {
        self.gl = Some(gl);
    }

    pub(crate) fn remove_gl(&mut self) -> Option<GlBinding> {
        self.gl.take().map(|gl| *gl)
    }
}

impl fmt::Debug for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextState")
            .field("role", &self.role)
            .field("jumps", &self.jumps)
            .field("graphics", &self.gl.is_some())
            .finish_non_exhaustive()
    }
}
