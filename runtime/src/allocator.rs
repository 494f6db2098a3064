//! Guest allocator hooks.
//!
//! The bridge never manages guest memory itself: every routine that needs
//! scratch space asks the module's own `malloc`/`free` exports through
//! [`GuestAllocator`].

use wasmtime::{Caller, Extern};

use crate::context::ContextState;
use crate::BridgeError;

/// Allocation in the guest's heap.
pub trait GuestAllocator {
    /// Raw `malloc`; a null return is passed through.
    fn malloc(&mut self, size: u32) -> Result<u32, BridgeError>;

    fn free(&mut self, ptr: u32) -> Result<(), BridgeError>;

    /// `malloc` that treats a null return as [`BridgeError::AllocationFailure`].
    fn allocate(&mut self, size: u32) -> Result<u32, BridgeError> {
        match self.malloc(size)? {
            0 => Err(BridgeError::AllocationFailure { size }),
            ptr => Ok(ptr),
        }
    }
}

/// Allocator backed by the calling instance's exports.
///
/// Exports are resolved on every call, so the allocator works from the very
/// first import a module makes during its start routine.
pub struct ExportAllocator<'a, 'c> {
    caller: &'a mut Caller<'c, ContextState>,
}

impl<'a, 'c> ExportAllocator<'a, 'c> {
    pub fn new(caller: &'a mut Caller<'c, ContextState>) -> Self {
        ExportAllocator { caller }
    }

    fn export(&mut self, name: &str) -> Result<wasmtime::Func, BridgeError> {
        self.caller
            .get_export(name)
            .and_then(Extern::into_func)
            .ok_or_else(|| BridgeError::GuestCall {
                export: name.to_string(),
                message: "export not found".into(),
            })
    }
}

fn guest_call_error(export: &str, err: wasmtime::Error) -> BridgeError {
    BridgeError::GuestCall {
        export: export.to_string(),
        message: format!("{err:#}"),
    }
}

impl GuestAllocator for ExportAllocator<'_, '_> {
    fn malloc(&mut self, size: u32) -> Result<u32, BridgeError> {
        let name = self.caller.data().config().malloc_export.clone();
        let func = self.export(&name)?;
        let malloc = func
            .typed::<u32, u32>(&*self.caller)
            .map_err(|err| guest_call_error(&name, err))?;
        malloc
            .call(&mut *self.caller, size)
            .map_err(|err| guest_call_error(&name, err))
    }

    fn free(&mut self, ptr: u32) -> Result<(), BridgeError> {
        let name = self.caller.data().config().free_export.clone();
        let func = self.export(&name)?;
        let free = func
            .typed::<u32, ()>(&*self.caller)
            .map_err(|err| guest_call_error(&name, err))?;
        free.call(&mut *self.caller, ptr)
            .map_err(|err| guest_call_error(&name, err))
    }
}

/// Bump allocator over a reserved range of guest memory.
///
/// Frees are recorded but never reused. Returns null once the range is
/// exhausted, like a real `malloc`.
#[derive(Debug, Clone)]
pub struct BumpAllocator {
    next: u32,
    end: u32,
    allocations: Vec<(u32, u32)>,
    freed: Vec<u32>,
}

impl BumpAllocator {
    /// Alignment of every returned pointer.
    pub const ALIGN: u32 = 8;

    pub fn new(start: u32, end: u32) -> Self {
        BumpAllocator {
            next: start,
            end,
            allocations: Vec::new(),
            freed: Vec::new(),
        }
    }

    /// Live `(ptr, size)` pairs in allocation order.
    pub fn allocations(&self) -> &[(u32, u32)] {
        &self.allocations
    }

    pub fn freed(&self) -> &[u32] {
        &self.freed
    }
}

impl GuestAllocator for BumpAllocator {
    fn malloc(&mut self, size: u32) -> Result<u32, BridgeError> {
        let aligned = self
            .next
            .checked_add(Self::ALIGN - 1)
            .map(|p| p & !(Self::ALIGN - 1));
        let ptr = match aligned {
            Some(ptr) if ptr != 0 => ptr,
            Some(_) => Self::ALIGN,
            None => return Ok(0),
        };
        match ptr.checked_add(size) {
            Some(end) if end <= self.end => {
                self.next = end;
                self.allocations.push((ptr, size));
                Ok(ptr)
            }
            _ => Ok(0),
        }
    }

    fn free(&mut self, ptr: u32) -> Result<(), BridgeError> {
        self.allocations.retain(|(p, _)| *p != ptr);
        self.freed.push(ptr);
        Ok(())
    }
}
