//! Handle tables.
//!
//! A handle is a dense, per-kind integer standing in for a host object.
//! Handles start at 1 and come from a monotonic counter, so a released
//! handle is never handed out again. Handle 0 means "none" and never
//! resolves.

use std::fmt;

use hashbrown::HashMap;

use glbridge_graphics::{ProgramObject, UniformLocation};

use crate::BridgeError;

/// Kind of host object a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Buffer,
    Shader,
    Program,
    VertexArray,
    UniformLocation,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandleKind::Buffer => "buffer",
            HandleKind::Shader => "shader",
            HandleKind::Program => "program",
            HandleKind::VertexArray => "vertex array",
            HandleKind::UniformLocation => "uniform location",
        };
        f.write_str(name)
    }
}

/// Table mapping handles of one kind to host objects.
#[derive(Debug)]
pub struct HandleTable<T> {
    kind: HandleKind,
    entries: HashMap<u32, T>,
    next: u32,
}

impl<T> HandleTable<T> {
    pub fn new(kind: HandleKind) -> Self {
        HandleTable {
            kind,
            entries: HashMap::new(),
            next: 1,
        }
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    /// Record `object` under the next unused handle.
    pub fn allocate(&mut self, object: T) -> u32 {
        let handle = self.next;
        // u32 exhaustion wraps past 0; four billion creations per context
        // are not a realistic workload.
        self.next = self.next.wrapping_add(1).max(1);
        self.entries.insert(handle, object);
        handle
    }

    pub fn resolve(&self, handle: u32) -> Result<&T, BridgeError> {
        self.entries.get(&handle).ok_or(self.not_found(handle))
    }

    pub fn resolve_mut(&mut self, handle: u32) -> Result<&mut T, BridgeError> {
        let err = self.not_found(handle);
        self.entries.get_mut(&handle).ok_or(err)
    }

    /// Remove the mapping, returning the host object for destruction.
    pub fn release(&mut self, handle: u32) -> Result<T, BridgeError> {
        let err = self.not_found(handle);
        self.entries.remove(&handle).ok_or(err)
    }

    pub fn contains(&self, handle: u32) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn not_found(&self, handle: u32) -> BridgeError {
        BridgeError::HandleNotFound {
            kind: self.kind,
            handle,
        }
    }
}

/// Uniform locations resolved for one program.
///
/// Location ids handed to the guest are dense from 1 in first-lookup order
/// and live exactly as long as the program.
#[derive(Debug, Default)]
pub struct UniformCache {
    ids: HashMap<String, i32>,
    locations: Vec<UniformLocation>,
}

impl UniformCache {
    pub fn id_of(&self, name: &str) -> Option<i32> {
        self.ids.get(name).copied()
    }

    /// Cache `location` under `name`, returning its new id.
    pub fn insert(&mut self, name: &str, location: UniformLocation) -> i32 {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        self.locations.push(location);
        let id = self.locations.len() as i32;
        self.ids.insert(name.to_string(), id);
        id
    }

    pub fn location(&self, id: i32) -> Result<UniformLocation, BridgeError> {
        usize::try_from(id)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| self.locations.get(i))
            .copied()
            .ok_or(BridgeError::HandleNotFound {
                kind: HandleKind::UniformLocation,
                handle: id as u32,
            })
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}

/// A program handle's host object and its uniform caches.
#[derive(Debug)]
pub struct ProgramEntry {
    pub program: ProgramObject,
    pub uniforms: UniformCache,
}

impl ProgramEntry {
    pub fn new(program: ProgramObject) -> Self {
        ProgramEntry {
            program,
            uniforms: UniformCache::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glbridge_graphics::BufferObject;

    #[test]
    fn allocate_resolve_release_buffer() {
        let mut table = HandleTable::new(HandleKind::Buffer);
        let handle = table.allocate(BufferObject(42));
        assert_eq!(handle, 1);
        assert_eq!(table.resolve(1).unwrap(), &BufferObject(42));

        table.release(1).unwrap();
        assert_eq!(
            table.resolve(1),
            Err(BridgeError::HandleNotFound {
                kind: HandleKind::Buffer,
                handle: 1,
            })
        );
    }

    #[test]
    fn zero_is_never_resolvable() {
        let mut table = HandleTable::new(HandleKind::Shader);
        table.allocate(());
        assert!(table.resolve(0).is_err());
        assert!(table.release(0).is_err());
    }

    #[test]
    fn released_handles_are_not_reused() {
        let mut table = HandleTable::new(HandleKind::Program);
        let a = table.allocate("a");
        table.release(a).unwrap();
        let b = table.allocate("b");
        assert_ne!(a, b);
        assert!(!table.contains(a));
    }

    #[test]
    fn double_release_fails() {
        let mut table = HandleTable::new(HandleKind::VertexArray);
        let h = table.allocate(7u64);
        assert_eq!(table.release(h).unwrap(), 7);
        assert!(table.release(h).is_err());
    }

    #[test]
    fn uniform_ids_are_dense_from_one() {
        let mut cache = UniformCache::default();
        assert_eq!(cache.insert("u_color", UniformLocation(900)), 1);
        assert_eq!(cache.insert("u_matrix", UniformLocation(901)), 2);
        assert_eq!(cache.insert("u_color", UniformLocation(902)), 1);
        assert_eq!(cache.id_of("u_matrix"), Some(2));
        assert_eq!(cache.location(2).unwrap(), UniformLocation(901));
        assert!(cache.location(0).is_err());
        assert!(cache.location(-1).is_err());
        assert!(cache.location(3).is_err());
    }
}
