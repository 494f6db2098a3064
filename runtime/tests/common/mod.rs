//! Shared fixtures for the bridge integration tests.

#![allow(dead_code)]

use glbridge_runtime::graphics::HeadlessContext;
use glbridge_runtime::{Bridge, BridgeConfig, MainContext};

/// Bump allocator exports every module that marshals strings needs.
///
/// `_free` is a no-op; the heap starts at 64 KiB so the first page stays
/// free for fixed test addresses.
pub const ALLOCATOR: &str = r#"
  (global $heap (mut i32) (i32.const 0x10000))
  (func (export "_malloc") (param $size i32) (result i32)
    (local $ptr i32)
    (local.set $ptr (global.get $heap))
    (global.set $heap
      (i32.and
        (i32.add (i32.add (global.get $heap) (local.get $size)) (i32.const 7))
        (i32.const -8)))
    (local.get $ptr))
  (func (export "_free") (param i32))
"#;

/// Wrap imports and functions into a module importing the shared memory.
pub fn module(body: &str) -> String {
    format!(
        r#"(module
  (import "env" "memory" (memory 17 17 shared))
  {body}
)"#
    )
}

pub fn bridge() -> Bridge {
    Bridge::new(BridgeConfig::default()).unwrap()
}

pub fn boot_headless(body: &str) -> MainContext {
    bridge()
        .load(module(body).as_bytes(), Some(Box::new(HeadlessContext::new())))
        .unwrap()
}

pub fn boot_without_graphics(body: &str) -> MainContext {
    bridge().load(module(body).as_bytes(), None).unwrap()
}
