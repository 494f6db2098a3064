//! Thread spawning against the shared memory of a booted module.

mod common;

use common::{boot_headless, boot_without_graphics, bridge, module};
use glbridge_runtime::{
    BootError, Bridge, BridgeConfig, BridgeError, GuestMemory, MainContext, ThreadBoot,
};
use wasmtime::Val;

/// `wasi_thread_start` stores its tid at `start_arg`; an argument of 0x200
/// spawns one more thread writing to 0x204.
const WORKER: &str = r#"
  (import "wasi" "thread-spawn" (func $spawn (param i32) (result i32)))
  (func (export "spawn") (param i32) (result i32) (call $spawn (local.get 0)))
  (func (export "wasi_thread_start") (param $tid i32) (param $arg i32)
    (if (i32.eq (local.get $arg) (i32.const 0x200))
      (then (drop (call $spawn (i32.const 0x204)))))
    (i32.atomic.store (local.get $arg) (local.get $tid)))
"#;

fn spawn(ctx: &mut MainContext, arg: i32) -> i32 {
    ctx.call("spawn", &[Val::I32(arg)]).unwrap()[0].i32().unwrap()
}

#[test]
fn spawned_threads_share_memory() {
    let mut ctx = boot_without_graphics(WORKER);

    let first = spawn(&mut ctx, 0x100);
    let second = spawn(&mut ctx, 0x104);
    assert_eq!((first, second), (1, 2));

    let outcomes = ctx.join_threads();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|outcome| outcome.is_finished()));
    assert_eq!(ctx.memory().read_u32(0x100).unwrap(), 1);
    assert_eq!(ctx.memory().read_u32(0x104).unwrap(), 2);
    assert_eq!(ctx.threads().pending(), 0);
}

#[test]
fn threads_can_spawn_threads() {
    let mut ctx = boot_without_graphics(WORKER);

    assert_eq!(spawn(&mut ctx, 0x200), 1);
    let outcomes = ctx.join_threads();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|outcome| outcome.is_finished()));

    assert_eq!(ctx.memory().read_u32(0x200).unwrap(), 1);
    assert_eq!(ctx.memory().read_u32(0x204).unwrap(), 2);
}

#[test]
fn missing_thread_start_is_a_boot_failure() {
    let mut ctx = boot_without_graphics(
        r#"
  (import "wasi" "thread-spawn" (func $spawn (param i32) (result i32)))
  (func (export "spawn") (param i32) (result i32) (call $spawn (local.get 0)))
"#,
    );

    // The id is handed out before the thread boots.
    assert_eq!(spawn(&mut ctx, 0), 1);
    let outcomes = ctx.join_threads();
    assert_eq!(
        outcomes[0].boot,
        ThreadBoot::Failed(BootError::MissingExport("wasi_thread_start".into()))
    );
}

#[test]
fn trapping_thread_does_not_affect_main_context() {
    let mut ctx = boot_without_graphics(
        r#"
  (import "wasi" "thread-spawn" (func $spawn (param i32) (result i32)))
  (func (export "spawn") (param i32) (result i32) (call $spawn (local.get 0)))
  (func (export "alive") (result i32) (i32.const 1))
  (func (export "wasi_thread_start") (param i32 i32) unreachable)
"#,
    );

    spawn(&mut ctx, 0);
    let outcomes = ctx.join_threads();
    match &outcomes[0].boot {
        ThreadBoot::Trapped(BootError::Trap { export, bridge, .. }) => {
            assert_eq!(export, "wasi_thread_start");
            assert_eq!(bridge, &None);
        }
        other => panic!("expected a trap, got {other:?}"),
    }
    assert_eq!(ctx.call("alive", &[]).unwrap()[0].i32(), Some(1));
}

#[test]
fn threads_never_see_the_graphics_context() {
    let mut ctx = boot_headless(
        r#"
  (import "wasi" "thread-spawn" (func $spawn (param i32) (result i32)))
  (import "env" "glClear" (func $clear (param i32)))
  (func (export "spawn") (param i32) (result i32) (call $spawn (local.get 0)))
  (func (export "wasi_thread_start") (param i32 i32) (call $clear (i32.const 0x4000)))
"#,
    );

    spawn(&mut ctx, 0);
    let outcomes = ctx.join_threads();
    assert!(matches!(
        &outcomes[0].boot,
        ThreadBoot::Trapped(BootError::Trap {
            bridge: Some(BridgeError::HostNotReady("glClear")),
            ..
        })
    ));
}

#[test]
fn spawned_threads_use_configured_start_export() {
    let config = BridgeConfig {
        thread_start_export: "worker_main".into(),
        ..Default::default()
    };
    let bridge = Bridge::new(config).unwrap();
    let mut ctx = bridge
        .load(
            module(
                r#"
  (import "wasi" "thread-spawn" (func $spawn (param i32) (result i32)))
  (func (export "spawn") (param i32) (result i32) (call $spawn (local.get 0)))
  (func (export "worker_main") (param $tid i32) (param $arg i32)
    (i32.atomic.store (local.get $arg) (i32.const 0xbeef)))
"#,
            )
            .as_bytes(),
            None,
        )
        .unwrap();

    spawn(&mut ctx, 0x100);
    assert!(ctx.join_threads()[0].is_finished());
    assert_eq!(ctx.memory().read_u32(0x100).unwrap(), 0xbeef);
}

#[test]
fn unknown_imports_fail_instantiation_unless_trapped() {
    let body = r#"
  (import "env" "emscripten_get_now" (func $now (result f64)))
  (func (export "now") (result f64) (call $now))
"#;
    let err = bridge().load(module(body).as_bytes(), None).unwrap_err();
    assert!(matches!(err, BootError::Instantiate(_)));
    assert!(err.is_boot_failure());

    let config = BridgeConfig {
        trap_unknown_imports: true,
        ..Default::default()
    };
    let mut ctx = Bridge::new(config)
        .unwrap()
        .load(module(body).as_bytes(), None)
        .unwrap();
    match ctx.call("now", &[]).unwrap_err() {
        BootError::Trap { bridge, .. } => assert_eq!(bridge, None),
        other => panic!("expected a trap, got {other:?}"),
    }
}

#[test]
fn mismatched_import_signature_fails_instantiation() {
    let body = r#"
  (import "env" "glClear" (func $clear (param f32)))
"#;
    let err = bridge().load(module(body).as_bytes(), None).unwrap_err();
    assert!(matches!(err, BootError::Instantiate(_)));
}

#[test]
fn entry_export_runs_and_missing_entry_is_reported() {
    let mut ctx = boot_without_graphics(
        r#"
  (func (export "_start") (i32.store (i32.const 0x100) (i32.const 9)))
"#,
    );
    ctx.run().unwrap();
    assert_eq!(ctx.memory().read_u32(0x100).unwrap(), 9);

    let mut bare = boot_without_graphics("");
    assert_eq!(
        bare.run().unwrap_err(),
        BootError::MissingExport("_start".into())
    );
}
