//! setjmp registration and binary128 emulation called from a module.

mod common;

use common::{boot_without_graphics, ALLOCATOR};
use glbridge_runtime::{GuestMemory, MainContext};
use wasmtime::Val;

fn setjmp_module() -> String {
    format!(
        r#"
  (import "env" "saveSetjmp" (func $save (param i32 i32 i32 i32) (result i32)))
  (import "env" "testSetjmp" (func $test (param i32 i32 i32) (result i32)))
  (import "env" "getTempRet0" (func $get_temp (result i32)))
  (import "env" "setTempRet0" (func $set_temp (param i32)))
  {ALLOCATOR}
  (func (export "save") (param $env i32) (param $label i32) (param $table i32) (param $size i32)
    (result i32)
    (call $save (local.get $env) (local.get $label) (local.get $table) (local.get $size)))
  (func (export "test") (param $id i32) (param $table i32) (param $size i32) (result i32)
    (call $test (local.get $id) (local.get $table) (local.get $size)))
  (func (export "temp") (result i32) (call $get_temp))
  (func (export "set_temp") (param i32) (call $set_temp (local.get 0)))
"#
    )
}

fn call_i32(ctx: &mut MainContext, export: &str, args: &[i32]) -> i32 {
    let params: Vec<Val> = args.iter().map(|&v| Val::I32(v)).collect();
    ctx.call(export, &params).unwrap()[0].i32().unwrap()
}

#[test]
fn setjmp_points_register_and_resolve() {
    let mut ctx = boot_without_graphics(&setjmp_module());
    let (table, size) = (0x400, 4);

    let returned = call_i32(&mut ctx, "save", &[0x300, 7, table, size]);
    assert_eq!(returned, table);
    assert_eq!(call_i32(&mut ctx, "temp", &[]), size);

    let id = ctx.memory().read_u32(0x300).unwrap() as i32;
    assert_eq!(id, 1);
    assert_eq!(call_i32(&mut ctx, "test", &[id, table, size]), 7);
    assert_eq!(call_i32(&mut ctx, "test", &[99, table, size]), 0);
}

#[test]
fn full_setjmp_table_moves_to_guest_allocation() {
    let mut ctx = boot_without_graphics(&setjmp_module());
    let mut table = 0x400;
    let mut size = 2;

    for label in 1..=3 {
        table = call_i32(&mut ctx, "save", &[0x300, label * 10, table, size]);
        size = call_i32(&mut ctx, "temp", &[]);
    }

    // The third registration overflowed the two-slot table.
    assert!(table as u32 >= 0x10000);
    assert_eq!(size, 4);
    for id in 1..=3 {
        assert_eq!(call_i32(&mut ctx, "test", &[id, table, size]), id * 10);
    }
}

#[test]
fn temp_ret_channel_round_trips() {
    let mut ctx = boot_without_graphics(&setjmp_module());
    ctx.call("set_temp", &[Val::I32(-5)]).unwrap();
    assert_eq!(call_i32(&mut ctx, "temp", &[]), -5);
}

#[test]
fn quad_arithmetic_through_imports() {
    let mut ctx = boot_without_graphics(&format!(
        r#"
  (import "env" "__extenddftf2" (func $extend (param f64) (result i32)))
  (import "env" "__trunctfdf2" (func $trunc (param i32) (result f64)))
  (import "env" "__addtf3" (func $add (param i32 i32) (result i32)))
  (import "env" "__multf3" (func $mul (param i32 i32) (result i32)))
  {ALLOCATOR}
  (func (export "fma") (param $a f64) (param $b f64) (param $c f64) (result f64)
    (call $trunc
      (call $add
        (call $mul (call $extend (local.get $a)) (call $extend (local.get $b)))
        (call $extend (local.get $c)))))
"#
    ));

    let results = ctx
        .call("fma", &[Val::from(1.5f64), Val::from(4.0f64), Val::from(0.25f64)])
        .unwrap();
    assert_eq!(results[0].f64(), Some(6.25));
}

const COMPARISONS: [&str; 7] = [
    "__eqtf2", "__netf2", "__lttf2", "__letf2", "__gttf2", "__getf2", "__unordtf2",
];

fn comparison_module() -> String {
    let mut body = String::from(
        r#"
  (import "env" "__extenddftf2" (func $extend (param f64) (result i32)))
"#,
    );
    for name in COMPARISONS {
        body.push_str(&format!(
            r#"  (import "env" "{name}" (func ${name} (param i32 i32) (result i32)))
"#
        ));
    }
    body.push_str(ALLOCATOR);
    for name in COMPARISONS {
        body.push_str(&format!(
            r#"
  (func (export "{name}") (param $a f64) (param $b f64) (result i32)
    (call ${name} (call $extend (local.get $a)) (call $extend (local.get $b))))"#
        ));
    }
    // What a compiler emits for `a == b` and `a < b` on long doubles.
    body.push_str(
        r#"
  (func (export "equal") (param $a f64) (param $b f64) (result i32)
    (i32.eqz (call $__eqtf2 (call $extend (local.get $a)) (call $extend (local.get $b)))))
  (func (export "less") (param $a f64) (param $b f64) (result i32)
    (i32.lt_s (call $__lttf2 (call $extend (local.get $a)) (call $extend (local.get $b)))
      (i32.const 0)))
"#,
    );
    body
}

fn compare(ctx: &mut MainContext, export: &str, a: f64, b: f64) -> i32 {
    ctx.call(export, &[Val::from(a), Val::from(b)]).unwrap()[0]
        .i32()
        .unwrap()
}

#[test]
fn quad_comparisons_are_three_way() {
    let mut ctx = boot_without_graphics(&comparison_module());

    for name in &COMPARISONS[..6] {
        assert_eq!(compare(&mut ctx, name, 1.0, 1.0), 0, "{name}(1, 1)");
        assert_eq!(compare(&mut ctx, name, 1.0, 2.0), -1, "{name}(1, 2)");
        assert_eq!(compare(&mut ctx, name, 2.0, 1.0), 1, "{name}(2, 1)");
        assert_eq!(compare(&mut ctx, name, -0.0, 0.0), 0, "{name}(-0, 0)");
    }
    assert_eq!(compare(&mut ctx, "__unordtf2", 1.0, 2.0), 0);

    assert_eq!(compare(&mut ctx, "equal", 1.0, 1.0), 1);
    assert_eq!(compare(&mut ctx, "equal", 1.0, 2.0), 0);
    assert_eq!(compare(&mut ctx, "less", 1.0, 2.0), 1);
    assert_eq!(compare(&mut ctx, "less", 2.0, 1.0), 0);
    assert_eq!(compare(&mut ctx, "less", 1.0, 1.0), 0);
}

#[test]
fn quad_comparisons_with_nan_are_unordered() {
    let mut ctx = boot_without_graphics(&comparison_module());
    let nan = f64::NAN;

    for name in ["__eqtf2", "__netf2", "__lttf2", "__letf2"] {
        assert_eq!(compare(&mut ctx, name, nan, 1.0), 1, "{name}(nan, 1)");
        assert_eq!(compare(&mut ctx, name, 1.0, nan), 1, "{name}(1, nan)");
    }
    for name in ["__gttf2", "__getf2"] {
        assert_eq!(compare(&mut ctx, name, nan, 1.0), -1, "{name}(nan, 1)");
        assert_eq!(compare(&mut ctx, name, nan, nan), -1, "{name}(nan, nan)");
    }
    assert_eq!(compare(&mut ctx, "__unordtf2", nan, 1.0), 1);
    assert_eq!(compare(&mut ctx, "__unordtf2", 1.0, nan), 1);

    assert_eq!(compare(&mut ctx, "equal", nan, nan), 0);
    assert_eq!(compare(&mut ctx, "less", nan, 1.0), 0);
}
