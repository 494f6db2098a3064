//! binary128 ("long double") emulation.
//!
//! Operands arrive as pointers to 16-byte IEEE-754 binary128 cells in
//! linear memory (low 64 bits first). Value-producing operations allocate a
//! fresh 16-byte cell for their result and return its pointer.
//!
//! Comparisons follow the compiler-rt soft-float convention: a three-way
//! -1/0/1 result whose sign the caller tests, with unordered operands
//! yielding 1 for `__eqtf2`/`__netf2`/`__lttf2`/`__letf2` and -1 for
//! `__gttf2`/`__getf2`. `__unordtf2` alone returns 0 or 1.
//!
//! # Precision
//!
//! Arithmetic runs in `f64`. Widening `f64` to binary128 is exact, and
//! integers are encoded exactly, but narrowing binary128 to `f64` rounds to
//! nearest-even and loses the extra 60 bits of significand and 4 bits of
//! exponent range. Module code that depends on true quad precision gets
//! double precision results. The first use in each context logs a warning.

use log::warn;

use crate::allocator::GuestAllocator;
use crate::memory::GuestMemory;
use crate::BridgeError;

/// Size of a binary128 cell.
pub const CELL_SIZE: u32 = 16;

const EXP_BIAS: i32 = 16383;
const EXP_MAX: u128 = 0x7FFF;
const FRAC_BITS: u32 = 112;
const FRAC_MASK: u128 = (1u128 << FRAC_BITS) - 1;
const SIGN_BIT: u128 = 1u128 << 127;

/// Comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuadCmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Unordered,
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuadOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Encode an `f64` as binary128 bits. Exact.
pub fn f64_to_bits(value: f64) -> u128 {
    let raw = value.to_bits();
    let sign = ((raw >> 63) as u128) << 127;
    let exp = ((raw >> 52) & 0x7FF) as i32;
    let frac = raw & ((1u64 << 52) - 1);

    match exp {
        0 if frac == 0 => sign,
        0x7FF => {
            // Keep the NaN payload in the top fraction bits.
            sign | (EXP_MAX << FRAC_BITS) | ((frac as u128) << 60)
        }
        0 => {
            // Subnormal f64: renormalize, the wider exponent holds it.
            let (mantissa, exponent) = libm::frexp(value.abs());
            let significand = (mantissa * (1u64 << 53) as f64) as u64;
            let biased = (exponent - 1 + EXP_BIAS) as u128;
            sign | (biased << FRAC_BITS) | (((significand as u128) << 60) & FRAC_MASK)
        }
        _ => {
            let biased = (exp - 1023 + EXP_BIAS) as u128;
            sign | (biased << FRAC_BITS) | ((frac as u128) << 60)
        }
    }
}

/// Round `m >> shift` to nearest, ties to even.
fn round_shift(m: u128, shift: u32) -> u128 {
    if shift == 0 {
        return m;
    }
    if shift >= 128 {
        return 0;
    }
    let q = m >> shift;
    let rem = m & ((1u128 << shift) - 1);
    let half = 1u128 << (shift - 1);
    if rem > half || (rem == half && q & 1 == 1) {
        q + 1
    } else {
        q
    }
}

/// Narrow binary128 bits to the nearest `f64`.
pub fn bits_to_f64(bits: u128) -> f64 {
    let sign = ((bits >> 127) as u64) << 63;
    let exp = ((bits >> FRAC_BITS) & EXP_MAX) as i32;
    let frac = bits & FRAC_MASK;

    if exp == EXP_MAX as i32 {
        if frac == 0 {
            return f64::from_bits(sign | 0x7FF0_0000_0000_0000);
        }
        let payload = (frac >> 60) as u64 | (1 << 51);
        return f64::from_bits(sign | 0x7FF0_0000_0000_0000 | payload);
    }
    if exp == 0 {
        // Zero or a binary128 subnormal, far below f64 range.
        return f64::from_bits(sign);
    }

    let mut e = exp - EXP_BIAS;
    let m = frac | (1u128 << FRAC_BITS);

    if e >= -1022 {
        let mut q = round_shift(m, 60);
        if q == 1u128 << 53 {
            q >>= 1;
            e += 1;
        }
        if e > 1023 {
            return f64::from_bits(sign | 0x7FF0_0000_0000_0000);
        }
        let biased = (e + 1023) as u64;
        f64::from_bits(sign | (biased << 52) | (q as u64 & ((1u64 << 52) - 1)))
    } else {
        // Subnormal result; a carry into bit 52 encodes the smallest normal.
        let shift = 60 + (-1022 - e) as u32;
        let q = round_shift(m, shift);
        f64::from_bits(sign | q as u64)
    }
}

/// Encode an integer magnitude exactly.
fn from_integer(magnitude: u64, negative: bool) -> u128 {
    if magnitude == 0 {
        return 0;
    }
    let msb = 63 - magnitude.leading_zeros();
    let biased = (EXP_BIAS + msb as i32) as u128;
    let frac = ((magnitude as u128) << (FRAC_BITS - msb)) & FRAC_MASK;
    let sign = if negative { SIGN_BIT } else { 0 };
    sign | (biased << FRAC_BITS) | frac
}

/// Per-context emulator state.
#[derive(Debug, Default)]
pub struct QuadEmulator {
    warned: bool,
}

impl QuadEmulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn note_use(&mut self, op: &'static str) {
        if !self.warned {
            self.warned = true;
            warn!("{op}: binary128 arithmetic is emulated with f64 precision");
        }
    }

    fn load(&self, memory: &dyn GuestMemory, ptr: u32) -> Result<u128, BridgeError> {
        let lo = memory.read_u64(ptr)? as u128;
        let hi = memory.read_u64(ptr + 8)? as u128;
        Ok((hi << 64) | lo)
    }

    fn load_f64(&self, memory: &dyn GuestMemory, ptr: u32) -> Result<f64, BridgeError> {
        self.load(memory, ptr).map(bits_to_f64)
    }

    /// Allocate a cell holding `bits`.
    fn store_new(
        &self,
        memory: &dyn GuestMemory,
        allocator: &mut dyn GuestAllocator,
        bits: u128,
    ) -> Result<u32, BridgeError> {
        let ptr = allocator.allocate(CELL_SIZE)?;
        memory.write_u64(ptr, bits as u64)?;
        memory.write_u64(ptr + 8, (bits >> 64) as u64)?;
        Ok(ptr)
    }

    /// Read the cell at `ptr` as the nearest `f64`.
    pub fn read(&self, memory: &dyn GuestMemory, ptr: u32) -> Result<f64, BridgeError> {
        self.load_f64(memory, ptr)
    }

    /// Compare two cells the way the compiler-rt `__*tf2` helpers do.
    ///
    /// Every predicate except `Unordered` returns -1, 0 or 1 as `a` is
    /// below, equal to or above `b`, so callers test the sign (`a == b`
    /// compiles to `__eqtf2(a, b) == 0`). With a NaN operand `Eq`, `Ne`,
    /// `Lt` and `Le` return 1 and `Gt` and `Ge` return -1, which makes every
    /// ordered relation false. `Unordered` returns 1 if either is NaN.
    pub fn compare(
        &mut self,
        memory: &dyn GuestMemory,
        cmp: QuadCmp,
        a: u32,
        b: u32,
    ) -> Result<i32, BridgeError> {
        self.note_use("compare");
        let a = self.load_f64(memory, a)?;
        let b = self.load_f64(memory, b)?;
        let unordered = a.is_nan() || b.is_nan();
        let result = match cmp {
            QuadCmp::Unordered => unordered as i32,
            QuadCmp::Gt | QuadCmp::Ge if unordered => -1,
            _ if unordered => 1,
            _ if a < b => -1,
            _ if a > b => 1,
            _ => 0,
        };
        Ok(result)
    }

    pub fn arith(
        &mut self,
        memory: &dyn GuestMemory,
        allocator: &mut dyn GuestAllocator,
        op: QuadOp,
        a: u32,
        b: u32,
    ) -> Result<u32, BridgeError> {
        self.note_use("arith");
        let a = self.load_f64(memory, a)?;
        let b = self.load_f64(memory, b)?;
        let result = match op {
            QuadOp::Add => a + b,
            QuadOp::Sub => a - b,
            QuadOp::Mul => a * b,
            QuadOp::Div => a / b,
        };
        self.store_new(memory, allocator, f64_to_bits(result))
    }

    pub fn from_i64(
        &mut self,
        memory: &dyn GuestMemory,
        allocator: &mut dyn GuestAllocator,
        value: i64,
    ) -> Result<u32, BridgeError> {
        self.note_use("float");
        self.store_new(memory, allocator, from_integer(value.unsigned_abs(), value < 0))
    }

    pub fn from_u64(
        &mut self,
        memory: &dyn GuestMemory,
        allocator: &mut dyn GuestAllocator,
        value: u64,
    ) -> Result<u32, BridgeError> {
        self.note_use("floatun");
        self.store_new(memory, allocator, from_integer(value, false))
    }

    pub fn from_f64(
        &mut self,
        memory: &dyn GuestMemory,
        allocator: &mut dyn GuestAllocator,
        value: f64,
    ) -> Result<u32, BridgeError> {
        self.note_use("extend");
        self.store_new(memory, allocator, f64_to_bits(value))
    }

    /// Truncate toward zero, saturating; NaN converts to 0.
    pub fn to_i64(&mut self, memory: &dyn GuestMemory, ptr: u32) -> Result<i64, BridgeError> {
        self.note_use("fix");
        Ok(self.load_f64(memory, ptr)? as i64)
    }

    pub fn to_u64(&mut self, memory: &dyn GuestMemory, ptr: u32) -> Result<u64, BridgeError> {
        self.note_use("fix");
        Ok(self.load_f64(memory, ptr)? as u64)
    }

    pub fn to_i32(&mut self, memory: &dyn GuestMemory, ptr: u32) -> Result<i32, BridgeError> {
        self.note_use("fix");
        Ok(self.load_f64(memory, ptr)? as i32)
    }

    pub fn to_u32(&mut self, memory: &dyn GuestMemory, ptr: u32) -> Result<u32, BridgeError> {
        self.note_use("fix");
        Ok(self.load_f64(memory, ptr)? as u32)
    }

    pub fn to_f64(&mut self, memory: &dyn GuestMemory, ptr: u32) -> Result<f64, BridgeError> {
        self.note_use("trunc");
        self.load_f64(memory, ptr)
    }

    pub fn to_f32(&mut self, memory: &dyn GuestMemory, ptr: u32) -> Result<f32, BridgeError> {
        self.note_use("trunc");
        Ok(self.load_f64(memory, ptr)? as f32)
    }
}
