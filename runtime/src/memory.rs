//! Linear memory marshaling.
//!
//! Every access goes through [`GuestMemory`] and re-resolves its offset
//! against the current buffer, so a grow between two calls never leaves a
//! stale view behind. Values are little-endian; pointers are 4 bytes.

use std::cell::UnsafeCell;
use std::ops::Range;

use spin::RwLock;
use wasmtime::SharedMemory;

use crate::allocator::GuestAllocator;
use crate::BridgeError;

/// Page size in bytes (64 KB).
pub const PAGE_SIZE: usize = 65536;

/// Maximum number of pages addressable by wasm32.
pub const MAX_PAGES: u32 = 65536;

/// Size of a wasm32 pointer.
pub const POINTER_SIZE: usize = 4;

/// Linear memory access failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    #[error("access of {len} bytes at {offset:#x} is outside memory of {size} bytes")]
    OutOfBounds { offset: u64, len: u64, size: u64 },
    #[error("cannot grow memory by {delta} pages: {reason}")]
    GrowFailed { delta: u32, reason: String },
    #[error("invalid memory limits: {0}")]
    InvalidLimits(String),
}

/// Primitive type tag for [`GuestMemory::read_value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Pointer,
}

impl ValueKind {
    /// Width in bytes.
    pub fn size(self) -> usize {
        match self {
            ValueKind::I8 => 1,
            ValueKind::I16 => 2,
            ValueKind::I32 | ValueKind::F32 => 4,
            ValueKind::I64 | ValueKind::F64 => 8,
            ValueKind::Pointer => POINTER_SIZE,
        }
    }
}

/// A primitive value stored in linear memory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Pointer(u32),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::I8(_) => ValueKind::I8,
            Value::I16(_) => ValueKind::I16,
            Value::I32(_) => ValueKind::I32,
            Value::I64(_) => ValueKind::I64,
            Value::F32(_) => ValueKind::F32,
            Value::F64(_) => ValueKind::F64,
            Value::Pointer(_) => ValueKind::Pointer,
        }
    }
}

fn check_bounds(offset: u32, len: usize, size: usize) -> Result<Range<usize>, MemoryError> {
    let start = offset as usize;
    match start.checked_add(len) {
        Some(end) if end <= size => Ok(start..end),
        _ => Err(MemoryError::OutOfBounds {
            offset: offset as u64,
            len: len as u64,
            size: size as u64,
        }),
    }
}

/// Byte-addressable linear memory shared by every execution context.
pub trait GuestMemory {
    /// Current size in bytes.
    fn data_size(&self) -> usize;

    /// Copy `buf.len()` bytes starting at `offset` into `buf`.
    fn read(&self, offset: u32, buf: &mut [u8]) -> Result<(), MemoryError>;

    /// Copy `data` into memory starting at `offset`.
    fn write(&self, offset: u32, data: &[u8]) -> Result<(), MemoryError>;

    /// Grow by `delta_pages`, returning the previous size in pages.
    fn grow(&self, delta_pages: u32) -> Result<u32, MemoryError>;

    fn read_bytes(&self, offset: u32, len: usize) -> Result<Vec<u8>, MemoryError> {
        check_bounds(offset, len, self.data_size())?;
        let mut buf = vec![0u8; len];
        self.read(offset, &mut buf)?;
        Ok(buf)
    }

    fn read_u8(&self, offset: u32) -> Result<u8, MemoryError> {
        let mut buf = [0u8; 1];
        self.read(offset, &mut buf)?;
        Ok(buf[0])
    }

    fn read_u16(&self, offset: u32) -> Result<u16, MemoryError> {
        let mut buf = [0u8; 2];
        self.read(offset, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32(&self, offset: u32) -> Result<u32, MemoryError> {
        let mut buf = [0u8; 4];
        self.read(offset, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_i32(&self, offset: u32) -> Result<i32, MemoryError> {
        self.read_u32(offset).map(|v| v as i32)
    }

    fn read_u64(&self, offset: u32) -> Result<u64, MemoryError> {
        let mut buf = [0u8; 8];
        self.read(offset, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn read_f32(&self, offset: u32) -> Result<f32, MemoryError> {
        self.read_u32(offset).map(f32::from_bits)
    }

    fn read_f64(&self, offset: u32) -> Result<f64, MemoryError> {
        self.read_u64(offset).map(f64::from_bits)
    }

    fn write_u8(&self, offset: u32, value: u8) -> Result<(), MemoryError> {
        self.write(offset, &[value])
    }

    fn write_u16(&self, offset: u32, value: u16) -> Result<(), MemoryError> {
        self.write(offset, &value.to_le_bytes())
    }

    fn write_u32(&self, offset: u32, value: u32) -> Result<(), MemoryError> {
        self.write(offset, &value.to_le_bytes())
    }

    fn write_i32(&self, offset: u32, value: i32) -> Result<(), MemoryError> {
        self.write(offset, &value.to_le_bytes())
    }

    fn write_u64(&self, offset: u32, value: u64) -> Result<(), MemoryError> {
        self.write(offset, &value.to_le_bytes())
    }

    fn write_f32(&self, offset: u32, value: f32) -> Result<(), MemoryError> {
        self.write(offset, &value.to_le_bytes())
    }

    fn write_f64(&self, offset: u32, value: f64) -> Result<(), MemoryError> {
        self.write(offset, &value.to_le_bytes())
    }

    /// Read the value of type `kind` stored at `offset`.
    fn read_value(&self, offset: u32, kind: ValueKind) -> Result<Value, MemoryError> {
        Ok(match kind {
            ValueKind::I8 => Value::I8(self.read_u8(offset)? as i8),
            ValueKind::I16 => Value::I16(self.read_u16(offset)? as i16),
            ValueKind::I32 => Value::I32(self.read_i32(offset)?),
            ValueKind::I64 => Value::I64(self.read_u64(offset)? as i64),
            ValueKind::F32 => Value::F32(self.read_f32(offset)?),
            ValueKind::F64 => Value::F64(self.read_f64(offset)?),
            ValueKind::Pointer => Value::Pointer(self.read_u32(offset)?),
        })
    }

    fn write_value(&self, offset: u32, value: Value) -> Result<(), MemoryError> {
        match value {
            Value::I8(v) => self.write_u8(offset, v as u8),
            Value::I16(v) => self.write_u16(offset, v as u16),
            Value::I32(v) => self.write_i32(offset, v),
            Value::I64(v) => self.write_u64(offset, v as u64),
            Value::F32(v) => self.write_f32(offset, v),
            Value::F64(v) => self.write_f64(offset, v),
            Value::Pointer(v) => self.write_u32(offset, v),
        }
    }

    /// Decode the NUL-terminated string at `ptr`.
    ///
    /// Invalid UTF-8 is replaced rather than rejected. A string that runs
    /// off the end of memory is an out-of-bounds access.
    fn read_c_string(&self, ptr: u32) -> Result<String, MemoryError> {
        let size = self.data_size();
        let mut bytes = Vec::new();
        let mut chunk = [0u8; 64];
        let mut cursor = ptr as usize;
        loop {
            if cursor >= size {
                return Err(MemoryError::OutOfBounds {
                    offset: ptr as u64,
                    len: (cursor - ptr as usize) as u64 + 1,
                    size: size as u64,
                });
            }
            let n = chunk.len().min(size - cursor);
            self.read(cursor as u32, &mut chunk[..n])?;
            if let Some(end) = chunk[..n].iter().position(|b| *b == 0) {
                bytes.extend_from_slice(&chunk[..end]);
                return Ok(String::from_utf8_lossy(&bytes).into_owned());
            }
            bytes.extend_from_slice(&chunk[..n]);
            cursor += n;
        }
    }

    /// Decode `len` bytes at `ptr` as UTF-8.
    fn read_utf8(&self, ptr: u32, len: usize) -> Result<String, MemoryError> {
        let bytes = self.read_bytes(ptr, len)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn read_u32_array(&self, ptr: u32, count: usize) -> Result<Vec<u32>, MemoryError> {
        let len = count.checked_mul(4).unwrap_or(usize::MAX);
        let bytes = self.read_bytes(ptr, len)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    fn read_f32_array(&self, ptr: u32, count: usize) -> Result<Vec<f32>, MemoryError> {
        Ok(self
            .read_u32_array(ptr, count)?
            .into_iter()
            .map(f32::from_bits)
            .collect())
    }

    fn write_u32_array(&self, ptr: u32, values: &[u32]) -> Result<(), MemoryError> {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.write(ptr, &bytes)
    }
}

/// Copy `s` into a fresh `len + 1` byte guest allocation, NUL-terminated.
pub fn write_new_c_string(
    memory: &dyn GuestMemory,
    allocator: &mut dyn GuestAllocator,
    s: &str,
) -> Result<u32, BridgeError> {
    let size = u32::try_from(s.len() + 1).map_err(|_| BridgeError::AllocationFailure {
        size: u32::MAX,
    })?;
    let ptr = allocator.allocate(size)?;
    let mut bytes = Vec::with_capacity(s.len() + 1);
    bytes.extend_from_slice(s.as_bytes());
    bytes.push(0);
    memory.write(ptr, &bytes)?;
    Ok(ptr)
}

/// Host-owned linear memory.
///
/// Used where no engine is involved (unit tests, tooling). Growing may move
/// the backing buffer, which is why callers never hold slices into it.
pub struct LinearMemory {
    data: RwLock<Vec<u8>>,

    /// Maximum size in pages (if specified).
    max_pages: Option<u32>,
}

impl LinearMemory {
    /// Create a new linear memory.
    pub fn new(initial_pages: u32, max_pages: Option<u32>) -> Result<Self, MemoryError> {
        if initial_pages > MAX_PAGES {
            return Err(MemoryError::InvalidLimits(format!(
                "initial pages {initial_pages} exceed {MAX_PAGES}"
            )));
        }
        if let Some(max) = max_pages {
            if max > MAX_PAGES {
                return Err(MemoryError::InvalidLimits(format!(
                    "maximum pages {max} exceed {MAX_PAGES}"
                )));
            }
            if initial_pages > max {
                return Err(MemoryError::InvalidLimits(format!(
                    "initial pages {initial_pages} exceed maximum {max}"
                )));
            }
        }

        Ok(LinearMemory {
            data: RwLock::new(vec![0; initial_pages as usize * PAGE_SIZE]),
            max_pages,
        })
    }

    /// Get the current size in pages.
    pub fn pages(&self) -> u32 {
        (self.data.read().len() / PAGE_SIZE) as u32
    }

    pub fn max_pages(&self) -> Option<u32> {
        self.max_pages
    }
}

impl GuestMemory for LinearMemory {
    fn data_size(&self) -> usize {
        self.data.read().len()
    }

    fn read(&self, offset: u32, buf: &mut [u8]) -> Result<(), MemoryError> {
        let data = self.data.read();
        let range = check_bounds(offset, buf.len(), data.len())?;
        buf.copy_from_slice(&data[range]);
        Ok(())
    }

    fn write(&self, offset: u32, bytes: &[u8]) -> Result<(), MemoryError> {
        let mut data = self.data.write();
        let range = check_bounds(offset, bytes.len(), data.len())?;
        data[range].copy_from_slice(bytes);
        Ok(())
    }

    fn grow(&self, delta_pages: u32) -> Result<u32, MemoryError> {
        let mut data = self.data.write();
        let old_pages = (data.len() / PAGE_SIZE) as u32;
        let limit = self.max_pages.unwrap_or(MAX_PAGES);
        let new_pages = old_pages
            .checked_add(delta_pages)
            .filter(|pages| *pages <= limit)
            .ok_or_else(|| MemoryError::GrowFailed {
                delta: delta_pages,
                reason: format!("{old_pages} pages plus {delta_pages} exceeds {limit}"),
            })?;

        // Move into a fresh allocation so growth behaves like a relocation.
        let mut grown = vec![0u8; new_pages as usize * PAGE_SIZE];
        grown[..data.len()].copy_from_slice(&data);
        *data = grown;
        Ok(old_pages)
    }
}

fn shared_range(memory: &SharedMemory, offset: u32, len: usize) -> Result<*mut u8, MemoryError> {
    let cells: &[UnsafeCell<u8>] = memory.data();
    let range = check_bounds(offset, len, cells.len())?;
    Ok(UnsafeCell::raw_get(cells[range].as_ptr()))
}

impl GuestMemory for SharedMemory {
    fn data_size(&self) -> usize {
        SharedMemory::data_size(self)
    }

    fn read(&self, offset: u32, buf: &mut [u8]) -> Result<(), MemoryError> {
        let src = shared_range(self, offset, buf.len())?;
        // SAFETY: the range was bounds-checked against the current size and
        // shared memory never shrinks. Concurrent guest writes race exactly
        // as they would between two wasm threads.
        unsafe { std::ptr::copy_nonoverlapping(src as *const u8, buf.as_mut_ptr(), buf.len()) };
        Ok(())
    }

    fn write(&self, offset: u32, data: &[u8]) -> Result<(), MemoryError> {
        let dst = shared_range(self, offset, data.len())?;
        // SAFETY: as in `read`.
        unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len()) };
        Ok(())
    }

    fn grow(&self, delta_pages: u32) -> Result<u32, MemoryError> {
        SharedMemory::grow(self, delta_pages as u64)
            .map(|previous| previous as u32)
            .map_err(|err| MemoryError::GrowFailed {
                delta: delta_pages,
                reason: format!("{err:#}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::BumpAllocator;

    fn memory() -> LinearMemory {
        LinearMemory::new(1, Some(4)).unwrap()
    }

    #[test]
    fn values_are_little_endian() {
        let mem = memory();
        mem.write_u32(0x10, 0x1122_3344).unwrap();
        assert_eq!(mem.read_bytes(0x10, 4).unwrap(), vec![0x44, 0x33, 0x22, 0x11]);
    }

    #[test]
    fn every_value_kind_reads_back() {
        let mem = memory();
        let values = [
            Value::I8(-3),
            Value::I16(-1234),
            Value::I32(-123_456),
            Value::I64(-1 << 40),
            Value::F32(1.5),
            Value::F64(-2.25),
            Value::Pointer(0xdead_beef),
        ];
        for (i, value) in values.iter().enumerate() {
            let offset = (i * 8) as u32;
            mem.write_value(offset, *value).unwrap();
            assert_eq!(mem.read_value(offset, value.kind()).unwrap(), *value);
        }
    }

    #[test]
    fn access_past_end_is_out_of_bounds() {
        let mem = memory();
        let end = PAGE_SIZE as u32;
        assert!(mem.read_u32(end - 4).is_ok());
        assert_eq!(
            mem.read_u32(end - 2),
            Err(MemoryError::OutOfBounds {
                offset: (end - 2) as u64,
                len: 4,
                size: PAGE_SIZE as u64,
            })
        );
        assert!(mem.write_u8(u32::MAX, 1).is_err());
    }

    #[test]
    fn c_string_stops_at_nul() {
        let mem = memory();
        mem.write(0x100, b"GL_ARB_foo\0ignored").unwrap();
        assert_eq!(mem.read_c_string(0x100).unwrap(), "GL_ARB_foo");
    }

    #[test]
    fn c_string_spanning_chunks() {
        let mem = memory();
        let long = "x".repeat(200);
        mem.write(0x40, long.as_bytes()).unwrap();
        mem.write_u8(0x40 + 200, 0).unwrap();
        assert_eq!(mem.read_c_string(0x40).unwrap(), long);
    }

    #[test]
    fn unterminated_c_string_is_out_of_bounds() {
        let mem = memory();
        let end = PAGE_SIZE as u32;
        mem.write(end - 3, b"abc").unwrap();
        assert!(matches!(
            mem.read_c_string(end - 3),
            Err(MemoryError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mem = memory();
        mem.write(0, &[b'a', 0xff, b'b', 0]).unwrap();
        assert_eq!(mem.read_c_string(0).unwrap(), "a\u{fffd}b");
    }

    #[test]
    fn new_c_string_is_allocated_and_terminated() {
        let mem = memory();
        let mut alloc = BumpAllocator::new(0x1000, 0x2000);
        let ptr = write_new_c_string(&mem, &mut alloc, "héllo").unwrap();
        assert_eq!(mem.read_c_string(ptr).unwrap(), "héllo");
        assert_eq!(mem.read_u8(ptr + "héllo".len() as u32).unwrap(), 0);
    }

    #[test]
    fn grow_preserves_written_data() {
        let mem = memory();
        mem.write(0x200, b"persist\0").unwrap();
        assert_eq!(mem.grow(2).unwrap(), 1);
        assert_eq!(mem.pages(), 3);
        assert_eq!(mem.read_c_string(0x200).unwrap(), "persist");
        assert_eq!(mem.read_u8((2 * PAGE_SIZE) as u32).unwrap(), 0);
    }

    #[test]
    fn grow_beyond_maximum_fails() {
        let mem = memory();
        assert!(matches!(mem.grow(4), Err(MemoryError::GrowFailed { .. })));
        assert_eq!(mem.pages(), 1);
    }

    #[test]
    fn arrays_round_trip() {
        let mem = memory();
        mem.write_u32_array(0x20, &[1, 2, 3]).unwrap();
        assert_eq!(mem.read_u32_array(0x20, 3).unwrap(), vec![1, 2, 3]);

        mem.write_f32(0x40, 0.5).unwrap();
        mem.write_f32(0x44, -1.0).unwrap();
        assert_eq!(mem.read_f32_array(0x40, 2).unwrap(), vec![0.5, -1.0]);
    }

    #[test]
    fn invalid_limits_are_rejected() {
        assert!(LinearMemory::new(5, Some(4)).is_err());
        assert!(LinearMemory::new(1, Some(MAX_PAGES + 1)).is_err());
    }
}
