//! setjmp/longjmp registration.
//!
//! The compiled module keeps a jump table of `(id, label)` pairs in linear
//! memory and asks the host to register and look up setjmp points. Control
//! transfer itself stays inside the module's generated dispatch code; the
//! host only hands out ids and finds labels.
//!
//! Each execution context owns its own [`JumpState`], so ids are
//! independent per context.

use log::debug;

use crate::allocator::GuestAllocator;
use crate::memory::GuestMemory;
use crate::BridgeError;

/// Size of one `(id, label)` slot.
const SLOT_SIZE: u32 = 8;

/// Jump-id counter and the secondary return channel of one context.
#[derive(Debug, Default)]
pub struct JumpState {
    last_id: u32,
    temp_ret0: u32,
}

impl JumpState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a setjmp point.
    ///
    /// Finds the first free slot of the table, then writes a fresh id to
    /// `env` and stores `(id, label)` in that slot, zeroing the id of the
    /// slot after it. A full table is doubled into a new allocation and the
    /// old one freed. The returned pointer is the table to use from now on;
    /// the capacity it was sized for is left in the temp-ret channel. If no
    /// slot can be secured, `env` is untouched and no id is consumed.
    pub fn save(
        &mut self,
        memory: &dyn GuestMemory,
        allocator: &mut dyn GuestAllocator,
        env: u32,
        label: u32,
        table: u32,
        size: u32,
    ) -> Result<u32, BridgeError> {
        let mut table = table;
        let mut size = size;
        let index = loop {
            match first_free(memory, table, size)? {
                Some(index) => break index,
                None => (table, size) = grow_table(memory, allocator, table, size)?,
            }
        };
        let slot = slot_addr(table, index)?;
        let terminator = slot_addr(table, index + 1)?;

        let id = self.last_id.wrapping_add(1);
        memory.write_u32(env, id)?;
        memory.write_u32(slot, id)?;
        memory.write_u32(slot + 4, label)?;
        memory.write_u32(terminator, 0)?;
        self.last_id = id;
        self.temp_ret0 = size;
        Ok(table)
    }

    /// Label registered for `id`, or 0 when the id is not in the table.
    pub fn test(
        &self,
        memory: &dyn GuestMemory,
        id: u32,
        table: u32,
        size: u32,
    ) -> Result<u32, BridgeError> {
        for i in 0..size {
            let slot = slot_addr(table, i)?;
            let slot_id = memory.read_u32(slot)?;
            if slot_id == 0 {
                break;
            }
            if slot_id == id {
                return memory.read_u32(slot + 4).map_err(Into::into);
            }
        }
        Ok(0)
    }

    /// Value of the secondary return channel (`getTempRet0`).
    pub fn temp_ret0(&self) -> u32 {
        self.temp_ret0
    }

    pub fn set_temp_ret0(&mut self, value: u32) {
        self.temp_ret0 = value;
    }

    /// Last id handed out; 0 before the first `save`.
    pub fn last_id(&self) -> u32 {
        self.last_id
    }
}

fn slot_addr(table: u32, index: u32) -> Result<u32, BridgeError> {
    index
        .checked_mul(SLOT_SIZE)
        .and_then(|offset| table.checked_add(offset))
        .ok_or(BridgeError::InvalidArgument {
            op: "saveSetjmp",
            detail: format!("slot {index} of table {table:#x} overflows the address space"),
        })
}

fn first_free(memory: &dyn GuestMemory, table: u32, size: u32) -> Result<Option<u32>, BridgeError> {
    for i in 0..size {
        if memory.read_u32(slot_addr(table, i)?)? == 0 {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

/// Move a full table into an allocation twice its capacity (plus the
/// terminator slot), copying the old `size + 1` slots forward.
fn grow_table(
    memory: &dyn GuestMemory,
    allocator: &mut dyn GuestAllocator,
    table: u32,
    size: u32,
) -> Result<(u32, u32), BridgeError> {
    // A zero-capacity table would double to zero forever.
    let grown = size.saturating_mul(2).max(1);
    let bytes = grown
        .checked_add(1)
        .and_then(|slots| slots.checked_mul(SLOT_SIZE))
        .ok_or(BridgeError::AllocationFailure { size: u32::MAX })?;

    let new_table = allocator.allocate(bytes)?;
    let old = memory.read_bytes(table, ((size + 1) * SLOT_SIZE) as usize)?;
    memory.write(new_table, &old)?;
    allocator.free(table)?;

    debug!("setjmp table grew {table:#x}[{size}] -> {new_table:#x}[{grown}]");
    Ok((new_table, grown))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::BumpAllocator;
    use crate::memory::LinearMemory;

    fn setup() -> (LinearMemory, BumpAllocator) {
        (
            LinearMemory::new(1, Some(1)).unwrap(),
            BumpAllocator::new(0x1000, 0x8000),
        )
    }

    #[test]
    fn save_then_test_returns_label() {
        let (mem, mut alloc) = setup();
        let mut state = JumpState::new();

        let table = state.save(&mem, &mut alloc, 0x100, 7, 0x200, 4).unwrap();
        assert_eq!(table, 0x200);
        assert_eq!(mem.read_u32(0x100).unwrap(), 1);
        assert_eq!(mem.read_u32(0x200).unwrap(), 1);
        assert_eq!(mem.read_u32(0x204).unwrap(), 7);
        assert_eq!(mem.read_u32(0x208).unwrap(), 0);

        assert_eq!(state.test(&mem, 1, 0x200, 4).unwrap(), 7);
        assert_eq!(state.test(&mem, 2, 0x200, 4).unwrap(), 0);
        assert_eq!(state.temp_ret0(), 4);
    }

    #[test]
    fn ids_increase_and_are_never_reused() {
        let (mem, mut alloc) = setup();
        let mut state = JumpState::new();
        state.save(&mem, &mut alloc, 0x100, 1, 0x200, 4).unwrap();
        state.save(&mem, &mut alloc, 0x104, 2, 0x200, 4).unwrap();
        assert_eq!(mem.read_u32(0x100).unwrap(), 1);
        assert_eq!(mem.read_u32(0x104).unwrap(), 2);
        assert_eq!(state.last_id(), 2);
    }

    #[test]
    fn full_table_grows_and_keeps_every_entry() {
        let (mem, mut alloc) = setup();
        let mut state = JumpState::new();
        let mut table = 0x200;
        let mut size = 2;

        for label in 1..=9u32 {
            table = state.save(&mem, &mut alloc, 0x100, label * 10, table, size).unwrap();
            size = state.temp_ret0();
        }

        assert_ne!(table, 0x200);
        assert_eq!(alloc.freed()[0], 0x200);
        assert!(size >= 9);
        for id in 1..=9u32 {
            assert_eq!(state.test(&mem, id, table, size).unwrap(), id * 10);
        }
        assert_eq!(state.test(&mem, 10, table, size).unwrap(), 0);
    }

    #[test]
    fn zero_capacity_table_grows() {
        let (mem, mut alloc) = setup();
        let mut state = JumpState::new();
        let table = state.save(&mem, &mut alloc, 0x100, 5, 0x200, 0).unwrap();
        assert_ne!(table, 0x200);
        assert_eq!(state.test(&mem, 1, table, state.temp_ret0()).unwrap(), 5);
    }

    #[test]
    fn failed_growth_is_allocation_failure() {
        let mem = LinearMemory::new(1, Some(1)).unwrap();
        let mut alloc = BumpAllocator::new(0x1000, 0x1004);
        let mut state = JumpState::new();
        mem.write_u32(0x200, 99).unwrap();

        let err = state.save(&mem, &mut alloc, 0x100, 7, 0x200, 1).unwrap_err();
        assert!(matches!(err, BridgeError::AllocationFailure { .. }));
    }

    #[test]
    fn failed_growth_leaves_env_and_ids_untouched() {
        let mem = LinearMemory::new(1, Some(1)).unwrap();
        let mut alloc = BumpAllocator::new(0x1000, 0x1000);
        let mut state = JumpState::new();
        mem.write_u32_array(0x200, &[99, 990, 0, 0]).unwrap();

        assert!(state.save(&mem, &mut alloc, 0x100, 7, 0x200, 1).is_err());
        assert_eq!(mem.read_u32(0x100).unwrap(), 0);
        assert_eq!(state.last_id(), 0);
        assert_eq!(mem.read_u32_array(0x200, 4).unwrap(), vec![99, 990, 0, 0]);

        // The next registration that finds room gets the first id.
        state.save(&mem, &mut alloc, 0x104, 8, 0x300, 4).unwrap();
        assert_eq!(mem.read_u32(0x104).unwrap(), 1);
        assert_eq!(state.last_id(), 1);
    }

    #[test]
    fn contexts_count_independently() {
        let (mem, mut alloc) = setup();
        let mut main = JumpState::new();
        let mut worker = JumpState::new();
        main.save(&mem, &mut alloc, 0x100, 1, 0x200, 4).unwrap();
        worker.save(&mem, &mut alloc, 0x104, 1, 0x300, 4).unwrap();
        assert_eq!(mem.read_u32(0x104).unwrap(), 1);
    }
}
