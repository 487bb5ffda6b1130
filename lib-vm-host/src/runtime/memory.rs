//! Bounds-checked access to an instance's linear memory.
//!
//! All guest-facing byte traffic funnels through these two functions. The
//! rules are bit-exact and deliberately unforgiving: a load never touches
//! bytes past the current memory size, and a store may grow memory by at
//! most one page per call, so a hostile contract cannot force large
//! allocations from inside a single hook call.

use crate::errors::{RuntimeError, RuntimeResult};
use crate::executor::{Instance, WASM_PAGE_SIZE};

/// Reads `length` bytes starting at `offset`.
///
/// Succeeds iff `0 <= offset`, `0 <= length` and
/// `offset + length <= memory size`. A zero-length read at any in-range
/// offset returns an empty vector, including at the very end of memory.
pub fn load(instance: &dyn Instance, offset: i32, length: i32) -> RuntimeResult<Vec<u8>> {
    if length < 0 {
        return Err(RuntimeError::NegativeLength);
    }
    if offset < 0 {
        return Err(RuntimeError::BadBounds);
    }
    if !instance.has_memory() {
        return Err(RuntimeError::NoMemory);
    }

    let offset = offset as u64;
    let length = length as u64;
    let memory_length = instance.memory_length();

    if offset > memory_length || offset + length > memory_length {
        return Err(RuntimeError::BadBounds);
    }

    let start = offset as usize;
    let end = (offset + length) as usize;
    Ok(instance.memory_data()[start..end].to_vec())
}

/// Writes `data` starting at `offset`.
///
/// The lower bound is validated unconditionally, even for empty `data`; an
/// empty store is otherwise a no-op. A store reaching past the current
/// memory size grows memory by exactly one page first; if the write still
/// does not fit, it fails and the grown page stays.
pub fn store(instance: &mut dyn Instance, offset: i32, data: &[u8]) -> RuntimeResult<()> {
    if offset < 0 {
        return Err(RuntimeError::BadLowerBounds);
    }
    if data.is_empty() {
        return Ok(());
    }
    if !instance.has_memory() {
        return Err(RuntimeError::NoMemory);
    }

    let offset = offset as u64;
    let requested_end = offset + data.len() as u64;

    if requested_end > instance.memory_length() {
        instance.memory_grow(1)?;
        if requested_end > instance.memory_length() {
            return Err(RuntimeError::BadUpperBounds);
        }
    }

    let start = offset as usize;
    let end = requested_end as usize;
    instance.memory_data_mut()[start..end].copy_from_slice(data);
    Ok(())
}

/// Number of whole pages needed to hold `bytes`.
pub fn pages_for_bytes(bytes: u64) -> u64 {
    bytes.div_ceil(WASM_PAGE_SIZE)
}
