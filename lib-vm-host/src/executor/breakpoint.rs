//! The breakpoint register.
//!
//! A single word the engine reads at every metered opcode boundary: any
//! non-[`BreakpointValue::None`] value makes the engine trap out of the
//! guest. Hooks write it to stop execution from inside a call; the host
//! writes it to abort from outside. Tag values are part of the
//! engine-facing ABI and must not be renumbered.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reason the currently running guest should stop, or `None` to continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u64)]
pub enum BreakpointValue {
    /// Keep running.
    None = 0,
    /// The host decided to abort the execution.
    ExecutionFailed = 1,
    /// The guest requested an asynchronous cross-contract call; the caller
    /// interprets this after the engine returns.
    AsyncCall = 2,
    /// The guest raised a domain error through the error-signalling hook.
    SignalError = 3,
    /// The gas counter passed the gas limit.
    OutOfGas = 4,
    /// The guest attempted to exceed the memory limit.
    MemoryLimit = 5,
}

impl BreakpointValue {
    /// Reconstructs a tag from the raw register word. Unknown values map to
    /// `ExecutionFailed` so a corrupted register can only stop the guest,
    /// never resume it.
    pub fn from_raw(raw: u64) -> Self {
        match raw {
            0 => BreakpointValue::None,
            1 => BreakpointValue::ExecutionFailed,
            2 => BreakpointValue::AsyncCall,
            3 => BreakpointValue::SignalError,
            4 => BreakpointValue::OutOfGas,
            5 => BreakpointValue::MemoryLimit,
            _ => BreakpointValue::ExecutionFailed,
        }
    }

    /// Raw register word for this tag.
    pub fn as_raw(self) -> u64 {
        self as u64
    }
}

impl Default for BreakpointValue {
    fn default() -> Self {
        BreakpointValue::None
    }
}

impl fmt::Display for BreakpointValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BreakpointValue::None => "none",
            BreakpointValue::ExecutionFailed => "execution failed",
            BreakpointValue::AsyncCall => "async call",
            BreakpointValue::SignalError => "signal error",
            BreakpointValue::OutOfGas => "out of gas",
            BreakpointValue::MemoryLimit => "memory limit",
        };
        write!(f, "{}", name)
    }
}
