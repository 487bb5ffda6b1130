//! Interfaces to the WASM execution engine.
//!
//! The engine itself (compilation, opcode metering, trap delivery) lives
//! behind these traits. The runtime context only ever talks to
//! [`Executor`] to obtain instances and to [`Instance`] to drive them; the
//! in-tree mock engine and any real engine binding implement the same pair.

mod breakpoint;

pub use breakpoint::BreakpointValue;

use std::sync::{Arc, Mutex};

use crate::errors::ExecutorResult;
use crate::gas::OpcodeCosts;

/// Number of bytes in one WASM linear-memory page. Protocol constant.
pub const WASM_PAGE_SIZE: u64 = 65_536;

/// Knobs applied when compiling and instantiating contract code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationOptions {
    /// Gas budget the instance starts with.
    pub gas_limit: u64,
    /// Number of local slots a function may declare without metering.
    pub unmetered_locals: usize,
    /// Hard cap on total linear-memory pages.
    pub max_memory_grow: u64,
    /// Hard cap on pages added by a single grow operation.
    pub max_memory_grow_delta: u64,
    /// Emit a per-opcode execution trace (diagnostics only).
    pub opcode_trace: bool,
}

impl Default for CompilationOptions {
    fn default() -> Self {
        CompilationOptions {
            gas_limit: 0,
            unmetered_locals: 4096,
            max_memory_grow: 1024,
            max_memory_grow_delta: 1,
            opcode_trace: false,
        }
    }
}

/// Shared handle to a live instance.
///
/// The runtime context, its instance stack, and the warm cache each hold
/// clones; `Arc::strong_count` is therefore an exact liveness measure and
/// the cache uses it to refuse evicting an instance that is still running.
pub type InstanceRef = Arc<Mutex<dyn Instance>>;

/// A compiled, instantiated, memory-backed WASM module.
///
/// All methods are infallible queries or state flips except the ones that
/// cross into guest code or reshape memory.
pub trait Instance: Send {
    /// True if the module exports a function under `name`.
    fn has_function(&self, name: &str) -> bool;

    /// Names of all exported functions, in no particular order.
    fn exported_function_names(&self) -> Vec<String>;

    /// Runs the exported function `name` to completion.
    ///
    /// Returns `Err(ExecutorError::Breakpoint(_))` when the guest stopped at
    /// a non-`None` breakpoint and `Err(ExecutorError::Trap(_))` when the
    /// engine trapped; the runtime inspects the breakpoint register to
    /// classify the outcome either way.
    fn call_function(&mut self, name: &str) -> ExecutorResult<()>;

    /// True if the module's import table requires the host hook `name`.
    fn is_function_imported(&self, name: &str) -> bool;

    /// Names of all host functions the module's import table requires.
    fn imported_function_names(&self) -> Vec<String>;

    /// True if the module has a linear memory.
    fn has_memory(&self) -> bool;

    /// Current size of linear memory in bytes.
    fn memory_length(&self) -> u64;

    /// Read view over the whole linear memory.
    fn memory_data(&self) -> &[u8];

    /// Write view over the whole linear memory.
    fn memory_data_mut(&mut self) -> &mut [u8];

    /// Extends linear memory by `pages` whole pages.
    fn memory_grow(&mut self, pages: u32) -> ExecutorResult<()>;

    /// Gas points consumed so far.
    fn points_used(&self) -> u64;

    /// Overwrites the gas counter.
    fn set_points_used(&mut self, points: u64);

    /// Sets the budget the metering instrumentation checks against.
    fn set_gas_limit(&mut self, gas_limit: u64);

    /// Current breakpoint register value.
    fn breakpoint_value(&self) -> BreakpointValue;

    /// Writes the breakpoint register.
    fn set_breakpoint_value(&mut self, value: BreakpointValue);

    /// Opaque pointer-width slot the engine passes back to hook dispatch.
    fn context_data(&self) -> usize;

    /// Stores the value hook dispatch will recover during calls.
    fn set_context_data(&mut self, data: usize);

    /// Serialized compiled artifact, reusable via
    /// [`Executor::new_instance_from_compiled`].
    fn cache(&self) -> ExecutorResult<Vec<u8>>;

    /// Prepares the instance for reuse: zeroes the gas counter, clears the
    /// breakpoint register and any per-call accumulators. The compiled
    /// module, exports, imports and memory shape survive.
    fn reset(&mut self);

    /// Releases engine-side resources. Idempotent; the instance is unusable
    /// afterwards.
    fn clean(&mut self);
}

/// Factory for instances; one engine is shared by a whole runtime context.
pub trait Executor: Send {
    /// Installs the per-opcode cost table. Called once per engine lifetime,
    /// before any instance is created.
    fn set_opcode_costs(&mut self, costs: &OpcodeCosts);

    /// Compiles `code` and instantiates it.
    fn new_instance(
        &self,
        code: &[u8],
        options: &CompilationOptions,
    ) -> ExecutorResult<InstanceRef>;

    /// Instantiates a previously compiled artifact (see [`Instance::cache`]).
    fn new_instance_from_compiled(
        &self,
        compiled_code: &[u8],
        options: &CompilationOptions,
    ) -> ExecutorResult<InstanceRef>;
}
