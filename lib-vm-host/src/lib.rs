//! Host runtime for the WASM contract VM.
//!
//! A node hands this crate a call or deploy request; the host obtains a
//! compiled instance (warm cache first, engine second), binds the guest's
//! imports to the hook layer, runs the requested export under gas metering,
//! and reports a structured result. Nested cross-contract calls push the
//! caller's frame and instance onto LIFO stacks and restore them on return.
//!
//! The execution engine is a collaborator behind the [`executor::Executor`]
//! and [`executor::Instance`] traits; [`mock`] provides the engine-free
//! implementations the test suites run against.

pub mod errors;
pub mod executor;
pub mod gas;
pub mod hooks;
pub mod mock;
pub mod output;
pub mod runtime;

pub use errors::{ExecutorError, ExecutorResult, RuntimeError, RuntimeResult};
pub use executor::{
    BreakpointValue, CompilationOptions, Executor, Instance, InstanceRef, WASM_PAGE_SIZE,
};
pub use gas::{GasSchedule, OpcodeCosts};
pub use hooks::{
    ei_metadata, vm_hook_function_pointers, EIMetadata, VMHookFunctionPointers, VMHooks,
    VMHooksContext, VMHooksDefault, VM_HOOK_IMPORT_NAMES,
};
pub use output::{OutputContext, OutputHandler, OutputRef};
pub use runtime::{
    breakpoint_return_code, code_hash, RuntimeContext, DEFAULT_MAX_INSTANCE_STACK_SIZE,
    INIT_FUNCTION_NAME,
};
