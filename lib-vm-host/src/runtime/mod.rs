//! The runtime context and everything it owns: call frames, instance
//! stacks, bounds-checked memory access and the warm-instance cache.

mod context;
pub mod memory;
mod warm_cache;

pub use context::{breakpoint_return_code, RuntimeContext, DEFAULT_MAX_INSTANCE_STACK_SIZE};
pub use warm_cache::{
    code_hash, CacheStats, CodeHash, WarmInstanceCache, DEFAULT_WARM_INSTANCE_CACHE_SIZE,
};

/// Reserved export name of a contract's one-time initializer.
pub const INIT_FUNCTION_NAME: &str = "init";
