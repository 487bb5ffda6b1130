//! Error types of the VM host.
//!
//! Engine-boundary failures ([`ExecutorError`]) are distinct from host-side
//! failures ([`RuntimeError`]): the former come out of compile/instantiate/
//! call operations, the latter out of the runtime context's own checks
//! (memory bounds, stack depth, function resolution).

use thiserror::Error;

use crate::executor::BreakpointValue;

/// Failure reported by the execution engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("invalid bytecode")]
    InvalidBytecode,

    #[error("could not create instance: {0}")]
    InstantiationFailed(String),

    #[error("function not found")]
    FuncNotFound,

    #[error("wrong signature for function")]
    FuncWrongSignature,

    #[error("memory grow failed")]
    MemoryGrowFailed,

    #[error("breakpoint triggered: {0}")]
    Breakpoint(BreakpointValue),

    #[error("execution trapped: {0}")]
    Trap(String),
}

/// Failure produced by the runtime context itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("bad bounds")]
    BadBounds,

    #[error("bad lower bounds")]
    BadLowerBounds,

    #[error("bad upper bounds")]
    BadUpperBounds,

    #[error("negative length")]
    NegativeLength,

    #[error("max instances reached")]
    MaxInstancesReached,

    #[error("no instance is currently running")]
    NoInstance,

    #[error("instance has no memory")]
    NoMemory,

    #[error("instance lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

impl RuntimeError {
    /// True for every out-of-bounds memory failure, regardless of which
    /// bound was violated.
    pub fn is_bounds_error(&self) -> bool {
        matches!(
            self,
            RuntimeError::BadBounds | RuntimeError::BadLowerBounds | RuntimeError::BadUpperBounds
        )
    }
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
pub type RuntimeResult<T> = Result<T, RuntimeError>;
