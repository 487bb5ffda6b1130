//! Engine-free mocks.
//!
//! [`MockExecutor`] and [`MockInstance`] stand in for a real WASM engine so
//! the runtime context, hook layer and protocol handlers can be exercised
//! without compiling actual contracts: a mock contract is a set of named
//! Rust closures registered as exports. The module is public because
//! downstream crates drive their own integration tests with it.

mod executor;
mod instance;

pub use executor::{is_wasm_module_header, MockExecutor};
pub use instance::{MockInstance, MockMethod};
