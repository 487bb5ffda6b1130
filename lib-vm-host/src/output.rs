//! Output accumulation seam.
//!
//! The runtime context reports outcomes (return code, message, finish data)
//! through [`OutputHandler`]; the full output subsystem of a node host can
//! implement it, and [`OutputContext`] is the self-contained default used by
//! tests and the standalone VM process.

use std::sync::{Arc, Mutex};

use lib_vm_common::{ReturnCode, VMOutput};

/// Where the runtime writes per-call results.
pub trait OutputHandler: Send {
    fn return_code(&self) -> ReturnCode;

    fn set_return_code(&mut self, code: ReturnCode);

    fn return_message(&self) -> String;

    fn set_return_message(&mut self, message: &str);

    /// Appends one finish value to the returned data, in call order.
    fn append_return_data(&mut self, data: Vec<u8>);

    fn return_data(&self) -> Vec<Vec<u8>>;
}

/// Shared handle to an output handler, cloneable across the runtime and the
/// hook implementations.
pub type OutputRef = Arc<Mutex<dyn OutputHandler>>;

/// Plain in-memory output accumulator.
#[derive(Debug, Clone, Default)]
pub struct OutputContext {
    return_code: ReturnCode,
    return_message: String,
    return_data: Vec<Vec<u8>>,
}

impl OutputContext {
    pub fn new() -> Self {
        OutputContext::default()
    }

    /// New accumulator already wrapped for sharing with a runtime context.
    pub fn shared() -> Arc<Mutex<OutputContext>> {
        Arc::new(Mutex::new(OutputContext::new()))
    }

    /// Resets all accumulated state for the next call.
    pub fn reset(&mut self) {
        *self = OutputContext::default();
    }

    /// Produces the final output of a call.
    pub fn finalize(&self, gas_limit: u64, points_used: u64) -> VMOutput {
        VMOutput {
            return_data: self.return_data.clone(),
            return_code: self.return_code,
            return_message: self.return_message.clone(),
            gas_remaining: gas_limit.saturating_sub(points_used),
        }
    }
}

impl OutputHandler for OutputContext {
    fn return_code(&self) -> ReturnCode {
        self.return_code
    }

    fn set_return_code(&mut self, code: ReturnCode) {
        self.return_code = code;
    }

    fn return_message(&self) -> String {
        self.return_message.clone()
    }

    fn set_return_message(&mut self, message: &str) {
        self.return_message = message.to_string();
    }

    fn append_return_data(&mut self, data: Vec<u8>) {
        self.return_data.push(data);
    }

    fn return_data(&self) -> Vec<Vec<u8>> {
        self.return_data.clone()
    }
}
