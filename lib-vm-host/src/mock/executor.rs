//! A scriptable stand-in for the execution engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::errors::{ExecutorError, ExecutorResult};
use crate::executor::{CompilationOptions, Executor, InstanceRef};
use crate::gas::OpcodeCosts;
use crate::mock::MockInstance;

/// Checks the 8-byte WASM module header: magic `\0asm` plus version 1.
pub fn is_wasm_module_header(code: &[u8]) -> bool {
    code.len() >= 8 && &code[0..4] == b"\0asm" && code[4..8] == [1, 0, 0, 0]
}

/// Engine mock: instantiation is a lookup in a registry of template
/// instances keyed by contract code.
///
/// Every instantiation clones the template, so two concurrent instances of
/// the same contract never share memory, exactly like separately
/// instantiated modules. Unregistered code is subjected to the same header
/// validation a real engine front-end performs.
#[derive(Default)]
pub struct MockExecutor {
    templates: HashMap<Vec<u8>, MockInstance>,
    opcode_costs: OpcodeCosts,
}

impl MockExecutor {
    pub fn new() -> Self {
        MockExecutor::default()
    }

    /// Registers `template` under its own code bytes.
    pub fn register_contract(&mut self, template: MockInstance) {
        self.templates.insert(template.code.clone(), template);
    }

    /// The last opcode cost table installed, for assertions.
    pub fn opcode_costs(&self) -> &OpcodeCosts {
        &self.opcode_costs
    }

    fn instantiate(&self, code: &[u8], options: &CompilationOptions) -> ExecutorResult<InstanceRef> {
        if code.is_empty() {
            return Err(ExecutorError::InvalidBytecode);
        }

        if let Some(template) = self.templates.get(code) {
            let mut instance = template.clone();
            instance.points = 0;
            instance.gas_limit = options.gas_limit;
            instance.breakpoint = Default::default();
            instance.cleaned = false;
            trace!(code_len = code.len(), "instantiated mock contract");
            return Ok(Arc::new(Mutex::new(instance)));
        }

        if !is_wasm_module_header(code) {
            return Err(ExecutorError::InvalidBytecode);
        }
        Err(ExecutorError::InstantiationFailed(
            "no template registered for this module".to_string(),
        ))
    }
}

impl Executor for MockExecutor {
    fn set_opcode_costs(&mut self, costs: &OpcodeCosts) {
        self.opcode_costs = costs.clone();
    }

    fn new_instance(
        &self,
        code: &[u8],
        options: &CompilationOptions,
    ) -> ExecutorResult<InstanceRef> {
        self.instantiate(code, options)
    }

    fn new_instance_from_compiled(
        &self,
        compiled_code: &[u8],
        options: &CompilationOptions,
    ) -> ExecutorResult<InstanceRef> {
        // Mock instances "compile" to their own code bytes (see
        // `MockInstance::cache`), so the lookup is identical.
        self.instantiate(compiled_code, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Instance;
    use crate::gas::GasSchedule;

    fn registered_executor() -> MockExecutor {
        let mut executor = MockExecutor::new();
        let mut template = MockInstance::new(b"registered code".to_vec());
        template.add_method("init", |_| {});
        executor.register_contract(template);
        executor
    }

    #[test]
    fn test_empty_code_is_invalid_bytecode() {
        let executor = MockExecutor::new();
        let result = executor.new_instance(&[], &CompilationOptions::default());
        assert_eq!(result.err(), Some(ExecutorError::InvalidBytecode));
    }

    #[test]
    fn test_garbage_code_is_invalid_bytecode() {
        let executor = MockExecutor::new();
        let result = executor.new_instance(b"contract", &CompilationOptions::default());
        assert_eq!(result.err(), Some(ExecutorError::InvalidBytecode));
    }

    #[test]
    fn test_wasm_header_validation() {
        assert!(is_wasm_module_header(b"\0asm\x01\0\0\0"));
        assert!(is_wasm_module_header(b"\0asm\x01\0\0\0extra sections"));
        assert!(!is_wasm_module_header(b"\0asm"));
        assert!(!is_wasm_module_header(b"\0asm\x02\0\0\0"));
        assert!(!is_wasm_module_header(b"contract"));
        assert!(!is_wasm_module_header(b""));
    }

    #[test]
    fn test_well_formed_but_unregistered_code_fails_instantiation() {
        let executor = MockExecutor::new();
        let result = executor.new_instance(b"\0asm\x01\0\0\0....", &CompilationOptions::default());
        assert!(matches!(
            result.err(),
            Some(ExecutorError::InstantiationFailed(_))
        ));
    }

    #[test]
    fn test_registered_code_instantiates_a_fresh_clone() {
        let executor = registered_executor();
        let options = CompilationOptions {
            gas_limit: 5000,
            ..CompilationOptions::default()
        };

        let first = executor.new_instance(b"registered code", &options).unwrap();
        let second = executor.new_instance(b"registered code", &options).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));

        let guard = first.lock().unwrap();
        assert_eq!(guard.points_used(), 0);
        assert!(guard.has_function("init"));
    }

    #[test]
    fn test_instances_do_not_share_memory() {
        let executor = registered_executor();
        let options = CompilationOptions::default();

        let first = executor.new_instance(b"registered code", &options).unwrap();
        let second = executor.new_instance(b"registered code", &options).unwrap();

        first.lock().unwrap().memory_data_mut()[0] = 0xFF;
        assert_eq!(second.lock().unwrap().memory_data()[0], 0);
    }

    #[test]
    fn test_compiled_artifact_round_trip() {
        let executor = registered_executor();
        let options = CompilationOptions::default();

        let instance = executor.new_instance(b"registered code", &options).unwrap();
        let compiled = instance.lock().unwrap().cache().unwrap();
        let reloaded = executor.new_instance_from_compiled(&compiled, &options);
        assert!(reloaded.is_ok());
    }

    #[test]
    fn test_opcode_costs_are_stored() {
        let mut executor = MockExecutor::new();
        let schedule = GasSchedule::for_tests();
        executor.set_opcode_costs(schedule.opcode_costs());
        assert_eq!(executor.opcode_costs(), schedule.opcode_costs());
    }
}
