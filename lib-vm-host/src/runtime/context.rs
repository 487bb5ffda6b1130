//! The runtime context: owner of the current execution state.
//!
//! One context drives one guest at a time. It holds the operative call
//! frame (input, code address, function, read-only flag), the current
//! instance, and the two parallel LIFO stacks that make nested
//! cross-contract calls re-entrant: callers push their frame and instance,
//! start the callee, and pop on return. The warm-instance cache lives here
//! too, so instance lifetime decisions stay in one place.

use std::error::Error;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use lib_vm_common::{ContractCallInput, ReturnCode};

use crate::errors::{ExecutorError, RuntimeError, RuntimeResult};
use crate::executor::{
    BreakpointValue, CompilationOptions, Executor, Instance, InstanceRef,
};
use crate::hooks::{VMHooks, VMHooksContext};
use crate::output::{OutputHandler, OutputRef};
use crate::runtime::memory;
use crate::runtime::warm_cache::{code_hash, WarmInstanceCache, DEFAULT_WARM_INSTANCE_CACHE_SIZE};

/// Default limit on nested instance starts.
pub const DEFAULT_MAX_INSTANCE_STACK_SIZE: usize = 10;

/// Saved per-call state, restored when a nested call returns.
#[derive(Debug, Clone, Default)]
struct CallFrame {
    vm_input: ContractCallInput,
    code_address: Vec<u8>,
    call_function: String,
    read_only: bool,
}

/// Maps an observed breakpoint to the output return code it stands for.
///
/// `AsyncCall` deliberately maps to `Ok`: the guest stopped on purpose and
/// the caller interprets the tag after the engine returns.
pub fn breakpoint_return_code(breakpoint: BreakpointValue) -> ReturnCode {
    match breakpoint {
        BreakpointValue::None => ReturnCode::Ok,
        BreakpointValue::AsyncCall => ReturnCode::Ok,
        BreakpointValue::SignalError => ReturnCode::UserError,
        BreakpointValue::OutOfGas => ReturnCode::OutOfGas,
        BreakpointValue::ExecutionFailed => ReturnCode::ExecutionFailed,
        BreakpointValue::MemoryLimit => ReturnCode::ExecutionFailed,
    }
}

pub struct RuntimeContext {
    executor: Box<dyn Executor>,
    vm_type: Vec<u8>,
    output: OutputRef,

    vm_input: ContractCallInput,
    code_address: Vec<u8>,
    call_function: String,
    read_only: bool,

    instance: Option<InstanceRef>,
    state_stack: Vec<CallFrame>,
    instance_stack: Vec<Option<InstanceRef>>,

    warm_cache: WarmInstanceCache,
    max_instance_stack_size: usize,
    hooks: Option<Box<VMHooksContext>>,
}

impl RuntimeContext {
    pub fn new(executor: Box<dyn Executor>, vm_type: Vec<u8>, output: OutputRef) -> Self {
        let mut context = RuntimeContext {
            executor,
            vm_type,
            output,
            vm_input: ContractCallInput::default(),
            code_address: Vec::new(),
            call_function: String::new(),
            read_only: false,
            instance: None,
            state_stack: Vec::new(),
            instance_stack: Vec::new(),
            warm_cache: WarmInstanceCache::new(DEFAULT_WARM_INSTANCE_CACHE_SIZE),
            max_instance_stack_size: DEFAULT_MAX_INSTANCE_STACK_SIZE,
            hooks: None,
        };
        context.init_state();
        context
    }

    /// Rebuilds the warm cache with a different capacity. Meant for
    /// construction time; existing warm instances are dropped.
    pub fn with_warm_cache_capacity(mut self, capacity: usize) -> Self {
        self.warm_cache.clear();
        self.warm_cache = WarmInstanceCache::new(capacity);
        self
    }

    /// Installs the hook object whose address every started instance gets
    /// in its context-data slot. The runtime keeps the object alive for as
    /// long as instances may call back into it.
    pub fn set_vm_hooks(&mut self, hooks: Box<dyn VMHooks>) {
        self.hooks = Some(VMHooksContext::new(hooks));
    }

    // ------------------------------------------------------------------
    // Frame state
    // ------------------------------------------------------------------

    /// Resets the operative frame to its zero value.
    pub fn init_state(&mut self) {
        self.vm_input = ContractCallInput::default();
        self.code_address = Vec::new();
        self.call_function = String::new();
        self.read_only = false;
    }

    /// Populates the operative frame from a call input.
    pub fn init_state_from_call_input(&mut self, input: &ContractCallInput) {
        self.set_vm_input(input.clone());
        self.code_address = input.recipient_addr.clone();
        self.call_function = input.function.clone();
    }

    pub fn set_vm_input(&mut self, input: ContractCallInput) {
        self.vm_input = input;
    }

    pub fn vm_input(&self) -> &ContractCallInput {
        &self.vm_input
    }

    pub fn set_code_address(&mut self, address: Vec<u8>) {
        self.code_address = address;
    }

    pub fn code_address(&self) -> &[u8] {
        &self.code_address
    }

    /// Address of the account this frame executes as: the call recipient.
    pub fn context_address(&self) -> &[u8] {
        &self.vm_input.recipient_addr
    }

    pub fn function_name(&self) -> &str {
        &self.call_function
    }

    pub fn arguments(&self) -> &[Vec<u8>] {
        &self.vm_input.vm_input.arguments
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn vm_type(&self) -> &[u8] {
        &self.vm_type
    }

    pub fn set_max_instance_stack_size(&mut self, size: usize) {
        self.max_instance_stack_size = size;
    }

    // ------------------------------------------------------------------
    // Instance lifecycle
    // ------------------------------------------------------------------

    /// Makes an instance of `code` the current one, reusing a warm instance
    /// when allowed.
    ///
    /// `new_code` forces a fresh compilation (redeployments must not reuse
    /// an instance built from the previous code). A warm instance that is
    /// still executing somewhere up the call stack is never reused.
    pub fn start_instance(
        &mut self,
        code: &[u8],
        gas_limit: u64,
        new_code: bool,
    ) -> RuntimeResult<()> {
        if self.instance_stack.len() >= self.max_instance_stack_size {
            return Err(RuntimeError::MaxInstancesReached);
        }

        let key = code_hash(code);
        if !new_code {
            if let Some(warm) = self.warm_cache.get(&key) {
                if self.is_instance_on_stack(&warm) {
                    trace!("warm instance busy on the call stack, compiling fresh");
                } else {
                    {
                        let mut guard =
                            warm.lock().map_err(|_| RuntimeError::LockPoisoned)?;
                        guard.reset();
                        guard.set_gas_limit(gas_limit);
                    }
                    debug!(gas_limit, "reusing warm instance");
                    self.instance = Some(warm);
                    self.bind_hooks_context();
                    return Ok(());
                }
            }
        }

        let options = CompilationOptions {
            gas_limit,
            ..CompilationOptions::default()
        };
        let instance = self.executor.new_instance(code, &options)?;
        debug!(code_len = code.len(), gas_limit, "instantiated contract code");

        self.warm_cache.insert(key, Arc::clone(&instance));
        self.instance = Some(instance);
        self.bind_hooks_context();
        Ok(())
    }

    fn bind_hooks_context(&mut self) {
        let Some(hooks_context) = &self.hooks else {
            return;
        };
        let context_ptr = hooks_context.context_ptr();
        let _ = self.with_instance_mut(|instance| instance.set_context_data(context_ptr));
    }

    /// Shared handle to the current instance, if one is running.
    pub fn instance(&self) -> Option<InstanceRef> {
        self.instance.clone()
    }

    /// Drops all warm instances and the current one.
    pub fn clear_warm_instance_cache(&mut self) {
        self.warm_cache.clear();
        self.instance = None;
    }

    fn is_instance_on_stack(&self, instance: &InstanceRef) -> bool {
        self.instance_stack
            .iter()
            .flatten()
            .any(|stacked| Arc::ptr_eq(stacked, instance))
    }

    // ------------------------------------------------------------------
    // Function resolution and invocation
    // ------------------------------------------------------------------

    /// The requested function name, validated against the instance exports.
    pub fn function_name_checked(&self) -> RuntimeResult<String> {
        let function_name = self.call_function.clone();
        if self.has_function(&function_name) {
            Ok(function_name)
        } else {
            Err(ExecutorError::FuncNotFound.into())
        }
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.with_instance(|instance| instance.has_function(name))
            .unwrap_or(false)
    }

    pub fn is_function_imported(&self, name: &str) -> bool {
        self.with_instance(|instance| instance.is_function_imported(name))
            .unwrap_or(false)
    }

    /// Runs the frame's requested function on the current instance.
    ///
    /// The gas limit is (re)armed and the breakpoint cleared before entering
    /// the guest; afterwards the observed breakpoint decides the return
    /// code. A stop the hooks already reported (user error, host abort)
    /// leaves the output untouched; a bare trap or out-of-gas stop is
    /// recorded here, since nobody else saw it.
    pub fn execute_current_function(&mut self) -> RuntimeResult<ReturnCode> {
        let function_name = self.function_name_checked()?;
        let gas_limit = self.vm_input.vm_input.gas_provided;

        self.with_instance_mut(|instance| {
            instance.set_gas_limit(gas_limit);
            instance.set_breakpoint_value(BreakpointValue::None);
        })?;

        let call_result = self.with_instance_mut(|instance| {
            instance.call_function(&function_name)
        })?;

        let breakpoint = self.get_runtime_breakpoint_value();
        match call_result {
            Ok(()) => Ok(ReturnCode::Ok),
            Err(call_error) => {
                let return_code = match breakpoint {
                    BreakpointValue::None => ReturnCode::ExecutionFailed,
                    observed => breakpoint_return_code(observed),
                };
                if matches!(
                    breakpoint,
                    BreakpointValue::None | BreakpointValue::OutOfGas
                ) {
                    self.with_output(|output| {
                        if output.return_code() == ReturnCode::Ok {
                            output.set_return_code(return_code);
                            output.set_return_message(&call_error.to_string());
                        }
                    });
                }
                debug!(%breakpoint, %return_code, "guest stopped");
                Ok(return_code)
            }
        }
    }

    // ------------------------------------------------------------------
    // Memory access
    // ------------------------------------------------------------------

    pub fn mem_load(&self, offset: i32, length: i32) -> RuntimeResult<Vec<u8>> {
        self.with_instance(|instance| memory::load(instance, offset, length))?
    }

    pub fn mem_store(&mut self, offset: i32, data: &[u8]) -> RuntimeResult<()> {
        self.with_instance_mut(|instance| memory::store(instance, offset, data))?
    }

    // ------------------------------------------------------------------
    // State and instance stacks
    // ------------------------------------------------------------------

    /// Saves a copy of the operative frame and the current instance.
    /// The operative frame itself is untouched.
    pub fn push_state(&mut self) {
        self.state_stack.push(CallFrame {
            vm_input: self.vm_input.clone(),
            code_address: self.code_address.clone(),
            call_function: self.call_function.clone(),
            read_only: self.read_only,
        });
        self.push_instance();
    }

    /// Restores the most recently saved frame and instance. No-op when
    /// nothing is saved.
    pub fn pop_set_active_state(&mut self) {
        let Some(frame) = self.state_stack.pop() else {
            return;
        };
        self.pop_instance();

        self.vm_input = frame.vm_input;
        self.code_address = frame.code_address;
        self.call_function = frame.call_function;
        self.read_only = frame.read_only;
    }

    /// Drops the most recently saved frame and instance without restoring
    /// them. No-op when nothing is saved.
    pub fn pop_discard(&mut self) {
        if self.state_stack.pop().is_none() {
            return;
        }
        if let Some(discarded) = self.instance_stack.pop() {
            self.clean_if_unreferenced(discarded);
        }
    }

    /// Drops every saved frame and instance.
    pub fn clear_state_stack(&mut self) {
        self.state_stack.clear();
        while let Some(instance) = self.instance_stack.pop() {
            self.clean_if_unreferenced(instance);
        }
    }

    /// Saves the current instance on the instance stack, leaving it current.
    /// Used when the callee's frame is initialized separately.
    pub fn push_instance(&mut self) {
        self.instance_stack.push(self.instance.clone());
    }

    /// Makes the most recently saved instance current again. No-op on an
    /// empty stack.
    pub fn pop_instance(&mut self) {
        let Some(top) = self.instance_stack.pop() else {
            return;
        };
        let replaced = std::mem::replace(&mut self.instance, top);
        self.clean_if_unreferenced(replaced);
    }

    pub fn state_stack_depth(&self) -> usize {
        self.state_stack.len()
    }

    pub fn instance_stack_depth(&self) -> usize {
        self.instance_stack.len()
    }

    /// Number of saved frames executing the contract at `address`,
    /// excluding the operative frame. Non-zero means re-entrancy.
    pub fn count_same_contract_instances_on_stack(&self, address: &[u8]) -> u64 {
        self.state_stack
            .iter()
            .filter(|frame| frame.code_address == address)
            .count() as u64
    }

    // ------------------------------------------------------------------
    // Breakpoints, gas and failure signalling
    // ------------------------------------------------------------------

    pub fn set_runtime_breakpoint_value(&mut self, value: BreakpointValue) {
        let _ = self.with_instance_mut(|instance| instance.set_breakpoint_value(value));
    }

    pub fn get_runtime_breakpoint_value(&self) -> BreakpointValue {
        self.with_instance(|instance| instance.breakpoint_value())
            .unwrap_or_default()
    }

    pub fn set_points_used(&mut self, points: u64) {
        let _ = self.with_instance_mut(|instance| instance.set_points_used(points));
    }

    pub fn points_used(&self) -> u64 {
        self.with_instance(|instance| instance.points_used())
            .unwrap_or(0)
    }

    /// Records a guest-raised domain error and stops the guest at the next
    /// metered boundary.
    pub fn signal_user_error(&mut self, message: &str) {
        debug!(message, "user error signalled");
        self.with_output(|output| {
            output.set_return_code(ReturnCode::UserError);
            output.set_return_message(message);
        });
        self.set_runtime_breakpoint_value(BreakpointValue::SignalError);
    }

    /// Aborts the current execution from the host side. Without an error
    /// the message is the literal `"execution failed"`.
    pub fn fail_execution(&mut self, error: Option<&dyn Error>) {
        let message = match error {
            Some(error) => error.to_string(),
            None => "execution failed".to_string(),
        };
        warn!(%message, "host aborted execution");
        self.with_output(|output| {
            output.set_return_code(ReturnCode::ExecutionFailed);
            output.set_return_message(&message);
        });
        self.set_runtime_breakpoint_value(BreakpointValue::ExecutionFailed);
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn with_instance<R>(&self, action: impl FnOnce(&dyn Instance) -> R) -> RuntimeResult<R> {
        let instance = self.instance.as_ref().ok_or(RuntimeError::NoInstance)?;
        let guard = instance.lock().map_err(|_| RuntimeError::LockPoisoned)?;
        Ok(action(&*guard))
    }

    fn with_instance_mut<R>(
        &self,
        action: impl FnOnce(&mut dyn Instance) -> R,
    ) -> RuntimeResult<R> {
        let instance = self.instance.as_ref().ok_or(RuntimeError::NoInstance)?;
        let mut guard = instance.lock().map_err(|_| RuntimeError::LockPoisoned)?;
        Ok(action(&mut *guard))
    }

    fn with_output(&self, action: impl FnOnce(&mut dyn OutputHandler)) {
        if let Ok(mut guard) = self.output.lock() {
            action(&mut *guard);
        }
    }

    fn clean_if_unreferenced(&mut self, instance: Option<InstanceRef>) {
        let Some(instance) = instance else {
            return;
        };
        if Arc::strong_count(&instance) == 1 {
            if let Ok(mut guard) = instance.lock() {
                guard.clean();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockExecutor, MockInstance};
    use crate::output::OutputContext;
    use lib_vm_common::{TokenTransfer, TokenType, VMInput};
    use std::sync::Mutex;

    const COUNTER_CODE: &[u8] = b"counter contract code";

    fn counter_mock() -> MockInstance {
        let mut instance = MockInstance::new(COUNTER_CODE.to_vec());
        instance.add_method("init", |_| {});
        instance.add_method("increment", |_| {});
        instance.add_method("getSum", |_| {});
        instance.set_imported_functions(&["int64storageLoad", "int64storageStore", "int64finish"]);
        instance
    }

    fn make_runtime() -> (RuntimeContext, Arc<Mutex<OutputContext>>) {
        let mut executor = MockExecutor::new();
        executor.register_contract(counter_mock());
        let output = OutputContext::shared();
        let runtime = RuntimeContext::new(
            Box::new(executor),
            b"type".to_vec(),
            output.clone(),
        );
        (runtime, output)
    }

    fn bare_instance_ref() -> InstanceRef {
        Arc::new(Mutex::new(MockInstance::new(b"bare".to_vec())))
    }

    #[test]
    fn test_new_runtime_context_is_zeroed() {
        let (runtime, _) = make_runtime();
        assert_eq!(runtime.vm_input(), &ContractCallInput::default());
        assert_eq!(runtime.code_address(), b"");
        assert_eq!(runtime.function_name(), "");
        assert!(!runtime.read_only());
        assert!(runtime.instance().is_none());
    }

    #[test]
    fn test_init_state_resets_the_frame() {
        let (mut runtime, _) = make_runtime();
        runtime.set_code_address(b"some address".to_vec());
        runtime.call_function = "a function".to_string();
        runtime.set_read_only(true);

        runtime.init_state();

        assert_eq!(runtime.vm_input(), &ContractCallInput::default());
        assert_eq!(runtime.code_address(), b"");
        assert_eq!(runtime.function_name(), "");
        assert!(!runtime.read_only());
    }

    #[test]
    fn test_start_instance_rejects_bad_bytecode() {
        let (mut runtime, _) = make_runtime();
        runtime.set_max_instance_stack_size(1);

        let gas_limit = 100_000_000u64;
        let result = runtime.start_instance(&[], gas_limit, false);
        assert_eq!(
            result,
            Err(RuntimeError::Executor(ExecutorError::InvalidBytecode))
        );

        let result = runtime.start_instance(b"contract", gas_limit, false);
        assert!(result.is_err());

        runtime.start_instance(COUNTER_CODE, gas_limit, false).unwrap();
        assert_eq!(
            runtime.get_runtime_breakpoint_value(),
            BreakpointValue::None
        );
    }

    #[test]
    fn test_is_function_imported() {
        let (mut runtime, _) = make_runtime();
        runtime.set_max_instance_stack_size(1);
        runtime.start_instance(COUNTER_CODE, 100_000_000, false).unwrap();

        assert!(runtime.is_function_imported("int64storageLoad"));
        assert!(runtime.is_function_imported("int64storageStore"));
        assert!(runtime.is_function_imported("int64finish"));

        // Hooks that exist but are not imported by this module.
        assert!(!runtime.is_function_imported("transferValue"));
        assert!(!runtime.is_function_imported("executeOnSameContext"));
        assert!(!runtime.is_function_imported("asyncCall"));

        // Names that are not hooks at all.
        assert!(!runtime.is_function_imported(""));
        assert!(!runtime.is_function_imported("*"));
        assert!(!runtime.is_function_imported("$@%"));
        assert!(!runtime.is_function_imported("doesNotExist"));
    }

    #[test]
    fn test_state_setters_and_getters() {
        let (mut runtime, _) = make_runtime();

        let arguments = vec![b"argument 1".to_vec(), b"argument 2".to_vec()];
        let transfer = TokenTransfer {
            value: 4242,
            token_name: b"random_token".to_vec(),
            token_type: TokenType::NonFungible,
            token_nonce: 94,
        };
        let input = ContractCallInput {
            vm_input: VMInput {
                caller_addr: b"caller".to_vec(),
                arguments: arguments.clone(),
                call_value: 0,
                gas_provided: 0,
                token_transfers: vec![transfer.clone()],
            },
            recipient_addr: b"recipient".to_vec(),
            function: "test function".to_string(),
        };

        runtime.init_state_from_call_input(&input);
        assert_eq!(runtime.vm_input().vm_input.caller_addr, b"caller");
        assert_eq!(runtime.context_address(), b"recipient");
        assert_eq!(runtime.function_name(), "test function");
        assert_eq!(runtime.vm_type(), b"type");
        assert_eq!(runtime.arguments(), arguments.as_slice());

        let stored_transfer = &runtime.vm_input().vm_input.token_transfers[0];
        assert_eq!(stored_transfer.value, 4242);
        assert_eq!(stored_transfer.token_name, b"random_token");
        assert_eq!(stored_transfer.token_type, TokenType::NonFungible);
        assert_eq!(stored_transfer.token_nonce, 94);

        let input2 = ContractCallInput {
            vm_input: VMInput {
                caller_addr: b"caller2".to_vec(),
                arguments,
                ..VMInput::default()
            },
            ..ContractCallInput::default()
        };
        runtime.set_vm_input(input2);
        assert_eq!(runtime.vm_input().vm_input.caller_addr, b"caller2");

        runtime.set_code_address(b"smartcontract".to_vec());
        assert_eq!(runtime.code_address(), b"smartcontract");
    }

    #[test]
    fn test_push_pop_instance() {
        let (mut runtime, _) = make_runtime();
        runtime.set_max_instance_stack_size(1);
        runtime.start_instance(COUNTER_CODE, 100_000_000, false).unwrap();

        let started = runtime.instance().unwrap();

        runtime.push_instance();
        runtime.instance = None;
        assert_eq!(runtime.instance_stack_depth(), 1);

        runtime.pop_instance();
        let restored = runtime.instance().unwrap();
        assert!(Arc::ptr_eq(&started, &restored));
        assert_eq!(runtime.instance_stack_depth(), 0);

        runtime.push_instance();
        assert_eq!(runtime.instance_stack_depth(), 1);
    }

    #[test]
    fn test_push_pop_state() {
        let (mut runtime, _) = make_runtime();
        runtime.set_max_instance_stack_size(1);

        let function_name = "test_func".to_string();
        let contract_address = b"smartcontract".to_vec();
        let input = ContractCallInput {
            vm_input: VMInput {
                caller_addr: b"caller".to_vec(),
                gas_provided: 1000,
                ..VMInput::default()
            },
            recipient_addr: contract_address.clone(),
            function: function_name.clone(),
        };
        runtime.init_state_from_call_input(&input);

        runtime.instance = Some(bare_instance_ref());
        runtime.push_state();
        assert_eq!(runtime.state_stack_depth(), 1);
        assert_eq!(runtime.instance_stack_depth(), 1);

        // Change the operative frame.
        runtime.set_code_address(b"dummy".to_vec());
        runtime.set_vm_input(ContractCallInput::default());
        runtime.set_read_only(true);

        assert_eq!(runtime.code_address(), b"dummy");
        assert!(runtime.read_only());

        runtime.pop_set_active_state();

        // The saved frame is back.
        assert_eq!(runtime.context_address(), contract_address.as_slice());
        assert_eq!(runtime.function_name(), function_name);
        assert_eq!(runtime.vm_input(), &input);
        assert!(!runtime.read_only());
        assert!(runtime.arguments().is_empty());

        runtime.instance = Some(bare_instance_ref());
        runtime.push_state();
        assert_eq!(runtime.state_stack_depth(), 1);

        runtime.instance = Some(bare_instance_ref());
        runtime.push_state();
        assert_eq!(runtime.state_stack_depth(), 2);

        runtime.pop_discard();
        assert_eq!(runtime.state_stack_depth(), 1);
        assert_eq!(runtime.instance_stack_depth(), 1);

        runtime.clear_state_stack();
        assert_eq!(runtime.state_stack_depth(), 0);
        assert_eq!(runtime.instance_stack_depth(), 0);
    }

    #[test]
    fn test_count_same_contract_instances_on_stack() {
        let alpha = b"alpha".to_vec();
        let beta = b"beta".to_vec();
        let gamma = b"gamma".to_vec();

        let (mut runtime, _) = make_runtime();

        let mut input = ContractCallInput {
            vm_input: VMInput {
                caller_addr: b"caller".to_vec(),
                gas_provided: 1000,
                ..VMInput::default()
            },
            recipient_addr: Vec::new(),
            function: "function".to_string(),
        };

        input.recipient_addr = alpha.clone();
        runtime.init_state_from_call_input(&input);
        assert_eq!(runtime.count_same_contract_instances_on_stack(&alpha), 0);
        assert_eq!(runtime.count_same_contract_instances_on_stack(&beta), 0);
        assert_eq!(runtime.count_same_contract_instances_on_stack(&gamma), 0);

        runtime.instance = Some(bare_instance_ref());
        runtime.push_state();
        input.recipient_addr = beta.clone();
        runtime.init_state_from_call_input(&input);
        assert_eq!(runtime.count_same_contract_instances_on_stack(&alpha), 1);
        assert_eq!(runtime.count_same_contract_instances_on_stack(&beta), 0);
        assert_eq!(runtime.count_same_contract_instances_on_stack(&gamma), 0);

        runtime.instance = Some(bare_instance_ref());
        runtime.push_state();
        input.recipient_addr = gamma.clone();
        runtime.init_state_from_call_input(&input);
        assert_eq!(runtime.count_same_contract_instances_on_stack(&alpha), 1);
        assert_eq!(runtime.count_same_contract_instances_on_stack(&beta), 1);
        assert_eq!(runtime.count_same_contract_instances_on_stack(&gamma), 0);

        runtime.instance = Some(bare_instance_ref());
        runtime.push_state();
        input.recipient_addr = alpha.clone();
        runtime.init_state_from_call_input(&input);
        assert_eq!(runtime.count_same_contract_instances_on_stack(&alpha), 1);
        assert_eq!(runtime.count_same_contract_instances_on_stack(&beta), 1);
        assert_eq!(runtime.count_same_contract_instances_on_stack(&gamma), 1);

        runtime.push_state();
        input.recipient_addr = gamma.clone();
        runtime.init_state_from_call_input(&input);
        assert_eq!(runtime.count_same_contract_instances_on_stack(&alpha), 2);
        assert_eq!(runtime.count_same_contract_instances_on_stack(&beta), 1);
        assert_eq!(runtime.count_same_contract_instances_on_stack(&gamma), 1);

        runtime.pop_set_active_state();
        runtime.pop_set_active_state();
        assert_eq!(runtime.count_same_contract_instances_on_stack(&alpha), 1);
        assert_eq!(runtime.count_same_contract_instances_on_stack(&beta), 1);
        assert_eq!(runtime.count_same_contract_instances_on_stack(&gamma), 0);

        runtime.pop_discard();
        assert_eq!(runtime.count_same_contract_instances_on_stack(&alpha), 1);
        assert_eq!(runtime.count_same_contract_instances_on_stack(&beta), 0);
        assert_eq!(runtime.count_same_contract_instances_on_stack(&gamma), 0);
    }

    #[test]
    fn test_points_used_and_function_resolution() {
        let (mut runtime, _) = make_runtime();
        runtime.set_max_instance_stack_size(1);
        runtime.start_instance(COUNTER_CODE, 100_000_000, false).unwrap();

        let gas_points = 100u64;
        runtime.set_points_used(gas_points);
        assert_eq!(runtime.points_used(), gas_points);

        let mut input = ContractCallInput {
            recipient_addr: b"addr".to_vec(),
            function: "increment".to_string(),
            ..ContractCallInput::default()
        };
        runtime.init_state_from_call_input(&input);

        let function_name = runtime.function_name_checked().unwrap();
        assert_eq!(function_name, "increment");

        input.function = "func".to_string();
        runtime.init_state_from_call_input(&input);
        let result = runtime.function_name_checked();
        assert_eq!(
            result,
            Err(RuntimeError::Executor(ExecutorError::FuncNotFound))
        );

        assert!(runtime.has_function(crate::runtime::INIT_FUNCTION_NAME));

        runtime.clear_warm_instance_cache();
        assert!(runtime.instance().is_none());
    }

    #[test]
    fn test_breakpoints() {
        let (mut runtime, output) = make_runtime();
        runtime.set_max_instance_stack_size(1);
        runtime.start_instance(COUNTER_CODE, 100_000_000, false).unwrap();

        assert_eq!(runtime.get_runtime_breakpoint_value(), BreakpointValue::None);
        runtime.set_runtime_breakpoint_value(BreakpointValue::OutOfGas);
        assert_eq!(
            runtime.get_runtime_breakpoint_value(),
            BreakpointValue::OutOfGas
        );

        runtime.set_runtime_breakpoint_value(BreakpointValue::None);
        assert_eq!(runtime.get_runtime_breakpoint_value(), BreakpointValue::None);

        // Signal user error.
        runtime.signal_user_error("something happened");
        assert_eq!(
            runtime.get_runtime_breakpoint_value(),
            BreakpointValue::SignalError
        );
        {
            let guard = output.lock().unwrap();
            assert_eq!(guard.return_code(), ReturnCode::UserError);
            assert_eq!(guard.return_message(), "something happened");
        }

        // Fail execution without an error.
        output.lock().unwrap().reset();
        runtime.set_runtime_breakpoint_value(BreakpointValue::None);

        runtime.fail_execution(None);
        assert_eq!(
            runtime.get_runtime_breakpoint_value(),
            BreakpointValue::ExecutionFailed
        );
        {
            let guard = output.lock().unwrap();
            assert_eq!(guard.return_code(), ReturnCode::ExecutionFailed);
            assert_eq!(guard.return_message(), "execution failed");
        }

        // Fail execution with a specific error.
        output.lock().unwrap().reset();
        runtime.set_runtime_breakpoint_value(BreakpointValue::None);

        let runtime_error = RuntimeError::BadBounds;
        runtime.fail_execution(Some(&runtime_error));
        assert_eq!(
            runtime.get_runtime_breakpoint_value(),
            BreakpointValue::ExecutionFailed
        );
        {
            let guard = output.lock().unwrap();
            assert_eq!(guard.return_code(), ReturnCode::ExecutionFailed);
            assert_eq!(guard.return_message(), runtime_error.to_string());
        }
    }

    #[test]
    fn test_mem_load_store_through_the_context() {
        let (mut runtime, _) = make_runtime();
        runtime.set_max_instance_stack_size(1);
        runtime.start_instance(COUNTER_CODE, 100_000_000, false).unwrap();

        let contents = runtime.mem_load(10, 10).unwrap();
        assert_eq!(contents, vec![0u8; 10]);

        runtime.mem_store(10, b"test data").unwrap();
        let contents = runtime.mem_load(10, 10).unwrap();
        assert_eq!(contents, b"test data\0");

        assert_eq!(runtime.mem_load(-3, 10), Err(RuntimeError::BadBounds));
        assert_eq!(runtime.mem_load(10, -2), Err(RuntimeError::NegativeLength));
        assert_eq!(runtime.mem_store(-2, b"x"), Err(RuntimeError::BadLowerBounds));
    }

    #[test]
    fn test_mem_access_without_instance_fails() {
        let (mut runtime, _) = make_runtime();
        assert_eq!(runtime.mem_load(0, 1), Err(RuntimeError::NoInstance));
        assert_eq!(runtime.mem_store(0, b"x"), Err(RuntimeError::NoInstance));
    }

    #[test]
    fn test_warm_instance_is_reset_on_reuse() {
        let (mut runtime, _) = make_runtime();
        runtime.set_max_instance_stack_size(2);

        runtime.start_instance(COUNTER_CODE, 1_000_000, false).unwrap();
        runtime.set_points_used(123_456);
        runtime.set_runtime_breakpoint_value(BreakpointValue::OutOfGas);

        // Second start on the same code without clearing the cache.
        runtime.start_instance(COUNTER_CODE, 500_000, false).unwrap();
        assert_eq!(runtime.points_used(), 0);
        assert_eq!(runtime.get_runtime_breakpoint_value(), BreakpointValue::None);
    }

    #[test]
    fn test_fresh_instance_after_cache_clear_is_pristine() {
        let (mut runtime, _) = make_runtime();
        runtime.set_max_instance_stack_size(2);

        runtime.start_instance(COUNTER_CODE, 1_000_000, false).unwrap();
        runtime.set_points_used(42);

        runtime.clear_warm_instance_cache();
        runtime.start_instance(COUNTER_CODE, 1_000_000, false).unwrap();
        assert_eq!(runtime.points_used(), 0);
        assert_eq!(runtime.get_runtime_breakpoint_value(), BreakpointValue::None);
    }

    #[test]
    fn test_max_instance_stack_size_is_enforced() {
        let (mut runtime, _) = make_runtime();
        runtime.set_max_instance_stack_size(1);

        runtime.start_instance(COUNTER_CODE, 1_000, false).unwrap();
        runtime.push_instance();

        let result = runtime.start_instance(COUNTER_CODE, 1_000, false);
        assert_eq!(result, Err(RuntimeError::MaxInstancesReached));
    }

    #[test]
    fn test_started_instances_carry_the_hooks_context() {
        use crate::hooks::VMHooksDefault;

        let (mut runtime, _) = make_runtime();
        runtime.set_vm_hooks(Box::new(VMHooksDefault));
        runtime.start_instance(COUNTER_CODE, 1_000, false).unwrap();

        let instance = runtime.instance().unwrap();
        let context_data = instance.lock().unwrap().context_data();
        assert_ne!(context_data, 0);

        // Warm reuse binds the same context.
        runtime.start_instance(COUNTER_CODE, 2_000, false).unwrap();
        let warm = runtime.instance().unwrap();
        assert_eq!(warm.lock().unwrap().context_data(), context_data);
    }

    #[test]
    fn test_pop_set_active_state_on_empty_stack_does_not_panic() {
        let (mut runtime, _) = make_runtime();
        runtime.pop_set_active_state();
        assert_eq!(runtime.state_stack_depth(), 0);
    }

    #[test]
    fn test_pop_discard_on_empty_stack_does_not_panic() {
        let (mut runtime, _) = make_runtime();
        runtime.pop_discard();
        assert_eq!(runtime.state_stack_depth(), 0);
    }

    #[test]
    fn test_pop_instance_on_empty_stack_does_not_panic() {
        let (mut runtime, _) = make_runtime();
        runtime.pop_instance();
        assert_eq!(runtime.instance_stack_depth(), 0);
    }

    #[test]
    fn test_balanced_push_pop_restores_everything() {
        let (mut runtime, _) = make_runtime();
        runtime.set_max_instance_stack_size(2);
        runtime.start_instance(COUNTER_CODE, 1_000, false).unwrap();

        let input = ContractCallInput {
            recipient_addr: b"addr".to_vec(),
            function: "getSum".to_string(),
            ..ContractCallInput::default()
        };
        runtime.init_state_from_call_input(&input);
        let instance_before = runtime.instance().unwrap();

        runtime.push_state();
        runtime.set_code_address(b"other".to_vec());
        runtime.set_read_only(true);
        runtime.instance = None;
        runtime.pop_set_active_state();

        assert_eq!(runtime.vm_input(), &input);
        assert_eq!(runtime.code_address(), b"addr");
        assert!(!runtime.read_only());
        assert!(Arc::ptr_eq(&instance_before, &runtime.instance().unwrap()));
        assert_eq!(runtime.state_stack_depth(), 0);
        assert_eq!(runtime.instance_stack_depth(), 0);
    }
}
