//! A scriptable stand-in for a compiled WASM instance.

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{ExecutorError, ExecutorResult};
use crate::executor::{BreakpointValue, Instance, WASM_PAGE_SIZE};

/// Body of a mocked export: runs against the instance, mutating memory,
/// gas points or the breakpoint register like a real guest function would.
pub type MockMethod = Arc<dyn Fn(&mut MockInstance) + Send + Sync>;

/// Default linear-memory size of a fresh mock, matching the two pages a
/// minimal compiled contract declares.
const DEFAULT_MEMORY_PAGES: u64 = 2;

/// Mock instance: behaves like a live module whose exports are closures.
///
/// Fields are public on purpose; tests script instances directly.
#[derive(Clone)]
pub struct MockInstance {
    pub code: Vec<u8>,
    pub address: Vec<u8>,
    pub exports: HashMap<String, MockMethod>,
    pub imports: Vec<String>,
    pub memory: Vec<u8>,
    pub memory_enabled: bool,
    pub points: u64,
    pub gas_limit: u64,
    pub breakpoint: BreakpointValue,
    pub context_data_slot: usize,
    pub cleaned: bool,
}

impl MockInstance {
    pub fn new(code: Vec<u8>) -> Self {
        MockInstance {
            address: code.clone(),
            code,
            exports: HashMap::new(),
            imports: Vec::new(),
            memory: vec![0u8; (DEFAULT_MEMORY_PAGES * WASM_PAGE_SIZE) as usize],
            memory_enabled: true,
            points: 0,
            gas_limit: 0,
            breakpoint: BreakpointValue::None,
            context_data_slot: 0,
            cleaned: false,
        }
    }

    /// Registers `method` as the export `name`.
    pub fn add_method(
        &mut self,
        name: &str,
        method: impl Fn(&mut MockInstance) + Send + Sync + 'static,
    ) {
        self.exports.insert(name.to_string(), Arc::new(method));
    }

    /// Declares which host hooks this mock module imports.
    pub fn set_imported_functions(&mut self, names: &[&str]) {
        self.imports = names.iter().map(|name| name.to_string()).collect();
    }

    /// Resizes linear memory to `pages` zeroed pages.
    pub fn with_memory_pages(mut self, pages: u64) -> Self {
        self.memory = vec![0u8; (pages * WASM_PAGE_SIZE) as usize];
        self
    }

    /// Produces a module that has no linear memory at all.
    pub fn without_memory(mut self) -> Self {
        self.memory = Vec::new();
        self.memory_enabled = false;
        self
    }
}

impl Instance for MockInstance {
    fn has_function(&self, name: &str) -> bool {
        self.exports.contains_key(name)
    }

    fn exported_function_names(&self) -> Vec<String> {
        self.exports.keys().cloned().collect()
    }

    fn call_function(&mut self, name: &str) -> ExecutorResult<()> {
        let method = self
            .exports
            .get(name)
            .cloned()
            .ok_or(ExecutorError::FuncNotFound)?;

        method(self);

        // A real engine traps out of the guest when the breakpoint register
        // goes non-zero; mirror that as a call error.
        match self.breakpoint {
            BreakpointValue::None => Ok(()),
            stopped => Err(ExecutorError::Breakpoint(stopped)),
        }
    }

    fn is_function_imported(&self, name: &str) -> bool {
        self.imports.iter().any(|import| import == name)
    }

    fn imported_function_names(&self) -> Vec<String> {
        self.imports.clone()
    }

    fn has_memory(&self) -> bool {
        self.memory_enabled
    }

    fn memory_length(&self) -> u64 {
        self.memory.len() as u64
    }

    fn memory_data(&self) -> &[u8] {
        &self.memory
    }

    fn memory_data_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    fn memory_grow(&mut self, pages: u32) -> ExecutorResult<()> {
        if !self.memory_enabled {
            return Err(ExecutorError::MemoryGrowFailed);
        }
        let additional = (pages as u64 * WASM_PAGE_SIZE) as usize;
        self.memory.extend(std::iter::repeat(0u8).take(additional));
        Ok(())
    }

    fn points_used(&self) -> u64 {
        self.points
    }

    fn set_points_used(&mut self, points: u64) {
        self.points = points;
    }

    fn set_gas_limit(&mut self, gas_limit: u64) {
        self.gas_limit = gas_limit;
    }

    fn breakpoint_value(&self) -> BreakpointValue {
        self.breakpoint
    }

    fn set_breakpoint_value(&mut self, value: BreakpointValue) {
        self.breakpoint = value;
    }

    fn context_data(&self) -> usize {
        self.context_data_slot
    }

    fn set_context_data(&mut self, data: usize) {
        self.context_data_slot = data;
    }

    fn cache(&self) -> ExecutorResult<Vec<u8>> {
        Ok(self.code.clone())
    }

    fn reset(&mut self) {
        self.points = 0;
        self.breakpoint = BreakpointValue::None;
    }

    fn clean(&mut self) {
        self.cleaned = true;
    }
}
