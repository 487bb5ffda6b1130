//! Gas schedule loading.
//!
//! The schedule has two halves: per-hook base costs charged by the host, and
//! per-opcode costs the engine's metering instrumentation burns inside the
//! guest. The opcode half is installed into the engine once per engine
//! lifetime; it is the only piece of engine-global configuration.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-opcode gas costs, keyed by opcode name.
pub type OpcodeCosts = BTreeMap<String, u32>;

#[derive(Error, Debug)]
pub enum GasScheduleError {
    #[error("cannot read gas schedule file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed gas schedule: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("gas schedule contains a zero cost for {0}")]
    ZeroCost(String),
}

/// Base costs of host-side operations, charged before the hook body runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseOpsCost {
    pub get_function: u64,
    pub storage_load: u64,
    pub storage_store: u64,
    pub finish: u64,
    pub signal_error: u64,
    pub transfer_value: u64,
    pub async_call_step: u64,
    pub persist_per_byte: u64,
}

impl Default for BaseOpsCost {
    fn default() -> Self {
        BaseOpsCost {
            get_function: 100,
            storage_load: 100,
            storage_store: 100,
            finish: 1,
            signal_error: 1,
            transfer_value: 100,
            async_call_step: 100,
            persist_per_byte: 1,
        }
    }
}

/// The full schedule, deserializable from a JSON schedule file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GasSchedule {
    pub base_ops: BaseOpsCost,
    pub wasm_opcode_cost: OpcodeCosts,
}

impl GasSchedule {
    /// Flat schedule where every known opcode costs one point. Test suites
    /// use it so gas numbers stay human-checkable.
    pub fn for_tests() -> Self {
        let opcodes = [
            "Unreachable",
            "Nop",
            "Block",
            "Loop",
            "If",
            "Br",
            "BrIf",
            "BrTable",
            "Call",
            "CallIndirect",
            "Drop",
            "Select",
            "LocalGet",
            "LocalSet",
            "LocalTee",
            "GlobalGet",
            "GlobalSet",
            "I32Load",
            "I64Load",
            "I32Store",
            "I64Store",
            "MemorySize",
            "MemoryGrow",
            "I32Const",
            "I64Const",
            "I32Add",
            "I64Add",
            "I32Sub",
            "I64Sub",
            "I32Mul",
            "I64Mul",
        ];
        let wasm_opcode_cost = opcodes
            .iter()
            .map(|name| (name.to_string(), 1u32))
            .collect();

        GasSchedule {
            base_ops: BaseOpsCost {
                get_function: 1,
                storage_load: 1,
                storage_store: 1,
                finish: 1,
                signal_error: 1,
                transfer_value: 1,
                async_call_step: 1,
                persist_per_byte: 1,
            },
            wasm_opcode_cost,
        }
    }

    /// Parses a schedule from JSON bytes, rejecting zero opcode costs: a
    /// free opcode would let a guest loop without ever hitting a metered
    /// boundary.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, GasScheduleError> {
        let schedule: GasSchedule = serde_json::from_slice(bytes)?;
        if let Some((name, _)) = schedule.wasm_opcode_cost.iter().find(|(_, cost)| **cost == 0) {
            return Err(GasScheduleError::ZeroCost(name.clone()));
        }
        Ok(schedule)
    }

    /// Loads a schedule from a JSON file on disk.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, GasScheduleError> {
        let bytes = fs::read(path)?;
        Self::from_json_bytes(&bytes)
    }

    /// The opcode half of the schedule, as handed to the engine.
    pub fn opcode_costs(&self) -> &OpcodeCosts {
        &self.wasm_opcode_cost
    }
}
