//! Structured results of a VM execution.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome category of a contract execution, with wire-stable discriminants.
///
/// Only the category crosses the node boundary; detailed context travels in
/// the return message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u64)]
pub enum ReturnCode {
    /// Execution finished normally.
    Ok = 0,
    /// The requested function is not exported by the contract.
    FunctionNotFound = 1,
    /// The requested function exists but has a non-callable signature.
    FunctionWrongSignature = 2,
    /// No contract is deployed at the recipient address.
    ContractNotFound = 3,
    /// The contract signalled a domain error.
    UserError = 4,
    /// The caller cannot cover the transferred value.
    OutOfFunds = 5,
    /// A deployment collided with an existing account.
    AccountCollision = 6,
    /// The gas budget was exhausted.
    OutOfGas = 7,
    /// The nested-call depth limit was exceeded.
    CallStackOverFlow = 8,
    /// The engine refused to instantiate the contract code.
    ContractInvalid = 9,
    /// The host aborted execution or the engine trapped.
    ExecutionFailed = 10,
}

impl Default for ReturnCode {
    fn default() -> Self {
        ReturnCode::Ok
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ReturnCode::Ok => "ok",
            ReturnCode::FunctionNotFound => "function not found",
            ReturnCode::FunctionWrongSignature => "wrong signature for function",
            ReturnCode::ContractNotFound => "contract not found",
            ReturnCode::UserError => "user error",
            ReturnCode::OutOfFunds => "out of funds",
            ReturnCode::AccountCollision => "account collision",
            ReturnCode::OutOfGas => "out of gas",
            ReturnCode::CallStackOverFlow => "call stack overflow",
            ReturnCode::ContractInvalid => "contract invalid",
            ReturnCode::ExecutionFailed => "execution failed",
        };
        write!(f, "{}", message)
    }
}

/// Everything the node learns about one execution.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VMOutput {
    /// Values the contract finished with, in finish order. Amounts are
    /// minimal big-endian byte strings.
    pub return_data: Vec<Vec<u8>>,
    /// Outcome category.
    pub return_code: ReturnCode,
    /// Most recently set human-readable message; empty on clean success.
    pub return_message: String,
    /// Gas left over from the budget: `gas_provided - points_used`.
    pub gas_remaining: u64,
}

impl VMOutput {
    /// Output describing an execution that never got to run.
    pub fn from_failure(code: ReturnCode, message: impl Into<String>) -> Self {
        VMOutput {
            return_data: Vec::new(),
            return_code: code,
            return_message: message.into(),
            gas_remaining: 0,
        }
    }
}

/// Encodes an amount as the shortest big-endian byte string, `[]` for zero.
pub fn amount_to_bytes(value: u128) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

/// Decodes a big-endian byte string produced by [`amount_to_bytes`].
///
/// Returns `None` when the value does not fit the native width.
pub fn bytes_to_amount(bytes: &[u8]) -> Option<u128> {
    let stripped: &[u8] = {
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        &bytes[first..]
    };
    if stripped.len() > 16 {
        return None;
    }
    let mut buffer = [0u8; 16];
    buffer[16 - stripped.len()..].copy_from_slice(stripped);
    Some(u128::from_be_bytes(buffer))
}
