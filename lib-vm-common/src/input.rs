//! Contract call and deployment inputs.
//!
//! These are the values a node hands to the VM host for every execution
//! request. They are plain data: the host copies them into its call frames
//! and never mutates them in place.

use serde::{Deserialize, Serialize};

/// Token type carried by a transfer, with wire-stable discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum TokenType {
    Fungible = 0,
    NonFungible = 1,
    SemiFungible = 2,
    Meta = 3,
}

impl Default for TokenType {
    fn default() -> Self {
        TokenType::Fungible
    }
}

/// A single token transfer attached to a contract call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenTransfer {
    /// Transferred amount.
    pub value: u128,
    /// Token identifier bytes.
    pub token_name: Vec<u8>,
    /// Fungibility class of the token.
    pub token_type: TokenType,
    /// Nonce for non-fungible and semi-fungible tokens; 0 for fungible.
    pub token_nonce: u64,
}

/// Common fields of every execution request.
///
/// `call_value` and transfer values use the widest native integer the wire
/// carries; return data re-encodes amounts as minimal big-endian bytes, so
/// the in-memory width is not observable by contracts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VMInput {
    /// Address of the account that initiated this call.
    pub caller_addr: Vec<u8>,
    /// Ordered call arguments, each an opaque byte string.
    pub arguments: Vec<Vec<u8>>,
    /// Native value transferred with the call.
    pub call_value: u128,
    /// Gas budget for this call.
    pub gas_provided: u64,
    /// Token transfers executed alongside the call, possibly empty.
    pub token_transfers: Vec<TokenTransfer>,
}

/// Input for calling an exported function of a deployed contract.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContractCallInput {
    pub vm_input: VMInput,
    /// Address of the contract being called.
    pub recipient_addr: Vec<u8>,
    /// Name of the exported function to invoke.
    pub function: String,
}

/// Input for deploying a new contract.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContractCreateInput {
    pub vm_input: VMInput,
    /// WASM bytecode of the contract to deploy.
    pub contract_code: Vec<u8>,
    /// Deployment metadata bytes (upgradeability flags and similar).
    pub contract_code_metadata: Vec<u8>,
}
