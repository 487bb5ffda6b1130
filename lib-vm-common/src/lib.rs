//! Shared wire types for the WASM contract VM.
//!
//! Everything the node and the VM host exchange lives here: per-call inputs,
//! the structured VM output, and the framed request/response protocol spoken
//! over the node pipe. The host crate depends on these types; the node side
//! only needs this crate to drive a VM process.

pub mod input;
pub mod output;
pub mod protocol;

pub use input::{
    ContractCallInput, ContractCreateInput, TokenTransfer, TokenType, VMInput,
};
pub use output::{amount_to_bytes, bytes_to_amount, ReturnCode, VMOutput};
pub use protocol::{
    read_message, write_message, ContractRequest, ContractResponse, ProtocolError,
};
