//! Request/response protocol between the node and the VM process.
//!
//! The node writes one [`ContractRequest`] per execution and reads back one
//! [`ContractResponse`]. Messages are bincode payloads behind a u32
//! little-endian length prefix, so any ordered byte channel works: the
//! reference deployment uses a pair of anonymous pipes into the VM process.

use std::io::{Read, Write};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::input::{ContractCallInput, ContractCreateInput};
use crate::output::VMOutput;

/// Upper bound on a single frame. A request carries contract code, so the
/// limit tracks the largest deployable contract rather than typical calls.
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Framing and transport failures.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("frame of {size} bytes exceeds maximum of {max}")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("malformed payload: {0}")]
    Codec(#[from] bincode::Error),

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

/// One execution request from the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractRequest {
    /// Deploy new contract code and run its initializer.
    Deploy { input: ContractCreateInput },
    /// Call an exported function of a deployed contract.
    Call { input: ContractCallInput },
}

/// The VM's answer to a [`ContractRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractResponse {
    pub vm_output: VMOutput,
    /// Host-side failure that prevented producing a meaningful output, if any.
    pub error: Option<String>,
}

/// Writes one length-prefixed message to `writer`.
pub fn write_message<M: Serialize>(writer: &mut impl Write, message: &M) -> Result<(), ProtocolError> {
    let payload = bincode::serialize(message)?;
    let size = payload.len() as u32;
    if size > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size,
            max: MAX_FRAME_SIZE,
        });
    }
    writer.write_all(&size.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

/// Reads one length-prefixed message from `reader`.
pub fn read_message<M: DeserializeOwned>(reader: &mut impl Read) -> Result<M, ProtocolError> {
    let mut size_bytes = [0u8; 4];
    reader.read_exact(&mut size_bytes)?;
    let size = u32::from_le_bytes(size_bytes);
    if size > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size,
            max: MAX_FRAME_SIZE,
        });
    }
    let mut payload = vec![0u8; size as usize];
    reader.read_exact(&mut payload)?;
    Ok(bincode::deserialize(&payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::VMInput;
    use crate::output::ReturnCode;
    use std::io::Cursor;

    fn sample_call_request() -> ContractRequest {
        ContractRequest::Call {
            input: ContractCallInput {
                vm_input: VMInput {
                    caller_addr: b"caller".to_vec(),
                    arguments: vec![vec![5]],
                    call_value: 0,
                    gas_provided: 100_000,
                    token_transfers: Vec::new(),
                },
                recipient_addr: b"recipient".to_vec(),
                function: "increment".to_string(),
            },
        }
    }

    #[test]
    fn test_request_round_trip() {
        let request = sample_call_request();

        let mut channel = Vec::new();
        write_message(&mut channel, &request).unwrap();

        let mut reader = Cursor::new(channel);
        let decoded: ContractRequest = read_message(&mut reader).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_response_round_trip() {
        let response = ContractResponse {
            vm_output: VMOutput {
                return_data: vec![vec![6]],
                return_code: ReturnCode::Ok,
                return_message: String::new(),
                gas_remaining: 99_000,
            },
            error: None,
        };

        let mut channel = Vec::new();
        write_message(&mut channel, &response).unwrap();

        let mut reader = Cursor::new(channel);
        let decoded: ContractResponse = read_message(&mut reader).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn test_consecutive_messages_keep_framing() {
        let request = sample_call_request();
        let mut channel = Vec::new();
        write_message(&mut channel, &request).unwrap();
        write_message(&mut channel, &request).unwrap();

        let mut reader = Cursor::new(channel);
        let first: ContractRequest = read_message(&mut reader).unwrap();
        let second: ContractRequest = read_message(&mut reader).unwrap();
        assert_eq!(first, request);
        assert_eq!(second, request);
    }

    #[test]
    fn test_oversized_frame_is_rejected_on_read() {
        let mut channel = Vec::new();
        channel.extend_from_slice(&(MAX_FRAME_SIZE + 1).to_le_bytes());
        channel.extend_from_slice(&[0u8; 16]);

        let mut reader = Cursor::new(channel);
        let result: Result<ContractRequest, _> = read_message(&mut reader);
        assert!(matches!(
            result,
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_truncated_frame_is_an_io_error() {
        let mut channel = Vec::new();
        channel.extend_from_slice(&100u32.to_le_bytes());
        channel.extend_from_slice(&[1, 2, 3]);

        let mut reader = Cursor::new(channel);
        let result: Result<ContractRequest, _> = read_message(&mut reader);
        assert!(matches!(result, Err(ProtocolError::Io(_))));
    }
}
