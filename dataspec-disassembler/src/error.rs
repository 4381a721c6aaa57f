//! Decoder errors
//!
//! Offsets are byte offsets of the command header within the stream.

use dataspec_spec::{Opcode, SpecError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Unknown opcode 0x{opcode:02X} at offset {offset}")]
    UnknownOpcode { offset: usize, opcode: u8 },

    #[error("Truncated command at offset {offset}: {needed} bytes needed, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("{opcode} at offset {offset} declares {declared} payload words but its fields use {consumed}")]
    LengthMismatch {
        offset: usize,
        opcode: Opcode,
        declared: usize,
        consumed: usize,
    },

    #[error("Malformed {opcode} at offset {offset}: {reason}")]
    Malformed {
        offset: usize,
        opcode: Opcode,
        reason: String,
    },

    #[error("{opcode} at offset {offset} references register {index}")]
    InvalidRegister { offset: usize, opcode: Opcode, index: u32 },

    #[error("{opcode} at offset {offset}: {source}")]
    Field {
        offset: usize,
        opcode: Opcode,
        source: SpecError,
    },

    #[error(transparent)]
    Spec(#[from] SpecError),
}

pub type Result<T> = std::result::Result<T, DecodeError>;

impl DecodeError {
    /// Byte offset of the offending command, when known
    pub fn offset(&self) -> Option<usize> {
        match self {
            DecodeError::UnknownOpcode { offset, .. }
            | DecodeError::Truncated { offset, .. }
            | DecodeError::LengthMismatch { offset, .. }
            | DecodeError::Malformed { offset, .. }
            | DecodeError::InvalidRegister { offset, .. }
            | DecodeError::Field { offset, .. } => Some(*offset),
            DecodeError::Spec(_) => None,
        }
    }
}
