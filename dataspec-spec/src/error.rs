//! # Error Types for the data specification core

use crate::config::ConfigError;
use crate::data_type::DataType;
use crate::opcode::Opcode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    // Encoding errors
    #[error("Unknown data type id: {0}")]
    UnknownDataType(u32),

    #[error("Value {value} cannot be represented as {data_type}")]
    ValueOutOfRange { data_type: DataType, value: String },

    #[error("Value {value} is not integral, required by {data_type}")]
    NotIntegral { data_type: DataType, value: f64 },

    #[error("Invalid length for {data_type}: expected {expected} bytes, found {found} bytes")]
    InvalidLength {
        data_type: DataType,
        expected: usize,
        found: usize,
    },

    // Command vocabulary errors
    #[error("Invalid opcode: {0:#04x}")]
    InvalidOpcode(u8),

    #[error("Invalid register index: {0}")]
    InvalidRegister(u32),

    #[error("Unknown {kind} id: {id}")]
    UnknownOperation { kind: &'static str, id: u32 },

    #[error("Command {0} is not implemented by this backend")]
    Unimplemented(Opcode),

    // Image format errors
    #[error("Invalid image magic: expected 0xad130ad6, got {0:#010x}")]
    InvalidMagic(u32),

    #[error("Invalid image version: expected {expected:#010x}, found {found:#010x}")]
    InvalidVersion { expected: u32, found: u32 },

    #[error("Invalid header size: expected {expected} bytes, found {found} bytes")]
    InvalidHeaderSize { expected: usize, found: usize },

    #[error("Invalid image size: expected {expected} bytes, found {found} bytes")]
    InvalidImageSize { expected: usize, found: usize },

    #[error("Pointer table entry for region {region} has unknown kind {kind}")]
    InvalidEntryKind { region: u32, kind: u32 },

    #[error("Pointer table entry for region {region} lies outside the payload")]
    EntryOutOfBounds { region: u32 },

    #[error("Checksum mismatch for region {region}: expected {expected:#010x}, found {found:#010x}")]
    ChecksumMismatch {
        region: u32,
        expected: u32,
        found: u32,
    },
}

pub type Result<T> = std::result::Result<T, SpecError>;

impl SpecError {
    /// Check if this error means a value could not be represented
    pub fn is_encoding_error(&self) -> bool {
        matches!(
            self,
            SpecError::ValueOutOfRange { .. }
                | SpecError::NotIntegral { .. }
                | SpecError::InvalidLength { .. }
        )
    }
}
