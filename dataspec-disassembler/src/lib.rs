//! # Data Specification Disassembler
//!
//! Decode command streams back into typed commands and render them as a
//! text listing. The executor uses [`decode_at`] to fetch commands.
//!
//! ## Example
//!
//! ```rust
//! use dataspec_disassembler::{decode_all, disassemble};
//!
//! // A lone end_spec command
//! let bytes = 0xFF00_0000u32.to_le_bytes();
//! assert_eq!(decode_all(&bytes).unwrap().len(), 1);
//! assert!(disassemble(&bytes).unwrap().contains("end_spec"));
//! ```

pub mod error;
pub mod decoder;
pub mod formatter;
pub mod disassembler;

pub use error::{DecodeError, Result};
pub use decoder::{decode_all, decode_at};
pub use disassembler::{count_diagnostics, disassemble};
pub use formatter::{format, Listing};
