//! # Data Specification Core
//!
//! A compact command language describing how to lay out typed values,
//! arrays and structures across a fixed set of memory regions.
//!
//! ## Key Features
//! - Type registry of integer, fixed-point and float encodings with stable ids
//! - Self-describing command words (opcode, register flags, payload length)
//! - Operands that are either immediates or register references
//! - Configurable resource limits (regions, registers, structures, ...)
//! - Image format: header, pointer table, concatenated region payloads,
//!   with references to regions owned by other images
//! - [`ExecutorFunctions`], the handler interface every backend implements

pub mod command;
pub mod config;
pub mod data_type;
pub mod encoding;
pub mod error;
pub mod functions;
pub mod image;
pub mod opcode;
pub mod operation;
pub mod register;

pub use command::{Command, Operand};
pub use config::{ConfigError, Limits};
pub use data_type::{DataType, TypeFamily, Value};
pub use error::{Result, SpecError};
pub use functions::{dispatch, ExecutorFunctions, Flow};
pub use image::{checksum, DataImage, ImageHeader, PointerTableEntry, RegionKind, MAGIC, VERSION};
pub use opcode::Opcode;
pub use operation::{ArithmeticOperation, Condition, DistributionKind, LogicOperation, RngKind};
pub use register::{Register, NUM_REGISTERS};

/// Word size of the command stream in bytes
pub const WORD_SIZE: usize = encoding::WORD_SIZE;

/// Largest text accepted by print commands
pub const MAX_PRINT_TEXT: usize = 255;
