//! Data Specification Generator
//!
//! Build a validated command stream one call at a time.
//!
//! ## Example
//!
//! ```rust
//! use dataspec_generator::Generator;
//! use dataspec_spec::DataType;
//!
//! let mut gen = Generator::default();
//! gen.reserve_memory_region(0, 16, Some("header"), false).unwrap();
//! gen.switch_write_focus(0).unwrap();
//! gen.write_value(42u32, DataType::Uint32, 1).unwrap();
//! gen.end_specification().unwrap();
//!
//! let bytes = gen.into_bytes();
//! assert_eq!(bytes.len() % 4, 0);
//! ```

pub mod error;
pub mod encoder;
pub mod generator;

pub use error::{GeneratorError, Result};
pub use encoder::{encode, encode_to_bytes};
pub use generator::Generator;
