//! # Data Specification Runtime
//!
//! Execute a data specification command stream and build the finished
//! memory image.
//!
//! The executor decodes one command at a time, keeps a register file and
//! a control stack for loops, conditionals and function calls, and writes
//! into a fixed collection of memory regions. On a clean halt the filled
//! regions are laid out behind a header and pointer table.
//!
//! ## Example
//!
//! ```rust
//! use dataspec_generator::Generator;
//! use dataspec_spec::DataType;
//!
//! let mut gen = Generator::default();
//! gen.reserve_memory_region(0, 16, None, false).unwrap();
//! gen.switch_write_focus(0).unwrap();
//! gen.write_value(42u32, DataType::Uint32, 1).unwrap();
//! gen.end_specification().unwrap();
//!
//! let image = dataspec_runtime::run(&gen.to_bytes()).unwrap();
//! assert_eq!(image.region_data(0).unwrap()[..4], 42u32.to_le_bytes());
//! ```

pub mod error;
pub mod execute;
pub mod executor;
pub mod memory;
pub mod random;
pub mod state;
pub mod structure;

pub use error::{Result, RuntimeError};
pub use executor::{ExecutionResult, Executor, ExecutorConfig};
pub use memory::{MemoryRegion, MemoryRegions};
pub use random::RandomSources;
pub use state::{ExecState, ExecutorState, Frame, HaltReason};
pub use structure::{Element, Structure, StructureTable};

use dataspec_spec::DataImage;

/// Run a command stream with the default configuration
///
/// Anything other than a clean halt at an end command is an error.
pub fn run(bytes: &[u8]) -> Result<DataImage> {
    run_with_config(bytes, ExecutorConfig::default())
}

pub fn run_with_config(bytes: &[u8], config: ExecutorConfig) -> Result<DataImage> {
    let mut executor = Executor::new(bytes, config)?;
    let result = executor.run()?;
    result
        .image
        .ok_or(RuntimeError::AbnormalTermination(result.halt_reason))
}
