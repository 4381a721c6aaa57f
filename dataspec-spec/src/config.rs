//! # Resource Limits
//!
//! Every bound on the number of regions, registers, structures, functions,
//! random generators and nesting depth lives here. Generators and executors
//! take a [`Limits`] at construction so tests can shrink the bounds.

use crate::register::NUM_REGISTERS;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest number of operand slots a command header can flag as registers
pub const MAX_OPERAND_SLOTS: usize = 8;

/// Resource bounds for one specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Limits {
    /// Memory regions (ids 0..max_regions)
    pub max_regions: u32,
    /// Registers usable by commands (at most 16)
    pub max_registers: u32,
    /// Structure ids (0..max_structs)
    pub max_structs: u32,
    /// Elements per structure
    pub max_struct_elements: u32,
    /// Function ids (0..max_functions)
    pub max_functions: u32,
    /// Parameters per function (at most 8)
    pub max_function_args: u32,
    /// Random number generator ids
    pub max_rngs: u32,
    /// Random distribution ids
    pub max_distributions: u32,
    /// Open loops plus conditionals at any point
    pub max_nesting_depth: u32,
    /// Capacity of a single region in bytes
    pub max_region_bytes: u32,
}

impl Limits {
    pub const DEFAULT: Self = Self {
        max_regions: 16,
        max_registers: 16,
        max_structs: 16,
        max_struct_elements: 255,
        max_functions: 16,
        max_function_args: 5,
        max_rngs: 16,
        max_distributions: 16,
        max_nesting_depth: 16,
        max_region_bytes: 1 << 20,
    };

    /// Validate the limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_regions == 0 {
            return Err(ConfigError::NoRegions);
        }
        if self.max_registers == 0 || self.max_registers as usize > NUM_REGISTERS {
            return Err(ConfigError::InvalidRegisterCount(self.max_registers));
        }
        if self.max_function_args as usize > MAX_OPERAND_SLOTS {
            return Err(ConfigError::TooManyFunctionArgs(self.max_function_args));
        }
        if self.max_function_args > self.max_registers {
            return Err(ConfigError::TooManyFunctionArgs(self.max_function_args));
        }
        if self.max_nesting_depth == 0 {
            return Err(ConfigError::NoNesting);
        }
        Ok(())
    }

    pub fn with_max_regions(mut self, max_regions: u32) -> Self {
        self.max_regions = max_regions;
        self
    }

    pub fn with_max_registers(mut self, max_registers: u32) -> Self {
        self.max_registers = max_registers;
        self
    }

    pub fn with_max_structs(mut self, max_structs: u32) -> Self {
        self.max_structs = max_structs;
        self
    }

    pub fn with_max_struct_elements(mut self, max_struct_elements: u32) -> Self {
        self.max_struct_elements = max_struct_elements;
        self
    }

    pub fn with_max_functions(mut self, max_functions: u32) -> Self {
        self.max_functions = max_functions;
        self
    }

    pub fn with_max_function_args(mut self, max_function_args: u32) -> Self {
        self.max_function_args = max_function_args;
        self
    }

    pub fn with_max_rngs(mut self, max_rngs: u32) -> Self {
        self.max_rngs = max_rngs;
        self
    }

    pub fn with_max_distributions(mut self, max_distributions: u32) -> Self {
        self.max_distributions = max_distributions;
        self
    }

    pub fn with_max_nesting_depth(mut self, max_nesting_depth: u32) -> Self {
        self.max_nesting_depth = max_nesting_depth;
        self
    }

    pub fn with_max_region_bytes(mut self, max_region_bytes: u32) -> Self {
        self.max_region_bytes = max_region_bytes;
        self
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Limits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "regions={} registers={} structs={}x{} functions={}({} args) rngs={} dists={} depth={} region_bytes={}",
            self.max_regions,
            self.max_registers,
            self.max_structs,
            self.max_struct_elements,
            self.max_functions,
            self.max_function_args,
            self.max_rngs,
            self.max_distributions,
            self.max_nesting_depth,
            self.max_region_bytes,
        )
    }
}

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    NoRegions,
    InvalidRegisterCount(u32),
    TooManyFunctionArgs(u32),
    NoNesting,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRegions => write!(f, "at least one memory region is required"),
            Self::InvalidRegisterCount(n) => {
                write!(f, "register count {} must be between 1 and {}", n, NUM_REGISTERS)
            }
            Self::TooManyFunctionArgs(n) => write!(
                f,
                "{} function arguments exceed the register file or the {} operand slots",
                n, MAX_OPERAND_SLOTS
            ),
            Self::NoNesting => write!(f, "nesting depth must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits_are_valid() {
        assert!(Limits::DEFAULT.validate().is_ok());
        assert_eq!(Limits::default(), Limits::DEFAULT);
        assert_eq!(Limits::DEFAULT.max_regions, 16);
        assert_eq!(Limits::DEFAULT.max_struct_elements, 255);
    }

    #[test]
    fn test_invalid_limits() {
        assert_eq!(
            Limits::DEFAULT.with_max_regions(0).validate(),
            Err(ConfigError::NoRegions)
        );
        assert_eq!(
            Limits::DEFAULT.with_max_registers(17).validate(),
            Err(ConfigError::InvalidRegisterCount(17))
        );
        assert_eq!(
            Limits::DEFAULT.with_max_function_args(9).validate(),
            Err(ConfigError::TooManyFunctionArgs(9))
        );
        assert_eq!(
            Limits::DEFAULT.with_max_registers(2).with_max_function_args(3).validate(),
            Err(ConfigError::TooManyFunctionArgs(3))
        );
        assert_eq!(
            Limits::DEFAULT.with_max_nesting_depth(0).validate(),
            Err(ConfigError::NoNesting)
        );
    }

    #[test]
    fn test_display() {
        let s = Limits::DEFAULT.to_string();
        assert!(s.contains("regions=16"));
        assert!(s.contains("structs=16x255"));
    }
}
