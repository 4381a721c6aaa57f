//! Register file definitions
//!
//! Registers hold 64-bit signed integers and are zeroed at the start of each
//! execution. A [`crate::Limits`] value may restrict a run to fewer than
//! [`NUM_REGISTERS`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of registers addressable by the wire format
pub const NUM_REGISTERS: usize = 16;

/// Register (r0-r15)
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Register {
    R0 = 0,
    R1 = 1,
    R2 = 2,
    R3 = 3,
    R4 = 4,
    R5 = 5,
    R6 = 6,
    R7 = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

impl Register {
    pub const ALL: [Register; NUM_REGISTERS] = [
        Register::R0,
        Register::R1,
        Register::R2,
        Register::R3,
        Register::R4,
        Register::R5,
        Register::R6,
        Register::R7,
        Register::R8,
        Register::R9,
        Register::R10,
        Register::R11,
        Register::R12,
        Register::R13,
        Register::R14,
        Register::R15,
    ];

    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_index() {
        assert_eq!(Register::from_index(0), Some(Register::R0));
        assert_eq!(Register::from_index(15), Some(Register::R15));
        assert_eq!(Register::from_index(16), None);
    }

    #[test]
    fn test_index_round_trip() {
        for reg in Register::ALL {
            assert_eq!(Register::from_index(reg.index()), Some(reg));
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Register::R7.to_string(), "r7");
    }
}
