//! Operation selectors carried inside commands: comparison conditions,
//! register arithmetic and logic, and random generator kinds.
//!
//! Register operations work on 64-bit two's complement values and wrap on
//! overflow.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Conditions
// ============================================================================

/// Relation evaluated by an IF command
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    Equal = 0,
    NotEqual = 1,
    LessThanOrEqual = 2,
    LessThan = 3,
    GreaterThanOrEqual = 4,
    GreaterThan = 5,
}

impl Condition {
    pub const ALL: [Condition; 6] = [
        Condition::Equal,
        Condition::NotEqual,
        Condition::LessThanOrEqual,
        Condition::LessThan,
        Condition::GreaterThanOrEqual,
        Condition::GreaterThan,
    ];

    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    #[inline]
    pub const fn to_u32(self) -> u32 {
        self as u32
    }

    /// Signed comparison of `lhs` against `rhs`
    pub fn evaluate(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Self::Equal => lhs == rhs,
            Self::NotEqual => lhs != rhs,
            Self::LessThanOrEqual => lhs <= rhs,
            Self::LessThan => lhs < rhs,
            Self::GreaterThanOrEqual => lhs >= rhs,
            Self::GreaterThan => lhs > rhs,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessThanOrEqual => "<=",
            Self::LessThan => "<",
            Self::GreaterThanOrEqual => ">=",
            Self::GreaterThan => ">",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

// ============================================================================
// Arithmetic
// ============================================================================

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithmeticOperation {
    Add = 0,
    Subtract = 1,
    Multiply = 2,
}

impl ArithmeticOperation {
    pub const ALL: [ArithmeticOperation; 3] = [
        ArithmeticOperation::Add,
        ArithmeticOperation::Subtract,
        ArithmeticOperation::Multiply,
    ];

    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    #[inline]
    pub const fn to_u32(self) -> u32 {
        self as u32
    }

    pub fn apply(self, lhs: i64, rhs: i64) -> i64 {
        match self {
            Self::Add => lhs.wrapping_add(rhs),
            Self::Subtract => lhs.wrapping_sub(rhs),
            Self::Multiply => lhs.wrapping_mul(rhs),
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "sub",
            Self::Multiply => "mul",
        }
    }
}

impl fmt::Display for ArithmeticOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

// ============================================================================
// Logic
// ============================================================================

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicOperation {
    LeftShift = 0,
    /// Logical (zero-filling) shift
    RightShift = 1,
    Or = 2,
    And = 3,
    Xor = 4,
    /// Unary; the right operand is ignored
    Not = 5,
}

impl LogicOperation {
    pub const ALL: [LogicOperation; 6] = [
        LogicOperation::LeftShift,
        LogicOperation::RightShift,
        LogicOperation::Or,
        LogicOperation::And,
        LogicOperation::Xor,
        LogicOperation::Not,
    ];

    pub fn from_u32(value: u32) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    #[inline]
    pub const fn to_u32(self) -> u32 {
        self as u32
    }

    pub const fn is_unary(self) -> bool {
        matches!(self, Self::Not)
    }

    /// Shift amounts outside 0..64 shift every bit out.
    pub fn apply(self, lhs: i64, rhs: i64) -> i64 {
        let shift = u32::try_from(rhs).ok().filter(|s| *s < 64);
        match self {
            Self::LeftShift => shift.map_or(0, |s| ((lhs as u64) << s) as i64),
            Self::RightShift => shift.map_or(0, |s| ((lhs as u64) >> s) as i64),
            Self::Or => lhs | rhs,
            Self::And => lhs & rhs,
            Self::Xor => lhs ^ rhs,
            Self::Not => !lhs,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::LeftShift => "shl",
            Self::RightShift => "shr",
            Self::Or => "or",
            Self::And => "and",
            Self::Xor => "xor",
            Self::Not => "not",
        }
    }
}

impl fmt::Display for LogicOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

// ============================================================================
// Random number generation
// ============================================================================

/// Family of a declared random number generator
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RngKind {
    /// Seeded pseudo-random integer generator
    Seeded = 0,
}

impl RngKind {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Seeded),
            _ => None,
        }
    }

    #[inline]
    pub const fn to_u32(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for RngKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seeded => write!(f, "seeded"),
        }
    }
}

/// Family of a declared random distribution
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistributionKind {
    /// Integers uniformly drawn from `[min, max]`
    Uniform = 0,
}

impl DistributionKind {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Uniform),
            _ => None,
        }
    }

    #[inline]
    pub const fn to_u32(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for DistributionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uniform => write!(f, "uniform"),
        }
    }
}
