//! Runtime error types
//!
//! Every error is fatal to the run. Errors raised while executing a command
//! are wrapped in [`RuntimeError::Command`] with the command's position.

use crate::state::HaltReason;
use dataspec_disassembler::DecodeError;
use dataspec_spec::{DataType, Opcode, Register, SpecError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Spec error: {0}")]
    SpecError(#[from] SpecError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Command {index} ({opcode}) at offset {offset}: {source}")]
    Command {
        index: u64,
        offset: usize,
        opcode: Opcode,
        source: Box<RuntimeError>,
    },

    // ========== Resources ==========
    #[error("Region {0} is not allocated")]
    NotAllocated(u32),

    #[error("Region {0} is already in use")]
    RegionInUse(u32),

    #[error("Region {region} size {size} exceeds the {max} byte limit")]
    RegionTooLarge { region: u32, size: u32, max: u32 },

    #[error("Region {region} exhausted: {required} bytes needed, capacity {capacity}")]
    RegionExhausted {
        region: u32,
        capacity: u32,
        required: u64,
    },

    #[error("Region {0} was reserved empty and cannot be written")]
    RegionUnfilled(u32),

    #[error("Region {0} references another image and holds no data")]
    ReferenceRegion(u32),

    #[error("Reference identifier {0} is already exported")]
    DuplicateReference(u32),

    #[error("No region selected for writing")]
    NoRegionSelected,

    #[error("Write pointer {pointer} outside region {region} of {capacity} bytes")]
    WritePointerOutOfBounds { region: u32, pointer: i64, capacity: u32 },

    #[error("{what} {value} out of bounds (limit {max})")]
    ParameterOutOfBounds {
        what: &'static str,
        value: i64,
        max: u32,
    },

    #[error("Register {register} is outside the {max} available registers")]
    InvalidRegister { register: Register, max: u32 },

    #[error("Image of {size} bytes exceeds the {max} byte limit")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Regions never written: {0:?}")]
    IncompleteCoverage(Vec<u32>),

    // ========== Control ==========
    #[error("Execution break")]
    ExecutionBreak,

    #[error("Break outside of a loop")]
    BreakOutsideLoop,

    #[error("Loop increment must not be zero")]
    InvalidLoopIncrement,

    #[error("Nesting depth limit of {0} reached")]
    NestingTooDeep(u32),

    #[error("{0} does not close an open block")]
    UnexpectedBlockEnd(Opcode),

    #[error("{0} block has no matching end before the end of the stream")]
    UnmatchedBlock(Opcode),

    #[error("{0} blocks still open at end of specification")]
    UnclosedBlocks(usize),

    #[error("Cannot start a function inside another function")]
    NestedFunction,

    #[error("Cannot call function {0} from inside a function body")]
    NestedCall(u32),

    #[error("Function {0} is not defined")]
    UndeclaredFunction(u32),

    #[error("Function {function} takes {expected} arguments, {found} given")]
    WrongParameterNumber {
        function: u32,
        expected: usize,
        found: usize,
    },

    #[error("Execution ended abnormally: {0:?}")]
    AbnormalTermination(HaltReason),

    // ========== Structures ==========
    #[error("Structure {0} is not defined")]
    UndeclaredStructure(u32),

    #[error("A structure definition is still open")]
    StructureOpen,

    #[error("No structure definition is open")]
    NoOpenStructure,

    #[error("Structure {structure} element {found} declared where {expected} was expected")]
    NonContiguousElement { structure: u32, expected: u32, found: u32 },

    #[error("Structure {0} has no elements")]
    EmptyStructure(u32),

    #[error("Structure {structure} has no element {elem}")]
    ElementOutOfBounds { structure: u32, elem: u32 },

    #[error("Element {elem} of structure {structure} has no value")]
    UndefinedElement { structure: u32, elem: u32 },

    #[error("Element {elem} of structure {structure} is {expected}, not {found}")]
    TypeMismatch {
        structure: u32,
        elem: u32,
        expected: DataType,
        found: DataType,
    },

    // ========== Random numbers ==========
    #[error("Random number generator {0} is not declared")]
    UndeclaredRng(u32),

    #[error("Random distribution {0} is not declared")]
    UndeclaredDistribution(u32),

    #[error("Distribution bounds [{min}, {max}] are empty")]
    InvalidDistributionBounds { min: i64, max: i64 },

    // ========== Operands ==========
    #[error("Alignment {0} is not a power of two")]
    InvalidAlignment(i64),

    #[error("Repeat count {0} must be at least 1")]
    InvalidRepeats(i64),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

impl RuntimeError {
    /// The error with any command context stripped
    pub fn root(&self) -> &RuntimeError {
        match self {
            RuntimeError::Command { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if the error is a region, register or size limit violation
    pub fn is_resource(&self) -> bool {
        matches!(
            self.root(),
            RuntimeError::NotAllocated(_)
                | RuntimeError::RegionInUse(_)
                | RuntimeError::RegionTooLarge { .. }
                | RuntimeError::RegionExhausted { .. }
                | RuntimeError::RegionUnfilled(_)
                | RuntimeError::ReferenceRegion(_)
                | RuntimeError::DuplicateReference(_)
                | RuntimeError::NoRegionSelected
                | RuntimeError::WritePointerOutOfBounds { .. }
                | RuntimeError::ParameterOutOfBounds { .. }
                | RuntimeError::InvalidRegister { .. }
                | RuntimeError::ImageTooLarge { .. }
                | RuntimeError::IncompleteCoverage(_)
        )
    }

    /// Check if the error is a control-flow violation or an unusable command
    pub fn is_control(&self) -> bool {
        match self.root() {
            RuntimeError::ExecutionBreak
            | RuntimeError::BreakOutsideLoop
            | RuntimeError::InvalidLoopIncrement
            | RuntimeError::NestingTooDeep(_)
            | RuntimeError::UnexpectedBlockEnd(_)
            | RuntimeError::UnmatchedBlock(_)
            | RuntimeError::UnclosedBlocks(_)
            | RuntimeError::NestedFunction
            | RuntimeError::NestedCall(_)
            | RuntimeError::UndeclaredFunction(_)
            | RuntimeError::WrongParameterNumber { .. }
            | RuntimeError::AbnormalTermination(_)
            | RuntimeError::Decode(_) => true,
            RuntimeError::SpecError(err) => matches!(err, SpecError::Unimplemented(_) | SpecError::InvalidOpcode(_)),
            _ => false,
        }
    }

    /// Opcode of the command that failed, if known
    pub fn opcode(&self) -> Option<Opcode> {
        match self {
            RuntimeError::Command { opcode, .. } => Some(*opcode),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_exhausted_display() {
        let err = RuntimeError::RegionExhausted {
            region: 2,
            capacity: 16,
            required: 20,
        };
        assert_eq!(err.to_string(), "Region 2 exhausted: 20 bytes needed, capacity 16");
    }

    #[test]
    fn test_command_context() {
        let err = RuntimeError::Command {
            index: 4,
            offset: 36,
            opcode: Opcode::BreakLoop,
            source: Box::new(RuntimeError::BreakOutsideLoop),
        };
        assert_eq!(
            err.to_string(),
            "Command 4 (break_loop) at offset 36: Break outside of a loop"
        );
        assert!(matches!(err.root(), RuntimeError::BreakOutsideLoop));
        assert_eq!(err.opcode(), Some(Opcode::BreakLoop));
    }

    #[test]
    fn test_classification() {
        assert!(RuntimeError::NotAllocated(1).is_resource());
        assert!(!RuntimeError::NotAllocated(1).is_control());
        assert!(RuntimeError::BreakOutsideLoop.is_control());
        assert!(RuntimeError::from(SpecError::Unimplemented(Opcode::Write)).is_control());
        assert!(!RuntimeError::UndeclaredStructure(0).is_resource());
    }

    #[test]
    fn test_spec_error_from() {
        let err: RuntimeError = SpecError::UnknownDataType(99).into();
        assert!(err.to_string().contains("Unknown data type id: 99"));
    }
}
