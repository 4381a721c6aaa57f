//! Generator errors
//!
//! Every error aborts the builder call that raised it and leaves the
//! already-emitted stream untouched.

use dataspec_spec::{DataType, Opcode, Register, SpecError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeneratorError {
    // Lifecycle
    #[error("Specification already ended")]
    SpecificationEnded,

    // Encoding errors
    #[error("Encoding error: {0}")]
    Encoding(#[from] SpecError),

    #[error("Payload of {opcode} is {words} words, larger than a command can carry")]
    PayloadTooLarge { opcode: Opcode, words: usize },

    #[error("{opcode} has {count} operands, more than a header can flag")]
    TooManyOperands { opcode: Opcode, count: usize },

    // Bounds
    #[error("{what} {value} out of bounds (limit {max})")]
    ParameterOutOfBounds {
        what: &'static str,
        value: i64,
        max: u32,
    },

    #[error("Register {register} is outside the {max} available registers")]
    InvalidRegister { register: Register, max: u32 },

    #[error("Region {region} size {size} exceeds the {max} byte limit")]
    RegionTooLarge { region: u32, size: u32, max: u32 },

    #[error("Region {region} would be exhausted: {required} bytes written into {capacity}")]
    RegionExhausted {
        region: u32,
        capacity: u32,
        required: u64,
    },

    // Duplicate declarations
    #[error("Region {0} is already in use")]
    RegionInUse(u32),

    #[error("Element {index} of structure {structure} is already declared")]
    DuplicateElement { structure: u32, index: u32 },

    #[error("Register {0} is listed twice as a function parameter")]
    DuplicateParameter(Register),

    #[error("Reference identifier {0} is already exported")]
    DuplicateReference(u32),

    // Undeclared references
    #[error("Region {0} is not allocated")]
    NotAllocated(u32),

    #[error("Region {0} was reserved empty and cannot be written")]
    RegionUnfilled(u32),

    #[error("Region {0} references another image and holds no data")]
    ReferenceRegion(u32),

    #[error("No region selected for writing")]
    NoRegionSelected,

    #[error("Structure {0} is not defined")]
    UndeclaredStructure(u32),

    #[error("Function {0} is not defined")]
    UndeclaredFunction(u32),

    #[error("Random number generator {0} is not declared")]
    UndeclaredRng(u32),

    #[error("Random distribution {0} is not declared")]
    UndeclaredDistribution(u32),

    // Nesting violations
    #[error("Cannot start a function inside another function")]
    NestedFunction,

    #[error("Cannot start a function inside a loop or conditional")]
    FunctionInBlock,

    #[error("Cannot call function {0} from inside a function body")]
    NestedCall(u32),

    #[error("No function is open")]
    NoOpenFunction,

    #[error("A structure definition is already open")]
    NestedStructure,

    #[error("No structure definition is open")]
    NoOpenStructure,

    #[error("{0} is not allowed while a structure definition is open")]
    StructureOpen(Opcode),

    #[error("Break outside of a loop")]
    BreakOutsideLoop,

    #[error("Expected to close {expected}, found {found:?}")]
    MismatchedBlock {
        expected: Opcode,
        found: Option<Opcode>,
    },

    #[error("Conditional already has an else branch")]
    DuplicateElse,

    #[error("Nesting depth limit of {0} reached")]
    NestingTooDeep(u32),

    #[error("{0} block left open at end of specification")]
    Unclosed(Opcode),

    // Operand checks
    #[error("Function {function} takes {expected} arguments, {found} given")]
    WrongParameterNumber {
        function: u32,
        expected: usize,
        found: usize,
    },

    #[error("Element {elem} of structure {structure} is {expected}, not {found}")]
    TypeMismatch {
        structure: u32,
        elem: u32,
        expected: DataType,
        found: DataType,
    },

    #[error("Element {elem} of structure {structure} has no value")]
    UndefinedElement { structure: u32, elem: u32 },

    #[error("Structure {structure} is missing element {index}")]
    MissingElement { structure: u32, index: u32 },

    #[error("Structure has no elements")]
    EmptyStructure,

    #[error("Loop increment must not be zero")]
    InvalidLoopIncrement,

    #[error("Alignment {0} is not a power of two")]
    InvalidAlignment(i64),

    #[error("Repeat count {0} must be at least 1")]
    InvalidRepeats(i64),

    #[error("Distribution bounds [{min}, {max}] are empty")]
    InvalidDistributionBounds { min: i64, max: i64 },

    #[error("Text of {len} bytes exceeds {max}")]
    TextTooLong { len: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, GeneratorError>;

impl GeneratorError {
    /// Check if the error comes from a value that does not fit its type
    pub fn is_encoding_error(&self) -> bool {
        match self {
            GeneratorError::Encoding(err) => err.is_encoding_error(),
            _ => false,
        }
    }

    /// Check if the error is a block nesting violation
    pub fn is_nesting_error(&self) -> bool {
        matches!(
            self,
            GeneratorError::NestedFunction
                | GeneratorError::FunctionInBlock
                | GeneratorError::NestedCall(_)
                | GeneratorError::NoOpenFunction
                | GeneratorError::NestedStructure
                | GeneratorError::NoOpenStructure
                | GeneratorError::StructureOpen(_)
                | GeneratorError::BreakOutsideLoop
                | GeneratorError::MismatchedBlock { .. }
                | GeneratorError::DuplicateElse
                | GeneratorError::NestingTooDeep(_)
                | GeneratorError::Unclosed(_)
        )
    }
}
