//! # Opcode Definitions
//!
//! One opcode per command. Values occupy the top byte of a command's header
//! word (see [`crate::encoding`]).
//!
//! ## Opcode Families
//!
//! - 0x00-0x07: Region and random number management
//! - 0x10-0x12: Structure definition
//! - 0x20-0x40: Function blocks (START_CONSTRUCTOR, END_CONSTRUCTOR, CONSTRUCT)
//! - 0x42-0x44: Writes
//! - 0x50-0x57: Focus, loops and conditionals
//! - 0x60-0x68: Registers and write pointer
//! - 0x70-0x73: Structure parameters
//! - 0x80-0x83: Diagnostics
//! - 0xFF:      End of specification

use serde::{Deserialize, Serialize};
use std::fmt;

/// Command opcode (8 bits)
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // ========== Management (0x00-0x07) ==========
    /// BREAK: stop execution with an error
    Break = 0x00,
    /// NOP: do nothing
    Nop = 0x01,
    /// RESERVE: allocate a memory region
    Reserve = 0x02,
    /// FREE: release a memory region
    Free = 0x03,
    /// REFERENCE: bind a region to a referenceable region elsewhere
    Reference = 0x04,
    /// DECLARE_RNG: seed a random number generator
    DeclareRng = 0x05,
    /// DECLARE_RANDOM_DIST: bind a distribution to a generator
    DeclareRandomDist = 0x06,
    /// GET_RANDOM_NUMBER: draw from a distribution into a register
    GetRandomNumber = 0x07,

    // ========== Structures (0x10-0x12) ==========
    /// START_STRUCT: open a structure definition
    StartStruct = 0x10,
    /// STRUCT_ELEM: declare one element of the open structure
    StructElem = 0x11,
    /// END_STRUCT: close the structure definition
    EndStruct = 0x12,

    // ========== Function blocks (0x20-0x40) ==========
    /// START_CONSTRUCTOR: open a function body
    StartFunction = 0x20,
    /// END_CONSTRUCTOR: close a function body
    EndFunction = 0x25,
    /// CONSTRUCT: call a function
    Call = 0x40,

    // ========== Writes (0x42-0x44) ==========
    /// WRITE: write a value, optionally repeated
    Write = 0x42,
    /// WRITE_ARRAY: write pre-encoded array bytes
    WriteArray = 0x43,
    /// WRITE_STRUCT: serialize a structure, optionally repeated
    WriteStruct = 0x44,

    // ========== Control (0x50-0x57) ==========
    /// SWITCH_FOCUS: select the region written by subsequent writes
    SwitchFocus = 0x50,
    /// LOOP: start a counted loop
    Loop = 0x51,
    /// BREAK_LOOP: leave the innermost loop
    BreakLoop = 0x52,
    /// END_LOOP: end of the loop body
    EndLoop = 0x53,
    /// IF: start a conditional block
    If = 0x55,
    /// ELSE: start the false branch
    Else = 0x56,
    /// END_IF: end of the conditional block
    EndIf = 0x57,

    // ========== Registers and write pointer (0x60-0x68) ==========
    /// MV: dest = operand
    Mv = 0x60,
    /// GET_WR_PTR: dest = write pointer of the focused region
    GetWrPtr = 0x63,
    /// SET_WR_PTR: move the write pointer of the focused region
    SetWrPtr = 0x64,
    /// ALIGN_WR_PTR: round the write pointer up to a boundary
    AlignWrPtr = 0x65,
    /// SAVE_WR_PTR: dest = write pointer of any region
    SaveWrPtr = 0x66,
    /// ARITH_OP: dest = lhs (+|-|*) rhs
    ArithOp = 0x67,
    /// LOGIC_OP: dest = lhs (<<|>>|or|and|xor|not) rhs
    LogicOp = 0x68,

    // ========== Structure parameters (0x70-0x73) ==========
    /// COPY_STRUCT: duplicate a structure under a new id
    CopyStruct = 0x70,
    /// COPY_PARAM: copy one element between structures
    CopyParam = 0x71,
    /// WRITE_PARAM: set one element
    WriteParam = 0x72,
    /// READ_PARAM: load one element into a register
    ReadParam = 0x73,

    // ========== Diagnostics (0x80-0x83) ==========
    /// PRINT_VAL: log a value
    PrintVal = 0x80,
    /// PRINT_TXT: log text
    PrintText = 0x81,
    /// PRINT_STRUCT: log a structure
    PrintStruct = 0x82,
    /// COMMENT: carried in the stream, ignored by the executor
    Comment = 0x83,

    // ========== End (0xFF) ==========
    /// END_SPEC: halt cleanly
    EndSpec = 0xFF,
}

impl Opcode {
    /// Every opcode, in numeric order
    pub const ALL: [Opcode; 40] = [
        Opcode::Break,
        Opcode::Nop,
        Opcode::Reserve,
        Opcode::Free,
        Opcode::Reference,
        Opcode::DeclareRng,
        Opcode::DeclareRandomDist,
        Opcode::GetRandomNumber,
        Opcode::StartStruct,
        Opcode::StructElem,
        Opcode::EndStruct,
        Opcode::StartFunction,
        Opcode::EndFunction,
        Opcode::Call,
        Opcode::Write,
        Opcode::WriteArray,
        Opcode::WriteStruct,
        Opcode::SwitchFocus,
        Opcode::Loop,
        Opcode::BreakLoop,
        Opcode::EndLoop,
        Opcode::If,
        Opcode::Else,
        Opcode::EndIf,
        Opcode::Mv,
        Opcode::GetWrPtr,
        Opcode::SetWrPtr,
        Opcode::AlignWrPtr,
        Opcode::SaveWrPtr,
        Opcode::ArithOp,
        Opcode::LogicOp,
        Opcode::CopyStruct,
        Opcode::CopyParam,
        Opcode::WriteParam,
        Opcode::ReadParam,
        Opcode::PrintVal,
        Opcode::PrintText,
        Opcode::PrintStruct,
        Opcode::Comment,
        Opcode::EndSpec,
    ];

    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.to_u8() == value)
    }

    /// Convert to u8
    #[inline]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Commands that open a nested block
    pub const fn opens_block(self) -> bool {
        matches!(self, Self::Loop | Self::If | Self::StartFunction | Self::StartStruct)
    }

    /// Commands that close a nested block
    pub const fn closes_block(self) -> bool {
        matches!(self, Self::EndLoop | Self::EndIf | Self::EndFunction | Self::EndStruct)
    }

    /// Commands that put bytes into a region
    pub const fn is_write(self) -> bool {
        matches!(self, Self::Write | Self::WriteArray | Self::WriteStruct)
    }

    /// Commands with no effect on regions or registers
    pub const fn is_diagnostic(self) -> bool {
        matches!(
            self,
            Self::PrintVal | Self::PrintText | Self::PrintStruct | Self::Comment | Self::Nop
        )
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Self::Break => "break",
            Self::Nop => "nop",
            Self::Reserve => "reserve",
            Self::Free => "free",
            Self::Reference => "reference",
            Self::DeclareRng => "declare_rng",
            Self::DeclareRandomDist => "declare_random_dist",
            Self::GetRandomNumber => "get_random_number",
            Self::StartStruct => "start_struct",
            Self::StructElem => "struct_elem",
            Self::EndStruct => "end_struct",
            Self::StartFunction => "start_function",
            Self::EndFunction => "end_function",
            Self::Call => "call",
            Self::Write => "write",
            Self::WriteArray => "write_array",
            Self::WriteStruct => "write_struct",
            Self::SwitchFocus => "switch_focus",
            Self::Loop => "loop",
            Self::BreakLoop => "break_loop",
            Self::EndLoop => "end_loop",
            Self::If => "if",
            Self::Else => "else",
            Self::EndIf => "end_if",
            Self::Mv => "mv",
            Self::GetWrPtr => "get_wr_ptr",
            Self::SetWrPtr => "set_wr_ptr",
            Self::AlignWrPtr => "align_wr_ptr",
            Self::SaveWrPtr => "save_wr_ptr",
            Self::ArithOp => "arith_op",
            Self::LogicOp => "logic_op",
            Self::CopyStruct => "copy_struct",
            Self::CopyParam => "copy_param",
            Self::WriteParam => "write_param",
            Self::ReadParam => "read_param",
            Self::PrintVal => "print_val",
            Self::PrintText => "print_txt",
            Self::PrintStruct => "print_struct",
            Self::Comment => "comment",
            Self::EndSpec => "end_spec",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}
