//! # Command Definitions
//!
//! A [`Command`] is one decoded entry of a command stream. Generators build
//! them, the encoder packs them into words, and decoders hand them to an
//! [`crate::ExecutorFunctions`] backend.
//!
//! ## Payload Layout
//!
//! Each command is a header word followed by the payload words listed here
//! (`op` = two-word operand slot, `w` = one word, `d` = two-word value,
//! `txt` = length-prefixed padded bytes):
//!
//! ```text
//! reserve            region:w size:w empty:w has_reference:w reference:w
//! free               region:w
//! reference          region:w reference:w
//! declare_rng        rng:w kind:w seed:d
//! declare_random_dist dist:w rng:w kind:w min:d max:d
//! get_random_number  dist:w dest:w
//! start_struct       id:w
//! struct_elem        index:w type:w has_value:w value:d
//! start_function     id:w count:w params:w*count
//! call               id:w count:w args:op*count
//! write              type:w value:op repeats:op
//! write_array        type:w data:txt
//! write_struct       id:w repeats:op
//! switch_focus       region:op
//! loop               counter:w start:op end:op increment:op
//! if                 condition:w lhs:op rhs:op
//! mv                 dest:w src:op
//! get_wr_ptr         dest:w
//! set_wr_ptr         address:op relative:w
//! align_wr_ptr       boundary:op
//! save_wr_ptr        region:op dest:w
//! arith_op/logic_op  operation:w dest:w lhs:op rhs:op
//! copy_struct        source:w dest:w
//! copy_param         source:w source_elem:w dest:w dest_elem:w
//! write_param        id:w elem:w type:w value:op
//! read_param         dest:w id:w elem:w
//! print_val          value:op
//! print_txt/comment  text:txt
//! print_struct       id:op
//! ```
//!
//! All other commands carry no payload.

use crate::data_type::DataType;
use crate::opcode::Opcode;
use crate::operation::{ArithmeticOperation, Condition, DistributionKind, LogicOperation, RngKind};
use crate::register::Register;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A value that is either given inline or read from a register at execution
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    Immediate(i64),
    Register(Register),
}

impl Operand {
    #[inline]
    pub fn is_register(&self) -> bool {
        matches!(self, Operand::Register(_))
    }

    pub fn register(&self) -> Option<Register> {
        match self {
            Operand::Register(reg) => Some(*reg),
            Operand::Immediate(_) => None,
        }
    }

    pub fn immediate(&self) -> Option<i64> {
        match self {
            Operand::Immediate(v) => Some(*v),
            Operand::Register(_) => None,
        }
    }
}

impl From<i64> for Operand {
    fn from(v: i64) -> Self {
        Operand::Immediate(v)
    }
}

impl From<i32> for Operand {
    fn from(v: i32) -> Self {
        Operand::Immediate(v as i64)
    }
}

impl From<u32> for Operand {
    fn from(v: u32) -> Self {
        Operand::Immediate(v as i64)
    }
}

impl From<Register> for Operand {
    fn from(reg: Register) -> Self {
        Operand::Register(reg)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Immediate(v) => write!(f, "{}", v),
            Operand::Register(reg) => write!(f, "{}", reg),
        }
    }
}

/// One decoded command
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    // ========== Management ==========
    Break,
    Nop,
    Reserve {
        region: u32,
        size: u32,
        /// Region is reserved but never written
        empty: bool,
        /// Identifier under which other images may reference this region
        reference: Option<u32>,
    },
    Free {
        region: u32,
    },
    /// Stand in for a referenceable region owned by another image
    Reference {
        region: u32,
        reference: u32,
    },
    DeclareRng {
        rng: u32,
        kind: RngKind,
        seed: u64,
    },
    DeclareRandomDist {
        distribution: u32,
        rng: u32,
        kind: DistributionKind,
        min: i64,
        max: i64,
    },
    GetRandomNumber {
        distribution: u32,
        dest: Register,
    },

    // ========== Structures ==========
    StartStruct {
        structure: u32,
    },
    StructElem {
        index: u32,
        data_type: DataType,
        /// Raw (scaled) value, if the element is defined up front
        value: Option<i64>,
    },
    EndStruct,

    // ========== Function blocks ==========
    StartFunction {
        function: u32,
        params: Vec<Register>,
    },
    EndFunction,
    Call {
        function: u32,
        args: Vec<Operand>,
    },

    // ========== Writes ==========
    Write {
        data_type: DataType,
        /// Raw (scaled) value
        value: Operand,
        repeats: Operand,
    },
    WriteArray {
        data_type: DataType,
        data: Vec<u8>,
    },
    WriteStruct {
        structure: u32,
        repeats: Operand,
    },

    // ========== Control ==========
    SwitchFocus {
        region: Operand,
    },
    Loop {
        counter: Register,
        start: Operand,
        end: Operand,
        increment: Operand,
    },
    BreakLoop,
    EndLoop,
    If {
        condition: Condition,
        lhs: Operand,
        rhs: Operand,
    },
    Else,
    EndIf,

    // ========== Registers and write pointer ==========
    Mv {
        dest: Register,
        src: Operand,
    },
    GetWrPtr {
        dest: Register,
    },
    SetWrPtr {
        address: Operand,
        relative: bool,
    },
    AlignWrPtr {
        boundary: Operand,
    },
    SaveWrPtr {
        region: Operand,
        dest: Register,
    },
    ArithOp {
        operation: ArithmeticOperation,
        dest: Register,
        lhs: Operand,
        rhs: Operand,
    },
    LogicOp {
        operation: LogicOperation,
        dest: Register,
        lhs: Operand,
        rhs: Operand,
    },

    // ========== Structure parameters ==========
    CopyStruct {
        source: u32,
        dest: u32,
    },
    CopyParam {
        source: u32,
        source_elem: u32,
        dest: u32,
        dest_elem: u32,
    },
    WriteParam {
        structure: u32,
        elem: u32,
        data_type: DataType,
        value: Operand,
    },
    ReadParam {
        dest: Register,
        structure: u32,
        elem: u32,
    },

    // ========== Diagnostics ==========
    PrintVal {
        value: Operand,
    },
    PrintText {
        text: String,
    },
    PrintStruct {
        structure: Operand,
    },
    Comment {
        text: String,
    },

    EndSpec,
}

impl Command {
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::Break => Opcode::Break,
            Command::Nop => Opcode::Nop,
            Command::Reserve { .. } => Opcode::Reserve,
            Command::Free { .. } => Opcode::Free,
            Command::Reference { .. } => Opcode::Reference,
            Command::DeclareRng { .. } => Opcode::DeclareRng,
            Command::DeclareRandomDist { .. } => Opcode::DeclareRandomDist,
            Command::GetRandomNumber { .. } => Opcode::GetRandomNumber,
            Command::StartStruct { .. } => Opcode::StartStruct,
            Command::StructElem { .. } => Opcode::StructElem,
            Command::EndStruct => Opcode::EndStruct,
            Command::StartFunction { .. } => Opcode::StartFunction,
            Command::EndFunction => Opcode::EndFunction,
            Command::Call { .. } => Opcode::Call,
            Command::Write { .. } => Opcode::Write,
            Command::WriteArray { .. } => Opcode::WriteArray,
            Command::WriteStruct { .. } => Opcode::WriteStruct,
            Command::SwitchFocus { .. } => Opcode::SwitchFocus,
            Command::Loop { .. } => Opcode::Loop,
            Command::BreakLoop => Opcode::BreakLoop,
            Command::EndLoop => Opcode::EndLoop,
            Command::If { .. } => Opcode::If,
            Command::Else => Opcode::Else,
            Command::EndIf => Opcode::EndIf,
            Command::Mv { .. } => Opcode::Mv,
            Command::GetWrPtr { .. } => Opcode::GetWrPtr,
            Command::SetWrPtr { .. } => Opcode::SetWrPtr,
            Command::AlignWrPtr { .. } => Opcode::AlignWrPtr,
            Command::SaveWrPtr { .. } => Opcode::SaveWrPtr,
            Command::ArithOp { .. } => Opcode::ArithOp,
            Command::LogicOp { .. } => Opcode::LogicOp,
            Command::CopyStruct { .. } => Opcode::CopyStruct,
            Command::CopyParam { .. } => Opcode::CopyParam,
            Command::WriteParam { .. } => Opcode::WriteParam,
            Command::ReadParam { .. } => Opcode::ReadParam,
            Command::PrintVal { .. } => Opcode::PrintVal,
            Command::PrintText { .. } => Opcode::PrintText,
            Command::PrintStruct { .. } => Opcode::PrintStruct,
            Command::Comment { .. } => Opcode::Comment,
            Command::EndSpec => Opcode::EndSpec,
        }
    }

    /// Operand slots in wire order
    pub fn operands(&self) -> Vec<Operand> {
        match self {
            Command::Call { args, .. } => args.clone(),
            Command::Write { value, repeats, .. } => vec![*value, *repeats],
            Command::WriteStruct { repeats, .. } => vec![*repeats],
            Command::SwitchFocus { region } => vec![*region],
            Command::Loop {
                start,
                end,
                increment,
                ..
            } => vec![*start, *end, *increment],
            Command::If { lhs, rhs, .. } => vec![*lhs, *rhs],
            Command::Mv { src, .. } => vec![*src],
            Command::SetWrPtr { address, .. } => vec![*address],
            Command::AlignWrPtr { boundary } => vec![*boundary],
            Command::SaveWrPtr { region, .. } => vec![*region],
            Command::ArithOp { lhs, rhs, .. } | Command::LogicOp { lhs, rhs, .. } => {
                vec![*lhs, *rhs]
            }
            Command::WriteParam { value, .. } => vec![*value],
            Command::PrintVal { value } => vec![*value],
            Command::PrintStruct { structure } => vec![*structure],
            _ => Vec::new(),
        }
    }

    /// Every register the command reads or writes
    pub fn registers(&self) -> Vec<Register> {
        let mut regs: Vec<Register> = self.operands().iter().filter_map(Operand::register).collect();
        match self {
            Command::GetRandomNumber { dest, .. }
            | Command::Mv { dest, .. }
            | Command::GetWrPtr { dest }
            | Command::SaveWrPtr { dest, .. }
            | Command::ArithOp { dest, .. }
            | Command::LogicOp { dest, .. }
            | Command::ReadParam { dest, .. } => regs.push(*dest),
            Command::Loop { counter, .. } => regs.push(*counter),
            Command::StartFunction { params, .. } => regs.extend(params.iter().copied()),
            _ => {}
        }
        regs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_conversions() {
        assert_eq!(Operand::from(5i64), Operand::Immediate(5));
        assert_eq!(Operand::from(Register::R3), Operand::Register(Register::R3));
        assert!(Operand::Register(Register::R1).is_register());
        assert_eq!(Operand::Immediate(9).immediate(), Some(9));
        assert_eq!(Operand::Immediate(9).register(), None);
    }

    #[test]
    fn test_operand_display() {
        assert_eq!(Operand::Immediate(-4).to_string(), "-4");
        assert_eq!(Operand::Register(Register::R2).to_string(), "r2");
    }

    #[test]
    fn test_opcode_mapping() {
        assert_eq!(Command::EndSpec.opcode(), Opcode::EndSpec);
        assert_eq!(
            Command::Reserve { region: 0, size: 4, empty: false, reference: None }.opcode(),
            Opcode::Reserve
        );
        assert_eq!(
            Command::Call { function: 0, args: vec![] }.opcode(),
            Opcode::Call
        );
    }

    #[test]
    fn test_operand_slots_in_order() {
        let cmd = Command::Loop {
            counter: Register::R0,
            start: Operand::Immediate(0),
            end: Operand::Register(Register::R1),
            increment: Operand::Immediate(1),
        };
        assert_eq!(
            cmd.operands(),
            vec![
                Operand::Immediate(0),
                Operand::Register(Register::R1),
                Operand::Immediate(1)
            ]
        );
        assert_eq!(cmd.registers(), vec![Register::R1, Register::R0]);
    }

    #[test]
    fn test_registers_include_params() {
        let cmd = Command::StartFunction {
            function: 1,
            params: vec![Register::R4, Register::R5],
        };
        assert!(cmd.operands().is_empty());
        assert_eq!(cmd.registers(), vec![Register::R4, Register::R5]);
    }
}
