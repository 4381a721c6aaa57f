//! # Executor Function Interface
//!
//! One handler per command family. The executor implements every handler;
//! other backends (the disassembler listing, recording doubles in tests)
//! implement the ones they care about and inherit a default that reports
//! the command as unimplemented.
//!
//! Handlers receive decoded, typed operands and return a [`Flow`] telling
//! the driving loop how to continue.

use crate::command::{Command, Operand};
use crate::data_type::DataType;
use crate::error::SpecError;
use crate::opcode::Opcode;
use crate::operation::{ArithmeticOperation, Condition, DistributionKind, LogicOperation, RngKind};
use crate::register::Register;

/// What the driving loop does after a handler returns
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Carry on with the next command
    Continue,
    /// Leave the innermost loop
    BreakLoop,
    /// Stop cleanly
    Halt,
}

fn unimplemented<E: From<SpecError>>(opcode: Opcode) -> Result<Flow, E> {
    Err(SpecError::Unimplemented(opcode).into())
}

pub trait ExecutorFunctions {
    type Error: From<SpecError>;

    // ========================================================================
    // Management
    // ========================================================================

    fn execute_break(&mut self) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::Break)
    }

    fn execute_nop(&mut self) -> Result<Flow, Self::Error> {
        Ok(Flow::Continue)
    }

    fn execute_reserve(
        &mut self,
        _region: u32,
        _size: u32,
        _empty: bool,
        _reference: Option<u32>,
    ) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::Reserve)
    }

    fn execute_free(&mut self, _region: u32) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::Free)
    }

    fn execute_reference(&mut self, _region: u32, _reference: u32) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::Reference)
    }

    fn execute_declare_rng(&mut self, _rng: u32, _kind: RngKind, _seed: u64) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::DeclareRng)
    }

    fn execute_declare_random_dist(
        &mut self,
        _distribution: u32,
        _rng: u32,
        _kind: DistributionKind,
        _min: i64,
        _max: i64,
    ) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::DeclareRandomDist)
    }

    fn execute_get_random_number(&mut self, _distribution: u32, _dest: Register) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::GetRandomNumber)
    }

    // ========================================================================
    // Structures
    // ========================================================================

    fn execute_start_struct(&mut self, _structure: u32) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::StartStruct)
    }

    fn execute_struct_elem(
        &mut self,
        _index: u32,
        _data_type: DataType,
        _value: Option<i64>,
    ) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::StructElem)
    }

    fn execute_end_struct(&mut self) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::EndStruct)
    }

    fn execute_copy_struct(&mut self, _source: u32, _dest: u32) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::CopyStruct)
    }

    fn execute_copy_param(
        &mut self,
        _source: u32,
        _source_elem: u32,
        _dest: u32,
        _dest_elem: u32,
    ) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::CopyParam)
    }

    fn execute_write_param(
        &mut self,
        _structure: u32,
        _elem: u32,
        _data_type: DataType,
        _value: Operand,
    ) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::WriteParam)
    }

    fn execute_read_param(&mut self, _dest: Register, _structure: u32, _elem: u32) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::ReadParam)
    }

    // ========================================================================
    // Function blocks
    // ========================================================================

    fn execute_start_function(&mut self, _function: u32, _params: &[Register]) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::StartFunction)
    }

    fn execute_end_function(&mut self) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::EndFunction)
    }

    fn execute_call(&mut self, _function: u32, _args: &[Operand]) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::Call)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    fn execute_write(&mut self, _data_type: DataType, _value: Operand, _repeats: Operand) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::Write)
    }

    fn execute_write_array(&mut self, _data_type: DataType, _data: &[u8]) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::WriteArray)
    }

    fn execute_write_struct(&mut self, _structure: u32, _repeats: Operand) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::WriteStruct)
    }

    // ========================================================================
    // Control
    // ========================================================================

    fn execute_switch_focus(&mut self, _region: Operand) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::SwitchFocus)
    }

    fn execute_loop(
        &mut self,
        _counter: Register,
        _start: Operand,
        _end: Operand,
        _increment: Operand,
    ) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::Loop)
    }

    fn execute_break_loop(&mut self) -> Result<Flow, Self::Error> {
        Ok(Flow::BreakLoop)
    }

    fn execute_end_loop(&mut self) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::EndLoop)
    }

    fn execute_if(&mut self, _condition: Condition, _lhs: Operand, _rhs: Operand) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::If)
    }

    fn execute_else(&mut self) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::Else)
    }

    fn execute_end_if(&mut self) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::EndIf)
    }

    // ========================================================================
    // Registers and write pointer
    // ========================================================================

    fn execute_mv(&mut self, _dest: Register, _src: Operand) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::Mv)
    }

    fn execute_get_wr_ptr(&mut self, _dest: Register) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::GetWrPtr)
    }

    fn execute_set_wr_ptr(&mut self, _address: Operand, _relative: bool) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::SetWrPtr)
    }

    fn execute_align_wr_ptr(&mut self, _boundary: Operand) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::AlignWrPtr)
    }

    fn execute_save_wr_ptr(&mut self, _region: Operand, _dest: Register) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::SaveWrPtr)
    }

    fn execute_arith_op(
        &mut self,
        _operation: ArithmeticOperation,
        _dest: Register,
        _lhs: Operand,
        _rhs: Operand,
    ) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::ArithOp)
    }

    fn execute_logic_op(
        &mut self,
        _operation: LogicOperation,
        _dest: Register,
        _lhs: Operand,
        _rhs: Operand,
    ) -> Result<Flow, Self::Error> {
        unimplemented(Opcode::LogicOp)
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    fn execute_print_val(&mut self, _value: Operand) -> Result<Flow, Self::Error> {
        Ok(Flow::Continue)
    }

    fn execute_print_text(&mut self, _text: &str) -> Result<Flow, Self::Error> {
        Ok(Flow::Continue)
    }

    fn execute_print_struct(&mut self, _structure: Operand) -> Result<Flow, Self::Error> {
        Ok(Flow::Continue)
    }

    fn execute_comment(&mut self, _text: &str) -> Result<Flow, Self::Error> {
        Ok(Flow::Continue)
    }

    fn execute_end_spec(&mut self) -> Result<Flow, Self::Error> {
        Ok(Flow::Halt)
    }
}

/// Route a decoded command to the matching handler
pub fn dispatch<F: ExecutorFunctions + ?Sized>(handler: &mut F, command: &Command) -> Result<Flow, F::Error> {
    match command {
        Command::Break => handler.execute_break(),
        Command::Nop => handler.execute_nop(),
        Command::Reserve {
            region,
            size,
            empty,
            reference,
        } => handler.execute_reserve(*region, *size, *empty, *reference),
        Command::Free { region } => handler.execute_free(*region),
        Command::Reference { region, reference } => handler.execute_reference(*region, *reference),
        Command::DeclareRng { rng, kind, seed } => handler.execute_declare_rng(*rng, *kind, *seed),
        Command::DeclareRandomDist {
            distribution,
            rng,
            kind,
            min,
            max,
        } => handler.execute_declare_random_dist(*distribution, *rng, *kind, *min, *max),
        Command::GetRandomNumber { distribution, dest } => handler.execute_get_random_number(*distribution, *dest),
        Command::StartStruct { structure } => handler.execute_start_struct(*structure),
        Command::StructElem {
            index,
            data_type,
            value,
        } => handler.execute_struct_elem(*index, *data_type, *value),
        Command::EndStruct => handler.execute_end_struct(),
        Command::StartFunction { function, params } => handler.execute_start_function(*function, params),
        Command::EndFunction => handler.execute_end_function(),
        Command::Call { function, args } => handler.execute_call(*function, args),
        Command::Write {
            data_type,
            value,
            repeats,
        } => handler.execute_write(*data_type, *value, *repeats),
        Command::WriteArray { data_type, data } => handler.execute_write_array(*data_type, data),
        Command::WriteStruct { structure, repeats } => handler.execute_write_struct(*structure, *repeats),
        Command::SwitchFocus { region } => handler.execute_switch_focus(*region),
        Command::Loop {
            counter,
            start,
            end,
            increment,
        } => handler.execute_loop(*counter, *start, *end, *increment),
        Command::BreakLoop => handler.execute_break_loop(),
        Command::EndLoop => handler.execute_end_loop(),
        Command::If { condition, lhs, rhs } => handler.execute_if(*condition, *lhs, *rhs),
        Command::Else => handler.execute_else(),
        Command::EndIf => handler.execute_end_if(),
        Command::Mv { dest, src } => handler.execute_mv(*dest, *src),
        Command::GetWrPtr { dest } => handler.execute_get_wr_ptr(*dest),
        Command::SetWrPtr { address, relative } => handler.execute_set_wr_ptr(*address, *relative),
        Command::AlignWrPtr { boundary } => handler.execute_align_wr_ptr(*boundary),
        Command::SaveWrPtr { region, dest } => handler.execute_save_wr_ptr(*region, *dest),
        Command::ArithOp {
            operation,
            dest,
            lhs,
            rhs,
        } => handler.execute_arith_op(*operation, *dest, *lhs, *rhs),
        Command::LogicOp {
            operation,
            dest,
            lhs,
            rhs,
        } => handler.execute_logic_op(*operation, *dest, *lhs, *rhs),
        Command::CopyStruct { source, dest } => handler.execute_copy_struct(*source, *dest),
        Command::CopyParam {
            source,
            source_elem,
            dest,
            dest_elem,
        } => handler.execute_copy_param(*source, *source_elem, *dest, *dest_elem),
        Command::WriteParam {
            structure,
            elem,
            data_type,
            value,
        } => handler.execute_write_param(*structure, *elem, *data_type, *value),
        Command::ReadParam { dest, structure, elem } => handler.execute_read_param(*dest, *structure, *elem),
        Command::PrintVal { value } => handler.execute_print_val(*value),
        Command::PrintText { text } => handler.execute_print_text(text),
        Command::PrintStruct { structure } => handler.execute_print_struct(*structure),
        Command::Comment { text } => handler.execute_comment(text),
        Command::EndSpec => handler.execute_end_spec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records reserve and write calls, leaves everything else at the defaults
    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl ExecutorFunctions for Recorder {
        type Error = SpecError;

        fn execute_reserve(
            &mut self,
            region: u32,
            size: u32,
            empty: bool,
            reference: Option<u32>,
        ) -> Result<Flow, SpecError> {
            self.calls.push(format!("reserve {} {} {} {:?}", region, size, empty, reference));
            Ok(Flow::Continue)
        }

        fn execute_write(&mut self, data_type: DataType, value: Operand, repeats: Operand) -> Result<Flow, SpecError> {
            self.calls.push(format!("write {} {} {}", data_type, value, repeats));
            Ok(Flow::Continue)
        }
    }

    #[test]
    fn test_dispatch_routes_to_handlers() {
        let mut rec = Recorder::default();
        let cmds = [
            Command::Reserve {
                region: 1,
                size: 8,
                empty: false,
                reference: Some(4),
            },
            Command::Write {
                data_type: DataType::Uint32,
                value: Operand::Immediate(42),
                repeats: Operand::Register(Register::R2),
            },
        ];
        for cmd in &cmds {
            assert_eq!(dispatch(&mut rec, cmd).unwrap(), Flow::Continue);
        }
        assert_eq!(rec.calls, vec!["reserve 1 8 false Some(4)", "write uint32 42 r2"]);
    }

    #[test]
    fn test_defaults() {
        let mut rec = Recorder::default();
        assert_eq!(dispatch(&mut rec, &Command::Nop).unwrap(), Flow::Continue);
        assert_eq!(dispatch(&mut rec, &Command::BreakLoop).unwrap(), Flow::BreakLoop);
        assert_eq!(dispatch(&mut rec, &Command::EndSpec).unwrap(), Flow::Halt);
        assert_eq!(
            dispatch(&mut rec, &Command::Comment { text: "x".into() }).unwrap(),
            Flow::Continue
        );
    }

    #[test]
    fn test_unimplemented_default() {
        let mut rec = Recorder::default();
        let err = dispatch(&mut rec, &Command::Free { region: 0 }).unwrap_err();
        assert!(matches!(err, SpecError::Unimplemented(Opcode::Free)));
    }
}
