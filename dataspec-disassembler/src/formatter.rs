//! Command formatting to listing text
//!
//! [`Listing`] is an [`ExecutorFunctions`] backend that renders instead of
//! executing, so the text form covers every command the executor does.

use dataspec_spec::{
    dispatch, ArithmeticOperation, Command, Condition, DataType, DistributionKind, ExecutorFunctions, Flow,
    LogicOperation, Opcode, Operand, Register, RngKind, SpecError,
};
use std::fmt::Write;

/// Renders one command per call into a line buffer
#[derive(Debug, Default)]
pub struct Listing {
    line: String,
}

impl Listing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the text rendered by the last handler
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.line)
    }

    fn put(&mut self, args: std::fmt::Arguments<'_>) -> Result<Flow, SpecError> {
        self.line.clear();
        // Writing into a String cannot fail
        let _ = self.line.write_fmt(args);
        Ok(Flow::Continue)
    }
}

/// Format a command as listing text
pub fn format(command: &Command) -> String {
    let mut listing = Listing::new();
    match dispatch(&mut listing, command) {
        Ok(_) => listing.take(),
        Err(err) => format!("; {}", err),
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

impl ExecutorFunctions for Listing {
    type Error = SpecError;

    // ========================================================================
    // Management
    // ========================================================================

    fn execute_break(&mut self) -> Result<Flow, SpecError> {
        self.put(format_args!("{}", Opcode::Break))
    }

    fn execute_nop(&mut self) -> Result<Flow, SpecError> {
        self.put(format_args!("{}", Opcode::Nop))
    }

    fn execute_reserve(
        &mut self,
        region: u32,
        size: u32,
        empty: bool,
        reference: Option<u32>,
    ) -> Result<Flow, SpecError> {
        let suffix = if empty { " empty" } else { "" };
        match reference {
            Some(id) => self.put(format_args!("{} {}, {}{} ref={}", Opcode::Reserve, region, size, suffix, id)),
            None => self.put(format_args!("{} {}, {}{}", Opcode::Reserve, region, size, suffix)),
        }
    }

    fn execute_free(&mut self, region: u32) -> Result<Flow, SpecError> {
        self.put(format_args!("{} {}", Opcode::Free, region))
    }

    fn execute_reference(&mut self, region: u32, reference: u32) -> Result<Flow, SpecError> {
        self.put(format_args!("{} {}, ref={}", Opcode::Reference, region, reference))
    }

    fn execute_declare_rng(&mut self, rng: u32, kind: RngKind, seed: u64) -> Result<Flow, SpecError> {
        self.put(format_args!("{} {}, {}, seed={}", Opcode::DeclareRng, rng, kind, seed))
    }

    fn execute_declare_random_dist(
        &mut self,
        distribution: u32,
        rng: u32,
        kind: DistributionKind,
        min: i64,
        max: i64,
    ) -> Result<Flow, SpecError> {
        self.put(format_args!(
            "{} {}, rng={}, {} [{}, {}]",
            Opcode::DeclareRandomDist,
            distribution,
            rng,
            kind,
            min,
            max
        ))
    }

    fn execute_get_random_number(&mut self, distribution: u32, dest: Register) -> Result<Flow, SpecError> {
        self.put(format_args!("{} {}, dist={}", Opcode::GetRandomNumber, dest, distribution))
    }

    // ========================================================================
    // Structures
    // ========================================================================

    fn execute_start_struct(&mut self, structure: u32) -> Result<Flow, SpecError> {
        self.put(format_args!("{} {}", Opcode::StartStruct, structure))
    }

    fn execute_struct_elem(&mut self, index: u32, data_type: DataType, value: Option<i64>) -> Result<Flow, SpecError> {
        match value {
            Some(raw) => self.put(format_args!("{} {}, {} = {}", Opcode::StructElem, index, data_type, raw)),
            None => self.put(format_args!("{} {}, {}", Opcode::StructElem, index, data_type)),
        }
    }

    fn execute_end_struct(&mut self) -> Result<Flow, SpecError> {
        self.put(format_args!("{}", Opcode::EndStruct))
    }

    fn execute_copy_struct(&mut self, source: u32, dest: u32) -> Result<Flow, SpecError> {
        self.put(format_args!("{} {} -> {}", Opcode::CopyStruct, source, dest))
    }

    fn execute_copy_param(
        &mut self,
        source: u32,
        source_elem: u32,
        dest: u32,
        dest_elem: u32,
    ) -> Result<Flow, SpecError> {
        self.put(format_args!(
            "{} {}.{} -> {}.{}",
            Opcode::CopyParam,
            source,
            source_elem,
            dest,
            dest_elem
        ))
    }

    fn execute_write_param(
        &mut self,
        structure: u32,
        elem: u32,
        data_type: DataType,
        value: Operand,
    ) -> Result<Flow, SpecError> {
        self.put(format_args!(
            "{} {}.{}, {} = {}",
            Opcode::WriteParam,
            structure,
            elem,
            data_type,
            value
        ))
    }

    fn execute_read_param(&mut self, dest: Register, structure: u32, elem: u32) -> Result<Flow, SpecError> {
        self.put(format_args!("{} {}, {}.{}", Opcode::ReadParam, dest, structure, elem))
    }

    // ========================================================================
    // Function blocks
    // ========================================================================

    fn execute_start_function(&mut self, function: u32, params: &[Register]) -> Result<Flow, SpecError> {
        self.put(format_args!("{} {} ({})", Opcode::StartFunction, function, join(params)))
    }

    fn execute_end_function(&mut self) -> Result<Flow, SpecError> {
        self.put(format_args!("{}", Opcode::EndFunction))
    }

    fn execute_call(&mut self, function: u32, args: &[Operand]) -> Result<Flow, SpecError> {
        self.put(format_args!("{} {} ({})", Opcode::Call, function, join(args)))
    }

    // ========================================================================
    // Writes
    // ========================================================================

    fn execute_write(&mut self, data_type: DataType, value: Operand, repeats: Operand) -> Result<Flow, SpecError> {
        self.put(format_args!("{} {}, {} x {}", Opcode::Write, data_type, value, repeats))
    }

    fn execute_write_array(&mut self, data_type: DataType, data: &[u8]) -> Result<Flow, SpecError> {
        let hex: Vec<String> = data.iter().map(|b| format!("{:02x}", b)).collect();
        self.put(format_args!(
            "{} {}, {} bytes [{}]",
            Opcode::WriteArray,
            data_type,
            data.len(),
            hex.join(" ")
        ))
    }

    fn execute_write_struct(&mut self, structure: u32, repeats: Operand) -> Result<Flow, SpecError> {
        self.put(format_args!("{} {} x {}", Opcode::WriteStruct, structure, repeats))
    }

    // ========================================================================
    // Control
    // ========================================================================

    fn execute_switch_focus(&mut self, region: Operand) -> Result<Flow, SpecError> {
        self.put(format_args!("{} {}", Opcode::SwitchFocus, region))
    }

    fn execute_loop(
        &mut self,
        counter: Register,
        start: Operand,
        end: Operand,
        increment: Operand,
    ) -> Result<Flow, SpecError> {
        self.put(format_args!(
            "{} {} = {} to {} step {}",
            Opcode::Loop,
            counter,
            start,
            end,
            increment
        ))
    }

    fn execute_break_loop(&mut self) -> Result<Flow, SpecError> {
        self.put(format_args!("{}", Opcode::BreakLoop))
    }

    fn execute_end_loop(&mut self) -> Result<Flow, SpecError> {
        self.put(format_args!("{}", Opcode::EndLoop))
    }

    fn execute_if(&mut self, condition: Condition, lhs: Operand, rhs: Operand) -> Result<Flow, SpecError> {
        self.put(format_args!("{} {} {} {}", Opcode::If, lhs, condition.symbol(), rhs))
    }

    fn execute_else(&mut self) -> Result<Flow, SpecError> {
        self.put(format_args!("{}", Opcode::Else))
    }

    fn execute_end_if(&mut self) -> Result<Flow, SpecError> {
        self.put(format_args!("{}", Opcode::EndIf))
    }

    // ========================================================================
    // Registers and write pointer
    // ========================================================================

    fn execute_mv(&mut self, dest: Register, src: Operand) -> Result<Flow, SpecError> {
        self.put(format_args!("{} {}, {}", Opcode::Mv, dest, src))
    }

    fn execute_get_wr_ptr(&mut self, dest: Register) -> Result<Flow, SpecError> {
        self.put(format_args!("{} {}", Opcode::GetWrPtr, dest))
    }

    fn execute_set_wr_ptr(&mut self, address: Operand, relative: bool) -> Result<Flow, SpecError> {
        let mode = if relative { "relative" } else { "absolute" };
        self.put(format_args!("{} {} {}", Opcode::SetWrPtr, address, mode))
    }

    fn execute_align_wr_ptr(&mut self, boundary: Operand) -> Result<Flow, SpecError> {
        self.put(format_args!("{} {}", Opcode::AlignWrPtr, boundary))
    }

    fn execute_save_wr_ptr(&mut self, region: Operand, dest: Register) -> Result<Flow, SpecError> {
        self.put(format_args!("{} {}, {}", Opcode::SaveWrPtr, dest, region))
    }

    fn execute_arith_op(
        &mut self,
        operation: ArithmeticOperation,
        dest: Register,
        lhs: Operand,
        rhs: Operand,
    ) -> Result<Flow, SpecError> {
        self.put(format_args!("{} {} {}, {}, {}", Opcode::ArithOp, operation, dest, lhs, rhs))
    }

    fn execute_logic_op(
        &mut self,
        operation: LogicOperation,
        dest: Register,
        lhs: Operand,
        rhs: Operand,
    ) -> Result<Flow, SpecError> {
        if operation.is_unary() {
            self.put(format_args!("{} {} {}, {}", Opcode::LogicOp, operation, dest, lhs))
        } else {
            self.put(format_args!("{} {} {}, {}, {}", Opcode::LogicOp, operation, dest, lhs, rhs))
        }
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    fn execute_print_val(&mut self, value: Operand) -> Result<Flow, SpecError> {
        self.put(format_args!("{} {}", Opcode::PrintVal, value))
    }

    fn execute_print_text(&mut self, text: &str) -> Result<Flow, SpecError> {
        self.put(format_args!("{} {:?}", Opcode::PrintText, text))
    }

    fn execute_print_struct(&mut self, structure: Operand) -> Result<Flow, SpecError> {
        self.put(format_args!("{} {}", Opcode::PrintStruct, structure))
    }

    fn execute_comment(&mut self, text: &str) -> Result<Flow, SpecError> {
        self.put(format_args!("; {}", text))
    }

    fn execute_end_spec(&mut self) -> Result<Flow, SpecError> {
        self.put(format_args!("{}", Opcode::EndSpec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_write() {
        let cmd = Command::Write {
            data_type: DataType::Uint32,
            value: Operand::Immediate(42),
            repeats: Operand::Register(Register::R2),
        };
        assert_eq!(format(&cmd), "write uint32, 42 x r2");
    }

    #[test]
    fn test_format_if() {
        let cmd = Command::If {
            condition: Condition::GreaterThanOrEqual,
            lhs: Operand::Register(Register::R0),
            rhs: Operand::Immediate(3),
        };
        assert_eq!(format(&cmd), "if r0 >= 3");
    }

    #[test]
    fn test_format_loop() {
        let cmd = Command::Loop {
            counter: Register::R1,
            start: Operand::Immediate(0),
            end: Operand::Immediate(5),
            increment: Operand::Immediate(1),
        };
        assert_eq!(format(&cmd), "loop r1 = 0 to 5 step 1");
    }

    #[test]
    fn test_format_text_is_quoted() {
        let cmd = Command::PrintText { text: "a \"b\"".into() };
        assert_eq!(format(&cmd), r#"print_txt "a \"b\"""#);
        assert_eq!(format(&Command::Comment { text: "note".into() }), "; note");
    }

    #[test]
    fn test_format_unary_logic() {
        let cmd = Command::LogicOp {
            operation: LogicOperation::Not,
            dest: Register::R3,
            lhs: Operand::Register(Register::R4),
            rhs: Operand::Immediate(0),
        };
        assert_eq!(format(&cmd), "logic_op not r3, r4");
    }

    #[test]
    fn test_format_array_hex() {
        let cmd = Command::WriteArray {
            data_type: DataType::Uint16,
            data: vec![0x01, 0x00, 0xff, 0x7f],
        };
        assert_eq!(format(&cmd), "write_array uint16, 4 bytes [01 00 ff 7f]");
    }

    #[test]
    fn test_format_references() {
        let cmd = Command::Reserve {
            region: 2,
            size: 64,
            empty: false,
            reference: Some(7),
        };
        assert_eq!(format(&cmd), "reserve 2, 64 ref=7");
        assert_eq!(format(&Command::Reference { region: 3, reference: 7 }), "reference 3, ref=7");
    }
}
