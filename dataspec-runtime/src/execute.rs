//! Command handlers
//!
//! The executor's implementation of [`ExecutorFunctions`]. Each handler
//! receives decoded operands; register operands are resolved here.

use crate::error::{Result, RuntimeError};
use crate::executor::{Executor, FunctionBlock};
use crate::state::Frame;
use dataspec_spec::{
    ArithmeticOperation, Condition, DataType, DistributionKind, ExecutorFunctions, Flow, LogicOperation, Opcode,
    Operand, Register, RngKind,
};

impl ExecutorFunctions for Executor {
    type Error = RuntimeError;

    // ========================================================================
    // Management
    // ========================================================================

    fn execute_break(&mut self) -> Result<Flow> {
        Err(RuntimeError::ExecutionBreak)
    }

    fn execute_reserve(&mut self, region: u32, size: u32, empty: bool, reference: Option<u32>) -> Result<Flow> {
        self.regions.reserve(region, size, empty, reference)?;
        Ok(Flow::Continue)
    }

    fn execute_free(&mut self, region: u32) -> Result<Flow> {
        self.regions.free(region)?;
        Ok(Flow::Continue)
    }

    fn execute_reference(&mut self, region: u32, reference: u32) -> Result<Flow> {
        self.regions.reference(region, reference)?;
        Ok(Flow::Continue)
    }

    fn execute_declare_rng(&mut self, rng: u32, kind: RngKind, seed: u64) -> Result<Flow> {
        self.random.declare_rng(rng, kind, seed)?;
        Ok(Flow::Continue)
    }

    fn execute_declare_random_dist(
        &mut self,
        distribution: u32,
        rng: u32,
        kind: DistributionKind,
        min: i64,
        max: i64,
    ) -> Result<Flow> {
        self.random.declare_distribution(distribution, rng, kind, min, max)?;
        Ok(Flow::Continue)
    }

    fn execute_get_random_number(&mut self, distribution: u32, dest: Register) -> Result<Flow> {
        let value = self.random.draw(distribution)?;
        self.state.write_reg(dest, value)?;
        Ok(Flow::Continue)
    }

    // ========================================================================
    // Structures
    // ========================================================================

    fn execute_start_struct(&mut self, structure: u32) -> Result<Flow> {
        self.structures.start(structure)?;
        Ok(Flow::Continue)
    }

    fn execute_struct_elem(&mut self, index: u32, data_type: DataType, value: Option<i64>) -> Result<Flow> {
        let raw = value.map(|v| data_type.raw_from_register(v)).transpose()?;
        self.structures.element(index, data_type, raw)?;
        Ok(Flow::Continue)
    }

    fn execute_end_struct(&mut self) -> Result<Flow> {
        self.structures.end()?;
        Ok(Flow::Continue)
    }

    fn execute_copy_struct(&mut self, source: u32, dest: u32) -> Result<Flow> {
        self.structures.copy(source, dest)?;
        Ok(Flow::Continue)
    }

    fn execute_copy_param(&mut self, source: u32, source_elem: u32, dest: u32, dest_elem: u32) -> Result<Flow> {
        self.structures.copy_element(source, source_elem, dest, dest_elem)?;
        Ok(Flow::Continue)
    }

    fn execute_write_param(&mut self, structure: u32, elem: u32, data_type: DataType, value: Operand) -> Result<Flow> {
        let raw = data_type.raw_from_register(self.state.value(value)?)?;
        self.structures.set(structure, elem, data_type, raw)?;
        Ok(Flow::Continue)
    }

    fn execute_read_param(&mut self, dest: Register, structure: u32, elem: u32) -> Result<Flow> {
        let (data_type, raw) = self.structures.value(structure, elem)?;
        self.state.write_reg(dest, data_type.raw_to_register(raw))?;
        Ok(Flow::Continue)
    }

    // ========================================================================
    // Function blocks
    // ========================================================================

    fn execute_start_function(&mut self, function: u32, params: &[Register]) -> Result<Flow> {
        if self.state.in_call() {
            return Err(RuntimeError::NestedFunction);
        }
        let limits = self.config.limits;
        if function >= limits.max_functions {
            return Err(RuntimeError::ParameterOutOfBounds {
                what: "function",
                value: function as i64,
                max: limits.max_functions,
            });
        }
        if params.len() > limits.max_function_args as usize {
            return Err(RuntimeError::ParameterOutOfBounds {
                what: "function parameters",
                value: params.len() as i64,
                max: limits.max_function_args,
            });
        }
        for param in params {
            self.state.read_reg(*param)?;
        }

        let body_pc = self.state.pc;
        let (end_pc, _) = self.skip_block(Opcode::StartFunction, Opcode::EndFunction, false)?;
        self.functions[function as usize] = Some(FunctionBlock {
            params: params.to_vec(),
            body_pc,
        });
        self.state.pc = end_pc;
        Ok(Flow::Continue)
    }

    fn execute_end_function(&mut self) -> Result<Flow> {
        match self.state.frames.last() {
            Some(Frame::Call { return_pc, .. }) => {
                self.state.pc = *return_pc;
                self.state.frames.pop();
                Ok(Flow::Continue)
            }
            _ => Err(RuntimeError::UnexpectedBlockEnd(Opcode::EndFunction)),
        }
    }

    fn execute_call(&mut self, function: u32, args: &[Operand]) -> Result<Flow> {
        if self.state.in_call() {
            return Err(RuntimeError::NestedCall(function));
        }
        let block = self
            .functions
            .get(function as usize)
            .and_then(Option::as_ref)
            .ok_or(RuntimeError::UndeclaredFunction(function))?;
        if block.params.len() != args.len() {
            return Err(RuntimeError::WrongParameterNumber {
                function,
                expected: block.params.len(),
                found: args.len(),
            });
        }
        let (params, body_pc) = (block.params.clone(), block.body_pc);

        // Every argument is read before any parameter is bound
        let values = args
            .iter()
            .map(|arg| self.state.value(*arg))
            .collect::<Result<Vec<_>>>()?;
        self.push_frame(Frame::Call {
            function,
            return_pc: self.state.pc,
        })?;
        for (param, value) in params.into_iter().zip(values) {
            self.state.write_reg(param, value)?;
        }
        self.state.pc = body_pc;
        Ok(Flow::Continue)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    fn execute_write(&mut self, data_type: DataType, value: Operand, repeats: Operand) -> Result<Flow> {
        let raw = data_type.raw_from_register(self.state.value(value)?)?;
        let bytes = data_type.raw_to_bytes(raw)?;
        let repeats = self.repeats(repeats)?;
        self.regions.focused_mut()?.write_repeated(&bytes, repeats)?;
        Ok(Flow::Continue)
    }

    fn execute_write_array(&mut self, data_type: DataType, data: &[u8]) -> Result<Flow> {
        data_type.decode_array(data)?;
        self.regions.focused_mut()?.write(data)?;
        Ok(Flow::Continue)
    }

    fn execute_write_struct(&mut self, structure: u32, repeats: Operand) -> Result<Flow> {
        let bytes = self.structures.to_bytes(structure)?;
        let repeats = self.repeats(repeats)?;
        self.regions.focused_mut()?.write_repeated(&bytes, repeats)?;
        Ok(Flow::Continue)
    }

    // ========================================================================
    // Control
    // ========================================================================

    fn execute_switch_focus(&mut self, region: Operand) -> Result<Flow> {
        let region = self.slot_operand("region", region, self.regions.max_regions())?;
        self.regions.switch_focus(region)?;
        Ok(Flow::Continue)
    }

    fn execute_loop(&mut self, counter: Register, start: Operand, end: Operand, increment: Operand) -> Result<Flow> {
        let start = self.state.value(start)?;
        let end = self.state.value(end)?;
        let increment = self.state.value(increment)?;
        if increment == 0 {
            return Err(RuntimeError::InvalidLoopIncrement);
        }

        if loop_continues(start, end, increment) {
            self.state.write_reg(counter, start)?;
            self.push_frame(Frame::Loop {
                body_pc: self.state.pc,
                counter,
                value: start,
                end,
                increment,
            })?;
        } else {
            let (pc, _) = self.skip_block(Opcode::Loop, Opcode::EndLoop, false)?;
            self.state.pc = pc;
        }
        Ok(Flow::Continue)
    }

    fn execute_end_loop(&mut self) -> Result<Flow> {
        let Some(Frame::Loop {
            body_pc,
            counter,
            value,
            end,
            increment,
        }) = self.state.frames.last_mut()
        else {
            return Err(RuntimeError::UnexpectedBlockEnd(Opcode::EndLoop));
        };

        match value.checked_add(*increment) {
            Some(next) if loop_continues(next, *end, *increment) => {
                *value = next;
                let (counter, body_pc) = (*counter, *body_pc);
                self.state.write_reg(counter, next)?;
                self.state.pc = body_pc;
            }
            _ => {
                self.state.frames.pop();
            }
        }
        Ok(Flow::Continue)
    }

    fn execute_if(&mut self, condition: Condition, lhs: Operand, rhs: Operand) -> Result<Flow> {
        let lhs = self.state.value(lhs)?;
        let rhs = self.state.value(rhs)?;
        if condition.evaluate(lhs, rhs) {
            self.push_frame(Frame::Conditional { taken: true })?;
            return Ok(Flow::Continue);
        }

        let (pc, terminator) = self.skip_block(Opcode::If, Opcode::EndIf, true)?;
        if terminator == Opcode::Else {
            self.push_frame(Frame::Conditional { taken: false })?;
        }
        self.state.pc = pc;
        Ok(Flow::Continue)
    }

    fn execute_else(&mut self) -> Result<Flow> {
        match self.state.frames.last() {
            Some(Frame::Conditional { taken: true }) => {
                let (pc, _) = self.skip_block(Opcode::If, Opcode::EndIf, false)?;
                self.state.frames.pop();
                self.state.pc = pc;
                Ok(Flow::Continue)
            }
            _ => Err(RuntimeError::UnexpectedBlockEnd(Opcode::Else)),
        }
    }

    fn execute_end_if(&mut self) -> Result<Flow> {
        match self.state.frames.last() {
            Some(Frame::Conditional { .. }) => {
                self.state.frames.pop();
                Ok(Flow::Continue)
            }
            _ => Err(RuntimeError::UnexpectedBlockEnd(Opcode::EndIf)),
        }
    }

    // ========================================================================
    // Registers and write pointer
    // ========================================================================

    fn execute_mv(&mut self, dest: Register, src: Operand) -> Result<Flow> {
        let value = self.state.value(src)?;
        self.state.write_reg(dest, value)?;
        Ok(Flow::Continue)
    }

    fn execute_get_wr_ptr(&mut self, dest: Register) -> Result<Flow> {
        let pointer = self.regions.focused()?.write_pointer();
        self.state.write_reg(dest, pointer as i64)?;
        Ok(Flow::Continue)
    }

    fn execute_set_wr_ptr(&mut self, address: Operand, relative: bool) -> Result<Flow> {
        let address = self.state.value(address)?;
        let region = self.regions.focused_mut()?;
        let target = if relative {
            (region.write_pointer() as i64).saturating_add(address)
        } else {
            address
        };
        region.set_write_pointer(target)?;
        Ok(Flow::Continue)
    }

    fn execute_align_wr_ptr(&mut self, boundary: Operand) -> Result<Flow> {
        let boundary = self.state.value(boundary)?;
        self.regions.focused_mut()?.align(boundary)?;
        Ok(Flow::Continue)
    }

    fn execute_save_wr_ptr(&mut self, region: Operand, dest: Register) -> Result<Flow> {
        let region = self.slot_operand("region", region, self.regions.max_regions())?;
        let pointer = self.regions.get(region)?.write_pointer();
        self.state.write_reg(dest, pointer as i64)?;
        Ok(Flow::Continue)
    }

    fn execute_arith_op(
        &mut self,
        operation: ArithmeticOperation,
        dest: Register,
        lhs: Operand,
        rhs: Operand,
    ) -> Result<Flow> {
        let result = operation.apply(self.state.value(lhs)?, self.state.value(rhs)?);
        self.state.write_reg(dest, result)?;
        Ok(Flow::Continue)
    }

    fn execute_logic_op(&mut self, operation: LogicOperation, dest: Register, lhs: Operand, rhs: Operand) -> Result<Flow> {
        let lhs = self.state.value(lhs)?;
        let rhs = if operation.is_unary() { 0 } else { self.state.value(rhs)? };
        self.state.write_reg(dest, operation.apply(lhs, rhs))?;
        Ok(Flow::Continue)
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    fn execute_print_val(&mut self, value: Operand) -> Result<Flow> {
        let line = self.state.value(value)?.to_string();
        self.print(line);
        Ok(Flow::Continue)
    }

    fn execute_print_text(&mut self, text: &str) -> Result<Flow> {
        self.print(text.to_string());
        Ok(Flow::Continue)
    }

    fn execute_print_struct(&mut self, structure: Operand) -> Result<Flow> {
        let max = self.config.limits.max_structs;
        let structure = self.slot_operand("structure", structure, max)?;
        let line = self.structures.describe(structure)?;
        self.print(line);
        Ok(Flow::Continue)
    }

    fn execute_end_spec(&mut self) -> Result<Flow> {
        if !self.state.frames.is_empty() {
            return Err(RuntimeError::UnclosedBlocks(self.state.frames.len()));
        }
        Ok(Flow::Halt)
    }
}

/// Whether a loop at `value` runs another iteration
fn loop_continues(value: i64, end: i64, increment: i64) -> bool {
    if increment > 0 {
        value < end
    } else {
        value > end
    }
}
