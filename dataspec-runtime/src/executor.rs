//! Executor for data specification command streams

use crate::error::{Result, RuntimeError};
use crate::memory::MemoryRegions;
use crate::random::RandomSources;
use crate::state::{ExecutorState, Frame, HaltReason};
use crate::structure::StructureTable;
use dataspec_disassembler::decode_at;
use dataspec_spec::{
    dispatch, Command, DataImage, Flow, Limits, Opcode, Operand, Register, RegionKind, SpecError, NUM_REGISTERS,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// Executor configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Resource bounds
    pub limits: Limits,

    /// Maximum number of commands executed before halting
    pub max_steps: u64,

    /// Log every executed command at trace level
    pub trace: bool,

    /// Fail the run if any region not reserved empty is never written
    pub require_full_coverage: bool,

    /// Upper bound on the finished image size
    pub max_image_bytes: Option<usize>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            limits: Limits::DEFAULT,
            max_steps: 1_000_000,
            trace: false,
            require_full_coverage: false,
            max_image_bytes: None,
        }
    }
}

impl ExecutorConfig {
    pub fn validate(&self) -> Result<()> {
        self.limits.validate().map_err(SpecError::from)?;
        Ok(())
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_full_coverage(mut self) -> Self {
        self.require_full_coverage = true;
        self
    }
}

/// Execution result
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Number of commands executed
    pub steps: u64,

    /// Reason for halting
    pub halt_reason: HaltReason,

    /// Finished image, present only after a clean halt
    pub image: Option<DataImage>,

    /// Reserved regions with no payload in the image, ascending id
    pub unfilled_regions: Vec<u32>,

    /// Regions that were expected to be written but never were
    pub unwritten_regions: Vec<u32>,

    /// `(region, identifier)` of regions exported to other images
    pub referenceable_regions: Vec<(u32, u32)>,

    /// `(region, identifier)` of regions owned by other images
    pub references_to_fill: Vec<(u32, u32)>,

    /// Output of the print commands, in execution order
    pub diagnostics: Vec<String>,

    /// Register file at halt
    pub registers: [i64; NUM_REGISTERS],
}

impl ExecutionResult {
    /// Halted at an end command with every expected region written
    pub fn is_clean(&self) -> bool {
        self.halt_reason.is_clean() && self.unwritten_regions.is_empty()
    }
}

/// A function body recorded by its start command
#[derive(Debug, Clone)]
pub(crate) struct FunctionBlock {
    pub params: Vec<Register>,
    pub body_pc: usize,
}

/// Data specification executor
///
/// Owns the region collection and register file for one run over one
/// command stream.
pub struct Executor {
    pub(crate) bytes: Vec<u8>,
    pub(crate) config: ExecutorConfig,
    pub(crate) state: ExecutorState,
    pub(crate) regions: MemoryRegions,
    pub(crate) structures: StructureTable,
    pub(crate) random: RandomSources,
    pub(crate) functions: Vec<Option<FunctionBlock>>,
    pub(crate) diagnostics: Vec<String>,
}

impl Executor {
    pub fn new(bytes: impl Into<Vec<u8>>, config: ExecutorConfig) -> Result<Self> {
        config.validate()?;
        let limits = config.limits;
        Ok(Self {
            bytes: bytes.into(),
            config,
            state: ExecutorState::new(limits.max_registers),
            regions: MemoryRegions::new(limits.max_regions, limits.max_region_bytes),
            structures: StructureTable::new(limits.max_structs, limits.max_struct_elements),
            random: RandomSources::new(limits.max_rngs, limits.max_distributions),
            functions: vec![None; limits.max_functions as usize],
            diagnostics: Vec::new(),
        })
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn state(&self) -> &ExecutorState {
        &self.state
    }

    /// Region buffers, including partial writes left by a failed run
    pub fn regions(&self) -> &MemoryRegions {
        &self.regions
    }

    pub fn structures(&self) -> &StructureTable {
        &self.structures
    }

    /// Run until halt
    ///
    /// A fatal error stops the run immediately; the executor keeps its
    /// state for inspection.
    pub fn run(&mut self) -> Result<ExecutionResult> {
        while !self.state.is_halted() {
            if self.state.steps >= self.config.max_steps {
                self.state.halt(HaltReason::StepLimit);
                break;
            }
            if self.state.pc >= self.bytes.len() {
                self.state.halt(HaltReason::EndOfStream);
                break;
            }

            let offset = self.state.pc;
            let (command, size) = decode_at(&self.bytes, offset)?;
            let index = self.state.steps;
            self.state.pc = offset + size;
            self.state.steps += 1;

            debug!(index, offset, opcode = %command.opcode(), "execute");
            if self.config.trace {
                trace!(?command, registers = ?self.state.registers, "state");
            }

            self.step(&command).map_err(|source| RuntimeError::Command {
                index,
                offset,
                opcode: command.opcode(),
                source: Box::new(source),
            })?;
        }

        self.finish()
    }

    fn step(&mut self, command: &Command) -> Result<()> {
        let opcode = command.opcode();
        if self.structures.is_defining()
            && !matches!(opcode, Opcode::StructElem | Opcode::EndStruct | Opcode::Comment | Opcode::Nop)
        {
            return Err(RuntimeError::StructureOpen);
        }

        match dispatch(self, command)? {
            Flow::Continue => {}
            Flow::BreakLoop => self.unwind_loop()?,
            Flow::Halt => self.state.halt(HaltReason::EndSpec),
        }
        Ok(())
    }

    fn finish(&self) -> Result<ExecutionResult> {
        let halt_reason = self.state.halt_reason.unwrap_or(HaltReason::EndOfStream);
        let unfilled_regions: Vec<u32> = self
            .regions
            .iter()
            .filter(|r| r.is_unfilled())
            .map(|r| r.id())
            .collect();
        let unwritten_regions: Vec<u32> = self
            .regions
            .iter()
            .filter(|r| r.is_missing_data())
            .map(|r| r.id())
            .collect();
        for region in &unwritten_regions {
            warn!(region, "region never written");
        }
        let referenceable_regions: Vec<(u32, u32)> = self
            .regions
            .iter()
            .filter_map(|r| r.reference().map(|id| (r.id(), id)))
            .collect();
        let references_to_fill: Vec<(u32, u32)> = self.regions.references().collect();

        let image = if halt_reason.is_clean() {
            if self.config.require_full_coverage && !unwritten_regions.is_empty() {
                return Err(RuntimeError::IncompleteCoverage(unwritten_regions));
            }
            let mut parts: Vec<(u32, RegionKind, Vec<u8>)> = self
                .regions
                .iter()
                .filter(|r| !r.is_unfilled())
                .map(|r| {
                    let kind = r.reference().map_or(RegionKind::Data, RegionKind::Referenceable);
                    (r.id(), kind, r.data().to_vec())
                })
                .collect();
            parts.extend(
                references_to_fill
                    .iter()
                    .map(|(region, id)| (*region, RegionKind::Reference(*id), Vec::new())),
            );
            let image = DataImage::from_parts(parts)?;
            if let Some(max) = self.config.max_image_bytes {
                if image.total_size() > max {
                    return Err(RuntimeError::ImageTooLarge {
                        size: image.total_size(),
                        max,
                    });
                }
            }
            Some(image)
        } else {
            warn!(?halt_reason, steps = self.state.steps, "execution ended without an end command");
            None
        };

        Ok(ExecutionResult {
            steps: self.state.steps,
            halt_reason,
            image,
            unfilled_regions,
            unwritten_regions,
            referenceable_regions,
            references_to_fill,
            diagnostics: self.diagnostics.clone(),
            registers: self.state.registers,
        })
    }

    // ========================================================================
    // Control helpers
    // ========================================================================

    /// Push a control frame, enforcing the nesting bound
    pub(crate) fn push_frame(&mut self, frame: Frame) -> Result<()> {
        let max = self.config.limits.max_nesting_depth;
        if self.state.frames.len() >= max as usize {
            return Err(RuntimeError::NestingTooDeep(max));
        }
        self.state.frames.push(frame);
        Ok(())
    }

    /// Scan forward from the command pointer for the end of a block
    ///
    /// Returns the offset just past the terminator and its opcode, which is
    /// `close`, or `Else` when `stop_at_else` is set and an else at the same
    /// depth comes first.
    pub(crate) fn skip_block(&self, open: Opcode, close: Opcode, stop_at_else: bool) -> Result<(usize, Opcode)> {
        let mut depth = 0usize;
        let mut pc = self.state.pc;
        while pc < self.bytes.len() {
            let (command, size) = decode_at(&self.bytes, pc)?;
            pc += size;
            let opcode = command.opcode();
            if opcode == open {
                if open == Opcode::StartFunction {
                    return Err(RuntimeError::NestedFunction);
                }
                depth += 1;
            } else if opcode == close {
                if depth == 0 {
                    return Ok((pc, opcode));
                }
                depth -= 1;
            } else if stop_at_else && depth == 0 && opcode == Opcode::Else {
                return Ok((pc, opcode));
            }
        }
        Err(RuntimeError::UnmatchedBlock(open))
    }

    /// Leave the innermost loop, resuming after its end command
    fn unwind_loop(&mut self) -> Result<()> {
        loop {
            match self.state.frames.pop() {
                Some(Frame::Loop { .. }) => break,
                Some(Frame::Conditional { .. }) => continue,
                Some(frame @ Frame::Call { .. }) => {
                    self.state.frames.push(frame);
                    return Err(RuntimeError::BreakOutsideLoop);
                }
                None => return Err(RuntimeError::BreakOutsideLoop),
            }
        }
        let (pc, _) = self.skip_block(Opcode::Loop, Opcode::EndLoop, false)?;
        self.state.pc = pc;
        Ok(())
    }

    // ========================================================================
    // Operand helpers
    // ========================================================================

    /// Resolve an operand naming a table slot (region, structure, ...)
    pub(crate) fn slot_operand(&self, what: &'static str, operand: Operand, max: u32) -> Result<u32> {
        let value = self.state.value(operand)?;
        if value < 0 || value >= max as i64 {
            return Err(RuntimeError::ParameterOutOfBounds { what, value, max });
        }
        Ok(value as u32)
    }

    /// Resolve a repeat count, which must be at least one
    pub(crate) fn repeats(&self, operand: Operand) -> Result<u64> {
        let value = self.state.value(operand)?;
        if value < 1 {
            return Err(RuntimeError::InvalidRepeats(value));
        }
        Ok(value as u64)
    }

    pub(crate) fn print(&mut self, line: String) {
        tracing::info!(target: "dataspec::print", "{}", line);
        self.diagnostics.push(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataspec_generator::Generator;
    use dataspec_spec::DataType;

    fn run_gen(gen: &Generator) -> Result<ExecutionResult> {
        Executor::new(gen.to_bytes(), ExecutorConfig::default())?.run()
    }

    #[test]
    fn test_single_region_image() {
        let mut gen = Generator::default();
        gen.reserve_memory_region(0, 16, None, false).unwrap();
        gen.switch_write_focus(0).unwrap();
        gen.write_value(42u32, DataType::Uint32, 1).unwrap();
        gen.end_specification().unwrap();

        let result = run_gen(&gen).unwrap();
        assert!(result.is_clean());
        assert_eq!(result.steps, 4);
        let image = result.image.unwrap();
        assert_eq!(image.entries.len(), 1);
        assert_eq!(image.entries[0].offset, 0);
        assert_eq!(image.entries[0].size, 16);
        assert_eq!(&image.payload[..4], &42u32.to_le_bytes());
        assert!(image.payload[4..16].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_empty_stream_ends_abnormally() {
        let result = Executor::new(Vec::new(), ExecutorConfig::default())
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(result.halt_reason, HaltReason::EndOfStream);
        assert!(result.image.is_none());
    }

    #[test]
    fn test_step_limit() {
        let mut gen = Generator::default();
        gen.start_loop(Register::R0, 0, 1_000, 1).unwrap();
        gen.no_operation().unwrap();
        gen.end_loop().unwrap();
        gen.end_specification().unwrap();

        let config = ExecutorConfig::default().with_max_steps(50);
        let result = Executor::new(gen.to_bytes(), config).unwrap().run().unwrap();
        assert_eq!(result.halt_reason, HaltReason::StepLimit);
        assert_eq!(result.steps, 50);
        assert!(result.image.is_none());
    }

    #[test]
    fn test_unfilled_region_reported() {
        let mut gen = Generator::default();
        gen.reserve_memory_region(0, 8, None, false).unwrap();
        gen.reserve_memory_region(1, 8, None, false).unwrap();
        gen.reserve_memory_region(2, 8, None, true).unwrap();
        gen.switch_write_focus(1).unwrap();
        gen.write_value(1u8, DataType::Uint8, 1).unwrap();
        gen.end_specification().unwrap();

        let result = run_gen(&gen).unwrap();
        assert_eq!(result.unfilled_regions, vec![0, 2]);
        assert_eq!(result.unwritten_regions, vec![0]);
        assert!(!result.is_clean());
        let image = result.image.unwrap();
        assert_eq!(image.entries.len(), 1);
        assert_eq!(image.entries[0].region, 1);

        let config = ExecutorConfig::default().with_full_coverage();
        let err = Executor::new(gen.to_bytes(), config).unwrap().run().unwrap_err();
        assert!(matches!(err, RuntimeError::IncompleteCoverage(ref ids) if ids == &[0]));
    }

    #[test]
    fn test_empty_regions_satisfy_coverage() {
        let mut gen = Generator::default();
        gen.reserve_memory_region(0, 8, None, true).unwrap();
        gen.reserve_memory_region(1, 4, None, false).unwrap();
        gen.switch_write_focus(1).unwrap();
        gen.write_value(5u32, DataType::Uint32, 1).unwrap();
        gen.end_specification().unwrap();

        let config = ExecutorConfig::default().with_full_coverage();
        let result = Executor::new(gen.to_bytes(), config).unwrap().run().unwrap();
        assert!(result.is_clean());
        assert_eq!(result.unfilled_regions, vec![0]);
        assert!(result.unwritten_regions.is_empty());
        assert_eq!(result.image.unwrap().entries.len(), 1);
    }

    #[test]
    fn test_image_size_limit() {
        let mut gen = Generator::default();
        gen.reserve_memory_region(0, 64, None, false).unwrap();
        gen.switch_write_focus(0).unwrap();
        gen.write_value(1u8, DataType::Uint8, 1).unwrap();
        gen.end_specification().unwrap();

        let config = ExecutorConfig {
            max_image_bytes: Some(32),
            ..ExecutorConfig::default()
        };
        let err = Executor::new(gen.to_bytes(), config).unwrap().run().unwrap_err();
        assert!(matches!(err, RuntimeError::ImageTooLarge { max: 32, .. }));
    }

    #[test]
    fn test_error_carries_command_position() {
        let mut gen = Generator::default();
        gen.reserve_memory_region(0, 2, None, false).unwrap();
        gen.switch_write_focus(0).unwrap();
        // A register repeat count keeps the generator from sizing the write
        gen.set_register_value(Register::R1, 1).unwrap();
        gen.write_value(7u32, DataType::Uint32, Register::R1).unwrap();
        gen.end_specification().unwrap();

        let mut executor = Executor::new(gen.to_bytes(), ExecutorConfig::default()).unwrap();
        let err = executor.run().unwrap_err();
        match &err {
            RuntimeError::Command { index, opcode, .. } => {
                assert_eq!(*index, 3);
                assert_eq!(*opcode, Opcode::Write);
            }
            other => panic!("expected command context, got {other:?}"),
        }
        assert!(matches!(err.root(), RuntimeError::RegionExhausted { region: 0, .. }));
        assert!(err.is_resource());
        assert_eq!(executor.regions().get(0).unwrap().write_pointer(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ExecutorConfig::default().with_limits(Limits::DEFAULT.with_max_regions(0));
        assert!(matches!(
            Executor::new(Vec::new(), config),
            Err(RuntimeError::SpecError(SpecError::InvalidConfig(_)))
        ));
    }
}
