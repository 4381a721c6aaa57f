//! # Specification Generator
//!
//! A builder with one call per command family. Each call validates its
//! arguments against what has been declared so far, then appends the
//! encoded command(s) to an append-only stream. A failed call leaves the
//! stream exactly as it was.
//!
//! ## Tracked State
//!
//! - reserved regions, their sizes and a static estimate of each write pointer
//! - exported and referenced region identifiers
//! - the focused region
//! - declared structures with element types and which elements hold values
//! - declared functions, their parameter registers and whether they move the focus
//! - declared random number generators and distributions
//! - the stack of open loops and conditionals
//!
//! Write-pointer estimates are only kept for commands outside every loop,
//! conditional and function body; anything dynamic marks the region's
//! estimate unknown and capacity is then left to the executor.

use crate::encoder::encode;
use crate::error::{GeneratorError, Result};
use dataspec_spec::encoding::{words_to_bytes, MAX_PAYLOAD_WORDS, WORD_SIZE};
use dataspec_spec::{
    ArithmeticOperation, Command, Condition, DataType, DistributionKind, Limits, LogicOperation, Opcode, Operand,
    RegionKind, Register, RngKind, SpecError, Value, MAX_PRINT_TEXT,
};
use tracing::debug;

#[derive(Debug, Clone)]
struct RegionSlot {
    size: u32,
    empty: bool,
    kind: RegionKind,
    label: Option<String>,
    /// Bytes written so far, when statically known
    estimate: Option<u64>,
}

#[derive(Debug, Clone)]
struct StructSlot {
    /// Element type and whether a value has been given
    elements: Vec<(DataType, bool)>,
}

impl StructSlot {
    fn byte_size(&self) -> u64 {
        self.elements.iter().map(|(t, _)| t.size() as u64).sum()
    }

    fn check_defined(&self, structure: u32) -> Result<()> {
        match self.elements.iter().position(|(_, defined)| !defined) {
            Some(elem) => Err(GeneratorError::UndefinedElement {
                structure,
                elem: elem as u32,
            }),
            None => Ok(()),
        }
    }
}

/// Definition buffered until `end_structure`, keyed by element index
#[derive(Debug, Clone)]
struct OpenStruct {
    id: u32,
    elements: Vec<Option<(DataType, Option<i64>)>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    None,
    Region(u32),
    /// Chosen at execution time (register operand or function body)
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Loop,
    If { has_else: bool },
}

impl Block {
    fn opcode(self) -> Opcode {
        match self {
            Block::Loop => Opcode::Loop,
            Block::If { .. } => Opcode::If,
        }
    }
}

#[derive(Debug, Clone)]
struct OpenFunction {
    id: u32,
    params: Vec<Register>,
    outer_focus: Focus,
    switches_focus: bool,
}

#[derive(Debug, Clone)]
struct FunctionSlot {
    params: Vec<Register>,
    /// The body changes the focused region, so callers lose track of it
    switches_focus: bool,
}

/// Builds one command stream
#[derive(Debug, Clone)]
pub struct Generator {
    limits: Limits,
    words: Vec<u32>,
    commands: Vec<Command>,
    regions: Vec<Option<RegionSlot>>,
    focus: Focus,
    structs: Vec<Option<StructSlot>>,
    open_struct: Option<OpenStruct>,
    functions: Vec<Option<FunctionSlot>>,
    open_function: Option<OpenFunction>,
    blocks: Vec<Block>,
    rngs: Vec<bool>,
    distributions: Vec<bool>,
    ended: bool,
}

impl Generator {
    /// Create a generator with the given limits
    pub fn new(limits: Limits) -> Result<Self> {
        limits.validate().map_err(SpecError::from)?;
        Ok(Self::with_limits(limits))
    }

    fn with_limits(limits: Limits) -> Self {
        Self {
            limits,
            words: Vec::new(),
            commands: Vec::new(),
            regions: vec![None; limits.max_regions as usize],
            focus: Focus::None,
            structs: vec![None; limits.max_structs as usize],
            open_struct: None,
            functions: vec![None; limits.max_functions as usize],
            open_function: None,
            blocks: Vec::new(),
            rngs: vec![false; limits.max_rngs as usize],
            distributions: vec![false; limits.max_distributions as usize],
            ended: false,
        }
    }

    // ========================================================================
    // Output
    // ========================================================================

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Encoded stream so far
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        words_to_bytes(&self.words)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        words_to_bytes(&self.words)
    }

    /// Commands emitted so far, in stream order
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn is_finished(&self) -> bool {
        self.ended
    }

    /// Label given to a region at reservation
    pub fn region_label(&self, region: u32) -> Option<&str> {
        self.regions
            .get(region as usize)?
            .as_ref()?
            .label
            .as_deref()
    }

    // ========================================================================
    // Basic commands
    // ========================================================================

    pub fn comment(&mut self, text: &str) -> Result<()> {
        self.check_open(Opcode::Comment)?;
        self.emit(Command::Comment { text: text.to_string() })
    }

    /// Emit a command that stops execution with an error
    pub fn execute_break(&mut self) -> Result<()> {
        self.check_open(Opcode::Break)?;
        self.emit(Command::Break)
    }

    pub fn no_operation(&mut self) -> Result<()> {
        self.check_open(Opcode::Nop)?;
        self.emit(Command::Nop)
    }

    // ========================================================================
    // Regions
    // ========================================================================

    /// Reserve a region; a zero size or `empty` marks it as never written
    pub fn reserve_memory_region(&mut self, region: u32, size: u32, label: Option<&str>, empty: bool) -> Result<u32> {
        self.reserve(region, size, label, empty, None)
    }

    /// Reserve a region that other images may bind to through `reference`
    pub fn reserve_referenceable_memory_region(
        &mut self,
        region: u32,
        size: u32,
        label: Option<&str>,
        empty: bool,
        reference: u32,
    ) -> Result<u32> {
        self.reserve(region, size, label, empty, Some(reference))
    }

    fn reserve(&mut self, region: u32, size: u32, label: Option<&str>, empty: bool, reference: Option<u32>) -> Result<u32> {
        self.check_open(Opcode::Reserve)?;
        self.check_free_region(region)?;
        if size > self.limits.max_region_bytes {
            return Err(GeneratorError::RegionTooLarge {
                region,
                size,
                max: self.limits.max_region_bytes,
            });
        }
        if let Some(exported) = reference {
            if self.is_exported(exported) {
                return Err(GeneratorError::DuplicateReference(exported));
            }
        }

        self.emit(Command::Reserve {
            region,
            size,
            empty,
            reference,
        })?;
        self.regions[region as usize] = Some(RegionSlot {
            size,
            empty: empty || size == 0,
            kind: reference.map_or(RegionKind::Data, RegionKind::Referenceable),
            label: label.map(str::to_string),
            estimate: Some(0),
        });
        Ok(region)
    }

    /// Occupy `region` with a stand-in for a region another image exports
    /// as `reference`; the slot holds no data and cannot be focused
    pub fn reference_memory_region(&mut self, region: u32, reference: u32, label: Option<&str>) -> Result<u32> {
        self.check_open(Opcode::Reference)?;
        self.check_free_region(region)?;
        self.emit(Command::Reference { region, reference })?;
        self.regions[region as usize] = Some(RegionSlot {
            size: 0,
            empty: true,
            kind: RegionKind::Reference(reference),
            label: label.map(str::to_string),
            estimate: None,
        });
        Ok(region)
    }

    pub fn free_memory_region(&mut self, region: u32) -> Result<()> {
        self.check_open(Opcode::Free)?;
        self.check_region_id(region)?;
        if self.regions[region as usize].is_none() {
            return Err(GeneratorError::NotAllocated(region));
        }

        self.emit(Command::Free { region })?;
        self.regions[region as usize] = None;
        if self.focus == Focus::Region(region) {
            self.focus = Focus::None;
        }
        Ok(())
    }

    pub fn switch_write_focus(&mut self, region: u32) -> Result<()> {
        self.check_open(Opcode::SwitchFocus)?;
        self.check_writable_region(region)?;
        self.emit(Command::SwitchFocus {
            region: Operand::Immediate(region as i64),
        })?;
        self.focus = Focus::Region(region);
        self.note_focus_switch();
        Ok(())
    }

    /// Focus the region whose id is held in a register at execution time
    pub fn switch_write_focus_register(&mut self, region: Register) -> Result<()> {
        self.check_open(Opcode::SwitchFocus)?;
        self.check_register(region)?;
        self.emit(Command::SwitchFocus {
            region: Operand::Register(region),
        })?;
        self.focus = Focus::Dynamic;
        self.note_focus_switch();
        Ok(())
    }

    // ========================================================================
    // Random numbers
    // ========================================================================

    /// Declare a seeded generator and return its id
    pub fn declare_random_number_generator(&mut self, kind: RngKind, seed: u64) -> Result<u32> {
        self.check_open(Opcode::DeclareRng)?;
        let rng = free_slot(&self.rngs, "random number generator", self.limits.max_rngs)?;
        self.emit(Command::DeclareRng { rng, kind, seed })?;
        self.rngs[rng as usize] = true;
        Ok(rng)
    }

    /// Declare a uniform integer distribution over `[min, max]` and return its id
    pub fn declare_uniform_random_distribution(&mut self, rng: u32, min: i64, max: i64) -> Result<u32> {
        self.check_open(Opcode::DeclareRandomDist)?;
        if !self.rngs.get(rng as usize).copied().unwrap_or(false) {
            return Err(GeneratorError::UndeclaredRng(rng));
        }
        if min > max {
            return Err(GeneratorError::InvalidDistributionBounds { min, max });
        }
        let distribution = free_slot(&self.distributions, "random distribution", self.limits.max_distributions)?;

        self.emit(Command::DeclareRandomDist {
            distribution,
            rng,
            kind: DistributionKind::Uniform,
            min,
            max,
        })?;
        self.distributions[distribution as usize] = true;
        Ok(distribution)
    }

    /// Draw from a distribution into a register
    pub fn call_random_distribution(&mut self, distribution: u32, dest: Register) -> Result<()> {
        self.check_open(Opcode::GetRandomNumber)?;
        if !self.distributions.get(distribution as usize).copied().unwrap_or(false) {
            return Err(GeneratorError::UndeclaredDistribution(distribution));
        }
        self.check_register(dest)?;
        self.emit(Command::GetRandomNumber { distribution, dest })
    }

    // ========================================================================
    // Structures
    // ========================================================================

    /// Open a structure definition and return its id
    pub fn start_structure(&mut self) -> Result<u32> {
        if self.open_struct.is_some() {
            return Err(GeneratorError::NestedStructure);
        }
        self.check_open(Opcode::StartStruct)?;
        let id = self.free_structure_id()?;
        self.open_struct = Some(OpenStruct {
            id,
            elements: Vec::new(),
        });
        Ok(id)
    }

    /// Declare element `index` of the open structure
    pub fn structure_element(&mut self, index: u32, data_type: DataType, value: Option<Value>) -> Result<()> {
        if self.ended {
            return Err(GeneratorError::SpecificationEnded);
        }
        let max_elements = self.limits.max_struct_elements;
        let open = self.open_struct.as_mut().ok_or(GeneratorError::NoOpenStructure)?;
        if index >= max_elements {
            return Err(GeneratorError::ParameterOutOfBounds {
                what: "structure element",
                value: index as i64,
                max: max_elements,
            });
        }
        if matches!(open.elements.get(index as usize), Some(Some(_))) {
            return Err(GeneratorError::DuplicateElement {
                structure: open.id,
                index,
            });
        }
        let raw = match value {
            Some(v) => Some(data_type.raw_to_register(data_type.to_raw(v)?)),
            None => None,
        };

        if open.elements.len() <= index as usize {
            open.elements.resize(index as usize + 1, None);
        }
        open.elements[index as usize] = Some((data_type, raw));
        Ok(())
    }

    /// Close the open structure definition and emit it, elements in index order
    pub fn end_structure(&mut self) -> Result<u32> {
        if self.ended {
            return Err(GeneratorError::SpecificationEnded);
        }
        let open = self.open_struct.as_ref().ok_or(GeneratorError::NoOpenStructure)?;
        if open.elements.is_empty() {
            return Err(GeneratorError::EmptyStructure);
        }
        let id = open.id;
        let mut elements = Vec::with_capacity(open.elements.len());
        let mut commands = vec![Command::StartStruct { structure: id }];
        for (index, elem) in open.elements.iter().enumerate() {
            let Some((data_type, value)) = *elem else {
                return Err(GeneratorError::MissingElement {
                    structure: id,
                    index: index as u32,
                });
            };
            elements.push((data_type, value.is_some()));
            commands.push(Command::StructElem {
                index: index as u32,
                data_type,
                value,
            });
        }
        commands.push(Command::EndStruct);

        self.emit_all(commands)?;
        self.structs[id as usize] = Some(StructSlot { elements });
        self.open_struct = None;
        Ok(id)
    }

    /// Define a whole structure in one call and return its id
    pub fn define_structure(&mut self, elements: &[(DataType, Option<Value>)]) -> Result<u32> {
        self.start_structure()?;
        for (index, (data_type, value)) in elements.iter().enumerate() {
            if let Err(err) = self.structure_element(index as u32, *data_type, *value) {
                self.open_struct = None;
                return Err(err);
            }
        }
        self.end_structure().map_err(|err| {
            self.open_struct = None;
            err
        })
    }

    /// Set one element from an immediate value
    pub fn set_structure_value(
        &mut self,
        structure: u32,
        elem: u32,
        value: impl Into<Value>,
        data_type: DataType,
    ) -> Result<()> {
        self.check_open(Opcode::WriteParam)?;
        self.check_element_type(structure, elem, data_type)?;
        let raw = data_type.raw_to_register(data_type.to_raw(value.into())?);
        self.emit(Command::WriteParam {
            structure,
            elem,
            data_type,
            value: Operand::Immediate(raw),
        })?;
        self.mark_defined(structure, elem);
        Ok(())
    }

    /// Set one element from a register holding the raw value
    pub fn set_structure_value_register(
        &mut self,
        structure: u32,
        elem: u32,
        value: Register,
        data_type: DataType,
    ) -> Result<()> {
        self.check_open(Opcode::WriteParam)?;
        self.check_element_type(structure, elem, data_type)?;
        self.check_register(value)?;
        self.emit(Command::WriteParam {
            structure,
            elem,
            data_type,
            value: Operand::Register(value),
        })?;
        self.mark_defined(structure, elem);
        Ok(())
    }

    /// Load the raw value of one element into a register
    pub fn get_structure_value(&mut self, dest: Register, structure: u32, elem: u32) -> Result<()> {
        self.check_open(Opcode::ReadParam)?;
        self.check_element(structure, elem)?;
        self.check_register(dest)?;
        self.emit(Command::ReadParam { dest, structure, elem })
    }

    /// Duplicate a fully defined structure under a new id and return it
    pub fn copy_structure(&mut self, source: u32) -> Result<u32> {
        self.check_open(Opcode::CopyStruct)?;
        let slot = self.structure(source)?.clone();
        slot.check_defined(source)?;
        let dest = self.free_structure_id()?;
        self.emit(Command::CopyStruct { source, dest })?;
        self.structs[dest as usize] = Some(slot);
        Ok(dest)
    }

    /// Copy one element into another structure's element of the same type
    pub fn copy_structure_parameter(&mut self, source: u32, source_elem: u32, dest: u32, dest_elem: u32) -> Result<()> {
        self.check_open(Opcode::CopyParam)?;
        let (source_type, _) = self.check_element(source, source_elem)?;
        self.check_element_type(dest, dest_elem, source_type)?;
        self.emit(Command::CopyParam {
            source,
            source_elem,
            dest,
            dest_elem,
        })?;
        self.mark_defined(dest, dest_elem);
        Ok(())
    }

    /// Serialize a structure into the focused region
    pub fn write_structure(&mut self, structure: u32, repeats: impl Into<Operand>) -> Result<()> {
        self.check_open(Opcode::WriteStruct)?;
        let slot = self.structure(structure)?;
        slot.check_defined(structure)?;
        let size = slot.byte_size();
        let repeats = self.check_repeats(repeats.into())?;
        self.check_write(size, repeats)?;
        self.emit(Command::WriteStruct { structure, repeats })?;
        self.advance_estimate(size, repeats);
        Ok(())
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Write an immediate value, encoded through the type registry
    pub fn write_value(&mut self, value: impl Into<Value>, data_type: DataType, repeats: impl Into<Operand>) -> Result<()> {
        self.check_open(Opcode::Write)?;
        let raw = data_type.raw_to_register(data_type.to_raw(value.into())?);
        let repeats = self.check_repeats(repeats.into())?;
        self.check_write(data_type.size() as u64, repeats)?;
        self.emit(Command::Write {
            data_type,
            value: Operand::Immediate(raw),
            repeats,
        })?;
        self.advance_estimate(data_type.size() as u64, repeats);
        Ok(())
    }

    /// Write the raw value held in a register
    pub fn write_value_register(&mut self, value: Register, data_type: DataType, repeats: impl Into<Operand>) -> Result<()> {
        self.check_open(Opcode::Write)?;
        self.check_register(value)?;
        let repeats = self.check_repeats(repeats.into())?;
        self.check_write(data_type.size() as u64, repeats)?;
        self.emit(Command::Write {
            data_type,
            value: Operand::Register(value),
            repeats,
        })?;
        self.advance_estimate(data_type.size() as u64, repeats);
        Ok(())
    }

    /// Write a contiguous array of values, split over as many commands as
    /// the payload limit requires
    pub fn write_array<V: Into<Value> + Copy>(&mut self, values: &[V], data_type: DataType) -> Result<()> {
        self.check_open(Opcode::WriteArray)?;
        let data = data_type.encode_array(values)?;
        let len = data.len() as u64;
        self.check_write(len, Operand::Immediate(1))?;
        let chunk = array_chunk_bytes(data_type);
        let commands = if data.is_empty() {
            vec![Command::WriteArray { data_type, data }]
        } else {
            data.chunks(chunk)
                .map(|part| Command::WriteArray {
                    data_type,
                    data: part.to_vec(),
                })
                .collect()
        };
        self.emit_all(commands)?;
        self.advance_estimate(len, Operand::Immediate(1));
        Ok(())
    }

    // ========================================================================
    // Loops and conditionals
    // ========================================================================

    pub fn start_loop(
        &mut self,
        counter: Register,
        start: impl Into<Operand>,
        end: impl Into<Operand>,
        increment: impl Into<Operand>,
    ) -> Result<()> {
        self.check_open(Opcode::Loop)?;
        self.check_depth()?;
        let (start, end, increment) = (start.into(), end.into(), increment.into());
        self.check_register(counter)?;
        self.check_operands(&[start, end, increment])?;
        if increment == Operand::Immediate(0) {
            return Err(GeneratorError::InvalidLoopIncrement);
        }

        self.emit(Command::Loop {
            counter,
            start,
            end,
            increment,
        })?;
        self.blocks.push(Block::Loop);
        self.forget_estimates();
        Ok(())
    }

    pub fn break_loop(&mut self) -> Result<()> {
        self.check_open(Opcode::BreakLoop)?;
        if !self.blocks.contains(&Block::Loop) {
            return Err(GeneratorError::BreakOutsideLoop);
        }
        self.emit(Command::BreakLoop)
    }

    pub fn end_loop(&mut self) -> Result<()> {
        self.check_open(Opcode::EndLoop)?;
        match self.blocks.last() {
            Some(Block::Loop) => {}
            other => {
                return Err(GeneratorError::MismatchedBlock {
                    expected: Opcode::Loop,
                    found: other.map(|b| b.opcode()),
                })
            }
        }
        self.emit(Command::EndLoop)?;
        self.blocks.pop();
        Ok(())
    }

    /// Open a conditional executing when `lhs <condition> rhs`
    pub fn start_conditional(
        &mut self,
        lhs: impl Into<Operand>,
        condition: Condition,
        rhs: impl Into<Operand>,
    ) -> Result<()> {
        self.check_open(Opcode::If)?;
        self.check_depth()?;
        let (lhs, rhs) = (lhs.into(), rhs.into());
        self.check_operands(&[lhs, rhs])?;
        self.emit(Command::If { condition, lhs, rhs })?;
        self.blocks.push(Block::If { has_else: false });
        self.forget_estimates();
        Ok(())
    }

    pub fn else_conditional(&mut self) -> Result<()> {
        self.check_open(Opcode::Else)?;
        match self.blocks.last() {
            Some(Block::If { has_else: false }) => {}
            Some(Block::If { has_else: true }) => return Err(GeneratorError::DuplicateElse),
            other => {
                return Err(GeneratorError::MismatchedBlock {
                    expected: Opcode::If,
                    found: other.map(|b| b.opcode()),
                })
            }
        }
        self.emit(Command::Else)?;
        if let Some(block) = self.blocks.last_mut() {
            *block = Block::If { has_else: true };
        }
        Ok(())
    }

    pub fn end_conditional(&mut self) -> Result<()> {
        self.check_open(Opcode::EndIf)?;
        match self.blocks.last() {
            Some(Block::If { .. }) => {}
            other => {
                return Err(GeneratorError::MismatchedBlock {
                    expected: Opcode::If,
                    found: other.map(|b| b.opcode()),
                })
            }
        }
        self.emit(Command::EndIf)?;
        self.blocks.pop();
        Ok(())
    }

    // ========================================================================
    // Functions
    // ========================================================================

    /// Open a function whose arguments bind to `params`; returns its id
    pub fn start_function(&mut self, params: &[Register]) -> Result<u32> {
        self.check_open(Opcode::StartFunction)?;
        if self.open_function.is_some() {
            return Err(GeneratorError::NestedFunction);
        }
        if !self.blocks.is_empty() {
            return Err(GeneratorError::FunctionInBlock);
        }
        if params.len() > self.limits.max_function_args as usize {
            return Err(GeneratorError::ParameterOutOfBounds {
                what: "function parameter count",
                value: params.len() as i64,
                max: self.limits.max_function_args,
            });
        }
        for (i, reg) in params.iter().enumerate() {
            self.check_register(*reg)?;
            if params[..i].contains(reg) {
                return Err(GeneratorError::DuplicateParameter(*reg));
            }
        }
        let id = self
            .functions
            .iter()
            .position(Option::is_none)
            .ok_or(GeneratorError::ParameterOutOfBounds {
                what: "function",
                value: self.limits.max_functions as i64,
                max: self.limits.max_functions,
            })? as u32;

        self.emit(Command::StartFunction {
            function: id,
            params: params.to_vec(),
        })?;
        self.open_function = Some(OpenFunction {
            id,
            params: params.to_vec(),
            outer_focus: self.focus,
            switches_focus: false,
        });
        self.focus = Focus::Dynamic;
        Ok(id)
    }

    pub fn end_function(&mut self) -> Result<u32> {
        self.check_open(Opcode::EndFunction)?;
        if self.open_function.is_none() {
            return Err(GeneratorError::NoOpenFunction);
        }
        if let Some(block) = self.blocks.last() {
            return Err(GeneratorError::Unclosed(block.opcode()));
        }
        self.emit(Command::EndFunction)?;

        let Some(open) = self.open_function.take() else {
            return Err(GeneratorError::NoOpenFunction);
        };
        self.functions[open.id as usize] = Some(FunctionSlot {
            params: open.params,
            switches_focus: open.switches_focus,
        });
        self.focus = open.outer_focus;
        Ok(open.id)
    }

    /// Call a defined function with positional arguments
    pub fn call_function(&mut self, function: u32, args: &[Operand]) -> Result<()> {
        self.check_open(Opcode::Call)?;
        if self.open_function.is_some() {
            return Err(GeneratorError::NestedCall(function));
        }
        let slot = self
            .functions
            .get(function as usize)
            .and_then(Option::as_ref)
            .ok_or(GeneratorError::UndeclaredFunction(function))?;
        if slot.params.len() != args.len() {
            return Err(GeneratorError::WrongParameterNumber {
                function,
                expected: slot.params.len(),
                found: args.len(),
            });
        }
        let switches_focus = slot.switches_focus;
        self.check_operands(args)?;

        self.emit(Command::Call {
            function,
            args: args.to_vec(),
        })?;
        if switches_focus {
            self.focus = Focus::Dynamic;
        }
        self.forget_estimates();
        Ok(())
    }

    // ========================================================================
    // Registers and write pointer
    // ========================================================================

    /// `dest = src`
    pub fn set_register_value(&mut self, dest: Register, src: impl Into<Operand>) -> Result<()> {
        self.check_open(Opcode::Mv)?;
        let src = src.into();
        self.check_register(dest)?;
        self.check_operands(&[src])?;
        self.emit(Command::Mv { dest, src })
    }

    pub fn get_write_pointer(&mut self, dest: Register) -> Result<()> {
        self.check_open(Opcode::GetWrPtr)?;
        self.check_focus()?;
        self.check_register(dest)?;
        self.emit(Command::GetWrPtr { dest })
    }

    /// Move the focused region's write pointer, absolutely or relative to itself
    pub fn set_write_pointer(&mut self, address: impl Into<Operand>, relative: bool) -> Result<()> {
        self.check_open(Opcode::SetWrPtr)?;
        let address = address.into();
        self.check_focus()?;
        self.check_operands(&[address])?;

        let target = match (self.static_region(), address) {
            (Some(slot), Operand::Immediate(v)) => {
                let base = if relative { slot.estimate.map(|e| e as i64) } else { Some(0) };
                match base {
                    Some(base) => {
                        let target = base.checked_add(v).unwrap_or(-1);
                        if target < 0 || target > slot.size as i64 {
                            return Err(GeneratorError::ParameterOutOfBounds {
                                what: "write pointer",
                                value: target,
                                max: slot.size,
                            });
                        }
                        Some(target as u64)
                    }
                    None => None,
                }
            }
            _ => None,
        };

        self.emit(Command::SetWrPtr { address, relative })?;
        if let Some(slot) = self.focused_slot_mut() {
            slot.estimate = target;
        }
        Ok(())
    }

    /// Round the write pointer up to a power-of-two boundary, zero-filling
    pub fn align_write_pointer(&mut self, boundary: impl Into<Operand>) -> Result<()> {
        self.check_open(Opcode::AlignWrPtr)?;
        let boundary = boundary.into();
        self.check_focus()?;
        self.check_operands(&[boundary])?;
        if let Operand::Immediate(b) = boundary {
            if b <= 0 || (b as u64).count_ones() != 1 {
                return Err(GeneratorError::InvalidAlignment(b));
            }
        }

        let mut aligned = None;
        if let (Focus::Region(region), Some(slot), Operand::Immediate(b)) = (self.focus, self.static_region(), boundary) {
            if let Some(estimate) = slot.estimate {
                let target = estimate.div_ceil(b as u64) * b as u64;
                if target > slot.size as u64 {
                    return Err(GeneratorError::RegionExhausted {
                        region,
                        capacity: slot.size,
                        required: target,
                    });
                }
                aligned = Some(target);
            }
        }

        self.emit(Command::AlignWrPtr { boundary })?;
        if let Some(slot) = self.focused_slot_mut() {
            slot.estimate = aligned;
        }
        Ok(())
    }

    /// Store the write pointer of `region` (focused or not) into `dest`
    pub fn save_write_pointer(&mut self, region: impl Into<Operand>, dest: Register) -> Result<()> {
        self.check_open(Opcode::SaveWrPtr)?;
        let region = region.into();
        match region {
            Operand::Immediate(r) => {
                let r = u32::try_from(r).map_err(|_| GeneratorError::ParameterOutOfBounds {
                    what: "region",
                    value: r,
                    max: self.limits.max_regions,
                })?;
                self.check_region_id(r)?;
                match &self.regions[r as usize] {
                    None => return Err(GeneratorError::NotAllocated(r)),
                    Some(slot) if matches!(slot.kind, RegionKind::Reference(_)) => {
                        return Err(GeneratorError::ReferenceRegion(r))
                    }
                    Some(_) => {}
                }
            }
            Operand::Register(reg) => self.check_register(reg)?,
        }
        self.check_register(dest)?;
        self.emit(Command::SaveWrPtr { region, dest })
    }

    pub fn arithmetic_operation(
        &mut self,
        operation: ArithmeticOperation,
        dest: Register,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> Result<()> {
        self.check_open(Opcode::ArithOp)?;
        let (lhs, rhs) = (lhs.into(), rhs.into());
        self.check_register(dest)?;
        self.check_operands(&[lhs, rhs])?;
        self.emit(Command::ArithOp {
            operation,
            dest,
            lhs,
            rhs,
        })
    }

    pub fn logic_operation(
        &mut self,
        operation: LogicOperation,
        dest: Register,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> Result<()> {
        self.check_open(Opcode::LogicOp)?;
        let (lhs, rhs) = (lhs.into(), rhs.into());
        self.check_register(dest)?;
        self.check_operands(&[lhs, rhs])?;
        self.emit(Command::LogicOp {
            operation,
            dest,
            lhs,
            rhs,
        })
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    pub fn print_value(&mut self, value: impl Into<Operand>) -> Result<()> {
        self.check_open(Opcode::PrintVal)?;
        let value = value.into();
        self.check_operands(&[value])?;
        self.emit(Command::PrintVal { value })
    }

    pub fn print_text(&mut self, text: &str) -> Result<()> {
        self.check_open(Opcode::PrintText)?;
        if text.len() > MAX_PRINT_TEXT {
            return Err(GeneratorError::TextTooLong {
                len: text.len(),
                max: MAX_PRINT_TEXT,
            });
        }
        self.emit(Command::PrintText { text: text.to_string() })
    }

    pub fn print_structure(&mut self, structure: impl Into<Operand>) -> Result<()> {
        self.check_open(Opcode::PrintStruct)?;
        let structure = structure.into();
        match structure {
            Operand::Immediate(id) => {
                let id = u32::try_from(id).map_err(|_| GeneratorError::UndeclaredStructure(u32::MAX))?;
                self.structure(id)?;
            }
            Operand::Register(reg) => self.check_register(reg)?,
        }
        self.emit(Command::PrintStruct { structure })
    }

    // ========================================================================
    // End
    // ========================================================================

    /// Close the specification; no further commands are accepted
    pub fn end_specification(&mut self) -> Result<()> {
        self.check_open(Opcode::EndSpec)?;
        if self.open_function.is_some() {
            return Err(GeneratorError::Unclosed(Opcode::StartFunction));
        }
        if let Some(block) = self.blocks.last() {
            return Err(GeneratorError::Unclosed(block.opcode()));
        }
        self.emit(Command::EndSpec)?;
        self.ended = true;
        Ok(())
    }

    // ========================================================================
    // Emission
    // ========================================================================

    fn emit(&mut self, command: Command) -> Result<()> {
        self.emit_all(vec![command])
    }

    /// Encode every command before appending any of them
    fn emit_all(&mut self, commands: Vec<Command>) -> Result<()> {
        let mut encoded = Vec::with_capacity(commands.len());
        for command in &commands {
            encoded.push(encode(command)?);
        }
        for (command, words) in commands.into_iter().zip(encoded) {
            debug!(opcode = %command.opcode(), words = words.len(), "emit");
            self.words.extend(words);
            self.commands.push(command);
        }
        Ok(())
    }

    // ========================================================================
    // Validation helpers
    // ========================================================================

    /// Reject calls after the end, or while a structure definition is open
    fn check_open(&self, opcode: Opcode) -> Result<()> {
        if self.ended {
            return Err(GeneratorError::SpecificationEnded);
        }
        if self.open_struct.is_some() {
            return Err(GeneratorError::StructureOpen(opcode));
        }
        Ok(())
    }

    fn check_register(&self, register: Register) -> Result<()> {
        if register.index() >= self.limits.max_registers as usize {
            return Err(GeneratorError::InvalidRegister {
                register,
                max: self.limits.max_registers,
            });
        }
        Ok(())
    }

    fn check_operands(&self, operands: &[Operand]) -> Result<()> {
        for operand in operands {
            if let Operand::Register(reg) = operand {
                self.check_register(*reg)?;
            }
        }
        Ok(())
    }

    fn check_region_id(&self, region: u32) -> Result<()> {
        if region >= self.limits.max_regions {
            return Err(GeneratorError::ParameterOutOfBounds {
                what: "region",
                value: region as i64,
                max: self.limits.max_regions,
            });
        }
        Ok(())
    }

    fn check_free_region(&self, region: u32) -> Result<()> {
        self.check_region_id(region)?;
        if self.regions[region as usize].is_some() {
            return Err(GeneratorError::RegionInUse(region));
        }
        Ok(())
    }

    fn check_writable_region(&self, region: u32) -> Result<()> {
        self.check_region_id(region)?;
        match &self.regions[region as usize] {
            None => Err(GeneratorError::NotAllocated(region)),
            Some(slot) if matches!(slot.kind, RegionKind::Reference(_)) => Err(GeneratorError::ReferenceRegion(region)),
            Some(slot) if slot.empty => Err(GeneratorError::RegionUnfilled(region)),
            Some(_) => Ok(()),
        }
    }

    fn is_exported(&self, reference: u32) -> bool {
        self.regions
            .iter()
            .flatten()
            .any(|slot| slot.kind == RegionKind::Referenceable(reference))
    }

    /// Record that the open function body, if any, moves the focus
    fn note_focus_switch(&mut self) {
        if let Some(open) = self.open_function.as_mut() {
            open.switches_focus = true;
        }
    }

    fn check_focus(&self) -> Result<()> {
        match self.focus {
            Focus::None => Err(GeneratorError::NoRegionSelected),
            Focus::Region(_) | Focus::Dynamic => Ok(()),
        }
    }

    fn check_depth(&self) -> Result<()> {
        if self.blocks.len() >= self.limits.max_nesting_depth as usize {
            return Err(GeneratorError::NestingTooDeep(self.limits.max_nesting_depth));
        }
        Ok(())
    }

    fn check_repeats(&self, repeats: Operand) -> Result<Operand> {
        match repeats {
            Operand::Immediate(n) if n < 1 => Err(GeneratorError::InvalidRepeats(n)),
            Operand::Register(reg) => {
                self.check_register(reg)?;
                Ok(repeats)
            }
            _ => Ok(repeats),
        }
    }

    /// Check a write of `size * repeats` bytes against the focused region
    fn check_write(&self, size: u64, repeats: Operand) -> Result<()> {
        self.check_focus()?;
        if let (Focus::Region(region), Some(slot), Operand::Immediate(n)) = (self.focus, self.static_region(), repeats) {
            if let Some(estimate) = slot.estimate {
                let required = estimate.saturating_add(size.saturating_mul(n as u64));
                if required > slot.size as u64 {
                    return Err(GeneratorError::RegionExhausted {
                        region,
                        capacity: slot.size,
                        required,
                    });
                }
            }
        }
        Ok(())
    }

    fn advance_estimate(&mut self, size: u64, repeats: Operand) {
        let in_static_context = self.is_static_context();
        if let Some(slot) = self.focused_slot_mut() {
            slot.estimate = match (slot.estimate, repeats) {
                (Some(e), Operand::Immediate(n)) if in_static_context => Some(e + size * n as u64),
                _ => None,
            };
        }
    }

    fn forget_estimates(&mut self) {
        for slot in self.regions.iter_mut().flatten() {
            slot.estimate = None;
        }
    }

    fn is_static_context(&self) -> bool {
        self.blocks.is_empty() && self.open_function.is_none()
    }

    /// The focused region, when it is known statically and outside any block
    fn static_region(&self) -> Option<&RegionSlot> {
        match self.focus {
            Focus::Region(region) if self.is_static_context() => self.regions.get(region as usize)?.as_ref(),
            _ => None,
        }
    }

    fn focused_slot_mut(&mut self) -> Option<&mut RegionSlot> {
        match self.focus {
            Focus::Region(region) => self.regions.get_mut(region as usize)?.as_mut(),
            _ => None,
        }
    }

    fn free_structure_id(&self) -> Result<u32> {
        self.structs
            .iter()
            .position(Option::is_none)
            .map(|id| id as u32)
            .ok_or(GeneratorError::ParameterOutOfBounds {
                what: "structure",
                value: self.limits.max_structs as i64,
                max: self.limits.max_structs,
            })
    }

    fn structure(&self, structure: u32) -> Result<&StructSlot> {
        self.structs
            .get(structure as usize)
            .and_then(Option::as_ref)
            .ok_or(GeneratorError::UndeclaredStructure(structure))
    }

    fn check_element(&self, structure: u32, elem: u32) -> Result<(DataType, bool)> {
        let slot = self.structure(structure)?;
        slot.elements
            .get(elem as usize)
            .copied()
            .ok_or(GeneratorError::ParameterOutOfBounds {
                what: "structure element",
                value: elem as i64,
                max: slot.elements.len() as u32,
            })
    }

    fn check_element_type(&self, structure: u32, elem: u32, data_type: DataType) -> Result<()> {
        let (expected, _) = self.check_element(structure, elem)?;
        if expected != data_type {
            return Err(GeneratorError::TypeMismatch {
                structure,
                elem,
                expected,
                found: data_type,
            });
        }
        Ok(())
    }

    fn mark_defined(&mut self, structure: u32, elem: u32) {
        if let Some(Some(slot)) = self.structs.get_mut(structure as usize) {
            if let Some(e) = slot.elements.get_mut(elem as usize) {
                e.1 = true;
            }
        }
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::with_limits(Limits::DEFAULT)
    }
}

/// Largest whole-element byte count one WriteArray payload can carry
fn array_chunk_bytes(data_type: DataType) -> usize {
    // Payload: type id word, byte length word, then the packed bytes
    let max_bytes = (MAX_PAYLOAD_WORDS - 2) * WORD_SIZE;
    max_bytes - max_bytes % data_type.size()
}

fn free_slot(slots: &[bool], what: &'static str, max: u32) -> Result<u32> {
    slots
        .iter()
        .position(|used| !used)
        .map(|id| id as u32)
        .ok_or(GeneratorError::ParameterOutOfBounds {
            what,
            value: max as i64,
            max,
        })
}
