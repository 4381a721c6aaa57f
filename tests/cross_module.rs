//! Cross-module interaction tests
//!
//! Tests the integration between generator, decoder, listing and executor.

use dataspec_disassembler::{count_diagnostics, decode_all, disassemble, format};
use dataspec_generator::{encode, Generator};
use dataspec_runtime::{Executor, ExecutorConfig, RuntimeError};
use dataspec_spec::{
    dispatch, Command, Condition, DataType, ExecutorFunctions, Flow, Opcode, Operand, Register, SpecError, Value,
};

fn sample() -> Generator {
    let mut gen = Generator::default();
    gen.reserve_memory_region(0, 32, Some("table"), false).unwrap();
    gen.switch_write_focus(0).unwrap();
    let s = gen
        .define_structure(&[(DataType::Uint16, Some(Value::Integer(1))), (DataType::S1615, None)])
        .unwrap();
    gen.start_loop(Register::R0, 0, 3, 1).unwrap();
    gen.set_structure_value_register(s, 0, Register::R0, DataType::Uint16).unwrap();
    gen.start_conditional(Register::R0, Condition::Equal, 1).unwrap();
    gen.set_structure_value(s, 1, -0.5, DataType::S1615).unwrap();
    gen.else_conditional().unwrap();
    gen.set_structure_value(s, 1, 2.0, DataType::S1615).unwrap();
    gen.end_conditional().unwrap();
    gen.write_structure(s, 1).unwrap();
    gen.end_loop().unwrap();
    gen.print_value(Register::R0).unwrap();
    gen.end_specification().unwrap();
    gen
}

// ============================================================================
// Generator -> Decoder
// ============================================================================

#[test]
fn test_decoder_sees_generated_commands() {
    let gen = sample();
    let decoded = decode_all(&gen.to_bytes()).unwrap();
    assert_eq!(decoded.len(), gen.command_count());
    for ((offset, command), expected) in decoded.iter().zip(gen.commands()) {
        assert_eq!(command, expected, "command at offset {offset:#x}");
    }
}

#[test]
fn test_offsets_follow_encoded_sizes() {
    let gen = sample();
    let decoded = decode_all(&gen.to_bytes()).unwrap();
    let mut expected = 0;
    for ((offset, _), command) in decoded.iter().zip(gen.commands()) {
        assert_eq!(*offset, expected);
        expected += encode(command).unwrap().len() * 4;
    }
    assert_eq!(expected, gen.to_bytes().len());
}

// ============================================================================
// Generator -> Listing
// ============================================================================

#[test]
fn test_listing_covers_every_command() {
    let gen = sample();
    let listing = disassemble(&gen.to_bytes()).unwrap();
    for command in gen.commands() {
        assert!(
            listing.contains(&format(command)),
            "missing {:?} in\n{}",
            command,
            listing
        );
    }
    let decoded = decode_all(&gen.to_bytes()).unwrap();
    assert_eq!(count_diagnostics(&decoded), 1);
}

// ============================================================================
// Generator -> Executor
// ============================================================================

#[test]
fn test_sample_executes() {
    let gen = sample();
    let result = Executor::new(gen.to_bytes(), ExecutorConfig::default())
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(result.diagnostics, vec!["2"]);

    let image = result.image.unwrap();
    let data = image.region_data(0).unwrap();
    let record = |i: usize| {
        let bytes = &data[i * 6..(i + 1) * 6];
        (
            DataType::Uint16.decode(&bytes[..2]).unwrap(),
            DataType::S1615.decode(&bytes[2..]).unwrap(),
        )
    };
    assert_eq!(record(0), (Value::Integer(0), Value::Real(2.0)));
    assert_eq!(record(1), (Value::Integer(1), Value::Real(-0.5)));
    assert_eq!(record(2), (Value::Integer(2), Value::Real(2.0)));
}

/// Counts commands by opcode and leaves execution to the defaults
#[derive(Default)]
struct Census {
    writes: usize,
    conditionals: usize,
}

impl ExecutorFunctions for Census {
    type Error = SpecError;

    fn execute_reserve(
        &mut self,
        _region: u32,
        _size: u32,
        _empty: bool,
        _reference: Option<u32>,
    ) -> Result<Flow, SpecError> {
        Ok(Flow::Continue)
    }

    fn execute_write_struct(&mut self, _structure: u32, _repeats: Operand) -> Result<Flow, SpecError> {
        self.writes += 1;
        Ok(Flow::Continue)
    }

    fn execute_if(&mut self, _condition: Condition, _lhs: Operand, _rhs: Operand) -> Result<Flow, SpecError> {
        self.conditionals += 1;
        Ok(Flow::Continue)
    }
}

#[test]
fn test_alternative_backend() {
    let gen = sample();
    let mut census = Census::default();
    let mut unimplemented = Vec::new();
    for command in gen.commands() {
        match dispatch(&mut census, command) {
            Ok(_) => {}
            Err(SpecError::Unimplemented(opcode)) => unimplemented.push(opcode),
            Err(other) => panic!("unexpected error {other}"),
        }
    }
    assert_eq!(census.writes, 1);
    assert_eq!(census.conditionals, 1);
    assert!(unimplemented.contains(&Opcode::Loop));
    assert!(!unimplemented.contains(&Opcode::PrintVal));
}

#[test]
fn test_truncated_stream_fails_to_execute() {
    let bytes = sample().into_bytes();
    let cut = bytes[..bytes.len() - 2].to_vec();
    let err = Executor::new(cut, ExecutorConfig::default())
        .unwrap()
        .run()
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Decode(_)));
    assert!(err.is_control());
}

#[test]
fn test_hand_built_command_matches_generator() {
    let mut gen = Generator::default();
    gen.set_register_value(Register::R3, -9).unwrap();
    let expected = Command::Mv {
        dest: Register::R3,
        src: Operand::Immediate(-9),
    };
    assert_eq!(gen.words(), &encode(&expected).unwrap()[..]);
}
