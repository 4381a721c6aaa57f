//! End-to-end tests for the data specification toolchain
//!
//! These tests verify the complete workflow:
//! 1. Build a command stream with the generator
//! 2. Execute it
//! 3. Check the finished image: header, pointer table and payload

use dataspec_generator::Generator;
use dataspec_runtime::{run, Executor, ExecutorConfig, HaltReason, RuntimeError};
use dataspec_spec::{
    ArithmeticOperation, Condition, DataImage, DataType, ImageHeader, LogicOperation, Operand, PointerTableEntry,
    RegionKind, Register, RngKind, Value, MAGIC,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Image layout
// ============================================================================

#[test]
fn test_single_value_image() {
    init_tracing();
    let mut gen = Generator::default();
    gen.reserve_memory_region(0, 16, Some("params"), false).unwrap();
    gen.switch_write_focus(0).unwrap();
    gen.write_value(42u32, DataType::Uint32, 1).unwrap();
    gen.end_specification().unwrap();

    let image = run(&gen.to_bytes()).unwrap();
    assert_eq!(image.entries.len(), 1);
    let entry = image.entries[0];
    assert_eq!(entry.offset, 0);
    assert_eq!(entry.size, 16);

    let bytes = image.to_bytes();
    assert_eq!(&bytes[..4], &MAGIC.to_le_bytes());
    let start = image.absolute_offset(&entry);
    assert_eq!(start, ImageHeader::SIZE + PointerTableEntry::SIZE);
    assert_eq!(DataType::Uint32.decode(&bytes[start..start + 4]).unwrap(), Value::Integer(42));
    assert!(bytes[start + 4..start + 16].iter().all(|b| *b == 0));
}

#[test]
fn test_image_survives_serialization() {
    let mut gen = Generator::default();
    gen.reserve_memory_region(2, 8, None, false).unwrap();
    gen.reserve_memory_region(0, 4, None, false).unwrap();
    gen.reserve_memory_region(1, 4, None, true).unwrap();
    gen.switch_write_focus(2).unwrap();
    gen.write_array(&[-1.5f64, 0.25], DataType::S87).unwrap();
    gen.switch_write_focus(0).unwrap();
    gen.write_value(7u8, DataType::Uint8, 4).unwrap();
    gen.end_specification().unwrap();

    let image = run(&gen.to_bytes()).unwrap();
    let regions: Vec<u32> = image.entries.iter().map(|e| e.region).collect();
    assert_eq!(regions, vec![0, 2]);

    let parsed = DataImage::from_bytes(&image.to_bytes()).unwrap();
    assert_eq!(parsed.region_data(0).unwrap(), &[7, 7, 7, 7]);
    assert_eq!(
        DataType::S87.decode_array(&parsed.region_data(2).unwrap()[..4]).unwrap(),
        vec![Value::Real(-1.5), Value::Real(0.25)]
    );
    assert_eq!(parsed.digest(), image.digest());
}

#[test]
fn test_region_references_reach_the_image() {
    init_tracing();
    let mut gen = Generator::default();
    gen.reserve_referenceable_memory_region(0, 8, Some("shared"), false, 3).unwrap();
    gen.reserve_referenceable_memory_region(1, 4, None, true, 4).unwrap();
    gen.reference_memory_region(2, 9, Some("borrowed")).unwrap();
    gen.switch_write_focus(0).unwrap();
    gen.write_value(0xABu32, DataType::Uint32, 2).unwrap();
    gen.end_specification().unwrap();

    let result = Executor::new(gen.to_bytes(), ExecutorConfig::default().with_full_coverage())
        .unwrap()
        .run()
        .unwrap();
    assert!(result.is_clean());
    assert_eq!(result.referenceable_regions, vec![(0, 3), (1, 4)]);
    assert_eq!(result.references_to_fill, vec![(2, 9)]);
    assert!(result.unwritten_regions.is_empty());

    let image = result.image.unwrap();
    assert_eq!(image.entries.len(), 3);
    assert!(image.entries[2].is_reference());
    assert_eq!(image.region_data(2), None);
    assert_eq!(&image.region_data(0).unwrap()[..4], &[0xAB, 0, 0, 0]);

    let parsed = DataImage::from_bytes(&image.to_bytes()).unwrap();
    assert_eq!(parsed.referenceable_regions(), vec![(0, 3), (1, 4)]);
    assert_eq!(parsed.references_to_fill(), vec![(2, 9)]);
    assert_eq!(parsed.entry(2).map(|e| e.kind), Some(RegionKind::Reference(9)));
    assert_eq!(parsed.digest(), image.digest());
}

#[test]
fn test_float_values_written_as_ieee754() {
    let mut gen = Generator::default();
    gen.reserve_memory_region(0, 16, None, false).unwrap();
    gen.switch_write_focus(0).unwrap();
    gen.write_value(-1.25f64, DataType::Float64, 1).unwrap();
    gen.write_array(&[0.5f32, 3.0], DataType::Float32).unwrap();
    gen.end_specification().unwrap();

    let image = run(&gen.to_bytes()).unwrap();
    let data = image.region_data(0).unwrap();
    assert_eq!(&data[..8], &(-1.25f64).to_le_bytes());
    assert_eq!(
        DataType::Float32.decode_array(&data[8..]).unwrap(),
        vec![Value::Real(0.5), Value::Real(3.0)]
    );
}

#[test]
fn test_oversized_array_is_written_whole() {
    let mut gen = Generator::default();
    gen.reserve_memory_region(0, 300_000, None, false).unwrap();
    gen.switch_write_focus(0).unwrap();
    let values: Vec<u32> = (0..70_000).collect();
    gen.write_array(&values, DataType::Uint32).unwrap();
    gen.end_specification().unwrap();

    let image = run(&gen.to_bytes()).unwrap();
    let data = image.region_data(0).unwrap();
    let written = DataType::Uint32.decode_array(&data[..280_000]).unwrap();
    assert_eq!(written.len(), 70_000);
    assert_eq!(written[65_533], Value::Integer(65_533));
    assert_eq!(written[69_999], Value::Integer(69_999));
}

#[test]
fn test_corrupted_image_rejected() {
    let mut gen = Generator::default();
    gen.reserve_memory_region(0, 4, None, false).unwrap();
    gen.switch_write_focus(0).unwrap();
    gen.write_value(1u32, DataType::Uint32, 1).unwrap();
    gen.end_specification().unwrap();

    let mut bytes = run(&gen.to_bytes()).unwrap().to_bytes();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x10;
    assert!(DataImage::from_bytes(&bytes).is_err());
}

// ============================================================================
// Control flow
// ============================================================================

#[test]
fn test_loop_fills_table() {
    let mut gen = Generator::default();
    gen.reserve_memory_region(0, 20, None, false).unwrap();
    gen.switch_write_focus(0).unwrap();
    gen.start_loop(Register::R0, 0, 5, 1).unwrap();
    gen.arithmetic_operation(ArithmeticOperation::Multiply, Register::R1, Register::R0, Register::R0)
        .unwrap();
    gen.write_value_register(Register::R1, DataType::Uint32, 1).unwrap();
    gen.end_loop().unwrap();
    gen.end_specification().unwrap();

    let image = run(&gen.to_bytes()).unwrap();
    let squares = DataType::Uint32.decode_array(image.region_data(0).unwrap()).unwrap();
    let expected: Vec<Value> = [0, 1, 4, 9, 16].into_iter().map(Value::Integer).collect();
    assert_eq!(squares, expected);
}

#[test]
fn test_break_stops_writes() {
    let mut gen = Generator::default();
    gen.reserve_memory_region(0, 5, None, false).unwrap();
    gen.switch_write_focus(0).unwrap();
    gen.start_loop(Register::R0, 0, 5, 1).unwrap();
    gen.write_value_register(Register::R0, DataType::Uint8, 1).unwrap();
    gen.start_conditional(Register::R0, Condition::GreaterThanOrEqual, 2).unwrap();
    gen.break_loop().unwrap();
    gen.end_conditional().unwrap();
    gen.end_loop().unwrap();
    gen.write_value(0xEEu8, DataType::Uint8, 1).unwrap();
    gen.end_specification().unwrap();

    let image = run(&gen.to_bytes()).unwrap();
    assert_eq!(image.region_data(0).unwrap(), &[0, 1, 2, 0xEE, 0]);
}

#[test]
fn test_conditional_else_branch() {
    let mut gen = Generator::default();
    gen.reserve_memory_region(0, 2, None, false).unwrap();
    gen.switch_write_focus(0).unwrap();
    gen.logic_operation(LogicOperation::LeftShift, Register::R2, 1, 4).unwrap();
    gen.start_conditional(Register::R2, Condition::Equal, 16).unwrap();
    gen.write_value(1u8, DataType::Uint8, 1).unwrap();
    gen.else_conditional().unwrap();
    gen.write_value(2u8, DataType::Uint8, 1).unwrap();
    gen.end_conditional().unwrap();
    gen.start_conditional(Register::R2, Condition::GreaterThan, 16).unwrap();
    gen.write_value(3u8, DataType::Uint8, 1).unwrap();
    gen.else_conditional().unwrap();
    gen.write_value(4u8, DataType::Uint8, 1).unwrap();
    gen.end_conditional().unwrap();
    gen.end_specification().unwrap();

    let image = run(&gen.to_bytes()).unwrap();
    assert_eq!(image.region_data(0).unwrap(), &[1, 4]);
}

#[test]
fn test_function_writes_records() {
    let mut gen = Generator::default();
    gen.reserve_memory_region(0, 12, None, false).unwrap();
    gen.switch_write_focus(0).unwrap();
    let record = gen.start_function(&[Register::R8, Register::R9]).unwrap();
    gen.write_value_register(Register::R8, DataType::Uint16, 1).unwrap();
    gen.write_value_register(Register::R9, DataType::Int16, 1).unwrap();
    gen.end_function().unwrap();
    for (key, value) in [(1, -1), (2, -2), (3, 300)] {
        gen.call_function(record, &[Operand::Immediate(key), Operand::Immediate(value)])
            .unwrap();
    }
    gen.end_specification().unwrap();

    let image = run(&gen.to_bytes()).unwrap();
    let data = image.region_data(0).unwrap();
    assert_eq!(&data[..4], &[1, 0, 0xFF, 0xFF]);
    assert_eq!(&data[8..], &[3, 0, 0x2C, 0x01]);
}

// ============================================================================
// Random numbers
// ============================================================================

#[test]
fn test_seeded_random_is_reproducible() {
    let build = |seed| {
        let mut gen = Generator::default();
        gen.reserve_memory_region(0, 16, None, false).unwrap();
        gen.switch_write_focus(0).unwrap();
        let rng = gen.declare_random_number_generator(RngKind::Seeded, seed).unwrap();
        let dist = gen.declare_uniform_random_distribution(rng, 0, 200).unwrap();
        gen.start_loop(Register::R0, 0, 16, 1).unwrap();
        gen.call_random_distribution(dist, Register::R1).unwrap();
        gen.write_value_register(Register::R1, DataType::Uint8, 1).unwrap();
        gen.end_loop().unwrap();
        gen.end_specification().unwrap();
        gen.into_bytes()
    };

    let first = run(&build(7)).unwrap();
    let second = run(&build(7)).unwrap();
    assert_eq!(first.payload, second.payload);
    assert!(first.payload.iter().all(|b| *b <= 200));
}

// ============================================================================
// Failure modes
// ============================================================================

#[test]
fn test_missing_end_is_abnormal() {
    let mut gen = Generator::default();
    gen.reserve_memory_region(0, 4, None, false).unwrap();
    gen.switch_write_focus(0).unwrap();
    gen.write_value(1u32, DataType::Uint32, 1).unwrap();

    let err = run(&gen.to_bytes()).unwrap_err();
    assert!(matches!(err, RuntimeError::AbnormalTermination(HaltReason::EndOfStream)));
}

#[test]
fn test_failed_run_keeps_partial_state() {
    let mut gen = Generator::default();
    gen.reserve_memory_region(0, 4, None, false).unwrap();
    gen.switch_write_focus(0).unwrap();
    gen.set_register_value(Register::R0, 3).unwrap();
    gen.write_value(0x11u8, DataType::Uint8, Register::R0).unwrap();
    gen.write_value(0x22u16, DataType::Uint16, 1).unwrap();
    gen.end_specification().unwrap();

    let mut executor = Executor::new(gen.to_bytes(), ExecutorConfig::default()).unwrap();
    let err = executor.run().unwrap_err();
    assert!(err.is_resource());
    assert_eq!(executor.regions().get(0).unwrap().data(), &[0x11, 0x11, 0x11, 0]);
    assert!(executor.state().halt_reason.is_none());
}

#[test]
fn test_disassembly_of_executed_stream() {
    let mut gen = Generator::default();
    gen.reserve_memory_region(0, 4, None, false).unwrap();
    gen.switch_write_focus(0).unwrap();
    gen.comment("payload").unwrap();
    gen.write_value(5u32, DataType::Uint32, 1).unwrap();
    gen.end_specification().unwrap();

    let bytes = gen.into_bytes();
    let listing = dataspec_disassembler::disassemble(&bytes).unwrap();
    assert!(listing.contains("; payload"));
    assert!(listing.contains("write uint32, 5 x 1"));
    assert!(run(&bytes).is_ok());
}
