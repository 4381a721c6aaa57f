//! Integration tests for region management and the write pointer

use dataspec_generator::{encode_to_bytes, Generator};
use dataspec_runtime::{Executor, ExecutorConfig, MemoryRegion, RuntimeError};
use dataspec_spec::{Command, DataType, Operand, Register, Value};
use proptest::prelude::*;

fn stream(commands: &[Command]) -> Vec<u8> {
    commands
        .iter()
        .flat_map(|c| encode_to_bytes(c).unwrap())
        .collect()
}

#[test]
fn test_reserve_free_reserve_resets_pointer() {
    let mut gen = Generator::default();
    gen.reserve_memory_region(0, 8, None, false).unwrap();
    gen.switch_write_focus(0).unwrap();
    gen.write_value(0xAAu8, DataType::Uint8, 8).unwrap();
    gen.free_memory_region(0).unwrap();
    gen.reserve_memory_region(0, 8, None, false).unwrap();
    gen.switch_write_focus(0).unwrap();
    gen.get_write_pointer(Register::R1).unwrap();
    gen.write_value(1u16, DataType::Uint16, 1).unwrap();
    gen.end_specification().unwrap();

    let result = Executor::new(gen.to_bytes(), ExecutorConfig::default())
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(result.registers[1], 0);
    let image = result.image.unwrap();
    assert_eq!(image.region_data(0).unwrap(), &[1, 0, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn test_free_unreserved_is_fatal() {
    let err = Executor::new(stream(&[Command::Free { region: 3 }, Command::EndSpec]), ExecutorConfig::default())
        .unwrap()
        .run()
        .unwrap_err();
    assert!(matches!(err.root(), RuntimeError::NotAllocated(3)));
    assert!(err.is_resource());
}

#[test]
fn test_reserve_twice_is_fatal() {
    let bytes = stream(&[
        Command::Reserve {
            region: 1,
            size: 4,
            empty: false,
            reference: None,
        },
        Command::Reserve {
            region: 1,
            size: 4,
            empty: false,
            reference: None,
        },
        Command::EndSpec,
    ]);
    let err = Executor::new(bytes, ExecutorConfig::default()).unwrap().run().unwrap_err();
    assert!(matches!(err.root(), RuntimeError::RegionInUse(1)));
}

#[test]
fn test_exhausted_write_leaves_region_untouched() {
    let bytes = stream(&[
        Command::Reserve {
            region: 0,
            size: 6,
            empty: false,
            reference: None,
        },
        Command::SwitchFocus {
            region: Operand::Immediate(0),
        },
        Command::Write {
            data_type: DataType::Uint32,
            value: Operand::Immediate(0x0102_0304),
            repeats: Operand::Immediate(1),
        },
        Command::Write {
            data_type: DataType::Uint32,
            value: Operand::Immediate(0xFFFF),
            repeats: Operand::Immediate(1),
        },
        Command::EndSpec,
    ]);
    let mut executor = Executor::new(bytes, ExecutorConfig::default()).unwrap();
    let err = executor.run().unwrap_err();
    assert!(matches!(
        err.root(),
        RuntimeError::RegionExhausted {
            region: 0,
            capacity: 6,
            required: 8
        }
    ));
    let region = executor.regions().get(0).unwrap();
    assert_eq!(region.data(), &[4, 3, 2, 1, 0, 0]);
    assert_eq!(region.write_pointer(), 4);
}

#[test]
fn test_write_to_empty_region_is_fatal() {
    let bytes = stream(&[
        Command::Reserve {
            region: 0,
            size: 6,
            empty: true,
            reference: None,
        },
        Command::SwitchFocus {
            region: Operand::Immediate(0),
        },
        Command::EndSpec,
    ]);
    let err = Executor::new(bytes, ExecutorConfig::default()).unwrap().run().unwrap_err();
    assert!(matches!(err.root(), RuntimeError::RegionUnfilled(0)));
}

#[test]
fn test_focus_by_register() {
    let mut gen = Generator::default();
    gen.reserve_memory_region(0, 4, None, false).unwrap();
    gen.reserve_memory_region(5, 4, None, false).unwrap();
    gen.set_register_value(Register::R2, 5).unwrap();
    gen.switch_write_focus_register(Register::R2).unwrap();
    gen.write_value(-1i32, DataType::Int32, 1).unwrap();
    gen.switch_write_focus(0).unwrap();
    gen.write_value(3u32, DataType::Uint32, 1).unwrap();
    gen.end_specification().unwrap();

    let image = dataspec_runtime::run(&gen.to_bytes()).unwrap();
    assert_eq!(image.entries.len(), 2);
    assert_eq!(image.entries[0].region, 0);
    assert_eq!(image.entries[1].region, 5);
    assert_eq!(image.entries[1].offset, 4);
    assert_eq!(image.region_data(5).unwrap(), &[0xFF; 4]);
}

#[test]
fn test_align_and_array_writes() {
    let mut gen = Generator::default();
    gen.reserve_memory_region(0, 24, None, false).unwrap();
    gen.switch_write_focus(0).unwrap();
    gen.write_value(9u8, DataType::Uint8, 1).unwrap();
    gen.align_write_pointer(4).unwrap();
    gen.write_array(&[1u16, 2, 3], DataType::Uint16).unwrap();
    gen.align_write_pointer(8).unwrap();
    gen.write_array(&[0.5f64], DataType::S1615).unwrap();
    gen.end_specification().unwrap();

    let image = dataspec_runtime::run(&gen.to_bytes()).unwrap();
    let data = image.region_data(0).unwrap();
    assert_eq!(&data[..12], &[9, 0, 0, 0, 1, 0, 2, 0, 3, 0, 0, 0]);
    assert_eq!(DataType::S1615.decode(&data[16..20]).unwrap(), Value::Real(0.5));
}

proptest! {
    /// The write pointer equals the bytes written and never passes capacity
    #[test]
    fn test_write_pointer_tracks_bytes(
        capacity in 0u32..64,
        writes in prop::collection::vec((1usize..9, 1u64..4), 0..12),
    ) {
        let mut region = MemoryRegion::new(0, capacity, false);
        let mut expected = 0u64;
        for (len, repeats) in writes {
            let before = region.data().to_vec();
            let bytes = vec![0x5A; len];
            match region.write_repeated(&bytes, repeats) {
                Ok(()) => expected += len as u64 * repeats,
                Err(RuntimeError::RegionExhausted { .. }) => {
                    prop_assert_eq!(region.data(), &before[..]);
                }
                Err(RuntimeError::RegionUnfilled(_)) => {
                    prop_assert_eq!(capacity, 0);
                }
                Err(other) => {
                    prop_assert!(false, "unexpected error {}", other);
                }
            }
            prop_assert_eq!(region.write_pointer() as u64, expected);
            prop_assert!(region.write_pointer() <= region.capacity());
        }
    }

    /// Alignment lands on the next multiple of the boundary
    #[test]
    fn test_align_rounds_up(start in 0u32..64, shift in 0u32..6) {
        let boundary = 1i64 << shift;
        let mut region = MemoryRegion::new(0, 128, false);
        region.set_write_pointer(start as i64).unwrap();
        region.align(boundary).unwrap();
        let pointer = region.write_pointer() as i64;
        prop_assert_eq!(pointer % boundary, 0);
        prop_assert!(pointer >= start as i64 && pointer - (start as i64) < boundary);
    }
}
