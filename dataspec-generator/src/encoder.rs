//! Command encoding to words
//!
//! The layout of every payload is listed in [`dataspec_spec::command`];
//! header packing lives in [`dataspec_spec::encoding`].

use crate::error::{GeneratorError, Result};
use dataspec_spec::encoding::{encode_header, pack_bytes, split_u64, words_to_bytes, MAX_PAYLOAD_WORDS};
use dataspec_spec::{Command, Operand, Register};

/// Payload under construction, tracking which operand slots are registers
#[derive(Default)]
struct Payload {
    words: Vec<u32>,
    flags: u8,
    slots: usize,
}

impl Payload {
    fn word(&mut self, word: u32) {
        self.words.push(word);
    }

    fn flag(&mut self, value: bool) {
        self.word(value as u32);
    }

    fn register(&mut self, reg: Register) {
        self.word(reg.index() as u32);
    }

    fn double(&mut self, value: u64) {
        let (low, high) = split_u64(value);
        self.word(low);
        self.word(high);
    }

    fn operand(&mut self, operand: Operand) {
        match operand {
            Operand::Immediate(v) => self.double(v as u64),
            Operand::Register(reg) => {
                if self.slots < 8 {
                    self.flags |= 1 << self.slots;
                }
                self.register(reg);
                self.word(0);
            }
        }
        self.slots += 1;
    }

    fn bytes(&mut self, data: &[u8]) {
        self.word(data.len() as u32);
        self.words.extend(pack_bytes(data));
    }
}

/// Encode a command to its header word plus payload
pub fn encode(command: &Command) -> Result<Vec<u32>> {
    let mut p = Payload::default();

    match command {
        // ========== No payload ==========
        Command::Break
        | Command::Nop
        | Command::EndStruct
        | Command::EndFunction
        | Command::BreakLoop
        | Command::EndLoop
        | Command::Else
        | Command::EndIf
        | Command::EndSpec => {}

        // ========== Management ==========
        Command::Reserve {
            region,
            size,
            empty,
            reference,
        } => {
            p.word(*region);
            p.word(*size);
            p.flag(*empty);
            p.flag(reference.is_some());
            p.word(reference.unwrap_or(0));
        }
        Command::Free { region } => p.word(*region),
        Command::Reference { region, reference } => {
            p.word(*region);
            p.word(*reference);
        }
        Command::DeclareRng { rng, kind, seed } => {
            p.word(*rng);
            p.word(kind.to_u32());
            p.double(*seed);
        }
        Command::DeclareRandomDist {
            distribution,
            rng,
            kind,
            min,
            max,
        } => {
            p.word(*distribution);
            p.word(*rng);
            p.word(kind.to_u32());
            p.double(*min as u64);
            p.double(*max as u64);
        }
        Command::GetRandomNumber { distribution, dest } => {
            p.word(*distribution);
            p.register(*dest);
        }

        // ========== Structures ==========
        Command::StartStruct { structure } => p.word(*structure),
        Command::StructElem {
            index,
            data_type,
            value,
        } => {
            p.word(*index);
            p.word(data_type.id());
            p.flag(value.is_some());
            p.double(value.unwrap_or(0) as u64);
        }

        // ========== Function blocks ==========
        Command::StartFunction { function, params } => {
            p.word(*function);
            p.word(params.len() as u32);
            for reg in params {
                p.register(*reg);
            }
        }
        Command::Call { function, args } => {
            p.word(*function);
            p.word(args.len() as u32);
            for arg in args {
                p.operand(*arg);
            }
        }

        // ========== Writes ==========
        Command::Write {
            data_type,
            value,
            repeats,
        } => {
            p.word(data_type.id());
            p.operand(*value);
            p.operand(*repeats);
        }
        Command::WriteArray { data_type, data } => {
            p.word(data_type.id());
            p.bytes(data);
        }
        Command::WriteStruct { structure, repeats } => {
            p.word(*structure);
            p.operand(*repeats);
        }

        // ========== Control ==========
        Command::SwitchFocus { region } => p.operand(*region),
        Command::Loop {
            counter,
            start,
            end,
            increment,
        } => {
            p.register(*counter);
            p.operand(*start);
            p.operand(*end);
            p.operand(*increment);
        }
        Command::If { condition, lhs, rhs } => {
            p.word(condition.to_u32());
            p.operand(*lhs);
            p.operand(*rhs);
        }

        // ========== Registers and write pointer ==========
        Command::Mv { dest, src } => {
            p.register(*dest);
            p.operand(*src);
        }
        Command::GetWrPtr { dest } => p.register(*dest),
        Command::SetWrPtr { address, relative } => {
            p.operand(*address);
            p.flag(*relative);
        }
        Command::AlignWrPtr { boundary } => p.operand(*boundary),
        Command::SaveWrPtr { region, dest } => {
            p.operand(*region);
            p.register(*dest);
        }
        Command::ArithOp {
            operation,
            dest,
            lhs,
            rhs,
        } => {
            p.word(operation.to_u32());
            p.register(*dest);
            p.operand(*lhs);
            p.operand(*rhs);
        }
        Command::LogicOp {
            operation,
            dest,
            lhs,
            rhs,
        } => {
            p.word(operation.to_u32());
            p.register(*dest);
            p.operand(*lhs);
            p.operand(*rhs);
        }

        // ========== Structure parameters ==========
        Command::CopyStruct { source, dest } => {
            p.word(*source);
            p.word(*dest);
        }
        Command::CopyParam {
            source,
            source_elem,
            dest,
            dest_elem,
        } => {
            p.word(*source);
            p.word(*source_elem);
            p.word(*dest);
            p.word(*dest_elem);
        }
        Command::WriteParam {
            structure,
            elem,
            data_type,
            value,
        } => {
            p.word(*structure);
            p.word(*elem);
            p.word(data_type.id());
            p.operand(*value);
        }
        Command::ReadParam { dest, structure, elem } => {
            p.register(*dest);
            p.word(*structure);
            p.word(*elem);
        }

        // ========== Diagnostics ==========
        Command::PrintVal { value } => p.operand(*value),
        Command::PrintText { text } | Command::Comment { text } => p.bytes(text.as_bytes()),
        Command::PrintStruct { structure } => p.operand(*structure),
    }

    let opcode = command.opcode();
    if p.slots > 8 {
        return Err(GeneratorError::TooManyOperands {
            opcode,
            count: p.slots,
        });
    }
    if p.words.len() > MAX_PAYLOAD_WORDS {
        return Err(GeneratorError::PayloadTooLarge {
            opcode,
            words: p.words.len(),
        });
    }

    let mut words = Vec::with_capacity(p.words.len() + 1);
    words.push(encode_header(opcode.to_u8(), p.flags, p.words.len() as u16));
    words.extend(p.words);
    Ok(words)
}

/// Encode a command straight to little-endian bytes
pub fn encode_to_bytes(command: &Command) -> Result<Vec<u8>> {
    Ok(words_to_bytes(&encode(command)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataspec_spec::encoding::{extract_flags, extract_length, extract_opcode};
    use dataspec_spec::{Condition, DataType, Opcode};

    #[test]
    fn test_encode_no_payload() {
        let words = encode(&Command::EndSpec).unwrap();
        assert_eq!(words, vec![0xFF00_0000]);
    }

    #[test]
    fn test_encode_reserve() {
        let words = encode(&Command::Reserve {
            region: 3,
            size: 256,
            empty: false,
            reference: None,
        })
        .unwrap();
        assert_eq!(extract_opcode(words[0]), Opcode::Reserve.to_u8());
        assert_eq!(extract_length(words[0]), 5);
        assert_eq!(&words[1..], &[3, 256, 0, 0, 0]);

        let words = encode(&Command::Reserve {
            region: 3,
            size: 256,
            empty: false,
            reference: Some(9),
        })
        .unwrap();
        assert_eq!(&words[1..], &[3, 256, 0, 1, 9]);
    }

    #[test]
    fn test_encode_reference() {
        let words = encode(&Command::Reference { region: 1, reference: 9 }).unwrap();
        assert_eq!(extract_opcode(words[0]), Opcode::Reference.to_u8());
        assert_eq!(&words[1..], &[1, 9]);
    }

    #[test]
    fn test_register_flags() {
        let words = encode(&Command::If {
            condition: Condition::LessThan,
            lhs: Operand::Register(Register::R4),
            rhs: Operand::Immediate(-1),
        })
        .unwrap();
        assert_eq!(extract_flags(words[0]), 0b01);
        assert_eq!(extract_length(words[0]), 5);
        assert_eq!(&words[1..], &[3, 4, 0, 0xFFFF_FFFF, 0xFFFF_FFFF]);
    }

    #[test]
    fn test_write_operands() {
        let words = encode(&Command::Write {
            data_type: DataType::Uint32,
            value: Operand::Immediate(42),
            repeats: Operand::Register(Register::R1),
        })
        .unwrap();
        assert_eq!(extract_flags(words[0]), 0b10);
        assert_eq!(&words[1..], &[2, 42, 0, 1, 0]);
    }

    #[test]
    fn test_text_padding() {
        let words = encode(&Command::Comment { text: "abcde".into() }).unwrap();
        assert_eq!(extract_length(words[0]), 3);
        assert_eq!(words[1], 5);
    }

    #[test]
    fn test_every_command_is_word_aligned() {
        let bytes = encode_to_bytes(&Command::WriteArray {
            data_type: DataType::Uint8,
            data: vec![1, 2, 3],
        })
        .unwrap();
        assert_eq!(bytes.len() % 4, 0);
        assert_eq!(bytes.len(), 4 + 4 + 4);
    }

    #[test]
    fn test_too_many_operands() {
        let args = vec![Operand::Immediate(0); 9];
        let err = encode(&Command::Call { function: 0, args }).unwrap_err();
        assert!(matches!(err, GeneratorError::TooManyOperands { count: 9, .. }));
    }
}
