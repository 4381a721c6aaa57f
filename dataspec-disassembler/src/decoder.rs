//! Command decoder
//!
//! Reads one header word plus payload at a byte offset and rebuilds the
//! typed [`Command`]. The payload must be consumed exactly: a declared
//! length longer or shorter than the fields, or register flags on slots
//! the command does not have, are rejected.

use crate::error::{DecodeError, Result};
use dataspec_spec::encoding::{
    extract_flags, extract_length, extract_opcode, is_register_slot, join_u64, padded_words, read_word,
    unpack_bytes, WORD_SIZE,
};
use dataspec_spec::{
    ArithmeticOperation, Command, Condition, DataType, DistributionKind, LogicOperation, Opcode, Operand, Register,
    RngKind, SpecError, NUM_REGISTERS,
};

/// Cursor over one command's payload words
struct Reader {
    offset: usize,
    opcode: Opcode,
    flags: u8,
    words: Vec<u32>,
    pos: usize,
    slots: usize,
}

impl Reader {
    fn malformed(&self, reason: impl Into<String>) -> DecodeError {
        DecodeError::Malformed {
            offset: self.offset,
            opcode: self.opcode,
            reason: reason.into(),
        }
    }

    fn field(&self, source: SpecError) -> DecodeError {
        DecodeError::Field {
            offset: self.offset,
            opcode: self.opcode,
            source,
        }
    }

    fn word(&mut self) -> Result<u32> {
        let word = *self.words.get(self.pos).ok_or_else(|| DecodeError::LengthMismatch {
            offset: self.offset,
            opcode: self.opcode,
            declared: self.words.len(),
            consumed: self.pos + 1,
        })?;
        self.pos += 1;
        Ok(word)
    }

    fn double(&mut self) -> Result<u64> {
        let low = self.word()?;
        let high = self.word()?;
        Ok(join_u64(low, high))
    }

    fn flag(&mut self) -> Result<bool> {
        match self.word()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(self.malformed(format!("boolean field holds {}", other))),
        }
    }

    fn register(&mut self) -> Result<Register> {
        let index = self.word()?;
        Register::from_index(index as usize).ok_or(DecodeError::InvalidRegister {
            offset: self.offset,
            opcode: self.opcode,
            index,
        })
    }

    fn operand(&mut self) -> Result<Operand> {
        let slot = self.slots;
        self.slots += 1;
        if is_register_slot(self.flags, slot) {
            let reg = self.register()?;
            if self.word()? != 0 {
                return Err(self.malformed(format!("register operand {} has a non-zero high word", slot)));
            }
            Ok(Operand::Register(reg))
        } else {
            Ok(Operand::Immediate(self.double()? as i64))
        }
    }

    fn bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.word()? as usize;
        let count = padded_words(len);
        let end = self.pos + count;
        if end > self.words.len() {
            return Err(DecodeError::LengthMismatch {
                offset: self.offset,
                opcode: self.opcode,
                declared: self.words.len(),
                consumed: end,
            });
        }
        let bytes = unpack_bytes(&self.words[self.pos..end], len);
        self.pos = end;
        Ok(bytes)
    }

    fn text(&mut self) -> Result<String> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes).map_err(|_| self.malformed("text is not valid UTF-8"))
    }

    fn data_type(&mut self) -> Result<DataType> {
        let id = self.word()?;
        DataType::from_id(id).ok_or_else(|| self.field(SpecError::UnknownDataType(id)))
    }

    fn enumerated<T>(&mut self, kind: &'static str, from: fn(u32) -> Option<T>) -> Result<T> {
        let id = self.word()?;
        from(id).ok_or_else(|| self.field(SpecError::UnknownOperation { kind, id }))
    }

    /// Every payload word used, and no flags beyond the operand slots read
    fn finish(self) -> Result<()> {
        if self.pos != self.words.len() {
            return Err(DecodeError::LengthMismatch {
                offset: self.offset,
                opcode: self.opcode,
                declared: self.words.len(),
                consumed: self.pos,
            });
        }
        let stray = (self.slots..8).any(|slot| is_register_slot(self.flags, slot));
        if stray {
            return Err(self.malformed(format!(
                "register flags 0b{:08b} set beyond {} operand slots",
                self.flags, self.slots
            )));
        }
        Ok(())
    }
}

/// Decode the command at byte `offset`, returning it with its size in bytes
pub fn decode_at(bytes: &[u8], offset: usize) -> Result<(Command, usize)> {
    let available = bytes.len().saturating_sub(offset);
    let header = read_word(bytes, offset).ok_or(DecodeError::Truncated {
        offset,
        needed: WORD_SIZE,
        available,
    })?;

    let opcode_byte = extract_opcode(header);
    let opcode = Opcode::from_u8(opcode_byte).ok_or(DecodeError::UnknownOpcode {
        offset,
        opcode: opcode_byte,
    })?;
    let length = extract_length(header);
    let size = (1 + length) * WORD_SIZE;
    if size > available {
        return Err(DecodeError::Truncated {
            offset,
            needed: size,
            available,
        });
    }

    let words = (1..=length)
        .filter_map(|i| read_word(bytes, offset + i * WORD_SIZE))
        .collect();
    let mut r = Reader {
        offset,
        opcode,
        flags: extract_flags(header),
        words,
        pos: 0,
        slots: 0,
    };
    let command = decode_payload(&mut r)?;
    r.finish()?;
    Ok((command, size))
}

/// Decode a whole stream into `(offset, command)` pairs
pub fn decode_all(bytes: &[u8]) -> Result<Vec<(usize, Command)>> {
    if bytes.len() % WORD_SIZE != 0 {
        let offset = bytes.len() - bytes.len() % WORD_SIZE;
        return Err(DecodeError::Truncated {
            offset,
            needed: WORD_SIZE,
            available: bytes.len() - offset,
        });
    }

    let mut out = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let (command, size) = decode_at(bytes, offset)?;
        out.push((offset, command));
        offset += size;
    }
    Ok(out)
}

fn decode_payload(r: &mut Reader) -> Result<Command> {
    let command = match r.opcode {
        // ========== No payload ==========
        Opcode::Break => Command::Break,
        Opcode::Nop => Command::Nop,
        Opcode::EndStruct => Command::EndStruct,
        Opcode::EndFunction => Command::EndFunction,
        Opcode::BreakLoop => Command::BreakLoop,
        Opcode::EndLoop => Command::EndLoop,
        Opcode::Else => Command::Else,
        Opcode::EndIf => Command::EndIf,
        Opcode::EndSpec => Command::EndSpec,

        // ========== Management ==========
        Opcode::Reserve => {
            let region = r.word()?;
            let size = r.word()?;
            let empty = r.flag()?;
            let referenceable = r.flag()?;
            let reference = r.word()?;
            Command::Reserve {
                region,
                size,
                empty,
                reference: referenceable.then_some(reference),
            }
        }
        Opcode::Free => Command::Free { region: r.word()? },
        Opcode::Reference => Command::Reference {
            region: r.word()?,
            reference: r.word()?,
        },
        Opcode::DeclareRng => Command::DeclareRng {
            rng: r.word()?,
            kind: r.enumerated("random number generator kind", RngKind::from_u32)?,
            seed: r.double()?,
        },
        Opcode::DeclareRandomDist => Command::DeclareRandomDist {
            distribution: r.word()?,
            rng: r.word()?,
            kind: r.enumerated("distribution kind", DistributionKind::from_u32)?,
            min: r.double()? as i64,
            max: r.double()? as i64,
        },
        Opcode::GetRandomNumber => Command::GetRandomNumber {
            distribution: r.word()?,
            dest: r.register()?,
        },

        // ========== Structures ==========
        Opcode::StartStruct => Command::StartStruct { structure: r.word()? },
        Opcode::StructElem => {
            let index = r.word()?;
            let data_type = r.data_type()?;
            let has_value = r.flag()?;
            let raw = r.double()? as i64;
            Command::StructElem {
                index,
                data_type,
                value: has_value.then_some(raw),
            }
        }

        // ========== Function blocks ==========
        Opcode::StartFunction => {
            let function = r.word()?;
            let count = r.word()? as usize;
            if count > NUM_REGISTERS {
                return Err(r.malformed(format!("{} parameters", count)));
            }
            let params = (0..count).map(|_| r.register()).collect::<Result<Vec<_>>>()?;
            Command::StartFunction { function, params }
        }
        Opcode::Call => {
            let function = r.word()?;
            let count = r.word()? as usize;
            if count > 8 {
                return Err(r.malformed(format!("{} arguments", count)));
            }
            let args = (0..count).map(|_| r.operand()).collect::<Result<Vec<_>>>()?;
            Command::Call { function, args }
        }

        // ========== Writes ==========
        Opcode::Write => Command::Write {
            data_type: r.data_type()?,
            value: r.operand()?,
            repeats: r.operand()?,
        },
        Opcode::WriteArray => Command::WriteArray {
            data_type: r.data_type()?,
            data: r.bytes()?,
        },
        Opcode::WriteStruct => Command::WriteStruct {
            structure: r.word()?,
            repeats: r.operand()?,
        },

        // ========== Control ==========
        Opcode::SwitchFocus => Command::SwitchFocus { region: r.operand()? },
        Opcode::Loop => Command::Loop {
            counter: r.register()?,
            start: r.operand()?,
            end: r.operand()?,
            increment: r.operand()?,
        },
        Opcode::If => Command::If {
            condition: r.enumerated("condition", Condition::from_u32)?,
            lhs: r.operand()?,
            rhs: r.operand()?,
        },

        // ========== Registers and write pointer ==========
        Opcode::Mv => Command::Mv {
            dest: r.register()?,
            src: r.operand()?,
        },
        Opcode::GetWrPtr => Command::GetWrPtr { dest: r.register()? },
        Opcode::SetWrPtr => Command::SetWrPtr {
            address: r.operand()?,
            relative: r.flag()?,
        },
        Opcode::AlignWrPtr => Command::AlignWrPtr { boundary: r.operand()? },
        Opcode::SaveWrPtr => Command::SaveWrPtr {
            region: r.operand()?,
            dest: r.register()?,
        },
        Opcode::ArithOp => Command::ArithOp {
            operation: r.enumerated("arithmetic operation", ArithmeticOperation::from_u32)?,
            dest: r.register()?,
            lhs: r.operand()?,
            rhs: r.operand()?,
        },
        Opcode::LogicOp => Command::LogicOp {
            operation: r.enumerated("logic operation", LogicOperation::from_u32)?,
            dest: r.register()?,
            lhs: r.operand()?,
            rhs: r.operand()?,
        },

        // ========== Structure parameters ==========
        Opcode::CopyStruct => Command::CopyStruct {
            source: r.word()?,
            dest: r.word()?,
        },
        Opcode::CopyParam => Command::CopyParam {
            source: r.word()?,
            source_elem: r.word()?,
            dest: r.word()?,
            dest_elem: r.word()?,
        },
        Opcode::WriteParam => Command::WriteParam {
            structure: r.word()?,
            elem: r.word()?,
            data_type: r.data_type()?,
            value: r.operand()?,
        },
        Opcode::ReadParam => Command::ReadParam {
            dest: r.register()?,
            structure: r.word()?,
            elem: r.word()?,
        },

        // ========== Diagnostics ==========
        Opcode::PrintVal => Command::PrintVal { value: r.operand()? },
        Opcode::PrintText => Command::PrintText { text: r.text()? },
        Opcode::PrintStruct => Command::PrintStruct { structure: r.operand()? },
        Opcode::Comment => Command::Comment { text: r.text()? },
    };
    Ok(command)
}
