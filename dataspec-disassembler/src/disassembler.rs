//! Stream listing

use crate::decoder::decode_all;
use crate::error::Result;
use crate::formatter::format;
use dataspec_spec::{Command, Opcode};
use std::fmt::Write;

const INDENT: &str = "    ";

/// Disassemble a command stream into listing text
///
/// Every line carries the byte offset of its command; block bodies are
/// indented one level per open loop, conditional, function or structure.
pub fn disassemble(bytes: &[u8]) -> Result<String> {
    let commands = decode_all(bytes)?;
    let mut output = String::new();

    let _ = writeln!(output, "; Data specification listing");
    let _ = writeln!(
        output,
        "; {} commands ({} diagnostic), {} bytes",
        commands.len(),
        count_diagnostics(&commands),
        bytes.len()
    );
    output.push('\n');

    let mut depth = 0usize;
    for (offset, command) in &commands {
        let opcode = command.opcode();
        if opcode.closes_block() || opcode == Opcode::Else {
            depth = depth.saturating_sub(1);
        }

        let _ = writeln!(output, "0x{:06X}:  {}{}", offset, INDENT.repeat(depth), format(command));

        if opcode.opens_block() || opcode == Opcode::Else {
            depth += 1;
        }
    }

    Ok(output)
}

/// Number of commands in a stream that carry no effect on the data
pub fn count_diagnostics(commands: &[(usize, Command)]) -> usize {
    commands.iter().filter(|(_, c)| c.opcode().is_diagnostic()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataspec_spec::encoding::{encode_header, words_to_bytes};

    #[test]
    fn test_disassemble_simple() {
        let bytes = words_to_bytes(&[encode_header(Opcode::Nop.to_u8(), 0, 0), 0xFF00_0000]);
        let asm = disassemble(&bytes).unwrap();
        assert!(asm.contains("2 commands (1 diagnostic), 8 bytes"));
        assert!(asm.contains("0x000000:  nop"));
        assert!(asm.contains("0x000004:  end_spec"));
    }

    #[test]
    fn test_disassemble_rejects_garbage() {
        let bytes = words_to_bytes(&[0x0800_0000]);
        assert!(disassemble(&bytes).is_err());
    }

    #[test]
    fn test_count_diagnostics() {
        let commands = vec![
            (0, Command::Nop),
            (4, Command::Comment { text: "x".into() }),
            (12, Command::EndSpec),
        ];
        assert_eq!(count_diagnostics(&commands), 2);
    }
}
