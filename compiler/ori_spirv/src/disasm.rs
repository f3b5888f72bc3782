//! Plain-text rendering of SPIR-V words.
//!
//! One instruction per line, operands as decimal words, literal strings
//! quoted. Output is for `ORI_DEBUG_SPIRV` dumps and test diagnostics; it
//! is not meant to be reassembled.

use std::fmt;

use crate::builder::{decode_string, Instruction, InstructionIter};
use crate::spirv::{HEADER_WORDS, MAGIC};

/// Render `words`, with or without a module header.
pub fn disassemble(words: &[u32]) -> String {
    Disassembly(words).to_string()
}

/// Display adapter behind [`disassemble`].
#[derive(Clone, Copy, Debug)]
pub struct Disassembly<'a>(pub &'a [u32]);

impl fmt::Display for Disassembly<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut body = self.0;
        if body.len() >= HEADER_WORDS && body[0] == MAGIC {
            let version = body[1];
            writeln!(f, "; SPIR-V")?;
            writeln!(f, "; Version: {}.{}", (version >> 16) & 0xFF, (version >> 8) & 0xFF)?;
            writeln!(f, "; Generator: {}", body[2])?;
            writeln!(f, "; Bound: {}", body[3])?;
            writeln!(f, "; Schema: {}", body[4])?;
            body = &body[HEADER_WORDS..];
        }

        let mut instructions = InstructionIter::new(body);
        for instruction in instructions.by_ref() {
            write_instruction(f, &instruction)?;
            writeln!(f)?;
        }
        let rest = instructions.rest();
        if !rest.is_empty() {
            writeln!(f, "; {} trailing words not decoded", rest.len())?;
        }
        Ok(())
    }
}

fn write_instruction(f: &mut fmt::Formatter<'_>, instruction: &Instruction<'_>) -> fmt::Result {
    let op = instruction.op();
    match op {
        Some(op) => f.write_str(op.name())?,
        None => write!(f, "Op<{}>", instruction.opcode)?,
    }
    let string_at = op.and_then(|op| op.string_operand());
    let operands = instruction.operands;
    let mut index = 0;
    while index < operands.len() {
        if string_at == Some(index) {
            if let Some((string, used)) = decode_string(&operands[index..]) {
                write!(f, " {string:?}")?;
                index += used;
                continue;
            }
        }
        write!(f, " {}", operands[index])?;
        index += 1;
    }
    Ok(())
}
