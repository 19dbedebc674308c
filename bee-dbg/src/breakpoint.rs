//! Breakpoint pattern (spec §6, "Debugger breakpoint pattern"): a single
//! `INSN`+`BREAK` word at the VM's configured width, matched byte-exactly.
//! A debugger plants this pattern over an instruction to trap execution,
//! and uses [`is_breakpoint_word`] to recognise it when single-stepping
//! back over planted code.

use bee::encoding::{decode, encode, Instruction, Opcode};
use bee::{Endian, Width};

/// The raw bytes of a `BREAK` instruction at `width`/`endian`, ready to be
/// written over the instruction a breakpoint replaces.
pub fn breakpoint_bytes(width: Width, endian: Endian) -> Vec<u8> {
    let word = encode(Instruction::Insn(Opcode::Break), width);
    let mut buf = [0u8; 8];
    match width {
        Width::W32 => endian.write_u32(&mut buf[..4], word as u32),
        Width::W64 => endian.write_u64(&mut buf[..8], word),
    }
    buf[..width.bytes() as usize].to_vec()
}

/// Whether the raw word `iword` (already fetched from memory, host byte
/// order) is the breakpoint pattern.
pub fn is_breakpoint_word(iword: u64, width: Width) -> bool {
    matches!(decode(iword, width), Ok(Instruction::Insn(Opcode::Break)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planted_bytes_decode_as_break() {
        for width in [Width::W32, Width::W64] {
            for endian in [Endian::Little, Endian::Big] {
                let bytes = breakpoint_bytes(width, endian);
                let word = match width {
                    Width::W32 => endian.read_u32(&bytes) as u64,
                    Width::W64 => endian.read_u64(&bytes),
                };
                assert!(is_breakpoint_word(word, width));
            }
        }
    }

    #[test]
    fn ordinary_instructions_are_not_breakpoints() {
        let word = encode(Instruction::Insn(Opcode::Nop), Width::W32);
        assert!(!is_breakpoint_word(word, Width::W32));
    }
}
