//! Disassembler (C9, spec §4.3/§8): word → mnemonic text with PC context.
//! Built on the root crate's [`bee::decode`] — the "one decode function, N
//! consumers" design note means this crate never re-derives the opcode
//! table, it only formats the [`bee::Instruction`] the core crate already
//! produces.
//!
//! Text formats are reproduced verbatim from the reference disassembler
//! (`opcodes/bee-dis.c`/`beexx-dis.h`): `calli`/`pushreli`/`jumpi`/
//! `jumpzi` print the resolved absolute target in hex, `pushi` prints both
//! hex and decimal, `trap` prints its library code in hex, core opcodes
//! print their bare mnemonic, and anything outside the 54-entry table (or
//! with reserved bits set) prints `"; invalid instruction!"` rather than
//! erroring — a disassembler must produce output for every byte offset.

use bee::encoding::{decode, Instruction};
use bee::Width;

fn branch_target(addr: u64, offset: i64, width: Width) -> u64 {
    let delta = offset.wrapping_mul(width.bytes() as i64);
    width.mask((addr as i64).wrapping_add(delta) as u64)
}

/// Disassembles the single word `iword` (already fetched from memory, in
/// host byte order) found at address `addr`. Returns the formatted
/// mnemonic line and never fails: an undecodable word yields the
/// `"; invalid instruction!"` text the reference tool prints.
pub fn disassemble_word(iword: u64, addr: u64, width: Width) -> String {
    match decode(iword, width) {
        Ok(Instruction::Calli(offset)) => {
            format!("calli\t0x{:x}", branch_target(addr, offset, width))
        }
        Ok(Instruction::Pushi(value)) => {
            format!("pushi\t0x{:x} # {}", width.mask(value as u64), value)
        }
        Ok(Instruction::Pushreli(offset)) => {
            format!("pushreli\t0x{:x}", branch_target(addr, offset, width))
        }
        Ok(Instruction::Jumpi(offset)) => {
            format!("jumpi\t0x{:x}", branch_target(addr, offset, width))
        }
        Ok(Instruction::Jumpzi(offset)) => {
            format!("jumpzi\t0x{:x}", branch_target(addr, offset, width))
        }
        Ok(Instruction::Trap(code)) => format!("trap\t0x{:x}", code),
        Ok(Instruction::Insn(opcode)) => opcode.mnemonic().to_owned(),
        Err(_) => "; invalid instruction!".to_owned(),
    }
}

/// One disassembled line: the address it starts at and its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub address: u64,
    pub text: String,
}

/// Disassembles a whole instruction stream, word by word, starting at
/// `base_addr`. `bytes` must be a whole number of words; a short trailing
/// remainder is ignored (mirrors the reference tool reading exactly
/// `BEE_WORD_BYTES` per call and stopping when it can't fill one).
pub fn disassemble(bytes: &[u8], width: Width, endian: bee::Endian, base_addr: u64) -> Vec<Line> {
    let word_bytes = width.bytes() as usize;
    let mut lines = Vec::with_capacity(bytes.len() / word_bytes);
    let mut addr = base_addr;
    for chunk in bytes.chunks(word_bytes) {
        if chunk.len() < word_bytes {
            break;
        }
        let word = match width {
            Width::W32 => endian.read_u32(chunk) as u64,
            Width::W64 => endian.read_u64(chunk),
        };
        lines.push(Line {
            address: addr,
            text: disassemble_word(word, addr, width),
        });
        addr = width.mask(addr + word_bytes as u64);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use bee::encoding::{encode, Opcode};
    use bee::Endian;

    #[test]
    fn bare_opcode_prints_mnemonic() {
        let word = encode(Instruction::Insn(Opcode::Add), Width::W32);
        assert_eq!(disassemble_word(word, 0, Width::W32), "add");
    }

    #[test]
    fn pushi_prints_hex_and_decimal() {
        let word = encode(Instruction::Pushi(-5), Width::W32);
        assert_eq!(disassemble_word(word, 0, Width::W32), "pushi\t0xfffffffb # -5");
    }

    #[test]
    fn calli_prints_resolved_target() {
        let word = encode(Instruction::Calli(3), Width::W32);
        assert_eq!(disassemble_word(word, 0x100, Width::W32), "calli\t0x10c");
    }

    #[test]
    fn jumpi_handles_negative_offsets() {
        let word = encode(Instruction::Jumpi(-2), Width::W32);
        assert_eq!(disassemble_word(word, 0x20, Width::W32), "jumpi\t0x18");
    }

    #[test]
    fn trap_prints_library_code() {
        let word = encode(Instruction::Trap(0), Width::W32);
        assert_eq!(disassemble_word(word, 0, Width::W32), "trap\t0x0");
    }

    #[test]
    fn invalid_opcode_prints_diagnostic() {
        let word = (54u64 << 8) | (0b11 << 2) | 0b11; // raw opcode 54, outside the table
        assert_eq!(disassemble_word(word, 0, Width::W32), "; invalid instruction!");
    }

    #[test]
    fn disassemble_walks_the_whole_stream() {
        let bytes = {
            let mut v = Vec::new();
            for instruction in [
                Instruction::Pushi(1),
                Instruction::Pushi(2),
                Instruction::Insn(Opcode::Add),
                Instruction::Insn(Opcode::Break),
            ] {
                v.extend_from_slice(&(encode(instruction, Width::W32) as u32).to_le_bytes());
            }
            v
        };
        let lines = disassemble(&bytes, Width::W32, Endian::Little, 0);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0].address, 0);
        assert_eq!(lines[2].address, 8);
        assert_eq!(lines[2].text, "add");
    }
}
