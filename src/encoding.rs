//! Bijective instruction encoding (spec §4.3).
//!
//! One [`decode`] function and its inverse [`encode`] are shared by the
//! interpreter, the disassembler, and the single-step/record oracles, per
//! the "three parallel walks of the opcode table" design note: every
//! consumer matches on the same [`Instruction`] value instead of
//! re-deriving its own opcode table.

use crate::error::BeeError;
use crate::width::Width;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};

/// The 54 core (`INSN`-class) opcodes, in the canonical order fixed by the
/// reference opcode table. This order is normative: it is the wire
/// encoding, not just a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum Opcode {
    Nop,
    Not,
    And,
    Or,
    Xor,
    Lshift,
    Rshift,
    Arshift,
    Pop,
    Dup,
    Set,
    Swap,
    Jump,
    Jumpz,
    Call,
    Ret,
    Load,
    Store,
    Load1,
    Store1,
    Load2,
    Store2,
    Load4,
    Store4,
    LoadIa,
    StoreDb,
    LoadIb,
    StoreDa,
    LoadDa,
    StoreIb,
    LoadDb,
    StoreIa,
    Neg,
    Add,
    Mul,
    Divmod,
    Udivmod,
    Eq,
    Lt,
    Ult,
    Pushs,
    Pops,
    Dups,
    Catch,
    Throw,
    Break,
    WordBytes,
    GetSsize,
    GetSp,
    SetSp,
    GetDsize,
    GetDp,
    SetDp,
    GetHandlerSp,
}

pub const OPCODE_COUNT: u64 = 54;

impl Opcode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop => "nop",
            Opcode::Not => "not",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Xor => "xor",
            Opcode::Lshift => "lshift",
            Opcode::Rshift => "rshift",
            Opcode::Arshift => "arshift",
            Opcode::Pop => "pop",
            Opcode::Dup => "dup",
            Opcode::Set => "set",
            Opcode::Swap => "swap",
            Opcode::Jump => "jump",
            Opcode::Jumpz => "jumpz",
            Opcode::Call => "call",
            Opcode::Ret => "ret",
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::Load1 => "load1",
            Opcode::Store1 => "store1",
            Opcode::Load2 => "load2",
            Opcode::Store2 => "store2",
            Opcode::Load4 => "load4",
            Opcode::Store4 => "store4",
            Opcode::LoadIa => "load_ia",
            Opcode::StoreDb => "store_db",
            Opcode::LoadIb => "load_ib",
            Opcode::StoreDa => "store_da",
            Opcode::LoadDa => "load_da",
            Opcode::StoreIb => "store_ib",
            Opcode::LoadDb => "load_db",
            Opcode::StoreIa => "store_ia",
            Opcode::Neg => "neg",
            Opcode::Add => "add",
            Opcode::Mul => "mul",
            Opcode::Divmod => "divmod",
            Opcode::Udivmod => "udivmod",
            Opcode::Eq => "eq",
            Opcode::Lt => "lt",
            Opcode::Ult => "ult",
            Opcode::Pushs => "pushs",
            Opcode::Pops => "pops",
            Opcode::Dups => "dups",
            Opcode::Catch => "catch",
            Opcode::Throw => "throw",
            Opcode::Break => "break",
            Opcode::WordBytes => "word_bytes",
            Opcode::GetSsize => "get_ssize",
            Opcode::GetSp => "get_sp",
            Opcode::SetSp => "set_sp",
            Opcode::GetDsize => "get_dsize",
            Opcode::GetDp => "get_dp",
            Opcode::SetDp => "set_dp",
            Opcode::GetHandlerSp => "get_handler_sp",
        }
    }

    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        (0..OPCODE_COUNT)
            .filter_map(Opcode::from_u64)
            .find(|op| op.mnemonic() == name)
    }
}

/// A fully decoded instruction word, tagged by its §4.3 class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Push return address, branch PC-relative by `offset` words.
    Calli(i64),
    /// Sign-extend and push `value` on the data stack.
    Pushi(i64),
    /// Push the PC-relative address `offset` words away (absolute).
    Pushreli(i64),
    /// Branch PC-relative by `offset` words.
    Jumpi(i64),
    /// Pop; branch PC-relative by `offset` words if the popped value is zero.
    Jumpzi(i64),
    /// Invoke the trap bridge with library code `code`.
    Trap(u64),
    /// A core (`INSN`-class) instruction.
    Insn(Opcode),
}

const TAG_CALLI: u64 = 0b00;
const TAG_PUSHI: u64 = 0b01;
const TAG_PUSHRELI: u64 = 0b10;
const TAG_SECOND_LEVEL: u64 = 0b11;

const SUBTAG_JUMPI: u64 = 0b00;
const SUBTAG_JUMPZI: u64 = 0b01;
const SUBTAG_TRAP: u64 = 0b10;
const SUBTAG_INSN: u64 = 0b11;

/// Decodes one instruction word. Returns `Err(BeeError::InvalidOpcode)` for
/// any bit pattern the encoding does not assign meaning to (reserved bits
/// set, or an `INSN` opcode outside the 54-entry table) — per spec §4.3,
/// invalid is itself a decodable outcome, not a panic.
pub fn decode(word: u64, width: Width) -> Result<Instruction, BeeError> {
    let word = width.mask(word);
    let tag = word & 0b11;
    match tag {
        TAG_CALLI => Ok(Instruction::Calli(width.sign_extend_bits(word >> 2, width.bits() - 2))),
        TAG_PUSHI => Ok(Instruction::Pushi(width.sign_extend_bits(word >> 2, width.bits() - 2))),
        TAG_PUSHRELI => Ok(Instruction::Pushreli(width.sign_extend_bits(word >> 2, width.bits() - 2))),
        TAG_SECOND_LEVEL => {
            let subtag = (word >> 2) & 0b11;
            let reserved = (word >> 4) & 0xF;
            if reserved != 0 {
                return Err(BeeError::InvalidOpcode);
            }
            match subtag {
                SUBTAG_JUMPI => Ok(Instruction::Jumpi(width.sign_extend_bits(word >> 8, width.bits() - 8))),
                SUBTAG_JUMPZI => Ok(Instruction::Jumpzi(width.sign_extend_bits(word >> 8, width.bits() - 8))),
                SUBTAG_TRAP => Ok(Instruction::Trap(word >> 8)),
                SUBTAG_INSN => {
                    let opcode_bits = (word >> 8) & 0x3F;
                    let rest = word >> 14;
                    if rest != 0 {
                        return Err(BeeError::InvalidOpcode);
                    }
                    Opcode::from_u64(opcode_bits)
                        .map(Instruction::Insn)
                        .ok_or(BeeError::InvalidOpcode)
                }
                _ => unreachable!("two-bit subtag"),
            }
        }
        _ => unreachable!("two-bit tag"),
    }
}

/// Encodes `instruction` as a `width`-masked word. Inverse of [`decode`]
/// for every instruction `decode` can produce (the round-trip property in
/// spec §8).
pub fn encode(instruction: Instruction, width: Width) -> u64 {
    let word = match instruction {
        Instruction::Calli(offset) => ((offset as u64) << 2) | TAG_CALLI,
        Instruction::Pushi(value) => ((value as u64) << 2) | TAG_PUSHI,
        Instruction::Pushreli(offset) => ((offset as u64) << 2) | TAG_PUSHRELI,
        Instruction::Jumpi(offset) => ((offset as u64) << 8) | (SUBTAG_JUMPI << 2) | TAG_SECOND_LEVEL,
        Instruction::Jumpzi(offset) => ((offset as u64) << 8) | (SUBTAG_JUMPZI << 2) | TAG_SECOND_LEVEL,
        Instruction::Trap(code) => (code << 8) | (SUBTAG_TRAP << 2) | TAG_SECOND_LEVEL,
        Instruction::Insn(opcode) => {
            (opcode.to_u64().expect("opcode fits in u64") << 8) | (SUBTAG_INSN << 2) | TAG_SECOND_LEVEL
        }
    };
    width.mask(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insn_round_trip() {
        for raw in 0..OPCODE_COUNT {
            let opcode = Opcode::from_u64(raw).unwrap();
            let word = encode(Instruction::Insn(opcode), Width::W32);
            assert_eq!(decode(word, Width::W32), Ok(Instruction::Insn(opcode)));
        }
    }

    #[test]
    fn pushi_round_trip() {
        for value in [0i64, 1, -1, i32::MAX as i64 / 2, i32::MIN as i64 / 2] {
            let word = encode(Instruction::Pushi(value), Width::W32);
            assert_eq!(decode(word, Width::W32), Ok(Instruction::Pushi(value)));
        }
    }

    #[test]
    fn calli_pushreli_jumpi_round_trip() {
        for offset in [0i64, 1, -1, 1000, -1000] {
            assert_eq!(
                decode(encode(Instruction::Calli(offset), Width::W64), Width::W64),
                Ok(Instruction::Calli(offset))
            );
            assert_eq!(
                decode(encode(Instruction::Pushreli(offset), Width::W64), Width::W64),
                Ok(Instruction::Pushreli(offset))
            );
            assert_eq!(
                decode(encode(Instruction::Jumpi(offset), Width::W64), Width::W64),
                Ok(Instruction::Jumpi(offset))
            );
            assert_eq!(
                decode(encode(Instruction::Jumpzi(offset), Width::W64), Width::W64),
                Ok(Instruction::Jumpzi(offset))
            );
        }
    }

    #[test]
    fn trap_round_trip() {
        let word = encode(Instruction::Trap(0), Width::W32);
        assert_eq!(decode(word, Width::W32), Ok(Instruction::Trap(0)));
    }

    #[test]
    fn invalid_opcode_past_table() {
        // raw opcode 54 and above is outside the 54-entry table.
        let word = (54u64 << 8) | (SUBTAG_INSN << 2) | TAG_SECOND_LEVEL;
        assert_eq!(decode(word, Width::W32), Err(BeeError::InvalidOpcode));
    }

    #[test]
    fn reserved_bits_must_be_zero() {
        let word = (1u64 << 4) | (SUBTAG_INSN << 2) | TAG_SECOND_LEVEL;
        assert_eq!(decode(word, Width::W32), Err(BeeError::InvalidOpcode));
    }

    #[test]
    fn mnemonic_lookup_round_trip() {
        for raw in 0..OPCODE_COUNT {
            let opcode = Opcode::from_u64(raw).unwrap();
            assert_eq!(Opcode::from_mnemonic(opcode.mnemonic()), Some(opcode));
        }
        assert_eq!(Opcode::from_mnemonic("not_a_mnemonic"), None);
    }
}
