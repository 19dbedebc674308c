//! `.instructions` section: two-pass assembly of mnemonics into C3-encoded
//! words, per SPEC_FULL.md §8's assembler/disassembler round-trip
//! property. Bee instructions are always exactly one word, unlike the
//! register machine `vasm` targets, so pass one only needs to track
//! addresses and label definitions; there is no instruction-count
//! expansion to account for.

use crate::error::Error;
use crate::int_util::parse_int;
use crate::labels::{strip_colon, LabelMap};
use crate::lexer::Line;
use crate::source_map::{SourceMap, SourceMapItem};
use bee::encoding::{encode, Instruction, Opcode};
use bee::{Endian, Width};

#[derive(Debug, Clone)]
enum Operand {
    Int(i64),
    Label(String),
}

#[derive(Debug, Clone)]
enum ParsedOp {
    Bare(Opcode),
    Calli(Operand),
    Pushi(Operand),
    Pushreli(Operand),
    Jumpi(Operand),
    Jumpzi(Operand),
    Trap(i64),
}

struct PendingInstruction {
    line: u32,
    address: u64,
    op: ParsedOp,
}

fn parse_operand(token: &str) -> Operand {
    match parse_int(token) {
        Some(value) => Operand::Int(value),
        None => Operand::Label(token.to_owned()),
    }
}

fn parse_op(tokens: &[String], line: u32) -> Result<ParsedOp, Error> {
    let mnemonic = tokens[0].as_str();
    let args = &tokens[1..];

    let one_operand = |args: &[String]| -> Result<Operand, Error> {
        if args.len() != 1 {
            return Err(Error::Syntax {
                line,
                message: format!("'{}' takes exactly one operand", mnemonic),
            });
        }
        Ok(parse_operand(&args[0]))
    };

    match mnemonic {
        "calli" => Ok(ParsedOp::Calli(one_operand(args)?)),
        "pushi" => Ok(ParsedOp::Pushi(one_operand(args)?)),
        "pushreli" => Ok(ParsedOp::Pushreli(one_operand(args)?)),
        "jumpi" => Ok(ParsedOp::Jumpi(one_operand(args)?)),
        "jumpzi" => Ok(ParsedOp::Jumpzi(one_operand(args)?)),
        "trap" => {
            if args.len() != 1 {
                return Err(Error::Syntax {
                    line,
                    message: "'trap' takes exactly one library-code operand".to_owned(),
                });
            }
            let code = parse_int(&args[0]).ok_or_else(|| Error::Syntax {
                line,
                message: format!("'{}' is not a valid integer", args[0]),
            })?;
            Ok(ParsedOp::Trap(code))
        }
        _ => {
            if !args.is_empty() {
                return Err(Error::Syntax {
                    line,
                    message: format!("'{}' takes no operands", mnemonic),
                });
            }
            Opcode::from_mnemonic(mnemonic)
                .map(ParsedOp::Bare)
                .ok_or_else(|| Error::Syntax {
                    line,
                    message: format!("unrecognised mnemonic '{}'", mnemonic),
                })
        }
    }
}

fn branch_offset(instr_address: u64, target: u64, word_bytes: u64) -> i64 {
    (target as i64 - instr_address as i64) / word_bytes as i64
}

/// Counts how many instruction words `lines` will assemble to, without
/// resolving any operand. Every Bee instruction is exactly one word, so
/// this is just a count of non-label-only lines — cheap enough to run
/// before the real pass so the caller can place the data section right
/// after the instruction stream it's sized against.
pub fn count_instructions(lines: &[Line]) -> u64 {
    lines
        .iter()
        .filter(|line| match strip_colon(&line.tokens[0]) {
            Some(_) => line.tokens.len() > 1,
            None => true,
        })
        .count() as u64
}

pub fn process_instructions(
    lines: &[Line],
    data_labels: &LabelMap,
    data_offset: u64,
    width: Width,
    endian: Endian,
) -> Result<(Vec<u8>, LabelMap, SourceMap), Error> {
    let word_bytes = width.bytes();
    let mut instr_labels = LabelMap::new();
    let mut pending = Vec::new();
    let mut address = 0u64;

    for line in lines {
        let mut tokens = &line.tokens[..];

        if let Some(label) = strip_colon(&tokens[0]) {
            if instr_labels.insert(label.to_owned(), address).is_some() {
                return Err(Error::DuplicateLabel {
                    line: line.number,
                    label: label.to_owned(),
                });
            }
            tokens = &tokens[1..];
            if tokens.is_empty() {
                continue;
            }
        }

        let op = parse_op(tokens, line.number)?;
        pending.push(PendingInstruction {
            line: line.number,
            address,
            op,
        });
        address += word_bytes;
    }

    let mut bytes = Vec::with_capacity(pending.len() * word_bytes as usize);
    let mut source_map = SourceMap::with_capacity(pending.len());

    for instr in &pending {
        let resolve = |operand: &Operand| -> Result<u64, Error> {
            match operand {
                Operand::Int(v) => Ok(*v as u64),
                Operand::Label(name) => instr_labels
                    .get(name)
                    .copied()
                    .or_else(|| data_labels.get(name).map(|offset| offset + data_offset))
                    .ok_or_else(|| Error::UndefinedLabel {
                        line: instr.line,
                        label: name.clone(),
                    }),
            }
        };

        let instruction = match &instr.op {
            ParsedOp::Bare(opcode) => Instruction::Insn(*opcode),
            ParsedOp::Calli(operand) => {
                Instruction::Calli(branch_offset(instr.address, resolve(operand)?, word_bytes))
            }
            ParsedOp::Pushreli(operand) => {
                Instruction::Pushreli(branch_offset(instr.address, resolve(operand)?, word_bytes))
            }
            ParsedOp::Jumpi(operand) => {
                Instruction::Jumpi(branch_offset(instr.address, resolve(operand)?, word_bytes))
            }
            ParsedOp::Jumpzi(operand) => {
                Instruction::Jumpzi(branch_offset(instr.address, resolve(operand)?, word_bytes))
            }
            ParsedOp::Pushi(operand) => Instruction::Pushi(resolve(operand)? as i64),
            ParsedOp::Trap(code) => Instruction::Trap(*code as u64),
        };

        let word = encode(instruction, width);
        let mut buf = [0u8; 8];
        match width {
            Width::W32 => endian.write_u32(&mut buf[..4], word as u32),
            Width::W64 => endian.write_u64(&mut buf[..8], word),
        }
        bytes.extend_from_slice(&buf[..word_bytes as usize]);
        source_map.push(SourceMapItem {
            start_line: instr.line,
            line_count: 1,
        });
    }

    Ok((bytes, instr_labels, source_map))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(src: &str) -> Vec<Line> {
        crate::lexer::scan(src)
    }

    #[test]
    fn bare_mnemonics_encode_insn_words() {
        let (bytes, _, map) =
            process_instructions(&lines("nop\nbreak"), &LabelMap::new(), 0, Width::W32, Endian::Little).unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn forward_label_reference_resolves() {
        let source = "pushreli done\ncatch\npushi 1\nthrow\ndone: break";
        let (bytes, labels, _) =
            process_instructions(&lines(source), &LabelMap::new(), 0, Width::W32, Endian::Little).unwrap();
        assert_eq!(labels.get("done"), Some(&16));
        assert_eq!(bytes.len(), 20);
    }

    #[test]
    fn undefined_label_is_an_error() {
        let err = process_instructions(
            &lines("jumpi nowhere"),
            &LabelMap::new(),
            0,
            Width::W32,
            Endian::Little,
        )
        .unwrap_err();
        assert!(matches!(err, Error::UndefinedLabel { .. }));
    }

    #[test]
    fn pushi_can_reference_a_data_label() {
        let mut data_labels = LabelMap::new();
        data_labels.insert("buf".to_owned(), 4);
        let (bytes, _, _) =
            process_instructions(&lines("pushi buf"), &data_labels, 1024, Width::W32, Endian::Little).unwrap();
        let word = Endian::Little.read_u32(&bytes);
        assert_eq!(
            bee::encoding::decode(word as u64, Width::W32).unwrap(),
            Instruction::Pushi(1028)
        );
    }

    #[test]
    fn unknown_mnemonic_is_a_syntax_error() {
        let err = process_instructions(&lines("frobnicate"), &LabelMap::new(), 0, Width::W32, Endian::Little)
            .unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }));
    }
}
