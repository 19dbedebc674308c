//! `.data` section: static bytes loaded into memory alongside the program,
//! per SPEC_FULL.md's Design Note on keeping data and instructions wire-
//! formatted together (C7). Directives mirror `vasm`'s `.block`/`.byte`/
//! `.half`/`.word` repertoire; `.half` stays since Bee has halfword-
//! granular `load2`/`store2`, unlike `vasm`'s register machine which has
//! no such thing.

use crate::error::Error;
use crate::int_util::parse_int;
use crate::labels::{strip_colon, LabelMap};
use crate::lexer::Line;
use bee::Endian;

pub fn process_data(lines: &[Line], endian: Endian) -> Result<(Vec<u8>, LabelMap), Error> {
    let mut data = Vec::new();
    let mut labels = LabelMap::new();

    for line in lines {
        let mut tokens = &line.tokens[..];

        if let Some(label) = strip_colon(&tokens[0]) {
            if labels.insert(label.to_owned(), data.len() as u64).is_some() {
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

        let directive = tokens[0].as_str();
        let args = &tokens[1..];
        match directive {
            ".block" => {
                let size = parse_size(args, line.number)?;
                data.resize(data.len() + size as usize, 0u8);
            }
            ".byte" => push_ints(&mut data, args, line.number, 1, endian)?,
            ".half" => push_ints(&mut data, args, line.number, 2, endian)?,
            ".word" => push_ints(&mut data, args, line.number, 4, endian)?,
            other => {
                return Err(Error::Syntax {
                    line: line.number,
                    message: format!("unrecognised data directive '{}'", other),
                })
            }
        }
    }

    Ok((data, labels))
}

fn parse_size(args: &[String], line: u32) -> Result<u64, Error> {
    if args.len() != 1 {
        return Err(Error::Syntax {
            line,
            message: "'.block' takes exactly one size argument".to_owned(),
        });
    }
    let value = parse_int(&args[0]).ok_or_else(|| Error::Syntax {
        line,
        message: format!("'{}' is not a valid integer", args[0]),
    })?;
    if value < 0 {
        return Err(Error::Syntax {
            line,
            message: "'.block' size cannot be negative".to_owned(),
        });
    }
    Ok(value as u64)
}

fn push_ints(
    data: &mut Vec<u8>,
    args: &[String],
    line: u32,
    width: usize,
    endian: Endian,
) -> Result<(), Error> {
    if args.is_empty() {
        return Err(Error::Syntax {
            line,
            message: "directive needs at least one integer".to_owned(),
        });
    }
    for arg in args {
        let value = parse_int(arg).ok_or_else(|| Error::Syntax {
            line,
            message: format!("'{}' is not a valid integer", arg),
        })?;
        let mut buf = [0u8; 8];
        match width {
            1 => buf[0] = value as u8,
            2 => endian.write_u16(&mut buf[..2], value as u16),
            4 => endian.write_u32(&mut buf[..4], value as u32),
            _ => unreachable!("data element widths are 1, 2, or 4 bytes"),
        }
        data.extend_from_slice(&buf[..width]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(src: &str) -> Vec<Line> {
        crate::lexer::scan(src)
    }

    #[test]
    fn block_reserves_zeroed_space() {
        let (data, _) = process_data(&lines(".block 4"), Endian::Little).unwrap();
        assert_eq!(data, vec![0, 0, 0, 0]);
    }

    #[test]
    fn byte_half_word_pack_little_endian() {
        let (data, _) = process_data(&lines(".byte 0xFF\n.half 0x0102\n.word -1"), Endian::Little).unwrap();
        assert_eq!(data, vec![0xFF, 0x02, 0x01, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn half_word_pack_big_endian() {
        let (data, _) = process_data(&lines(".half 0x0102"), Endian::Big).unwrap();
        assert_eq!(data, vec![0x01, 0x02]);
    }

    #[test]
    fn label_records_current_offset() {
        let (_, labels) = process_data(&lines(".word 1\nbuf:\n.block 8"), Endian::Little).unwrap();
        assert_eq!(labels.get("buf"), Some(&4));
    }

    #[test]
    fn label_on_same_line_as_directive() {
        let (_, labels) = process_data(&lines("buf: .word 1, 2"), Endian::Little).unwrap();
        assert_eq!(labels.get("buf"), Some(&0));
    }

    #[test]
    fn duplicate_label_is_an_error() {
        let err = process_data(&lines("a:\na:\n"), Endian::Little).unwrap_err();
        assert!(matches!(err, Error::DuplicateLabel { .. }));
    }
}
