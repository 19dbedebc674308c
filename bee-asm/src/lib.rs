//! Two-pass assembler for Bee assembly (C8, SPEC_FULL.md §REDESIGN/"Text
//! assembler"). A program is two mandatory sections, `.data` then
//! `.instructions`, in that order, each containing a list of directives or
//! mnemonics, one per line, with `#` comments and `label:` definitions —
//! grounded on the example workspace's `vasm` crate's overall shape
//! (library + `SourceMap` side channel + thin CLI), but with a hand-rolled
//! line/token scanner standing in for `pest`, since Bee's assembly grammar
//! has no register operands to justify a full parsing-expression grammar.
//!
//! ```text
//! .data
//!     buf: .block 64
//! .instructions
//!     pushreli buf
//!     load1
//!     break
//! ```

mod data;
mod error;
mod instructions;
mod int_util;
mod labels;
mod lexer;
mod source_map;

pub use error::Error;
pub use source_map::{SourceMap, SourceMapItem};

use bee::{Endian, Width};
use lexer::Line;

pub type Result<T> = std::result::Result<T, Error>;

const DATA_HEADER: &str = ".data";
const INSTRUCTIONS_HEADER: &str = ".instructions";

fn split_sections(lines: &[Line]) -> Result<(&[Line], &[Line])> {
    let data_start = lines
        .iter()
        .position(|line| line.tokens[0] == DATA_HEADER)
        .ok_or(Error::MissingDataSection)?;
    let instructions_start = lines
        .iter()
        .position(|line| line.tokens[0] == INSTRUCTIONS_HEADER)
        .ok_or(Error::MissingInstructionsSection)?;

    if data_start != 0 || instructions_start <= data_start {
        return Err(Error::MisplacedSection);
    }
    if lines[data_start..instructions_start]
        .iter()
        .skip(1)
        .any(|line| line.tokens[0] == DATA_HEADER || line.tokens[0] == INSTRUCTIONS_HEADER)
        || lines[instructions_start + 1..]
            .iter()
            .any(|line| line.tokens[0] == DATA_HEADER || line.tokens[0] == INSTRUCTIONS_HEADER)
    {
        return Err(Error::MisplacedSection);
    }

    Ok((
        &lines[data_start + 1..instructions_start],
        &lines[instructions_start + 1..],
    ))
}

/// Assembles `source` into an object [`bee_obj::Image`], placing the data
/// section's base address at `data_offset` for the purpose of resolving
/// `pushi <data label>` references. The instruction stream itself always
/// assembles as if loaded at address 0; `data_offset` is the caller's
/// promise about where the data section will actually end up relative to
/// that, e.g. when linking against a data section placed by some other
/// means. Most callers want [`assemble`] instead.
pub fn assemble_addressed(
    source: &str,
    width: Width,
    endian: Endian,
    data_offset: u64,
) -> Result<(bee_obj::Image, SourceMap)> {
    let lines = lexer::scan(source);
    let (data_lines, instruction_lines) = split_sections(&lines)?;

    let (data, data_labels) = data::process_data(data_lines, endian)?;
    let (instructions, _instr_labels, source_map) =
        instructions::process_instructions(instruction_lines, &data_labels, data_offset, width, endian)?;

    let image = bee_obj::Image::new(width, endian, 0, data, instructions);
    Ok((image, source_map))
}

/// Assembles `source` with the natural, self-contained layout: the
/// instruction stream at address 0, immediately followed by the data
/// section. `bee-sim` loads an [`bee_obj::Image`] produced this way by
/// concatenating `instructions()` then `data()` into one flat image and
/// handing it to `Vm::load_image` with `image.entry()` as the entry
/// point — the same address space `pushi <data label>` was resolved
/// against here.
pub fn assemble(source: &str, width: Width, endian: Endian) -> Result<(bee_obj::Image, SourceMap)> {
    let lines = lexer::scan(source);
    let (data_lines, instruction_lines) = split_sections(&lines)?;
    let data_offset = instructions::count_instructions(instruction_lines) * width.bytes();

    let (data, data_labels) = data::process_data(data_lines, endian)?;
    let (instructions, _instr_labels, source_map) =
        instructions::process_instructions(instruction_lines, &data_labels, data_offset, width, endian)?;

    let image = bee_obj::Image::new(width, endian, 0, data, instructions);
    Ok((image, source_map))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_a_small_program() {
        let source = "\
.data
    buf: .block 4
.instructions
    pushreli buf
    load1
    break
";
        let (image, map) = assemble(source, Width::W32, Endian::Little).unwrap();
        assert_eq!(image.data().len(), 4);
        assert_eq!(image.instructions().len(), 12);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn missing_data_section_is_an_error() {
        let err = assemble(".instructions\nnop\n", Width::W32, Endian::Little).unwrap_err();
        assert!(matches!(err, Error::MissingDataSection));
    }

    #[test]
    fn missing_instructions_section_is_an_error() {
        let err = assemble(".data\n.block 4\n", Width::W32, Endian::Little).unwrap_err();
        assert!(matches!(err, Error::MissingInstructionsSection));
    }

    #[test]
    fn sections_out_of_order_is_an_error() {
        let err = assemble(".instructions\nnop\n.data\n", Width::W32, Endian::Little).unwrap_err();
        assert!(matches!(err, Error::MisplacedSection));
    }

    #[test]
    fn data_section_is_placed_right_after_the_instruction_stream() {
        let source = "\
.data
    buf: .block 4
.instructions
    pushreli buf
    load1
    break
";
        let (image, _) = assemble(source, Width::W32, Endian::Little).unwrap();
        // Three one-word instructions precede the data section, so `buf`
        // resolves to byte 12 and the first instruction's relative offset
        // is 3 words.
        let first_word = Endian::Little.read_u32(&image.instructions()[..4]) as u64;
        assert_eq!(
            bee::encoding::decode(first_word, Width::W32).unwrap(),
            bee::encoding::Instruction::Pushreli(3)
        );
    }

    #[test]
    fn round_trips_through_the_object_image() {
        let source = ".data\n.instructions\npushi 42\nbreak\n";
        let (image, _) = assemble(source, Width::W64, Endian::Big).unwrap();
        let mut buf = Vec::new();
        bee_obj::write(&mut buf, &image).unwrap();
        let read_back = bee_obj::read(&mut &buf[..]).unwrap();
        assert_eq!(image, read_back);
    }
}
