//! Associates each assembled instruction word with the source line(s) it
//! came from, mirroring `vasm::source_map`. Every Bee instruction is
//! exactly one word, so `line_count` is always 1 here — the field stays
//! for parity with the format and in case a future shorthand mnemonic
//! ever expands to more than one word.

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SourceMapItem {
    pub start_line: u32,
    pub line_count: u32,
}

pub type SourceMap = Vec<SourceMapItem>;
