//! Label tables. Bee assembly has two independent label namespaces, one
//! per section, mirroring the data/instruction split in `vasm::labels`:
//! a `.data` label names a byte offset into the data blob, an
//! `.instructions` label names a byte address in the instruction stream.

use std::collections::HashMap;

pub type LabelMap = HashMap<String, u64>;

pub fn strip_colon(token: &str) -> Option<&str> {
    token.strip_suffix(':')
}
