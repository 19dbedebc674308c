//! Assembly-time errors. Host-facing, not VM-throwable — `thiserror`-derived
//! per the crate-boundary error convention in SPEC_FULL.md §7.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("line {line}: {message}")]
    Syntax { line: u32, message: String },

    #[error("line {line}: undefined label '{label}'")]
    UndefinedLabel { line: u32, label: String },

    #[error("line {line}: label '{label}' is already defined")]
    DuplicateLabel { line: u32, label: String },

    #[error("missing '.data' section")]
    MissingDataSection,

    #[error("missing '.instructions' section")]
    MissingInstructionsSection,

    #[error("'.data' and '.instructions' sections must appear in that order, each exactly once")]
    MisplacedSection,
}

pub type Result<T> = std::result::Result<T, Error>;
