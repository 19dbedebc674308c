//! Debugger target description for the Bee VM (C10, spec §6/§9). Three
//! independent pieces, each a thin projection of the root crate's own
//! types onto a debugging concern rather than a parallel implementation:
//!
//! - [`registers`] — the register layout table and its debugger-facing
//!   names.
//! - [`breakpoint`] — the single-instruction breakpoint pattern a debugger
//!   plants over code.
//! - [`single_step`] — the single-step oracle: decode and predict control
//!   flow without executing.
//! - [`record`] — the record oracle: execute via the real interpreter
//!   while recording a register trace.

pub mod breakpoint;
pub mod record;
pub mod registers;
pub mod single_step;

pub use record::{record, RecordedStep};
pub use registers::{register_name, RegisterId, REGISTER_LAYOUT};
pub use single_step::{preview, ControlFlow, StepPreview};
