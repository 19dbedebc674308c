use thiserror::Error;

/// A VM-throwable fault, carried as the on-stack error code (spec §7).
/// Values match the reference interpreter's negative error-code taxonomy
/// exactly; `as i64` on a variant yields the code a `throw`-unwound
/// handler would see on top of the data stack.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeeError {
    #[error("invalid opcode")]
    InvalidOpcode = -1,
    #[error("stack underflow")]
    StackUnderflow = -2,
    #[error("stack overflow")]
    StackOverflow = -3,
    #[error("unaligned address")]
    UnalignedAddress = -4,
    #[error("invalid trap library")]
    InvalidLibrary = -16,
    #[error("invalid trap function")]
    InvalidFunction = -17,
}

impl BeeError {
    /// The on-stack error code for this fault.
    pub fn code(self) -> i64 {
        match self {
            BeeError::InvalidOpcode => -1,
            BeeError::StackUnderflow => -2,
            BeeError::StackOverflow => -3,
            BeeError::UnalignedAddress => -4,
            BeeError::InvalidLibrary => -16,
            BeeError::InvalidFunction => -17,
        }
    }
}

/// Why a run of the interpreter loop stopped. Not an error: a normal
/// program exit, a debugger breakpoint, and an unhandled fault are all
/// expected outcomes a host must be prepared to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCondition {
    /// The VM halted via an unhandled `throw` (explicit or from an
    /// internal fault); the payload is the on-stack error code (0 for a
    /// deliberate zero `throw`, negative for a fault).
    Halted(i64),
    /// A `break` instruction executed; the debugger should stop here.
    Break,
    /// The host's event-tick callback requested a stop between
    /// instructions; not a VM-level halt, no exit code is defined.
    HostStopped,
}

/// Failures that can occur while a host builds or loads a VM, as opposed to
/// faults the VM itself throws during execution.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("program image of {0} bytes does not fit in {1}-byte memory")]
    ImageTooLarge(usize, u64),
    #[error("program image length {0} is not a multiple of the word size")]
    Misaligned(usize),
    #[error("memory mount failed: {0:?}")]
    Mount(crate::memory::region::MountError),
}
