#[macro_use]
extern crate num_derive;

pub mod encoding;
pub mod endian;
pub mod error;
pub mod interp;
pub mod memory;
pub mod registers;
pub mod trap;
pub mod vm;
pub mod width;

pub use encoding::{decode, encode, Instruction, Opcode};
pub use endian::Endian;
pub use error::{BeeError, ExitCondition, LoadError};
pub use registers::{RegisterId, Registers};
pub use vm::Vm;
pub use width::Width;
