//! Loads a Bee object image (or assembles one from source) into a [`Vm`]
//! and runs it to completion, the way the reference `sim/bee` interpreter
//! and the example workspace's `vex` crate both glue "read an executable"
//! to "run it" behind a couple of library entry points a thin CLI calls.
//!
//! An [`Image`](bee_obj::Image) keeps its instructions and initial data as
//! two separate buffers; [`bee_asm::assemble`] places the data section
//! immediately after the instruction stream it sized, so loading one here
//! is just concatenating `instructions()` then `data()` into one flat
//! buffer at address 0 and handing `image.entry()` to [`Vm::load_image`].

mod error;

pub use error::Error;

use bee::{Endian, ExitCondition, Vm, Width};
use std::path::Path;

/// Sizing and runtime knobs for a simulated run. Word counts for the
/// stacks default to the reference interpreter's `BEE_DEFAULT_STACK_SIZE`
/// (4096 words each).
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub memory: u64,
    pub stack_words: u64,
    pub rstack_words: u64,
    pub args: Vec<String>,
    pub trace: bool,
}

impl Default for RunOptions {
    fn default() -> RunOptions {
        RunOptions {
            memory: 1024 * 1024,
            stack_words: 4096,
            rstack_words: 4096,
            args: Vec::new(),
            trace: false,
        }
    }
}

/// Concatenates an image's instructions and data into the one flat buffer
/// [`Vm::load_image`] expects, per the layout [`bee_asm::assemble`] lays
/// programs out in.
fn flatten(image: &bee_obj::Image) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(image.instructions().len() + image.data().len());
    bytes.extend_from_slice(image.instructions());
    bytes.extend_from_slice(image.data());
    bytes
}

fn build_vm(image: &bee_obj::Image, options: &RunOptions) -> Result<Vm, Error> {
    let mut vm = Vm::new(
        image.width(),
        image.endian(),
        options.memory,
        options.rstack_words,
        options.stack_words,
    );
    let bytes = flatten(image);
    vm.load_image(&bytes, image.entry()).map_err(|source| Error::Load {
        memory: options.memory,
        source,
    })?;
    if !options.args.is_empty() {
        let args: Vec<&str> = options.args.iter().map(String::as_str).collect();
        vm.setup_argv(&args).map_err(|source| Error::Load {
            memory: options.memory,
            source,
        })?;
    }
    Ok(vm)
}

/// Runs an already-assembled image to completion, optionally tracing
/// every instruction to stderr via [`bee_dis::disassemble_word`].
pub fn run_image(image: &bee_obj::Image, options: &RunOptions) -> Result<(Vm, ExitCondition), Error> {
    let mut vm = build_vm(image, options)?;
    let width = vm.width;
    let endian = vm.endian;
    let trace = options.trace;
    let exit = vm.run(|vm| {
        if trace {
            if let Ok(word) = vm.fetch_word(vm.registers.pc) {
                let text = bee_dis::disassemble_word(word, vm.registers.pc, width);
                eprintln!("{:08x}: {}\t[{}]", vm.registers.pc, text, endian_tag(endian));
            }
        }
        true
    });
    Ok((vm, exit))
}

fn endian_tag(endian: Endian) -> &'static str {
    match endian {
        Endian::Little => "le",
        Endian::Big => "be",
    }
}

/// Reads a `.beeobj` file from `path` and runs it.
pub fn run_object_file(path: impl AsRef<Path>, options: &RunOptions) -> Result<(Vm, ExitCondition), Error> {
    let path = path.as_ref();
    let image = bee_obj::read_file(path).map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })?;
    run_image(&image, options)
}

/// Assembles `path` as Bee assembly source and runs the result.
pub fn run_assembly_file(
    path: impl AsRef<Path>,
    width: Width,
    endian: Endian,
    options: &RunOptions,
) -> Result<(Vm, ExitCondition), Error> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })?;
    let (image, _source_map) = bee_asm::assemble(&source, width, endian).map_err(|source| Error::Assemble {
        path: path.to_owned(),
        source,
    })?;
    run_image(&image, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bee::encoding::{encode, Instruction, Opcode};

    fn small_image() -> bee_obj::Image {
        let mut instructions = Vec::new();
        for instruction in [
            Instruction::Pushi(2),
            Instruction::Pushi(3),
            Instruction::Insn(Opcode::Add),
            Instruction::Insn(Opcode::Break),
        ] {
            instructions.extend_from_slice(&(encode(instruction, Width::W32) as u32).to_le_bytes());
        }
        bee_obj::Image::new(Width::W32, Endian::Little, 0, Vec::new(), instructions)
    }

    #[test]
    fn runs_an_image_to_a_break() {
        let image = small_image();
        let options = RunOptions {
            memory: 4096,
            stack_words: 16,
            rstack_words: 16,
            ..RunOptions::default()
        };
        let (mut vm, exit) = run_image(&image, &options).unwrap();
        assert_eq!(exit, ExitCondition::Break);
        assert_eq!(vm.pop_d().unwrap(), 5);
    }

    #[test]
    fn assembling_and_running_a_source_program_round_trips() {
        let source = "\
.data
    buf: .block 4
.instructions
    pushi 9
    pushreli buf
    store1
    pushreli buf
    load1
    break
";
        let (image, _) = bee_asm::assemble(source, Width::W32, Endian::Little).unwrap();
        let options = RunOptions {
            memory: 4096,
            stack_words: 16,
            rstack_words: 16,
            ..RunOptions::default()
        };
        let (mut vm, exit) = run_image(&image, &options).unwrap();
        assert_eq!(exit, ExitCondition::Break);
        assert_eq!(vm.pop_d().unwrap(), 9);
    }

    #[test]
    fn image_too_large_for_memory_is_reported() {
        let image = small_image();
        let options = RunOptions {
            memory: 4,
            stack_words: 1,
            rstack_words: 1,
            ..RunOptions::default()
        };
        assert!(run_image(&image, &options).is_err());
    }
}
