#[macro_use]
extern crate clap;

use bee::{Endian, Width};
use bee_sim::RunOptions;
use clap::{Arg, ArgGroup};

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error(transparent)]
    Sim(#[from] bee_sim::Error),
    #[error(transparent)]
    Clap(#[from] clap::Error),
}

fn main() -> Result<(), Error> {
    let matches = app_from_crate!()
        .arg(
            Arg::with_name("PROGRAM")
                .help("Runs a .beeobj image (carries its own width/endianness)")
                .index(1),
        )
        .arg(
            Arg::with_name("assembly")
                .short("a")
                .long("assembly")
                .takes_value(true)
                .value_name("ASSEMBLY")
                .help("Assembles and runs a Bee assembly source file"),
        )
        .group(
            ArgGroup::with_name("input")
                .args(&["PROGRAM", "assembly"])
                .required(true),
        )
        .arg(
            Arg::with_name("memory")
                .short("m")
                .long("memory")
                .takes_value(true)
                .value_name("BYTES")
                .default_value("1048576")
                .help("Sets the size of main memory, in bytes"),
        )
        .arg(
            Arg::with_name("stack")
                .long("stack")
                .takes_value(true)
                .value_name("WORDS")
                .default_value("4096")
                .help("Sets the data stack's depth, in words"),
        )
        .arg(
            Arg::with_name("rstack")
                .long("rstack")
                .takes_value(true)
                .value_name("WORDS")
                .default_value("4096")
                .help("Sets the return stack's depth, in words"),
        )
        .arg(
            Arg::with_name("width")
                .long("width")
                .takes_value(true)
                .possible_values(&["32", "64"])
                .default_value("64")
                .help("Word width to assemble for (ignored for -PROGRAM, which carries its own)"),
        )
        .arg(
            Arg::with_name("big-endian")
                .long("big-endian")
                .help("Assembles for big-endian (ignored for PROGRAM, which carries its own)"),
        )
        .arg(
            Arg::with_name("trace")
                .long("trace")
                .help("Prints every instruction to stderr before it executes"),
        )
        .arg(
            Arg::with_name("ARGS")
                .help("Program arguments, exposed to the VM via the argv trap functions")
                .multiple(true)
                .last(true),
        )
        .get_matches();

    let memory = value_t!(matches.value_of("memory"), u64).map_err(Error::Clap)?;
    let stack_words = value_t!(matches.value_of("stack"), u64).map_err(Error::Clap)?;
    let rstack_words = value_t!(matches.value_of("rstack"), u64).map_err(Error::Clap)?;
    let args = matches
        .values_of("ARGS")
        .map(|values| values.map(String::from).collect())
        .unwrap_or_default();

    let options = RunOptions {
        memory,
        stack_words,
        rstack_words,
        args,
        trace: matches.is_present("trace"),
    };

    let (_vm, exit) = match matches.value_of("PROGRAM") {
        Some(program) => bee_sim::run_object_file(program, &options)?,
        None => {
            let width = if matches.value_of("width") == Some("32") {
                Width::W32
            } else {
                Width::W64
            };
            let endian = if matches.is_present("big-endian") {
                Endian::Big
            } else {
                Endian::Little
            };
            let assembly = matches.value_of("assembly").unwrap();
            bee_sim::run_assembly_file(assembly, width, endian, &options)?
        }
    };

    println!("Exit condition: {:?}", exit);
    if let bee::ExitCondition::Halted(code) = exit {
        std::process::exit(code as i32);
    }

    Ok(())
}
