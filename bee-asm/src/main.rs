#[macro_use]
extern crate clap;

use bee::{Endian, Width};
use clap::Arg;
use std::fs::File;
use std::io::prelude::*;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Debug)]
enum IOErrorContext {
    ReadInput,
    WriteOutput,
}

#[derive(Debug)]
enum Error {
    Asm(bee_asm::Error),
    Io(std::io::Error, IOErrorContext, PathBuf),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err, context, path) => write!(
                f,
                "{} file \"{}\" failed: {}",
                match context {
                    IOErrorContext::ReadInput => "Reading input",
                    IOErrorContext::WriteOutput => "Writing output",
                },
                path.display(),
                err
            ),
            Error::Asm(err) => write!(f, "Assembling input failed: {}", err),
        }
    }
}

fn main() {
    let matches = app_from_crate!()
        .arg(
            Arg::with_name("INPUT")
                .help("Sets the input file to assemble")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .value_name("OUTPUT")
                .help("Sets the object image file to write to"),
        )
        .arg(
            Arg::with_name("width")
                .long("width")
                .takes_value(true)
                .possible_values(&["32", "64"])
                .default_value("64")
                .help("Sets the word width of the assembled program"),
        )
        .arg(
            Arg::with_name("big_endian")
                .long("big-endian")
                .help("Assembles instructions and data as big-endian (default little-endian)"),
        )
        .get_matches();

    let input = matches.value_of("INPUT").unwrap();
    let output = matches.value_of("output");
    let width = match matches.value_of("width").unwrap() {
        "32" => Width::W32,
        _ => Width::W64,
    };
    let endian = if matches.is_present("big_endian") {
        Endian::Big
    } else {
        Endian::Little
    };

    if let Err(err) = run(input, output, width, endian) {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}

fn run(input: &str, output: Option<&str>, width: Width, endian: Endian) -> Result<(), Error> {
    let input_path = Path::new(input);

    let input_file = File::open(input_path)
        .map_err(|err| Error::Io(err, IOErrorContext::ReadInput, input_path.to_owned()))?;
    let mut source = String::new();
    BufReader::new(input_file)
        .read_to_string(&mut source)
        .map_err(|err| Error::Io(err, IOErrorContext::ReadInput, input_path.to_owned()))?;

    let (image, _source_map) = bee_asm::assemble(&source, width, endian).map_err(Error::Asm)?;

    let output_path: PathBuf = output
        .map(PathBuf::from)
        .unwrap_or_else(|| input_path.with_extension("beeobj"));

    bee_obj::write_file(&output_path, &image)
        .map_err(|err| Error::Io(err, IOErrorContext::WriteOutput, output_path))?;

    Ok(())
}
