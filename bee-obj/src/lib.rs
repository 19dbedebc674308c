//! The on-disk Bee object image (C7): a minimal, in-house analogue of a
//! relocatable object, not a full ELF writer. Carries everything the
//! simulator needs to load and run a program — instructions, initial data,
//! entry point, and the word width/endianness the instructions were
//! assembled for — without any section/symbol-table machinery.
//!
//! Grounded on the example workspace's `vexfile` crate: a `u32`-length-
//! prefixed data section followed by the raw instruction bytes, read and
//! written with `byteorder`. The container header itself is always
//! little-endian regardless of the VM width/endianness the instructions
//! were assembled for, since that choice is a property of the image's
//! payload, not of the container format.

use bee::{Endian, Width};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::prelude::*;
use std::io::{BufReader, BufWriter};
use std::path::Path;

const WIDTH_TAG_32: u8 = 0;
const WIDTH_TAG_64: u8 = 1;
const ENDIAN_TAG_LITTLE: u8 = 0;
const ENDIAN_TAG_BIG: u8 = 1;

#[derive(Debug, PartialEq)]
pub struct Image {
    width: Width,
    endian: Endian,
    entry: u64,
    data: Vec<u8>,
    instructions: Vec<u8>,
}

impl Image {
    pub fn new(width: Width, endian: Endian, entry: u64, data: Vec<u8>, instructions: Vec<u8>) -> Image {
        Image {
            width,
            endian,
            entry,
            data,
            instructions,
        }
    }

    pub fn width(&self) -> Width {
        self.width
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn entry(&self) -> u64 {
        self.entry
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..]
    }

    pub fn instructions(&self) -> &[u8] {
        &self.instructions[..]
    }
}

fn width_tag(width: Width) -> u8 {
    match width {
        Width::W32 => WIDTH_TAG_32,
        Width::W64 => WIDTH_TAG_64,
    }
}

fn width_from_tag(tag: u8) -> std::io::Result<Width> {
    match tag {
        WIDTH_TAG_32 => Ok(Width::W32),
        WIDTH_TAG_64 => Ok(Width::W64),
        _ => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "unrecognised width tag in bee object header",
        )),
    }
}

fn endian_tag(endian: Endian) -> u8 {
    match endian {
        Endian::Little => ENDIAN_TAG_LITTLE,
        Endian::Big => ENDIAN_TAG_BIG,
    }
}

fn endian_from_tag(tag: u8) -> std::io::Result<Endian> {
    match tag {
        ENDIAN_TAG_LITTLE => Ok(Endian::Little),
        ENDIAN_TAG_BIG => Ok(Endian::Big),
        _ => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "unrecognised endian tag in bee object header",
        )),
    }
}

pub fn read<R: Read>(reader: &mut R) -> std::io::Result<Image> {
    let width = width_from_tag(reader.read_u8()?)?;
    let endian = endian_from_tag(reader.read_u8()?)?;
    let entry = reader.read_u64::<LittleEndian>()?;
    let data_length = reader.read_u64::<LittleEndian>()?;
    let mut data = vec![0; data_length as usize];
    reader.read_exact(&mut data)?;

    let mut instructions = Vec::new();
    reader.read_to_end(&mut instructions)?;

    Ok(Image::new(width, endian, entry, data, instructions))
}

pub fn write<W: Write>(writer: &mut W, image: &Image) -> std::io::Result<()> {
    writer.write_u8(width_tag(image.width))?;
    writer.write_u8(endian_tag(image.endian))?;
    writer.write_u64::<LittleEndian>(image.entry)?;
    writer.write_u64::<LittleEndian>(image.data.len() as u64)?;
    writer.write_all(&image.data[..])?;
    writer.write_all(&image.instructions[..])?;
    Ok(())
}

pub trait ReadImageExt: Read + Sized {
    fn read_bee_image(&mut self) -> std::io::Result<Image> {
        read(self)
    }
}

impl<R: Read + Sized> ReadImageExt for R {}

pub trait WriteImageExt: Write + Sized {
    fn write_bee_image(&mut self, image: &Image) -> std::io::Result<()> {
        write(self, image)
    }
}

impl<W: Write + Sized> WriteImageExt for W {}

pub fn read_file<P: AsRef<Path>>(path: P) -> std::io::Result<Image> {
    BufReader::new(File::open(path)?).read_bee_image()
}

pub fn write_file<P: AsRef<Path>>(path: P, image: &Image) -> std::io::Result<()> {
    BufWriter::new(File::create(path)?).write_bee_image(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let image = Image::new(
            Width::W64,
            Endian::Little,
            0,
            vec![1, 2, 3, 4],
            vec![0xAA; 16],
        );
        let mut buf = Vec::new();
        write(&mut buf, &image).unwrap();
        let read_back = read(&mut &buf[..]).unwrap();
        assert_eq!(image, read_back);
    }

    #[test]
    fn rejects_bad_width_tag() {
        let mut buf = Vec::new();
        buf.push(7u8);
        assert!(read(&mut &buf[..]).is_err());
    }
}
