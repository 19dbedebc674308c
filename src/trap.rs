//! Trap / libc bridge (C5, spec §4.5).
//!
//! A single top-level library, `TRAP_LIBC`, exposes host POSIX-style
//! primitives to VM programs. The function code is popped from the data
//! stack by the interpreter before dispatch; this module only implements
//! the dispatch table and the marshalling between VM words and host types.

use crate::error::BeeError;
use crate::memory::{Storage, StorageMut};
use crate::width::Width;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::MetadataExt;

pub const TRAP_LIBC: u64 = 0;

pub const STDIN: u64 = 0;
pub const STDOUT: u64 = 1;
pub const STDERR: u64 = 2;

pub const O_RDONLY: u64 = 0;
pub const O_WRONLY: u64 = 1;
pub const O_RDWR: u64 = 2;
pub const O_CREAT: u64 = 0o100;
pub const O_TRUNC: u64 = 0o1000;

pub const SEEK_SET: u64 = 0;
pub const SEEK_CUR: u64 = 1;
pub const SEEK_END: u64 = 2;

/// A `TRAP_LIBC` function code, in the order named by spec §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapFunction {
    Argc,
    Argv,
    Strlen,
    Strncpy,
    Open,
    Close,
    Read,
    Write,
    Lseek,
    Fdatasync,
    Rename,
    Remove,
    FileSize,
    ResizeFile,
    FileStatus,
}

impl TrapFunction {
    pub fn from_code(code: u64) -> Option<TrapFunction> {
        use TrapFunction::*;
        [
            Argc, Argv, Strlen, Strncpy, Open, Close, Read, Write, Lseek, Fdatasync, Rename,
            Remove, FileSize, ResizeFile, FileStatus,
        ]
        .get(code as usize)
        .copied()
    }
}

/// Host-side file-descriptor table backing the trap bridge. Descriptors
/// 0/1/2 are wired to process stdin/stdout/stderr; anything `open`ed gets
/// the next free slot, mirroring a small POSIX-like fd table rather than
/// going through `std::fs::File` globally per call.
#[derive(Default)]
pub struct TrapHost {
    files: Vec<Option<File>>,
}

impl TrapHost {
    pub fn new() -> TrapHost {
        Default::default()
    }

    fn alloc_fd(&mut self, file: File) -> u64 {
        for (i, slot) in self.files.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(file);
                return (i + 3) as u64;
            }
        }
        self.files.push(Some(file));
        (self.files.len() + 2) as u64
    }

    fn get_mut(&mut self, fd: u64) -> Option<&mut File> {
        if fd < 3 {
            return None;
        }
        self.files
            .get_mut((fd - 3) as usize)
            .and_then(|slot| slot.as_mut())
    }
}

/// Reads a NUL-terminated string starting at `address`.
fn read_cstr(storage: &dyn Storage, address: u64) -> Result<Vec<u8>, BeeError> {
    let mut bytes = Vec::new();
    let mut addr = address;
    loop {
        let byte = storage
            .read_u8(addr)
            .map_err(|_| BeeError::InvalidFunction)?;
        if byte == 0 {
            return Ok(bytes);
        }
        bytes.push(byte);
        addr += 1;
    }
}

/// Reads a duword (two words, low pushed first / popped last) as a signed
/// 64-bit host offset.
fn read_duword(width: Width, low: u64, high: u64) -> i64 {
    match width {
        Width::W64 => low as i64,
        Width::W32 => ((high as i64) << 32) | (low as i64 & 0xFFFF_FFFF),
    }
}

fn split_duword(width: Width, value: i64) -> (u64, u64) {
    match width {
        Width::W64 => (value as u64, 0),
        Width::W32 => (value as u64 & 0xFFFF_FFFF, ((value as u64) >> 32) & 0xFFFF_FFFF),
    }
}

/// The VM-visible argc/argv region set up by [`crate::vm::Vm::setup_argv`].
pub struct ArgvInfo {
    pub argc: u64,
    pub argv_base: u64,
}

/// Executes one `TRAP_LIBC` call: pops the function code's arguments from
/// the data stack, invokes the matching host primitive, pushes results.
pub fn dispatch(vm: &mut crate::vm::Vm, function_code: u64) -> Result<(), BeeError> {
    let function = TrapFunction::from_code(function_code).ok_or(BeeError::InvalidFunction)?;
    let width = vm.width;
    match function {
        TrapFunction::Argc => {
            let argc = vm.argv_info.argc;
            vm.push_d(argc)?;
        }
        TrapFunction::Argv => {
            let argv_base = vm.argv_info.argv_base;
            vm.push_d(vm.width.mask(argv_base + vm.width.bytes()))?;
        }
        TrapFunction::Strlen => {
            let address = vm.pop_d()?;
            let len = read_cstr(&vm.memory, address)?.len() as u64;
            vm.push_d(len)?;
        }
        TrapFunction::Strncpy => {
            let n = vm.pop_d()?;
            let src = vm.pop_d()?;
            let dst = vm.pop_d()?;
            let bytes = read_cstr(&vm.memory, src)?;
            let copy_len = (bytes.len() as u64).min(n);
            for i in 0..copy_len {
                vm.memory
                    .write_u8(dst + i, bytes[i as usize])
                    .map_err(|_| BeeError::InvalidFunction)?;
            }
            vm.push_d(dst)?;
        }
        TrapFunction::Open => {
            let flags = vm.pop_d()?;
            let path_addr = vm.pop_d()?;
            let path_bytes = read_cstr(&vm.memory, path_addr)?;
            let path = String::from_utf8_lossy(&path_bytes).into_owned();
            let mut options = OpenOptions::new();
            match flags & 0b11 {
                O_RDONLY => {
                    options.read(true);
                }
                O_WRONLY => {
                    options.write(true);
                }
                _ => {
                    options.read(true).write(true);
                }
            }
            if flags & O_CREAT != 0 {
                options.create(true);
            }
            if flags & O_TRUNC != 0 {
                options.truncate(true);
            }
            let fd = match options.open(&path) {
                Ok(file) => vm.trap_host.alloc_fd(file) as i64,
                Err(_) => -1,
            };
            vm.push_d(fd as u64)?;
        }
        TrapFunction::Close => {
            let fd = vm.pop_d()?;
            let status = if fd >= 3 && (fd - 3) < vm.trap_host.files.len() as u64 {
                vm.trap_host.files[(fd - 3) as usize] = None;
                0
            } else {
                -1
            };
            vm.push_d(status as u64)?;
        }
        TrapFunction::Read => {
            let fd = vm.pop_d()?;
            let n = vm.pop_d()?;
            let buf_addr = vm.pop_d()?;
            let n_read = read_fd(&mut vm.trap_host, fd, &mut vm.memory, buf_addr, n).unwrap_or(-1);
            vm.push_d(n_read as u64)?;
        }
        TrapFunction::Write => {
            let fd = vm.pop_d()?;
            let n = vm.pop_d()?;
            let buf_addr = vm.pop_d()?;
            let n_written = write_fd(&mut vm.trap_host, fd, &vm.memory, buf_addr, n).unwrap_or(-1);
            vm.push_d(n_written as u64)?;
        }
        TrapFunction::Lseek => {
            let whence = vm.pop_d()?;
            let off_high = vm.pop_d()?;
            let off_low = vm.pop_d()?;
            let fd = vm.pop_d()?;
            let offset = read_duword(width, off_low, off_high);
            let result = vm
                .trap_host
                .get_mut(fd)
                .and_then(|file| {
                    let pos = match whence {
                        SEEK_SET => SeekFrom::Start(offset as u64),
                        SEEK_CUR => SeekFrom::Current(offset),
                        _ => SeekFrom::End(offset),
                    };
                    file.seek(pos).ok()
                })
                .map(|p| p as i64)
                .unwrap_or(-1);
            let (low, high) = split_duword(width, result);
            vm.push_d(low)?;
            vm.push_d(high)?;
        }
        TrapFunction::Fdatasync => {
            let fd = vm.pop_d()?;
            let status = vm
                .trap_host
                .get_mut(fd)
                .map(|file| if file.sync_data().is_ok() { 0 } else { -1 })
                .unwrap_or(-1);
            vm.push_d(status as u64)?;
        }
        TrapFunction::Rename => {
            let to_addr = vm.pop_d()?;
            let from_addr = vm.pop_d()?;
            let from = String::from_utf8_lossy(&read_cstr(&vm.memory, from_addr)?).into_owned();
            let to = String::from_utf8_lossy(&read_cstr(&vm.memory, to_addr)?).into_owned();
            let status = if std::fs::rename(from, to).is_ok() { 0 } else { -1 };
            vm.push_d(status as u64)?;
        }
        TrapFunction::Remove => {
            let path_addr = vm.pop_d()?;
            let path = String::from_utf8_lossy(&read_cstr(&vm.memory, path_addr)?).into_owned();
            let status = if std::fs::remove_file(path).is_ok() { 0 } else { -1 };
            vm.push_d(status as u64)?;
        }
        TrapFunction::FileSize => {
            let fd = vm.pop_d()?;
            let (size, status) = vm
                .trap_host
                .get_mut(fd)
                .and_then(|file| file.metadata().ok())
                .map(|m| (m.size() as i64, 0i64))
                .unwrap_or((0, -1));
            let (low, high) = split_duword(width, size);
            vm.push_d(low)?;
            vm.push_d(high)?;
            vm.push_d(status as u64)?;
        }
        TrapFunction::ResizeFile => {
            let size_high = vm.pop_d()?;
            let size_low = vm.pop_d()?;
            let fd = vm.pop_d()?;
            let size = read_duword(width, size_low, size_high);
            let status = vm
                .trap_host
                .get_mut(fd)
                .map(|file| if file.set_len(size as u64).is_ok() { 0 } else { -1 })
                .unwrap_or(-1);
            vm.push_d(status as u64)?;
        }
        TrapFunction::FileStatus => {
            let fd = vm.pop_d()?;
            let (mode, status) = vm
                .trap_host
                .get_mut(fd)
                .and_then(|file| file.metadata().ok())
                .map(|m| (m.mode() as i64, 0i64))
                .unwrap_or((0, -1));
            vm.push_d(mode as u64)?;
            vm.push_d(status as u64)?;
        }
    }
    Ok(())
}

fn read_fd(
    host: &mut TrapHost,
    fd: u64,
    storage: &mut dyn StorageMut,
    buf_addr: u64,
    n: u64,
) -> Option<i64> {
    let mut buf = vec![0u8; n as usize];
    let read = if fd == STDIN {
        std::io::stdin().read(&mut buf).ok()?
    } else {
        host.get_mut(fd)?.read(&mut buf).ok()?
    };
    for (i, byte) in buf[..read].iter().enumerate() {
        storage.write_u8(buf_addr + i as u64, *byte).ok()?;
    }
    Some(read as i64)
}

fn write_fd(
    host: &mut TrapHost,
    fd: u64,
    storage: &dyn Storage,
    buf_addr: u64,
    n: u64,
) -> Option<i64> {
    let mut buf = vec![0u8; n as usize];
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte = storage.read_u8(buf_addr + i as u64).ok()?;
    }
    let written = match fd {
        STDOUT => {
            std::io::stdout().write_all(&buf).ok()?;
            buf.len()
        }
        STDERR => {
            std::io::stderr().write_all(&buf).ok()?;
            buf.len()
        }
        _ => host.get_mut(fd)?.write(&buf).ok()?,
    };
    Some(written as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trap_function_order_matches_spec() {
        assert_eq!(TrapFunction::from_code(0), Some(TrapFunction::Argc));
        assert_eq!(TrapFunction::from_code(2), Some(TrapFunction::Strlen));
        assert_eq!(TrapFunction::from_code(14), Some(TrapFunction::FileStatus));
        assert_eq!(TrapFunction::from_code(15), None);
    }

    #[test]
    fn duword_round_trip_w32() {
        let (low, high) = split_duword(Width::W32, -5);
        assert_eq!(read_duword(Width::W32, low, high), -5);
        let (low, high) = split_duword(Width::W32, 1 << 40);
        assert_eq!(read_duword(Width::W32, low, high), 1 << 40);
    }
}
