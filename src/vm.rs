//! Ties together C1–C5: registers, memory, and the trap bridge, as the one
//! explicit value every interpreter routine operates on (Design Note,
//! "Global CPU state in the source").

use crate::endian::Endian;
use crate::error::{BeeError, ExitCondition, LoadError};
use crate::memory::region::RegionMemory;
use crate::memory::{LinearMemory, Storage, StorageMut};
use crate::registers::Registers;
use crate::trap::{ArgvInfo, TrapHost};
use crate::width::Width;

pub const MAIN_REGION: &str = "main";
pub const ARGV_REGION: &str = "argv";

/// The fixed high virtual address the argv region is mounted at (spec §6).
/// Chosen well above any reasonable main-memory size for either word
/// width, mirroring the reference interpreter's high-sentinel convention.
pub const DEFAULT_ARGV_BASE: u64 = 0xFFFF_0000;

pub struct Vm {
    pub registers: Registers,
    pub width: Width,
    pub endian: Endian,
    pub memory: RegionMemory,
    pub trap_host: TrapHost,
    pub argv_info: ArgvInfo,
    pub instruction_count: u64,
}

impl Vm {
    /// Builds a VM with `msize` bytes of main memory, a stack region
    /// carved out of it per `ssize`/`dsize` (in words), and `pc` at 0.
    /// The host still needs to load a program image and, if it wants
    /// argv support, call [`Vm::setup_argv`].
    pub fn new(width: Width, endian: Endian, msize: u64, ssize: u64, dsize: u64) -> Vm {
        let mut memory = RegionMemory::new();
        memory
            .mount(0, MAIN_REGION, LinearMemory::new(msize))
            .expect("fresh VM: main region never overlaps anything");

        let mut registers = Registers::default();
        registers.m0 = 0;
        registers.msize = msize;
        // Stacks are carved from the tail of main memory, return stack
        // first then data stack, leaving the program image at the front.
        let s0 = msize - ssize * width.bytes() - dsize * width.bytes();
        registers.s0 = s0;
        registers.ssize = ssize;
        registers.d0 = s0 + ssize * width.bytes();
        registers.dsize = dsize;

        Vm {
            registers,
            width,
            endian,
            memory,
            trap_host: TrapHost::new(),
            argv_info: ArgvInfo {
                argc: 0,
                argv_base: DEFAULT_ARGV_BASE,
            },
            instruction_count: 0,
        }
    }

    /// Loads `image` at the front of main memory and sets `pc` to `entry`.
    pub fn load_image(&mut self, image: &[u8], entry: u64) -> Result<(), LoadError> {
        if image.len() as u64 > self.registers.s0 {
            return Err(LoadError::ImageTooLarge(image.len(), self.registers.s0));
        }
        if image.len() % self.width.bytes() as usize != 0 {
            return Err(LoadError::Misaligned(image.len()));
        }
        let main = self
            .memory
            .borrow_slice_mut(0, image.len() as u64)
            .expect("image fits within the main region by construction");
        main.copy_from_slice(image);
        self.registers.pc = entry;
        Ok(())
    }

    /// Mounts the argv region at [`DEFAULT_ARGV_BASE`] and writes the
    /// layout described in spec §6: argc, argv pointers, a NUL pointer
    /// terminator, then the packed NUL-terminated strings.
    pub fn setup_argv(&mut self, args: &[&str]) -> Result<(), LoadError> {
        let word_bytes = self.width.bytes();
        let header_words = args.len() as u64 + 2;
        let strings_len: u64 = args.iter().map(|a| a.len() as u64 + 1).sum();
        let region_len = header_words * word_bytes + strings_len;

        let mut region = LinearMemory::new(region_len);
        let write_word = |region: &mut LinearMemory, index: u64, value: u64| match self.width {
            Width::W32 => region.write_u32(index * word_bytes, value as u32, self.endian),
            Width::W64 => region.write_u64(index * word_bytes, value, self.endian),
        };
        write_word(&mut region, 0, args.len() as u64).expect("argc fits in freshly sized region");
        let strings_start = header_words * word_bytes;
        let mut offset = strings_start;
        for (i, arg) in args.iter().enumerate() {
            write_word(&mut region, i as u64 + 1, DEFAULT_ARGV_BASE + offset)
                .expect("argv pointer fits in freshly sized region");
            for &byte in arg.as_bytes() {
                region.write_u8(offset, byte).expect("string fits in region");
                offset += 1;
            }
            region.write_u8(offset, 0).expect("NUL fits in region");
            offset += 1;
        }
        write_word(&mut region, args.len() as u64 + 1, 0).expect("terminator fits in region");

        self.memory
            .mount(DEFAULT_ARGV_BASE, ARGV_REGION, region)
            .map_err(LoadError::Mount)?;
        self.argv_info = ArgvInfo {
            argc: args.len() as u64,
            argv_base: DEFAULT_ARGV_BASE,
        };
        Ok(())
    }

    pub fn push_d(&mut self, value: u64) -> Result<(), BeeError> {
        self.registers
            .push_d(&mut self.memory, self.width, self.endian, value)
    }

    pub fn pop_d(&mut self) -> Result<u64, BeeError> {
        self.registers.pop_d(&self.memory, self.width, self.endian)
    }

    pub fn push_s(&mut self, value: u64) -> Result<(), BeeError> {
        self.registers
            .push_s(&mut self.memory, self.width, self.endian, value)
    }

    pub fn pop_s(&mut self) -> Result<u64, BeeError> {
        self.registers.pop_s(&self.memory, self.width, self.endian)
    }

    pub fn peek_d(&self, n: u64) -> Result<u64, BeeError> {
        self.registers.peek_d(&self.memory, self.width, self.endian, n)
    }

    pub fn peek_s(&self) -> Result<u64, BeeError> {
        self.registers.peek_s(&self.memory, self.width, self.endian)
    }

    pub fn poke_d(&mut self, n: u64, value: u64) -> Result<(), BeeError> {
        self.registers
            .poke_d(&mut self.memory, self.width, self.endian, n, value)
    }

    /// Reads one W-bit word, no alignment check (callers that must check
    /// alignment do so before calling this).
    pub fn fetch_word(&self, address: u64) -> Result<u64, BeeError> {
        match self.width {
            Width::W32 => self
                .memory
                .read_u32(address, self.endian)
                .map(u64::from)
                .map_err(|_| BeeError::UnalignedAddress),
            Width::W64 => self
                .memory
                .read_u64(address, self.endian)
                .map_err(|_| BeeError::UnalignedAddress),
        }
    }

    pub fn store_word(&mut self, address: u64, value: u64) -> Result<(), BeeError> {
        match self.width {
            Width::W32 => self
                .memory
                .write_u32(address, value as u32, self.endian)
                .map_err(|_| BeeError::UnalignedAddress),
            Width::W64 => self
                .memory
                .write_u64(address, value, self.endian)
                .map_err(|_| BeeError::UnalignedAddress),
        }
    }

    /// Executes instructions until the VM halts. The event-tick hook runs
    /// between every two instructions (spec §5) and may request a stop by
    /// returning `false`; the current instruction always completes first.
    pub fn run(&mut self, mut event_tick: impl FnMut(&Vm) -> bool) -> ExitCondition {
        loop {
            if let Some(exit) = crate::interp::step(self) {
                return exit;
            }
            self.instruction_count += 1;
            if !event_tick(self) {
                return ExitCondition::HostStopped;
            }
        }
    }
}
