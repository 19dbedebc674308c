use crate::endian::Endian;

/// A readable block of byte-addressed storage.
///
/// `Storage` is the backing for the Bee linear memory `M`: a plain
/// contiguous buffer, a composed set of regions, or an I/O-intercepting
/// wrapper can all stand in for it. The typed `read_*` accessors are
/// default-implemented on top of [`borrow_slice`] so a new backing only has
/// to provide slice access and bounds checking.
///
/// [`borrow_slice`]: ./trait.Storage.html#tymethod.borrow_slice
pub trait Storage {
    /// Total addressable length in bytes.
    ///
    /// It is not guaranteed that every address in `[0..length())` is
    /// actually backed; use [`check_range`] to test a specific range.
    ///
    /// [`check_range`]: ./trait.Storage.html#tymethod.check_range
    fn length(&self) -> u64;

    /// Whether `[address..address+length)` is addressable.
    fn check_range(&self, address: u64, length: u64) -> bool;

    /// Immutably borrows `[address..address+length)`.
    ///
    /// # Errors
    /// Returns `Err(())` if the range is not addressable.
    fn borrow_slice(&self, address: u64, length: u64) -> Result<&[u8], ()>;

    /// Reads a single byte.
    fn read_u8(&self, address: u64) -> Result<u8, ()> {
        Ok(self.borrow_slice(address, 1)?[0])
    }

    /// Reads a little/big-endian (per `endian`) 16-bit halfword.
    fn read_u16(&self, address: u64, endian: Endian) -> Result<u16, ()> {
        Ok(endian.read_u16(self.borrow_slice(address, 2)?))
    }

    /// Reads a 32-bit word.
    fn read_u32(&self, address: u64, endian: Endian) -> Result<u32, ()> {
        Ok(endian.read_u32(self.borrow_slice(address, 4)?))
    }

    /// Reads a 64-bit word.
    fn read_u64(&self, address: u64, endian: Endian) -> Result<u64, ()> {
        Ok(endian.read_u64(self.borrow_slice(address, 8)?))
    }
}

/// The mutable counterpart of [`Storage`].
pub trait StorageMut: Storage {
    /// Mutably borrows `[address..address+length)`.
    ///
    /// # Errors
    /// Returns `Err(())` if the range is not addressable.
    fn borrow_slice_mut(&mut self, address: u64, length: u64) -> Result<&mut [u8], ()>;

    fn write_u8(&mut self, address: u64, value: u8) -> Result<(), ()> {
        self.borrow_slice_mut(address, 1)?[0] = value;
        Ok(())
    }

    fn write_u16(&mut self, address: u64, value: u16, endian: Endian) -> Result<(), ()> {
        endian.write_u16(self.borrow_slice_mut(address, 2)?, value);
        Ok(())
    }

    fn write_u32(&mut self, address: u64, value: u32, endian: Endian) -> Result<(), ()> {
        endian.write_u32(self.borrow_slice_mut(address, 4)?, value);
        Ok(())
    }

    fn write_u64(&mut self, address: u64, value: u64, endian: Endian) -> Result<(), ()> {
        endian.write_u64(self.borrow_slice_mut(address, 8)?, value);
        Ok(())
    }
}

/// A contiguous block of memory, the default backing for the VM's linear
/// memory.
pub struct LinearMemory {
    data: Vec<u8>,
}

impl LinearMemory {
    pub fn new(length: u64) -> LinearMemory {
        LinearMemory {
            data: vec![0; length as usize],
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..]
    }
}

impl Storage for LinearMemory {
    fn length(&self) -> u64 {
        self.data.len() as u64
    }

    fn check_range(&self, address: u64, length: u64) -> bool {
        let len = self.data.len() as u64;
        address <= len && address.saturating_add(length) <= len
    }

    fn borrow_slice(&self, address: u64, length: u64) -> Result<&[u8], ()> {
        if self.check_range(address, length) {
            Ok(&self.data[address as usize..(address + length) as usize])
        } else {
            Err(())
        }
    }
}

impl StorageMut for LinearMemory {
    fn borrow_slice_mut(&mut self, address: u64, length: u64) -> Result<&mut [u8], ()> {
        if self.check_range(address, length) {
            Ok(&mut self.data[address as usize..(address + length) as usize])
        } else {
            Err(())
        }
    }
}

impl<'a> From<&'a [u8]> for LinearMemory {
    fn from(s: &'a [u8]) -> LinearMemory {
        LinearMemory {
            data: Vec::from(s),
        }
    }
}

pub mod region;
pub mod io;
