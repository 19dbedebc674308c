use crate::endian::Endian;
use crate::memory::{LinearMemory, Storage, StorageMut};

/// Intercepts writes to an underlying [`LinearMemory`], notified after the
/// write has already landed.
pub trait IoHandler {
    fn can_write(&self, memory: &[u8], address: u64, length: u64) -> bool;
    fn on_write(&self, memory: &[u8], address: u64, length: u64);
}

/// A [`StorageMut`] that delegates to a plain buffer but calls out to an
/// [`IoHandler`] around every write, e.g. to flush a memory-mapped console.
pub struct IoMemory<H: IoHandler> {
    memory: LinearMemory,
    handler: H,
}

impl<H: IoHandler> IoMemory<H> {
    pub fn new(size: u64, handler: H) -> IoMemory<H> {
        IoMemory {
            memory: LinearMemory::new(size),
            handler,
        }
    }
}

impl<H: IoHandler> Storage for IoMemory<H> {
    fn length(&self) -> u64 {
        self.memory.length()
    }

    fn check_range(&self, address: u64, length: u64) -> bool {
        self.memory.check_range(address, length)
    }

    fn borrow_slice(&self, address: u64, length: u64) -> Result<&[u8], ()> {
        self.memory.borrow_slice(address, length)
    }
}

impl<H: IoHandler> StorageMut for IoMemory<H> {
    fn borrow_slice_mut(&mut self, address: u64, length: u64) -> Result<&mut [u8], ()> {
        if !self.handler.can_write(self.memory.data(), address, length) {
            return Err(());
        }
        let slice = self.memory.borrow_slice_mut(address, length)?;
        Ok(slice)
    }

    fn write_u8(&mut self, address: u64, value: u8) -> Result<(), ()> {
        if !self.handler.can_write(self.memory.data(), address, 1) {
            return Ok(());
        }
        self.memory.write_u8(address, value)?;
        self.handler.on_write(self.memory.data(), address, 1);
        Ok(())
    }

    fn write_u32(&mut self, address: u64, value: u32, endian: Endian) -> Result<(), ()> {
        if !self.handler.can_write(self.memory.data(), address, 4) {
            return Ok(());
        }
        self.memory.write_u32(address, value, endian)?;
        self.handler.on_write(self.memory.data(), address, 4);
        Ok(())
    }
}

pub struct DelegateIoHandler<FC, FO>
where
    FC: Fn(&[u8], u64, u64) -> bool,
    FO: Fn(&[u8], u64, u64),
{
    can_write: FC,
    on_write: FO,
}

impl<FC, FO> DelegateIoHandler<FC, FO>
where
    FC: Fn(&[u8], u64, u64) -> bool,
    FO: Fn(&[u8], u64, u64),
{
    pub fn new(can_write: FC, on_write: FO) -> DelegateIoHandler<FC, FO> {
        DelegateIoHandler {
            can_write,
            on_write,
        }
    }
}

impl<FC, FO> IoHandler for DelegateIoHandler<FC, FO>
where
    FC: Fn(&[u8], u64, u64) -> bool,
    FO: Fn(&[u8], u64, u64),
{
    fn can_write(&self, memory: &[u8], address: u64, length: u64) -> bool {
        (self.can_write)(memory, address, length)
    }

    fn on_write(&self, memory: &[u8], address: u64, length: u64) {
        (self.on_write)(memory, address, length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn write_callback() {
        let result = Rc::new(Cell::new((0u64, 0u32)));
        let rref = Rc::clone(&result);

        let handler = DelegateIoHandler::new(
            |_, _, _| true,
            move |memory, address, _length| {
                let value = Endian::Little.read_u32(&memory[address as usize..][..4]);
                rref.set((address, value));
            },
        );

        let mut memory = IoMemory::new(16, handler);
        memory.write_u32(4, 923, Endian::Little).unwrap();

        let (address, value) = result.get();
        assert_eq!(address, 4);
        assert_eq!(value, 923);
    }
}
