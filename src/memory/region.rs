use crate::memory::{Storage, StorageMut};

/// Error type for [`RegionMemory::mount`].
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum MountError {
    /// The mount would have resulted in intersecting regions.
    RegionIntersection,
    /// Another region has already been mounted under the same key.
    KeyAlreadyExists,
}

type AddressedRegion = (u64, String, Box<dyn StorageMut>);

/// A [`StorageMut`] composed of disjoint address-ordered regions, kept
/// sorted by base address.
///
/// This is the generalisation of the reference interpreter's "compare a
/// bare address against a high sentinel" dispatch (Design Note,
/// "Address translation for argv"): regions are kept sorted by base
/// address and a read/write is routed to the region whose range contains
/// it. The default VM wiring mounts the main memory region at 0 and the
/// argv region at the fixed high sentinel address.
#[derive(Default)]
pub struct RegionMemory {
    regions: Vec<AddressedRegion>,
}

impl RegionMemory {
    pub fn new() -> RegionMemory {
        Default::default()
    }

    /// Mounts `region` at `address`, registered under `key`.
    ///
    /// # Errors
    /// Fails if `key` is already registered or if the region would overlap
    /// an existing one.
    pub fn mount<S: StorageMut + 'static>(
        &mut self,
        address: u64,
        key: &str,
        region: S,
    ) -> Result<(), MountError> {
        if self.regions.iter().any(|(_, k, _)| k == key) {
            return Err(MountError::KeyAlreadyExists);
        }

        let upper_bound = address
            .checked_add(region.length())
            .expect("region upper bound exceeds valid address range");
        let index = self.find_mount_index(address, upper_bound)?;

        self.regions
            .insert(index, (address, key.to_string(), Box::new(region)));
        Ok(())
    }

    pub fn unmount(&mut self, key: &str) -> Option<Box<dyn StorageMut>> {
        let index = self.regions.iter().position(|(_, k, _)| k == key)?;
        Some(self.regions.remove(index).2)
    }

    fn find_mount_index(&self, address: u64, upper_bound: u64) -> Result<usize, MountError> {
        for (i, (region_addr, _, region)) in self.regions.iter().enumerate() {
            let region_upper = region_addr + region.length();
            if *region_addr >= address {
                return if upper_bound > *region_addr {
                    Err(MountError::RegionIntersection)
                } else {
                    Ok(i)
                };
            } else if region_upper > address {
                return Err(MountError::RegionIntersection);
            }
        }
        Ok(self.regions.len())
    }

    fn get_index(&self, address: u64) -> Option<usize> {
        match self.regions.binary_search_by_key(&address, |e| e.0) {
            Ok(i) => Some(i),
            Err(i) => {
                if i > 0 {
                    Some(i - 1)
                } else {
                    None
                }
            }
        }
    }

    fn get_region(&self, address: u64) -> Option<(&dyn StorageMut, u64)> {
        let index = self.get_index(address)?;
        let (region_addr, _, region) = &self.regions[index];
        Some((region.as_ref(), address - region_addr))
    }

    fn get_region_mut(&mut self, address: u64) -> Option<(&mut dyn StorageMut, u64)> {
        let index = self.get_index(address)?;
        let (region_addr, _, region) = &mut self.regions[index];
        Some((region.as_mut(), address - *region_addr))
    }
}

impl Storage for RegionMemory {
    fn length(&self) -> u64 {
        self.regions
            .last()
            .map(|(address, _, region)| address + region.length())
            .unwrap_or(0)
    }

    fn check_range(&self, address: u64, length: u64) -> bool {
        self.get_region(address)
            .map(|(region, local)| region.check_range(local, length))
            .unwrap_or(false)
    }

    fn borrow_slice(&self, address: u64, length: u64) -> Result<&[u8], ()> {
        let (region, local) = self.get_region(address).ok_or(())?;
        region.borrow_slice(local, length)
    }
}

impl StorageMut for RegionMemory {
    fn borrow_slice_mut(&mut self, address: u64, length: u64) -> Result<&mut [u8], ()> {
        let (region, local) = self.get_region_mut(address).ok_or(())?;
        region.borrow_slice_mut(local, length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::LinearMemory;

    #[test]
    fn find_mount_index() {
        let mut memory = RegionMemory::new();
        assert_eq!(memory.find_mount_index(0, 16), Ok(0));
        assert_eq!(memory.mount(0, "main", LinearMemory::new(16)), Ok(()));
        assert_eq!(
            memory.find_mount_index(8, 24),
            Err(MountError::RegionIntersection)
        );
        assert_eq!(memory.mount(20, "argv", LinearMemory::new(16)), Ok(()));
        assert_eq!(memory.find_mount_index(16, 20), Ok(1));
        assert_eq!(memory.find_mount_index(40, 44), Ok(2));
    }

    #[test]
    fn access_mounted_region() {
        let mut memory = RegionMemory::new();
        assert_eq!(memory.mount(0, "main", LinearMemory::new(64)), Ok(()));
        assert_eq!(
            memory.mount(0xFFFF_0000, "argv", LinearMemory::new(8)),
            Ok(())
        );
        assert_eq!(memory.write_u8(0xFFFF_0001, 7), Ok(()));
        assert_eq!(memory.read_u8(0xFFFF_0001), Ok(7));
        assert_eq!(memory.read_u8(0x1_0000_0000), Err(()));
    }

    #[test]
    fn unmount_by_key() {
        let mut memory = RegionMemory::new();
        memory.mount(0, "main", LinearMemory::new(8)).unwrap();
        assert!(memory.unmount("nope").is_none());
        assert!(memory.unmount("main").is_some());
        assert!(memory.unmount("main").is_none());
    }
}
