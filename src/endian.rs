use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Byte order used for multi-byte reads/writes of instruction and data
/// words. Selectable per VM instance (spec §6), unlike a fixed type alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Default for Endian {
    fn default() -> Endian {
        Endian::Little
    }
}

impl Endian {
    pub fn read_u16(self, buf: &[u8]) -> u16 {
        match self {
            Endian::Little => LittleEndian::read_u16(buf),
            Endian::Big => BigEndian::read_u16(buf),
        }
    }

    pub fn read_u32(self, buf: &[u8]) -> u32 {
        match self {
            Endian::Little => LittleEndian::read_u32(buf),
            Endian::Big => BigEndian::read_u32(buf),
        }
    }

    pub fn read_u64(self, buf: &[u8]) -> u64 {
        match self {
            Endian::Little => LittleEndian::read_u64(buf),
            Endian::Big => BigEndian::read_u64(buf),
        }
    }

    pub fn write_u16(self, buf: &mut [u8], value: u16) {
        match self {
            Endian::Little => LittleEndian::write_u16(buf, value),
            Endian::Big => BigEndian::write_u16(buf, value),
        }
    }

    pub fn write_u32(self, buf: &mut [u8], value: u32) {
        match self {
            Endian::Little => LittleEndian::write_u32(buf, value),
            Endian::Big => BigEndian::write_u32(buf, value),
        }
    }

    pub fn write_u64(self, buf: &mut [u8], value: u64) {
        match self {
            Endian::Little => LittleEndian::write_u64(buf, value),
            Endian::Big => BigEndian::write_u64(buf, value),
        }
    }
}
