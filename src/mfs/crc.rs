//! CRC-16/CCITT (poly 0x1021, init 0xFFFF, no reflection, no final xor).

use crc::{CRC_16_IBM_3740, Crc, Digest};

static CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Checksum of a whole buffer.
#[inline]
pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// Incremental checksum, fed chunk by chunk.
pub struct Crc16 {
    digest: Digest<'static, u16>,
}

impl Crc16 {
    #[inline]
    pub fn new() -> Self {
        Self {
            digest: CRC16.digest(),
        }
    }

    #[inline]
    pub fn update(&mut self, chunk: &[u8]) {
        self.digest.update(chunk);
    }

    #[inline]
    pub fn finalize(self) -> u16 {
        self.digest.finalize()
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}
