//! [`FlashDevice`] adapter for `embedded-storage` NOR flash drivers.

use embedded_storage::nor_flash::{NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash};

use crate::mfs::{Erased, FlashDescriptor, FlashDevice, FlashError};

const VERIFY_CHUNK: usize = 32;
const MAX_WRITE_SIZE: usize = 16;

/// Wraps any blocking [`NorFlash`] implementation.
///
/// Erase is synchronous in `embedded-storage`, so [`FlashDevice::wait_erase`]
/// returns immediately. Program lengths that are not a multiple of
/// `WRITE_SIZE` are padded with the erased value, which leaves the padding
/// bytes untouched on NOR flash. The configured record alignment must be a
/// multiple of `WRITE_SIZE` so that padding never overlaps the next record.
pub struct NorFlashDevice<F: NorFlash> {
    flash: F,
    erased: Erased,
}

impl<F: NorFlash> NorFlashDevice<F> {
    /// Wraps a flash whose erased bytes read `0xFF`.
    pub fn new(flash: F) -> Self {
        Self::with_erased(flash, Erased::Ones)
    }

    pub fn with_erased(flash: F, erased: Erased) -> Self {
        Self { flash, erased }
    }

    pub fn into_inner(self) -> F {
        self.flash
    }
}

fn map_err<E: NorFlashError>(e: E, fallback: FlashError) -> FlashError {
    match e.kind() {
        NorFlashErrorKind::NotAligned => FlashError::Unaligned,
        NorFlashErrorKind::OutOfBounds => FlashError::OutOfBounds,
        _ => fallback,
    }
}

impl<F: NorFlash> FlashDevice for NorFlashDevice<F> {
    fn descriptor(&self) -> FlashDescriptor {
        FlashDescriptor {
            sector_count: (self.flash.capacity() / F::ERASE_SIZE) as u32,
            sector_size: F::ERASE_SIZE as u32,
            erased: self.erased,
            write_size: F::WRITE_SIZE as u32,
        }
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        self.flash
            .read(offset, buf)
            .map_err(|e| map_err(e, FlashError::Read))
    }

    fn program(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError> {
        let ws = F::WRITE_SIZE;
        if ws > MAX_WRITE_SIZE || offset as usize % ws != 0 {
            return Err(FlashError::Unaligned);
        }

        let body = data.len() - data.len() % ws;
        if body > 0 {
            self.flash
                .write(offset, &data[..body])
                .map_err(|e| map_err(e, FlashError::Program))?;
        }

        let tail = &data[body..];
        if !tail.is_empty() {
            let mut padded = [self.erased.byte(); MAX_WRITE_SIZE];
            padded[..tail.len()].copy_from_slice(tail);
            self.flash
                .write(offset + body as u32, &padded[..ws])
                .map_err(|e| map_err(e, FlashError::Program))?;
        }

        Ok(())
    }

    fn start_erase_sector(&mut self, sector: u32) -> Result<(), FlashError> {
        let size = F::ERASE_SIZE as u32;
        let from = sector.checked_mul(size).ok_or(FlashError::OutOfBounds)?;
        let to = from.checked_add(size).ok_or(FlashError::OutOfBounds)?;
        self.flash
            .erase(from, to)
            .map_err(|e| map_err(e, FlashError::Erase))
    }

    fn wait_erase(&mut self) -> Result<(), FlashError> {
        Ok(())
    }

    fn verify_erase(&mut self, sector: u32) -> Result<(), FlashError> {
        let size = F::ERASE_SIZE as u32;
        let mut offset = sector.checked_mul(size).ok_or(FlashError::OutOfBounds)?;
        let end = offset.checked_add(size).ok_or(FlashError::OutOfBounds)?;
        let mut buf = [0u8; VERIFY_CHUNK];

        while offset < end {
            let n = ((end - offset) as usize).min(VERIFY_CHUNK);
            self.read(offset, &mut buf[..n])?;
            if buf[..n].iter().any(|&b| b != self.erased.byte()) {
                return Err(FlashError::Verify);
            }
            offset += n as u32;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_storage::nor_flash::ErrorType;

    /// In-memory NOR flash with 4-byte write granularity.
    struct MockNor {
        mem: [u8; 256],
    }

    impl ErrorType for MockNor {
        type Error = NorFlashErrorKind;
    }

    impl ReadNorFlash for MockNor {
        const READ_SIZE: usize = 1;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            let start = offset as usize;
            let end = start + bytes.len();
            if end > self.mem.len() {
                return Err(NorFlashErrorKind::OutOfBounds);
            }
            bytes.copy_from_slice(&self.mem[start..end]);
            Ok(())
        }

        fn capacity(&self) -> usize {
            self.mem.len()
        }
    }

    impl NorFlash for MockNor {
        const WRITE_SIZE: usize = 4;
        const ERASE_SIZE: usize = 64;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            self.mem[from as usize..to as usize].fill(0xFF);
            Ok(())
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            if offset as usize % Self::WRITE_SIZE != 0 || bytes.len() % Self::WRITE_SIZE != 0 {
                return Err(NorFlashErrorKind::NotAligned);
            }
            for (i, b) in bytes.iter().enumerate() {
                self.mem[offset as usize + i] &= *b;
            }
            Ok(())
        }
    }

    fn device() -> NorFlashDevice<MockNor> {
        NorFlashDevice::new(MockNor { mem: [0xFF; 256] })
    }

    #[test]
    fn descriptor_reflects_nor_geometry() {
        let d = device().descriptor();
        assert_eq!(d.sector_count, 4);
        assert_eq!(d.sector_size, 64);
        assert_eq!(d.write_size, 4);
        assert_eq!(d.erased, Erased::Ones);
    }

    #[test]
    fn unaligned_tail_is_padded_with_erased_value() {
        let mut dev = device();
        dev.program(8, &[1, 2, 3, 4, 5, 6]).unwrap();

        let mut out = [0u8; 8];
        dev.read(8, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4, 5, 6, 0xFF, 0xFF]);
    }

    #[test]
    fn unaligned_start_is_rejected() {
        let mut dev = device();
        assert_eq!(dev.program(2, &[0; 4]), Err(FlashError::Unaligned));
    }

    #[test]
    fn erase_and_verify_sector() {
        let mut dev = device();
        dev.program(64, &[0; 4]).unwrap();
        assert_eq!(dev.verify_erase(1), Err(FlashError::Verify));
        assert_eq!(dev.verify_erase(0), Ok(()));

        dev.start_erase_sector(1).unwrap();
        dev.wait_erase().unwrap();
        assert_eq!(dev.verify_erase(1), Ok(()));
    }

    #[test]
    fn out_of_bounds_read_maps_error() {
        let mut dev = device();
        let mut out = [0u8; 4];
        assert_eq!(dev.read(254, &mut out), Err(FlashError::OutOfBounds));
    }
}
