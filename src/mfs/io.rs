//! Flash access wrappers.
//!
//! Every device error is terminal for the current operation: it is logged,
//! the driver enters [`DriverState::Error`] and the caller sees
//! [`MfsError::FlashFailure`].

use log::error;

use crate::mfs::{
    DriverState, FlashDevice, FlashError, MfsError, Offset, config::MIN_BUFFER_SIZE,
};

use super::driver::Mfs;

/// Reads back `expected.len()` bytes at `offset` through `scratch` and
/// compares them.
fn verify_programmed<D: FlashDevice>(
    device: &mut D,
    offset: u32,
    expected: &[u8],
    scratch: &mut [u8],
) -> Result<(), FlashError> {
    let mut at = offset;
    for chunk in expected.chunks(scratch.len()) {
        let readback = &mut scratch[..chunk.len()];
        device.read(at, readback)?;
        if readback != chunk {
            return Err(FlashError::Verify);
        }
        at += chunk.len() as u32;
    }
    Ok(())
}

/// Moves one chunk through `buf`, optionally verifying the destination.
fn copy_chunk<D: FlashDevice>(
    device: &mut D,
    buf: &mut [u8],
    src: u32,
    dst: u32,
    verify: bool,
) -> Result<(), FlashError> {
    device.read(src, buf)?;
    device.program(dst, buf)?;
    if verify {
        let mut scratch = [0u8; MIN_BUFFER_SIZE];
        verify_programmed(device, dst, buf, &mut scratch)?;
    }
    Ok(())
}

impl<D, const MR: usize, const TM: usize, const BUF: usize> Mfs<D, MR, TM, BUF>
where
    D: FlashDevice,
    bitmaps::BitsImpl<MR>: bitmaps::Bits,
{
    /// Records a fatal flash error.
    pub(crate) fn flash_failure(&mut self, err: FlashError) -> MfsError {
        error!("mfs: flash failure: {}", err);
        self.state = DriverState::Error;
        MfsError::FlashFailure
    }

    pub(crate) fn flash_read(&mut self, offset: Offset, buf: &mut [u8]) -> Result<(), MfsError> {
        self.device
            .read(offset.get(), buf)
            .map_err(|e| self.flash_failure(e))
    }

    /// Programs `data`, then reads it back if write verification is on.
    pub(crate) fn flash_write(&mut self, offset: Offset, data: &[u8]) -> Result<(), MfsError> {
        self.device
            .program(offset.get(), data)
            .map_err(|e| self.flash_failure(e))?;

        if self.config.write_verify {
            let bs = self.config.buffer_size;
            let result =
                verify_programmed(&mut self.device, offset.get(), data, &mut self.buffer[..bs]);
            result.map_err(|e| self.flash_failure(e))?;
        }

        Ok(())
    }

    /// Copies `len` bytes between flash locations through the I/O buffer.
    ///
    /// Chunks end on buffer-size boundaries of the destination so page
    /// programming never straddles a page.
    pub(crate) fn flash_copy(&mut self, dst: Offset, src: Offset, len: u32) -> Result<(), MfsError> {
        let bs = self.config.buffer_size as u32;
        let verify = self.config.write_verify;
        let (mut dst, mut src, mut remaining) = (dst.get(), src.get(), len);

        while remaining > 0 {
            let chunk = (bs - dst % bs).min(remaining);
            let result = copy_chunk(
                &mut self.device,
                &mut self.buffer[..chunk as usize],
                src,
                dst,
                verify,
            );
            result.map_err(|e| self.flash_failure(e))?;

            dst += chunk;
            src += chunk;
            remaining -= chunk;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mfs::test_support::{SimFlash, TestMfs, test_config};

    fn driver(flash: SimFlash) -> TestMfs {
        TestMfs::new(flash, test_config()).unwrap()
    }

    #[test]
    fn copy_crosses_chunk_boundaries() {
        let mut flash = SimFlash::new();
        let mut src = [0u8; 100];
        for (i, b) in src.iter_mut().enumerate() {
            *b = i as u8;
        }
        flash.program(4096 + 3, &src).unwrap();

        let mut mfs = driver(flash);
        mfs.flash_copy(Offset(21), Offset(4096 + 3), 100).unwrap();

        let mut out = [0u8; 100];
        mfs.flash_read(Offset(21), &mut out).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn verify_catches_stuck_bits() {
        let mut flash = SimFlash::new();
        flash.stuck_byte = Some(40);

        let mut mfs = driver(flash);
        assert_eq!(
            mfs.flash_write(Offset(32), &[0u8; 16]),
            Err(MfsError::FlashFailure)
        );
        assert_eq!(mfs.state, DriverState::Error);
    }

    #[test]
    fn verify_disabled_misses_stuck_bits() {
        let mut flash = SimFlash::new();
        flash.stuck_byte = Some(40);

        let mut cfg = test_config();
        cfg.write_verify = false;
        let mut mfs = TestMfs::new(flash, cfg).unwrap();
        assert_eq!(mfs.flash_write(Offset(32), &[0u8; 16]), Ok(()));
    }

    #[test]
    fn read_failure_enters_error_state() {
        let mut flash = SimFlash::new();
        flash.fail_reads = true;

        let mut mfs = driver(flash);
        let mut buf = [0u8; 4];
        assert_eq!(
            mfs.flash_read(Offset(0), &mut buf),
            Err(MfsError::FlashFailure)
        );
        assert_eq!(mfs.state, DriverState::Error);
    }
}
