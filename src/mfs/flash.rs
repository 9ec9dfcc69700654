//! The flash device interface consumed by the driver.

use crate::mfs::{FlashError, Offset};

/// Value a byte holds after erase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Erased {
    /// Erased bytes read `0xFF` (NOR flash).
    Ones,
    /// Erased bytes read `0x00`.
    Zeros,
}

impl Erased {
    #[inline]
    pub fn byte(self) -> u8 {
        match self {
            Erased::Ones => 0xFF,
            Erased::Zeros => 0x00,
        }
    }

    #[inline]
    pub fn word(self) -> u32 {
        match self {
            Erased::Ones => 0xFFFF_FFFF,
            Erased::Zeros => 0,
        }
    }
}

/// Static geometry of a flash device with uniform sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashDescriptor {
    /// Number of erasable sectors.
    pub sector_count: u32,
    /// Size of one sector in bytes.
    pub sector_size: u32,
    /// Erased value convention.
    pub erased: Erased,
    /// Smallest programmable unit in bytes (1 for byte-programmable flash).
    pub write_size: u32,
}

impl FlashDescriptor {
    /// Offset of the first byte of `sector`.
    #[inline]
    pub fn sector_offset(&self, sector: u32) -> Option<Offset> {
        sector.checked_mul(self.sector_size).map(Offset)
    }

    /// Total device size in bytes.
    #[inline]
    pub fn total_size(&self) -> Option<u32> {
        self.sector_count.checked_mul(self.sector_size)
    }
}

/// Implementation required from the flash hardware driver.
///
/// Offsets are absolute and zero based. If the managed partition does
/// not start at the beginning of the physical flash, the implementation
/// adds that base itself.
///
/// The driver never retries: any error returned here aborts the current
/// operation and moves the driver to its error state. The one exception
/// is [`FlashError::Verify`] from [`FlashDevice::verify_erase`], which
/// tells the driver a sector is not erased.
///
/// ```rust
/// use embedded_mfs::mfs::{Erased, FlashDescriptor, FlashDevice, FlashError};
///
/// struct Flash {}
///
/// impl FlashDevice for Flash {
///     fn descriptor(&self) -> FlashDescriptor {
///         FlashDescriptor { sector_count: 2, sector_size: 4096, erased: Erased::Ones, write_size: 1 }
///     }
///
///     fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), FlashError> {
///         unimplemented!()
///     }
///
///     fn program(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError> {
///         unimplemented!()
///     }
///
///     fn start_erase_sector(&mut self, sector: u32) -> Result<(), FlashError> {
///         unimplemented!()
///     }
///
///     fn wait_erase(&mut self) -> Result<(), FlashError> {
///         unimplemented!()
///     }
///
///     fn verify_erase(&mut self, sector: u32) -> Result<(), FlashError> {
///         unimplemented!()
///     }
/// }
/// ```
pub trait FlashDevice {
    /// Geometry and erased-value convention.
    fn descriptor(&self) -> FlashDescriptor;

    /// Reads `buf.len()` bytes starting at `offset`.
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), FlashError>;

    /// Programs `data` starting at `offset`. Programming can only move bits
    /// away from the erased value.
    fn program(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError>;

    /// Starts erasing one sector.
    fn start_erase_sector(&mut self, sector: u32) -> Result<(), FlashError>;

    /// Blocks until the erase started by [`FlashDevice::start_erase_sector`]
    /// completes. Implementations usually poll the status with a short sleep.
    fn wait_erase(&mut self) -> Result<(), FlashError>;

    /// Checks that every byte of `sector` holds the erased value.
    ///
    /// Returns [`FlashError::Verify`] if it does not.
    fn verify_erase(&mut self, sector: u32) -> Result<(), FlashError>;
}
