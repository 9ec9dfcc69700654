/// Errors returned by the managed flash storage driver.
///
/// Caller errors (`InvalidState`, `InvalidId`, `InvalidSize`, `NotFound`,
/// `TransactionNum`, `TransactionSize`) leave the driver usable.
/// `OutOfMemory` is a capacity error: other records must be erased first.
/// `FlashFailure` and `Internal` are fatal and leave the driver in the
/// [`DriverState::Error`](crate::mfs::DriverState::Error) state until the
/// next [`Mfs::start`](crate::mfs::Mfs::start).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MfsError {
    /// The driver is not in a state that accepts this call.
    InvalidState,
    /// Record identifier outside `1..=max_records`.
    InvalidId,
    /// Caller buffer too small, or a size argument out of range.
    InvalidSize,
    /// The record has no live instance.
    NotFound,
    /// Not enough space even after compaction.
    OutOfMemory,
    /// Transaction operation buffer exhausted.
    TransactionNum,
    /// Transaction reserved space exhausted.
    TransactionSize,
    /// Configuration does not fit the device or the driver capacities.
    InvalidConfig,
    /// Flash I/O failure, or a stored CRC no longer matches.
    FlashFailure,
    /// Internal logic inconsistency.
    Internal,
}

impl MfsError {
    /// Returns true if the error moved the driver into the error state.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, MfsError::FlashFailure | MfsError::Internal)
    }
}

impl core::fmt::Display for MfsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MfsError::InvalidState => write!(f, "driver not in a valid state for this operation"),
            MfsError::InvalidId => write!(f, "record identifier out of range"),
            MfsError::InvalidSize => write!(f, "invalid size or buffer too small"),
            MfsError::NotFound => write!(f, "record not found"),
            MfsError::OutOfMemory => write!(f, "not enough flash space"),
            MfsError::TransactionNum => write!(f, "too many operations in transaction"),
            MfsError::TransactionSize => write!(f, "transaction reserved space exceeded"),
            MfsError::InvalidConfig => write!(f, "invalid configuration"),
            MfsError::FlashFailure => write!(f, "flash failure"),
            MfsError::Internal => write!(f, "internal error"),
        }
    }
}

/// Errors reported by a [`FlashDevice`](crate::mfs::FlashDevice).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    /// Read operation failed.
    Read,
    /// Program operation failed.
    Program,
    /// Erase operation failed.
    Erase,
    /// A sector was not in the erased state.
    Verify,
    /// Address range outside the device.
    OutOfBounds,
    /// Address or length violates the device write granularity.
    Unaligned,
}

impl core::fmt::Display for FlashError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FlashError::Read => write!(f, "flash read failed"),
            FlashError::Program => write!(f, "flash program failed"),
            FlashError::Erase => write!(f, "flash erase failed"),
            FlashError::Verify => write!(f, "flash sector not erased"),
            FlashError::OutOfBounds => write!(f, "flash address out of bounds"),
            FlashError::Unaligned => write!(f, "flash access not aligned to write size"),
        }
    }
}
