use core::cell::RefCell;

use critical_section::Mutex;

use crate::mfs::{FlashDevice, MfsError, driver::Mfs};

/// A driver instance that can be shared between execution contexts.
///
/// Every call runs inside a critical section, so a single flash operation
/// (an erase in particular) keeps interrupts masked for its duration.
/// Keep work inside [`SharedMfs::with`] short, or give each context its
/// own partition.
pub struct SharedMfs<D, const MR: usize, const TM: usize, const BUF: usize = 32>
where
    D: FlashDevice,
    bitmaps::BitsImpl<MR>: bitmaps::Bits,
{
    inner: Mutex<RefCell<Mfs<D, MR, TM, BUF>>>,
}

impl<D, const MR: usize, const TM: usize, const BUF: usize> SharedMfs<D, MR, TM, BUF>
where
    D: FlashDevice,
    bitmaps::BitsImpl<MR>: bitmaps::Bits,
{
    pub const fn new(mfs: Mfs<D, MR, TM, BUF>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(mfs)),
        }
    }

    /// Runs `f` with exclusive access to the driver.
    ///
    /// Returns [`MfsError::InvalidState`] if called again from inside `f`.
    pub fn with<R>(
        &self,
        f: impl FnOnce(&mut Mfs<D, MR, TM, BUF>) -> Result<R, MfsError>,
    ) -> Result<R, MfsError> {
        critical_section::with(|cs| {
            let mut mfs = self
                .inner
                .borrow(cs)
                .try_borrow_mut()
                .map_err(|_| MfsError::InvalidState)?;
            f(&mut mfs)
        })
    }

    pub fn into_inner(self) -> Mfs<D, MR, TM, BUF> {
        self.inner.into_inner().into_inner()
    }
}
