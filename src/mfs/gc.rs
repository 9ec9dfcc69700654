use log::{error, info};

use crate::mfs::{DriverState, FlashDevice, MfsError};

use super::driver::Mfs;

impl<D, const MR: usize, const TM: usize, const BUF: usize> Mfs<D, MR, TM, BUF>
where
    D: FlashDevice,
    bitmaps::BitsImpl<MR>: bitmaps::Bits,
{
    /// Copies every live record to the standby bank and makes it active.
    ///
    /// The standby bank is always erased while mounted. Its header is
    /// written only after all records are in place and the old bank is
    /// erased last, so an interruption leaves at least one valid bank.
    pub(crate) fn garbage_collect(&mut self) -> Result<(), MfsError> {
        let source = self.current_bank;
        let target = source.other();
        info!("mfs: compacting {:?} into {:?}", source, target);

        // The erased word is not a valid counter, a header carrying it
        // would read back as garbage.
        let counter = match self.current_counter.checked_add(1) {
            Some(c) if c != self.flash.erased.word() => c,
            _ => {
                error!("mfs: bank counter exhausted");
                self.state = DriverState::Error;
                return Err(MfsError::Internal);
            }
        };

        let mut dest = self
            .config
            .bank_offset(&self.flash, target)?
            .checked_add(self.config.aligned_bank_header())?;

        let mut next = self.descriptors.first_live();
        while let Some(index) = next {
            let Some(d) = self.descriptors.get(index) else {
                return Err(MfsError::Internal);
            };
            let len = self.config.aligned_record(d.size).ok_or(MfsError::Internal)?;

            self.flash_copy(dest, d.offset, len)?;
            self.descriptors.relocate(index, dest);
            dest = dest.checked_add(len)?;

            next = self.descriptors.next_live(index);
        }

        self.current_bank = target;
        self.current_counter = counter;
        self.next_offset = dest;

        self.bank_write_header(target, counter)?;
        self.bank_erase(source)
    }
}
