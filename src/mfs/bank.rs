use log::{debug, warn};

use crate::mfs::{
    BankId, BankState, FlashDevice, FlashError, MfsError,
    layout::{BANK_HEADER_SIZE, BankHeader},
};

use super::driver::Mfs;

impl<D, const MR: usize, const TM: usize, const BUF: usize> Mfs<D, MR, TM, BUF>
where
    D: FlashDevice,
    bitmaps::BitsImpl<MR>: bitmaps::Bits,
{
    /// Erases every sector of `bank`, verifying each one.
    pub(crate) fn bank_erase(&mut self, bank: BankId) -> Result<(), MfsError> {
        debug!("mfs: erasing {:?}", bank);
        let (start, count) = self.config.bank_sectors(bank);

        for sector in start..start + count {
            let result = self
                .device
                .start_erase_sector(sector)
                .and_then(|_| self.device.wait_erase())
                .and_then(|_| self.device.verify_erase(sector));
            result.map_err(|e| self.flash_failure(e))?;
        }

        Ok(())
    }

    /// Returns whether every sector of `bank` holds the erased value.
    pub(crate) fn bank_verify_erased(&mut self, bank: BankId) -> Result<bool, MfsError> {
        let (start, count) = self.config.bank_sectors(bank);

        for sector in start..start + count {
            match self.device.verify_erase(sector) {
                Ok(()) => {}
                Err(FlashError::Verify) => return Ok(false),
                Err(e) => return Err(self.flash_failure(e)),
            }
        }

        Ok(true)
    }

    /// Programs a fresh header carrying `counter` at the start of `bank`.
    pub(crate) fn bank_write_header(&mut self, bank: BankId, counter: u32) -> Result<(), MfsError> {
        debug!("mfs: writing header of {:?}, counter {}", bank, counter);
        let raw = BankHeader { counter }.to_bytes(self.flash.erased.word());
        let at = self.config.bank_offset(&self.flash, bank)?;
        self.flash_write(at, &raw)
    }

    /// Classifies `bank` and returns its counter.
    ///
    /// With strong checking, a bank whose header looks erased is only
    /// reported as erased if all of its sectors are.
    pub(crate) fn bank_get_state(&mut self, bank: BankId) -> Result<(BankState, u32), MfsError> {
        let mut raw = [0u8; BANK_HEADER_SIZE];
        let at = self.config.bank_offset(&self.flash, bank)?;
        self.flash_read(at, &mut raw)?;

        let (state, counter) = BankHeader::classify(&raw, self.flash.erased.word());
        if state == BankState::Erased
            && self.config.strong_checking
            && !self.bank_verify_erased(bank)?
        {
            warn!("mfs: {:?} header erased but content is not", bank);
            return Ok((BankState::Garbage, counter));
        }

        Ok((state, counter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mfs::{
        DriverState, Erased,
        test_support::{SimFlash, TestMfs, test_config},
    };

    fn driver(flash: SimFlash) -> TestMfs {
        TestMfs::new(flash, test_config()).unwrap()
    }

    #[test]
    fn blank_banks_are_erased() {
        let mut mfs = driver(SimFlash::new());
        assert_eq!(mfs.bank_get_state(BankId::Bank0).unwrap().0, BankState::Erased);
        assert_eq!(mfs.bank_get_state(BankId::Bank1).unwrap().0, BankState::Erased);
    }

    #[test]
    fn written_header_reads_back_ok() {
        let mut mfs = driver(SimFlash::new());
        mfs.bank_write_header(BankId::Bank1, 42).unwrap();
        assert_eq!(
            mfs.bank_get_state(BankId::Bank1).unwrap(),
            (BankState::Ok, 42)
        );
    }

    #[test]
    fn residue_behind_erased_header_is_garbage() {
        let mut flash = SimFlash::new();
        flash.program(100, &[0x00]).unwrap();

        let mut mfs = driver(flash);
        assert_eq!(mfs.bank_get_state(BankId::Bank0).unwrap().0, BankState::Garbage);
    }

    #[test]
    fn weak_checking_trusts_the_header() {
        let mut flash = SimFlash::new();
        flash.program(100, &[0x00]).unwrap();

        let mut cfg = test_config();
        cfg.strong_checking = false;
        let mut mfs = TestMfs::new(flash, cfg).unwrap();
        assert_eq!(mfs.bank_get_state(BankId::Bank0).unwrap().0, BankState::Erased);
    }

    #[test]
    fn erase_restores_bank() {
        let mut mfs = driver(SimFlash::new());
        mfs.bank_write_header(BankId::Bank0, 3).unwrap();
        mfs.bank_erase(BankId::Bank0).unwrap();
        assert!(mfs.bank_verify_erased(BankId::Bank0).unwrap());
    }

    #[test]
    fn erase_failure_is_fatal() {
        let mut flash = SimFlash::new();
        flash.fail_erase = true;

        let mut mfs = driver(flash);
        assert_eq!(mfs.bank_erase(BankId::Bank1), Err(MfsError::FlashFailure));
        assert_eq!(mfs.state, DriverState::Error);
    }

    #[test]
    fn zeros_polarity_header() {
        let mut mfs = driver(SimFlash::with_erased(Erased::Zeros));
        assert_eq!(mfs.bank_get_state(BankId::Bank0).unwrap().0, BankState::Erased);

        mfs.bank_write_header(BankId::Bank0, 1).unwrap();
        assert_eq!(
            mfs.bank_get_state(BankId::Bank0).unwrap(),
            (BankState::Ok, 1)
        );
    }
}
