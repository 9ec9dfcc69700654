use log::{error, info, warn};

use crate::mfs::{
    BankId, BankState, DriverState, FlashDevice, MfsError, Status,
    layout::{BANK_HEADER_SIZE, BankHeader},
};

use super::driver::Mfs;

impl<D, const MR: usize, const TM: usize, const BUF: usize> Mfs<D, MR, TM, BUF>
where
    D: FlashDevice,
    bitmaps::BitsImpl<MR>: bitmaps::Bits,
{
    /// One mount attempt: classify both banks, repair, pick the active one
    /// and rebuild the descriptor table.
    fn try_mount(&mut self) -> Result<Status, MfsError> {
        use BankState::{Erased, Garbage, Ok as Valid};

        let (s0, cnt0) = self.bank_get_state(BankId::Bank0)?;
        let (s1, cnt1) = self.bank_get_state(BankId::Bank1)?;
        info!("mfs: bank states {:?}/{:?}", s0, s1);

        let mut repaired = false;

        let active = match (s0, s1) {
            (Erased, Erased) => {
                // Fresh partition
                self.bank_write_header(BankId::Bank0, 1)?;
                BankId::Bank0
            }
            (Erased, Valid) => BankId::Bank1,
            (Valid, Erased) => BankId::Bank0,
            (Valid, Valid) => {
                // Interrupted compaction; the newer bank is complete.
                repaired = true;
                let (keep, stale) = if cnt0 > cnt1 {
                    (BankId::Bank0, BankId::Bank1)
                } else {
                    (BankId::Bank1, BankId::Bank0)
                };
                self.bank_erase(stale)?;
                keep
            }
            (Valid, Garbage) => {
                repaired = true;
                self.bank_erase(BankId::Bank1)?;
                BankId::Bank0
            }
            (Garbage, Valid) => {
                repaired = true;
                self.bank_erase(BankId::Bank0)?;
                BankId::Bank1
            }
            (Erased, Garbage) => {
                repaired = true;
                self.bank_erase(BankId::Bank1)?;
                self.bank_write_header(BankId::Bank0, 1)?;
                BankId::Bank0
            }
            (Garbage, Erased) => {
                repaired = true;
                self.bank_erase(BankId::Bank0)?;
                self.bank_write_header(BankId::Bank1, 1)?;
                BankId::Bank1
            }
            (Garbage, Garbage) => {
                repaired = true;
                self.bank_erase(BankId::Bank0)?;
                self.bank_erase(BankId::Bank1)?;
                self.bank_write_header(BankId::Bank0, 1)?;
                BankId::Bank0
            }
        };

        // Whatever was chosen must now carry a valid header.
        let mut raw = [0u8; BANK_HEADER_SIZE];
        let at = self.config.bank_offset(&self.flash, active)?;
        self.flash_read(at, &mut raw)?;
        let (state, counter) = BankHeader::classify(&raw, self.flash.erased.word());
        if state != Valid {
            error!("mfs: {:?} header invalid after repair", active);
            return Err(MfsError::Internal);
        }

        self.current_bank = active;
        self.current_counter = counter;

        let warning = self.scan_records(active)?;

        let mut used = self.config.aligned_bank_header();
        for (_, d) in self.descriptors.iter_live() {
            let record = self.config.aligned_record(d.size).ok_or(MfsError::Internal)?;
            used = used.checked_add(record).ok_or(MfsError::Internal)?;
        }
        self.used_space = used;

        if warning {
            warn!("mfs: anomalies in {:?}, compacting", active);
            self.garbage_collect()?;
            repaired = true;
        }

        Ok(if repaired { Status::Repaired } else { Status::Done })
    }

    /// Mounts with up to `max_repair_attempts` attempts.
    ///
    /// An internal inconsistency ends the retries at once. If every
    /// attempt fails the driver stays in the error state.
    pub(crate) fn mount(&mut self) -> Result<Status, MfsError> {
        self.transaction.clear();

        for attempt in 1..=self.config.max_repair_attempts {
            self.state = DriverState::Stop;
            match self.try_mount() {
                Ok(status) => {
                    info!(
                        "mfs: mounted {:?}, counter {}, {} records",
                        self.current_bank,
                        self.current_counter,
                        self.descriptors.live_count()
                    );
                    self.state = DriverState::Ready;
                    return Ok(status);
                }
                Err(MfsError::Internal) => {
                    self.state = DriverState::Error;
                    return Err(MfsError::Internal);
                }
                Err(e) => {
                    warn!("mfs: mount attempt {} failed: {}", attempt, e);
                }
            }
        }

        error!("mfs: mount failed");
        self.descriptors.reset();
        self.state = DriverState::Error;
        Err(MfsError::FlashFailure)
    }
}
