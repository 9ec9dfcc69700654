use log::{trace, warn};

use crate::mfs::{
    BankId, FlashDevice, MfsError, Offset,
    crc::Crc16,
    layout::{DATA_HEADER_SIZE, RawDataHeader},
};

use super::driver::Mfs;

impl<D, const MR: usize, const TM: usize, const BUF: usize> Mfs<D, MR, TM, BUF>
where
    D: FlashDevice,
    bitmaps::BitsImpl<MR>: bitmaps::Bits,
{
    /// CRC of `len` payload bytes at `offset`, read through the I/O buffer.
    pub(crate) fn payload_crc(&mut self, offset: Offset, len: u32) -> Result<u16, MfsError> {
        let bs = self.config.buffer_size as u32;
        let mut crc = Crc16::new();
        let mut at = offset.get();
        let mut remaining = len;

        while remaining > 0 {
            let n = remaining.min(bs) as usize;
            let result = self.device.read(at, &mut self.buffer[..n]);
            result.map_err(|e| self.flash_failure(e))?;
            crc.update(&self.buffer[..n]);
            at += n as u32;
            remaining -= n as u32;
        }

        Ok(crc.finalize())
    }

    /// Rebuilds the descriptor table from the records in `bank`.
    ///
    /// Walks headers from the start of the bank until the erased frontier
    /// and leaves `next_offset` there. A later instance of an identifier
    /// replaces an earlier one; a tombstone removes it. Returns `true` if
    /// anything suspicious was met: an unsealed or corrupt header stops
    /// the walk, a bad payload CRC skips that instance.
    pub(crate) fn scan_records(&mut self, bank: BankId) -> Result<bool, MfsError> {
        self.descriptors.reset();

        let erased = self.flash.erased.word();
        let end = self.bank_end(bank)?;
        let mut at = self
            .config
            .bank_offset(&self.flash, bank)?
            .checked_add(self.config.aligned_bank_header())?;
        let mut warning = false;

        while at.distance_to(end) >= DATA_HEADER_SIZE as u32 {
            let mut raw = [0u8; DATA_HEADER_SIZE];
            self.flash_read(at, &mut raw)?;

            let hdr = match RawDataHeader::decode(&raw, erased) {
                RawDataHeader::Erased => break,
                RawDataHeader::Unsealed => {
                    warn!("mfs: unsealed header at {:#x}", at.get());
                    warning = true;
                    break;
                }
                RawDataHeader::Sealed(hdr) => hdr,
            };

            let Ok(index) = self.config.id_index(hdr.id) else {
                warn!("mfs: bad record id {} at {:#x}", hdr.id, at.get());
                warning = true;
                break;
            };

            let payload = at.checked_add(DATA_HEADER_SIZE as u32)?;
            if hdr.size > payload.distance_to(end) {
                warn!("mfs: record size {} overruns bank at {:#x}", hdr.size, at.get());
                warning = true;
                break;
            }
            let advance = self
                .config
                .aligned_record(hdr.size)
                .ok_or(MfsError::Internal)?;

            if self.payload_crc(payload, hdr.size)? != hdr.crc {
                warn!("mfs: CRC mismatch on record {} at {:#x}", hdr.id, at.get());
                warning = true;
            } else if hdr.size == 0 {
                trace!("mfs: record {} erased", hdr.id);
                self.descriptors.clear(index);
            } else {
                trace!("mfs: record {} at {:#x}", hdr.id, at.get());
                self.descriptors.set(index, at, hdr.size);
            }

            at = at.checked_add(advance)?;
        }

        self.next_offset = at;
        Ok(warning)
    }
}
