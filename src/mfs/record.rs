use log::{debug, error};

use crate::mfs::{
    DriverState, FlashDevice, MfsError, Offset, Status,
    crc::crc16,
    fields::FieldReader,
    layout::{DATA_HEADER_SIZE, DataHeader, MAGIC_SIZE},
};

use super::driver::Mfs;

impl<D, const MR: usize, const TM: usize, const BUF: usize> Mfs<D, MR, TM, BUF>
where
    D: FlashDevice,
    bitmaps::BitsImpl<MR>: bitmaps::Bits,
{
    /// Reads record `id` into `buf` and returns its size.
    ///
    /// The payload CRC is checked again on every read; a mismatch means
    /// the flash degraded and is treated as fatal.
    pub fn read_record(&mut self, id: u16, buf: &mut [u8]) -> Result<usize, MfsError> {
        self.ensure_mounted()?;
        let index = self.config.id_index(id)?;
        let d = self.descriptors.get(index).ok_or(MfsError::NotFound)?;

        let size = d.size as usize;
        if buf.len() < size {
            return Err(MfsError::InvalidSize);
        }

        let mut raw = [0u8; DATA_HEADER_SIZE];
        self.flash_read(d.offset, &mut raw)?;
        let stored = FieldReader::new(&raw).read_u16_at(10);

        let payload = &mut buf[..size];
        self.flash_read(d.offset.checked_add(DATA_HEADER_SIZE as u32)?, payload)?;

        if crc16(payload) != stored {
            error!("mfs: record {} failed CRC check", id);
            self.state = DriverState::Error;
            return Err(MfsError::FlashFailure);
        }

        Ok(size)
    }

    /// Writes a new instance of record `id`.
    ///
    /// Inside a transaction the write is buffered until commit.
    /// Returns [`Status::GarbageCollected`] if the bank had to be
    /// compacted to make room.
    pub fn write_record(&mut self, id: u16, data: &[u8]) -> Result<Status, MfsError> {
        self.ensure_mounted()?;
        self.config.id_index(id)?;
        if data.is_empty() {
            return Err(MfsError::InvalidSize);
        }

        let size = u32::try_from(data.len()).map_err(|_| MfsError::OutOfMemory)?;
        let len = self.config.aligned_record(size).ok_or(MfsError::OutOfMemory)?;

        match self.state {
            DriverState::Ready => self.write_now(id, data, len),
            DriverState::Transaction => self.transaction_write(id, data, len),
            DriverState::Stop | DriverState::Error => Err(MfsError::InvalidState),
        }
    }

    /// Erases record `id` by appending a tombstone.
    ///
    /// Inside a transaction the erase is buffered until commit.
    pub fn erase_record(&mut self, id: u16) -> Result<Status, MfsError> {
        self.ensure_mounted()?;
        let index = self.config.id_index(id)?;

        match self.state {
            DriverState::Ready => self.erase_now(index, id),
            DriverState::Transaction => self.transaction_erase(index, id),
            DriverState::Stop | DriverState::Error => Err(MfsError::InvalidState),
        }
    }

    /// Programs the header fields and the payload at `at`, leaving the
    /// magic words erased.
    pub(crate) fn write_unsealed(&mut self, at: Offset, id: u16, data: &[u8]) -> Result<(), MfsError> {
        let hdr = DataHeader {
            id,
            crc: crc16(data),
            size: data.len() as u32,
        };
        let raw = hdr.to_bytes();

        self.flash_write(at.checked_add(MAGIC_SIZE as u32)?, &raw[MAGIC_SIZE..])?;
        if !data.is_empty() {
            self.flash_write(at.checked_add(DATA_HEADER_SIZE as u32)?, data)?;
        }
        Ok(())
    }

    /// Programs the magic words of the header at `at`.
    pub(crate) fn seal(&mut self, at: Offset) -> Result<(), MfsError> {
        self.flash_write(at, &DataHeader::magic_bytes())
    }

    /// Compacts first if the free tail cannot take `len` bytes.
    fn make_room(&mut self, len: u32) -> Result<Status, MfsError> {
        if len > self.free_tail()? {
            self.garbage_collect()?;
            return Ok(Status::GarbageCollected);
        }
        Ok(Status::Done)
    }

    fn write_now(&mut self, id: u16, data: &[u8], len: u32) -> Result<Status, MfsError> {
        // Room for one extra header is kept so an erase always fits.
        let dhdr = self.config.aligned_record(0).ok_or(MfsError::Internal)?;
        let needed = len.checked_add(dhdr).ok_or(MfsError::OutOfMemory)?;
        if needed > self.reclaimable_space() {
            return Err(MfsError::OutOfMemory);
        }

        let status = self.make_room(needed)?;

        let at = self.next_offset;
        self.write_unsealed(at, id, data)?;
        self.seal(at)?;

        let index = self.config.id_index(id)?;
        if let Some(old) = self.descriptors.get(index) {
            let old_len = self.config.aligned_record(old.size).ok_or(MfsError::Internal)?;
            self.used_space -= old_len;
        }
        self.used_space += len;
        self.descriptors.set(index, at, data.len() as u32);
        self.next_offset = at.checked_add(len)?;

        debug!("mfs: wrote record {} at {:#x}", id, at.get());
        Ok(status)
    }

    fn erase_now(&mut self, index: usize, id: u16) -> Result<Status, MfsError> {
        let d = self.descriptors.get(index).ok_or(MfsError::NotFound)?;

        let len = self.config.aligned_record(0).ok_or(MfsError::Internal)?;
        if len > self.reclaimable_space() {
            return Err(MfsError::Internal);
        }

        let status = self.make_room(len)?;

        let at = self.next_offset;
        self.write_unsealed(at, id, &[])?;
        self.seal(at)?;

        let old_len = self.config.aligned_record(d.size).ok_or(MfsError::Internal)?;
        self.used_space -= old_len;
        self.descriptors.clear(index);
        self.next_offset = at.checked_add(len)?;

        debug!("mfs: erased record {} at {:#x}", id, at.get());
        Ok(status)
    }
}
