use crate::mfs::{
    BankId, FlashDescriptor, MfsError, Offset,
    layout::{BANK_HEADER_SIZE, DATA_HEADER_SIZE, align_up},
};

pub const DEFAULT_MAX_RECORDS: u16 = 32;
pub const DEFAULT_MAX_REPAIR_ATTEMPTS: u32 = 3;
pub const DEFAULT_BUFFER_SIZE: usize = 32;
pub const DEFAULT_ALIGNMENT: u32 = 2;
pub const DEFAULT_TRANSACTION_MAX: usize = 16;

/// Smallest accepted I/O chunk buffer.
pub const MIN_BUFFER_SIZE: usize = 16;

/// Runtime configuration of a managed partition.
///
/// Use [`MfsConfigBuilder`](crate::mfs::MfsConfigBuilder) to construct one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MfsConfig {
    /// First sector of bank 0.
    pub bank0_start: u32,
    /// Number of sectors in bank 0.
    pub bank0_sectors: u32,
    /// First sector of bank 1.
    pub bank1_start: u32,
    /// Number of sectors in bank 1.
    pub bank1_sectors: u32,
    /// Usable bank size in bytes, at most the sector span of each bank.
    pub bank_size: u32,
    /// Highest record identifier, records use `1..=max_records`.
    pub max_records: u16,
    /// Mount attempts before giving up.
    pub max_repair_attempts: u32,
    /// Read back and compare every program.
    pub write_verify: bool,
    /// Double check apparently erased banks sector by sector.
    pub strong_checking: bool,
    /// I/O chunk size in bytes, a power of two no smaller than 16.
    pub buffer_size: usize,
    /// Record alignment in bytes, a power of two.
    pub alignment: u32,
    /// Maximum operations in one transaction.
    pub transaction_max: usize,
}

impl MfsConfig {
    /// Checks the configuration against the device and the driver capacities.
    ///
    /// `mr`, `tm` and `buf` are the descriptor table, transaction and
    /// buffer capacities of the driver instance.
    pub fn validate(
        &self,
        flash: &FlashDescriptor,
        mr: usize,
        tm: usize,
        buf: usize,
    ) -> Result<(), MfsError> {
        if !self.buffer_size.is_power_of_two()
            || self.buffer_size < MIN_BUFFER_SIZE
            || self.buffer_size > buf
        {
            return Err(MfsError::InvalidConfig);
        }

        if !self.alignment.is_power_of_two()
            || self.alignment as usize > self.buffer_size
            || self.alignment < flash.write_size.max(1)
        {
            return Err(MfsError::InvalidConfig);
        }

        if self.max_records == 0 || self.max_records as usize > mr {
            return Err(MfsError::InvalidConfig);
        }

        if self.transaction_max > tm || self.max_repair_attempts == 0 {
            return Err(MfsError::InvalidConfig);
        }

        self.validate_banks(flash)
    }

    fn validate_banks(&self, flash: &FlashDescriptor) -> Result<(), MfsError> {
        if self.bank0_sectors == 0 || self.bank1_sectors == 0 {
            return Err(MfsError::InvalidConfig);
        }

        let end0 = self
            .bank0_start
            .checked_add(self.bank0_sectors)
            .ok_or(MfsError::InvalidConfig)?;
        let end1 = self
            .bank1_start
            .checked_add(self.bank1_sectors)
            .ok_or(MfsError::InvalidConfig)?;

        if end0 > flash.sector_count || end1 > flash.sector_count {
            return Err(MfsError::InvalidConfig);
        }

        // Sector ranges must not overlap.
        if self.bank0_start < end1 && self.bank1_start < end0 {
            return Err(MfsError::InvalidConfig);
        }

        let span0 = self.bank0_sectors.checked_mul(flash.sector_size);
        let span1 = self.bank1_sectors.checked_mul(flash.sector_size);
        match (span0, span1) {
            (Some(a), Some(b)) if self.bank_size <= a && self.bank_size <= b => {}
            _ => return Err(MfsError::InvalidConfig),
        }

        let minimum = self
            .aligned_bank_header()
            .checked_add(self.aligned_record(0).ok_or(MfsError::InvalidConfig)? * 2)
            .ok_or(MfsError::InvalidConfig)?;
        if self.bank_size < minimum || self.bank_size % self.alignment != 0 {
            return Err(MfsError::InvalidConfig);
        }

        // Every bank end must be addressable.
        if flash.total_size().is_none() {
            return Err(MfsError::InvalidConfig);
        }

        Ok(())
    }

    /// First sector and sector count of `bank`.
    #[inline]
    pub fn bank_sectors(&self, bank: BankId) -> (u32, u32) {
        match bank {
            BankId::Bank0 => (self.bank0_start, self.bank0_sectors),
            BankId::Bank1 => (self.bank1_start, self.bank1_sectors),
        }
    }

    /// Absolute offset of the first byte of `bank`.
    #[inline]
    pub fn bank_offset(&self, flash: &FlashDescriptor, bank: BankId) -> Result<Offset, MfsError> {
        let (start, _) = self.bank_sectors(bank);
        flash.sector_offset(start).ok_or(MfsError::Internal)
    }

    /// Bank header size rounded to the record alignment.
    #[inline]
    pub fn aligned_bank_header(&self) -> u32 {
        // Alignment is bounded by the buffer size, so this cannot overflow.
        align_up(BANK_HEADER_SIZE as u32, self.alignment).unwrap_or(u32::MAX)
    }

    /// Header plus `payload` bytes rounded to the record alignment.
    #[inline]
    pub fn aligned_record(&self, payload: u32) -> Option<u32> {
        (DATA_HEADER_SIZE as u32)
            .checked_add(payload)
            .and_then(|n| align_up(n, self.alignment))
    }

    #[inline]
    pub(crate) fn id_index(&self, id: u16) -> Result<usize, MfsError> {
        if id == 0 || id > self.max_records {
            return Err(MfsError::InvalidId);
        }
        Ok(id as usize - 1)
    }
}
