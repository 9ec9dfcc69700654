use log::{debug, info};

use crate::mfs::{
    BankId, DriverState, FlashDescriptor, FlashDevice, MfsConfig, MfsError, Offset, Status,
    descriptors::DescriptorTable, transaction::TransactionLog,
};

/// Managed flash storage driver.
///
/// Stores up to `max_records` variable-size records in two flash banks
/// and keeps them consistent across power loss.
///
/// # Const Generics
/// - `MR`: Descriptor table capacity, bounds `max_records`
/// - `TM`: Transaction operation capacity, bounds `transaction_max`
/// - `BUF`: I/O chunk buffer capacity, bounds `buffer_size`
///
/// # Type Parameters
/// - `D`: Flash device the banks live on
///
/// The driver owns its device. Use [`Mfs::release`] to get it back.
pub struct Mfs<D, const MR: usize, const TM: usize, const BUF: usize = 32>
where
    D: FlashDevice,
    bitmaps::BitsImpl<MR>: bitmaps::Bits,
{
    pub(crate) device: D,
    pub(crate) flash: FlashDescriptor,
    pub(crate) config: MfsConfig,
    pub(crate) state: DriverState,
    pub(crate) current_bank: BankId,
    pub(crate) current_counter: u32,
    pub(crate) next_offset: Offset,
    pub(crate) used_space: u32,
    pub(crate) descriptors: DescriptorTable<MR>,
    pub(crate) transaction: TransactionLog<TM>,
    pub(crate) buffer: [u8; BUF],
}

impl<D, const MR: usize, const TM: usize, const BUF: usize> core::fmt::Debug
    for Mfs<D, MR, TM, BUF>
where
    D: FlashDevice,
    bitmaps::BitsImpl<MR>: bitmaps::Bits,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Mfs")
            .field("state", &self.state)
            .field("bank", &self.current_bank)
            .field("counter", &self.current_counter)
            .field("next_offset", &self.next_offset)
            .field("used_space", &self.used_space)
            .finish_non_exhaustive()
    }
}

impl<D, const MR: usize, const TM: usize, const BUF: usize> Mfs<D, MR, TM, BUF>
where
    D: FlashDevice,
    bitmaps::BitsImpl<MR>: bitmaps::Bits,
{
    /// Creates a stopped driver after checking `config` against the device.
    ///
    /// On failure the device is handed back along with the error.
    pub fn new(device: D, config: MfsConfig) -> Result<Self, (D, MfsError)> {
        let flash = device.descriptor();
        if let Err(e) = config.validate(&flash, MR, TM, BUF) {
            return Err((device, e));
        }

        Ok(Self {
            device,
            flash,
            config,
            state: DriverState::Stop,
            current_bank: BankId::Bank0,
            current_counter: 0,
            next_offset: Offset::NONE,
            used_space: 0,
            descriptors: DescriptorTable::new(),
            transaction: TransactionLog::new(),
            buffer: [0; BUF],
        })
    }

    /// Mounts the partition, repairing it if needed.
    ///
    /// Allowed from any state except an open transaction. Returns
    /// [`Status::Repaired`] if the banks had to be fixed or compacted.
    pub fn start(&mut self) -> Result<Status, MfsError> {
        if self.state == DriverState::Transaction {
            return Err(MfsError::InvalidState);
        }

        info!("mfs: mounting");
        self.mount()
    }

    /// Unmounts the partition. Pending transaction operations are dropped;
    /// their unsealed headers are discarded by the next mount.
    pub fn stop(&mut self) {
        debug!("mfs: stopping");
        self.transaction.clear();
        self.descriptors.reset();
        self.state = DriverState::Stop;
    }

    /// Stops the driver and returns the flash device.
    pub fn release(mut self) -> D {
        self.stop();
        self.device
    }

    /// Erases both banks and mounts an empty partition.
    pub fn erase_all(&mut self) -> Result<Status, MfsError> {
        if self.state != DriverState::Ready {
            return Err(MfsError::InvalidState);
        }

        info!("mfs: erasing partition");
        self.bank_erase(BankId::Bank0)?;
        self.bank_erase(BankId::Bank1)?;
        self.mount()
    }

    /// Compacts the active bank into the other one.
    pub fn perform_gc(&mut self) -> Result<Status, MfsError> {
        if self.state != DriverState::Ready {
            return Err(MfsError::InvalidState);
        }

        self.garbage_collect()?;
        Ok(Status::GarbageCollected)
    }

    #[inline]
    pub fn state(&self) -> DriverState {
        self.state
    }

    #[inline]
    pub fn config(&self) -> &MfsConfig {
        &self.config
    }

    /// Bank holding the current data set.
    #[inline]
    pub fn active_bank(&self) -> BankId {
        self.current_bank
    }

    /// Generation counter of the active bank.
    #[inline]
    pub fn counter(&self) -> u32 {
        self.current_counter
    }

    /// Bytes taken by the bank header and all live records.
    #[inline]
    pub fn used_space(&self) -> u32 {
        self.used_space
    }

    /// Offset where the next record header will be written.
    #[inline]
    pub fn next_offset(&self) -> Offset {
        self.next_offset
    }

    /// Payload size of record `id`.
    pub fn record_size(&self, id: u16) -> Result<usize, MfsError> {
        self.ensure_mounted()?;
        let index = self.config.id_index(id)?;
        self.descriptors
            .get(index)
            .map(|d| d.size as usize)
            .ok_or(MfsError::NotFound)
    }

    /// Identifiers of all live records in ascending order.
    pub fn live_records(&self) -> impl Iterator<Item = u16> + '_ {
        self.descriptors
            .iter_live()
            .map(|(index, _)| index as u16 + 1)
    }

    /// Fails unless the driver is mounted, in normal or transaction mode.
    #[inline]
    pub(crate) fn ensure_mounted(&self) -> Result<(), MfsError> {
        match self.state {
            DriverState::Ready | DriverState::Transaction => Ok(()),
            DriverState::Stop | DriverState::Error => Err(MfsError::InvalidState),
        }
    }

    /// First byte past the usable area of `bank`.
    #[inline]
    pub(crate) fn bank_end(&self, bank: BankId) -> Result<Offset, MfsError> {
        self.config
            .bank_offset(&self.flash, bank)?
            .checked_add(self.config.bank_size)
    }

    /// Bytes left between the write frontier and the end of the active bank.
    #[inline]
    pub(crate) fn free_tail(&self) -> Result<u32, MfsError> {
        Ok(self.next_offset.distance_to(self.bank_end(self.current_bank)?))
    }

    /// Bytes that compaction could make available.
    #[inline]
    pub(crate) fn reclaimable_space(&self) -> u32 {
        self.config.bank_size.saturating_sub(self.used_space)
    }
}
