//! Test support utilities - only compiled in test builds.

use crate::mfs::{
    Erased, FlashDescriptor, FlashDevice, FlashError, MfsConfig, MfsConfigBuilder, MfsError,
    Status, driver::Mfs, layout::DataHeader,
};

pub const SIM_SECTOR_SIZE: usize = 4096;
pub const SIM_SECTORS: usize = 4;
const SIM_SIZE: usize = SIM_SECTOR_SIZE * SIM_SECTORS;

/// Standard test driver: 16 records, 8 transaction operations, 32-byte buffer
pub type TestMfs = Mfs<SimFlash, 16, 8, 32>;

/// In-memory flash with NOR programming semantics.
///
/// Programming can only move bits away from the erased value. Power loss
/// is simulated with a program budget: once it runs out every program
/// fails without touching memory.
pub struct SimFlash {
    mem: [u8; SIM_SIZE],
    erased: Erased,
    program_budget: Option<usize>,
    erase_budget: Option<usize>,
    /// Every read fails.
    pub fail_reads: bool,
    /// Every erase fails.
    pub fail_erase: bool,
    /// A byte that ignores programming, to exercise write verification.
    pub stuck_byte: Option<u32>,
}

impl core::fmt::Debug for SimFlash {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimFlash").finish_non_exhaustive()
    }
}

impl SimFlash {
    pub fn new() -> Self {
        Self::with_erased(Erased::Ones)
    }

    pub fn with_erased(erased: Erased) -> Self {
        Self {
            mem: [erased.byte(); SIM_SIZE],
            erased,
            program_budget: None,
            erase_budget: None,
            fail_reads: false,
            fail_erase: false,
            stuck_byte: None,
        }
    }

    /// Allow `n` more programs, then fail the rest.
    pub fn cut_power_after(&mut self, n: usize) {
        self.program_budget = Some(n);
    }

    /// Allow `n` more sector erases, then fail the rest.
    pub fn fail_erase_after(&mut self, n: usize) {
        self.erase_budget = Some(n);
    }

    /// Clears every injected fault.
    pub fn restore_power(&mut self) {
        self.program_budget = None;
        self.erase_budget = None;
        self.fail_reads = false;
        self.fail_erase = false;
    }

    pub fn bytes(&self, offset: u32, len: usize) -> &[u8] {
        &self.mem[offset as usize..offset as usize + len]
    }

    pub fn is_erased(&self, offset: u32, len: usize) -> bool {
        self.bytes(offset, len).iter().all(|&b| b == self.erased.byte())
    }

    fn range(offset: u32, len: usize) -> Result<core::ops::Range<usize>, FlashError> {
        let start = offset as usize;
        let end = start.checked_add(len).ok_or(FlashError::OutOfBounds)?;
        if end > SIM_SIZE {
            return Err(FlashError::OutOfBounds);
        }
        Ok(start..end)
    }

    fn take(budget: &mut Option<usize>) -> bool {
        match budget {
            None => true,
            Some(0) => false,
            Some(n) => {
                *n -= 1;
                true
            }
        }
    }
}

impl Default for SimFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl FlashDevice for SimFlash {
    fn descriptor(&self) -> FlashDescriptor {
        FlashDescriptor {
            sector_count: SIM_SECTORS as u32,
            sector_size: SIM_SECTOR_SIZE as u32,
            erased: self.erased,
            write_size: 1,
        }
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        if self.fail_reads {
            return Err(FlashError::Read);
        }
        let range = Self::range(offset, buf.len())?;
        buf.copy_from_slice(&self.mem[range]);
        Ok(())
    }

    fn program(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError> {
        let range = Self::range(offset, data.len())?;
        if !Self::take(&mut self.program_budget) {
            return Err(FlashError::Program);
        }

        for (i, (cell, &b)) in self.mem[range].iter_mut().zip(data).enumerate() {
            if self.stuck_byte == Some(offset + i as u32) {
                continue;
            }
            match self.erased {
                Erased::Ones => *cell &= b,
                Erased::Zeros => *cell |= b,
            }
        }
        Ok(())
    }

    fn start_erase_sector(&mut self, sector: u32) -> Result<(), FlashError> {
        if self.fail_erase || !Self::take(&mut self.erase_budget) {
            return Err(FlashError::Erase);
        }
        let start = sector as usize * SIM_SECTOR_SIZE;
        let range = Self::range(start as u32, SIM_SECTOR_SIZE)?;
        self.mem[range].fill(self.erased.byte());
        Ok(())
    }

    fn wait_erase(&mut self) -> Result<(), FlashError> {
        Ok(())
    }

    fn verify_erase(&mut self, sector: u32) -> Result<(), FlashError> {
        let start = sector as usize * SIM_SECTOR_SIZE;
        let range = Self::range(start as u32, SIM_SECTOR_SIZE)?;
        if self.mem[range].iter().any(|&b| b != self.erased.byte()) {
            return Err(FlashError::Verify);
        }
        Ok(())
    }
}

/// Two single-sector banks of 4 KiB.
pub fn test_config() -> MfsConfig {
    MfsConfigBuilder::new()
        .bank0(0, 1)
        .bank1(1, 1)
        .bank_size(4096)
        .max_records(16)
        .transaction_max(8)
        .build()
}

/// Creates a driver on `flash` and mounts it, returning the mount result.
pub fn start_on(flash: SimFlash) -> (TestMfs, Result<Status, MfsError>) {
    let mut mfs = TestMfs::new(flash, test_config()).unwrap();
    let status = mfs.start();
    (mfs, status)
}

/// A driver mounted on blank flash.
pub fn mounted() -> TestMfs {
    let (mfs, status) = start_on(SimFlash::new());
    status.unwrap();
    mfs
}

/// Simulates a reboot: takes the flash back, clears faults, mounts again.
pub fn remount<const MR: usize, const TM: usize, const BUF: usize>(
    mfs: Mfs<SimFlash, MR, TM, BUF>,
) -> (Mfs<SimFlash, MR, TM, BUF>, Result<Status, MfsError>)
where
    bitmaps::BitsImpl<MR>: bitmaps::Bits,
{
    let config = *mfs.config();
    let mut flash = mfs.release();
    flash.restore_power();
    let mut mfs = Mfs::new(flash, config).unwrap();
    let status = mfs.start();
    (mfs, status)
}

/// Reads record `id`, asserting it is exactly `N` bytes long.
pub fn read_back<const N: usize>(mfs: &mut TestMfs, id: u16) -> [u8; N] {
    let mut buf = [0u8; N];
    assert_eq!(mfs.read_record(id, &mut buf), Ok(N));
    buf
}

/// Deterministic test payload.
pub fn pattern<const N: usize>(seed: u8) -> [u8; N] {
    core::array::from_fn(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
}

/// Programs a sealed record directly, returning the next aligned offset
/// for the 2-byte alignment of [`test_config`].
pub fn program_record(flash: &mut SimFlash, at: u32, id: u16, data: &[u8]) -> u32 {
    let hdr = DataHeader {
        id,
        crc: crate::mfs::crc::crc16(data),
        size: data.len() as u32,
    };
    flash.program(at, &hdr.to_bytes()).unwrap();
    flash.program(at + 16, data).unwrap();
    (at + 16 + data.len() as u32 + 1) & !1
}
