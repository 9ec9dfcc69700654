use core::marker::PhantomData;

use crate::mfs::config::{
    DEFAULT_ALIGNMENT, DEFAULT_BUFFER_SIZE, DEFAULT_MAX_RECORDS, DEFAULT_MAX_REPAIR_ATTEMPTS,
    DEFAULT_TRANSACTION_MAX, MfsConfig,
};

// Builder states
pub struct NeedBank0;
pub struct NeedBank1;
pub struct NeedBankSize;
pub struct Ready;

/// Typestate builder for [`MfsConfig`].
///
/// Bank placement and bank size are mandatory and must be given in order;
/// everything else has a default and can be overridden once the builder
/// is `Ready`.
///
/// ```
/// use embedded_mfs::mfs::MfsConfigBuilder;
///
/// let config = MfsConfigBuilder::new()
///     .bank0(0, 1)
///     .bank1(1, 1)
///     .bank_size(4096)
///     .max_records(16)
///     .alignment(4)
///     .build();
///
/// assert_eq!(config.max_records, 16);
/// ```
pub struct MfsConfigBuilder<State> {
    config: MfsConfig,
    _state: PhantomData<State>,
}

impl<State> MfsConfigBuilder<State> {
    fn into_state<Next>(self) -> MfsConfigBuilder<Next> {
        MfsConfigBuilder {
            config: self.config,
            _state: PhantomData,
        }
    }
}

// Start the builder
impl MfsConfigBuilder<NeedBank0> {
    pub fn new() -> Self {
        MfsConfigBuilder {
            config: MfsConfig {
                bank0_start: 0,
                bank0_sectors: 0,
                bank1_start: 0,
                bank1_sectors: 0,
                bank_size: 0,
                max_records: DEFAULT_MAX_RECORDS,
                max_repair_attempts: DEFAULT_MAX_REPAIR_ATTEMPTS,
                write_verify: true,
                strong_checking: true,
                buffer_size: DEFAULT_BUFFER_SIZE,
                alignment: DEFAULT_ALIGNMENT,
                transaction_max: DEFAULT_TRANSACTION_MAX,
            },
            _state: PhantomData,
        }
    }

    /// Place bank 0 at `sectors` sectors starting from sector `start`.
    pub fn bank0(mut self, start: u32, sectors: u32) -> MfsConfigBuilder<NeedBank1> {
        self.config.bank0_start = start;
        self.config.bank0_sectors = sectors;
        self.into_state()
    }
}

impl Default for MfsConfigBuilder<NeedBank0> {
    fn default() -> Self {
        Self::new()
    }
}

// Set bank 1
impl MfsConfigBuilder<NeedBank1> {
    /// Place bank 1 at `sectors` sectors starting from sector `start`.
    pub fn bank1(mut self, start: u32, sectors: u32) -> MfsConfigBuilder<NeedBankSize> {
        self.config.bank1_start = start;
        self.config.bank1_sectors = sectors;
        self.into_state()
    }
}

// Set bank size
impl MfsConfigBuilder<NeedBankSize> {
    /// Usable size of each bank in bytes.
    pub fn bank_size(mut self, bytes: u32) -> MfsConfigBuilder<Ready> {
        self.config.bank_size = bytes;
        self.into_state()
    }
}

// Optional settings
impl MfsConfigBuilder<Ready> {
    pub fn max_records(mut self, n: u16) -> Self {
        self.config.max_records = n;
        self
    }

    pub fn max_repair_attempts(mut self, n: u32) -> Self {
        self.config.max_repair_attempts = n;
        self
    }

    pub fn write_verify(mut self, enabled: bool) -> Self {
        self.config.write_verify = enabled;
        self
    }

    pub fn strong_checking(mut self, enabled: bool) -> Self {
        self.config.strong_checking = enabled;
        self
    }

    pub fn buffer_size(mut self, bytes: usize) -> Self {
        self.config.buffer_size = bytes;
        self
    }

    pub fn alignment(mut self, bytes: u32) -> Self {
        self.config.alignment = bytes;
        self
    }

    pub fn transaction_max(mut self, n: usize) -> Self {
        self.config.transaction_max = n;
        self
    }

    /// Finish the configuration. Validation against the flash geometry
    /// happens in [`Mfs::new`](crate::mfs::Mfs::new).
    pub fn build(self) -> MfsConfig {
        self.config
    }
}
