use crate::mfs::MfsError;

/// Absolute byte offset into the flash device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Offset(pub u32);

impl Offset {
    /// Offset zero, used by descriptors to mean "no instance".
    pub const NONE: Offset = Offset(0);

    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Adds `n` bytes, failing with [`MfsError::Internal`] on overflow.
    #[inline]
    pub fn checked_add(self, n: u32) -> Result<Offset, MfsError> {
        self.0.checked_add(n).map(Offset).ok_or(MfsError::Internal)
    }

    /// Bytes between `self` and a later offset `end`, zero if `end` is behind.
    #[inline]
    pub fn distance_to(self, end: Offset) -> u32 {
        end.0.saturating_sub(self.0)
    }
}

/// One of the two symmetric banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankId {
    Bank0,
    Bank1,
}

impl BankId {
    /// The bank that is not `self`.
    #[inline]
    pub fn other(self) -> BankId {
        match self {
            BankId::Bank0 => BankId::Bank1,
            BankId::Bank1 => BankId::Bank0,
        }
    }
}

/// Classification of a bank from its header (and, if needed, its content).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankState {
    /// Header and (when strongly checked) the whole bank hold the erased value.
    Erased,
    /// Header magics, counter and CRC are valid.
    Ok,
    /// Anything else.
    Garbage,
}

/// Driver state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Created or stopped, not mounted.
    Stop,
    /// Mounted, normal mode.
    Ready,
    /// Mounted, buffering a transaction.
    Transaction,
    /// A fatal error occurred; only `start` leaves this state.
    Error,
}

/// Successful outcome of a driver call.
///
/// Warnings do not block progress, they only report extra work that
/// happened on the caller's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Completed without side effects.
    Done,
    /// Mount had to erase or rewrite a bank.
    Repaired,
    /// The operation ran a garbage collection first.
    GarbageCollected,
}

impl Status {
    /// Returns true for any warning status.
    #[inline]
    pub fn is_warning(&self) -> bool {
        !matches!(self, Status::Done)
    }
}
