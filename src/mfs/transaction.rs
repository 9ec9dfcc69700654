use heapless::Vec;
use log::{debug, info};

use crate::mfs::{DriverState, FlashDevice, MfsError, Offset, Status, layout::align_up};

use super::driver::Mfs;

/// One buffered transaction operation, written but not yet sealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TransactionOp {
    /// Header offset of the unsealed record.
    pub offset: Offset,
    /// Payload size, zero for an erase.
    pub size: u32,
    pub id: u16,
}

/// Fixed-capacity log of the operations of the open transaction.
///
/// `TM` is the maximum number of operations.
pub(crate) struct TransactionLog<const TM: usize> {
    ops: Vec<TransactionOp, TM>,
    next: Offset,
    limit: Offset,
}

impl<const TM: usize> TransactionLog<TM> {
    pub(crate) const fn new() -> Self {
        Self {
            ops: Vec::new(),
            next: Offset::NONE,
            limit: Offset::NONE,
        }
    }

    /// Opens a reservation covering `start..limit`.
    pub(crate) fn begin(&mut self, start: Offset, limit: Offset) {
        self.ops.clear();
        self.next = start;
        self.limit = limit;
    }

    pub(crate) fn clear(&mut self) {
        self.ops.clear();
        self.next = Offset::NONE;
        self.limit = Offset::NONE;
    }

    /// Next write position inside the reservation.
    #[inline]
    pub(crate) fn next(&self) -> Offset {
        self.next
    }

    /// Bytes left in the reservation.
    #[inline]
    pub(crate) fn remaining(&self) -> u32 {
        self.next.distance_to(self.limit)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.ops.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[inline]
    pub(crate) fn op(&self, index: usize) -> TransactionOp {
        self.ops[index]
    }

    /// Appends an operation that took `len` bytes of the reservation.
    pub(crate) fn push(&mut self, op: TransactionOp, len: u32) -> Result<(), MfsError> {
        self.ops.push(op).map_err(|_| MfsError::TransactionNum)?;
        self.next = self.next.checked_add(len)?;
        Ok(())
    }
}

impl<D, const MR: usize, const TM: usize, const BUF: usize> Mfs<D, MR, TM, BUF>
where
    D: FlashDevice,
    bitmaps::BitsImpl<MR>: bitmaps::Bits,
{
    /// Opens a transaction that may use up to `size` bytes of records,
    /// headers included.
    ///
    /// The space is reserved contiguously, compacting first if needed.
    /// Until [`Mfs::commit_transaction`] nothing written in the transaction
    /// is visible, neither to reads nor to a later mount.
    pub fn start_transaction(&mut self, size: usize) -> Result<Status, MfsError> {
        if self.state != DriverState::Ready {
            return Err(MfsError::InvalidState);
        }

        let dhdr = self.config.aligned_record(0).ok_or(MfsError::Internal)?;
        let size = u32::try_from(size).map_err(|_| MfsError::OutOfMemory)?;
        if size <= dhdr {
            return Err(MfsError::InvalidSize);
        }

        let tspace = align_up(size, self.config.alignment)
            .ok_or(MfsError::OutOfMemory)?;
        let rspace = tspace.checked_add(dhdr).ok_or(MfsError::OutOfMemory)?;
        if rspace > self.reclaimable_space() {
            return Err(MfsError::OutOfMemory);
        }

        let mut status = Status::Done;
        if rspace > self.free_tail()? {
            self.garbage_collect()?;
            status = Status::GarbageCollected;
        }

        let start = self.next_offset;
        self.transaction.begin(start, start.checked_add(tspace)?);
        self.state = DriverState::Transaction;
        info!("mfs: transaction of {} bytes at {:#x}", tspace, start.get());

        Ok(status)
    }

    /// Buffers a record write inside the open transaction.
    pub(crate) fn transaction_write(
        &mut self,
        id: u16,
        data: &[u8],
        len: u32,
    ) -> Result<Status, MfsError> {
        if self.transaction.len() >= self.config.transaction_max {
            return Err(MfsError::TransactionNum);
        }
        if len > self.transaction.remaining() {
            return Err(MfsError::TransactionSize);
        }

        let at = self.transaction.next();
        let size = data.len() as u32;
        self.write_unsealed(at, id, data)?;
        self.transaction
            .push(TransactionOp { offset: at, size, id }, len)?;

        debug!("mfs: transaction write of record {} at {:#x}", id, at.get());
        Ok(Status::Done)
    }

    /// Buffers a record erase inside the open transaction.
    pub(crate) fn transaction_erase(&mut self, index: usize, id: u16) -> Result<Status, MfsError> {
        if self.descriptors.get(index).is_none() {
            return Err(MfsError::NotFound);
        }
        if self.transaction.len() >= self.config.transaction_max {
            return Err(MfsError::TransactionNum);
        }
        let len = self.config.aligned_record(0).ok_or(MfsError::Internal)?;
        if len > self.transaction.remaining() {
            return Err(MfsError::TransactionSize);
        }

        let at = self.transaction.next();
        self.write_unsealed(at, id, &[])?;
        self.transaction
            .push(TransactionOp { offset: at, size: 0, id }, len)?;

        debug!("mfs: transaction erase of record {} at {:#x}", id, at.get());
        Ok(Status::Done)
    }

    /// Seals every buffered operation and applies it.
    ///
    /// Headers are sealed last to first. The scanner stops at the first
    /// unsealed header, so until the first operation is sealed none of
    /// them is visible to a mount.
    pub fn commit_transaction(&mut self) -> Result<Status, MfsError> {
        if self.state != DriverState::Transaction {
            return Err(MfsError::InvalidState);
        }

        for i in (0..self.transaction.len()).rev() {
            let op = self.transaction.op(i);
            self.seal(op.offset)?;
        }

        self.next_offset = self.transaction.next();
        for i in 0..self.transaction.len() {
            let op = self.transaction.op(i);
            let index = self.config.id_index(op.id).map_err(|_| MfsError::Internal)?;

            if let Some(old) = self.descriptors.get(index) {
                let old_len = self.config.aligned_record(old.size).ok_or(MfsError::Internal)?;
                self.used_space = self.used_space.saturating_sub(old_len);
            }

            if op.size > 0 {
                let len = self.config.aligned_record(op.size).ok_or(MfsError::Internal)?;
                self.used_space = self.used_space.checked_add(len).ok_or(MfsError::Internal)?;
                self.descriptors.set(index, op.offset, op.size);
            } else {
                self.descriptors.clear(index);
            }
        }

        info!("mfs: committed {} operations", self.transaction.len());
        self.transaction.clear();
        self.state = DriverState::Ready;

        Ok(Status::Done)
    }

    /// Abandons the open transaction.
    ///
    /// Anything already written is discarded by compacting the bank.
    pub fn rollback_transaction(&mut self) -> Result<Status, MfsError> {
        if self.state != DriverState::Transaction {
            return Err(MfsError::InvalidState);
        }

        self.state = DriverState::Ready;
        let written = !self.transaction.is_empty();
        info!("mfs: rolling back {} operations", self.transaction.len());
        self.transaction.clear();

        if written {
            self.garbage_collect()?;
            return Ok(Status::GarbageCollected);
        }

        Ok(Status::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mfs::{
        layout::DataHeader,
        test_support::{mounted, read_back, remount, start_on},
    };

    #[test]
    fn log_tracks_reservation() {
        let mut log = TransactionLog::<2>::new();
        log.begin(Offset(100), Offset(160));
        assert_eq!(log.remaining(), 60);

        let op = TransactionOp {
            offset: Offset(100),
            size: 4,
            id: 1,
        };
        log.push(op, 20).unwrap();
        assert_eq!(log.next(), Offset(120));
        assert_eq!(log.remaining(), 40);

        log.push(op, 20).unwrap();
        assert_eq!(log.push(op, 16), Err(MfsError::TransactionNum));
        assert_eq!(log.len(), 2);

        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn start_requires_ready_and_room() {
        let mut mfs = mounted();
        assert_eq!(mfs.start_transaction(16), Err(MfsError::InvalidSize));
        assert_eq!(mfs.start_transaction(5000), Err(MfsError::OutOfMemory));

        assert_eq!(mfs.start_transaction(64), Ok(Status::Done));
        assert_eq!(mfs.state(), DriverState::Transaction);
        assert_eq!(mfs.start_transaction(64), Err(MfsError::InvalidState));
        assert_eq!(mfs.perform_gc(), Err(MfsError::InvalidState));
    }

    #[test]
    fn uncommitted_writes_are_invisible() {
        let mut mfs = mounted();
        mfs.write_record(1, b"before").unwrap();

        mfs.start_transaction(128).unwrap();
        mfs.write_record(1, b"during").unwrap();
        mfs.write_record(2, b"new").unwrap();

        assert_eq!(read_back::<6>(&mut mfs, 1), *b"before");
        assert_eq!(mfs.record_size(2), Err(MfsError::NotFound));
    }

    #[test]
    fn commit_applies_all_operations() {
        let mut mfs = mounted();
        mfs.write_record(1, b"one").unwrap();
        mfs.write_record(2, b"two").unwrap();

        mfs.start_transaction(128).unwrap();
        mfs.write_record(1, b"ONE!").unwrap();
        mfs.erase_record(2).unwrap();
        mfs.write_record(3, b"three").unwrap();
        assert_eq!(mfs.commit_transaction(), Ok(Status::Done));
        assert_eq!(mfs.state(), DriverState::Ready);

        assert_eq!(read_back::<4>(&mut mfs, 1), *b"ONE!");
        assert_eq!(mfs.record_size(2), Err(MfsError::NotFound));
        assert_eq!(read_back::<5>(&mut mfs, 3), *b"three");
        // header + "ONE!" (20) + "three" (22)
        assert_eq!(mfs.used_space(), 16 + 20 + 22);

        let (mut mfs, status) = remount(mfs);
        assert_eq!(status, Ok(Status::Done));
        assert_eq!(mfs.used_space(), 16 + 20 + 22);
        assert_eq!(read_back::<4>(&mut mfs, 1), *b"ONE!");
        assert_eq!(mfs.record_size(2), Err(MfsError::NotFound));
    }

    #[test]
    fn repeated_id_in_one_transaction() {
        let mut mfs = mounted();
        mfs.write_record(4, b"base").unwrap();

        mfs.start_transaction(128).unwrap();
        mfs.erase_record(4).unwrap();
        // Erase checks the committed view, so the record is still found
        mfs.erase_record(4).unwrap();
        mfs.write_record(4, b"last").unwrap();
        mfs.commit_transaction().unwrap();

        assert_eq!(read_back::<4>(&mut mfs, 4), *b"last");
        assert_eq!(mfs.used_space(), 16 + 20);
    }

    #[test]
    fn rollback_discards_everything() {
        let mut mfs = mounted();
        mfs.write_record(1, b"keep").unwrap();
        let used = mfs.used_space();

        mfs.start_transaction(128).unwrap();
        mfs.write_record(1, b"drop").unwrap();
        mfs.write_record(2, b"gone").unwrap();
        assert_eq!(mfs.rollback_transaction(), Ok(Status::GarbageCollected));

        assert_eq!(mfs.state(), DriverState::Ready);
        assert_eq!(mfs.used_space(), used);
        assert_eq!(read_back::<4>(&mut mfs, 1), *b"keep");
        assert_eq!(mfs.record_size(2), Err(MfsError::NotFound));

        let (mut mfs, status) = remount(mfs);
        assert_eq!(status, Ok(Status::Done));
        assert_eq!(read_back::<4>(&mut mfs, 1), *b"keep");
    }

    #[test]
    fn empty_rollback_skips_compaction() {
        let mut mfs = mounted();
        let bank = mfs.active_bank();
        mfs.start_transaction(64).unwrap();
        assert_eq!(mfs.rollback_transaction(), Ok(Status::Done));
        assert_eq!(mfs.active_bank(), bank);
    }

    #[test]
    fn limits_are_enforced() {
        let mut mfs = mounted();
        mfs.write_record(1, b"x").unwrap();

        // Room for exactly one 16-byte payload record
        mfs.start_transaction(32).unwrap();
        mfs.write_record(2, &[0xAA; 16]).unwrap();
        assert_eq!(mfs.write_record(3, b"y"), Err(MfsError::TransactionSize));
        assert_eq!(mfs.erase_record(1), Err(MfsError::TransactionSize));
        assert_eq!(mfs.erase_record(5), Err(MfsError::NotFound));
        mfs.commit_transaction().unwrap();

        // transaction_max is 8 in the test configuration
        mfs.start_transaction(1024).unwrap();
        for id in 1..=8 {
            mfs.write_record(id, b"z").unwrap();
        }
        assert_eq!(mfs.write_record(9, b"z"), Err(MfsError::TransactionNum));
        mfs.commit_transaction().unwrap();
        assert_eq!(mfs.live_records().count(), 8);
    }

    #[test]
    fn reservation_compacts_when_tail_is_short() {
        let mut mfs = mounted();
        // Fill the bank with churn on one record
        while mfs.free_tail().unwrap() > 300 {
            mfs.write_record(1, &[0x55; 100]).unwrap();
        }

        assert_eq!(mfs.start_transaction(256), Ok(Status::GarbageCollected));
        mfs.write_record(2, &[0x66; 100]).unwrap();
        mfs.commit_transaction().unwrap();
        assert_eq!(mfs.live_records().count(), 2);
    }

    #[test]
    fn interrupted_commit_is_invisible() {
        // Three operations, so sealing takes three programs
        for budget in 0..3 {
            let mut mfs = mounted();
            mfs.write_record(1, b"old1").unwrap();
            mfs.write_record(2, b"old2").unwrap();

            mfs.start_transaction(256).unwrap();
            mfs.write_record(1, b"new1").unwrap();
            mfs.write_record(2, b"new2").unwrap();
            mfs.write_record(3, b"new3").unwrap();

            mfs.device.cut_power_after(budget);
            assert_eq!(mfs.commit_transaction(), Err(MfsError::FlashFailure));
            assert_eq!(mfs.state(), DriverState::Error);

            let (mut mfs, status) = remount(mfs);
            assert_eq!(status, Ok(Status::Repaired), "budget {}", budget);
            assert_eq!(read_back::<4>(&mut mfs, 1), *b"old1");
            assert_eq!(read_back::<4>(&mut mfs, 2), *b"old2");
            assert_eq!(mfs.record_size(3), Err(MfsError::NotFound));
            assert_eq!(mfs.live_records().count(), 2);
        }
    }

    #[test]
    fn first_operation_sealed_alone_is_visible() {
        let mut mfs = mounted();
        mfs.write_record(1, b"old1").unwrap();
        mfs.write_record(2, b"old2").unwrap();

        mfs.start_transaction(256).unwrap();
        mfs.write_record(1, b"new1").unwrap();
        mfs.write_record(2, b"new2").unwrap();
        let first = mfs.transaction.op(0).offset;

        // Sealing front to back and losing power here would leak a
        // half-applied transaction
        let mut flash = mfs.release();
        flash.program(first.get(), &DataHeader::magic_bytes()).unwrap();

        let (mut mfs, status) = start_on(flash);
        assert_eq!(status, Ok(Status::Repaired));
        assert_eq!(read_back::<4>(&mut mfs, 1), *b"new1");
        assert_eq!(read_back::<4>(&mut mfs, 2), *b"old2");
    }

    #[test]
    fn sealed_prefix_is_applied_on_mount() {
        let mut mfs = mounted();
        mfs.write_record(1, b"old1").unwrap();

        mfs.start_transaction(256).unwrap();
        mfs.write_record(1, b"new1").unwrap();
        mfs.write_record(2, b"new2").unwrap();
        mfs.write_record(3, b"new3").unwrap();
        let first = mfs.transaction.op(0).offset;
        let second = mfs.transaction.op(1).offset;

        // Seal only the first two operations, in buffer order
        let mut flash = mfs.release();
        flash.program(first.get(), &DataHeader::magic_bytes()).unwrap();
        flash.program(second.get(), &DataHeader::magic_bytes()).unwrap();

        let (mut mfs, status) = start_on(flash);
        assert_eq!(status, Ok(Status::Repaired));
        assert_eq!(read_back::<4>(&mut mfs, 1), *b"new1");
        assert_eq!(read_back::<4>(&mut mfs, 2), *b"new2");
        assert_eq!(mfs.record_size(3), Err(MfsError::NotFound));
    }
}
