use bitmaps::{Bitmap, Bits, BitsImpl};

use crate::mfs::Offset;

/// Location of the most recent valid instance of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordDescriptor {
    /// Offset of the record header in flash.
    pub offset: Offset,
    /// Payload size in bytes, never zero for a live record.
    pub size: u32,
}

/// In-memory record index, one slot per identifier.
///
/// A bitmap mirrors which slots are live so compaction and iteration
/// visit records in ascending identifier order without probing every slot.
pub(crate) struct DescriptorTable<const MR: usize>
where
    BitsImpl<MR>: Bits,
{
    slots: [RecordDescriptor; MR],
    live: Bitmap<MR>,
}

impl<const MR: usize> DescriptorTable<MR>
where
    BitsImpl<MR>: Bits,
{
    pub(crate) fn new() -> Self {
        Self {
            slots: [RecordDescriptor::default(); MR],
            live: Bitmap::new(),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.slots = [RecordDescriptor::default(); MR];
        self.live = Bitmap::new();
    }

    /// Descriptor of slot `index` if it holds a live record.
    #[inline]
    pub(crate) fn get(&self, index: usize) -> Option<RecordDescriptor> {
        if self.live.get(index) {
            Some(self.slots[index])
        } else {
            None
        }
    }

    pub(crate) fn set(&mut self, index: usize, offset: Offset, size: u32) {
        debug_assert!(!offset.is_none() && size > 0);
        self.slots[index] = RecordDescriptor { offset, size };
        self.live.set(index, true);
    }

    pub(crate) fn clear(&mut self, index: usize) {
        self.slots[index] = RecordDescriptor::default();
        self.live.set(index, false);
    }

    /// Moves a live record to a new offset, keeping its size.
    pub(crate) fn relocate(&mut self, index: usize, offset: Offset) {
        debug_assert!(self.live.get(index));
        self.slots[index].offset = offset;
    }

    /// Number of live records.
    #[inline]
    pub(crate) fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Lowest live slot.
    #[inline]
    pub(crate) fn first_live(&self) -> Option<usize> {
        self.live.first_index()
    }

    /// Next live slot after `index`.
    #[inline]
    pub(crate) fn next_live(&self, index: usize) -> Option<usize> {
        self.live.next_index(index)
    }

    /// Iterates live slots in ascending order as `(index, descriptor)`.
    pub(crate) fn iter_live(&self) -> LiveSlots<'_, MR> {
        LiveSlots {
            table: self,
            next: self.first_live(),
        }
    }
}

/// Iterator over live descriptor slots.
pub(crate) struct LiveSlots<'a, const MR: usize>
where
    BitsImpl<MR>: Bits,
{
    table: &'a DescriptorTable<MR>,
    next: Option<usize>,
}

impl<const MR: usize> Iterator for LiveSlots<'_, MR>
where
    BitsImpl<MR>: Bits,
{
    type Item = (usize, RecordDescriptor);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next?;
        self.next = self.table.next_live(index);
        Some((index, self.table.slots[index]))
    }
}
