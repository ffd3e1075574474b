//! Heap page implementation.
//!
//! See the [module docs](crate::heap) for the on-disk layout. A `HeapPage`
//! is the decoded form of one page image: the header bitmap plus one
//! `Option<Tuple>` per slot. Serialization is byte-exact: decoding an image
//! produced by this module and re-encoding it yields the identical bytes.

use std::sync::Arc;

use bytes::{Buf, BufMut, BytesMut};
use parking_lot::Mutex;

use crate::storage::{page_size, HeapPageId, RecordId, StorageError};
use crate::tuple::{Tuple, TupleDesc};
use crate::tx::TransactionId;

use super::error::HeapError;

/// Returns the number of tuple slots on a page holding rows of `desc`.
///
/// Each slot costs its row width plus one header bit, so
/// `N = (P * 8) / (T * 8 + 1)`.
pub fn slots_per_page(desc: &TupleDesc) -> usize {
    (page_size() * 8) / (desc.byte_size() * 8 + 1)
}

/// Returns the header bitmap size in bytes for a page holding rows of `desc`.
pub fn header_size(desc: &TupleDesc) -> usize {
    slots_per_page(desc).div_ceil(8)
}

/// One decoded heap page.
///
/// Pages are created either by decoding a page image read from disk
/// ([`from_bytes`](HeapPage::from_bytes)) or by decoding
/// [`empty_page_data`](HeapPage::empty_page_data). Mutation happens on the
/// heap file write path under an external transaction; the page records the
/// dirtying transaction and keeps a before-image snapshot for recovery
/// collaborators.
pub struct HeapPage {
    pid: HeapPageId,
    desc: Arc<TupleDesc>,
    header: Vec<u8>,
    slots: Vec<Option<Tuple>>,
    dirty: Option<TransactionId>,
    /// Snapshot of the last stable page image. Only the reference swap is
    /// protected; the buffer itself is immutable once published.
    old_data: Mutex<Arc<[u8]>>,
}

impl HeapPage {
    /// Decodes a page from a full page image.
    ///
    /// Slots whose header bit is clear are skipped; their byte regions are
    /// ignored. The before-image snapshot is seeded with the current
    /// serialized form.
    ///
    /// # Errors
    ///
    /// Returns `Storage(InvalidBufferSize)` unless `data` is exactly one
    /// page, and a serialization error for undecodable field data in a used
    /// slot.
    pub fn from_bytes(
        pid: HeapPageId,
        data: &[u8],
        desc: Arc<TupleDesc>,
    ) -> Result<Self, HeapError> {
        if data.len() != page_size() {
            return Err(HeapError::Storage(StorageError::InvalidBufferSize {
                expected: page_size(),
                actual: data.len(),
            }));
        }

        let num_slots = slots_per_page(&desc);
        let header_len = header_size(&desc);
        let row_width = desc.byte_size();

        let mut buf = data;
        let mut header = vec![0u8; header_len];
        buf.copy_to_slice(&mut header);

        let mut slots = Vec::with_capacity(num_slots);
        for slot in 0..num_slots {
            if header[slot / 8] & (1 << (slot % 8)) != 0 {
                let mut tuple = Tuple::read_from(&mut buf, desc.clone())?;
                tuple.set_record_id(Some(RecordId::new(pid, slot)));
                slots.push(Some(tuple));
            } else {
                buf.advance(row_width);
                slots.push(None);
            }
        }

        let page = Self {
            pid,
            desc,
            header,
            slots,
            dirty: None,
            old_data: Mutex::new(Arc::from(Vec::new())),
        };
        let image = page.page_data()?;
        *page.old_data.lock() = Arc::from(image);
        Ok(page)
    }

    /// Returns a page image for an empty page: all zeroes.
    pub fn empty_page_data() -> Vec<u8> {
        vec![0u8; page_size()]
    }

    /// Serializes this page to exactly one page image.
    ///
    /// The header bitmap is written verbatim, each used slot as its fields
    /// in descriptor order, each empty slot as `T` zero bytes, then zero
    /// padding up to the page size.
    pub fn page_data(&self) -> Result<Vec<u8>, HeapError> {
        let row_width = self.desc.byte_size();
        let mut buf = BytesMut::with_capacity(page_size());
        buf.put_slice(&self.header);
        for slot in &self.slots {
            match slot {
                Some(tuple) => tuple.write_to(&mut buf)?,
                None => buf.put_bytes(0, row_width),
            }
        }
        buf.put_bytes(0, page_size() - buf.len());
        Ok(buf.to_vec())
    }

    /// Returns this page's identifier.
    pub fn id(&self) -> HeapPageId {
        self.pid
    }

    /// Returns the page's tuple descriptor.
    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    /// Returns the number of tuple slots on this page.
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if slot `slot` holds a tuple.
    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.slots.len() && self.header[slot / 8] & (1 << (slot % 8)) != 0
    }

    /// Returns the number of empty slots on this page.
    pub fn num_empty_slots(&self) -> usize {
        (0..self.slots.len())
            .filter(|&slot| !self.is_slot_used(slot))
            .count()
    }

    fn mark_slot_used(&mut self, slot: usize, used: bool) {
        let mask = 1 << (slot % 8);
        if used {
            self.header[slot / 8] |= mask;
        } else {
            self.header[slot / 8] &= !mask;
        }
    }

    /// Inserts a tuple into the lowest-numbered empty slot.
    ///
    /// On success the tuple's record id is set to the chosen slot and
    /// returned. The caller is expected to follow a persisted mutation with
    /// [`mark_dirty`](HeapPage::mark_dirty).
    ///
    /// # Errors
    ///
    /// Returns `SchemaMismatch` when the tuple's descriptor differs from the
    /// page's, and `PageFull` when every slot is in use.
    pub fn insert_tuple(&mut self, mut tuple: Tuple) -> Result<RecordId, HeapError> {
        if **tuple.desc() != *self.desc {
            return Err(HeapError::SchemaMismatch);
        }

        for slot in 0..self.slots.len() {
            if !self.is_slot_used(slot) {
                let record_id = RecordId::new(self.pid, slot);
                tuple.set_record_id(Some(record_id));
                self.mark_slot_used(slot, true);
                self.slots[slot] = Some(tuple);
                return Ok(record_id);
            }
        }
        Err(HeapError::PageFull)
    }

    /// Deletes the tuple at the slot named by `tuple`'s record id.
    ///
    /// # Errors
    ///
    /// Returns `NotOnPage` when the tuple has no record id or the id names a
    /// different page, and `SlotAlreadyEmpty` when the slot bit is clear.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<(), HeapError> {
        let record_id = match tuple.record_id() {
            Some(rid) if rid.page_id == self.pid && rid.slot < self.slots.len() => rid,
            _ => return Err(HeapError::NotOnPage),
        };
        if !self.is_slot_used(record_id.slot) {
            return Err(HeapError::SlotAlreadyEmpty(record_id.slot));
        }
        self.mark_slot_used(record_id.slot, false);
        self.slots[record_id.slot] = None;
        Ok(())
    }

    /// Sets or clears the dirty mark. Clearing also forgets the dirtier.
    pub fn mark_dirty(&mut self, dirty: bool, tid: TransactionId) {
        self.dirty = if dirty { Some(tid) } else { None };
    }

    /// Returns the transaction that last dirtied this page, or `None` when
    /// the page is clean.
    pub fn dirtier(&self) -> Option<TransactionId> {
        self.dirty
    }

    /// Decodes a page from the before-image snapshot.
    ///
    /// The snapshot reference is cloned inside the critical section and
    /// decoded outside it.
    pub fn before_image(&self) -> Result<HeapPage, HeapError> {
        let snapshot = Arc::clone(&self.old_data.lock());
        HeapPage::from_bytes(self.pid, &snapshot, self.desc.clone())
    }

    /// Replaces the before-image snapshot with the current serialized form.
    pub fn set_before_image(&self) -> Result<(), HeapError> {
        let image = self.page_data()?;
        *self.old_data.lock() = Arc::from(image);
        Ok(())
    }

    /// Returns an iterator over the populated tuples in slot order.
    ///
    /// The tuples are snapshotted at the time of the call; later mutation of
    /// this page is not reflected. Obtain a fresh iterator to rescan.
    pub fn iter(&self) -> std::vec::IntoIter<Tuple> {
        let tuples: Vec<Tuple> = self.slots.iter().flatten().cloned().collect();
        tuples.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::{Type, Value};
    use crate::storage::DEFAULT_PAGE_SIZE;

    fn two_int_desc() -> Arc<TupleDesc> {
        Arc::new(TupleDesc::from_types([Type::Int, Type::Int]))
    }

    fn int_tuple(desc: &Arc<TupleDesc>, values: &[i32]) -> Tuple {
        Tuple::new(
            desc.clone(),
            values.iter().map(|&v| Value::Int(v)).collect(),
        )
        .unwrap()
    }

    fn empty_page(desc: &Arc<TupleDesc>) -> HeapPage {
        let pid = HeapPageId::new(1, 0);
        HeapPage::from_bytes(pid, &HeapPage::empty_page_data(), desc.clone()).unwrap()
    }

    #[test]
    fn test_slot_math() {
        // P = 4096, T = 8 -> N = 32768 / 65 = 504, header = 63 bytes.
        assert_eq!(page_size(), DEFAULT_PAGE_SIZE);
        let desc = two_int_desc();
        assert_eq!(slots_per_page(&desc), 504);
        assert_eq!(header_size(&desc), 63);

        // P = 4096, T = 4 -> N = 32768 / 33 = 992.
        let one_int = TupleDesc::from_types([Type::Int]);
        assert_eq!(slots_per_page(&one_int), 992);
        assert_eq!(header_size(&one_int), 124);
    }

    #[test]
    fn test_empty_page_has_all_slots_free() {
        let desc = two_int_desc();
        let page = empty_page(&desc);
        assert_eq!(page.num_slots(), 504);
        assert_eq!(page.num_empty_slots(), 504);
        assert_eq!(page.iter().count(), 0);
        assert_eq!(page.dirtier(), None);
    }

    #[test]
    fn test_insert_assigns_lowest_slot_and_record_id() {
        let desc = two_int_desc();
        let mut page = empty_page(&desc);

        let rid0 = page.insert_tuple(int_tuple(&desc, &[0, 0])).unwrap();
        let rid1 = page.insert_tuple(int_tuple(&desc, &[1, 10])).unwrap();
        assert_eq!(rid0.slot, 0);
        assert_eq!(rid1.slot, 1);
        assert_eq!(rid0.page_id, page.id());
        assert!(page.is_slot_used(0));
        assert!(page.is_slot_used(1));
        assert_eq!(page.num_empty_slots(), 502);
    }

    #[test]
    fn test_insert_reuses_freed_slot() {
        let desc = two_int_desc();
        let mut page = empty_page(&desc);

        page.insert_tuple(int_tuple(&desc, &[0, 0])).unwrap();
        page.insert_tuple(int_tuple(&desc, &[1, 1])).unwrap();
        page.insert_tuple(int_tuple(&desc, &[2, 2])).unwrap();

        let victim = page.iter().next().unwrap();
        page.delete_tuple(&victim).unwrap();
        assert!(!page.is_slot_used(0));

        let rid = page.insert_tuple(int_tuple(&desc, &[9, 9])).unwrap();
        assert_eq!(rid.slot, 0);
    }

    #[test]
    fn test_insert_schema_mismatch() {
        let desc = two_int_desc();
        let mut page = empty_page(&desc);

        let other = Arc::new(TupleDesc::from_types([Type::Int]));
        let tuple = Tuple::new(other, vec![Value::Int(1)]).unwrap();
        assert!(matches!(
            page.insert_tuple(tuple),
            Err(HeapError::SchemaMismatch)
        ));
    }

    #[test]
    fn test_page_fills_at_slot_count() {
        let desc = Arc::new(TupleDesc::from_types([Type::Int]));
        let mut page = empty_page(&desc);

        for i in 0..992 {
            page.insert_tuple(int_tuple(&desc, &[i as i32])).unwrap();
        }
        assert_eq!(page.num_empty_slots(), 0);
        assert!(matches!(
            page.insert_tuple(int_tuple(&desc, &[992])),
            Err(HeapError::PageFull)
        ));
    }

    #[test]
    fn test_delete_errors() {
        let desc = two_int_desc();
        let mut page = empty_page(&desc);

        // No record id.
        let loose = int_tuple(&desc, &[1, 2]);
        assert!(matches!(
            page.delete_tuple(&loose),
            Err(HeapError::NotOnPage)
        ));

        // Record id on another page.
        let mut foreign = int_tuple(&desc, &[1, 2]);
        foreign.set_record_id(Some(RecordId::new(HeapPageId::new(1, 7), 0)));
        assert!(matches!(
            page.delete_tuple(&foreign),
            Err(HeapError::NotOnPage)
        ));

        // Slot already empty.
        let mut stale = int_tuple(&desc, &[1, 2]);
        stale.set_record_id(Some(RecordId::new(page.id(), 3)));
        assert!(matches!(
            page.delete_tuple(&stale),
            Err(HeapError::SlotAlreadyEmpty(3))
        ));

        // Double delete.
        page.insert_tuple(int_tuple(&desc, &[5, 6])).unwrap();
        let stored = page.iter().next().unwrap();
        page.delete_tuple(&stored).unwrap();
        assert!(matches!(
            page.delete_tuple(&stored),
            Err(HeapError::SlotAlreadyEmpty(0))
        ));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let desc = two_int_desc();
        let mut page = empty_page(&desc);
        for (a, b) in [(0, 0), (1, 10), (2, 20)] {
            page.insert_tuple(int_tuple(&desc, &[a, b])).unwrap();
        }

        let image = page.page_data().unwrap();
        assert_eq!(image.len(), page_size());

        let parsed = HeapPage::from_bytes(page.id(), &image, desc.clone()).unwrap();
        let tuples: Vec<Tuple> = parsed.iter().collect();
        assert_eq!(tuples.len(), 3);
        for (i, (a, b)) in [(0, 0), (1, 10), (2, 20)].iter().enumerate() {
            assert_eq!(tuples[i].value(0), Some(&Value::Int(*a)));
            assert_eq!(tuples[i].value(1), Some(&Value::Int(*b)));
            assert_eq!(tuples[i].record_id(), Some(RecordId::new(page.id(), i)));
        }

        // Re-encoding the decoded page reproduces the image bit for bit.
        assert_eq!(parsed.page_data().unwrap(), image);
    }

    #[test]
    fn test_deleted_slot_serializes_as_zeroes() {
        let desc = Arc::new(TupleDesc::from_types([Type::Int]));
        let mut page = empty_page(&desc);
        page.insert_tuple(int_tuple(&desc, &[i32::MAX])).unwrap();
        let stored = page.iter().next().unwrap();
        page.delete_tuple(&stored).unwrap();

        let image = page.page_data().unwrap();
        assert!(image.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_header_bit_layout() {
        let desc = Arc::new(TupleDesc::from_types([Type::Int]));
        let mut page = empty_page(&desc);
        for i in 0..9 {
            page.insert_tuple(int_tuple(&desc, &[i])).unwrap();
        }
        let image = page.page_data().unwrap();
        // Slots 0..8 set the whole first byte; slot 8 is the LSB of byte 1.
        assert_eq!(image[0], 0xFF);
        assert_eq!(image[1], 0x01);
    }

    #[test]
    fn test_empty_slot_count_matches_header_popcount() {
        let desc = two_int_desc();
        let mut page = empty_page(&desc);
        for i in 0..37 {
            page.insert_tuple(int_tuple(&desc, &[i, -i])).unwrap();
        }
        let image = page.page_data().unwrap();
        let set_bits: u32 = image[..header_size(&desc)]
            .iter()
            .map(|b| b.count_ones())
            .sum();
        assert_eq!(set_bits, 37);
        assert_eq!(page.num_empty_slots(), page.num_slots() - 37);
    }

    #[test]
    fn test_dirty_tracking() {
        let desc = two_int_desc();
        let mut page = empty_page(&desc);
        let tid = TransactionId::fresh();

        assert_eq!(page.dirtier(), None);
        page.mark_dirty(true, tid);
        assert_eq!(page.dirtier(), Some(tid));
        page.mark_dirty(false, tid);
        assert_eq!(page.dirtier(), None);
    }

    #[test]
    fn test_before_image() {
        let desc = two_int_desc();
        let mut page = empty_page(&desc);
        page.insert_tuple(int_tuple(&desc, &[1, 2])).unwrap();
        page.set_before_image().unwrap();

        // Mutate past the snapshot point.
        page.insert_tuple(int_tuple(&desc, &[3, 4])).unwrap();

        let before = page.before_image().unwrap();
        let tuples: Vec<Tuple> = before.iter().collect();
        assert_eq!(tuples.len(), 1);
        assert_eq!(tuples[0].value(0), Some(&Value::Int(1)));
    }

    #[test]
    fn test_before_image_seeded_at_decode() {
        let desc = two_int_desc();
        let mut page = empty_page(&desc);
        page.insert_tuple(int_tuple(&desc, &[1, 2])).unwrap();

        // No set_before_image call: the snapshot is the decoded (empty) page.
        let before = page.before_image().unwrap();
        assert_eq!(before.iter().count(), 0);
    }

    #[test]
    fn test_iterator_is_a_snapshot() {
        let desc = two_int_desc();
        let mut page = empty_page(&desc);
        page.insert_tuple(int_tuple(&desc, &[1, 1])).unwrap();
        page.insert_tuple(int_tuple(&desc, &[2, 2])).unwrap();

        let iter = page.iter();
        let stored = page.iter().next().unwrap();
        page.delete_tuple(&stored).unwrap();

        // The earlier iterator still sees both tuples.
        assert_eq!(iter.count(), 2);
        assert_eq!(page.iter().count(), 1);
    }

    #[test]
    fn test_from_bytes_rejects_wrong_length() {
        let desc = two_int_desc();
        let result = HeapPage::from_bytes(HeapPageId::new(1, 0), &[0u8; 100], desc);
        assert!(matches!(
            result,
            Err(HeapError::Storage(StorageError::InvalidBufferSize { .. }))
        ));
    }

    #[test]
    fn test_varchar_page_roundtrip() {
        let desc = Arc::new(TupleDesc::from_types([Type::Int, Type::Varchar(16)]));
        let mut page = empty_page(&desc);
        for (id, name) in [(1, "alice"), (2, "bob"), (3, "carol")] {
            let tuple = Tuple::new(
                desc.clone(),
                vec![Value::Int(id), Value::Varchar(name.into())],
            )
            .unwrap();
            page.insert_tuple(tuple).unwrap();
        }

        let image = page.page_data().unwrap();
        let parsed = HeapPage::from_bytes(page.id(), &image, desc).unwrap();
        let names: Vec<String> = parsed
            .iter()
            .map(|t| t.value(1).unwrap().to_string())
            .collect();
        assert_eq!(names, ["alice", "bob", "carol"]);
        assert_eq!(parsed.page_data().unwrap(), image);
    }
}
