//! Durable playlist record and its binary codec.
//!
//! All multi-byte integers are little-endian. For a record of capacity `N`
//! and entry size `S` (2 for [`Layout::Flat`], 4 for [`Layout::Nested`]):
//!
//! ```text
//! [0..20]                magic     b"EPAPER PHOTOFRAME F1" / b"...N1"
//! [20..20+N*S]           entries   PhotoReference × N (unused slots zero)
//! [20+N*S..20+N*S+2]     count     u16 le
//! [20+N*S+2..20+N*S+4]   cursor    u16 le
//! ```
//!
//! The codec works one byte offset at a time so that callers can stream the
//! record through any chunk size without ever holding the encoded form.

use heapless::Vec;

use crate::reference::{Layout, PhotoReference};

/// Length of the signature at the start of the record.
pub const MAGIC_LEN: usize = 20;

/// Signature of a flat-layout record.
pub const MAGIC_FLAT: &[u8; MAGIC_LEN] = b"EPAPER PHOTOFRAME F1";

/// Signature of a nested-layout record.
pub const MAGIC_NESTED: &[u8; MAGIC_LEN] = b"EPAPER PHOTOFRAME N1";

const TRAILER_LEN: usize = 4;

/// Reasons a stored record is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordError {
    /// The signature is missing or belongs to another format or layout.
    #[error("record signature does not match")]
    BadMagic,
    /// The record ends before the trailer.
    #[error("record ends early")]
    Truncated,
    /// Size, count or cursor are inconsistent with this build.
    #[error("record fields are inconsistent")]
    Corrupt,
}

/// In-memory playlist: photo references in display order plus a cursor.
///
/// Invariant: `cursor < count` whenever `count > 0`, and `cursor == 0`
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRecord<const N: usize> {
    layout: Layout,
    entries: Vec<PhotoReference, N>,
    cursor: u16,
}

impl<const N: usize> PlaylistRecord<N> {
    /// Empty record.
    pub const fn new(layout: Layout) -> Self {
        Self { layout, entries: Vec::new(), cursor: 0 }
    }

    /// Signature written for `layout`.
    pub const fn magic(layout: Layout) -> &'static [u8; MAGIC_LEN] {
        match layout {
            Layout::Flat => MAGIC_FLAT,
            Layout::Nested => MAGIC_NESTED,
        }
    }

    /// Exact size of the encoded record.
    pub const fn encoded_len(layout: Layout) -> usize {
        MAGIC_LEN
            .saturating_add(N.saturating_mul(layout.entry_size()))
            .saturating_add(TRAILER_LEN)
    }

    const fn entries_end(layout: Layout) -> usize {
        MAGIC_LEN.saturating_add(N.saturating_mul(layout.entry_size()))
    }

    /// Layout of the references held.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Number of valid entries.
    pub fn count(&self) -> u16 {
        u16::try_from(self.entries.len()).unwrap_or(u16::MAX)
    }

    /// Index of the next photo to show.
    pub fn cursor(&self) -> u16 {
        self.cursor
    }

    /// `true` when no photo is indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `true` when capacity `N` is reached.
    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    /// Valid entries in display order.
    pub fn entries(&self) -> &[PhotoReference] {
        &self.entries
    }

    /// Valid entries, mutable (for shuffling).
    pub fn entries_mut(&mut self) -> &mut [PhotoReference] {
        &mut self.entries
    }

    /// Reference under the cursor.
    pub fn current(&self) -> Option<PhotoReference> {
        self.entries.get(usize::from(self.cursor)).copied()
    }

    /// Append a reference.
    ///
    /// Returns it back when the record is full or the reference does not
    /// match the record's layout.
    pub fn push(&mut self, reference: PhotoReference) -> Result<(), PhotoReference> {
        if reference.layout() != self.layout {
            return Err(reference);
        }
        self.entries.push(reference)
    }

    /// Move the cursor. Returns `false` (and leaves it) if out of range.
    pub fn set_cursor(&mut self, cursor: u16) -> bool {
        if usize::from(cursor) < self.entries.len() {
            self.cursor = cursor;
            true
        } else {
            false
        }
    }

    /// Drop all entries, reset the cursor and switch to `layout`.
    pub fn reset(&mut self, layout: Layout) {
        self.layout = layout;
        self.entries.clear();
        self.cursor = 0;
    }

    /// Byte at `offset` of the encoded record, `None` past the end.
    pub fn encoded_byte(&self, offset: usize) -> Option<u8> {
        let size = self.layout.entry_size();
        let entries_end = Self::entries_end(self.layout);
        if let Some(b) = Self::magic(self.layout).get(offset) {
            return Some(*b);
        }
        if offset < entries_end {
            let rel = offset.saturating_sub(MAGIC_LEN);
            let idx = rel.checked_div(size)?;
            let within = rel.checked_rem(size)?;
            let byte = self
                .entries
                .get(idx)
                .and_then(|r| r.to_bytes().get(within).copied())
                .unwrap_or(0);
            return Some(byte);
        }
        let [c0, c1] = self.count().to_le_bytes();
        let [k0, k1] = self.cursor.to_le_bytes();
        [c0, c1, k0, k1].get(offset.saturating_sub(entries_end)).copied()
    }

    /// Fill `buf` with the encoded bytes starting at `offset`.
    ///
    /// Returns how many bytes were produced; `0` once the record is done.
    pub fn encode_chunk(&self, offset: usize, buf: &mut [u8]) -> usize {
        for (i, slot) in buf.iter_mut().enumerate() {
            match self.encoded_byte(offset.saturating_add(i)) {
                Some(b) => *slot = b,
                None => return i,
            }
        }
        buf.len()
    }
}

/// Incremental decoder writing straight into an existing record.
///
/// The record is reset on construction; after a failed decode its contents
/// are meaningless and it should be rebuilt.
pub struct RecordDecoder<'a, const N: usize> {
    record: &'a mut PlaylistRecord<N>,
    offset: usize,
    pending: [u8; 4],
    trailer: [u8; TRAILER_LEN],
}

impl<'a, const N: usize> RecordDecoder<'a, N> {
    /// Start decoding a `layout` record into `record`.
    pub fn new(record: &'a mut PlaylistRecord<N>, layout: Layout) -> Self {
        record.reset(layout);
        Self { record, offset: 0, pending: [0; 4], trailer: [0; TRAILER_LEN] }
    }

    /// Consume the next bytes of the stream.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<(), RecordError> {
        bytes.iter().try_for_each(|&b| self.push_byte(b))
    }

    fn push_byte(&mut self, b: u8) -> Result<(), RecordError> {
        let layout = self.record.layout;
        let size = layout.entry_size();
        let entries_end = PlaylistRecord::<N>::entries_end(layout);
        let total = PlaylistRecord::<N>::encoded_len(layout);
        let offset = self.offset;

        if offset < MAGIC_LEN {
            if PlaylistRecord::<N>::magic(layout).get(offset) != Some(&b) {
                return Err(RecordError::BadMagic);
            }
        } else if offset < entries_end {
            let within = offset.saturating_sub(MAGIC_LEN).checked_rem(size).ok_or(RecordError::Corrupt)?;
            let slot = self.pending.get_mut(within).ok_or(RecordError::Corrupt)?;
            *slot = b;
            if within.saturating_add(1) == size {
                let reference = PhotoReference::from_bytes(layout, self.pending);
                self.record.entries.push(reference).map_err(|_| RecordError::Corrupt)?;
                self.pending = [0; 4];
            }
        } else if offset < total {
            let slot = self
                .trailer
                .get_mut(offset.saturating_sub(entries_end))
                .ok_or(RecordError::Corrupt)?;
            *slot = b;
        } else {
            return Err(RecordError::Corrupt);
        }
        self.offset = offset.saturating_add(1);
        Ok(())
    }

    /// Check the trailer and trim the entries to the stored count.
    pub fn finish(self) -> Result<(), RecordError> {
        let layout = self.record.layout;
        if self.offset < PlaylistRecord::<N>::encoded_len(layout) {
            return Err(RecordError::Truncated);
        }
        let [c0, c1, k0, k1] = self.trailer;
        let count = u16::from_le_bytes([c0, c1]);
        let cursor = u16::from_le_bytes([k0, k1]);
        if usize::from(count) > N {
            return Err(RecordError::Corrupt);
        }
        let cursor_ok = if count == 0 { cursor == 0 } else { cursor < count };
        if !cursor_ok {
            return Err(RecordError::Corrupt);
        }
        self.record.entries.truncate(usize::from(count));
        self.record.cursor = cursor;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    type Small = PlaylistRecord<4>;

    fn encode_all<const N: usize>(r: &PlaylistRecord<N>) -> std::vec::Vec<u8> {
        let mut out = std::vec![0u8; PlaylistRecord::<N>::encoded_len(r.layout())];
        let n = r.encode_chunk(0, &mut out);
        assert_eq!(n, out.len());
        out
    }

    #[test]
    fn magic_is_twenty_bytes() {
        assert_eq!(MAGIC_FLAT.len(), MAGIC_LEN);
        assert_ne!(MAGIC_FLAT, MAGIC_NESTED);
    }

    #[test]
    fn flat_layout_bytes() {
        let mut r = Small::new(Layout::Flat);
        r.push(PhotoReference::Flat(0x0102)).unwrap();
        r.push(PhotoReference::Flat(7)).unwrap();
        assert!(r.set_cursor(1));

        let bytes = encode_all(&r);
        assert_eq!(bytes.len(), 20 + 4 * 2 + 4);
        assert_eq!(&bytes[..20], MAGIC_FLAT);
        assert_eq!(&bytes[20..28], &[0x02, 0x01, 7, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[28..], &[2, 0, 1, 0]);
    }

    #[test]
    fn decode_in_odd_chunks() {
        let mut r = Small::new(Layout::Nested);
        r.push(PhotoReference::Nested { dir: 1, file: 9 }).unwrap();
        r.push(PhotoReference::Nested { dir: 2, file: 3 }).unwrap();
        r.push(PhotoReference::Nested { dir: 2, file: 4 }).unwrap();
        assert!(r.set_cursor(2));
        let bytes = encode_all(&r);

        let mut out = Small::new(Layout::Flat);
        let mut dec = RecordDecoder::new(&mut out, Layout::Nested);
        for chunk in bytes.chunks(3) {
            dec.feed(chunk).unwrap();
        }
        dec.finish().unwrap();
        assert_eq!(out, r);
    }

    #[test]
    fn wrong_magic_is_rejected_early() {
        let mut out = Small::new(Layout::Flat);
        let mut dec = RecordDecoder::new(&mut out, Layout::Flat);
        assert_eq!(dec.feed(b"INKPLATE PHOTOFRAME\0"), Err(RecordError::BadMagic));
    }

    #[test]
    fn layout_mismatch_is_bad_magic() {
        let r = Small::new(Layout::Flat);
        let bytes = encode_all(&r);
        let mut out = Small::new(Layout::Nested);
        let mut dec = RecordDecoder::new(&mut out, Layout::Nested);
        assert_eq!(dec.feed(&bytes), Err(RecordError::BadMagic));
    }

    #[test]
    fn short_record_is_truncated() {
        let r = Small::new(Layout::Flat);
        let bytes = encode_all(&r);
        let mut out = Small::new(Layout::Flat);
        let mut dec = RecordDecoder::new(&mut out, Layout::Flat);
        dec.feed(&bytes[..bytes.len() - 1]).unwrap();
        assert_eq!(dec.finish(), Err(RecordError::Truncated));
    }

    #[test]
    fn capacity_mismatch_is_rejected() {
        let bigger = PlaylistRecord::<8>::new(Layout::Flat);
        let bytes = encode_all(&bigger);
        let mut out = Small::new(Layout::Flat);
        let mut dec = RecordDecoder::new(&mut out, Layout::Flat);
        assert_eq!(dec.feed(&bytes), Err(RecordError::Corrupt));
    }

    #[test]
    fn cursor_past_count_is_corrupt() {
        let mut r = Small::new(Layout::Flat);
        r.push(PhotoReference::Flat(1)).unwrap();
        let mut bytes = encode_all(&r);
        let n = bytes.len();
        bytes[n - 2] = 1; // cursor = 1 with count = 1
        let mut out = Small::new(Layout::Flat);
        let mut dec = RecordDecoder::new(&mut out, Layout::Flat);
        dec.feed(&bytes).unwrap();
        assert_eq!(dec.finish(), Err(RecordError::Corrupt));
    }

    #[test]
    fn push_rejects_foreign_layout_and_overflow() {
        let mut r = PlaylistRecord::<1>::new(Layout::Flat);
        assert!(r.push(PhotoReference::Nested { dir: 0, file: 0 }).is_err());
        r.push(PhotoReference::Flat(0)).unwrap();
        assert!(r.is_full());
        assert_eq!(r.push(PhotoReference::Flat(1)), Err(PhotoReference::Flat(1)));
    }

    #[test]
    fn set_cursor_checks_range() {
        let mut r = Small::new(Layout::Flat);
        assert!(!r.set_cursor(0));
        r.push(PhotoReference::Flat(5)).unwrap();
        assert!(r.set_cursor(0));
        assert!(!r.set_cursor(1));
        assert_eq!(r.current(), Some(PhotoReference::Flat(5)));
    }
}
