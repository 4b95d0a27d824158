//! The raw fixed-size page buffer and the little-endian field helpers
//! shared by every typed page view (header, free, internal, leaf, output).

use byteorder::{ByteOrder, LittleEndian};

use crate::PAGE_SIZE;

/// A page-sized byte buffer. Every on-disk entity in spec.md §3 is a typed
/// view over one of these: the typed accessors (`HeaderPage`, `FreePage`,
/// `InternalPage`, `LeafPage`) read and write fields at fixed byte offsets
/// directly on `Page::bytes`, mirroring the C union-of-structs layout this
/// format was distilled from.
#[derive(Clone)]
pub struct Page {
    pub bytes: [u8; PAGE_SIZE],
}

impl Page {
    /// A freshly zeroed page, as produced by file growth or `release()`.
    pub fn zeroed() -> Self {
        Self {
            bytes: [0u8; PAGE_SIZE],
        }
    }

    pub fn from_bytes(bytes: [u8; PAGE_SIZE]) -> Self {
        Self { bytes }
    }

    pub(crate) fn get_u64(&self, offset: usize) -> u64 {
        LittleEndian::read_u64(&self.bytes[offset..offset + 8])
    }

    pub(crate) fn set_u64(&mut self, offset: usize, value: u64) {
        LittleEndian::write_u64(&mut self.bytes[offset..offset + 8], value);
    }

    pub(crate) fn get_i32(&self, offset: usize) -> i32 {
        LittleEndian::read_i32(&self.bytes[offset..offset + 4])
    }

    pub(crate) fn set_i32(&mut self, offset: usize, value: i32) {
        LittleEndian::write_i32(&mut self.bytes[offset..offset + 4], value);
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page").field("len", &self.bytes.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_page_is_all_zero() {
        let page = Page::zeroed();
        assert!(page.bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn u64_round_trips_at_offset() {
        let mut page = Page::zeroed();
        page.set_u64(24, 0xdead_beef_u64);
        assert_eq!(page.get_u64(24), 0xdead_beef_u64);
        // Neighboring bytes remain zero.
        assert_eq!(page.get_u64(16), 0);
        assert_eq!(page.get_u64(32), 0);
    }

    #[test]
    fn i32_round_trips_at_offset() {
        let mut page = Page::zeroed();
        page.set_i32(8, 1);
        assert_eq!(page.get_i32(8), 1);
    }
}
