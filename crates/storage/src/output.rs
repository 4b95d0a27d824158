//! Join output page: `OUTPUT_SLOTS` result rows of `(key1, value1, key2,
//! value2)` (spec.md §3). Per the Open Question in spec.md §9, this page
//! lives outside the buffer pool (see DESIGN.md) and its "filled slot
//! count" is tracked by the owning `join` crate rather than stored in the
//! page bytes, matching the original's repurposed in-memory field.

use crate::{Key, Page, RawValue, KEY_SIZE, OUTPUT_SLOTS, VALUE_SIZE};

const RECORD_SIZE: usize = 2 * (KEY_SIZE + VALUE_SIZE);

/// Typed view over the join output page.
pub struct OutputPage;

impl OutputPage {
    fn record_offset(slot: usize) -> usize {
        debug_assert!(slot < OUTPUT_SLOTS);
        slot * RECORD_SIZE
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_row(
        page: &mut Page,
        slot: usize,
        key1: Key,
        value1: &RawValue,
        key2: Key,
        value2: &RawValue,
    ) {
        let start = Self::record_offset(slot);
        page.set_u64(start, key1);
        page.bytes[start + KEY_SIZE..start + KEY_SIZE + VALUE_SIZE].copy_from_slice(value1);
        let k2_off = start + KEY_SIZE + VALUE_SIZE;
        page.set_u64(k2_off, key2);
        page.bytes[k2_off + KEY_SIZE..k2_off + KEY_SIZE + VALUE_SIZE].copy_from_slice(value2);
    }

    pub fn row(page: &Page, slot: usize) -> (Key, RawValue, Key, RawValue) {
        let start = Self::record_offset(slot);
        let key1 = page.get_u64(start);
        let mut value1 = [0u8; VALUE_SIZE];
        value1.copy_from_slice(&page.bytes[start + KEY_SIZE..start + KEY_SIZE + VALUE_SIZE]);
        let k2_off = start + KEY_SIZE + VALUE_SIZE;
        let key2 = page.get_u64(k2_off);
        let mut value2 = [0u8; VALUE_SIZE];
        value2.copy_from_slice(&page.bytes[k2_off + KEY_SIZE..k2_off + KEY_SIZE + VALUE_SIZE]);
        (key1, value1, key2, value2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_round_trips() {
        let mut page = Page::zeroed();
        let v1 = crate::pack_value(b"a");
        let v2 = crate::pack_value(b"b");
        OutputPage::set_row(&mut page, 3, 1, &v1, 2, &v2);
        let (k1, got_v1, k2, got_v2) = OutputPage::row(&page, 3);
        assert_eq!((k1, k2), (1, 2));
        assert_eq!(got_v1, v1);
        assert_eq!(got_v2, v2);
    }

    #[test]
    fn slots_fit_exactly_one_page() {
        let last_end = OutputPage::record_offset(OUTPUT_SLOTS - 1) + RECORD_SIZE;
        assert_eq!(last_end, crate::PAGE_SIZE);
    }
}
