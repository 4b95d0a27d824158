//! Free page: bytes 0..7 hold the next free page in the chain (spec.md §3).

use common::PageOffset;

use crate::Page;

const NEXT: usize = 0;

/// Typed view over a free-list page. The remainder of the page is reserved
/// and left zeroed by `release()`.
pub struct FreePage;

impl FreePage {
    pub fn next(page: &Page) -> PageOffset {
        PageOffset(page.get_u64(NEXT))
    }

    pub fn set_next(page: &mut Page, value: PageOffset) {
        page.set_u64(NEXT, value.0);
    }
}
