//! Paged file layout: the fixed-size page buffer, its bit-exact on-disk
//! page kinds (header, free, internal, leaf, output), and positioned
//! block I/O against a table file.
//!
//! This crate owns components C1 (file I/O) and C2 (page types) of the
//! storage engine. Free-page allocation (C3) lives in `buffer`, since the
//! spec requires allocate/release to run through the buffer pool so that
//! concurrent readers of the header page see consistent state.

mod file;
mod free;
mod header;
mod node;
mod output;
mod page;

pub use file::TableFile;
pub use free::FreePage;
pub use header::HeaderPage;
pub use node::{InternalPage, LeafPage, NodeKind};
pub use output::OutputPage;
pub use page::Page;

/// Fixed page size in bytes, per spec.md §3.
pub const PAGE_SIZE: usize = 4096;
/// Width in bytes of a key field.
pub const KEY_SIZE: usize = 8;
/// Width in bytes of a value payload.
pub const VALUE_SIZE: usize = 120;
/// Internal node fan-out (`I`).
pub const INTERNAL_ORDER: usize = 249;
/// Leaf node fan-out (`L`); a leaf holds `LEAF_ORDER - 1` records.
pub const LEAF_ORDER: usize = 32;
/// Number of result slots in a join output page.
pub const OUTPUT_SLOTS: usize = 16;

/// Minimum number of keys a non-root leaf must retain after a delete.
pub const LEAF_MIN_KEYS: usize = (LEAF_ORDER - 1).div_ceil(2);
/// Minimum number of keys a non-root internal node must retain after a delete.
pub const INTERNAL_MIN_KEYS: usize = INTERNAL_ORDER.div_ceil(2) - 1;

/// A 64-bit unsigned key, per spec.md §3.
pub type Key = u64;
/// 120 bytes of opaque payload, per spec.md §3.
pub type RawValue = [u8; VALUE_SIZE];

/// Right-pad or truncate an arbitrary byte slice into a fixed [`RawValue`].
pub fn pack_value(bytes: &[u8]) -> RawValue {
    let mut v = [0u8; VALUE_SIZE];
    let n = bytes.len().min(VALUE_SIZE);
    v[..n].copy_from_slice(&bytes[..n]);
    v
}

/// Inverse of [`pack_value`]: the bytes up to the first trailing `NUL` pad,
/// lossily converted to UTF-8. Used where a value needs to be rendered as
/// text (join output, diagnostics).
pub fn unpack_value(value: &RawValue) -> String {
    let end = value.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&value[..end]).into_owned()
}
