//! Identifiers, error types, and runtime configuration shared across the
//! storage engine crates.

#[cfg(test)]
mod tests;

use std::{io, path::PathBuf};
use thiserror::Error;

/// Small integer handle for an open table, assigned by the table manager.
/// Valid range is `1..=max_open_tables` (spec: `1..=10` by default).
/// Examples:
/// - `let t = TableId(1); // first table opened`
/// - `let t = TableId(10); // last slot in a default-sized table manager`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u8);

/// Byte offset of a page within its table file. `0` is the sentinel for
/// "no page" (empty free list, empty tree, last leaf in the sibling chain).
/// Every non-zero value is a multiple of `storage::PAGE_SIZE`.
/// Examples:
/// - `let header = PageOffset(0); // the header page, or the "no page" sentinel`
/// - `let leaf = PageOffset(4096); // the second page in the file`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageOffset(pub u64);

impl PageOffset {
    pub const NONE: PageOffset = PageOffset(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// Transaction identifier, assigned monotonically by `begin_transaction`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Xid(pub u64);

/// Log sequence number: the byte offset of the *end* of a log record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lsn(pub u64);

impl Lsn {
    pub const NONE: Lsn = Lsn(0);
}

/// Canonical error type shared across the engine's crates.
#[derive(Error, Debug)]
pub enum DbError {
    /// Insert rejected because the key already exists.
    #[error("duplicate key")]
    Duplicate,
    /// Find/delete/update target key does not exist.
    #[error("key not found")]
    NotFound,
    /// `open_table` called with no free slot in the table manager.
    #[error("no free table slot (max {0} open tables)")]
    TableSlotsExhausted(usize),
    /// No active transaction when one was required, or one already active.
    #[error("transaction error: {0}")]
    Transaction(String),
    /// Lower-level storage/paging failure.
    #[error("storage: {0}")]
    Storage(String),
    /// WAL append/replay failure.
    #[error("wal: {0}")]
    Wal(String),
    /// A structural invariant was violated (malformed tree, dangling
    /// pointer, impossible parent link). Per spec.md §7 these indicate a
    /// bug, not a recoverable domain condition; callers should treat a
    /// `Corrupt` result as fatal.
    #[error("invariant violation: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias carrying [`DbError`].
pub type DbResult<T> = Result<T, DbError>;

/// Runtime configuration for an `engine::Engine`.
///
/// # Example
/// ```
/// use common::Config;
/// use std::path::PathBuf;
///
/// let config = Config::builder()
///     .data_dir(PathBuf::from("./my_db"))
///     .buffer_pool_frames(64)
///     .build();
/// ```
#[derive(Clone, Debug, bon::Builder)]
pub struct Config {
    /// Directory holding table files and the WAL file.
    #[builder(default = PathBuf::from("./db_data"))]
    pub data_dir: PathBuf,
    /// File name of the write-ahead log, resolved inside `data_dir`.
    #[builder(default = PathBuf::from("db.wal"))]
    pub wal_file: PathBuf,
    /// Number of frames held by the buffer pool.
    #[builder(default = 64)]
    pub buffer_pool_frames: usize,
    /// Maximum number of tables that may be open simultaneously (spec §4.5).
    #[builder(default = 10)]
    pub max_open_tables: usize,
}

impl Config {
    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join(&self.wal_file)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./db_data"),
            wal_file: PathBuf::from("db.wal"),
            buffer_pool_frames: 64,
            max_open_tables: 10,
        }
    }
}

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::{Config, DbError, DbResult, Lsn, PageOffset, TableId, Xid};
}
