//! Write-ahead log (C7): a fixed-layout, append-only sequence of log
//! records, plus the raw page-patching primitives that both the normal
//! update path and crash recovery (`recovery`) use to apply them.
//!
//! # Architecture
//!
//! - **Fixed record size** — every record, regardless of type, occupies
//!   [`RECORD_SIZE`] bytes, so scanning the log never needs a length prefix.
//! - **`lsn` is a byte offset** — the offset of the *end* of a record in the
//!   log file, doubling as that record's identity (spec.md §4.6).
//! - **Physical redo / logical undo** — `old_image`/`new_image` are raw
//!   page bytes, not record-level operations, so redo and undo never need
//!   to understand B+tree structure.

#[cfg(test)]
mod tests;

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{ByteOrder, LittleEndian};

use buffer::BufferPool;
use common::{DbError, DbResult, Lsn, PageOffset, TableId, Xid};
use storage::{InternalPage, LeafPage, NodeKind, RawValue, PAGE_SIZE, VALUE_SIZE};

const LSN: usize = 0;
const PREV_LSN: usize = 8;
const XID: usize = 16;
const RTYPE: usize = 24;
const TABLE_ID: usize = 28;
const PNUM: usize = 32;
const OFFSET: usize = 40;
const LENGTH: usize = 44;
const OLD_IMAGE: usize = 48;
const NEW_IMAGE: usize = OLD_IMAGE + VALUE_SIZE;
/// Total on-disk size of one log record: every field packed with no
/// length prefix, since the size never varies.
pub const RECORD_SIZE: usize = NEW_IMAGE + VALUE_SIZE;

/// Log record kind, per spec.md §4.6.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordType {
    Begin,
    Update,
    Commit,
    Abort,
}

impl RecordType {
    fn as_u32(self) -> u32 {
        match self {
            RecordType::Begin => 0,
            RecordType::Update => 1,
            RecordType::Commit => 2,
            RecordType::Abort => 3,
        }
    }

    fn from_u32(v: u32) -> DbResult<Self> {
        match v {
            0 => Ok(RecordType::Begin),
            1 => Ok(RecordType::Update),
            2 => Ok(RecordType::Commit),
            3 => Ok(RecordType::Abort),
            other => Err(DbError::Corrupt(format!("unknown wal record type {other}"))),
        }
    }
}

/// One fixed-layout WAL record.
#[derive(Clone, Debug)]
pub struct LogRecord {
    pub lsn: Lsn,
    pub prev_lsn: Lsn,
    pub xid: Xid,
    pub record_type: RecordType,
    pub table_id: TableId,
    /// Page number (`offset / PAGE_SIZE`) the update applies to.
    pub pnum: u64,
    /// Byte offset within that page.
    pub offset: u32,
    /// Length of the changed span, `<= VALUE_SIZE`.
    pub length: u32,
    pub old_image: RawValue,
    pub new_image: RawValue,
}

impl LogRecord {
    /// The page this record's image applies to.
    pub fn page_offset(&self) -> PageOffset {
        PageOffset(self.pnum * PAGE_SIZE as u64)
    }

    fn encode(&self, buf: &mut [u8; RECORD_SIZE]) {
        LittleEndian::write_u64(&mut buf[LSN..LSN + 8], self.lsn.0);
        LittleEndian::write_u64(&mut buf[PREV_LSN..PREV_LSN + 8], self.prev_lsn.0);
        LittleEndian::write_u64(&mut buf[XID..XID + 8], self.xid.0);
        LittleEndian::write_u32(&mut buf[RTYPE..RTYPE + 4], self.record_type.as_u32());
        LittleEndian::write_u32(&mut buf[TABLE_ID..TABLE_ID + 4], self.table_id.0 as u32);
        LittleEndian::write_u64(&mut buf[PNUM..PNUM + 8], self.pnum);
        LittleEndian::write_u32(&mut buf[OFFSET..OFFSET + 4], self.offset);
        LittleEndian::write_u32(&mut buf[LENGTH..LENGTH + 4], self.length);
        buf[OLD_IMAGE..OLD_IMAGE + VALUE_SIZE].copy_from_slice(&self.old_image);
        buf[NEW_IMAGE..NEW_IMAGE + VALUE_SIZE].copy_from_slice(&self.new_image);
    }

    fn decode(buf: &[u8; RECORD_SIZE]) -> DbResult<Self> {
        let mut old_image = [0u8; VALUE_SIZE];
        old_image.copy_from_slice(&buf[OLD_IMAGE..OLD_IMAGE + VALUE_SIZE]);
        let mut new_image = [0u8; VALUE_SIZE];
        new_image.copy_from_slice(&buf[NEW_IMAGE..NEW_IMAGE + VALUE_SIZE]);

        Ok(Self {
            lsn: Lsn(LittleEndian::read_u64(&buf[LSN..LSN + 8])),
            prev_lsn: Lsn(LittleEndian::read_u64(&buf[PREV_LSN..PREV_LSN + 8])),
            xid: Xid(LittleEndian::read_u64(&buf[XID..XID + 8])),
            record_type: RecordType::from_u32(LittleEndian::read_u32(&buf[RTYPE..RTYPE + 4]))?,
            table_id: TableId(LittleEndian::read_u32(&buf[TABLE_ID..TABLE_ID + 4]) as u8),
            pnum: LittleEndian::read_u64(&buf[PNUM..PNUM + 8]),
            offset: LittleEndian::read_u32(&buf[OFFSET..OFFSET + 4]),
            length: LittleEndian::read_u32(&buf[LENGTH..LENGTH + 4]),
            old_image,
            new_image,
        })
    }
}

/// The log file itself: append, fsync, and forward scan.
pub struct Wal {
    file: File,
    path: PathBuf,
}

impl Wal {
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| DbError::Wal(format!("open wal {}: {e}", path.display())))?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, filling in its `lsn` as the resulting end-of-file
    /// offset. Does not fsync; see spec.md §4.6's ordering contract for
    /// when a caller must force durability.
    #[allow(clippy::too_many_arguments)]
    pub fn append(
        &mut self,
        prev_lsn: Lsn,
        xid: Xid,
        record_type: RecordType,
        table_id: TableId,
        pnum: u64,
        offset: u32,
        length: u32,
        old_image: RawValue,
        new_image: RawValue,
    ) -> DbResult<Lsn> {
        let start = self.file.metadata()?.len();
        let lsn = Lsn(start + RECORD_SIZE as u64);
        let record = LogRecord {
            lsn,
            prev_lsn,
            xid,
            record_type,
            table_id,
            pnum,
            offset,
            length,
            old_image,
            new_image,
        };

        let mut buf = [0u8; RECORD_SIZE];
        record.encode(&mut buf);
        self.file.write_all(&buf)?;
        tracing::trace!(lsn = lsn.0, xid = xid.0, ?record_type, "wal record appended");
        Ok(lsn)
    }

    /// Force every record written so far to stable storage.
    pub fn fsync(&self) -> DbResult<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Every record in the log, forward from the start, in ascending lsn.
    pub fn scan(&mut self) -> DbResult<Vec<LogRecord>> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut records = Vec::new();
        let mut buf = [0u8; RECORD_SIZE];
        loop {
            match self.file.read_exact(&mut buf) {
                Ok(()) => records.push(LogRecord::decode(&buf)?),
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(DbError::Wal(format!("short read scanning wal: {e}"))),
            }
        }
        Ok(records)
    }
}

/// Read `length` raw bytes at `(table, pnum, offset)`, right-padded into a
/// `RawValue`. Used to capture a record's `old_image` before a write.
pub fn read_image(pool: &mut BufferPool, table: TableId, pnum: u64, offset: u32, length: u32) -> DbResult<RawValue> {
    let page = pool.get_page(table, PageOffset(pnum * PAGE_SIZE as u64))?;
    let mut image = [0u8; VALUE_SIZE];
    let start = offset as usize;
    let len = length as usize;
    image[..len].copy_from_slice(&page.bytes[start..start + len]);
    Ok(image)
}

/// Physically patch `length` bytes at `(table, pnum, offset)` with `image`.
/// Pure byte replacement: callers decide separately whether `page_lsn`
/// should move.
pub fn write_image(pool: &mut BufferPool, table: TableId, pnum: u64, offset: u32, length: u32, image: &RawValue) -> DbResult<()> {
    let page_offset = PageOffset(pnum * PAGE_SIZE as u64);
    let mut page = pool.get_page(table, page_offset)?;
    let start = offset as usize;
    let len = length as usize;
    page.bytes[start..start + len].copy_from_slice(&image[..len]);
    pool.put_page(table, page_offset, page)
}

/// Stamp a node page's `page_lsn`, dispatching on whether it's a leaf or
/// internal node (the field lives at the same offset in both, but only the
/// typed accessors are public outside `storage`).
pub fn stamp_page_lsn(pool: &mut BufferPool, table: TableId, pnum: u64, lsn: Lsn) -> DbResult<()> {
    let page_offset = PageOffset(pnum * PAGE_SIZE as u64);
    let mut page = pool.get_page(table, page_offset)?;
    match NodeKind::of(&page) {
        NodeKind::Leaf => LeafPage::set_page_lsn(&mut page, lsn),
        NodeKind::Internal => InternalPage::set_page_lsn(&mut page, lsn),
    }
    pool.put_page(table, page_offset, page)
}

/// Current `page_lsn` of a node page, used by redo to decide whether a
/// record has already been applied.
pub fn page_lsn(pool: &mut BufferPool, table: TableId, pnum: u64) -> DbResult<Lsn> {
    let page = pool.get_page(table, PageOffset(pnum * PAGE_SIZE as u64))?;
    Ok(match NodeKind::of(&page) {
        NodeKind::Leaf => LeafPage::page_lsn(&page),
        NodeKind::Internal => InternalPage::page_lsn(&page),
    })
}
