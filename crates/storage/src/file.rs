//! Positioned block I/O against a table file (C1, spec.md §4.1).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use common::{DbError, DbResult, PageOffset};

use crate::{Page, PAGE_SIZE};

/// A single table's backing file. All reads and writes are exactly
/// [`PAGE_SIZE`] bytes at offsets that are multiples of [`PAGE_SIZE`].
#[derive(Debug)]
pub struct TableFile {
    path: PathBuf,
    file: File,
}

impl TableFile {
    /// Open a table file, creating it (empty) if it does not exist.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| DbError::Storage(format!("open table file {}: {e}", path.display())))?;
        Ok(Self { path, file })
    }

    /// `true` if the file was empty (size 0) when opened — the caller must
    /// initialize it with a header page.
    pub fn is_empty(&self) -> DbResult<bool> {
        Ok(self.file.metadata()?.len() == 0)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of whole pages currently present in the file on disk.
    pub fn len_pages(&self) -> DbResult<u64> {
        Ok(self.file.metadata()?.len() / PAGE_SIZE as u64)
    }

    /// Read exactly one page at `offset`, which must be page-aligned.
    pub fn read_block(&mut self, offset: PageOffset) -> DbResult<Page> {
        debug_assert_eq!(offset.0 % PAGE_SIZE as u64, 0, "misaligned page read");
        self.file.seek(SeekFrom::Start(offset.0))?;
        let mut bytes = [0u8; PAGE_SIZE];
        self.file.read_exact(&mut bytes).map_err(|e| {
            DbError::Storage(format!(
                "short read at offset {} in {}: {e}",
                offset.0,
                self.path.display()
            ))
        })?;
        Ok(Page::from_bytes(bytes))
    }

    /// Write exactly one page at `offset`, which must be page-aligned.
    pub fn write_block(&mut self, offset: PageOffset, page: &Page) -> DbResult<()> {
        debug_assert_eq!(offset.0 % PAGE_SIZE as u64, 0, "misaligned page write");
        self.file.seek(SeekFrom::Start(offset.0))?;
        self.file.write_all(&page.bytes)?;
        Ok(())
    }

    /// Force all writes made so far to stable storage. Every durability
    /// guarantee above this layer (WAL, commit) relies on this being honored.
    pub fn fsync(&self) -> DbResult<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Append `count` zeroed pages to the end of the file, returning the
    /// offset of the first appended page. Used by the allocator's file
    /// growth policy (spec.md §4.2).
    pub fn append_zeroed_pages(&mut self, count: u64) -> DbResult<PageOffset> {
        let start = self.len_pages()? * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::End(0))?;
        let zero_page = [0u8; PAGE_SIZE];
        for _ in 0..count {
            self.file.write_all(&zero_page)?;
        }
        Ok(PageOffset(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn fresh_file_is_empty() {
        let dir = tempdir().unwrap();
        let file = TableFile::open(dir.path().join("t.db")).unwrap();
        assert!(file.is_empty().unwrap());
        assert_eq!(file.len_pages().unwrap(), 0);
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let mut file = TableFile::open(dir.path().join("t.db")).unwrap();
        file.append_zeroed_pages(1).unwrap();

        let mut page = Page::zeroed();
        page.bytes[0..4].copy_from_slice(&[1, 2, 3, 4]);
        file.write_block(PageOffset(0), &page).unwrap();
        file.fsync().unwrap();

        let read_back = file.read_block(PageOffset(0)).unwrap();
        assert_eq!(&read_back.bytes[0..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn append_zeroed_pages_extends_file() {
        let dir = tempdir().unwrap();
        let mut file = TableFile::open(dir.path().join("t.db")).unwrap();
        let first = file.append_zeroed_pages(3).unwrap();
        assert_eq!(first, PageOffset(0));
        assert_eq!(file.len_pages().unwrap(), 3);

        let second = file.append_zeroed_pages(2).unwrap();
        assert_eq!(second, PageOffset(3 * PAGE_SIZE as u64));
        assert_eq!(file.len_pages().unwrap(), 5);
    }

    #[test]
    fn reopen_preserves_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        {
            let mut file = TableFile::open(&path).unwrap();
            file.append_zeroed_pages(1).unwrap();
            let mut page = Page::zeroed();
            page.bytes[10] = 42;
            file.write_block(PageOffset(0), &page).unwrap();
            file.fsync().unwrap();
        }
        let mut file = TableFile::open(&path).unwrap();
        assert!(!file.is_empty().unwrap());
        let page = file.read_block(PageOffset(0)).unwrap();
        assert_eq!(page.bytes[10], 42);
    }
}
