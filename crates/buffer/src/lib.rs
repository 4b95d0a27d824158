//! Buffer pool manager (C4) and the free-list page allocator (C3).
//!
//! The spec ties allocate/release to the buffer pool so that concurrent
//! readers of the header and free-list pages observe consistent state
//! (spec.md §4.2, §4.3): every frame is a fixed slot in a clock-swept
//! array, and allocation/release are just `get_page`/`put_page` calls
//! against the header page plus the pages being threaded onto or off of
//! the free list.


use std::collections::HashMap;

use common::{DbError, DbResult, PageOffset, TableId};
use storage::{FreePage, HeaderPage, Page, TableFile, PAGE_SIZE};

/// One cached page and its buffer-pool bookkeeping.
struct Frame {
    owner: Option<(TableId, PageOffset)>,
    page: Page,
    dirty: bool,
    reference: bool,
}

impl Frame {
    fn empty() -> Self {
        Self {
            owner: None,
            page: Page::zeroed(),
            dirty: false,
            reference: false,
        }
    }
}

/// A fixed-size page cache shared by every open table, with clock
/// (second-chance) eviction and write-back of dirty frames (spec.md §4.3).
pub struct BufferPool {
    frames: Vec<Frame>,
    index: HashMap<(TableId, PageOffset), usize>,
    hand: usize,
    tables: HashMap<TableId, TableFile>,
}

impl BufferPool {
    /// Allocate a pool with `capacity` frames. Per spec.md §4.5,
    /// `init_db(buf_size)` is the caller that picks this number.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "buffer pool must have at least one frame");
        Self {
            frames: (0..capacity).map(|_| Frame::empty()).collect(),
            index: HashMap::new(),
            hand: 0,
            tables: HashMap::new(),
        }
    }

    /// Register a table's backing file with the pool. Called by the table
    /// manager (C6) when a table is opened.
    pub fn register_table(&mut self, table: TableId, file: TableFile) {
        self.tables.insert(table, file);
    }

    /// Drop a table's file handle, flushing and evicting its frames first.
    pub fn close_table(&mut self, table: TableId) -> DbResult<()> {
        self.flush_all(table)?;
        self.tables.remove(&table);
        Ok(())
    }

    /// Every table currently registered with the pool, for callers (startup
    /// recovery) that must sweep all of them without the table manager's
    /// own bookkeeping.
    pub fn open_tables(&self) -> Vec<TableId> {
        self.tables.keys().copied().collect()
    }

    fn file_mut(&mut self, table: TableId) -> DbResult<&mut TableFile> {
        self.tables
            .get_mut(&table)
            .ok_or_else(|| DbError::Storage(format!("table {} is not open", table.0)))
    }

    /// Fetch a page, loading it from disk on a cache miss. Returns an
    /// owned copy: callers that mutate must write the result back with
    /// [`put_page`](Self::put_page) before any other operation observes
    /// the change (spec.md §4.3's page-handle design note).
    pub fn get_page(&mut self, table: TableId, offset: PageOffset) -> DbResult<Page> {
        if let Some(&idx) = self.index.get(&(table, offset)) {
            self.frames[idx].reference = true;
            return Ok(self.frames[idx].page.clone());
        }

        let page = self.file_mut(table)?.read_block(offset)?;
        let idx = self.replace()?;
        self.frames[idx] = Frame {
            owner: Some((table, offset)),
            page: page.clone(),
            dirty: false,
            reference: true,
        };
        self.index.insert((table, offset), idx);
        tracing::trace!(table = table.0, offset = offset.0, "buffer pool miss, loaded from disk");
        Ok(page)
    }

    /// Write a mutated page back into its cache frame and mark it dirty.
    pub fn put_page(&mut self, table: TableId, offset: PageOffset, page: Page) -> DbResult<()> {
        let idx = match self.index.get(&(table, offset)) {
            Some(&idx) => idx,
            None => {
                self.get_page(table, offset)?;
                *self.index.get(&(table, offset)).expect("just inserted")
            }
        };
        self.frames[idx].page = page;
        self.frames[idx].dirty = true;
        self.frames[idx].reference = true;
        Ok(())
    }

    /// An explicit alias for "I changed this resident page in place and it
    /// must be written back", matching the original's named buffer-pool
    /// operation for pages already obtained via `get_page`.
    pub fn mark_dirty(&mut self, table: TableId, offset: PageOffset, page: Page) -> DbResult<()> {
        self.put_page(table, offset, page)
    }

    /// Clock-sweep to find a victim frame, writing it back first if dirty.
    fn replace(&mut self) -> DbResult<usize> {
        let n = self.frames.len();
        for _ in 0..=2 * n {
            let idx = self.hand;
            self.hand = (self.hand + 1) % n;

            if self.frames[idx].owner.is_none() {
                return Ok(idx);
            }
            if self.frames[idx].reference {
                self.frames[idx].reference = false;
                continue;
            }

            let (table, offset) = self.frames[idx].owner.take().unwrap();
            if self.frames[idx].dirty {
                let page = self.frames[idx].page.clone();
                self.file_mut(table)?.write_block(offset, &page)?;
                tracing::debug!(table = table.0, offset = offset.0, "evicted dirty frame, wrote back");
            }
            self.index.remove(&(table, offset));
            self.frames[idx] = Frame::empty();
            return Ok(idx);
        }
        Err(DbError::Corrupt("clock sweep failed to find a victim frame".into()))
    }

    /// Write back every dirty frame owned by `table` and evict all of its
    /// frames (spec.md §4.3).
    pub fn flush_all(&mut self, table: TableId) -> DbResult<()> {
        let owned: Vec<(usize, PageOffset)> = self
            .frames
            .iter()
            .enumerate()
            .filter_map(|(idx, f)| f.owner.and_then(|(t, o)| (t == table).then_some((idx, o))))
            .collect();

        for (idx, offset) in owned {
            if self.frames[idx].dirty {
                let page = self.frames[idx].page.clone();
                self.file_mut(table)?.write_block(offset, &page)?;
            }
            self.index.remove(&(table, offset));
            self.frames[idx] = Frame::empty();
        }
        Ok(())
    }

    /// Flush every dirty frame for every open table and drop all cached
    /// pages. Called by `shutdown_db`.
    pub fn shutdown(&mut self) -> DbResult<()> {
        for table in self.open_tables() {
            self.flush_all(table)?;
        }
        Ok(())
    }

    // ---- Free-list allocator (C3) ----

    /// Draw a page from the free list, growing the file first if empty.
    pub fn allocate_page(&mut self, table: TableId) -> DbResult<PageOffset> {
        let mut header = self.get_page(table, PageOffset(0))?;

        if HeaderPage::free_head(&header).is_none() {
            self.grow_file(table, &mut header)?;
        }

        let addr = HeaderPage::free_head(&header);
        let free_page = self.get_page(table, addr)?;
        let next = FreePage::next(&free_page);

        HeaderPage::set_free_head(&mut header, next);
        self.put_page(table, PageOffset(0), header)?;

        Ok(addr)
    }

    /// Return a page to the free list, zeroing its contents.
    pub fn release_page(&mut self, table: TableId, addr: PageOffset) -> DbResult<()> {
        let mut header = self.get_page(table, PageOffset(0))?;
        let old_head = HeaderPage::free_head(&header);

        let mut freed = Page::zeroed();
        FreePage::set_next(&mut freed, old_head);
        self.put_page(table, addr, freed)?;

        HeaderPage::set_free_head(&mut header, addr);
        self.put_page(table, PageOffset(0), header)?;
        Ok(())
    }

    /// Double the file's page count, chaining the newly appended pages
    /// onto the (empty) free list with the last-appended page as the new
    /// head, per spec.md §4.2.
    fn grow_file(&mut self, table: TableId, header: &mut Page) -> DbResult<()> {
        let grow_by = HeaderPage::num_pages(header).max(1);
        let start = self.file_mut(table)?.append_zeroed_pages(grow_by)?;

        let addrs: Vec<PageOffset> = (0..grow_by)
            .map(|i| PageOffset(start.0 + i * PAGE_SIZE as u64))
            .collect();

        let mut prev = PageOffset::NONE;
        for &addr in &addrs {
            let mut page = self.get_page(table, addr)?;
            FreePage::set_next(&mut page, prev);
            self.put_page(table, addr, page)?;
            prev = addr;
        }

        HeaderPage::set_num_pages(header, HeaderPage::num_pages(header) + grow_by);
        HeaderPage::set_free_head(header, *addrs.last().unwrap());
        tracing::debug!(table = table.0, grew_by = grow_by, "grew table file");
        Ok(())
    }
}
