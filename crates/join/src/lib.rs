//! Sort-merge equi-join (C10) between two tables' primary-key B+trees,
//! streamed through a fixed-size output buffer and written out as CSV.
//!
//! Both trees are already sorted by key along their leaf sibling chains
//! (spec.md §4.4), so the join is a plain two-pointer merge: advance
//! whichever cursor holds the smaller key, emit a row on equality, and
//! advance both. No sort step and no hash table are needed.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use btree::BTree;
use buffer::BufferPool;
use common::{DbResult, PageOffset, TableId};
use storage::{unpack_value, LeafPage, Page, RawValue, OUTPUT_SLOTS};

/// One side's walk through its leaf sibling chain.
struct Cursor {
    leaf: PageOffset,
    slot: usize,
}

impl Cursor {
    fn at_start(pool: &mut BufferPool, table: TableId) -> DbResult<Self> {
        let leaf = BTree::new(pool, table).leftmost_leaf()?;
        Ok(Self { leaf, slot: 0 })
    }

    fn is_done(&self) -> bool {
        self.leaf.is_none()
    }

    fn current(&self, pool: &mut BufferPool, table: TableId) -> DbResult<(u64, RawValue)> {
        let page = pool.get_page(table, self.leaf)?;
        Ok((LeafPage::key(&page, self.slot), LeafPage::value(&page, self.slot)))
    }

    fn advance(&mut self, pool: &mut BufferPool, table: TableId) -> DbResult<()> {
        let page = pool.get_page(table, self.leaf)?;
        self.slot += 1;
        if self.slot >= LeafPage::num_keys(&page) {
            self.leaf = LeafPage::sibling(&page);
            self.slot = 0;
        }
        Ok(())
    }
}

/// Accumulates matched rows into an in-memory output page and flushes it
/// as CSV once full, per the Open Question resolution keeping the output
/// buffer outside the pool (see DESIGN.md).
struct OutputBuffer<W: Write> {
    page: Page,
    filled: usize,
    writer: W,
    rows_written: usize,
}

impl<W: Write> OutputBuffer<W> {
    fn new(writer: W) -> Self {
        Self { page: Page::zeroed(), filled: 0, writer, rows_written: 0 }
    }

    fn push(&mut self, key1: u64, value1: &RawValue, key2: u64, value2: &RawValue) -> DbResult<()> {
        storage::OutputPage::set_row(&mut self.page, self.filled, key1, value1, key2, value2);
        self.filled += 1;
        if self.filled == OUTPUT_SLOTS {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> DbResult<()> {
        for slot in 0..self.filled {
            let (k1, v1, k2, v2) = storage::OutputPage::row(&self.page, slot);
            writeln!(self.writer, "{},{},{},{}", k1, unpack_value(&v1), k2, unpack_value(&v2))?;
            self.rows_written += 1;
        }
        self.filled = 0;
        self.page = Page::zeroed();
        Ok(())
    }
}

/// Join `left` against `right` on equal keys, writing matched rows as
/// `key1,value1,key2,value2` lines to `out_path`. Returns the number of
/// rows emitted.
pub fn join_tables(pool: &mut BufferPool, left: TableId, right: TableId, out_path: impl AsRef<Path>) -> DbResult<usize> {
    let file = File::create(out_path.as_ref())?;
    let mut out = OutputBuffer::new(BufWriter::new(file));

    let mut lc = Cursor::at_start(pool, left)?;
    let mut rc = Cursor::at_start(pool, right)?;

    while !lc.is_done() && !rc.is_done() {
        let (lk, lv) = lc.current(pool, left)?;
        let (rk, rv) = rc.current(pool, right)?;

        if lk < rk {
            lc.advance(pool, left)?;
        } else if rk < lk {
            rc.advance(pool, right)?;
        } else {
            out.push(lk, &lv, rk, &rv)?;
            lc.advance(pool, left)?;
            rc.advance(pool, right)?;
        }
    }

    out.flush()?;
    out.writer.flush()?;
    tracing::info!(rows = out.rows_written, "join complete");
    Ok(out.rows_written)
}

#[cfg(test)]
mod tests;
