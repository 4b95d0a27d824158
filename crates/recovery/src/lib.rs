//! Crash recovery (C9): analysis, redo, and undo over the write-ahead
//! log, plus a free-list sweep, run once at startup before any user
//! operation is admitted.
//!
//! The passes follow spec.md §4.7 and §9 directly:
//!
//! 1. **Analysis** — scan the log forward and partition transactions into
//!    committed and in-flight (no matching `COMMIT`/`ABORT`).
//! 2. **Redo** — scan forward again; reapply every `UPDATE`'s `new_image`
//!    whose page hasn't already absorbed it (`page_lsn < record.lsn`).
//! 3. **Undo** — for every in-flight transaction, walk its `prev_lsn`
//!    chain backward and reapply `old_image` unconditionally, then log an
//!    `ABORT` for it.
//! 4. **Free-list sweep** — since `insert`/`delete` mutate the allocator
//!    unlogged (DESIGN.md), a crash mid-split or mid-coalesce can leave
//!    the on-disk free list inconsistent with which pages the tree
//!    actually occupies. Rather than trust it, every table's free list is
//!    thrown away and rebuilt from which pages the tree reaches.

use std::collections::{HashMap, HashSet};

use buffer::BufferPool;
use common::{DbResult, Lsn, PageOffset, TableId, Xid};
use storage::{FreePage, HeaderPage, InternalPage, NodeKind, Page, PAGE_SIZE};
use wal::{LogRecord, RecordType, Wal};

/// Outcome of the analysis pass: which transactions committed and which
/// were still running (and must be undone).
#[derive(Debug, Default)]
struct Analysis {
    in_flight: HashSet<Xid>,
    /// Most recent record for each transaction, used as the starting
    /// point of its undo chain.
    last_record: HashMap<Xid, usize>,
}

fn analyze(records: &[LogRecord]) -> Analysis {
    let mut analysis = Analysis::default();
    for (i, record) in records.iter().enumerate() {
        match record.record_type {
            RecordType::Begin => {
                analysis.in_flight.insert(record.xid);
            }
            RecordType::Commit | RecordType::Abort => {
                analysis.in_flight.remove(&record.xid);
            }
            RecordType::Update => {}
        }
        analysis.last_record.insert(record.xid, i);
    }
    analysis
}

/// Run recovery against `pool`'s tables using the records already durable
/// in `wal`. Leaves the log positioned for further appends (the undo
/// pass appends one `ABORT` record per loser transaction) and fsyncs
/// both the log and every touched page before returning.
pub fn recover(pool: &mut buffer::BufferPool, wal: &mut Wal) -> DbResult<()> {
    let records = wal.scan()?;
    let analysis = analyze(&records);
    tracing::info!(
        records = records.len(),
        losers = analysis.in_flight.len(),
        "recovery analysis complete"
    );

    redo(pool, &records)?;
    undo(pool, wal, &records, &analysis)?;

    for table in pool.open_tables() {
        rebuild_free_list(pool, table)?;
    }

    wal.fsync()?;
    pool.shutdown()?;
    Ok(())
}

fn redo(pool: &mut buffer::BufferPool, records: &[LogRecord]) -> DbResult<()> {
    for record in records {
        if record.record_type != RecordType::Update {
            continue;
        }
        let current = wal::page_lsn(pool, record.table_id, record.pnum)?;
        if current < record.lsn {
            wal::write_image(pool, record.table_id, record.pnum, record.offset, record.length, &record.new_image)?;
            wal::stamp_page_lsn(pool, record.table_id, record.pnum, record.lsn)?;
            tracing::debug!(xid = record.xid.0, lsn = record.lsn.0, "redo applied");
        }
    }
    Ok(())
}

fn undo(pool: &mut buffer::BufferPool, wal: &mut Wal, records: &[LogRecord], analysis: &Analysis) -> DbResult<()> {
    for &xid in &analysis.in_flight {
        let mut cursor = analysis.last_record.get(&xid).copied();
        let mut prev_lsn = Lsn::NONE;

        while let Some(idx) = cursor {
            let record = &records[idx];
            if record.record_type == RecordType::Update {
                wal::write_image(pool, record.table_id, record.pnum, record.offset, record.length, &record.old_image)?;
                tracing::debug!(xid = xid.0, lsn = record.lsn.0, "undo applied");
            }
            prev_lsn = record.prev_lsn;
            cursor = if prev_lsn == Lsn::NONE {
                None
            } else {
                records.iter().position(|r| r.lsn == prev_lsn)
            };
        }

        wal.append(prev_lsn, xid, RecordType::Abort, common::TableId(0), 0, 0, 0, [0; storage::VALUE_SIZE], [0; storage::VALUE_SIZE])?;
    }
    Ok(())
}

/// Every page offset reachable from the tree root, header page included.
/// The `sibling` pointer is a range-scan shortcut, not an ownership edge,
/// so only parent/child links are followed.
fn live_pages(pool: &mut BufferPool, table: TableId) -> DbResult<HashSet<PageOffset>> {
    let header = pool.get_page(table, PageOffset(0))?;
    let mut live = HashSet::new();
    live.insert(PageOffset(0));

    let mut stack = vec![HeaderPage::root_offset(&header)];
    while let Some(offset) = stack.pop() {
        if offset.is_none() || !live.insert(offset) {
            continue;
        }
        let page = pool.get_page(table, offset)?;
        if let NodeKind::Internal = NodeKind::of(&page) {
            for i in 0..=InternalPage::num_keys(&page) {
                stack.push(InternalPage::child(&page, i));
            }
        }
    }
    Ok(live)
}

/// Discard `table`'s on-disk free list and rebuild it from scratch: every
/// page between the header and `num_pages` that the tree doesn't reach is
/// free. Run once per table at the end of recovery, after redo/undo have
/// settled page contents but before either is trusted for allocation.
fn rebuild_free_list(pool: &mut BufferPool, table: TableId) -> DbResult<()> {
    let live = live_pages(pool, table)?;
    let num_pages = HeaderPage::num_pages(&pool.get_page(table, PageOffset(0))?);

    let mut head = PageOffset::NONE;
    let mut reclaimed = 0u64;
    for i in (1..num_pages).rev() {
        let offset = PageOffset(i * PAGE_SIZE as u64);
        if live.contains(&offset) {
            continue;
        }
        let mut page = Page::zeroed();
        FreePage::set_next(&mut page, head);
        pool.put_page(table, offset, page)?;
        head = offset;
        reclaimed += 1;
    }

    let mut header = pool.get_page(table, PageOffset(0))?;
    HeaderPage::set_free_head(&mut header, head);
    pool.put_page(table, PageOffset(0), header)?;
    tracing::debug!(table = table.0, reclaimed, "free list rebuilt from a full sweep");
    Ok(())
}
