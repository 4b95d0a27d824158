//! Public facade (C6 table manager plus the transaction lifecycle of C8)
//! composing `storage`, `buffer`, `btree`, `wal`, `recovery`, and `join`
//! into the single entry point spec.md §6 describes.


use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use buffer::BufferPool;
use btree::BTree;
use common::{Config, DbError, DbResult, Lsn, PageOffset, TableId, Xid};
use storage::{pack_value, HeaderPage, LeafPage, Page, RawValue, TableFile, PAGE_SIZE};
use wal::{RecordType, Wal};

/// Install a `tracing_subscriber::fmt` subscriber. The library never does
/// this implicitly; call it once from a host binary before touching
/// [`Engine`].
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();
}

struct ActiveTransaction {
    xid: Xid,
    last_lsn: Lsn,
}

/// The process-wide database context: one buffer pool, one log, at most
/// `config.max_open_tables` open tables, at most one active transaction
/// at a time (spec.md §5).
pub struct Engine {
    config: Config,
    pool: BufferPool,
    wal: Wal,
    tables: HashMap<TableId, PathBuf>,
    recovered: bool,
    txn: Option<ActiveTransaction>,
    next_xid: u64,
}

impl Engine {
    /// `init_db(buf_size)`: allocate the buffer pool and open the log file,
    /// creating `config.data_dir` if it doesn't exist yet.
    pub fn init_db(config: Config) -> DbResult<Self> {
        fs::create_dir_all(&config.data_dir)?;
        let wal = Wal::open(config.wal_path())?;
        let pool = BufferPool::new(config.buffer_pool_frames);
        tracing::info!(frames = config.buffer_pool_frames, "database initialized");
        Ok(Self {
            config,
            pool,
            wal,
            tables: HashMap::new(),
            recovered: false,
            txn: None,
            next_xid: 1,
        })
    }

    /// `shutdown_db()`: flush every open table and fsync the log.
    pub fn shutdown_db(mut self) -> DbResult<()> {
        self.pool.shutdown()?;
        self.wal.fsync()?;
        tracing::info!("database shut down");
        Ok(())
    }

    /// `open_table(path)`: open (and, if new, initialize) a table file,
    /// assigning it the smallest free table ID in `[1, max_open_tables]`.
    /// Runs recovery once, the first time any table is opened in this
    /// process, over whatever tables are registered with the pool at that
    /// moment (spec.md §4.7's "at startup, before any user operation").
    pub fn open_table(&mut self, path: impl AsRef<Path>) -> DbResult<TableId> {
        if self.tables.len() >= self.config.max_open_tables {
            return Err(DbError::TableSlotsExhausted(self.config.max_open_tables));
        }
        let id = (1..=self.config.max_open_tables as u8)
            .map(TableId)
            .find(|id| !self.tables.contains_key(id))
            .ok_or(DbError::TableSlotsExhausted(self.config.max_open_tables))?;

        let path = path.as_ref().to_path_buf();
        let mut file = TableFile::open(&path)?;
        if file.is_empty()? {
            let mut header = Page::zeroed();
            HeaderPage::init(&mut header);
            file.append_zeroed_pages(1)?;
            HeaderPage::set_num_pages(&mut header, 1);
            file.write_block(PageOffset(0), &header)?;
        }

        self.pool.register_table(id, file);
        self.tables.insert(id, path);
        tracing::debug!(table = id.0, "table opened");

        if !self.recovered {
            recovery::recover(&mut self.pool, &mut self.wal)?;
            self.recovered = true;
        }

        Ok(id)
    }

    /// `close_table(id)`: flush the table's frames and drop its handle.
    pub fn close_table(&mut self, table: TableId) -> DbResult<()> {
        self.pool.close_table(table)?;
        self.tables.remove(&table);
        Ok(())
    }

    pub fn insert(&mut self, table: TableId, key: u64, value: &[u8]) -> DbResult<()> {
        BTree::new(&mut self.pool, table).insert(key, pack_value(value))
    }

    pub fn find(&mut self, table: TableId, key: u64) -> DbResult<RawValue> {
        BTree::new(&mut self.pool, table).find(key)?.ok_or(DbError::NotFound)
    }

    pub fn delete(&mut self, table: TableId, key: u64) -> DbResult<()> {
        BTree::new(&mut self.pool, table).delete(key)
    }

    /// `begin_transaction()`: start the single process-wide transaction.
    pub fn begin_transaction(&mut self) -> DbResult<()> {
        if self.txn.is_some() {
            return Err(DbError::Transaction("a transaction is already active".into()));
        }
        let xid = Xid(self.next_xid);
        self.next_xid += 1;
        let lsn = self.wal.append(Lsn::NONE, xid, RecordType::Begin, TableId(0), 0, 0, 0, [0; 120], [0; 120])?;
        self.txn = Some(ActiveTransaction { xid, last_lsn: lsn });
        tracing::debug!(xid = xid.0, "transaction begun");
        Ok(())
    }

    /// `update(table, key, value)`: the only write the transaction layer
    /// covers (spec.md §4.6) — a non-structural overwrite of an existing
    /// record's value, logged with both images so it can be redone or
    /// undone.
    ///
    /// The log is forced before the page is touched, not after: spec.md
    /// §4.6 only allows a page stamped with `page_lsn = L` to reach disk
    /// once the log is durable past `L`, and the buffer pool's clock
    /// eviction has no way to check that on its own. Forcing here, before
    /// `apply_update` ever dirties the frame, makes the ordering hold no
    /// matter when the pool later chooses to evict it.
    pub fn update(&mut self, table: TableId, key: u64, value: &[u8]) -> DbResult<()> {
        let txn = self.txn.as_ref().ok_or_else(|| DbError::Transaction("update requires an active transaction".into()))?;
        let (leaf, slot) = BTree::new(&mut self.pool, table)
            .locate(key)?
            .ok_or(DbError::NotFound)?;
        let pnum = leaf.0 / PAGE_SIZE as u64;
        let offset = LeafPage::value_offset(slot) as u32;
        let new_image = pack_value(value);
        let old_image = LeafPage::value(&self.pool.get_page(table, leaf)?, slot);

        let lsn = self.wal.append(
            txn.last_lsn,
            txn.xid,
            RecordType::Update,
            table,
            pnum,
            offset,
            storage::VALUE_SIZE as u32,
            old_image,
            new_image,
        )?;
        self.wal.fsync()?;
        BTree::new(&mut self.pool, table).apply_update(leaf, slot, &new_image, lsn)?;

        let txn = self.txn.as_mut().expect("checked above");
        txn.last_lsn = lsn;
        Ok(())
    }

    /// `commit_transaction()`: append a COMMIT record and force the log.
    pub fn commit_transaction(&mut self) -> DbResult<()> {
        let txn = self.txn.take().ok_or_else(|| DbError::Transaction("no active transaction".into()))?;
        self.wal.append(txn.last_lsn, txn.xid, RecordType::Commit, TableId(0), 0, 0, 0, [0; 120], [0; 120])?;
        self.wal.fsync()?;
        tracing::info!(xid = txn.xid.0, "transaction committed");
        Ok(())
    }

    /// `abort_transaction()`: walk the backward LSN chain applying each
    /// UPDATE's `old_image`, append an ABORT record, and force the log.
    pub fn abort_transaction(&mut self) -> DbResult<()> {
        let txn = self.txn.take().ok_or_else(|| DbError::Transaction("no active transaction".into()))?;
        let mut records = self.wal.scan()?;
        records.retain(|r| r.xid == txn.xid && r.record_type == RecordType::Update);

        let mut by_lsn: HashMap<Lsn, usize> = HashMap::new();
        for (i, r) in records.iter().enumerate() {
            by_lsn.insert(r.lsn, i);
        }

        let mut cursor = Some(txn.last_lsn);
        while let Some(lsn) = cursor {
            let Some(&i) = by_lsn.get(&lsn) else { break };
            let record = &records[i];
            wal::write_image(&mut self.pool, record.table_id, record.pnum, record.offset, record.length, &record.old_image)?;
            cursor = if record.prev_lsn == Lsn::NONE { None } else { Some(record.prev_lsn) };
        }

        self.wal.append(txn.last_lsn, txn.xid, RecordType::Abort, TableId(0), 0, 0, 0, [0; 120], [0; 120])?;
        self.wal.fsync()?;
        tracing::info!(xid = txn.xid.0, "transaction aborted");
        Ok(())
    }

    /// `join_table(t1, t2, result_path)`: sort-merge equi-join over the
    /// two tables' leaf sibling chains, writing matched rows as CSV.
    pub fn join_table(&mut self, t1: TableId, t2: TableId, result_path: impl AsRef<Path>) -> DbResult<usize> {
        join::join_tables(&mut self.pool, t1, t2, result_path)
    }
}
