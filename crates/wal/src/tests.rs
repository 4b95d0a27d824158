use super::*;
use storage::{pack_value, HeaderPage, LeafPage, Page, TableFile};
use tempfile::tempdir;

#[test]
fn append_assigns_increasing_lsns() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(dir.path().join("log.wal")).unwrap();

    let lsn1 = wal
        .append(Lsn::NONE, Xid(1), RecordType::Begin, TableId(1), 0, 0, 0, [0; VALUE_SIZE], [0; VALUE_SIZE])
        .unwrap();
    let lsn2 = wal
        .append(lsn1, Xid(1), RecordType::Commit, TableId(1), 0, 0, 0, [0; VALUE_SIZE], [0; VALUE_SIZE])
        .unwrap();

    assert_eq!(lsn1, Lsn(RECORD_SIZE as u64));
    assert_eq!(lsn2, Lsn(2 * RECORD_SIZE as u64));
}

#[test]
fn scan_replays_records_in_order() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(dir.path().join("log.wal")).unwrap();

    let begin_lsn = wal
        .append(Lsn::NONE, Xid(7), RecordType::Begin, TableId(1), 0, 0, 0, [0; VALUE_SIZE], [0; VALUE_SIZE])
        .unwrap();
    let update_lsn = wal
        .append(
            begin_lsn,
            Xid(7),
            RecordType::Update,
            TableId(1),
            1,
            128,
            3,
            pack_value(b"old"),
            pack_value(b"new"),
        )
        .unwrap();
    wal.append(update_lsn, Xid(7), RecordType::Commit, TableId(1), 0, 0, 0, [0; VALUE_SIZE], [0; VALUE_SIZE])
        .unwrap();
    wal.fsync().unwrap();

    let records = wal.scan().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].record_type, RecordType::Begin);
    assert_eq!(records[1].record_type, RecordType::Update);
    assert_eq!(&records[1].old_image[..3], b"old");
    assert_eq!(&records[1].new_image[..3], b"new");
    assert_eq!(records[1].prev_lsn, begin_lsn);
    assert_eq!(records[2].record_type, RecordType::Commit);
    assert_eq!(records[2].prev_lsn, update_lsn);
}

#[test]
fn reopening_preserves_previously_appended_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.wal");
    {
        let mut wal = Wal::open(&path).unwrap();
        wal.append(Lsn::NONE, Xid(1), RecordType::Begin, TableId(1), 0, 0, 0, [0; VALUE_SIZE], [0; VALUE_SIZE])
            .unwrap();
        wal.fsync().unwrap();
    }
    let mut wal = Wal::open(&path).unwrap();
    assert_eq!(wal.scan().unwrap().len(), 1);
}

fn table_with_leaf(dir: &std::path::Path) -> (BufferPool, TableId, PageOffset) {
    let table = TableId(1);
    let mut file = TableFile::open(dir.join("t.db")).unwrap();
    file.append_zeroed_pages(2).unwrap();
    let mut header = Page::zeroed();
    HeaderPage::init(&mut header);
    HeaderPage::set_root_offset(&mut header, PageOffset(PAGE_SIZE as u64));
    file.write_block(PageOffset(0), &header).unwrap();

    let mut leaf = Page::zeroed();
    LeafPage::init(&mut leaf, PageOffset::NONE);
    LeafPage::set_key(&mut leaf, 0, 1);
    LeafPage::set_value(&mut leaf, 0, &pack_value(b"old"));
    LeafPage::set_num_keys(&mut leaf, 1);
    file.write_block(PageOffset(PAGE_SIZE as u64), &leaf).unwrap();

    let mut pool = BufferPool::new(8);
    pool.register_table(table, file);
    (pool, table, PageOffset(PAGE_SIZE as u64))
}

#[test]
fn read_and_write_image_round_trip_through_the_pool() {
    let dir = tempdir().unwrap();
    let (mut pool, table, leaf_offset) = table_with_leaf(dir.path());
    let pnum = 1u64;
    let value_offset = LeafPage::value_offset(0) as u32;
    let length = 3u32;

    let old = read_image(&mut pool, table, pnum, value_offset, length).unwrap();
    assert_eq!(&old[..3], b"old");

    write_image(&mut pool, table, pnum, value_offset, length, &pack_value(b"new")).unwrap();
    let updated = read_image(&mut pool, table, pnum, value_offset, length).unwrap();
    assert_eq!(&updated[..3], b"new");

    let page = pool.get_page(table, leaf_offset).unwrap();
    assert_eq!(&LeafPage::value(&page, 0)[..3], b"new");
}

#[test]
fn stamp_and_read_page_lsn() {
    let dir = tempdir().unwrap();
    let (mut pool, table, _leaf_offset) = table_with_leaf(dir.path());

    assert_eq!(page_lsn(&mut pool, table, 1).unwrap(), Lsn::NONE);
    stamp_page_lsn(&mut pool, table, 1, Lsn(777)).unwrap();
    assert_eq!(page_lsn(&mut pool, table, 1).unwrap(), Lsn(777));
}
