use super::*;
use storage::{pack_value, HeaderPage, TableFile};
use tempfile::tempdir;

fn open_table(dir: &std::path::Path, name: &str, id: u8) -> (TableId, TableFile) {
    let mut file = TableFile::open(dir.join(name)).unwrap();
    file.append_zeroed_pages(1).unwrap();
    let mut header = Page::zeroed();
    HeaderPage::init(&mut header);
    file.write_block(PageOffset(0), &header).unwrap();
    (TableId(id), file)
}

#[test]
fn joins_only_matching_keys_and_writes_csv() {
    let dir = tempdir().unwrap();
    let (t1, f1) = open_table(dir.path(), "a.db", 1);
    let (t2, f2) = open_table(dir.path(), "b.db", 2);

    let mut pool = BufferPool::new(64);
    pool.register_table(t1, f1);
    pool.register_table(t2, f2);

    {
        let mut tree = BTree::new(&mut pool, t1);
        for k in [1u64, 2, 3, 5] {
            tree.insert(k, pack_value(format!("l{k}").as_bytes())).unwrap();
        }
    }
    {
        let mut tree = BTree::new(&mut pool, t2);
        for k in [2u64, 3, 4] {
            tree.insert(k, pack_value(format!("r{k}").as_bytes())).unwrap();
        }
    }

    let out_path = dir.path().join("result.csv");
    let rows = join_tables(&mut pool, t1, t2, &out_path).unwrap();
    assert_eq!(rows, 2);

    let content = std::fs::read_to_string(&out_path).unwrap();
    let mut lines: Vec<&str> = content.lines().collect();
    lines.sort();
    assert_eq!(lines, vec!["2,l2,2,r2", "3,l3,3,r3"]);
}

#[test]
fn empty_table_produces_no_rows() {
    let dir = tempdir().unwrap();
    let (t1, f1) = open_table(dir.path(), "a.db", 1);
    let (t2, f2) = open_table(dir.path(), "b.db", 2);

    let mut pool = BufferPool::new(32);
    pool.register_table(t1, f1);
    pool.register_table(t2, f2);
    BTree::new(&mut pool, t1).insert(1, pack_value(b"x")).unwrap();

    let out_path = dir.path().join("result.csv");
    let rows = join_tables(&mut pool, t1, t2, &out_path).unwrap();
    assert_eq!(rows, 0);
    assert_eq!(std::fs::read_to_string(&out_path).unwrap(), "");
}

#[test]
fn join_output_spans_more_than_one_output_page() {
    let dir = tempdir().unwrap();
    let (t1, f1) = open_table(dir.path(), "a.db", 1);
    let (t2, f2) = open_table(dir.path(), "b.db", 2);

    let mut pool = BufferPool::new(256);
    pool.register_table(t1, f1);
    pool.register_table(t2, f2);

    // More than OUTPUT_SLOTS matches, to exercise the mid-join flush.
    let matches = OUTPUT_SLOTS * 2 + 3;
    {
        let mut tree = BTree::new(&mut pool, t1);
        for k in 0..matches as u64 {
            tree.insert(k, pack_value(b"l")).unwrap();
        }
    }
    {
        let mut tree = BTree::new(&mut pool, t2);
        for k in 0..matches as u64 {
            tree.insert(k, pack_value(b"r")).unwrap();
        }
    }

    let out_path = dir.path().join("result.csv");
    let rows = join_tables(&mut pool, t1, t2, &out_path).unwrap();
    assert_eq!(rows, matches);
    assert_eq!(std::fs::read_to_string(&out_path).unwrap().lines().count(), matches);
}
