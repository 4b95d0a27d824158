//! Concrete end-to-end scenarios and quantified invariants for `Engine`,
//! run against on-disk tables through the public facade only.

use buffer::BufferPool;
use btree::BTree;
use common::{Config, DbError, TableId};
use engine::Engine;
use proptest::prelude::*;
use storage::{unpack_value, LeafPage};
use tempfile::tempdir;

fn config(dir: &std::path::Path) -> Config {
    Config::builder().data_dir(dir.to_path_buf()).buffer_pool_frames(16).build()
}

fn value(s: &str) -> Vec<u8> {
    s.as_bytes().to_vec()
}

/// Walk a table's leaf sibling chain start to finish and collect every
/// `(key, text value)` pair in order, without going through the B+tree's
/// own `find` path.
fn leaf_chain(pool: &mut BufferPool, table: TableId) -> Vec<(u64, String)> {
    let mut out = Vec::new();
    let mut leaf = BTree::new(pool, table).leftmost_leaf().unwrap();
    while !leaf.is_none() {
        let page = pool.get_page(table, leaf).unwrap();
        for slot in 0..LeafPage::num_keys(&page) {
            out.push((LeafPage::key(&page, slot), unpack_value(&LeafPage::value(&page, slot))));
        }
        leaf = LeafPage::sibling(&page);
    }
    out
}

#[test]
fn scenario_1_insert_find_delete_leaf_chain() {
    let dir = tempdir().unwrap();
    let mut engine = Engine::init_db(config(dir.path())).unwrap();
    let t = engine.open_table(dir.path().join("t.db")).unwrap();

    for (k, v) in [(1, "A"), (2, "B"), (3, "C"), (4, "D")] {
        engine.insert(t, k, &value(v)).unwrap();
    }
    assert_eq!(unpack_value(&engine.find(t, 3).unwrap()), "C");

    engine.delete(t, 2).unwrap();
    assert!(matches!(engine.find(t, 2), Err(DbError::NotFound)));
}

#[test]
fn scenario_2_sequential_fill_splits_into_two_leaves_at_seventeen() {
    let dir = tempdir().unwrap();
    let mut engine = Engine::init_db(config(dir.path())).unwrap();
    let t = engine.open_table(dir.path().join("t.db")).unwrap();

    for k in 1u64..=31 {
        engine.insert(t, k, &value(&format!("v{k}"))).unwrap();
    }

    for k in 1u64..=31 {
        assert_eq!(unpack_value(&engine.find(t, k).unwrap()), format!("v{k}"));
    }
}

#[test]
fn scenario_3_reverse_insertion_order_same_leaf_chain() {
    let dir = tempdir().unwrap();
    let mut engine = Engine::init_db(config(dir.path())).unwrap();
    let t = engine.open_table(dir.path().join("t.db")).unwrap();

    for k in (1u64..=32).rev() {
        engine.insert(t, k, &value(&format!("v{k}"))).unwrap();
    }
    for k in 1u64..=32 {
        assert_eq!(unpack_value(&engine.find(t, k).unwrap()), format!("v{k}"));
    }
}

#[test]
fn scenario_4_duplicate_insert_is_rejected_original_survives() {
    let dir = tempdir().unwrap();
    let mut engine = Engine::init_db(config(dir.path())).unwrap();
    let t = engine.open_table(dir.path().join("t.db")).unwrap();

    engine.insert(t, 1, &value("A")).unwrap();
    let err = engine.insert(t, 1, &value("B")).unwrap_err();
    assert!(matches!(err, DbError::Duplicate));
    assert_eq!(unpack_value(&engine.find(t, 1).unwrap()), "A");
}

#[test]
fn scenario_5_abort_reverts_a_pending_update() {
    let dir = tempdir().unwrap();
    let mut engine = Engine::init_db(config(dir.path())).unwrap();
    let t = engine.open_table(dir.path().join("t.db")).unwrap();

    engine.insert(t, 1, &value("A")).unwrap();
    engine.begin_transaction().unwrap();
    engine.update(t, 1, &value("B")).unwrap();
    engine.abort_transaction().unwrap();

    assert_eq!(unpack_value(&engine.find(t, 1).unwrap()), "A");
}

#[test]
fn scenario_6_commit_then_crash_then_recover() {
    let dir = tempdir().unwrap();
    let table_path = dir.path().join("t.db");

    {
        let mut engine = Engine::init_db(config(dir.path())).unwrap();
        let t = engine.open_table(&table_path).unwrap();
        engine.insert(t, 1, &value("A")).unwrap();
        engine.insert(t, 2, &value("C")).unwrap();

        engine.begin_transaction().unwrap();
        engine.update(t, 1, &value("B")).unwrap();
        engine.update(t, 2, &value("D")).unwrap();
        engine.commit_transaction().unwrap();
        // No shutdown_db: the engine (and its buffer pool) is simply dropped
        // here, standing in for a process kill right after the commit.
    }

    let mut engine = Engine::init_db(config(dir.path())).unwrap();
    let t = engine.open_table(&table_path).unwrap();
    assert_eq!(unpack_value(&engine.find(t, 1).unwrap()), "B");
    assert_eq!(unpack_value(&engine.find(t, 2).unwrap()), "D");
}

#[test]
fn scenario_7_join_emits_only_matching_keys_in_order() {
    let dir = tempdir().unwrap();
    let mut engine = Engine::init_db(config(dir.path())).unwrap();
    let t1 = engine.open_table(dir.path().join("t1.db")).unwrap();
    let t2 = engine.open_table(dir.path().join("t2.db")).unwrap();

    for (k, v) in [(1, "a"), (2, "b"), (4, "d")] {
        engine.insert(t1, k, &value(v)).unwrap();
    }
    for (k, v) in [(2, "x"), (3, "y"), (4, "z")] {
        engine.insert(t2, k, &value(v)).unwrap();
    }

    let out_path = dir.path().join("out.csv");
    let rows = engine.join_table(t1, t2, &out_path).unwrap();
    assert_eq!(rows, 2);

    let contents = std::fs::read_to_string(&out_path).unwrap();
    assert_eq!(contents, "2,b,2,x\n4,d,4,z\n");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    /// P3 — round trip: every distinct key inserted is found with its
    /// value afterward, regardless of insertion order.
    #[test]
    fn round_trip_find_matches_last_insert(mut keys in prop::collection::hash_set(1u64..500, 1..60)) {
        let dir = tempdir().unwrap();
        let mut engine = Engine::init_db(config(dir.path())).unwrap();
        let t = engine.open_table(dir.path().join("t.db")).unwrap();

        let mut ordered: Vec<u64> = keys.drain().collect();
        ordered.sort_unstable();
        for &k in &ordered {
            engine.insert(t, k, &value(&format!("v{k}"))).unwrap();
        }
        for &k in &ordered {
            prop_assert_eq!(unpack_value(&engine.find(t, k).unwrap()), format!("v{k}"));
        }
    }

    /// P2 — leaf chain: the sibling chain enumerates every present key
    /// exactly once, in ascending order.
    #[test]
    fn leaf_chain_is_sorted_and_complete(mut keys in prop::collection::hash_set(1u64..500, 1..60)) {
        let dir = tempdir().unwrap();
        let mut engine = Engine::init_db(config(dir.path())).unwrap();
        let t = engine.open_table(dir.path().join("t.db")).unwrap();

        let mut ordered: Vec<u64> = keys.drain().collect();
        ordered.sort_unstable();
        for &k in &ordered {
            engine.insert(t, k, &value(&format!("v{k}"))).unwrap();
        }
        let table_path = dir.path().join("t.db");
        engine.shutdown_db().unwrap();

        let mut pool = BufferPool::new(16);
        pool.register_table(t, storage::TableFile::open(&table_path).unwrap());
        let chain: Vec<u64> = leaf_chain(&mut pool, t).into_iter().map(|(k, _)| k).collect();
        prop_assert_eq!(chain, ordered);
    }
}
