use super::*;
use std::io;

#[test]
fn config_defaults_are_sane() {
    let cfg = Config::default();
    assert_eq!(cfg.buffer_pool_frames, 64);
    assert_eq!(cfg.max_open_tables, 10);
    assert_eq!(cfg.wal_path(), PathBuf::from("./db_data/db.wal"));
}

#[test]
fn config_builder_overrides_defaults() {
    let cfg = Config::builder()
        .data_dir(PathBuf::from("/tmp/mydb"))
        .buffer_pool_frames(8)
        .build();
    assert_eq!(cfg.buffer_pool_frames, 8);
    assert_eq!(cfg.wal_path(), PathBuf::from("/tmp/mydb/db.wal"));
}

#[test]
fn db_error_formats_cleanly() {
    let err = DbError::Storage("corruption".into());
    assert!(format!("{err}").contains("storage"));
    assert!(format!("{}", DbError::Duplicate).contains("duplicate"));
}

#[test]
fn io_error_converts() {
    let e = io::Error::other("oops");
    let db_err: DbError = e.into();
    assert!(matches!(db_err, DbError::Io(_)));
}

#[test]
fn page_offset_none_sentinel() {
    assert!(PageOffset::NONE.is_none());
    assert!(!PageOffset(4096).is_none());
}
