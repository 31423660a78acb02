use bookshelf_core::db::migrations::{latest_version, schema_version};
use bookshelf_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    assert_table_exists(&conn, "objects");
    assert_table_exists(&conn, "relations");
}

#[test]
fn reopening_a_catalog_file_keeps_schema_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");

    let first = open_db(&path).unwrap();
    assert_eq!(schema_version(&first).unwrap(), latest_version());
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(schema_version(&second).unwrap(), latest_version());
    assert_table_exists(&second, "relations");
}

#[test]
fn newer_schema_version_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 42;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 42);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn relation_rows_are_unique_per_owner_key_and_target() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO objects (object_id, class_name, fields_json) VALUES ('b1', 'Book', '{}');",
        [],
    )
    .unwrap();

    let insert = "INSERT OR IGNORE INTO relations (owner_id, relation_key, target_class, target_id)
                  VALUES ('b1', 'authors', 'Author', 'a1');";
    conn.execute(insert, []).unwrap();
    conn.execute(insert, []).unwrap();

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM relations;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn version_one_catalog_gains_the_relations_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("v1.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(include_str!("../src/db/migrations/0001_objects.sql"))
        .unwrap();
    conn.execute_batch("PRAGMA user_version = 1;").unwrap();
    conn.execute(
        "INSERT INTO objects (object_id, class_name, fields_json) VALUES ('p1', 'Publisher', '{}');",
        [],
    )
    .unwrap();
    drop(conn);

    let upgraded = open_db(&path).unwrap();
    assert_eq!(schema_version(&upgraded).unwrap(), latest_version());
    assert_table_exists(&upgraded, "relations");
    let kept: i64 = upgraded
        .query_row("SELECT COUNT(*) FROM objects;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(kept, 1);
}

#[test]
fn relation_rows_follow_their_owner_on_delete() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO objects (object_id, class_name, fields_json) VALUES ('b1', 'Book', '{}');
         INSERT INTO relations (owner_id, relation_key, target_class, target_id)
         VALUES ('b1', 'authors', 'Author', 'a1');
         DELETE FROM objects WHERE object_id = 'b1';",
    )
    .unwrap();

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM relations;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
