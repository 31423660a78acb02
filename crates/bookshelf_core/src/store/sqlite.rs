//! SQLite-backed object store.
//!
//! # Responsibility
//! - Persist generic records as JSON documents in `objects`.
//! - Persist many-to-many membership in `relations`.
//!
//! # Invariants
//! - One save is one SQLite transaction (record + relation additions).
//! - `relations` has a uniqueness key, so re-adding a target is a no-op.
//! - Read paths reject undecodable documents instead of masking them.

use crate::store::object::{FieldValue, ObjectId, Pointer, StoreObject};
use crate::store::query::{Query, RelationIndex};
use crate::store::{ObjectStore, StoreError, StoreResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use uuid::Uuid;

/// SQLite implementation of `ObjectStore` over a migrated connection.
pub struct SqliteObjectStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteObjectStore<'conn> {
    /// Wraps a connection returned by `db::open_db*`.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        for table in ["objects", "relations"] {
            if !table_exists(conn, table)? {
                return Err(StoreError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn })
    }

    fn load(&self, pointer: &Pointer) -> StoreResult<Option<StoreObject>> {
        let row = self
            .conn
            .query_row(
                "SELECT object_id, class_name, fields_json
                 FROM objects
                 WHERE object_id = ?1 AND class_name = ?2;",
                params![pointer.object_id.to_string(), pointer.class_name.as_str()],
                read_raw_row,
            )
            .optional()?;
        row.map(decode_object).transpose()
    }
}

impl RelationIndex for SqliteObjectStore<'_> {
    fn members(&self, owner_id: ObjectId, key: &str) -> StoreResult<Vec<Pointer>> {
        let mut stmt = self.conn.prepare(
            "SELECT target_class, target_id
             FROM relations
             WHERE owner_id = ?1 AND relation_key = ?2
             ORDER BY seq ASC;",
        )?;
        let mut rows = stmt.query(params![owner_id.to_string(), key])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            let class_name: String = row.get(0)?;
            let target_text: String = row.get(1)?;
            members.push(Pointer::new(
                class_name,
                parse_object_id(&target_text, "relations.target_id")?,
            ));
        }
        Ok(members)
    }
}

impl ObjectStore for SqliteObjectStore<'_> {
    fn find(&self, query: &Query) -> StoreResult<Vec<StoreObject>> {
        let mut stmt = self.conn.prepare(
            "SELECT object_id, class_name, fields_json
             FROM objects
             WHERE class_name = ?1
             ORDER BY seq ASC;",
        )?;
        let mut rows = stmt.query([query.class_name()])?;
        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            let object = decode_object(read_raw_row(row)?)?;
            if query.matches(&object, self)? {
                results.push(object);
            }
        }

        query.order_and_limit(&mut results);
        query.expand_includes(&mut results, |pointer| self.load(pointer))?;
        Ok(results)
    }

    fn save(&self, object: &StoreObject) -> StoreResult<StoreObject> {
        let fields_json = serde_json::to_string(&object.fields_for_write())
            .map_err(|err| StoreError::InvalidData(format!("cannot encode fields: {err}")))?;

        let tx = self.conn.unchecked_transaction()?;
        let owner_id = match object.id {
            None => {
                let id = Uuid::new_v4();
                tx.execute(
                    "INSERT INTO objects (object_id, class_name, fields_json)
                     VALUES (?1, ?2, ?3);",
                    params![id.to_string(), object.class_name.as_str(), fields_json],
                )?;
                id
            }
            Some(id) => {
                let changed = tx.execute(
                    "UPDATE objects
                     SET
                        fields_json = ?2,
                        updated_at = (strftime('%s', 'now') * 1000)
                     WHERE object_id = ?1 AND class_name = ?3;",
                    params![id.to_string(), fields_json, object.class_name.as_str()],
                )?;
                if changed == 0 {
                    return Err(StoreError::NotFound(id));
                }
                id
            }
        };

        for (key, targets) in object.pending_relations() {
            for target in targets {
                tx.execute(
                    "INSERT OR IGNORE INTO relations (owner_id, relation_key, target_class, target_id)
                     VALUES (?1, ?2, ?3, ?4);",
                    params![
                        owner_id.to_string(),
                        key.as_str(),
                        target.class_name.as_str(),
                        target.object_id.to_string(),
                    ],
                )?;
            }
        }

        tx.commit()?;
        Ok(object.saved_as(owner_id))
    }
}

struct RawRow {
    object_id: String,
    class_name: String,
    fields_json: String,
}

fn read_raw_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        object_id: row.get("object_id")?,
        class_name: row.get("class_name")?,
        fields_json: row.get("fields_json")?,
    })
}

fn decode_object(raw: RawRow) -> StoreResult<StoreObject> {
    let id = parse_object_id(&raw.object_id, "objects.object_id")?;
    let fields: BTreeMap<String, FieldValue> = serde_json::from_str(&raw.fields_json)
        .map_err(|err| {
            StoreError::InvalidData(format!(
                "invalid fields_json for object `{}`: {err}",
                raw.object_id
            ))
        })?;

    let mut object = StoreObject::with_id(raw.class_name, id);
    object.fields = fields;
    Ok(object)
}

fn parse_object_id(value: &str, column: &str) -> StoreResult<ObjectId> {
    Uuid::parse_str(value)
        .map_err(|_| StoreError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
