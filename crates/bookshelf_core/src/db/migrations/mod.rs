//! Object-store schema steps.
//!
//! # Responsibility
//! - List the steps that build the `objects` and `relations` tables.
//! - Bring a catalog file from whatever version it has up to the latest.
//!
//! # Invariants
//! - Step versions start at 1 and increase by one.
//! - All pending steps commit together; `PRAGMA user_version` always names
//!   the last step whose tables exist.
//! - A file written by a newer binary is refused, never downgraded.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: [SchemaStep; 2] = [
    SchemaStep {
        version: 1,
        name: "objects",
        sql: include_str!("0001_objects.sql"),
    },
    SchemaStep {
        version: 2,
        name: "relations",
        sql: include_str!("0002_relations.sql"),
    },
];

/// Schema version this binary writes.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |step| step.version)
}

/// Version recorded in the catalog file (`0` for a fresh file).
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

/// Runs every step newer than the file's version and returns the version
/// reached.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<u32> {
    let from = schema_version(conn)?;
    let latest = latest_version();
    if from > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: latest,
        });
    }

    let pending = STEPS
        .iter()
        .filter(|step| step.version > from)
        .collect::<Vec<_>>();
    if pending.is_empty() {
        return Ok(from);
    }

    let tx = conn.transaction()?;
    for step in &pending {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
    }
    tx.commit()?;

    let names = pending.iter().map(|step| step.name).collect::<Vec<_>>();
    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={} steps={}",
        from,
        latest,
        names.join(",")
    );
    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, latest_version, schema_version, STEPS};
    use rusqlite::Connection;

    #[test]
    fn step_versions_are_contiguous_from_one() {
        for (index, step) in STEPS.iter().enumerate() {
            assert_eq!(step.version as usize, index + 1, "step {}", step.name);
        }
        assert_eq!(latest_version(), STEPS.len() as u32);
    }

    #[test]
    fn second_run_is_a_no_op() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(apply_migrations(&mut conn).unwrap(), latest_version());
        assert_eq!(apply_migrations(&mut conn).unwrap(), latest_version());
        assert_eq!(schema_version(&conn).unwrap(), latest_version());
    }
}
