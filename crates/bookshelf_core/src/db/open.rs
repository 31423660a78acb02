//! Opening the catalog's SQLite connection.
//!
//! # Invariants
//! - Returned connections enforce foreign keys, so relation rows go away
//!   with their owning object.
//! - Returned connections carry the latest object-store schema.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Wait applied when another connection holds the catalog file's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

enum Target<'a> {
    File(&'a Path),
    Memory,
}

impl Target<'_> {
    fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory => "memory",
        }
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        match self {
            Self::File(path) => Connection::open(path),
            Self::Memory => Connection::open_in_memory(),
        }
    }
}

/// Opens (creating when missing) the catalog file at `path`.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_target(&Target::File(path.as_ref()))
}

/// Opens a throwaway catalog that lives as long as the connection.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_target(&Target::Memory)
}

fn open_target(target: &Target<'_>) -> DbResult<Connection> {
    let started_at = Instant::now();
    let opened = target
        .connect()
        .map_err(DbError::from)
        .and_then(|mut conn| {
            let version = prepare(&mut conn)?;
            Ok((conn, version))
        });

    match opened {
        Ok((conn, version)) => {
            info!(
                "event=db_open module=db status=ok mode={} schema_version={} duration_ms={}",
                target.mode(),
                version,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error={}",
                target.mode(),
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn prepare(conn: &mut Connection) -> DbResult<u32> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn)
}
