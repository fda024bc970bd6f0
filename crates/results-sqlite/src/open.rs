use crate::schema::MIG_0001_INIT;
use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::debug;

pub struct Db {
    pub conn: Connection,
}

impl Db {
    pub fn open_or_create(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).with_context(|| format!("opening {}", path.display()))?;
        apply_pragmas(&conn, true)?;
        migrate(&conn)?;
        debug!(path = %path.display(), "opened results database");
        Ok(Db { conn })
    }

    /// Private database that disappears with the handle.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_pragmas(&conn, false)?;
        migrate(&conn)?;
        Ok(Db { conn })
    }
}

fn apply_pragmas(conn: &Connection, on_disk: bool) -> Result<()> {
    if on_disk {
        let _mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |r| r.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "mmap_size", 268435456i64)?; // 256 MiB
    }
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "cache_size", -65536i64)?; // 64 MiB
    Ok(())
}

fn migrate(conn: &Connection) -> Result<()> {
    // naive: if the result table doesn't exist, apply 0001
    let exists: i64 = conn.query_row(
        "SELECT COUNT(1) FROM sqlite_master WHERE type='table' AND name='result'",
        [],
        |r| r.get(0),
    )?;
    if exists == 0 {
        conn.execute_batch(MIG_0001_INIT).context("applying migration 0001")?;
    }
    Ok(())
}
