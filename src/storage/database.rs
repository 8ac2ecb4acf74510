use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, Result as SqlResult};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite connection with its schema applied on open.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (or creates) the file at `path` and runs `schema`, which must be idempotent.
    pub fn open<P: AsRef<Path>>(path: P, schema: &str) -> SqlResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::prepare(conn, schema)
    }

    pub fn in_memory(schema: &str) -> SqlResult<Self> {
        Self::prepare(Connection::open_in_memory()?, schema)
    }

    fn prepare(conn: Connection, schema: &str) -> SqlResult<Self> {
        conn.execute_batch(schema)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
