use rusqlite::{Connection, OptionalExtension, Result as SqlResult, params};
use std::path::Path;

use crate::common::Session;

/// Persisted login, so a restart does not require signing in again.
pub struct SessionDatabase {
    conn: Connection,
}

impl SessionDatabase {
    /// Open (or create) the session database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> SqlResult<Self> {
        let session_db = Self {
            conn: Connection::open(path)?,
        };
        session_db.init_schema()?;
        Ok(session_db)
    }

    pub fn in_memory() -> SqlResult<Self> {
        let session_db = Self {
            conn: Connection::open_in_memory()?,
        };
        session_db.init_schema()?;
        Ok(session_db)
    }

    fn init_schema(&self) -> SqlResult<()> {
        // Single row: at most one user is logged in at a time.
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS session (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                user_id INTEGER NOT NULL,
                username TEXT NOT NULL,
                token TEXT NOT NULL,
                created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            )",
            [],
        )?;
        Ok(())
    }

    /// Save session (replace if exists)
    pub fn save_session(&self, session: &Session) -> SqlResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO session (id, user_id, username, token, created_at)
             VALUES (1, ?1, ?2, ?3, strftime('%s', 'now'))",
            params![session.user_id, session.username, session.token],
        )?;
        Ok(())
    }

    pub fn load_session(&self) -> SqlResult<Option<Session>> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id, username, token FROM session WHERE id = 1")?;

        stmt.query_row([], |row| {
            Ok(Session {
                user_id: row.get(0)?,
                username: row.get(1)?,
                token: row.get(2)?,
            })
        })
        .optional()
    }

    /// Get the unix time of the last login, if any
    pub fn logged_in_at(&self) -> SqlResult<Option<i64>> {
        self.conn
            .query_row("SELECT created_at FROM session WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()
    }

    pub fn clear_session(&self) -> SqlResult<()> {
        self.conn
            .execute("DELETE FROM session WHERE id = 1", [])?;
        Ok(())
    }
}
