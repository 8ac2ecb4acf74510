use rusqlite::{OptionalExtension, Result as SqlResult, params};
use std::path::Path;

use super::database::Database;
use crate::auth::{Credentials, Scope};

/// Locally persisted session data (auth tokens, last known chat id)
pub struct SessionStore {
    db: Database,
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS credentials (
        scope TEXT PRIMARY KEY,
        token TEXT NOT NULL,
        user_id TEXT,
        updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
    );
    -- single row
    CREATE TABLE IF NOT EXISTS chat_session (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        chat_id TEXT NOT NULL,
        updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
    );
";

impl SessionStore {
    pub fn open<P: AsRef<Path>>(path: P) -> SqlResult<Self> {
        Ok(Self {
            db: Database::open(path, SCHEMA)?,
        })
    }

    pub fn in_memory() -> SqlResult<Self> {
        Ok(Self {
            db: Database::in_memory(SCHEMA)?,
        })
    }

    // ========== Credentials ==========

    pub fn save_credentials(&self, credentials: &Credentials) -> SqlResult<()> {
        self.db.connection().execute(
            "INSERT OR REPLACE INTO credentials (scope, token, user_id, updated_at)
             VALUES (?1, ?2, ?3, strftime('%s', 'now'))",
            params![
                credentials.scope.as_str(),
                credentials.token,
                credentials.user_id
            ],
        )?;
        Ok(())
    }

    pub fn credentials(&self, scope: Scope) -> SqlResult<Option<Credentials>> {
        self.db
            .connection()
            .query_row(
                "SELECT token, user_id FROM credentials WHERE scope = ?1",
                params![scope.as_str()],
                |row| {
                    Ok(Credentials {
                        scope,
                        token: row.get(0)?,
                        user_id: row.get(1)?,
                    })
                },
            )
            .optional()
    }

    pub fn clear_credentials(&self, scope: Scope) -> SqlResult<()> {
        self.db.connection().execute(
            "DELETE FROM credentials WHERE scope = ?1",
            params![scope.as_str()],
        )?;
        Ok(())
    }

    // ========== Chat session ==========

    pub fn save_chat_id(&self, chat_id: &str) -> SqlResult<()> {
        self.db.connection().execute(
            "INSERT OR REPLACE INTO chat_session (id, chat_id, updated_at)
             VALUES (1, ?1, strftime('%s', 'now'))",
            params![chat_id],
        )?;
        Ok(())
    }

    pub fn chat_id(&self) -> SqlResult<Option<String>> {
        self.db
            .connection()
            .query_row("SELECT chat_id FROM chat_session WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()
    }

    /// Forgets everything tied to the signed-in user.
    pub fn clear_user_session(&self) -> SqlResult<()> {
        self.clear_credentials(Scope::User)?;
        self.db
            .connection()
            .execute("DELETE FROM chat_session", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(token: &str) -> Credentials {
        Credentials {
            scope: Scope::User,
            token: token.to_string(),
            user_id: Some("u1".to_string()),
        }
    }

    #[test]
    fn credentials_round_trip_per_scope() {
        let store = SessionStore::in_memory().unwrap();
        assert_eq!(store.credentials(Scope::User).unwrap(), None);

        store.save_credentials(&user("first")).unwrap();
        store.save_credentials(&user("second")).unwrap();
        store
            .save_credentials(&Credentials {
                scope: Scope::Admin,
                token: "admin".into(),
                user_id: None,
            })
            .unwrap();

        assert_eq!(store.credentials(Scope::User).unwrap(), Some(user("second")));
        assert_eq!(
            store.credentials(Scope::Admin).unwrap().map(|c| c.token),
            Some("admin".to_string())
        );
    }

    #[test]
    fn clearing_user_session_keeps_admin() {
        let store = SessionStore::in_memory().unwrap();
        store.save_credentials(&user("t")).unwrap();
        store
            .save_credentials(&Credentials {
                scope: Scope::Admin,
                token: "admin".into(),
                user_id: None,
            })
            .unwrap();
        store.save_chat_id("chat-1").unwrap();
        assert_eq!(store.chat_id().unwrap().as_deref(), Some("chat-1"));

        store.clear_user_session().unwrap();
        assert_eq!(store.credentials(Scope::User).unwrap(), None);
        assert_eq!(store.chat_id().unwrap(), None);
        assert!(store.credentials(Scope::Admin).unwrap().is_some());
    }

    #[test]
    fn opens_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.db");
        crate::storage::ensure_parent_dir(&path).unwrap();

        {
            let store = SessionStore::open(&path).unwrap();
            store.save_chat_id("persisted").unwrap();
        }
        let reopened = SessionStore::open(&path).unwrap();
        assert_eq!(reopened.chat_id().unwrap().as_deref(), Some("persisted"));
    }
}
