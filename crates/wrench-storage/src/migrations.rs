//! Database schema migrations.

use rusqlite::Connection;
use tracing::info;

use wrench_core::error::WrenchError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), WrenchError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| WrenchError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| WrenchError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: chat_sessions");
    }

    Ok(())
}

/// Version 1: sessions and messages. Timestamps are Unix milliseconds.
fn apply_v1(conn: &Connection) -> Result<(), WrenchError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sessions (
            id                TEXT PRIMARY KEY NOT NULL,
            external_chat_id  TEXT NOT NULL,
            vendor            TEXT NOT NULL DEFAULT '',
            status            TEXT NOT NULL DEFAULT 'active'
                              CHECK (status IN ('active', 'timed_out', 'closed')),
            equipment_context TEXT,
            created_at        INTEGER NOT NULL,
            last_message_at   INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_status_activity
            ON sessions (status, last_message_at);

        CREATE INDEX IF NOT EXISTS idx_sessions_external
            ON sessions (external_chat_id, created_at DESC);

        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY NOT NULL,
            session_id  TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            seq         INTEGER NOT NULL,
            role        TEXT NOT NULL CHECK (role IN ('system', 'user', 'assistant')),
            content     TEXT NOT NULL,
            confidence  REAL,
            atoms_used  TEXT NOT NULL DEFAULT '[]',
            created_at  INTEGER NOT NULL,
            UNIQUE (session_id, seq)
        );

        INSERT INTO schema_migrations (version, name) VALUES (1, 'chat_sessions');
        ",
    )
    .map_err(|e| WrenchError::Storage(format!("Migration v1 failed: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn test_status_check_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO sessions (id, external_chat_id, status, created_at, last_message_at)
             VALUES ('s1', 'tg:1', 'paused', 0, 0)",
            [],
        );
        assert!(result.is_err());
    }
}
