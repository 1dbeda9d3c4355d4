//! SQLite-backed session repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use wrench_core::error::WrenchError;
use wrench_core::types::{ChatMessage, ChatSession, MessageRole, SessionStatus};

use crate::db::Database;
use crate::repository::SessionRepository;

pub struct SqliteSessionRepository {
    db: Arc<Database>,
}

impl SqliteSessionRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

fn storage_err(context: &str) -> impl FnOnce(rusqlite::Error) -> WrenchError + '_ {
    move |e| WrenchError::Storage(format!("{}: {}", context, e))
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn parse_uuid(raw: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn conversion_err(column: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        msg.into(),
    )
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<ChatSession> {
    let id: String = row.get(0)?;
    let status: String = row.get(3)?;
    Ok(ChatSession {
        id: parse_uuid(&id)?,
        external_chat_id: row.get(1)?,
        vendor: row.get(2)?,
        status: SessionStatus::parse(&status)
            .ok_or_else(|| conversion_err(3, format!("unknown session status '{}'", status)))?,
        equipment_context: row.get(4)?,
        created_at: millis_to_datetime(row.get(5)?),
        last_message_at: millis_to_datetime(row.get(6)?),
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    let id: String = row.get(0)?;
    let session_id: String = row.get(1)?;
    let seq: i64 = row.get(2)?;
    let role: String = row.get(3)?;
    let atoms: String = row.get(6)?;
    Ok(ChatMessage {
        id: parse_uuid(&id)?,
        session_id: parse_uuid(&session_id)?,
        seq: seq.max(0) as u64,
        role: MessageRole::parse(&role)
            .ok_or_else(|| conversion_err(3, format!("unknown role '{}'", role)))?,
        content: row.get(4)?,
        confidence: row.get(5)?,
        atoms_used: serde_json::from_str(&atoms).map_err(|e| conversion_err(6, e.to_string()))?,
        created_at: millis_to_datetime(row.get(7)?),
    })
}

impl SessionRepository for SqliteSessionRepository {
    fn create(&self, session: &ChatSession) -> Result<(), WrenchError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions
                    (id, external_chat_id, vendor, status, equipment_context,
                     created_at, last_message_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    session.id.to_string(),
                    session.external_chat_id,
                    session.vendor,
                    session.status.as_str(),
                    session.equipment_context,
                    session.created_at.timestamp_millis(),
                    session.last_message_at.timestamp_millis(),
                ],
            )
            .map_err(storage_err("Failed to insert session"))?;
            Ok(())
        })
    }

    fn get(&self, id: Uuid) -> Result<Option<ChatSession>, WrenchError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, external_chat_id, vendor, status, equipment_context,
                        created_at, last_message_at
                 FROM sessions WHERE id = ?1",
                params![id.to_string()],
                session_from_row,
            )
            .optional()
            .map_err(storage_err("Failed to load session"))
        })
    }

    fn append(&self, message: &ChatMessage) -> Result<bool, WrenchError> {
        let atoms = serde_json::to_string(&message.atoms_used)?;
        self.db.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(storage_err("Failed to begin transaction"))?;

            let inserted = tx
                .execute(
                    "INSERT INTO messages
                        (id, session_id, seq, role, content, confidence, atoms_used, created_at)
                     SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8
                     WHERE EXISTS (
                        SELECT 1 FROM sessions WHERE id = ?2 AND status = 'active'
                     )",
                    params![
                        message.id.to_string(),
                        message.session_id.to_string(),
                        message.seq as i64,
                        message.role.as_str(),
                        message.content,
                        message.confidence,
                        atoms,
                        message.created_at.timestamp_millis(),
                    ],
                )
                .map_err(storage_err("Failed to insert message"))?;

            if inserted == 0 {
                return Ok(false);
            }

            tx.execute(
                "UPDATE sessions SET last_message_at = ?1 WHERE id = ?2",
                params![
                    message.created_at.timestamp_millis(),
                    message.session_id.to_string()
                ],
            )
            .map_err(storage_err("Failed to update session activity"))?;

            tx.commit().map_err(storage_err("Failed to commit message"))?;
            Ok(true)
        })
    }

    fn last_seq(&self, session_id: Uuid) -> Result<u64, WrenchError> {
        self.db.with_conn(|conn| {
            let seq: i64 = conn
                .query_row(
                    "SELECT COALESCE(MAX(seq), 0) FROM messages WHERE session_id = ?1",
                    params![session_id.to_string()],
                    |row| row.get(0),
                )
                .map_err(storage_err("Failed to read last sequence"))?;
            Ok(seq.max(0) as u64)
        })
    }

    fn fetch_history(&self, session_id: Uuid, limit: usize) -> Result<Vec<ChatMessage>, WrenchError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, session_id, seq, role, content, confidence, atoms_used, created_at
                     FROM messages WHERE session_id = ?1
                     ORDER BY seq DESC LIMIT ?2",
                )
                .map_err(storage_err("Failed to prepare history query"))?;
            let rows = stmt
                .query_map(
                    params![session_id.to_string(), limit as i64],
                    message_from_row,
                )
                .map_err(storage_err("Failed to query history"))?;

            let mut messages = rows
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(storage_err("Failed to read message row"))?;
            messages.reverse();
            Ok(messages)
        })
    }

    fn update_status(&self, id: Uuid, status: SessionStatus) -> Result<bool, WrenchError> {
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE sessions SET status = ?1 WHERE id = ?2 AND status = 'active'",
                    params![status.as_str(), id.to_string()],
                )
                .map_err(storage_err("Failed to update session status"))?;
            Ok(changed > 0)
        })
    }

    fn sweep_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>, WrenchError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "UPDATE sessions SET status = 'timed_out'
                     WHERE status = 'active' AND last_message_at < ?1
                     RETURNING id",
                )
                .map_err(storage_err("Failed to prepare sweep"))?;
            let rows = stmt
                .query_map(params![cutoff.timestamp_millis()], |row| {
                    let id: String = row.get(0)?;
                    parse_uuid(&id)
                })
                .map_err(storage_err("Failed to sweep sessions"))?;
            let expired = rows
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(storage_err("Failed to read swept id"))?;
            if !expired.is_empty() {
                debug!(count = expired.len(), "Timed out idle sessions");
            }
            Ok(expired)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn repo() -> SqliteSessionRepository {
        SqliteSessionRepository::new(Arc::new(Database::in_memory().unwrap()))
    }

    // SQLite keeps millisecond precision.
    fn now_ms() -> DateTime<Utc> {
        millis_to_datetime(Utc::now().timestamp_millis())
    }

    fn session(last_message_at: DateTime<Utc>) -> ChatSession {
        ChatSession {
            id: Uuid::new_v4(),
            external_chat_id: "tg:2002".to_string(),
            vendor: "carrier".to_string(),
            status: SessionStatus::Active,
            equipment_context: Some("30RB chiller".to_string()),
            created_at: last_message_at,
            last_message_at,
        }
    }

    fn message(session_id: Uuid, seq: u64, role: MessageRole, content: &str) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4(),
            session_id,
            seq,
            role,
            content: content.to_string(),
            confidence: None,
            atoms_used: vec![],
            created_at: now_ms(),
        }
    }

    #[test]
    fn test_create_and_get_round_trip() {
        let repo = repo();
        let s = session(now_ms());
        repo.create(&s).unwrap();
        assert_eq!(repo.get(s.id).unwrap(), Some(s.clone()));
        assert!(repo.create(&s).is_err());
        assert!(repo.get(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_append_and_history_order() {
        let repo = repo();
        let s = session(now_ms() - Duration::minutes(5));
        repo.create(&s).unwrap();

        for (i, text) in ["one", "two", "three", "four"].iter().enumerate() {
            assert!(repo
                .append(&message(s.id, i as u64 + 1, MessageRole::User, text))
                .unwrap());
        }

        let mut answer = message(s.id, 5, MessageRole::Assistant, "five");
        answer.confidence = Some(0.91);
        answer.atoms_used = vec!["atom-7".to_string(), "atom-9".to_string()];
        assert!(repo.append(&answer).unwrap());

        assert_eq!(repo.last_seq(s.id).unwrap(), 5);
        let history = repo.fetch_history(s.id, 3).unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["three", "four", "five"]);
        assert_eq!(history[2], answer);

        let stored = repo.get(s.id).unwrap().unwrap();
        assert_eq!(stored.last_message_at, answer.created_at);
    }

    #[test]
    fn test_append_refused_after_close() {
        let repo = repo();
        let s = session(now_ms());
        repo.create(&s).unwrap();
        assert!(repo.update_status(s.id, SessionStatus::Closed).unwrap());
        assert!(!repo.update_status(s.id, SessionStatus::TimedOut).unwrap());

        assert!(!repo.append(&message(s.id, 1, MessageRole::User, "late")).unwrap());
        assert!(!repo
            .append(&message(Uuid::new_v4(), 1, MessageRole::User, "ghost"))
            .unwrap());
        assert_eq!(repo.last_seq(s.id).unwrap(), 0);
    }

    #[test]
    fn test_duplicate_seq_rejected() {
        let repo = repo();
        let s = session(now_ms());
        repo.create(&s).unwrap();
        repo.append(&message(s.id, 1, MessageRole::User, "a")).unwrap();
        assert!(repo.append(&message(s.id, 1, MessageRole::User, "b")).is_err());
    }

    #[test]
    fn test_sweep_expired_marks_idle_sessions() {
        let repo = repo();
        let idle = session(now_ms() - Duration::minutes(31));
        let fresh = session(now_ms());
        repo.create(&idle).unwrap();
        repo.create(&fresh).unwrap();

        let cutoff = Utc::now() - Duration::minutes(30);
        assert_eq!(repo.sweep_expired(cutoff).unwrap(), vec![idle.id]);
        assert!(repo.sweep_expired(cutoff).unwrap().is_empty());
        assert_eq!(repo.get(idle.id).unwrap().unwrap().status, SessionStatus::TimedOut);
        assert_eq!(repo.get(fresh.id).unwrap().unwrap().status, SessionStatus::Active);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        let s = session(now_ms());
        {
            let repo = SqliteSessionRepository::new(Arc::new(Database::new(&path).unwrap()));
            repo.create(&s).unwrap();
            repo.append(&message(s.id, 1, MessageRole::User, "compressor trips"))
                .unwrap();
        }
        let repo = SqliteSessionRepository::new(Arc::new(Database::new(&path).unwrap()));
        let history = repo.fetch_history(s.id, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "compressor trips");
    }
}
