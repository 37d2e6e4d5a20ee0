use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use slotwise_core::domain::meeting::MeetingRequest;
use slotwise_core::domain::session::ConversationTurn;
use slotwise_core::{ConversationSession, ConversationState, SessionStore, SessionStoreError};

use crate::DbPool;

/// SQLite-backed [`SessionStore`]. The meeting request and turn history are
/// stored as JSON columns on the session row; turns are additionally
/// mirrored into `conversation_turns` for per-turn inspection.
pub struct SqlSessionRepository {
    pool: DbPool,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Session ids touched since `since`, excluding completed conversations.
    pub async fn active_session_ids(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>, SessionStoreError> {
        let rows = sqlx::query(
            "SELECT session_id FROM sessions WHERE updated_at > ? AND state != ? \
             ORDER BY updated_at DESC",
        )
        .bind(since.to_rfc3339())
        .bind(ConversationState::Completed.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(rows.iter().map(|row| row.get::<String, _>("session_id")).collect())
    }

    /// Remove sessions not touched since `cutoff`. Returns how many were
    /// deleted; their turns go with them via the cascade.
    pub async fn delete_stale_sessions(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, SessionStoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE updated_at < ?")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SessionStore for SqlSessionRepository {
    async fn load(
        &self,
        session_id: &str,
    ) -> Result<Option<ConversationSession>, SessionStoreError> {
        let row = sqlx::query(
            "SELECT session_id, user_id, state, meeting_request, history, created_at, updated_at \
             FROM sessions WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let meeting_request: MeetingRequest =
            serde_json::from_str(&row.get::<String, _>("meeting_request"))
                .map_err(decode_error)?;
        let history: Vec<ConversationTurn> =
            serde_json::from_str(&row.get::<String, _>("history")).map_err(decode_error)?;
        let created_at = parse_timestamp(&row.get::<String, _>("created_at"))?;
        let updated_at = parse_timestamp(&row.get::<String, _>("updated_at"))?;

        Ok(Some(ConversationSession::from_parts(
            row.get("session_id"),
            row.get("user_id"),
            ConversationState::parse(&row.get::<String, _>("state")),
            meeting_request,
            history,
            created_at,
            updated_at,
        )))
    }

    async fn save(&self, session: &ConversationSession) -> Result<(), SessionStoreError> {
        let meeting_request =
            serde_json::to_string(session.meeting_request()).map_err(decode_error)?;
        let history = serde_json::to_string(session.history()).map_err(decode_error)?;

        let mut tx = self.pool.begin().await.map_err(backend_error)?;

        sqlx::query(
            "INSERT INTO sessions \
             (session_id, user_id, state, meeting_request, history, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (session_id) DO UPDATE SET \
             user_id = excluded.user_id, state = excluded.state, \
             meeting_request = excluded.meeting_request, history = excluded.history, \
             updated_at = excluded.updated_at",
        )
        .bind(session.session_id())
        .bind(session.user_id())
        .bind(session.state().as_str())
        .bind(&meeting_request)
        .bind(&history)
        .bind(session.created_at().to_rfc3339())
        .bind(session.updated_at().to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(backend_error)?;

        // Histories are short; rewriting the mirror wholesale keeps it in
        // lockstep with the JSON column.
        sqlx::query("DELETE FROM conversation_turns WHERE session_id = ?")
            .bind(session.session_id())
            .execute(&mut *tx)
            .await
            .map_err(backend_error)?;

        for (turn_number, turn) in session.history().iter().enumerate() {
            sqlx::query(
                "INSERT INTO conversation_turns \
                 (session_id, turn_number, user_text, agent_text, created_at) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(session.session_id())
            .bind(turn_number as i64 + 1)
            .bind(&turn.user_text)
            .bind(&turn.agent_text)
            .bind(turn.timestamp.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(backend_error)?;
        }

        tx.commit().await.map_err(backend_error)
    }

    async fn delete(&self, session_id: &str) -> Result<(), SessionStoreError> {
        sqlx::query("DELETE FROM sessions WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(backend_error)?;
        Ok(())
    }
}

fn backend_error(error: sqlx::Error) -> SessionStoreError {
    SessionStoreError::Backend(error.to_string())
}

fn decode_error(error: impl std::fmt::Display) -> SessionStoreError {
    SessionStoreError::Decode(error.to_string())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, SessionStoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(decode_error)
}
