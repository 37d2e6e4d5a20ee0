use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::meeting::{MeetingRequest, MeetingRequestPatch};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Idle,
    WaitingForDuration,
    WaitingForTime,
    PresentingOptions,
    WaitingForSelection,
    ConfirmingDetails,
    CreatingEvent,
    Completed,
    Error,
}

impl ConversationState {
    pub const ALL: [ConversationState; 9] = [
        Self::Idle,
        Self::WaitingForDuration,
        Self::WaitingForTime,
        Self::PresentingOptions,
        Self::WaitingForSelection,
        Self::ConfirmingDetails,
        Self::CreatingEvent,
        Self::Completed,
        Self::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::WaitingForDuration => "waiting_for_duration",
            Self::WaitingForTime => "waiting_for_time",
            Self::PresentingOptions => "presenting_options",
            Self::WaitingForSelection => "waiting_for_selection",
            Self::ConfirmingDetails => "confirming_details",
            Self::CreatingEvent => "creating_event",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "waiting_for_duration" => Self::WaitingForDuration,
            "waiting_for_time" => Self::WaitingForTime,
            "presenting_options" => Self::PresentingOptions,
            "waiting_for_selection" => Self::WaitingForSelection,
            "confirming_details" => Self::ConfirmingDetails,
            "creating_event" => Self::CreatingEvent,
            "completed" => Self::Completed,
            "error" => Self::Error,
            _ => Self::Idle,
        }
    }
}

/// One user-input/agent-response exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub user_text: String,
    pub agent_text: String,
    pub timestamp: DateTime<Utc>,
}

/// A single negotiation, owned exclusively by the conversation runtime.
/// History is append-only and `updated_at` moves on every mutation; external
/// code reads through accessors and the [`SessionStore`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    session_id: String,
    user_id: String,
    state: ConversationState,
    meeting_request: MeetingRequest,
    history: Vec<ConversationTurn>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ConversationSession {
    pub fn new(session_id: impl Into<String>, user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            state: ConversationState::Idle,
            meeting_request: MeetingRequest::default(),
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Rehydrate a session from stored parts. Only repositories should need
    /// this; live mutations go through the methods below.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        session_id: String,
        user_id: String,
        state: ConversationState,
        meeting_request: MeetingRequest,
        history: Vec<ConversationTurn>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self { session_id, user_id, state, meeting_request, history, created_at, updated_at }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn meeting_request(&self) -> &MeetingRequest {
        &self.meeting_request
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn set_state(&mut self, state: ConversationState, now: DateTime<Utc>) {
        self.state = state;
        self.updated_at = now;
    }

    pub fn update_request(&mut self, patch: MeetingRequestPatch, now: DateTime<Utc>) {
        self.meeting_request.apply(patch);
        self.updated_at = now;
    }

    pub fn reset_request(&mut self, now: DateTime<Utc>) {
        self.meeting_request = MeetingRequest::default();
        self.updated_at = now;
    }

    pub fn record_turn(
        &mut self,
        user_text: impl Into<String>,
        agent_text: impl Into<String>,
        now: DateTime<Utc>,
    ) {
        self.history.push(ConversationTurn {
            user_text: user_text.into(),
            agent_text: agent_text.into(),
            timestamp: now,
        });
        self.updated_at = now;
    }

    pub fn recent_history(&self, last_n: usize) -> &[ConversationTurn] {
        let skip = self.history.len().saturating_sub(last_n);
        &self.history[skip..]
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            state: self.state,
            turns: self.history.len(),
            request_complete: self.meeting_request.is_complete(),
            duration_minutes: self.meeting_request.duration_minutes,
            has_available_slots: !self.meeting_request.available_slots.is_empty(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Read model summarizing a session for operators and the HTTP boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,
    pub user_id: String,
    pub state: ConversationState,
    pub turns: usize,
    pub request_complete: bool,
    pub duration_minutes: Option<i64>,
    pub has_available_slots: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionStoreError {
    #[error("session store backend failure: {0}")]
    Backend(String),
    #[error("stored session could not be decoded: {0}")]
    Decode(String),
}

/// Typed repository contract for session persistence. The runtime requires
/// read-your-own-write consistency within one session's turn sequence;
/// implementations decide durability.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str)
        -> Result<Option<ConversationSession>, SessionStoreError>;
    async fn save(&self, session: &ConversationSession) -> Result<(), SessionStoreError>;
    async fn delete(&self, session_id: &str) -> Result<(), SessionStoreError>;
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use crate::domain::meeting::MeetingRequestPatch;

    use super::{ConversationSession, ConversationState};

    #[test]
    fn state_round_trips_through_storage_strings() {
        for state in ConversationState::ALL {
            assert_eq!(ConversationState::parse(state.as_str()), state);
        }
        assert_eq!(ConversationState::parse("garbage"), ConversationState::Idle);
    }

    #[test]
    fn mutations_refresh_updated_at_and_append_history() {
        let created = Utc.with_ymd_and_hms(2026, 8, 10, 9, 0, 0).unwrap();
        let mut session = ConversationSession::new("s-1", "u-1", created);
        assert_eq!(session.updated_at(), created);

        let later = created + Duration::minutes(5);
        session.record_turn("hi", "Hello! I can help you schedule meetings.", later);
        assert_eq!(session.updated_at(), later);
        assert_eq!(session.history().len(), 1);

        let even_later = later + Duration::minutes(1);
        session.set_state(ConversationState::WaitingForDuration, even_later);
        assert_eq!(session.updated_at(), even_later);

        session.update_request(
            MeetingRequestPatch { duration_minutes: Some(30), ..MeetingRequestPatch::default() },
            even_later + Duration::minutes(1),
        );
        assert_eq!(session.meeting_request().duration_minutes, Some(30));
    }

    #[test]
    fn stats_reflect_request_progress() {
        let created = Utc.with_ymd_and_hms(2026, 8, 10, 9, 0, 0).unwrap();
        let mut session = ConversationSession::new("s-2", "u-1", created);
        session.update_request(
            MeetingRequestPatch {
                duration_minutes: Some(60),
                preferred_time: Some("tomorrow morning".to_string()),
                ..MeetingRequestPatch::default()
            },
            created,
        );

        let stats = session.stats();
        assert_eq!(stats.turns, 0);
        assert!(stats.request_complete);
        assert!(!stats.has_available_slots);
        assert_eq!(stats.duration_minutes, Some(60));
    }

    #[test]
    fn recent_history_returns_tail() {
        let created = Utc.with_ymd_and_hms(2026, 8, 10, 9, 0, 0).unwrap();
        let mut session = ConversationSession::new("s-3", "u-1", created);
        for i in 0..5 {
            session.record_turn(format!("turn {i}"), "ok", created + Duration::minutes(i));
        }
        let recent = session.recent_history(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].user_text, "turn 3");
    }
}
