use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use slotwise_agent::runtime::{SchedulerRuntime, SlotOption};
use slotwise_core::domain::session::SessionStats;

#[derive(Clone)]
pub struct ApiState {
    scheduler: Arc<SchedulerRuntime>,
}

pub fn router(scheduler: Arc<SchedulerRuntime>) -> Router {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{session_id}", get(get_session).delete(delete_session))
        .route("/api/chat", post(chat))
        .route("/api/calendar/slots", get(calendar_slots))
        .with_state(ApiState { scheduler })
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

fn default_user_id() -> String {
    "default_user".to_string()
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub status: &'static str,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub user_input: String,
    pub session_id: Option<String>,
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub state: String,
    pub needs_clarification: bool,
    pub options: Vec<SlotOption>,
}

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub duration_minutes: i64,
    pub preference: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SlotsResponse {
    pub slots: Vec<SlotOption>,
    pub total_found: usize,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

pub async fn create_session(
    State(state): State<ApiState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<SessionResponse>, (StatusCode, Json<ApiError>)> {
    let session_id = Uuid::new_v4().to_string();
    state
        .scheduler
        .start_session(&session_id, &request.user_id, Utc::now())
        .await
        .map_err(service_unavailable)?;

    Ok(Json(SessionResponse {
        session_id,
        status: "created",
        message: "New session created successfully".to_string(),
    }))
}

pub async fn get_session(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionStats>, (StatusCode, Json<ApiError>)> {
    match state.scheduler.session_stats(&session_id).await {
        Some(stats) => Ok(Json(stats)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ApiError { error: format!("session `{session_id}` was not found") }),
        )),
    }
}

pub async fn delete_session(
    State(state): State<ApiState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, (StatusCode, Json<ApiError>)> {
    state.scheduler.delete_session(&session_id).await.map_err(service_unavailable)?;

    Ok(Json(SessionResponse {
        session_id,
        status: "deleted",
        message: "Session deleted".to_string(),
    }))
}

pub async fn chat(
    State(state): State<ApiState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ApiError>)> {
    let now = Utc::now();
    let session_id = match request.session_id {
        Some(session_id) => session_id,
        None => {
            let session_id = Uuid::new_v4().to_string();
            state
                .scheduler
                .start_session(&session_id, &request.user_id, now)
                .await
                .map_err(service_unavailable)?;
            session_id
        }
    };

    let turn = state.scheduler.handle_turn(&session_id, &request.user_input, now).await;

    Ok(Json(ChatResponse {
        response: turn.reply,
        session_id: turn.session_id,
        state: turn.state.as_str().to_string(),
        needs_clarification: turn.needs_clarification,
        options: turn.options,
    }))
}

pub async fn calendar_slots(
    State(state): State<ApiState>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<SlotsResponse>, (StatusCode, Json<ApiError>)> {
    if query.duration_minutes <= 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError { error: "duration_minutes must be positive".to_string() }),
        ));
    }

    let slots = state
        .scheduler
        .one_shot_slots(query.duration_minutes, query.preference.as_deref(), Utc::now())
        .await;
    let total_found = slots.len();

    Ok(Json(SlotsResponse { slots, total_found }))
}

fn service_unavailable(
    error: slotwise_core::SessionStoreError,
) -> (StatusCode, Json<ApiError>) {
    (StatusCode::SERVICE_UNAVAILABLE, Json(ApiError { error: error.to_string() }))
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, Query, State};
    use axum::Json;

    use slotwise_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;
    use crate::routes::{
        calendar_slots, chat, create_session, get_session, ApiState, ChatRequest,
        CreateSessionRequest, SlotsQuery,
    };

    #[tokio::test]
    async fn chat_creates_a_session_and_advances_the_flow() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap succeeds");
        let state = ApiState { scheduler: app.scheduler.clone() };

        let Json(first) = chat(
            State(state.clone()),
            Json(ChatRequest {
                user_input: "I need to schedule a meeting".to_string(),
                session_id: None,
                user_id: "web_user".to_string(),
            }),
        )
        .await
        .expect("chat works");

        assert_eq!(first.state, "waiting_for_duration");
        assert!(first.response.contains("How long"));

        let Json(second) = chat(
            State(state.clone()),
            Json(ChatRequest {
                user_input: "45 minutes".to_string(),
                session_id: Some(first.session_id.clone()),
                user_id: "web_user".to_string(),
            }),
        )
        .await
        .expect("chat works");

        assert_eq!(second.session_id, first.session_id);
        assert_eq!(second.state, "waiting_for_time");
    }

    #[tokio::test]
    async fn session_lifecycle_endpoints_round_trip() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap succeeds");
        let state = ApiState { scheduler: app.scheduler.clone() };

        let Json(created) = create_session(
            State(state.clone()),
            Json(CreateSessionRequest { user_id: "u-1".to_string() }),
        )
        .await
        .expect("session created");
        assert_eq!(created.status, "created");

        let Json(stats) =
            get_session(State(state.clone()), Path(created.session_id.clone()))
                .await
                .expect("session stats exist");
        assert_eq!(stats.session_id, created.session_id);
        assert_eq!(stats.turns, 0);

        let missing = get_session(State(state), Path("missing".to_string())).await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn slot_query_rejects_non_positive_durations() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap succeeds");
        let state = ApiState { scheduler: app.scheduler.clone() };

        let rejected = calendar_slots(
            State(state.clone()),
            Query(SlotsQuery { duration_minutes: 0, preference: None }),
        )
        .await;
        assert!(rejected.is_err());

        let Json(accepted) = calendar_slots(
            State(state),
            Query(SlotsQuery { duration_minutes: 30, preference: None }),
        )
        .await
        .expect("slot query works");
        assert_eq!(accepted.slots.len(), accepted.total_found);
    }
}
