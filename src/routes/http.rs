//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Every session endpoint answers with the session snapshot after the action.
//! Provider failures land inside that snapshot, so they still return 200.

use std::sync::Arc;
use axum::{
  body::Bytes,
  extract::{Path, Query, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument, warn};

use crate::domain::{ConfigDraft, Difficulty};
use crate::error::{ProviderError, SessionError};
use crate::logic::{self, Intent};
use crate::protocol::*;
use crate::session::SessionView;
use crate::state::{AppState, SessionHandle};

/// Error responses of the HTTP surface.
#[derive(Debug)]
pub enum ApiError {
  UnknownSession(String),
  /// Request body present but unusable.
  InvalidBody { status: StatusCode, message: String },
  Rejected { error: SessionError, session: SessionView },
  Provider(ProviderError),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match self {
      ApiError::UnknownSession(id) => (
        StatusCode::NOT_FOUND,
        ErrorOut { error: format!("Unknown session '{}'", id), session: None },
      ),
      ApiError::InvalidBody { status, message } => (status, ErrorOut { error: message, session: None }),
      ApiError::Rejected { error, session } => {
        let status = match error {
          SessionError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
          SessionError::Busy(_) => StatusCode::CONFLICT,
          _ => StatusCode::BAD_GATEWAY,
        };
        (status, ErrorOut { error: error.to_string(), session: Some(session) })
      }
      ApiError::Provider(e) => (StatusCode::BAD_GATEWAY, ErrorOut { error: e.to_string(), session: None }),
    };
    (status, Json(body)).into_response()
  }
}

async fn lookup(state: &AppState, id: &str) -> Result<Arc<SessionHandle>, ApiError> {
  state.get_session(id).await.ok_or_else(|| {
    warn!(target: "session", %id, "HTTP request for unknown session");
    ApiError::UnknownSession(id.to_string())
  })
}

async fn run(state: &AppState, id: &str, intent: Intent) -> Result<Json<SessionView>, ApiError> {
  let handle = lookup(state, id).await?;
  match logic::apply(state, &handle, intent).await {
    Ok(view) => Ok(Json(view)),
    Err(error) => Err(ApiError::Rejected { error, session: handle.snapshot().await }),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let sessions = state.sessions.read().await.len();
  Json(HealthOut { ok: true, provider: state.provider.name().to_string(), sessions })
}

/// Create a session. An optional config body is applied right away.
/// An empty body means no config; a body that does not parse creates nothing.
#[instrument(level = "info", skip(state, body), fields(body_len = body.len()))]
pub async fn http_create_session(
  State(state): State<Arc<AppState>>,
  body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
  let draft = parse_optional_draft(&body)?;
  let handle = state.create_session().await;
  let view = match draft {
    Some(draft) => match logic::apply(&state, &handle, Intent::Configure(draft)).await {
      Ok(view) => view,
      Err(error) => return Err(ApiError::Rejected { error, session: handle.snapshot().await }),
    },
    None => handle.snapshot().await,
  };
  info!(target: "session", id = %handle.id(), phase = ?view.phase, "HTTP session created");
  Ok((StatusCode::CREATED, Json(view)))
}

fn parse_optional_draft(body: &[u8]) -> Result<Option<ConfigDraft>, ApiError> {
  if body.iter().all(u8::is_ascii_whitespace) {
    return Ok(None);
  }
  serde_json::from_slice::<ConfigDraft>(body).map(Some).map_err(|e| {
    let status = match e.classify() {
      serde_json::error::Category::Data => StatusCode::UNPROCESSABLE_ENTITY,
      _ => StatusCode::BAD_REQUEST,
    };
    warn!(target: "codecrafter", error = %e, status = status.as_u16(), "Rejected session config body");
    ApiError::InvalidBody { status, message: format!("Invalid session config: {}", e) }
  })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
  Ok(Json(lookup(&state, &id).await?.snapshot().await))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
  if state.remove_session(&id).await {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::UnknownSession(id))
  }
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_put_config(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<ConfigDraft>,
) -> Result<Json<SessionView>, ApiError> {
  run(&state, &id, Intent::Configure(body)).await
}

#[instrument(level = "info", skip(state))]
pub async fn http_restart(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
  run(&state, &id, Intent::Restart).await
}

#[instrument(level = "info", skip(state, body), fields(view = %body.view))]
pub async fn http_switch_view(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<ViewIn>,
) -> Result<Json<SessionView>, ApiError> {
  run(&state, &id, Intent::SwitchView(body.view)).await
}

#[instrument(level = "debug", skip(state, body), fields(text_len = body.text.len()))]
pub async fn http_put_draft(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<DraftIn>,
) -> Result<Json<SessionView>, ApiError> {
  run(&state, &id, Intent::UpdateDraft(body.text)).await
}

#[instrument(level = "info", skip(state))]
pub async fn http_submit(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
  run(&state, &id, Intent::Submit).await
}

#[instrument(level = "info", skip(state))]
pub async fn http_reveal_solution(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
  run(&state, &id, Intent::RevealSolution).await
}

#[instrument(level = "info", skip(state))]
pub async fn http_reveal_hint(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
  run(&state, &id, Intent::RevealHint).await
}

#[instrument(level = "info", skip(state, q))]
pub async fn http_get_topic(
  State(state): State<Arc<AppState>>,
  Query(q): Query<TopicQuery>,
) -> Result<Json<TopicOut>, ApiError> {
  let difficulty = q.difficulty.unwrap_or(Difficulty::Beginner);
  let topic = logic::suggest_topic(&state, difficulty).await.map_err(ApiError::Provider)?;
  Ok(Json(TopicOut { difficulty, topic }))
}
