//! HTTP endpoint handlers. These are thin wrappers that forward to state operations.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{QuestionKind, TestKind};
use crate::error::Result;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut {
    ok: true,
    generator: state.generator.name().to_string(),
    sessions: state.session_count().await,
  })
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len()))]
pub async fn http_post_document(
  State(state): State<Arc<AppState>>,
  Json(body): Json<DocumentIn>,
) -> Result<impl IntoResponse> {
  let summary = state.open_session(&body.text).await?;
  Ok((StatusCode::CREATED, Json(summary)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_document(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
  state.close_session(id).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state, body), fields(kind = %body.kind, has_prompt = body.custom_prompt.is_some()))]
pub async fn http_post_pool(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  Json(body): Json<PoolIn>,
) -> Result<impl IntoResponse> {
  let kind: QuestionKind = body.kind.parse()?;
  let pool = state.ensure_pool(id, kind, body.custom_prompt.as_deref()).await?;
  info!(target: "quizbank", document_id = %id, %kind, size = pool.size, unseen = pool.unseen, "HTTP pool ready");
  Ok(Json(pool))
}

#[instrument(level = "info", skip(state, body), fields(kind = %body.kind, count = body.count, allow_repeats = body.allow_repeats))]
pub async fn http_post_test(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  Json(body): Json<TestIn>,
) -> Result<impl IntoResponse> {
  let kind: TestKind = body.kind.parse()?;
  let draw = state.draw_test(id, kind, body.count, body.allow_repeats).await?;
  info!(target: "quizbank", document_id = %id, served = draw.questions.len(), ok = draw.is_ok(), partial = draw.is_partial(), reset = draw.was_reset(), "HTTP test served");
  Ok(Json(to_test_out(body.count, draw)))
}

#[instrument(level = "info", skip(state, body), fields(answers = body.answers.len()))]
pub async fn http_post_grades(
  State(state): State<Arc<AppState>>,
  Path(id): Path<Uuid>,
  Json(body): Json<GradeIn>,
) -> Result<impl IntoResponse> {
  let report = state.grade_answers(id, &body.answers).await?;
  info!(target: "quizbank", document_id = %id, correct = report.correct, graded = report.graded, "HTTP answers graded");
  Ok(Json(report))
}
