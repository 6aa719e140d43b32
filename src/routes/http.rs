//! HTTP endpoint handlers. These are thin wrappers that forward to the engine and desks.
//! Each handler is instrumented and logs include parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{
    rejection::{JsonRejection, PathRejection, QueryRejection},
    FromRequest, FromRequestParts, Path, Query, State,
  },
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::activity::{check_success_rate, score_activity};
use crate::domain::StudentId;
use crate::engine::{AchievementsBoard, ActivityReport, CatalogView, ReportOutcome, StudentSummary};
use crate::error::CoreError;
use crate::protocol::*;
use crate::state::AppState;
use crate::tutor::MessageExchange;

type ApiResult<T> = Result<Json<Success<T>>, CoreError>;

// Extractors whose rejections surface as `CoreError::InvalidInput` (400 + error envelope).

#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(CoreError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(Path), rejection(CoreError))]
pub struct ApiPath<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(CoreError))]
pub struct ApiQuery<T>(pub T);

impl From<JsonRejection> for CoreError {
  fn from(rejection: JsonRejection) -> Self {
    CoreError::invalid(rejection.body_text())
  }
}

impl From<PathRejection> for CoreError {
  fn from(rejection: PathRejection) -> Self {
    CoreError::invalid(rejection.body_text())
  }
}

impl From<QueryRejection> for CoreError {
  fn from(rejection: QueryRejection) -> Self {
    CoreError::invalid(rejection.body_text())
  }
}

impl IntoResponse for CoreError {
  fn into_response(self) -> Response {
    let status = match &self {
      CoreError::NotFound(_) => StatusCode::NOT_FOUND,
      CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
      CoreError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    warn!(target: "curio_backend", kind = self.kind(), error = %self, "Request failed");
    (status, Json(ErrorOut { success: false, error: self.to_string() })).into_response()
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let store_healthy = state.engine.read().await.is_healthy();
  Json(HealthOut { ok: true, store_healthy, started_at: state.started_at })
}

//
// Students & gamification
//

#[instrument(level = "info", skip(state, body), fields(subject = %body.subject, activity_type = body.activity_type.as_str()))]
pub async fn http_post_progress(
  State(state): State<Arc<AppState>>,
  ApiPath(student_id): ApiPath<StudentId>,
  ApiJson(body): ApiJson<ActivityReport>,
) -> ApiResult<ReportOutcome> {
  let outcome = state.report_activity(student_id, body).await?;
  info!(target: "gamification", student_id, points = outcome.points_earned, "HTTP progress reported");
  Ok(Json(success(outcome)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_progress(
  State(state): State<Arc<AppState>>,
  ApiPath(student_id): ApiPath<StudentId>,
) -> ApiResult<StudentSummary> {
  let summary = state.engine.read().await.student_summary(student_id)?;
  Ok(Json(success(summary)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_subject_progress(
  State(state): State<Arc<AppState>>,
  ApiPath((student_id, subject)): ApiPath<(StudentId, String)>,
) -> ApiResult<SubjectProgressOut> {
  let progress = state.engine.read().await.subject_progress(student_id, &subject)?;
  Ok(Json(success(SubjectProgressOut { subject, progress })))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_student_achievements(
  State(state): State<Arc<AppState>>,
  ApiPath(student_id): ApiPath<StudentId>,
) -> ApiResult<AchievementsBoard> {
  let board = state.engine.read().await.achievements_board(student_id)?;
  Ok(Json(success(board)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_check_achievements(
  State(state): State<Arc<AppState>>,
  ApiPath(student_id): ApiPath<StudentId>,
) -> ApiResult<CheckOut> {
  let new_achievements = state.engine.write().await.check_achievements(student_id)?;
  Ok(Json(success(CheckOut { new_achievements })))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_streak(
  State(state): State<Arc<AppState>>,
  ApiPath(student_id): ApiPath<StudentId>,
) -> ApiResult<StreakOut> {
  let streak = state.engine.read().await.streak(student_id)?;
  Ok(Json(success(StreakOut { streak })))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_points(
  State(state): State<Arc<AppState>>,
  ApiPath(student_id): ApiPath<StudentId>,
) -> ApiResult<PointsOut> {
  let points = state.engine.read().await.points(student_id)?;
  Ok(Json(success(PointsOut { points })))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_activities(
  State(state): State<Arc<AppState>>,
  ApiPath(student_id): ApiPath<StudentId>,
  ApiQuery(q): ApiQuery<PageQuery>,
) -> ApiResult<ActivitiesOut> {
  let page = state.engine.read().await.activities(student_id, q.page, q.per_page)?;
  Ok(Json(success(ActivitiesOut { activities: page.items, pagination: page.pagination })))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_leaderboard(
  State(state): State<Arc<AppState>>,
  ApiQuery(q): ApiQuery<LeaderboardQuery>,
) -> ApiResult<LeaderboardOut> {
  let leaderboard = state.engine.read().await.leaderboard(q.kind, q.limit)?;
  Ok(Json(success(LeaderboardOut { leaderboard_type: q.kind, leaderboard })))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_achievements(State(state): State<Arc<AppState>>) -> Json<Success<CatalogView>> {
  Json(success(state.engine.read().await.catalog()))
}

#[instrument(level = "info")]
pub async fn http_post_score(ApiJson(body): ApiJson<ScoreIn>) -> ApiResult<ScoreOut> {
  check_success_rate(body.success_rate)?;
  let points = score_activity(body.activity_type, body.success_rate, body.time_spent_minutes, body.difficulty);
  Ok(Json(success(ScoreOut { points })))
}

//
// Problem of the day
//

#[instrument(level = "info", skip(state))]
pub async fn http_get_problem_today(State(state): State<Arc<AppState>>) -> ApiResult<ProblemOut> {
  let (problem, cached) = state.problems.lock().await.problem_of_day()?;
  info!(target: "problem", id = problem.problem.id, cached, "HTTP problem of the day served");
  Ok(Json(success(ProblemOut { problem, cached })))
}

#[instrument(level = "info", skip(state, body), fields(student_id = ?body.student_id, answer_len = body.answer.len()))]
pub async fn http_post_submit(
  State(state): State<Arc<AppState>>,
  ApiPath(problem_id): ApiPath<u32>,
  ApiJson(body): ApiJson<SubmitIn>,
) -> ApiResult<SubmitOut> {
  let (outcome, gamification) = state.submit_problem(problem_id, body.student_id, &body.answer, body.time_spent).await?;
  Ok(Json(success(SubmitOut { outcome, gamification })))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_problem_hint(
  State(state): State<Arc<AppState>>,
  ApiPath(problem_id): ApiPath<u32>,
) -> ApiResult<HintOut> {
  let (hint, cached) = state.problems.lock().await.hint(problem_id)?;
  Ok(Json(success(HintOut { hint, cached })))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_problem_stats(State(state): State<Arc<AppState>>) -> Json<Success<StatsOut>> {
  let (stats, cached) = state.problems.lock().await.stats();
  Json(success(StatsOut { stats, cached }))
}

//
// Tutor chat
//

#[instrument(level = "info", skip(state))]
pub async fn http_post_chat_start(
  State(state): State<Arc<AppState>>,
  ApiJson(body): ApiJson<ChatStartIn>,
) -> Json<Success<ChatStartOut>> {
  let (session, welcome_message) = state.tutor.lock().await.start_session(body.student_id, body.problem_id);
  Json(success(ChatStartOut { session, welcome_message }))
}

#[instrument(level = "info", skip(state, body), fields(len = body.message.len()))]
pub async fn http_post_chat_message(
  State(state): State<Arc<AppState>>,
  ApiPath(session_id): ApiPath<Uuid>,
  ApiJson(body): ApiJson<ChatMessageIn>,
) -> ApiResult<MessageExchange> {
  let exchange = state.tutor.lock().await.send_message(session_id, &body.message)?;
  info!(target: "tutor", %session_id, cache_hit = exchange.cache_hit, "HTTP chat message answered");
  Ok(Json(success(exchange)))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_chat_history(
  State(state): State<Arc<AppState>>,
  ApiPath(session_id): ApiPath<Uuid>,
  ApiQuery(q): ApiQuery<PageQuery>,
) -> ApiResult<HistoryOut> {
  let page = state.tutor.lock().await.history(session_id, q.page, q.per_page)?;
  Ok(Json(success(HistoryOut { messages: page.items, pagination: page.pagination })))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_chat_summary(
  State(state): State<Arc<AppState>>,
  ApiPath(session_id): ApiPath<Uuid>,
) -> ApiResult<SummaryOut> {
  let (summary, cached) = state.tutor.lock().await.summary(session_id)?;
  Ok(Json(success(SummaryOut { summary, cached })))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_tutor_performance(State(state): State<Arc<AppState>>) -> Json<Success<PerformanceOut>> {
  let performance = state.tutor.lock().await.performance();
  Json(success(PerformanceOut { performance }))
}
