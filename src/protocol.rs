//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Achievement, ActivityLog, ActivityType, Difficulty, StudentId, StudentProgressRecord};
use crate::engine::{LeaderboardEntry, LeaderboardKind, ReportOutcome, StreakView};
use crate::points::PointsView;
use crate::problems::{ProblemOfDay, ProblemStats, SubmissionOutcome};
use crate::tutor::{ChatMessage, ChatSession, SessionSummary, TutorPerformance};
use crate::util::Pagination;

/// Every successful response carries `"success": true` next to its payload.
#[derive(Debug, Serialize)]
pub struct Success<T> {
    pub success: bool,
    #[serde(flatten)]
    pub body: T,
}

pub fn success<T: Serialize>(body: T) -> Success<T> {
    Success { success: true, body }
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub success: bool,
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub store_healthy: bool,
    pub started_at: DateTime<Utc>,
}

//
// Students & gamification
//

#[derive(Debug, Serialize)]
pub struct SubjectProgressOut {
    pub subject: String,
    pub progress: Vec<StudentProgressRecord>,
}

#[derive(Debug, Serialize)]
pub struct CheckOut {
    pub new_achievements: Vec<Achievement>,
}

#[derive(Debug, Serialize)]
pub struct StreakOut {
    pub streak: StreakView,
}

#[derive(Debug, Serialize)]
pub struct PointsOut {
    pub points: PointsView,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ActivitiesOut {
    pub activities: Vec<ActivityLog>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(rename = "type", default)]
    pub kind: LeaderboardKind,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardOut {
    pub leaderboard_type: LeaderboardKind,
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// Preview of what an activity is worth; nothing is recorded.
#[derive(Debug, Deserialize)]
pub struct ScoreIn {
    #[serde(default)]
    pub activity_type: ActivityType,
    #[serde(default = "full_success")]
    pub success_rate: f64,
    #[serde(default)]
    pub time_spent_minutes: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
}

fn full_success() -> f64 {
    100.0
}

#[derive(Debug, Serialize)]
pub struct ScoreOut {
    pub points: u32,
}

//
// Problem of the day
//

#[derive(Debug, Serialize)]
pub struct ProblemOut {
    pub problem: ProblemOfDay,
    pub cached: bool,
}

#[derive(Debug, Deserialize)]
pub struct SubmitIn {
    /// Anonymous submissions are evaluated but not credited.
    #[serde(default)]
    pub student_id: Option<StudentId>,
    #[serde(default)]
    pub answer: String,
    /// Seconds.
    #[serde(default)]
    pub time_spent: u32,
}

#[derive(Debug, Serialize)]
pub struct SubmitOut {
    #[serde(flatten)]
    pub outcome: SubmissionOutcome,
    pub gamification: Option<ReportOutcome>,
}

#[derive(Debug, Serialize)]
pub struct HintOut {
    pub hint: String,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
pub struct StatsOut {
    pub stats: ProblemStats,
    pub cached: bool,
}

//
// Tutor chat
//

#[derive(Debug, Deserialize)]
pub struct ChatStartIn {
    pub student_id: StudentId,
    #[serde(default)]
    pub problem_id: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ChatStartOut {
    pub session: ChatSession,
    pub welcome_message: ChatMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessageIn {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryOut {
    pub messages: Vec<ChatMessage>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct SummaryOut {
    pub summary: SessionSummary,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
pub struct PerformanceOut {
    pub performance: TutorPerformance,
}
