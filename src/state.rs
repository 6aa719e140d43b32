//! Application state: the gamification engine, the problem desk and the tutor desk.
//!
//! This module owns:
//!   - the engine (store + achievement catalog) behind a RwLock
//!   - the problem and tutor desks, each with its own TTL cache, behind a Mutex
//!   - the clock every component reads time from
//!
//! Cache reads update hit counters and purge stale entries, so the desks need
//! exclusive access even for lookups.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, instrument};

use crate::achievements::Catalog;
use crate::clock::{SharedClock, SystemClock};
use crate::config::{load_app_config_from_env, AppConfig};
use crate::domain::{ActivityMetadata, ActivityType, MetadataValue, StudentId};
use crate::engine::{ActivityReport, GamificationEngine, ReportOutcome};
use crate::error::CoreResult;
use crate::problems::{ProblemDesk, SubmissionOutcome};
use crate::seeds::default_achievements;
use crate::store::MemoryStore;
use crate::tutor::TutorDesk;

/// Subject under which problem-of-the-day submissions are recorded.
pub const PROBLEM_OF_DAY_SUBJECT: &str = "problem_of_day";

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RwLock<GamificationEngine>>,
    pub problems: Arc<Mutex<ProblemDesk>>,
    pub tutor: Arc<Mutex<TutorDesk>>,
    pub clock: SharedClock,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Build state from env: load config, seed the catalog and problem bank, warm the tutor cache.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_app_config_from_env().unwrap_or_default();
        Self::from_config(cfg, Arc::new(SystemClock))
    }

    pub fn from_config(cfg: AppConfig, clock: SharedClock) -> Self {
        // Config entries first, so they win over built-ins of the same name.
        let mut catalog = Catalog::default();
        let from_config = catalog.seed(cfg.achievements);
        let built_in = catalog.seed(default_achievements());
        info!(target: "gamification", from_config, built_in, total = catalog.len(), "Achievement catalog seeded");

        let problems = ProblemDesk::new(cfg.problems, &cfg.cache, clock.clone());
        let mut tutor = TutorDesk::new(&cfg.cache, clock.clone());
        tutor.warm_up();

        let engine = GamificationEngine::new(Box::new(MemoryStore::new()), catalog, clock.clone());
        info!(target: "curio_backend", store = "memory", "Gamification engine ready");

        Self {
            engine: Arc::new(RwLock::new(engine)),
            problems: Arc::new(Mutex::new(problems)),
            tutor: Arc::new(Mutex::new(tutor)),
            started_at: clock.now(),
            clock,
        }
    }

    #[instrument(level = "info", skip(self, report))]
    pub async fn report_activity(&self, student_id: StudentId, report: ActivityReport) -> CoreResult<ReportOutcome> {
        self.engine.write().await.report_activity(student_id, report)
    }

    /// Evaluates a submission and, for identified students, credits it as a
    /// problem-of-the-day activity. A failure to credit is logged and does not
    /// undo the submission.
    #[instrument(level = "info", skip(self, answer), fields(answer_len = answer.len()))]
    pub async fn submit_problem(
        &self,
        problem_id: u32,
        student_id: Option<StudentId>,
        answer: &str,
        time_spent_seconds: u32,
    ) -> CoreResult<(SubmissionOutcome, Option<ReportOutcome>)> {
        let outcome = self
            .problems
            .lock()
            .await
            .submit(problem_id, student_id.unwrap_or_default(), answer, time_spent_seconds)?;

        let Some(student_id) = student_id else {
            return Ok((outcome, None));
        };
        let report = ActivityReport {
            subject: PROBLEM_OF_DAY_SUBJECT.into(),
            topic: outcome.category.clone(),
            activity_type: ActivityType::ProblemOfDay,
            success_rate: outcome.confidence * 100.0,
            time_spent_minutes: i64::from(time_spent_seconds / 60),
            difficulty: outcome.difficulty,
            progress_percentage: None,
            exercises_completed: 1,
            exercises_correct: i64::from(outcome.is_correct),
            metadata: ActivityMetadata::default()
                .with("submission_id", MetadataValue::Text(outcome.submission_id.to_string()))
                .with("problem_id", MetadataValue::Number(f64::from(problem_id)))
                .with("is_correct", MetadataValue::Flag(outcome.is_correct)),
        };
        match self.report_activity(student_id, report).await {
            Ok(credited) => Ok((outcome, Some(credited))),
            Err(e) => {
                error!(target: "problem", problem_id, student_id, error = %e, kind = e.kind(), "Submission not credited");
                Ok((outcome, None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::NaiveDate;

    fn state() -> AppState {
        let clock = ManualClock::at_date(NaiveDate::from_ymd_opt(2024, 2, 5).unwrap());
        AppState::from_config(AppConfig::default(), Arc::new(clock))
    }

    #[tokio::test]
    async fn test_submission_credits_student() {
        let s = state();
        let answer = "Sobra 800, falta 550: reduzir lazer e fazer um plano de orçamento";
        let (outcome, credited) = s.submit_problem(1, Some(4), answer, 120).await.unwrap();
        assert!(outcome.is_correct);

        let credited = credited.unwrap();
        assert_eq!(credited.progress.subject, PROBLEM_OF_DAY_SUBJECT);
        assert_eq!(credited.progress.topic, "personal_finance");
        assert!(credited.points_earned > 0);

        let history = s.engine.read().await.activities(4, None, None).unwrap();
        assert_eq!(history.items[0].activity_type, ActivityType::ProblemOfDay);
        assert_eq!(history.items[0].metadata.fields.get("is_correct"), Some(&MetadataValue::Flag(true)));
    }

    #[tokio::test]
    async fn test_anonymous_submission_is_not_credited() {
        let s = state();
        let (_, credited) = s.submit_problem(1, None, "uma resposta qualquer aqui", 0).await.unwrap();
        assert!(credited.is_none());
        assert!(s.engine.read().await.leaderboard(Default::default(), None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_config_achievement_overrides_built_in() {
        let cfg = crate::config::parse_app_config(
            r#"
            [[achievements]]
            name = "Primeiro Passo"
            description = "Complete 2 exercícios"
            category = "progress"
            requirement_type = "exercises_completed"
            requirement_value = 2
            "#,
        )
        .unwrap();
        let clock = ManualClock::at_date(NaiveDate::from_ymd_opt(2024, 2, 5).unwrap());
        let s = AppState::from_config(cfg, Arc::new(clock));
        let view = s.engine.read().await.catalog();
        assert_eq!(view.achievements.len(), 10);
        let first = view.achievements.iter().find(|a| a.name == "Primeiro Passo").unwrap();
        assert_eq!(first.requirement_value, 2);
    }
}
