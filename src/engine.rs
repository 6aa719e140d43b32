//! Gamification engine: validates activity reports and drives streak, points,
//! progress and achievements for one student at a time.
//!
//! Every mutating operation loads the student's ledger, works on that copy and
//! commits it through the store at the very end. Validation runs before the
//! load, so a rejected report never touches state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::achievements::{self, Catalog};
use crate::activity::{check_success_rate, Activity};
use crate::clock::SharedClock;
use crate::domain::{
    round1, Achievement, ActivityLog, ActivityMetadata, ActivityType, Difficulty, StudentAchievement, StudentId,
    StudentProgressRecord,
};
use crate::error::{CoreError, CoreResult};
use crate::points::PointsView;
use crate::store::{GamificationStore, StudentLedger};
use crate::streak::StudyStreak;
use crate::util::{page_window, Page, Pagination};

const DEFAULT_LEADERBOARD_SIZE: usize = 10;
const MAX_LEADERBOARD_SIZE: usize = 100;

/// One reported activity. Exercise and time fields are increments applied to
/// the (subject, topic) progress record.
#[derive(Clone, Debug, Deserialize)]
pub struct ActivityReport {
    pub subject: String,
    pub topic: String,
    #[serde(default)]
    pub activity_type: ActivityType,
    #[serde(default = "full_success")]
    pub success_rate: f64,
    #[serde(default)]
    pub time_spent_minutes: i64,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Replaces the stored percentage when present.
    #[serde(default)]
    pub progress_percentage: Option<f64>,
    #[serde(default)]
    pub exercises_completed: i64,
    #[serde(default)]
    pub exercises_correct: i64,
    #[serde(default)]
    pub metadata: ActivityMetadata,
}

fn full_success() -> f64 {
    100.0
}

/// A report that passed validation, with counters already narrowed.
struct ValidReport {
    activity: Activity,
    progress_percentage: Option<f64>,
    exercises_completed: u32,
    exercises_correct: u32,
}

fn non_negative_u32(value: i64, field: &str) -> CoreResult<u32> {
    if value < 0 {
        return Err(CoreError::invalid(format!("{} must not be negative", field)));
    }
    u32::try_from(value).map_err(|_| CoreError::invalid(format!("{} is too large", field)))
}

impl ActivityReport {
    fn validate(self, student_id: StudentId) -> CoreResult<ValidReport> {
        if self.subject.trim().is_empty() || self.topic.trim().is_empty() {
            return Err(CoreError::invalid("subject and topic are required"));
        }
        check_success_rate(self.success_rate)?;
        if let Some(p) = self.progress_percentage {
            if !p.is_finite() || !(0.0..=100.0).contains(&p) {
                return Err(CoreError::invalid("progress_percentage must be between 0 and 100"));
            }
        }
        let time_spent_minutes = non_negative_u32(self.time_spent_minutes, "time_spent_minutes")?;
        let exercises_completed = non_negative_u32(self.exercises_completed, "exercises_completed")?;
        let exercises_correct = non_negative_u32(self.exercises_correct, "exercises_correct")?;
        if exercises_correct > exercises_completed {
            return Err(CoreError::invalid("exercises_correct cannot exceed exercises_completed"));
        }
        self.metadata.validate()?;

        Ok(ValidReport {
            activity: Activity {
                student_id,
                activity_type: self.activity_type,
                subject: self.subject.trim().to_string(),
                topic: self.topic.trim().to_string(),
                success_rate: self.success_rate,
                time_spent_minutes,
                difficulty: self.difficulty,
                metadata: self.metadata,
            },
            progress_percentage: self.progress_percentage,
            exercises_completed,
            exercises_correct,
        })
    }
}

// -------- Views --------

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct StreakView {
    #[serde(flatten)]
    pub streak: StudyStreak,
    /// Whether studying today would extend the current streak.
    pub is_active: bool,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ReportOutcome {
    pub points_earned: u32,
    pub leveled_up: bool,
    pub new_achievements: Vec<Achievement>,
    pub streak: StudyStreak,
    pub points: PointsView,
    pub progress: StudentProgressRecord,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct AchievementStanding {
    pub student_achievement: StudentAchievement,
    pub achievement: Achievement,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct AchievementsBoard {
    pub earned: Vec<AchievementStanding>,
    pub in_progress: Vec<AchievementStanding>,
    /// Active entries the student has never been evaluated against.
    pub available: Vec<Achievement>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SubjectProgress {
    pub progress: f64,
    pub time_spent: u64,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct StudentSummary {
    pub overall_progress: f64,
    pub total_time_minutes: u64,
    pub total_exercises: u64,
    pub total_correct: u64,
    pub accuracy: f64,
    pub subject_progress: BTreeMap<String, SubjectProgress>,
    pub streak: StudyStreak,
    pub points: PointsView,
    pub achievements: Vec<AchievementStanding>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct CatalogView {
    pub achievements: Vec<Achievement>,
    pub by_category: BTreeMap<String, Vec<Achievement>>,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardKind {
    #[default]
    Points,
    Streak,
    Time,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum LeaderboardScore {
    Points { total_points: u64, level: u32 },
    Streak { current_streak: u32, longest_streak: u32 },
    Time { total_time_minutes: u64 },
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub student_id: StudentId,
    #[serde(flatten)]
    pub score: LeaderboardScore,
}

// -------- Engine --------

pub struct GamificationEngine {
    store: Box<dyn GamificationStore>,
    catalog: Catalog,
    clock: SharedClock,
}

impl GamificationEngine {
    pub fn new(store: Box<dyn GamificationStore>, catalog: Catalog, clock: SharedClock) -> Self {
        Self { store, catalog, clock }
    }

    fn ledger(&self, student_id: StudentId) -> CoreResult<StudentLedger> {
        self.store
            .load_ledger(student_id)?
            .ok_or_else(|| CoreError::not_found("student", student_id))
    }

    fn standings<'a>(&'a self, ledger: &'a StudentLedger) -> impl Iterator<Item = AchievementStanding> + 'a {
        ledger.achievements.values().filter_map(|sa| {
            self.catalog.get(sa.achievement_id).map(|a| AchievementStanding {
                student_achievement: sa.clone(),
                achievement: a.clone(),
            })
        })
    }

    /// Applies one activity: progress, streak, points, log entry and any
    /// achievements it unlocks, committed together.
    #[instrument(level = "info", skip(self, report), fields(subject = %report.subject, topic = %report.topic))]
    pub fn report_activity(&mut self, student_id: StudentId, report: ActivityReport) -> CoreResult<ReportOutcome> {
        let valid = report.validate(student_id)?;
        let now = self.clock.now();
        let today = now.date_naive();

        let mut ledger = self
            .store
            .load_ledger(student_id)?
            .unwrap_or_else(|| StudentLedger::new(student_id));

        let activity = valid.activity;
        let record = ledger
            .progress
            .entry((activity.subject.clone(), activity.topic.clone()))
            .or_insert_with(|| StudentProgressRecord::new(student_id, &activity.subject, &activity.topic, now));
        if let Some(p) = valid.progress_percentage {
            record.progress_percentage = p;
        }
        record.time_spent_minutes = record.time_spent_minutes.saturating_add(activity.time_spent_minutes);
        record.exercises_completed = record.exercises_completed.saturating_add(valid.exercises_completed);
        record.exercises_correct = record.exercises_correct.saturating_add(valid.exercises_correct);
        record.last_activity = now;
        let progress = record.clone();

        ledger.streak.update(today);
        let points_earned = activity.points();
        let level_before = ledger.points.level;
        ledger.points.add_points(points_earned, activity.activity_type.as_str(), today);
        let log = activity.record(now);
        // Unlock bonuses can carry the student over a level boundary too.
        let new_achievements = achievements::check_achievements(&self.catalog, &mut ledger, now);
        let leveled_up = ledger.points.level > level_before;

        let outcome = ReportOutcome {
            points_earned,
            leveled_up,
            new_achievements,
            streak: ledger.streak.clone(),
            points: ledger.points.view(),
            progress,
        };
        self.store.commit(ledger, vec![log])?;

        info!(
            target: "gamification",
            student_id,
            points_earned,
            unlocked = outcome.new_achievements.len(),
            streak = outcome.streak.current_streak,
            "Activity recorded"
        );
        Ok(outcome)
    }

    /// Re-evaluates achievements without new activity.
    #[instrument(level = "info", skip(self))]
    pub fn check_achievements(&mut self, student_id: StudentId) -> CoreResult<Vec<Achievement>> {
        let mut ledger = self.ledger(student_id)?;
        let unlocked = achievements::check_achievements(&self.catalog, &mut ledger, self.clock.now());
        self.store.commit(ledger, Vec::new())?;
        Ok(unlocked)
    }

    pub fn student_summary(&self, student_id: StudentId) -> CoreResult<StudentSummary> {
        let ledger = self.ledger(student_id)?;

        let records: Vec<&StudentProgressRecord> = ledger.progress.values().collect();
        let overall_progress = if records.is_empty() {
            0.0
        } else {
            round1(records.iter().map(|r| r.progress_percentage).sum::<f64>() / records.len() as f64)
        };

        let mut by_subject: BTreeMap<String, (f64, usize, u64)> = BTreeMap::new();
        for r in &records {
            let entry = by_subject.entry(r.subject.clone()).or_insert((0.0, 0, 0));
            entry.0 += r.progress_percentage;
            entry.1 += 1;
            entry.2 += u64::from(r.time_spent_minutes);
        }
        let subject_progress = by_subject
            .into_iter()
            .map(|(subject, (sum, n, time_spent))| {
                (subject, SubjectProgress { progress: round1(sum / n as f64), time_spent })
            })
            .collect();

        let total_exercises = ledger.total_exercises();
        let total_correct = ledger.total_correct();
        Ok(StudentSummary {
            overall_progress,
            total_time_minutes: ledger.total_minutes(),
            total_exercises,
            total_correct,
            accuracy: round1(total_correct as f64 / total_exercises.max(1) as f64 * 100.0),
            subject_progress,
            streak: ledger.streak.clone(),
            points: ledger.points.view(),
            achievements: self.standings(&ledger).collect(),
        })
    }

    pub fn subject_progress(&self, student_id: StudentId, subject: &str) -> CoreResult<Vec<StudentProgressRecord>> {
        let ledger = self.ledger(student_id)?;
        Ok(ledger.progress.into_values().filter(|r| r.subject == subject).collect())
    }

    pub fn achievements_board(&self, student_id: StudentId) -> CoreResult<AchievementsBoard> {
        let ledger = self.ledger(student_id)?;
        let (earned, rest): (Vec<_>, Vec<_>) =
            self.standings(&ledger).partition(|s| s.student_achievement.is_earned());
        let in_progress = rest.into_iter().filter(|s| s.student_achievement.progress > 0.0).collect();
        let available = self
            .catalog
            .active()
            .filter(|a| !ledger.achievements.contains_key(&a.id))
            .cloned()
            .collect();
        Ok(AchievementsBoard { earned, in_progress, available })
    }

    pub fn streak(&self, student_id: StudentId) -> CoreResult<StreakView> {
        let ledger = self.ledger(student_id)?;
        let is_active = ledger.streak.is_alive(self.clock.today());
        Ok(StreakView { streak: ledger.streak, is_active })
    }

    pub fn points(&self, student_id: StudentId) -> CoreResult<PointsView> {
        Ok(self.ledger(student_id)?.points.view())
    }

    /// Newest-first activity history.
    pub fn activities(
        &self,
        student_id: StudentId,
        page: Option<usize>,
        per_page: Option<usize>,
    ) -> CoreResult<Page<ActivityLog>> {
        self.ledger(student_id)?;
        let (page, per_page, offset) = page_window(page, per_page);
        let (items, total) = self.store.activities(student_id, offset, per_page)?;
        Ok(Page { items, pagination: Pagination::new(page, per_page, total) })
    }

    /// Ranked descending; ties go to the lower student id.
    pub fn leaderboard(&self, kind: LeaderboardKind, limit: Option<usize>) -> CoreResult<Vec<LeaderboardEntry>> {
        let limit = limit.unwrap_or(DEFAULT_LEADERBOARD_SIZE).clamp(1, MAX_LEADERBOARD_SIZE);
        let mut ranked: Vec<(u64, StudentLedger)> = self
            .store
            .ledgers()?
            .into_iter()
            .map(|l| {
                let key = match kind {
                    LeaderboardKind::Points => l.points.total_points,
                    LeaderboardKind::Streak => u64::from(l.streak.current_streak),
                    LeaderboardKind::Time => l.total_minutes(),
                };
                (key, l)
            })
            .collect();
        ranked.sort_by(|(ka, la), (kb, lb)| kb.cmp(ka).then(la.student_id.cmp(&lb.student_id)));
        debug!(target: "gamification", ?kind, students = ranked.len(), limit, "Leaderboard computed");

        Ok(ranked
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(i, (_, l))| LeaderboardEntry {
                rank: i + 1,
                student_id: l.student_id,
                score: match kind {
                    LeaderboardKind::Points => {
                        LeaderboardScore::Points { total_points: l.points.total_points, level: l.points.level }
                    }
                    LeaderboardKind::Streak => LeaderboardScore::Streak {
                        current_streak: l.streak.current_streak,
                        longest_streak: l.streak.longest_streak,
                    },
                    LeaderboardKind::Time => LeaderboardScore::Time { total_time_minutes: l.total_minutes() },
                },
            })
            .collect())
    }

    pub fn catalog(&self) -> CatalogView {
        CatalogView { achievements: self.catalog.active().cloned().collect(), by_category: self.catalog.by_category() }
    }

    pub fn is_healthy(&self) -> bool {
        self.store.is_healthy()
    }
}
