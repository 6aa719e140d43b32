//! Achievement catalog and unlock evaluation.
//!
//! Unlocking awards the achievement's bonus through the points ledger, which can
//! push `total_points` over another achievement's threshold. Evaluation therefore
//! repeats passes until one unlocks nothing, bounded by the catalog size, so a
//! second call without new activity never unlocks anything.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::{Achievement, Rarity, RequirementType, StudentAchievement};
use crate::store::StudentLedger;

/// Catalog entry as written in seeds or TOML, before an id is assigned.
#[derive(Clone, Debug, Deserialize)]
pub struct AchievementDef {
    pub name: String,
    pub description: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    pub category: String,
    pub requirement_type: RequirementType,
    pub requirement_value: u32,
    #[serde(default = "default_bonus")]
    pub points: u32,
    #[serde(default)]
    pub rarity: Rarity,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_icon() -> String {
    "trophy".into()
}
fn default_bonus() -> u32 {
    10
}
fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Default)]
pub struct Catalog {
    entries: Vec<Achievement>,
}

impl Catalog {
    /// Adds every definition whose name is not in the catalog yet. Returns how
    /// many were added; seeding twice is a no-op.
    pub fn seed(&mut self, defs: impl IntoIterator<Item = AchievementDef>) -> usize {
        let mut added = 0;
        for def in defs {
            if self.entries.iter().any(|a| a.name == def.name) {
                continue;
            }
            let id = self.entries.iter().map(|a| a.id).max().unwrap_or(0) + 1;
            self.entries.push(Achievement {
                id,
                name: def.name,
                description: def.description,
                icon: def.icon,
                category: def.category,
                requirement_type: def.requirement_type,
                requirement_value: def.requirement_value,
                points: def.points,
                rarity: def.rarity,
                is_active: def.is_active,
            });
            added += 1;
        }
        added
    }

    pub fn get(&self, id: u32) -> Option<&Achievement> {
        self.entries.iter().find(|a| a.id == id)
    }

    pub fn active(&self) -> impl Iterator<Item = &Achievement> {
        self.entries.iter().filter(|a| a.is_active)
    }

    pub fn by_category(&self) -> BTreeMap<String, Vec<Achievement>> {
        let mut grouped: BTreeMap<String, Vec<Achievement>> = BTreeMap::new();
        for a in self.active() {
            grouped.entry(a.category.clone()).or_default().push(a.clone());
        }
        grouped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Aggregates an achievement threshold can be measured against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Metrics {
    pub exercises_completed: f64,
    pub streak_days: f64,
    pub total_points: f64,
    pub study_time_hours: f64,
}

impl Metrics {
    pub fn of(ledger: &StudentLedger) -> Self {
        Self {
            exercises_completed: ledger.total_exercises() as f64,
            streak_days: f64::from(ledger.streak.current_streak),
            total_points: ledger.points.total_points as f64,
            study_time_hours: ledger.total_minutes() as f64 / 60.0,
        }
    }

    pub fn value(&self, requirement: RequirementType) -> f64 {
        match requirement {
            RequirementType::ExercisesCompleted => self.exercises_completed,
            RequirementType::StreakDays => self.streak_days,
            RequirementType::TotalPoints => self.total_points,
            RequirementType::StudyTimeHours => self.study_time_hours,
        }
    }
}

/// Percentage toward `requirement`, clamped to 100.
pub fn progress_toward(current: f64, requirement: f64) -> f64 {
    if requirement <= 0.0 {
        return 100.0;
    }
    (current / requirement * 100.0).min(100.0)
}

/// Re-evaluates every active, not yet earned achievement against `ledger` and
/// returns the ones unlocked by this call. Bonus points are credited to
/// `ledger.points`.
pub fn check_achievements(catalog: &Catalog, ledger: &mut StudentLedger, now: DateTime<Utc>) -> Vec<Achievement> {
    let mut unlocked = Vec::new();
    for pass in 0..=catalog.len() {
        let newly = evaluate_pass(catalog, ledger, now);
        if newly.is_empty() {
            break;
        }
        debug!(target: "gamification", student_id = ledger.student_id, pass, count = newly.len(), "Achievement pass unlocked entries");
        unlocked.extend(newly);
    }
    unlocked
}

fn evaluate_pass(catalog: &Catalog, ledger: &mut StudentLedger, now: DateTime<Utc>) -> Vec<Achievement> {
    let today = now.date_naive();
    let student_id = ledger.student_id;
    let mut newly = Vec::new();

    for achievement in catalog.active() {
        if ledger.achievements.get(&achievement.id).is_some_and(StudentAchievement::is_earned) {
            continue;
        }

        // Recomputed per entry: a bonus credited earlier in this pass counts.
        let current = Metrics::of(ledger).value(achievement.requirement_type);
        let requirement = f64::from(achievement.requirement_value);
        let progress = progress_toward(current, requirement);
        let earned = current >= requirement;

        let entry = ledger
            .achievements
            .entry(achievement.id)
            .or_insert_with(|| StudentAchievement {
                student_id,
                achievement_id: achievement.id,
                earned_at: None,
                progress,
            });
        entry.progress = progress;

        if earned && entry.earned_at.is_none() {
            entry.earned_at = Some(now);
            info!(target: "gamification", student_id, achievement = %achievement.name, bonus = achievement.points, "Achievement unlocked");
            ledger.points.add_points(achievement.points, "achievement", today);
            newly.push(achievement.clone());
        }
    }
    newly
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StudentProgressRecord;
    use crate::seeds::default_achievements;
    use chrono::{Duration, NaiveDate};

    fn def(name: &str, requirement_type: RequirementType, requirement_value: u32, points: u32) -> AchievementDef {
        AchievementDef {
            name: name.into(),
            description: format!("{} description", name),
            icon: default_icon(),
            category: "test".into(),
            requirement_type,
            requirement_value,
            points,
            rarity: Rarity::Common,
            is_active: true,
        }
    }

    fn now() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2024, 4, 10).unwrap().and_hms_opt(12, 0, 0).unwrap().and_utc()
    }

    fn ledger_with_exercises(exercises: u32, minutes: u32) -> StudentLedger {
        let mut ledger = StudentLedger::new(1);
        let mut rec = StudentProgressRecord::new(1, "math", "fractions", now());
        rec.exercises_completed = exercises;
        rec.time_spent_minutes = minutes;
        ledger.progress.insert(("math".into(), "fractions".into()), rec);
        ledger
    }

    #[test]
    fn test_seed_is_idempotent_by_name() {
        let mut catalog = Catalog::default();
        assert_eq!(catalog.seed(default_achievements()), 10);
        assert_eq!(catalog.seed(default_achievements()), 0);
        assert_eq!(catalog.len(), 10);
        assert_eq!(catalog.get(1).map(|a| a.name.as_str()), Some("Primeiro Passo"));
        assert_eq!(catalog.by_category().get("streak").map(Vec::len), Some(3));
    }

    #[test]
    fn test_unlock_awards_bonus_once() {
        let mut catalog = Catalog::default();
        catalog.seed([def("first", RequirementType::ExercisesCompleted, 1, 10)]);
        let mut ledger = ledger_with_exercises(1, 0);

        let unlocked = check_achievements(&catalog, &mut ledger, now());
        assert_eq!(unlocked.len(), 1);
        assert_eq!(ledger.points.total_points, 10);

        let again = check_achievements(&catalog, &mut ledger, now() + Duration::minutes(5));
        assert!(again.is_empty());
        assert_eq!(ledger.points.total_points, 10);
        assert_eq!(ledger.achievements[&1].earned_at, Some(now()));
    }

    #[test]
    fn test_progress_tracked_for_unearned() {
        let mut catalog = Catalog::default();
        catalog.seed([
            def("ten", RequirementType::ExercisesCompleted, 10, 30),
            def("hours", RequirementType::StudyTimeHours, 10, 75),
        ]);
        let mut ledger = ledger_with_exercises(4, 150);

        assert!(check_achievements(&catalog, &mut ledger, now()).is_empty());
        assert_eq!(ledger.achievements[&1].progress, 40.0);
        assert_eq!(ledger.achievements[&2].progress, 25.0);
        assert!(!ledger.achievements[&1].is_earned());

        // Corrected aggregates move progress down as well.
        ledger.progress.values_mut().for_each(|p| p.exercises_completed = 2);
        check_achievements(&catalog, &mut ledger, now());
        assert_eq!(ledger.achievements[&1].progress, 20.0);
    }

    #[test]
    fn test_earned_is_never_revoked() {
        let mut catalog = Catalog::default();
        catalog.seed([def("first", RequirementType::ExercisesCompleted, 1, 10)]);
        let mut ledger = ledger_with_exercises(1, 0);
        check_achievements(&catalog, &mut ledger, now());

        ledger.progress.clear();
        let unlocked = check_achievements(&catalog, &mut ledger, now() + Duration::days(1));
        assert!(unlocked.is_empty());
        assert_eq!(ledger.achievements[&1].earned_at, Some(now()));
        assert_eq!(ledger.achievements[&1].progress, 100.0);
    }

    #[test]
    fn test_bonus_chain_reaches_fixed_point() {
        let mut catalog = Catalog::default();
        // Listed first, so the first pass sees only 0 points.
        catalog.seed([
            def("hundred points", RequirementType::TotalPoints, 100, 5),
            def("first", RequirementType::ExercisesCompleted, 1, 100),
        ]);
        let mut ledger = ledger_with_exercises(1, 0);

        let unlocked = check_achievements(&catalog, &mut ledger, now());
        let names: Vec<_> = unlocked.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["first", "hundred points"]);
        assert_eq!(ledger.points.total_points, 105);
        assert!(check_achievements(&catalog, &mut ledger, now()).is_empty());
    }

    #[test]
    fn test_inactive_entries_are_skipped() {
        let mut catalog = Catalog::default();
        let mut retired = def("retired", RequirementType::ExercisesCompleted, 1, 10);
        retired.is_active = false;
        catalog.seed([retired]);
        let mut ledger = ledger_with_exercises(5, 0);
        assert!(check_achievements(&catalog, &mut ledger, now()).is_empty());
        assert!(ledger.achievements.is_empty());
    }

    #[test]
    fn test_streak_metric() {
        let mut catalog = Catalog::default();
        catalog.seed([def("three days", RequirementType::StreakDays, 3, 25)]);
        let mut ledger = StudentLedger::new(1);
        let start = now().date_naive();
        for offset in 0..3 {
            ledger.streak.update(start + Duration::days(offset));
        }
        let unlocked = check_achievements(&catalog, &mut ledger, now());
        assert_eq!(unlocked.len(), 1);
    }
}
