//! Points ledger: lifetime totals, weekly/monthly windows and the derived level.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::StudentId;

pub const XP_PER_LEVEL: u64 = 100;

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct StudentPoints {
    pub student_id: StudentId,
    pub total_points: u64,
    pub points_this_week: u64,
    pub points_this_month: u64,
    pub level: u32,
    pub experience_points: u64,
    pub week_start: Option<NaiveDate>,
    pub month_start: Option<NaiveDate>,
}

/// Serialized view including the derived progress fields.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct PointsView {
    #[serde(flatten)]
    pub points: StudentPoints,
    pub level_progress: f64,
    pub points_to_next_level: u64,
}

impl StudentPoints {
    pub fn new(student_id: StudentId) -> Self {
        Self {
            student_id,
            total_points: 0,
            points_this_week: 0,
            points_this_month: 0,
            level: 1,
            experience_points: 0,
            week_start: None,
            month_start: None,
        }
    }

    /// Credits `amount`. A window that has rolled over restarts at `amount`;
    /// the previous window's total is discarded. Returns true on level-up.
    pub fn add_points(&mut self, amount: u32, source: &str, today: NaiveDate) -> bool {
        let amount = u64::from(amount);
        self.total_points += amount;
        self.experience_points += amount;

        let week_expired = match self.week_start {
            None => true,
            Some(start) => today >= start + Duration::days(7),
        };
        if week_expired {
            self.week_start = Some(monday_of(today));
            self.points_this_week = amount;
        } else {
            self.points_this_week += amount;
        }

        let month_changed = match self.month_start {
            None => true,
            Some(start) => (start.year(), start.month()) != (today.year(), today.month()),
        };
        if month_changed {
            self.month_start = today.with_day(1);
            self.points_this_month = amount;
        } else {
            self.points_this_month += amount;
        }

        let new_level = level_for(self.experience_points);
        let leveled_up = new_level > self.level;
        if leveled_up {
            info!(target: "gamification", student_id = self.student_id, from = self.level, to = new_level, "Level up");
            self.level = new_level;
        }
        debug!(target: "gamification", student_id = self.student_id, amount, %source, total = self.total_points, "Points credited");
        leveled_up
    }

    /// Percentage toward the next level, clamped to 100.
    pub fn level_progress(&self) -> f64 {
        let floor = u64::from(self.level - 1) * XP_PER_LEVEL;
        let into_level = self.experience_points.saturating_sub(floor) as f64;
        (into_level * 100.0 / XP_PER_LEVEL as f64).min(100.0)
    }

    pub fn points_to_next_level(&self) -> u64 {
        (u64::from(self.level) * XP_PER_LEVEL).saturating_sub(self.experience_points)
    }

    pub fn view(&self) -> PointsView {
        PointsView {
            points: self.clone(),
            level_progress: self.level_progress(),
            points_to_next_level: self.points_to_next_level(),
        }
    }
}

pub fn level_for(experience_points: u64) -> u32 {
    u32::try_from(experience_points / XP_PER_LEVEL + 1).unwrap_or(u32::MAX)
}

fn monday_of(day: NaiveDate) -> NaiveDate {
    day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_same_week_accumulates() {
        let mut p = StudentPoints::new(1);
        p.add_points(50, "exercise", d(2024, 1, 3));
        p.add_points(50, "exercise", d(2024, 1, 5));
        assert_eq!(p.points_this_week, 100);
        assert_eq!(p.week_start, Some(d(2024, 1, 1)));
    }

    #[test]
    fn test_week_rollover_discards_previous_week() {
        let mut p = StudentPoints::new(1);
        p.add_points(50, "exercise", d(2024, 1, 3));
        p.add_points(50, "exercise", d(2024, 1, 8));
        assert_eq!(p.points_this_week, 50);
        assert_eq!(p.week_start, Some(d(2024, 1, 8)));
        assert_eq!(p.total_points, 100);
    }

    #[test]
    fn test_month_rollover() {
        let mut p = StudentPoints::new(1);
        p.add_points(30, "chat", d(2024, 1, 30));
        p.add_points(20, "chat", d(2024, 1, 31));
        assert_eq!(p.points_this_month, 50);
        p.add_points(5, "chat", d(2024, 2, 1));
        assert_eq!(p.points_this_month, 5);
        assert_eq!(p.month_start, Some(d(2024, 2, 1)));
        // Same month number a year later still rolls over.
        p.add_points(7, "chat", d(2025, 2, 3));
        assert_eq!(p.points_this_month, 7);
    }

    #[test]
    fn test_level_derivation_and_progress() {
        let mut p = StudentPoints::new(1);
        let today = d(2024, 6, 3);
        assert!(!p.add_points(99, "exercise", today));
        assert_eq!(p.level, 1);
        assert_eq!(p.level_progress(), 99.0);
        assert_eq!(p.points_to_next_level(), 1);

        assert!(p.add_points(151, "exercise", today));
        assert_eq!(p.level, 3);
        assert_eq!(p.level_progress(), 50.0);
        assert_eq!(p.points_to_next_level(), 50);
    }

    #[test]
    fn test_level_never_decreases() {
        let mut p = StudentPoints::new(1);
        let mut last = p.level;
        for (i, amount) in [0u32, 7, 93, 1, 250, 0, 49, 1000].into_iter().enumerate() {
            p.add_points(amount, "exercise", d(2024, 3, 1 + i as u32));
            assert!(p.level >= last);
            assert_eq!(p.level, level_for(p.experience_points));
            last = p.level;
        }
    }

    #[test]
    fn test_view_serializes_flat() {
        let mut p = StudentPoints::new(4);
        p.add_points(120, "exercise", d(2024, 6, 3));
        let v = serde_json::to_value(p.view()).unwrap();
        assert_eq!(v["total_points"], 120);
        assert_eq!(v["level"], 2);
        assert_eq!(v["points_to_next_level"], 80);
    }
}
