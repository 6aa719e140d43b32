//! Activity scoring and the shape of recorded activities.
//!
//! `score_activity` is pure and used both by the recorder and by the
//! `/score` endpoint, so clients can preview what an activity is worth.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{ActivityLog, ActivityMetadata, ActivityType, Difficulty, StudentId};
use crate::error::{CoreError, CoreResult};

/// Time spent beyond this many minutes earns no further bonus.
const FULL_TIME_BONUS_MINUTES: f64 = 30.0;
const MAX_TIME_BONUS: f64 = 0.5;

/// Success rates are percentages; anything outside [0, 100] or non-finite is rejected.
pub fn check_success_rate(success_rate: f64) -> CoreResult<()> {
    if success_rate.is_finite() && (0.0..=100.0).contains(&success_rate) {
        Ok(())
    } else {
        Err(CoreError::invalid("success_rate must be between 0 and 100"))
    }
}

/// `base * difficulty * success_rate/100 * (1 + min(time/30, 0.5))`, floored.
pub fn score_activity(
    activity_type: ActivityType,
    success_rate: f64,
    time_spent_minutes: u32,
    difficulty: Difficulty,
) -> u32 {
    let mut points = activity_type.base_points() * difficulty.multiplier() * (success_rate / 100.0);
    if time_spent_minutes > 0 {
        let bonus = (f64::from(time_spent_minutes) / FULL_TIME_BONUS_MINUTES).min(MAX_TIME_BONUS);
        points *= 1.0 + bonus;
    }
    if points.is_finite() && points > 0.0 {
        points.floor() as u32
    } else {
        0
    }
}

/// An activity as reported by a caller, already validated.
#[derive(Clone, Debug)]
pub struct Activity {
    pub student_id: StudentId,
    pub activity_type: ActivityType,
    pub subject: String,
    pub topic: String,
    pub success_rate: f64,
    pub time_spent_minutes: u32,
    pub difficulty: Difficulty,
    pub metadata: ActivityMetadata,
}

impl Activity {
    pub fn points(&self) -> u32 {
        score_activity(self.activity_type, self.success_rate, self.time_spent_minutes, self.difficulty)
    }

    /// Freezes the activity into its log entry.
    pub fn record(self, now: DateTime<Utc>) -> ActivityLog {
        let points_earned = self.points();
        ActivityLog {
            id: Uuid::new_v4(),
            student_id: self.student_id,
            activity_type: self.activity_type,
            subject: self.subject,
            topic: self.topic,
            points_earned,
            time_spent_minutes: self.time_spent_minutes,
            success_rate: self.success_rate,
            metadata: self.metadata,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MetadataValue;

    #[test]
    fn test_success_rate_bounds() {
        assert!(check_success_rate(0.0).is_ok());
        assert!(check_success_rate(100.0).is_ok());
        for bad in [150.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(check_success_rate(bad), Err(CoreError::InvalidInput(_))));
        }
    }

    #[test]
    fn test_problem_of_day_hard_full_time() {
        assert_eq!(score_activity(ActivityType::ProblemOfDay, 100.0, 30, Difficulty::Hard), 60);
    }

    #[test]
    fn test_time_bonus_caps_at_half() {
        assert_eq!(score_activity(ActivityType::Exercise, 100.0, 0, Difficulty::Easy), 10);
        assert_eq!(score_activity(ActivityType::Exercise, 100.0, 15, Difficulty::Easy), 15);
        assert_eq!(score_activity(ActivityType::Exercise, 100.0, 300, Difficulty::Easy), 15);
    }

    #[test]
    fn test_partial_success_floors() {
        // 25 * 1.5 * 0.7 = 26.25
        assert_eq!(score_activity(ActivityType::Experiment, 70.0, 0, Difficulty::Intermediate), 26);
        assert_eq!(score_activity(ActivityType::Chat, 0.0, 10, Difficulty::Hard), 0);
        assert_eq!(score_activity(ActivityType::Other, 100.0, 0, Difficulty::Easy), 5);
    }

    #[test]
    fn test_record_carries_points_and_metadata() {
        let now = Utc::now();
        let activity = Activity {
            student_id: 3,
            activity_type: ActivityType::SingaporeMethod,
            subject: "mathematics".into(),
            topic: "bar models".into(),
            success_rate: 80.0,
            time_spent_minutes: 6,
            difficulty: Difficulty::Easy,
            metadata: ActivityMetadata::default().with("attempts", MetadataValue::Number(2.0)),
        };
        let log = activity.record(now);
        // 15 * 1.0 * 0.8 * 1.2 = 14.4
        assert_eq!(log.points_earned, 14);
        assert_eq!(log.created_at, now);
        assert_eq!(log.metadata.fields.len(), 1);
    }
}
