//! Consecutive-study-day tracking.

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::StudentId;

/// One per student, created lazily on the first activity.
/// Invariant: `longest_streak >= current_streak`.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct StudyStreak {
    pub student_id: StudentId,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_study_date: Option<NaiveDate>,
    pub total_study_days: u32,
}

impl StudyStreak {
    pub fn new(student_id: StudentId) -> Self {
        Self {
            student_id,
            current_streak: 0,
            longest_streak: 0,
            last_study_date: None,
            total_study_days: 0,
        }
    }

    /// Counts `today` as a study day. Returns `false` when nothing changed: the
    /// day was already counted, or `today` lies before the last counted day.
    pub fn update(&mut self, today: NaiveDate) -> bool {
        match self.last_study_date {
            None => {
                self.current_streak = 1;
                self.longest_streak = self.longest_streak.max(1);
                self.total_study_days = 1;
            }
            Some(last) if today <= last => return false,
            Some(last) if today.pred_opt() == Some(last) => {
                self.current_streak += 1;
                self.longest_streak = self.longest_streak.max(self.current_streak);
                self.total_study_days += 1;
            }
            Some(_) => {
                self.current_streak = 1;
                self.total_study_days += 1;
            }
        }
        self.last_study_date = Some(today);
        true
    }

    /// Whether the streak would still continue if the student studied `today`.
    pub fn is_alive(&self, today: NaiveDate) -> bool {
        match self.last_study_date {
            Some(last) => last == today || today.pred_opt() == Some(last),
            None => false,
        }
    }
}
