//! Domain models: activity kinds, achievement catalog entries, per-student progress
//! rows and the append-only activity log.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

pub type StudentId = u32;

/// What the student did. Unknown kinds are accepted and scored as `Other`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
  #[default]
  Exercise,
  Chat,
  ProblemOfDay,
  SingaporeMethod,
  Experiment,
  #[serde(other)]
  Other,
}

impl ActivityType {
  pub fn base_points(self) -> f64 {
    match self {
      ActivityType::Exercise => 10.0,
      ActivityType::Chat => 5.0,
      ActivityType::ProblemOfDay => 20.0,
      ActivityType::SingaporeMethod => 15.0,
      ActivityType::Experiment => 25.0,
      ActivityType::Other => 5.0,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      ActivityType::Exercise => "exercise",
      ActivityType::Chat => "chat",
      ActivityType::ProblemOfDay => "problem_of_day",
      ActivityType::SingaporeMethod => "singapore_method",
      ActivityType::Experiment => "experiment",
      ActivityType::Other => "other",
    }
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  #[default]
  Easy,
  Intermediate,
  Hard,
}

impl Difficulty {
  pub fn multiplier(self) -> f64 {
    match self {
      Difficulty::Easy => 1.0,
      Difficulty::Intermediate => 1.5,
      Difficulty::Hard => 2.0,
    }
  }

  /// Friendly label shown next to a problem.
  pub fn label(self) -> &'static str {
    match self {
      Difficulty::Easy => "🟢 Fácil - Conceitos básicos",
      Difficulty::Intermediate => "🟡 Intermediário - Requer análise",
      Difficulty::Hard => "🔴 Difícil - Pensamento crítico",
    }
  }
}

/// Which aggregate an achievement threshold is measured against.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequirementType {
  ExercisesCompleted,
  StreakDays,
  TotalPoints,
  StudyTimeHours,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
  #[default]
  Common,
  Rare,
  Epic,
  Legendary,
}

/// Catalog entry. Reference data: created at startup, never mutated afterwards.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Achievement {
  pub id: u32,
  pub name: String,
  pub description: String,
  pub icon: String,
  pub category: String,
  pub requirement_type: RequirementType,
  pub requirement_value: u32,
  /// Bonus credited on unlock.
  pub points: u32,
  pub rarity: Rarity,
  pub is_active: bool,
}

/// A student's standing against one catalog entry.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct StudentAchievement {
  pub student_id: StudentId,
  pub achievement_id: u32,
  /// Unset until unlocked, immutable afterwards.
  pub earned_at: Option<DateTime<Utc>>,
  /// Percentage toward the threshold, recomputed on every evaluation.
  pub progress: f64,
}

impl StudentAchievement {
  pub fn is_earned(&self) -> bool {
    self.earned_at.is_some()
  }
}

/// Keyed by (student, subject, topic). Created on first report, never deleted.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct StudentProgressRecord {
  pub student_id: StudentId,
  pub subject: String,
  pub topic: String,
  pub progress_percentage: f64,
  pub time_spent_minutes: u32,
  pub exercises_completed: u32,
  pub exercises_correct: u32,
  pub last_activity: DateTime<Utc>,
}

impl StudentProgressRecord {
  pub fn new(student_id: StudentId, subject: &str, topic: &str, now: DateTime<Utc>) -> Self {
    Self {
      student_id,
      subject: subject.to_string(),
      topic: topic.to_string(),
      progress_percentage: 0.0,
      time_spent_minutes: 0,
      exercises_completed: 0,
      exercises_correct: 0,
      last_activity: now,
    }
  }
}

/// Value stored in activity metadata. Nested objects are not accepted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetadataValue {
  Flag(bool),
  Number(f64),
  Text(String),
}

pub const METADATA_SCHEMA_VERSION: u32 = 1;

/// Free-form per-activity details (e.g. `session_id`, `attempts`, `is_correct`),
/// versioned so readers can tell which keys to expect.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActivityMetadata {
  #[serde(default = "default_schema_version")] pub version: u32,
  #[serde(default)] pub fields: BTreeMap<String, MetadataValue>,
}

fn default_schema_version() -> u32 { METADATA_SCHEMA_VERSION }

impl Default for ActivityMetadata {
  fn default() -> Self {
    Self { version: METADATA_SCHEMA_VERSION, fields: BTreeMap::new() }
  }
}

impl ActivityMetadata {
  pub fn with(mut self, key: &str, value: MetadataValue) -> Self {
    self.fields.insert(key.to_string(), value);
    self
  }

  pub fn validate(&self) -> CoreResult<()> {
    if self.version != METADATA_SCHEMA_VERSION {
      return Err(CoreError::invalid(format!(
        "unsupported metadata version {} (expected {})",
        self.version, METADATA_SCHEMA_VERSION
      )));
    }
    if self.fields.keys().any(|k| k.trim().is_empty()) {
      return Err(CoreError::invalid("metadata keys must not be blank"));
    }
    Ok(())
  }
}

/// Immutable, append-only record of a scored activity.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ActivityLog {
  pub id: Uuid,
  pub student_id: StudentId,
  pub activity_type: ActivityType,
  pub subject: String,
  pub topic: String,
  pub points_earned: u32,
  pub time_spent_minutes: u32,
  pub success_rate: f64,
  pub metadata: ActivityMetadata,
  pub created_at: DateTime<Utc>,
}

/// Round to one decimal place, the precision used in every summary view.
pub fn round1(v: f64) -> f64 {
  (v * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_unknown_activity_type_parses_as_other() {
    let t: ActivityType = serde_json::from_str("\"quiz_show\"").unwrap();
    assert_eq!(t, ActivityType::Other);
    let t: ActivityType = serde_json::from_str("\"problem_of_day\"").unwrap();
    assert_eq!(t, ActivityType::ProblemOfDay);
  }

  #[test]
  fn test_metadata_shapes() {
    let m: ActivityMetadata =
      serde_json::from_str(r#"{"fields": {"session_id": "abc", "attempts": 3, "is_correct": true}}"#).unwrap();
    assert_eq!(m.version, METADATA_SCHEMA_VERSION);
    assert_eq!(m.fields.get("attempts"), Some(&MetadataValue::Number(3.0)));
    assert_eq!(m.fields.get("is_correct"), Some(&MetadataValue::Flag(true)));
    assert!(m.validate().is_ok());

    let nested = serde_json::from_str::<ActivityMetadata>(r#"{"fields": {"x": {"y": 1}}}"#);
    assert!(nested.is_err());

    let future = ActivityMetadata { version: 2, ..Default::default() };
    assert!(matches!(future.validate(), Err(CoreError::InvalidInput(_))));
  }
}
