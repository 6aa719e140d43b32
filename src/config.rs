//! Loading app configuration (cache tuning, achievement catalog, problem bank) from TOML.
//!
//! Every section is optional; an absent file means built-in defaults. Example:
//!
//! ```toml
//! [cache]
//! chat_response_ttl_secs = 120
//!
//! [[achievements]]
//! name = "Mestre"
//! description = "Complete 80 exercícios"
//! category = "progress"
//! requirement_type = "exercises_completed"
//! requirement_value = 80
//!
//! [[problems]]
//! title = "Horta da escola"
//! description = "..."
//! category = "science"
//! ```

use serde::Deserialize;
use tracing::{error, info};

use crate::achievements::AchievementDef;
use crate::problems::ProblemDef;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub cache: CacheConfig,
  /// Seeded before the built-in catalog, so an entry here replaces the
  /// default achievement of the same name.
  #[serde(default)]
  pub achievements: Vec<AchievementDef>,
  #[serde(default)]
  pub problems: Vec<ProblemDef>,
}

/// Capacities and TTLs of the problem and tutor caches.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
  pub problem_capacity: usize,
  pub tutor_capacity: usize,
  pub problem_of_day_ttl_secs: i64,
  /// Problem data and hints.
  pub problem_data_ttl_secs: i64,
  pub stats_ttl_secs: i64,
  pub chat_response_ttl_secs: i64,
  pub session_summary_ttl_secs: i64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      problem_capacity: 100,
      tutor_capacity: 200,
      problem_of_day_ttl_secs: 3600,
      problem_data_ttl_secs: 1800,
      stats_ttl_secs: 600,
      chat_response_ttl_secs: 300,
      session_summary_ttl_secs: 600,
    }
  }
}

pub fn parse_app_config(text: &str) -> Result<AppConfig, toml::de::Error> {
  toml::from_str::<AppConfig>(text)
}

/// Attempt to load `AppConfig` from CURIO_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_app_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("CURIO_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_app_config(&s) {
      Ok(cfg) => {
        info!(
          target: "curio_backend",
          %path,
          achievements = cfg.achievements.len(),
          problems = cfg.problems.len(),
          "Loaded app config (TOML)"
        );
        Some(cfg)
      }
      Err(e) => {
        error!(target: "curio_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "curio_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
