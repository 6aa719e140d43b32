//! Problem of the day: deterministic daily pick, answer evaluation, rotating
//! hints and submission stats, all behind the problem cache.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::cache::{self, CacheStats, TtlCache};
use crate::clock::SharedClock;
use crate::config::CacheConfig;
use crate::domain::{round1, Difficulty, StudentId};
use crate::error::{CoreError, CoreResult};
use crate::seeds;
use crate::util::round2;

const MIN_ANSWER_CHARS: usize = 10;
const DEFAULT_HINT: &str = "Pense no problema passo a passo. Que informações você tem disponíveis?";

/// Bank entry as written in seeds or TOML.
#[derive(Clone, Debug, Deserialize)]
pub struct ProblemDef {
  pub title: String,
  pub description: String,
  pub category: String,
  #[serde(default = "default_difficulty")]
  pub difficulty: Difficulty,
  #[serde(default)]
  pub expected_answer: String,
  #[serde(default)]
  pub hints: Vec<String>,
  #[serde(default)]
  pub resources: Vec<String>,
  #[serde(default = "default_true")]
  pub is_active: bool,
}

fn default_difficulty() -> Difficulty {
  Difficulty::Intermediate
}
fn default_true() -> bool {
  true
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Problem {
  pub id: u32,
  pub title: String,
  pub description: String,
  pub category: String,
  pub difficulty: Difficulty,
  #[serde(skip_serializing)]
  pub expected_answer: String,
  #[serde(skip_serializing)]
  pub hints: Vec<String>,
  pub resources: Vec<String>,
  pub is_active: bool,
}

/// Today's problem as shown to students.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ProblemOfDay {
  #[serde(flatten)]
  pub problem: Problem,
  pub estimated_time: String,
  pub difficulty_level: &'static str,
}

#[derive(Clone, Debug, Serialize)]
pub struct Submission {
  pub id: Uuid,
  pub student_id: StudentId,
  pub problem_id: u32,
  pub answer: String,
  pub time_spent_seconds: u32,
  pub is_correct: bool,
  pub confidence: f64,
  pub feedback: String,
  pub submitted_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct SubmissionOutcome {
  pub submission_id: Uuid,
  pub problem_id: u32,
  pub category: String,
  pub difficulty: Difficulty,
  pub is_correct: bool,
  pub confidence: f64,
  pub feedback: &'static str,
  pub points_earned: u32,
  pub next_suggestion: &'static str,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ProblemStats {
  pub total_problems: usize,
  pub total_submissions: usize,
  pub success_rate: f64,
  pub average_confidence: f64,
  pub last_submission_at: Option<DateTime<Utc>>,
  pub cached_items: usize,
  pub cache: CacheStats,
}

#[derive(Clone)]
enum Cached {
  Today(ProblemOfDay),
  Problem(Problem),
  Hint(String),
  Stats(ProblemStats),
}

// -------- Pure scoring helpers --------

struct KeywordGroup {
  terms: &'static [&'static str],
}

const FINANCE_GROUPS: [KeywordGroup; 3] = [
  // calculations
  KeywordGroup { terms: &["900", "450", "1350", "800", "550"] },
  // concepts
  KeywordGroup { terms: &["deficit", "sobra", "economizar", "cortar", "ajuste", "reduzir"] },
  // solutions
  KeywordGroup { terms: &["lazer", "transporte", "alimentação", "plano", "orçamento"] },
];

/// Returns (is_correct, confidence in [0, 1] with two decimals).
pub fn evaluate_answer(category: &str, answer: &str) -> (bool, f64) {
  if category == "personal_finance" {
    let lowered = answer.to_lowercase();
    let score = FINANCE_GROUPS
      .iter()
      .map(|g| g.terms.iter().filter(|t| lowered.contains(*t)).count() as f64 / g.terms.len() as f64)
      .sum::<f64>()
      / FINANCE_GROUPS.len() as f64;
    return (score >= 0.4, round2((score * 2.0).min(1.0)));
  }
  let words = answer.split_whitespace().count();
  (words >= 20, round2((words as f64 / 50.0).min(1.0)))
}

pub fn feedback(is_correct: bool, confidence: f64) -> &'static str {
  match (is_correct, confidence) {
    (true, c) if c > 0.8 => "🎉 Excelente! Sua análise está muito completa e demonstra ótima compreensão dos conceitos financeiros.",
    (true, c) if c > 0.6 => "👏 Muito bem! Você captou os pontos principais. Sua abordagem está correta.",
    (true, _) => "✅ Bom trabalho! Você está no caminho certo, mas pode detalhar mais alguns aspectos.",
    (false, c) if c > 0.3 => "🤔 Boa tentativa! Você tocou em alguns pontos importantes, mas considere revisar os cálculos e usar as dicas.",
    (false, _) => "💡 Continue tentando! Que tal começar calculando quanto a família gasta atualmente? Use as dicas para te guiar.",
  }
}

fn next_suggestion(is_correct: bool) -> &'static str {
  if is_correct {
    "🚀 Parabéns! Que tal tentar um problema mais desafiador amanhã?"
  } else {
    "📚 Revise os conceitos de orçamento familiar e tente novamente!"
  }
}

/// 10 for taking part; a correct answer earns 100 plus confidence and speed bonuses.
pub fn submission_points(is_correct: bool, time_spent_seconds: u32, confidence: f64) -> u32 {
  if !is_correct {
    return 10;
  }
  let confidence_bonus = (confidence * 50.0).floor().max(0.0) as u32;
  let speed_bonus = if time_spent_seconds < 600 { 30u32.saturating_sub(time_spent_seconds / 60) } else { 0 };
  100 + confidence_bonus + speed_bonus
}

pub fn estimated_time(problem: &Problem) -> String {
  let mut base = match problem.difficulty {
    Difficulty::Easy => 5,
    Difficulty::Intermediate => 10,
    Difficulty::Hard => 20,
  };
  if problem.description.chars().count() > 500 {
    base += 5;
  }
  format!("{}-{} minutos", base, base + 5)
}

fn day_seed(day: NaiveDate) -> u64 {
  day.year() as u64 * 10_000 + u64::from(day.month()) * 100 + u64::from(day.day())
}

// -------- Desk --------

pub struct ProblemDesk {
  problems: Vec<Problem>,
  submissions: Vec<Submission>,
  cache: TtlCache<Cached>,
  today_ttl: Duration,
  problem_ttl: Duration,
  stats_ttl: Duration,
  clock: SharedClock,
}

impl ProblemDesk {
  /// The built-in sample problem always takes id 1; `extra` follows in order.
  pub fn new(extra: Vec<ProblemDef>, cfg: &CacheConfig, clock: SharedClock) -> Self {
    let problems = std::iter::once(seeds::sample_problem())
      .chain(extra)
      .enumerate()
      .map(|(i, def)| Problem {
        id: i as u32 + 1,
        title: def.title,
        description: def.description,
        category: def.category,
        difficulty: def.difficulty,
        expected_answer: def.expected_answer,
        hints: def.hints,
        resources: def.resources,
        is_active: def.is_active,
      })
      .collect::<Vec<_>>();
    info!(target: "problem", count = problems.len(), "Problem bank loaded");

    Self {
      problems,
      submissions: Vec::new(),
      cache: TtlCache::new("problem", cfg.problem_capacity, clock.clone()),
      today_ttl: Duration::seconds(cfg.problem_of_day_ttl_secs),
      problem_ttl: Duration::seconds(cfg.problem_data_ttl_secs),
      stats_ttl: Duration::seconds(cfg.stats_ttl_secs),
      clock,
    }
  }

  /// Today's problem and whether it came from the cache.
  #[instrument(level = "info", skip(self))]
  pub fn problem_of_day(&mut self) -> CoreResult<(ProblemOfDay, bool)> {
    let today = self.clock.today();
    let key = cache::problem_of_day_key(today);
    if let Some(Cached::Today(p)) = self.cache.get(&key, self.today_ttl) {
      return Ok((p, true));
    }

    let active: Vec<&Problem> = self.problems.iter().filter(|p| p.is_active).collect();
    let mut rng = StdRng::seed_from_u64(day_seed(today));
    let chosen = active.choose(&mut rng).copied().cloned();
    let problem = match chosen {
      Some(p) => p,
      None => {
        warn!(target: "problem", "No active problem in the bank");
        return Err(CoreError::not_found("active problem", today));
      }
    };

    let today_problem = ProblemOfDay {
      estimated_time: estimated_time(&problem),
      difficulty_level: problem.difficulty.label(),
      problem,
    };
    info!(target: "problem", %today, id = today_problem.problem.id, "Problem of the day selected");
    self.cache.put(key, Cached::Today(today_problem.clone()));
    Ok((today_problem, false))
  }

  fn problem(&mut self, problem_id: u32) -> CoreResult<Problem> {
    let key = cache::problem_key(problem_id);
    if let Some(Cached::Problem(p)) = self.cache.get(&key, self.problem_ttl) {
      return Ok(p);
    }
    let problem = self
      .problems
      .iter()
      .find(|p| p.id == problem_id)
      .cloned()
      .ok_or_else(|| CoreError::not_found("problem", problem_id))?;
    self.cache.put(key, Cached::Problem(problem.clone()));
    Ok(problem)
  }

  #[instrument(level = "info", skip(self, answer), fields(answer_len = answer.len()))]
  pub fn submit(
    &mut self,
    problem_id: u32,
    student_id: StudentId,
    answer: &str,
    time_spent_seconds: u32,
  ) -> CoreResult<SubmissionOutcome> {
    let answer = answer.trim();
    if answer.is_empty() {
      return Err(CoreError::invalid("Resposta não pode estar vazia"));
    }
    if answer.chars().count() < MIN_ANSWER_CHARS {
      return Err(CoreError::invalid("Resposta muito curta. Mínimo 10 caracteres."));
    }

    let problem = self.problem(problem_id)?;
    let (is_correct, confidence) = evaluate_answer(&problem.category, answer);
    let feedback = feedback(is_correct, confidence);
    let submission = Submission {
      id: Uuid::new_v4(),
      student_id,
      problem_id,
      answer: answer.to_string(),
      time_spent_seconds,
      is_correct,
      confidence,
      feedback: feedback.to_string(),
      submitted_at: self.clock.now(),
    };
    let outcome = SubmissionOutcome {
      submission_id: submission.id,
      problem_id,
      category: problem.category,
      difficulty: problem.difficulty,
      is_correct,
      confidence,
      feedback,
      points_earned: submission_points(is_correct, time_spent_seconds, confidence),
      next_suggestion: next_suggestion(is_correct),
    };
    self.submissions.push(submission);
    info!(target: "problem", problem_id, student_id, is_correct, confidence, "Answer submitted");
    Ok(outcome)
  }

  /// Hint rotating every five minutes; cached per problem.
  pub fn hint(&mut self, problem_id: u32) -> CoreResult<(String, bool)> {
    let key = cache::hint_key(problem_id);
    if let Some(Cached::Hint(h)) = self.cache.get(&key, self.problem_ttl) {
      return Ok((h, true));
    }
    let problem = self
      .problems
      .iter()
      .find(|p| p.id == problem_id)
      .ok_or_else(|| CoreError::not_found("problem", problem_id))?;

    let hint = if problem.hints.is_empty() {
      DEFAULT_HINT.to_string()
    } else {
      let slot = self.clock.now().timestamp().max(0) as u64 / 300;
      problem.hints[(slot % problem.hints.len() as u64) as usize].clone()
    };
    self.cache.put(key, Cached::Hint(hint.clone()));
    Ok((hint, false))
  }

  pub fn stats(&mut self) -> (ProblemStats, bool) {
    if let Some(Cached::Stats(s)) = self.cache.get(cache::PROBLEM_STATS_KEY, self.stats_ttl) {
      return (s, true);
    }
    let total_submissions = self.submissions.len();
    let correct = self.submissions.iter().filter(|s| s.is_correct).count();
    let success_rate = if total_submissions == 0 { 0.0 } else { correct as f64 / total_submissions as f64 * 100.0 };
    let confidence_sum: f64 = self.submissions.iter().map(|s| s.confidence).sum();
    let average_confidence = if total_submissions == 0 { 0.0 } else { confidence_sum / total_submissions as f64 };
    let stats = ProblemStats {
      total_problems: self.problems.iter().filter(|p| p.is_active).count(),
      total_submissions,
      success_rate: round1(success_rate),
      average_confidence: round2(average_confidence),
      last_submission_at: self.submissions.iter().map(|s| s.submitted_at).max(),
      cached_items: self.cache.len(),
      cache: self.cache.stats(),
    };
    self.cache.put(cache::PROBLEM_STATS_KEY, Cached::Stats(stats.clone()));
    (stats, false)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::{Clock, ManualClock};
  use std::sync::Arc;

  fn extra(title: &str, category: &str) -> ProblemDef {
    ProblemDef {
      title: title.into(),
      description: "Explique com suas palavras.".into(),
      category: category.into(),
      difficulty: Difficulty::Easy,
      expected_answer: String::new(),
      hints: Vec::new(),
      resources: Vec::new(),
      is_active: true,
    }
  }

  fn desk(extra: Vec<ProblemDef>) -> (ProblemDesk, ManualClock) {
    let clock = ManualClock::at_date(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
    (ProblemDesk::new(extra, &CacheConfig::default(), Arc::new(clock.clone())), clock)
  }

  #[test]
  fn test_finance_answer_evaluation() {
    let full = "Sobra 800, mas precisamos de 900 + 450 = 1350, deficit de 550. \
      Plano: reduzir lazer, cortar transporte e ajustar alimentação no orçamento.";
    let (ok, confidence) = evaluate_answer("personal_finance", full);
    assert!(ok);
    assert_eq!(confidence, 1.0);

    let (ok, confidence) = evaluate_answer("personal_finance", "acho que eles deveriam gastar menos");
    assert!(!ok);
    assert_eq!(confidence, 0.0);
  }

  #[test]
  fn test_other_categories_count_words() {
    let answer = vec!["palavra"; 25].join(" ");
    assert_eq!(evaluate_answer("science", &answer), (true, 0.5));
    assert_eq!(evaluate_answer("science", "poucas palavras aqui"), (false, 0.06));
  }

  #[test]
  fn test_submission_points() {
    assert_eq!(submission_points(false, 30, 0.9), 10);
    assert_eq!(submission_points(true, 120, 1.0), 100 + 50 + 28);
    assert_eq!(submission_points(true, 600, 0.5), 125);
  }

  #[test]
  fn test_feedback_tiers() {
    assert!(feedback(true, 0.9).starts_with("🎉"));
    assert!(feedback(true, 0.7).starts_with("👏"));
    assert!(feedback(true, 0.5).starts_with("✅"));
    assert!(feedback(false, 0.4).starts_with("🤔"));
    assert!(feedback(false, 0.1).starts_with("💡"));
  }

  #[test]
  fn test_problem_of_day_is_stable_and_cached() {
    let (mut d, clock) = desk(vec![extra("A", "science"), extra("B", "history"), extra("C", "math")]);
    let (first, cached) = d.problem_of_day().unwrap();
    assert!(!cached);
    assert!(d.problem_of_day().unwrap().1);

    // after the cache expires the same day still yields the same pick
    clock.advance(Duration::seconds(3600));
    let (again, cached) = d.problem_of_day().unwrap();
    assert!(!cached);
    assert_eq!(again.problem.id, first.problem.id);
  }

  #[test]
  fn test_sample_problem_decoration() {
    let (mut d, _clock) = desk(Vec::new());
    let (p, _) = d.problem_of_day().unwrap();
    assert_eq!(p.problem.id, 1);
    assert_eq!(p.problem.category, "personal_finance");
    assert_eq!(p.difficulty_level, Difficulty::Intermediate.label());
    assert!(p.estimated_time.starts_with("10-15") || p.estimated_time.starts_with("15-20"));
    assert_eq!(day_seed(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()), 20240615);
  }

  #[test]
  fn test_submit_validation() {
    let (mut d, _clock) = desk(Vec::new());
    assert!(matches!(d.submit(1, 1, "   ", 0), Err(CoreError::InvalidInput(_))));
    assert!(matches!(d.submit(1, 1, "curta", 0), Err(CoreError::InvalidInput(_))));
    assert!(matches!(d.submit(99, 1, "resposta longa o suficiente", 0), Err(CoreError::NotFound(_))));
    assert_eq!(d.stats().0.total_submissions, 0);
  }

  #[test]
  fn test_submit_and_stats() {
    let (mut d, clock) = desk(Vec::new());
    let outcome = d.submit(1, 7, "Sobra 800, falta 550: reduzir lazer e fazer um plano de orçamento", 240).unwrap();
    assert!(outcome.is_correct);
    assert_eq!(outcome.category, "personal_finance");

    let (stats, cached) = d.stats();
    assert!(!cached);
    assert_eq!(stats.total_submissions, 1);
    assert_eq!(stats.success_rate, 100.0);
    assert_eq!(stats.average_confidence, outcome.confidence);
    assert_eq!(stats.last_submission_at, Some(clock.now()));
    assert_eq!(d.submissions[0].confidence, outcome.confidence);
    assert_eq!(d.submissions[0].submitted_at, clock.now());

    d.submit(1, 8, "não sei muito bem como fazer isso", 60).unwrap();
    // cached snapshot until the stats TTL passes
    assert_eq!(d.stats().0.total_submissions, 1);
    clock.advance(Duration::seconds(600));
    let (stats, _) = d.stats();
    assert_eq!(stats.total_submissions, 2);
    assert_eq!(stats.success_rate, 50.0);
    assert_eq!(stats.last_submission_at, Some(d.submissions[1].submitted_at));
  }

  #[test]
  fn test_hint_rotation_and_default() {
    let (mut d, _clock) = desk(vec![extra("sem dicas", "math")]);
    let (hint, cached) = d.hint(1).unwrap();
    assert!(!cached);
    assert!(seeds::sample_problem().hints.contains(&hint));
    assert_eq!(d.hint(1).unwrap(), (hint, true));
    assert_eq!(d.hint(2).unwrap().0, DEFAULT_HINT);
    assert!(matches!(d.hint(42), Err(CoreError::NotFound(_))));
  }
}
