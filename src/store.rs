//! Persistence seam for the gamification core.
//!
//! The engine reads a student's whole ledger, mutates a copy and hands it back
//! through `commit` together with the activity entries produced by the same
//! request. A store must apply a commit entirely or not at all.

use std::collections::{BTreeMap, HashMap};

use crate::domain::{ActivityLog, StudentAchievement, StudentId, StudentProgressRecord};
use crate::error::CoreResult;
use crate::points::StudentPoints;
use crate::streak::StudyStreak;

/// Everything the gamification core keeps per student.
#[derive(Clone, Debug, PartialEq)]
pub struct StudentLedger {
    pub student_id: StudentId,
    pub streak: StudyStreak,
    pub points: StudentPoints,
    /// Keyed by (subject, topic).
    pub progress: BTreeMap<(String, String), StudentProgressRecord>,
    /// Keyed by achievement id.
    pub achievements: BTreeMap<u32, StudentAchievement>,
}

impl StudentLedger {
    pub fn new(student_id: StudentId) -> Self {
        Self {
            student_id,
            streak: StudyStreak::new(student_id),
            points: StudentPoints::new(student_id),
            progress: BTreeMap::new(),
            achievements: BTreeMap::new(),
        }
    }

    pub fn total_exercises(&self) -> u64 {
        self.progress.values().map(|p| u64::from(p.exercises_completed)).sum()
    }

    pub fn total_correct(&self) -> u64 {
        self.progress.values().map(|p| u64::from(p.exercises_correct)).sum()
    }

    pub fn total_minutes(&self) -> u64 {
        self.progress.values().map(|p| u64::from(p.time_spent_minutes)).sum()
    }
}

pub trait GamificationStore: Send + Sync {
    /// Current ledger for a student, `None` if the student never reported.
    fn load_ledger(&self, student_id: StudentId) -> CoreResult<Option<StudentLedger>>;

    /// Replace the student's ledger and append `activities`, atomically.
    fn commit(&mut self, ledger: StudentLedger, activities: Vec<ActivityLog>) -> CoreResult<()>;

    /// Newest-first activity history, plus the total number of entries.
    fn activities(&self, student_id: StudentId, offset: usize, limit: usize) -> CoreResult<(Vec<ActivityLog>, usize)>;

    fn ledgers(&self) -> CoreResult<Vec<StudentLedger>>;

    fn is_healthy(&self) -> bool;
}

/// Process-lifetime store.
#[derive(Default)]
pub struct MemoryStore {
    ledgers: HashMap<StudentId, StudentLedger>,
    log: HashMap<StudentId, Vec<ActivityLog>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GamificationStore for MemoryStore {
    fn load_ledger(&self, student_id: StudentId) -> CoreResult<Option<StudentLedger>> {
        Ok(self.ledgers.get(&student_id).cloned())
    }

    fn commit(&mut self, ledger: StudentLedger, activities: Vec<ActivityLog>) -> CoreResult<()> {
        let student_id = ledger.student_id;
        self.ledgers.insert(student_id, ledger);
        if !activities.is_empty() {
            self.log.entry(student_id).or_default().extend(activities);
        }
        Ok(())
    }

    fn activities(&self, student_id: StudentId, offset: usize, limit: usize) -> CoreResult<(Vec<ActivityLog>, usize)> {
        let Some(entries) = self.log.get(&student_id) else {
            return Ok((Vec::new(), 0));
        };
        let page = entries.iter().rev().skip(offset).take(limit).cloned().collect();
        Ok((page, entries.len()))
    }

    fn ledgers(&self) -> CoreResult<Vec<StudentLedger>> {
        Ok(self.ledgers.values().cloned().collect())
    }

    fn is_healthy(&self) -> bool {
        true
    }
}
