//! In-memory TTL cache with a capacity bound.
//!
//! Entries remember when they were inserted; the TTL is chosen by the caller on
//! every `get`, so one cache can serve call sites with different freshness needs
//! (chat replies for 5 minutes, the problem of the day for an hour).
//!
//! When the store grows past its capacity, the entry with the oldest *insertion*
//! is evicted. Reads do not refresh an entry; an overwrite does. The insertion
//! order is kept in a `BTreeMap` keyed by a monotonically increasing sequence
//! number, so eviction never scans the whole map.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::clock::SharedClock;
use crate::tutor::Topic;

struct Entry<V> {
    value: V,
    inserted_at: DateTime<Utc>,
    seq: u64,
}

/// Counters reported by the performance/stats endpoints.
#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub evicted: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 { 0.0 } else { self.hits as f64 / total as f64 }
    }
}

pub struct TtlCache<V> {
    name: &'static str,
    entries: HashMap<String, Entry<V>>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
    capacity: usize,
    clock: SharedClock,
    stats: CacheStats,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(name: &'static str, capacity: usize, clock: SharedClock) -> Self {
        Self {
            name,
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
            capacity: capacity.max(1),
            clock,
            stats: CacheStats::default(),
        }
    }

    /// Returns the value only while `now - inserted_at < ttl`. A stale entry is
    /// purged on the way out.
    pub fn get(&mut self, key: &str, ttl: Duration) -> Option<V> {
        let now = self.clock.now();
        let fresh = match self.entries.get(key) {
            None => {
                self.stats.misses += 1;
                trace!(target: "cache", cache = self.name, %key, "miss");
                return None;
            }
            Some(entry) => now - entry.inserted_at < ttl,
        };

        if fresh {
            self.stats.hits += 1;
            trace!(target: "cache", cache = self.name, %key, "hit");
            return self.entries.get(key).map(|e| e.value.clone());
        }

        if let Some(entry) = self.entries.remove(key) {
            self.order.remove(&entry.seq);
        }
        self.stats.expired += 1;
        self.stats.misses += 1;
        debug!(target: "cache", cache = self.name, %key, "expired entry purged");
        None
    }

    /// Inserts or overwrites `key`. Overwriting counts as a new insertion.
    pub fn put(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        let seq = self.next_seq;
        self.next_seq += 1;

        let entry = Entry { value, inserted_at: self.clock.now(), seq };
        if let Some(previous) = self.entries.insert(key.clone(), entry) {
            self.order.remove(&previous.seq);
        }
        self.order.insert(seq, key);

        while self.entries.len() > self.capacity {
            self.evict_oldest();
        }
    }

    fn evict_oldest(&mut self) {
        let oldest = self.order.keys().next().copied();
        if let Some(seq) = oldest {
            if let Some(key) = self.order.remove(&seq) {
                self.entries.remove(&key);
                self.stats.evicted += 1;
                debug!(target: "cache", cache = self.name, %key, "evicted oldest entry");
            }
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

// -------- Key derivation --------

/// Lowercase, trim, drop everything that is neither a word character nor
/// whitespace, then collapse whitespace runs into one space.
pub fn normalize_message(message: &str) -> String {
    let lowered = message.to_lowercase();
    let stripped: String = lowered
        .trim()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Coarse topic fingerprint of a conversation, built from the last three
/// messages. Lossy on purpose: similar prompts in a similar context collide.
pub fn context_fingerprint<S: AsRef<str>>(history: &[S]) -> String {
    if history.is_empty() {
        return "new_conversation".into();
    }
    let start = history.len().saturating_sub(3);
    let topics: BTreeSet<&'static str> = history[start..]
        .iter()
        .filter_map(|m| Topic::detect(m.as_ref()))
        .map(Topic::as_str)
        .collect();
    if topics.is_empty() {
        "general".into()
    } else {
        topics.into_iter().collect::<Vec<_>>().join("_")
    }
}

/// Content-addressed key for a tutor reply.
pub fn chat_response_key(message: &str, fingerprint: &str) -> String {
    let digest = Sha256::digest(format!("{}:{}", normalize_message(message), fingerprint).as_bytes());
    format!("chat:{:x}", digest)
}

pub fn problem_of_day_key(day: NaiveDate) -> String {
    format!("problem_of_day:{}", day.format("%Y-%m-%d"))
}

pub fn problem_key(problem_id: u32) -> String {
    format!("problem:{}", problem_id)
}

pub fn hint_key(problem_id: u32) -> String {
    format!("hint:{}", problem_id)
}

pub const PROBLEM_STATS_KEY: &str = "problem_stats";

pub fn summary_key(session_id: &str) -> String {
    format!("summary:{}", session_id)
}
