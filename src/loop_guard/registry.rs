//! Bounded registry of authors already identified as bots.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct Entry {
    seq: u64,
    last_seen: DateTime<Utc>,
}

/// Known bot authors with LRU-style retention.
///
/// Every insert or refresh moves the author to the most-recent position. When
/// a new author would push the size past the hard cap, the oldest entries are
/// evicted until the size is back at the soft cap. [`cleanup`] does the same
/// trim on demand and is what the periodic sweeper calls.
///
/// [`cleanup`]: KnownBotRegistry::cleanup
#[derive(Debug)]
pub struct KnownBotRegistry {
    entries: HashMap<String, Entry>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
    soft_cap: usize,
    hard_cap: usize,
}

impl KnownBotRegistry {
    /// Create an empty registry.
    ///
    /// The soft cap is at least 1 and the hard cap is always above it.
    #[must_use]
    pub fn new(soft_cap: usize, hard_cap: usize) -> Self {
        let soft_cap = soft_cap.max(1);
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
            soft_cap,
            hard_cap: hard_cap.max(soft_cap + 1),
        }
    }

    /// Whether the author is known
    #[must_use]
    pub fn contains(&self, author_id: &str) -> bool {
        self.entries.contains_key(author_id)
    }

    /// Move a known author to the most-recent position.
    ///
    /// Returns `false` without changes if the author is unknown.
    pub fn touch(&mut self, author_id: &str) -> bool {
        let seq = self.bump_seq();
        let Some(entry) = self.entries.get_mut(author_id) else {
            return false;
        };
        if let Some(id) = self.order.remove(&entry.seq) {
            self.order.insert(seq, id);
        }
        entry.seq = seq;
        entry.last_seen = Utc::now();
        true
    }

    /// Insert an author, or refresh it if already present.
    pub fn record(&mut self, author_id: &str) {
        if self.touch(author_id) {
            return;
        }

        let seq = self.bump_seq();
        self.entries.insert(
            author_id.to_string(),
            Entry {
                seq,
                last_seen: Utc::now(),
            },
        );
        self.order.insert(seq, author_id.to_string());

        if self.entries.len() > self.hard_cap {
            let evicted = self.cleanup();
            debug!(evicted, size = self.len(), "known_bots: hard cap reached");
        }
    }

    /// Evict the oldest entries until the size is at most the soft cap.
    ///
    /// Returns the number of evicted entries.
    pub fn cleanup(&mut self) -> usize {
        let excess = self.entries.len().saturating_sub(self.soft_cap);
        for _ in 0..excess {
            let Some((_, id)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&id);
        }
        excess
    }

    /// When the author was last matched
    #[must_use]
    pub fn last_seen(&self, author_id: &str) -> Option<DateTime<Utc>> {
        self.entries.get(author_id).map(|e| e.last_seen)
    }

    /// Author ids from least to most recently seen
    pub fn ids_by_recency(&self) -> impl Iterator<Item = &str> {
        self.order.values().map(String::as_str)
    }

    /// Number of known authors
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no author is known
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Size the cleanup pass trims down to
    #[must_use]
    pub const fn soft_cap(&self) -> usize {
        self.soft_cap
    }

    /// Size that triggers an inline cleanup
    #[must_use]
    pub const fn hard_cap(&self) -> usize {
        self.hard_cap
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}
