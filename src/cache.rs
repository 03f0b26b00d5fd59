//! Time-expiring memoization for the landing-page fetches.
//!
//! Overwrite-on-insert map with expiry checked on read. No eviction beyond
//! the TTL check and no size bound: the key space is a handful of fixed
//! constants.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

pub const FEATURED_TTL: Duration = Duration::from_secs(5 * 60);

pub struct TtlCache<V> {
    ttl: Duration,
    entries: HashMap<&'static str, Entry<V>>,
}

struct Entry<V> {
    stored_at: Instant,
    value: V,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let entry = self.entries.get(key)?;
        if entry.stored_at.elapsed() < self.ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    pub fn insert(&mut self, key: &'static str, value: V) {
        self.entries.insert(
            key,
            Entry {
                stored_at: Instant::now(),
                value,
            },
        );
    }
}
