//! In-memory record of the last successfully mirrored push per repository
//!
//! Lives for the whole process and is never persisted: after a restart the
//! only signal left is whether a local mirror directory exists. Only the
//! cycle orchestrator writes to it, and only after a repository synced
//! successfully, so a failed repository keeps its previous entry and is
//! retried on the next cycle.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

#[derive(Debug, Default, Clone)]
pub struct DedupCache {
    synced: HashMap<String, DateTime<Utc>>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether exactly this push of `name` has already been mirrored
    pub fn is_current(&self, name: &str, pushed_at: Option<DateTime<Utc>>) -> bool {
        match (self.synced.get(name), pushed_at) {
            (Some(synced), Some(pushed)) => *synced == pushed,
            _ => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<DateTime<Utc>> {
        self.synced.get(name).copied()
    }

    /// Remember a successful sync of the push at `pushed_at`
    pub fn record(&mut self, name: impl Into<String>, pushed_at: DateTime<Utc>) {
        self.synced.insert(name.into(), pushed_at);
    }

    pub fn len(&self) -> usize {
        self.synced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.synced.is_empty()
    }
}
