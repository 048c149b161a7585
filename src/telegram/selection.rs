//! Pending format selections.
//!
//! Telegram caps callback data at 64 bytes, which a URL alone can exceed, so
//! each keyboard button carries a short token instead. The token resolves to
//! the full selection here. The store is bounded and entries expire.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::download::catalog::MediaSource;
use crate::download::selector::FormatSelector;

/// Callback data prefix for download buttons
pub const CALLBACK_PREFIX: &str = "dl:";

const DEFAULT_CAPACITY: usize = 1000;
const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq)]
pub struct PendingSelection {
    pub source: MediaSource,
    pub selector: FormatSelector,
    pub title: String,
}

#[derive(Debug)]
struct Entry {
    selection: PendingSelection,
    created_at: Instant,
}

#[derive(Debug)]
pub struct SelectionStore {
    entries: DashMap<String, Entry>,
    capacity: usize,
    ttl: Duration,
}

impl Default for SelectionStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl SelectionStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Stores `selection` and returns the callback data for its button.
    pub fn insert(&self, selection: PendingSelection) -> String {
        self.evict();
        let token = Uuid::new_v4().simple().to_string()[..12].to_string();
        self.entries.insert(
            token.clone(),
            Entry {
                selection,
                created_at: Instant::now(),
            },
        );
        format!("{}{}", CALLBACK_PREFIX, token)
    }

    /// Resolves callback data produced by [`insert`](Self::insert).
    /// Expired or unknown tokens yield `None`.
    pub fn resolve(&self, callback_data: &str) -> Option<PendingSelection> {
        let token = callback_data.strip_prefix(CALLBACK_PREFIX)?;
        let entry = self.entries.get(token)?;
        if entry.created_at.elapsed() > self.ttl {
            drop(entry);
            self.entries.remove(token);
            return None;
        }
        Some(entry.selection.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.created_at.elapsed() <= ttl);

        while self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.created_at)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}
