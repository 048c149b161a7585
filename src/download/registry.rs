//! Per-requester active-job registry.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Tracks which requesters currently have a job in flight, together with the
/// token that cancels that job.
///
/// Owned by an orchestrator, never global. Membership is held by an
/// [`ActiveJobGuard`]; dropping the guard clears the entry and its token
/// whatever way the job ended, including a dropped job future.
#[derive(Debug, Default)]
pub struct ConcurrencyRegistry {
    active: DashMap<i64, CancellationToken>,
}

impl ConcurrencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically marks `requester_id` busy with the job cancelled by `token`.
    /// Returns `None` if it already was.
    pub fn try_acquire(self: &Arc<Self>, requester_id: i64, token: CancellationToken) -> Option<ActiveJobGuard> {
        match self.active.entry(requester_id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(token);
                log::debug!("Requester {} marked active", requester_id);
                Some(ActiveJobGuard {
                    registry: Arc::clone(self),
                    requester_id,
                })
            }
        }
    }

    /// Cancels the requester's job. Returns `false` if there is none.
    pub fn cancel(&self, requester_id: i64) -> bool {
        match self.active.get(&requester_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, requester_id: i64) -> bool {
        self.active.contains_key(&requester_id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

#[derive(Debug)]
pub struct ActiveJobGuard {
    registry: Arc<ConcurrencyRegistry>,
    requester_id: i64,
}

impl ActiveJobGuard {
    pub fn requester_id(&self) -> i64 {
        self.requester_id
    }
}

impl Drop for ActiveJobGuard {
    fn drop(&mut self) {
        self.registry.active.remove(&self.requester_id);
        log::debug!("Requester {} released", self.requester_id);
    }
}
