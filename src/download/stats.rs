//! Job counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::utils::format_size_lossy;

#[derive(Debug, Default)]
pub struct JobStats {
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
    bytes_uploaded: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    /// Submissions refused because the requester was busy
    pub rejected: u64,
    pub bytes_uploaded: u64,
}

impl JobStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_started(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, bytes: u64) {
        self.successful.fetch_add(1, Ordering::Relaxed);
        self.bytes_uploaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            successful: self.successful.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            bytes_uploaded: self.bytes_uploaded.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    pub fn in_flight(&self) -> u64 {
        self.total.saturating_sub(self.successful + self.failed)
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "jobs: {} total, {} ok, {} failed, {} running, {} rejected; uploaded {}",
            self.total,
            self.successful,
            self.failed,
            self.in_flight(),
            self.rejected,
            format_size_lossy(self.bytes_uploaded)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = JobStats::new();
        stats.record_started();
        stats.record_started();
        stats.record_started();
        stats.record_success(2048);
        stats.record_failure();
        stats.record_rejected();

        let snap = stats.snapshot();
        assert_eq!(snap.total, 3);
        assert_eq!(snap.successful, 1);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.in_flight(), 1);
        assert_eq!(snap.rejected, 1);
        assert_eq!(snap.bytes_uploaded, 2048);
        assert!(snap.to_string().contains("2.00 KB"));
    }
}
