//! In-process request counters reported by `/health`.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Tracks request counts and concurrency since process start.
#[derive(Debug)]
pub struct ServiceStats {
    total_requests: AtomicU64,
    active_requests: AtomicU32,
    peak_concurrent_requests: AtomicU32,
    rejected_requests: AtomicU64,
    failed_requests: AtomicU64,
    start_time: Instant,
}

impl ServiceStats {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            active_requests: AtomicU32::new(0),
            peak_concurrent_requests: AtomicU32::new(0),
            rejected_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Count an admitted request. The request stays active until the
    /// returned guard is dropped, and counts as failed unless
    /// [`InFlight::succeeded`] was called first.
    pub fn request_started(self: &Arc<Self>) -> InFlight {
        let active = self.active_requests.fetch_add(1, Ordering::SeqCst) + 1;
        self.total_requests.fetch_add(1, Ordering::SeqCst);
        self.peak_concurrent_requests
            .fetch_max(active, Ordering::SeqCst);
        InFlight {
            stats: Arc::clone(self),
            succeeded: false,
        }
    }

    /// Count a request refused for capacity.
    pub fn record_rejection(&self) {
        self.rejected_requests.fetch_add(1, Ordering::SeqCst);
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "uptime_seconds": self.start_time.elapsed().as_secs(),
            "total_requests": self.total_requests.load(Ordering::SeqCst),
            "active_requests": self.active_requests.load(Ordering::SeqCst),
            "peak_concurrent_requests": self.peak_concurrent_requests.load(Ordering::SeqCst),
            "rejected_requests": self.rejected_requests.load(Ordering::SeqCst),
            "failed_requests": self.failed_requests.load(Ordering::SeqCst),
        })
    }
}

impl Default for ServiceStats {
    fn default() -> Self {
        Self::new()
    }
}

/// One admitted request. Dropping it, including during a panic, ends the
/// request.
#[derive(Debug)]
pub struct InFlight {
    stats: Arc<ServiceStats>,
    succeeded: bool,
}

impl InFlight {
    /// Mark the request as successful.
    pub fn succeeded(&mut self) {
        self.succeeded = true;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.stats.active_requests.fetch_sub(1, Ordering::SeqCst);
        if !self.succeeded {
            self.stats.failed_requests.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = Arc::new(ServiceStats::new());
        let mut first = stats.request_started();
        let second = stats.request_started();
        assert_eq!(stats.to_json()["active_requests"], 2);
        first.succeeded();
        drop(first);
        drop(second);
        stats.record_rejection();

        let json = stats.to_json();
        assert_eq!(json["total_requests"], 2);
        assert_eq!(json["active_requests"], 0);
        assert_eq!(json["peak_concurrent_requests"], 2);
        assert_eq!(json["failed_requests"], 1);
        assert_eq!(json["rejected_requests"], 1);
    }

    #[test]
    fn test_panicking_request_is_released() {
        let stats = Arc::new(ServiceStats::new());
        let in_task = Arc::clone(&stats);
        let result = std::panic::catch_unwind(move || {
            let _in_flight = in_task.request_started();
            panic!("pipeline bug");
        });
        assert!(result.is_err());

        let json = stats.to_json();
        assert_eq!(json["active_requests"], 0);
        assert_eq!(json["failed_requests"], 1);
    }
}
