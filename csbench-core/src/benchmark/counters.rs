use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Run-scoped call counters shared by every harness invocation.
#[derive(Debug, Default)]
pub struct RunCounters {
    total: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    latency_micros: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CounterSnapshot {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Cumulative latency in seconds.
    pub latency_secs: f64,
}

impl CounterSnapshot {
    /// Mean seconds per call; `0.0` before any call.
    pub fn avg_secs(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.latency_secs / self.total as f64
        }
    }
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, success: bool, elapsed: Duration) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.latency_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            total: self.total.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            latency_secs: self.latency_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn concurrent_updates_are_not_lost() {
        let counters = Arc::new(RunCounters::new());
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let counters = Arc::clone(&counters);
                std::thread::spawn(move || {
                    for i in 0..1000 {
                        counters.record((i + t) % 4 != 0, Duration::from_micros(10));
                    }
                })
            })
            .collect();
        for t in threads {
            assert!(t.join().is_ok());
        }

        let s = counters.snapshot();
        assert_eq!(s.total, 8000);
        assert_eq!(s.succeeded + s.failed, 8000);
        assert_eq!(s.failed, 2000);
        assert!((s.latency_secs - 0.08).abs() < 1e-9);
        assert!((s.avg_secs() - 0.00001).abs() < 1e-12);
    }
}
