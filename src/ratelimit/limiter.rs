use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::watch;

/// What the caller gets back from a limit check. `reset_at` is surfaced as
/// retry guidance when `allowed` is false.
#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: Instant,
}

#[derive(Debug)]
struct WindowRecord {
    count: u32,
    window_reset_at: Instant,
}

/// Fixed-window request counter keyed by client identifier.
///
/// Counts live only in this process. Each check runs as a single
/// read-check-increment critical section per key, so concurrent requests
/// for one key can never push the count past the limit. A background task
/// sweeps out expired windows on a timer, independent of traffic.
pub struct FixedWindowLimiter {
    records: Arc<DashMap<String, WindowRecord>>,
    shutdown_tx: watch::Sender<bool>,
}

impl FixedWindowLimiter {
    pub fn new(sweep_interval: Duration) -> Self {
        let records: Arc<DashMap<String, WindowRecord>> = Arc::new(DashMap::new());
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let sweep_records = Arc::clone(&records);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let now = Instant::now();
                        sweep_records.retain(|_, record| record.window_reset_at > now);
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });

        Self {
            records,
            shutdown_tx,
        }
    }

    /// Count one request against `key`. Denied requests do not consume
    /// budget and never extend the window.
    pub fn check(&self, key: &str, max_requests: u32, window: Duration) -> Decision {
        let now = Instant::now();

        // The entry guard serializes every mutation for this key.
        let mut record = self
            .records
            .entry(key.to_string())
            .or_insert_with(|| WindowRecord {
                count: 0,
                window_reset_at: now + window,
            });

        if record.window_reset_at <= now {
            record.count = 0;
            record.window_reset_at = now + window;
        }

        if record.count < max_requests {
            record.count += 1;
            Decision {
                allowed: true,
                remaining: max_requests - record.count,
                reset_at: record.window_reset_at,
            }
        } else {
            Decision {
                allowed: false,
                remaining: 0,
                reset_at: record.window_reset_at,
            }
        }
    }

    /// Number of client records currently held.
    pub fn tracked_keys(&self) -> usize {
        self.records.len()
    }

    /// Stop the sweep task. Records already held stay valid; only the
    /// periodic eviction ends.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
