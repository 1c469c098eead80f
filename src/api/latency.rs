//! Wall-time distribution of `/score` requests, from body decode to ranked
//! output, kept in memory for `/stats/latency`.

use std::sync::Mutex;
use std::time::Duration;

use hdrhistogram::Histogram;
use serde::Serialize;

/// Slowest request the histogram resolves: 100 s, in microseconds.
const MAX_TRACKED_US: u64 = 100_000_000;

/// Point-in-time view of the scoring latency, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencySnapshot {
    pub samples: u64,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
}

/// Request timings in microseconds. `None` only if the histogram could not be
/// allocated, in which case every snapshot is empty.
pub struct LatencyStats {
    runs: Mutex<Option<Histogram<u64>>>,
}

impl LatencyStats {
    pub fn new() -> Self {
        Self {
            runs: Mutex::new(Histogram::new_with_bounds(1, MAX_TRACKED_US, 3).ok()),
        }
    }

    /// Records one scoring request. Sub-microsecond runs count as 1us and
    /// anything slower than the tracked maximum is clamped to it.
    pub fn record(&self, elapsed: Duration) {
        let us = elapsed.as_micros().clamp(1, u128::from(MAX_TRACKED_US)) as u64;
        if let Ok(mut guard) = self.runs.lock() {
            if let Some(h) = guard.as_mut() {
                let _ = h.record(us);
            }
        }
    }

    pub fn snapshot(&self) -> LatencySnapshot {
        let empty = LatencySnapshot {
            samples: 0,
            p50_ms: None,
            p95_ms: None,
            p99_ms: None,
        };
        let Ok(guard) = self.runs.lock() else {
            return empty;
        };
        let Some(h) = guard.as_ref().filter(|h| h.len() > 0) else {
            return empty;
        };
        let ms = |q: f64| Some(h.value_at_quantile(q) as f64 / 1_000.0);
        LatencySnapshot {
            samples: h.len(),
            p50_ms: ms(0.5),
            p95_ms: ms(0.95),
            p99_ms: ms(0.99),
        }
    }

    pub fn len(&self) -> u64 {
        self.snapshot().samples
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}
