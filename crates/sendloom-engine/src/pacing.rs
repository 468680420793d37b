//! Pacing gate — minimum interval between consecutive sends.
//!
//! Governs inter-contact cadence only; retry backoff inside one contact's
//! delivery is a separate concern and never consumes the gate.

use tokio::time::{sleep, Duration, Instant};

/// Single-consumer rate gate. `wait()` suspends until the minimum interval
/// since the previous call has elapsed, then stamps "now" before returning.
pub struct PacingGate {
    min_interval: Duration,
    last_call: Option<Instant>,
}

impl PacingGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: None,
        }
    }

    /// Gate for a target rate in messages per minute.
    pub fn per_minute(rate: u32) -> Self {
        let rate = rate.max(1);
        Self::new(Duration::from_secs_f64(60.0 / rate as f64))
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Suspend until the interval since the last call has passed. The first
    /// call after construction or [`reset`](Self::reset) returns immediately.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        self.last_call = Some(Instant::now());
    }

    /// Forget the last call time; the next `wait()` returns immediately.
    pub fn reset(&mut self) {
        self.last_call = None;
    }
}
