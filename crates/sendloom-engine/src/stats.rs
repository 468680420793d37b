//! Run statistics.

/// Why one contact ended up in the failed column.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    pub recipient: String,
    pub reason: String,
}

/// Counters for one run. `total` only ever moves together with exactly one
/// of the outcome counters, so `total == sent + skipped + failed` holds at
/// every point, including after cancellation mid-run.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub total: usize,
    /// Real sends plus dry-run simulated sends.
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<FailureRecord>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&mut self) {
        self.total += 1;
        self.sent += 1;
    }

    pub fn record_skipped(&mut self) {
        self.total += 1;
        self.skipped += 1;
    }

    pub fn record_failed(&mut self, recipient: &str, reason: String) {
        self.total += 1;
        self.failed += 1;
        self.failures.push(FailureRecord {
            recipient: recipient.to_string(),
            reason,
        });
    }

    /// One-line summary for the end-of-run report.
    pub fn summary(&self) -> String {
        format!(
            "total={} sent={} skipped={} failed={}",
            self.total, self.sent, self.skipped, self.failed
        )
    }
}
