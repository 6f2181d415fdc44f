//! Accumulation of invocation results into per-tier totals.

use hdrhistogram::Histogram;
use std::collections::BTreeMap;
use tokio::sync::mpsc;

use super::invoker::InvocationResult;

/// Highest trackable duration: one hour, in microseconds
const HISTOGRAM_MAX_MICROS: u64 = 3_600_000_000;

/// Running totals for one tier. Only successful invocations land here.
#[derive(Debug, Clone, PartialEq)]
pub struct TierAggregate {
    pub total_duration_secs: f64,
    pub success_count: u64,
    durations: Histogram<u64>,
}

impl TierAggregate {
    pub fn new() -> Self {
        Self {
            total_duration_secs: 0.0,
            success_count: 0,
            durations: Histogram::new_with_bounds(1, HISTOGRAM_MAX_MICROS, 3)
                .expect("static histogram bounds are valid"),
        }
    }

    fn record(&mut self, duration_secs: f64) {
        self.total_duration_secs += duration_secs;
        self.success_count += 1;
        let micros = (duration_secs * 1_000_000.0).round() as u64;
        self.durations.saturating_record(micros.max(1));
    }

    /// Duration percentile in seconds, `None` without samples
    pub fn percentile_secs(&self, percentile: f64) -> Option<f64> {
        if self.success_count == 0 {
            return None;
        }
        Some(self.durations.value_at_percentile(percentile) as f64 / 1_000_000.0)
    }
}

impl Default for TierAggregate {
    fn default() -> Self {
        Self::new()
    }
}

/// Totals for a whole run.
///
/// Accumulation is commutative: any ordering of the same results yields
/// the same aggregate (up to float rounding of the duration sums).
#[derive(Debug, Clone, PartialEq)]
pub struct RunAggregate {
    tiers: BTreeMap<u32, TierAggregate>,
    error_count: u64,
    lost_count: u64,
    received: usize,
}

impl RunAggregate {
    /// Empty aggregate listing every tier of the run, so tiers without a
    /// single success still show up in the report
    pub fn new(tiers: impl IntoIterator<Item = u32>) -> Self {
        Self {
            tiers: tiers.into_iter().map(|t| (t, TierAggregate::new())).collect(),
            error_count: 0,
            lost_count: 0,
            received: 0,
        }
    }

    /// Incorporate a single result. A failure only bumps the error count.
    pub fn consume(&mut self, result: &InvocationResult) {
        self.received += 1;
        if result.success {
            self.tiers
                .entry(result.tier)
                .or_default()
                .record(result.duration_secs);
        } else {
            self.error_count += 1;
        }
    }

    /// Account for scheduled invocations that never produced a result
    /// (aborted by the run timeout or panicked). They count as errors.
    pub fn record_lost(&mut self, count: usize) {
        self.lost_count += count as u64;
        self.error_count += count as u64;
        self.received += count;
    }

    /// Per-tier totals in ascending tier order
    pub fn tiers(&self) -> impl Iterator<Item = (u32, &TierAggregate)> {
        self.tiers.iter().map(|(t, a)| (*t, a))
    }

    pub fn tier(&self, tier: u32) -> Option<&TierAggregate> {
        self.tiers.get(&tier)
    }

    /// Failed invocations, lost ones included
    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    /// Invocations that never reported back
    pub fn lost_count(&self) -> u64 {
        self.lost_count
    }

    /// Results accounted for so far, successes and failures alike
    pub fn received(&self) -> usize {
        self.received
    }

    pub fn success_count(&self) -> u64 {
        self.tiers.values().map(|a| a.success_count).sum()
    }
}

/// Single consumer of the result channel
pub struct Collector {
    aggregate: RunAggregate,
    expected: usize,
}

impl Collector {
    /// Collector that expects exactly `expected` results for `tiers`
    pub fn new(tiers: impl IntoIterator<Item = u32>, expected: usize) -> Self {
        Self {
            aggregate: RunAggregate::new(tiers),
            expected,
        }
    }

    /// Consume results until `expected` have arrived or every sender is gone.
    ///
    /// Returning on channel close keeps the collector from hanging when a
    /// producer dies without sending; the caller reconciles the shortfall.
    pub async fn run(mut self, mut rx: mpsc::Receiver<InvocationResult>) -> RunAggregate {
        while self.aggregate.received() < self.expected {
            match rx.recv().await {
                Some(result) => {
                    tracing::trace!(
                        tier = result.tier,
                        success = result.success,
                        received = self.aggregate.received() + 1,
                        expected = self.expected,
                        "Collected result"
                    );
                    self.aggregate.consume(&result);
                }
                None => break,
            }
        }
        rx.close();
        self.aggregate
    }
}
