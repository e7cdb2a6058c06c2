//! Latency recording and summarization.

use std::time::Duration;

use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};

/// Tracks write-latency percentiles for one benchmark level.
///
/// Backed by an HDR histogram covering 1ns to 1 hour at 3 significant
/// digits.
#[derive(Debug)]
pub struct LatencyTracker {
    histogram: Histogram<u64>,
    errors: u64,
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self {
            // Histogram::new(3) only fails for an invalid digit count.
            histogram: Histogram::new(3).expect("valid histogram config"),
            errors: 0,
        }
    }

    /// Records one successful write's latency.
    pub fn record(&mut self, latency: Duration) {
        let ns = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        self.histogram.record(ns).ok();
    }

    /// Counts a failed write. Failures never enter the latency sample.
    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    /// Number of recorded (successful) samples.
    pub fn count(&self) -> u64 {
        self.histogram.len()
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    /// Mean latency in nanoseconds.
    pub fn mean_ns(&self) -> f64 {
        self.histogram.mean()
    }

    /// Minimum latency in nanoseconds.
    pub fn min_ns(&self) -> u64 {
        self.histogram.min()
    }

    /// Maximum latency in nanoseconds.
    pub fn max_ns(&self) -> u64 {
        self.histogram.max()
    }

    /// The p95 latency in nanoseconds.
    pub fn p95_ns(&self) -> u64 {
        self.histogram.value_at_quantile(0.95)
    }

    /// Condenses the tracker into a reportable summary.
    pub fn summary(&self) -> LatencySummary {
        LatencySummary {
            samples: self.count(),
            errors: self.errors,
            mean: Duration::from_nanos(self.mean_ns() as u64),
            min: Duration::from_nanos(self.min_ns()),
            max: Duration::from_nanos(self.max_ns()),
            p95: Duration::from_nanos(self.p95_ns()),
        }
    }
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-level latency statistics over one benchmark run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencySummary {
    /// Successful writes that entered the sample.
    pub samples: u64,
    /// Writes excluded from the sample because they failed.
    pub errors: u64,
    pub mean: Duration,
    pub min: Duration,
    pub max: Duration,
    pub p95: Duration,
}

impl LatencySummary {
    /// JSON rendering for report files and CI output.
    pub fn to_json(&self, level: &str) -> String {
        serde_json::json!({
            "level": level,
            "samples": self.samples,
            "errors": self.errors,
            "mean_ns": self.mean.as_nanos() as u64,
            "min_ns": self.min.as_nanos() as u64,
            "max_ns": self.max.as_nanos() as u64,
            "p95_ns": self.p95.as_nanos() as u64,
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_are_ordered() {
        let mut tracker = LatencyTracker::new();
        for i in 1..=100u64 {
            tracker.record(Duration::from_micros(i));
        }

        assert_eq!(tracker.count(), 100);
        assert!(tracker.min_ns() > 0);
        assert!(tracker.p95_ns() >= tracker.min_ns());
        assert!(tracker.max_ns() >= tracker.p95_ns());
    }

    #[test]
    fn errors_do_not_enter_the_sample() {
        let mut tracker = LatencyTracker::new();
        tracker.record(Duration::from_micros(5));
        tracker.record_error();
        tracker.record_error();

        let summary = tracker.summary();
        assert_eq!(summary.samples, 1);
        assert_eq!(summary.errors, 2);
    }

    #[test]
    fn summary_reflects_known_values() {
        let mut tracker = LatencyTracker::new();
        tracker.record(Duration::from_micros(1));
        tracker.record(Duration::from_micros(2));
        tracker.record(Duration::from_micros(3));

        let summary = tracker.summary();
        // 3 significant digits: values land within 0.1% of what went in.
        assert!(summary.min <= Duration::from_micros(1));
        assert!(summary.max >= Duration::from_micros(2));
        assert!((summary.mean.as_nanos() as i64 - 2000).abs() < 100);
    }

    #[test]
    fn json_export_carries_the_level_name() {
        let mut tracker = LatencyTracker::new();
        tracker.record(Duration::from_micros(10));

        let json = tracker.summary().to_json("majority");
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["level"], "majority");
        assert_eq!(parsed["samples"], 1);
    }
}
