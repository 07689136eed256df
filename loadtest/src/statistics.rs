//! Per-label request statistics.
//!
//! Each simulated user owns a [`Statistics`]; the runner merges them once
//! every user has stopped, so recording never takes a lock.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use hdrhistogram::Histogram;
use hyper::{Method, StatusCode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(String),
}

impl Outcome {
    #[must_use]
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_success() {
            Outcome::Success
        } else {
            Outcome::Failure(format!("HTTP {status}"))
        }
    }
}

/// Counters and latency histogram for one `(method, label)` pair.
#[derive(Debug, Clone)]
pub struct RequestStats {
    method: Method,
    name: String,
    requests: u64,
    failures: u64,
    // Microseconds.
    latencies: Histogram<u64>,
    failure_reasons: BTreeMap<String, u64>,
}

impl RequestStats {
    #[must_use]
    pub fn new(method: Method, name: impl Into<String>) -> Self {
        Self {
            method,
            name: name.into(),
            requests: 0,
            failures: 0,
            latencies: Histogram::new(3).expect("3 significant figures is a valid precision"),
            failure_reasons: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, elapsed: Duration, outcome: Outcome) {
        self.requests += 1;
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.latencies.saturating_record(micros);
        if let Outcome::Failure(reason) = outcome {
            self.failures += 1;
            *self.failure_reasons.entry(reason).or_default() += 1;
        }
    }

    pub fn merge(&mut self, other: &RequestStats) {
        self.requests += other.requests;
        self.failures += other.failures;
        if let Err(e) = self.latencies.add(&other.latencies) {
            tracing::warn!("Dropped latencies while merging {}: {e}", self.name);
        }
        for (reason, count) in &other.failure_reasons {
            *self.failure_reasons.entry(reason.clone()).or_default() += count;
        }
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn requests(&self) -> u64 {
        self.requests
    }

    #[inline]
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn failure_reasons(&self) -> impl Iterator<Item = (&str, u64)> {
        self.failure_reasons
            .iter()
            .map(|(reason, count)| (reason.as_str(), *count))
    }

    pub fn min_ms(&self) -> f64 {
        micros_to_ms(self.latencies.min())
    }

    pub fn max_ms(&self) -> f64 {
        micros_to_ms(self.latencies.max())
    }

    pub fn mean_ms(&self) -> f64 {
        self.latencies.mean() / 1000.0
    }

    pub fn percentile_ms(&self, quantile: f64) -> f64 {
        micros_to_ms(self.latencies.value_at_quantile(quantile))
    }
}

#[inline]
fn micros_to_ms(micros: u64) -> f64 {
    micros as f64 / 1000.0
}

/// All request stats of a run, ordered by label then method.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    entries: BTreeMap<(String, String), RequestStats>,
}

impl Statistics {
    pub fn record(&mut self, method: &Method, name: &str, elapsed: Duration, outcome: Outcome) {
        self.entries
            .entry((name.to_owned(), method.as_str().to_owned()))
            .or_insert_with(|| RequestStats::new(method.clone(), name))
            .record(elapsed, outcome);
    }

    pub fn merge(&mut self, other: &Statistics) {
        for (key, theirs) in &other.entries {
            match self.entries.get_mut(key) {
                Some(ours) => ours.merge(theirs),
                None => {
                    self.entries.insert(key.clone(), theirs.clone());
                }
            }
        }
    }

    pub fn get(&self, method: &Method, name: &str) -> Option<&RequestStats> {
        self.entries
            .get(&(name.to_owned(), method.as_str().to_owned()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RequestStats> {
        self.entries.values()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_requests(&self) -> u64 {
        self.iter().map(RequestStats::requests).sum()
    }

    pub fn total_failures(&self) -> u64 {
        self.iter().map(RequestStats::failures).sum()
    }

    /// Every entry folded into one row named `Aggregated`.
    pub fn aggregated(&self) -> RequestStats {
        let mut total = RequestStats::new(Method::GET, "Aggregated");
        for entry in self.iter() {
            total.merge(entry);
        }
        total
    }

    #[must_use]
    pub fn report(&self) -> Report<'_> {
        Report(self)
    }
}

/// Fixed-width table of a [`Statistics`], one row per label.
pub struct Report<'a>(&'a Statistics);

impl Report<'_> {
    fn write_row(f: &mut fmt::Formatter<'_>, method: &str, row: &RequestStats) -> fmt::Result {
        writeln!(
            f,
            "{:<7}{:<24}{:>9}{:>9}{:>10.2}{:>10.2}{:>10.2}{:>10.2}{:>10.2}{:>10.2}",
            method,
            row.name(),
            row.requests(),
            row.failures(),
            row.min_ms(),
            row.mean_ms(),
            row.percentile_ms(0.50),
            row.percentile_ms(0.95),
            row.percentile_ms(0.99),
            row.max_ms(),
        )
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<7}{:<24}{:>9}{:>9}{:>10}{:>10}{:>10}{:>10}{:>10}{:>10}",
            "Type", "Name", "# reqs", "# fails", "min ms", "mean ms", "p50 ms", "p95 ms", "p99 ms",
            "max ms"
        )?;
        for row in self.0.iter() {
            Self::write_row(f, row.method().as_str(), row)?;
        }
        Self::write_row(f, "", &self.0.aggregated())?;

        if self.0.total_failures() > 0 {
            writeln!(f)?;
            writeln!(f, "Failures:")?;
            for row in self.0.iter() {
                for (reason, count) in row.failure_reasons() {
                    writeln!(f, "  {count:>6}  {} {}: {reason}", row.method(), row.name())?;
                }
            }
        }
        Ok(())
    }
}
