//! Crawl counters
//!
//! Each counter is written by the pool that owns it and read by statistics
//! reporting. The two in-flight gauges also feed idle detection.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters shared by both pools
#[derive(Debug, Default)]
pub struct CrawlCounters {
    pub(crate) responses_fetched: AtomicU64,
    pub(crate) fetch_failures: AtomicU64,
    pub(crate) responses_analyzed: AtomicU64,
    pub(crate) analyze_failures: AtomicU64,
    pub(crate) records_extracted: AtomicU64,
    pub(crate) records_stored: AtomicU64,
    pub(crate) sink_failures: AtomicU64,
    pub(crate) urls_discovered: AtomicU64,
    pub(crate) in_flight_fetches: AtomicU64,
    pub(crate) in_flight_analyses: AtomicU64,
}

/// Plain copy of the counters at one moment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub responses_fetched: u64,
    pub fetch_failures: u64,
    pub responses_analyzed: u64,
    pub analyze_failures: u64,
    pub records_extracted: u64,
    pub records_stored: u64,
    pub sink_failures: u64,
    pub urls_discovered: u64,
    pub in_flight_fetches: u64,
    pub in_flight_analyses: u64,
}

impl CrawlCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Raises `gauge` until the returned guard is dropped
    ///
    /// The guard also releases the gauge when its holder unwinds.
    pub(crate) fn track(gauge: &AtomicU64) -> InFlight<'_> {
        // Gauges use SeqCst so idle detection sees them in program order
        // relative to frontier and buffer operations.
        gauge.fetch_add(1, Ordering::SeqCst);
        InFlight { gauge }
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            responses_fetched: self.responses_fetched.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            responses_analyzed: self.responses_analyzed.load(Ordering::Relaxed),
            analyze_failures: self.analyze_failures.load(Ordering::Relaxed),
            records_extracted: self.records_extracted.load(Ordering::Relaxed),
            records_stored: self.records_stored.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            urls_discovered: self.urls_discovered.load(Ordering::Relaxed),
            in_flight_fetches: self.in_flight_fetches.load(Ordering::SeqCst),
            in_flight_analyses: self.in_flight_analyses.load(Ordering::SeqCst),
        }
    }
}

/// One unit of work counted in an in-flight gauge
#[must_use = "the gauge drops back as soon as the guard is dropped"]
pub(crate) struct InFlight<'a> {
    gauge: &'a AtomicU64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.gauge.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CounterSnapshot {
    /// Total items that have finished a pool stage
    ///
    /// Any progress between two snapshots changes this value.
    pub fn progress(&self) -> u64 {
        self.responses_fetched
            + self.fetch_failures
            + self.responses_analyzed
            + self.analyze_failures
    }
}
