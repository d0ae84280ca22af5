//! Crawl statistics snapshots and the periodic reporter
//!
//! Statistics are read from the frontier, the shared counters and the
//! handoff buffer. They are informational only and never steer the crawl.

use crate::crawler::{CrawlCounters, HandoffBuffer};
use crate::frontier::{Frontier, FrontierResult, FrontierStats};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStatistics {
    /// URLs ever admitted to the frontier
    pub urls_seen: u64,

    /// URLs waiting to be fetched
    pub urls_pending: u64,

    /// Successful responses pushed to the handoff buffer
    pub responses_fetched: u64,

    /// Responses fetched but not yet claimed by an analyzer
    pub responses_pending_analysis: u64,

    /// Responses an analyzer finished without error
    pub responses_analyzed: u64,

    /// Records produced by the analyzer
    pub records_extracted: u64,

    /// Records the sink accepted
    pub records_stored: u64,

    pub fetch_failures: u64,
    pub analyze_failures: u64,
    pub sink_failures: u64,

    /// URLs newly admitted through discovery
    pub urls_discovered: u64,

    /// Time since the crawl was last started
    pub elapsed: Duration,
}

impl CrawlStatistics {
    /// Collects a snapshot from the live crawl components
    pub fn collect(
        frontier: &dyn Frontier,
        counters: &CrawlCounters,
        buffer: &HandoffBuffer,
        elapsed: Duration,
    ) -> FrontierResult<Self> {
        let FrontierStats { seen, pending } = frontier.stats()?;
        let counters = counters.snapshot();

        Ok(Self {
            urls_seen: seen,
            urls_pending: pending,
            responses_fetched: counters.responses_fetched,
            responses_pending_analysis: buffer.len() as u64,
            responses_analyzed: counters.responses_analyzed,
            records_extracted: counters.records_extracted,
            records_stored: counters.records_stored,
            fetch_failures: counters.fetch_failures,
            analyze_failures: counters.analyze_failures,
            sink_failures: counters.sink_failures,
            urls_discovered: counters.urls_discovered,
            elapsed,
        })
    }

    /// Responses fetched per second since start
    pub fn fetch_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.responses_fetched as f64 / secs
        } else {
            0.0
        }
    }

    /// Logs the snapshot at info level
    pub fn log(&self) {
        tracing::info!(
            "Progress: {} seen, {} pending, {} fetched ({:.2}/sec), {} awaiting analysis, {} analyzed, {} records stored of {} extracted",
            self.urls_seen,
            self.urls_pending,
            self.responses_fetched,
            self.fetch_rate(),
            self.responses_pending_analysis,
            self.responses_analyzed,
            self.records_stored,
            self.records_extracted
        );
        if self.fetch_failures + self.analyze_failures + self.sink_failures > 0 {
            tracing::info!(
                "Failures: {} fetch, {} analyze, {} sink",
                self.fetch_failures,
                self.analyze_failures,
                self.sink_failures
            );
        }
    }
}

/// Everything the reporter needs to build a snapshot
#[derive(Clone)]
pub struct StatsSource {
    pub frontier: Arc<dyn Frontier>,
    pub counters: Arc<CrawlCounters>,
    pub buffer: Arc<HandoffBuffer>,
    pub started_at: Instant,
}

impl StatsSource {
    pub fn collect(&self) -> FrontierResult<CrawlStatistics> {
        CrawlStatistics::collect(
            self.frontier.as_ref(),
            &self.counters,
            &self.buffer,
            self.started_at.elapsed(),
        )
    }
}

/// Background task logging statistics on a fixed interval
pub struct StatsReporter {
    cancel: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl StatsReporter {
    /// Starts reporting every `interval`; the first report comes after one interval
    pub fn spawn(source: StatsSource, interval: Duration) -> Self {
        let (cancel, mut cancelled) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => match source.collect() {
                        Ok(stats) => stats.log(),
                        Err(e) => tracing::warn!("Could not collect statistics: {}", e),
                    },
                    _ = cancelled.changed() => break,
                }
            }
        });

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Cancels the reporter and waits for its task to finish
    pub async fn stop(mut self) {
        self.cancel.send_replace(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!("Statistics reporter ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for StatsReporter {
    fn drop(&mut self) {
        self.cancel.send_replace(true);
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Frontier:");
    println!("  URLs seen: {}", stats.urls_seen);
    println!("  URLs pending: {}", stats.urls_pending);
    println!("  URLs discovered: {}", stats.urls_discovered);
    println!();

    println!("Pipeline:");
    println!("  Responses fetched: {}", stats.responses_fetched);
    println!(
        "  Responses awaiting analysis: {}",
        stats.responses_pending_analysis
    );
    println!("  Responses analyzed: {}", stats.responses_analyzed);
    println!("  Records extracted: {}", stats.records_extracted);
    println!("  Records stored: {}", stats.records_stored);
    println!();

    let failures = stats.fetch_failures + stats.analyze_failures + stats.sink_failures;
    if failures > 0 {
        println!("Failures:");
        println!("  Fetch: {}", stats.fetch_failures);
        println!("  Analyze: {}", stats.analyze_failures);
        println!("  Sink: {}", stats.sink_failures);
        println!();
    }

    println!(
        "Elapsed: {:.1}s ({:.2} responses/sec)",
        stats.elapsed.as_secs_f64(),
        stats.fetch_rate()
    );
}

/// Prints the sizes of a frontier's collections
pub fn print_frontier_stats(stats: &FrontierStats) {
    println!("=== Frontier Statistics ===\n");
    println!("  URLs seen: {}", stats.seen);
    println!("  URLs pending: {}", stats.pending);
    println!("  URLs fetched or claimed: {}", stats.seen.saturating_sub(stats.pending));
}
