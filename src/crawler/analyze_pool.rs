//! Analyze pool: OS threads turning buffered bodies into URLs and records
//!
//! Analysis is CPU-bound, so each worker is a dedicated thread rather than a
//! tokio task. URL forwarding and record storage are independent: a failure
//! in one never skips the other.

use crate::config::CrawlSettings;
use crate::crawler::counters::CrawlCounters;
use crate::crawler::handoff::HandoffBuffer;
use crate::crawler::signal::FatalSignal;
use crate::frontier::Frontier;
use crate::pipeline::{Analyzer, Extraction, ResponseBody, Sink};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Handle to a running set of analyze threads
pub struct AnalyzePool {
    stop: Arc<AtomicBool>,
    live: Arc<AtomicUsize>,
    handles: Vec<JoinHandle<()>>,
}

struct AnalyzeWorker<A: Analyzer> {
    id: usize,
    analyzer: Arc<A>,
    sink: Arc<dyn Sink<A::Record>>,
    frontier: Arc<dyn Frontier>,
    receiver: Receiver<ResponseBody>,
    counters: Arc<CrawlCounters>,
    fatal: FatalSignal,
    idle_backoff: Duration,
    stop: Arc<AtomicBool>,
    live: Arc<AtomicUsize>,
}

// Counts a worker as live until its thread unwinds or returns
struct Live(Arc<AtomicUsize>);

impl Drop for Live {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AnalyzePool {
    /// Spawns `settings.analyze_workers` named threads
    ///
    /// Threads already started are stopped again if a later spawn fails.
    pub fn spawn<A: Analyzer>(
        analyzer: Arc<A>,
        sink: Arc<dyn Sink<A::Record>>,
        frontier: Arc<dyn Frontier>,
        buffer: &HandoffBuffer,
        counters: Arc<CrawlCounters>,
        fatal: FatalSignal,
        settings: &CrawlSettings,
    ) -> std::io::Result<Self> {
        let mut pool = Self {
            stop: Arc::new(AtomicBool::new(false)),
            live: Arc::new(AtomicUsize::new(0)),
            handles: Vec::with_capacity(settings.analyze_workers),
        };

        for id in 0..settings.analyze_workers {
            let worker = AnalyzeWorker {
                id,
                analyzer: Arc::clone(&analyzer),
                sink: Arc::clone(&sink),
                frontier: Arc::clone(&frontier),
                receiver: buffer.receiver(),
                counters: Arc::clone(&counters),
                fatal: fatal.clone(),
                idle_backoff: settings.idle_backoff,
                stop: Arc::clone(&pool.stop),
                live: Arc::clone(&pool.live),
            };
            pool.live.fetch_add(1, Ordering::SeqCst);
            let spawned = thread::Builder::new()
                .name(format!("analyze-{}", id))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => pool.handles.push(handle),
                Err(e) => {
                    // The closure never ran, so its guard never will
                    pool.live.fetch_sub(1, Ordering::SeqCst);
                    return Err(e);
                }
            }
        }

        tracing::info!("Started {} analyze workers", pool.handles.len());
        Ok(pool)
    }

    /// Tells every worker to exit after its current item
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Blocks until every worker thread has exited
    pub fn join(mut self) {
        for handle in std::mem::take(&mut self.handles) {
            let name = handle.thread().name().unwrap_or("analyze").to_string();
            if handle.join().is_err() {
                tracing::error!("Analyze worker {} panicked", name);
            }
        }
        tracing::debug!("Analyze pool joined");
    }

    /// Workers whose thread has not yet exited
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl Drop for AnalyzePool {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

impl<A: Analyzer> AnalyzeWorker<A> {
    fn run(self) {
        let _live = Live(Arc::clone(&self.live));
        let counters = Arc::clone(&self.counters);
        tracing::debug!("Analyze worker {} started", self.id);

        while !self.stop.load(Ordering::SeqCst) {
            match self.receiver.recv_timeout(self.idle_backoff) {
                Ok(body) => {
                    // Idle detection needs two matching polls, which covers the
                    // instant between the receive and the gauge
                    let _in_flight = CrawlCounters::track(&counters.in_flight_analyses);
                    if !self.process(body) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        tracing::debug!("Analyze worker {} exiting", self.id);
    }

    // Returns false once the frontier has failed and the worker should exit
    fn process(&self, body: ResponseBody) -> bool {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.analyzer.analyze(&body)));
        let Extraction { urls, records } = match outcome {
            Ok(Ok(extraction)) => extraction,
            Ok(Err(e)) => {
                tracing::warn!("Analysis failed: {}", e);
                CrawlCounters::incr(&self.counters.analyze_failures);
                return true;
            }
            Err(_) => {
                tracing::warn!("Analyzer panicked on {}, dropping body", body.url);
                CrawlCounters::incr(&self.counters.analyze_failures);
                return true;
            }
        };
        CrawlCounters::incr(&self.counters.responses_analyzed);

        let forwarded = self.forward_urls(&body.url, &urls);
        self.store_records(&body.url, records);
        forwarded
    }

    fn forward_urls(&self, source: &str, urls: &[String]) -> bool {
        if urls.is_empty() {
            return true;
        }
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.frontier.discover(urls)));
        let failure = match outcome {
            Ok(Ok(admitted)) => {
                CrawlCounters::add(&self.counters.urls_discovered, admitted as u64);
                tracing::debug!(
                    "{} of {} URLs from {} admitted to the frontier",
                    admitted,
                    urls.len(),
                    source
                );
                return true;
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => "frontier panicked".to_string(),
        };

        tracing::error!("Could not forward URLs from {}: {}", source, failure);
        self.fatal.raise(format!("frontier discover() failed: {}", failure));
        false
    }

    fn store_records(&self, source: &str, records: Vec<A::Record>) {
        if records.is_empty() {
            return;
        }
        let count = records.len() as u64;
        CrawlCounters::add(&self.counters.records_extracted, count);

        match panic::catch_unwind(AssertUnwindSafe(|| self.sink.store(records))) {
            Ok(Ok(())) => CrawlCounters::add(&self.counters.records_stored, count),
            Ok(Err(e)) => {
                tracing::warn!("Sink rejected {} records from {}: {}", count, source, e);
                CrawlCounters::incr(&self.counters.sink_failures);
            }
            Err(_) => {
                tracing::warn!("Sink panicked storing {} records from {}", count, source);
                CrawlCounters::incr(&self.counters.sink_failures);
            }
        }
    }
}
