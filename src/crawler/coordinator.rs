//! Crawler coordinator - lifecycle of the two worker pools
//!
//! The coordinator owns the frontier, the transport, the analyzer, the sink
//! and the handoff buffer between the pools. It starts the pools in flow
//! order and stops them in a fixed order so that no fetched body is lost:
//!
//! 1. cancel the statistics reporter
//! 2. stop and join the fetch pool
//! 3. close the handoff buffer and wait for it to drain
//! 4. stop and join the analyze pool
//! 5. report final statistics

use crate::config::{Config, CrawlSettings};
use crate::crawler::analyze_pool::AnalyzePool;
use crate::crawler::counters::{CounterSnapshot, CrawlCounters};
use crate::crawler::fetch_pool::FetchPool;
use crate::crawler::fetcher::{HttpTransport, ReqwestTransport};
use crate::crawler::handoff::{Drain, HandoffBuffer};
use crate::crawler::signal::FatalSignal;
use crate::frontier::{open_frontier, Frontier};
use crate::output::{CrawlStatistics, StatsReporter, StatsSource};
use crate::pipeline::{Analyzer, Sink};
use crate::state::CrawlState;
use crate::{ConfigError, RelayError, Result};
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main crawler coordinator structure
pub struct Coordinator<A: Analyzer> {
    frontier: Arc<dyn Frontier>,
    transport: Arc<dyn HttpTransport>,
    analyzer: Arc<A>,
    sink: Arc<dyn Sink<A::Record>>,
    buffer: Arc<HandoffBuffer>,
    counters: Arc<CrawlCounters>,
    fatal: FatalSignal,
    settings: CrawlSettings,
    state: CrawlState,
    started_at: Instant,
    fetch_pool: Option<FetchPool>,
    analyze_pool: Option<AnalyzePool>,
    reporter: Option<StatsReporter>,
}

impl<A: Analyzer> Coordinator<A> {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `frontier` - Deduplicating URL store shared by both pools
    /// * `transport` - Network retrieval used by the fetch pool
    /// * `analyzer` - Turns bodies into URLs and records
    /// * `sink` - Receives extracted records
    /// * `settings` - Pool sizes and timings
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to seed and start
    /// * `Err(RelayError)` - Invalid settings or an unreachable frontier
    pub fn new(
        frontier: Arc<dyn Frontier>,
        transport: Arc<dyn HttpTransport>,
        analyzer: Arc<A>,
        sink: Arc<dyn Sink<A::Record>>,
        settings: CrawlSettings,
    ) -> Result<Self> {
        if settings.fetch_workers == 0 {
            return Err(ConfigError::Validation("fetch pool size must be at least 1".into()).into());
        }
        if settings.analyze_workers == 0 {
            return Err(
                ConfigError::Validation("analyze pool size must be at least 1".into()).into(),
            );
        }
        frontier.check()?;

        Ok(Self {
            frontier,
            transport,
            analyzer,
            sink,
            buffer: Arc::new(HandoffBuffer::with_soft_limit(settings.buffer_soft_limit)),
            counters: Arc::new(CrawlCounters::new()),
            fatal: FatalSignal::new(),
            settings,
            state: CrawlState::Created,
            started_at: Instant::now(),
            fetch_pool: None,
            analyze_pool: None,
            reporter: None,
        })
    }

    /// Builds the frontier backend and the HTTP transport from configuration
    pub fn from_config(
        config: &Config,
        analyzer: Arc<A>,
        sink: Arc<dyn Sink<A::Record>>,
    ) -> Result<Self> {
        let frontier = open_frontier(&config.frontier)?;
        let transport = ReqwestTransport::from_config(
            &config.user_agent,
            Duration::from_secs(config.fetch.request_timeout),
        )?;
        Self::new(
            frontier,
            Arc::new(transport),
            analyzer,
            sink,
            CrawlSettings::try_from(config)?,
        )
    }

    /// Admits the initial URLs, optionally wiping the frontier first
    ///
    /// Only allowed while no pool is running. Returns the number of URLs
    /// newly admitted.
    pub fn seed(&mut self, urls: &[String], reset: bool) -> Result<usize> {
        if !self.state.is_idle() {
            return Err(RelayError::NotIdle(self.state));
        }
        if reset {
            tracing::info!("Clearing frontier before seeding");
            self.frontier.clear()?;
        }
        let admitted = self.frontier.seed(urls)?;
        tracing::info!("Seeded {} of {} URLs", admitted, urls.len());
        Ok(admitted)
    }

    /// Starts the reporter, the analyze pool and then the fetch pool
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<()> {
        if !self.state.can_transition_to(CrawlState::Running) {
            return Err(RelayError::InvalidTransition {
                from: self.state,
                to: CrawlState::Running,
            });
        }
        tokio::runtime::Handle::try_current()?;
        self.frontier.check()?;

        self.fatal.reset();
        self.buffer.reopen();
        self.started_at = Instant::now();

        let reporter = StatsReporter::spawn(self.stats_source(), self.settings.stats_interval);

        // Consumers first, so fetched bodies always have somewhere to go
        let analyze_pool = AnalyzePool::spawn(
            Arc::clone(&self.analyzer),
            Arc::clone(&self.sink),
            Arc::clone(&self.frontier),
            &self.buffer,
            Arc::clone(&self.counters),
            self.fatal.clone(),
            &self.settings,
        )?;
        let fetch_pool = FetchPool::spawn(
            Arc::clone(&self.frontier),
            Arc::clone(&self.transport),
            Arc::clone(&self.buffer),
            Arc::clone(&self.counters),
            self.fatal.clone(),
            &self.settings,
        );

        self.reporter = Some(reporter);
        self.analyze_pool = Some(analyze_pool);
        self.fetch_pool = Some(fetch_pool);
        self.state = CrawlState::Running;

        tracing::info!(
            "Crawl started with {} fetch and {} analyze workers",
            self.settings.fetch_workers,
            self.settings.analyze_workers
        );
        Ok(())
    }

    /// Stops both pools in order and returns the final statistics
    pub async fn stop(&mut self) -> Result<CrawlStatistics> {
        if !self.state.can_transition_to(CrawlState::Stopping) {
            return Err(RelayError::InvalidTransition {
                from: self.state,
                to: CrawlState::Stopping,
            });
        }
        self.state = CrawlState::Stopping;
        tracing::info!("Stopping crawl");

        let shutdown = self.shutdown().await;
        self.state = CrawlState::Stopped;
        shutdown?;

        let stats = self.statistics()?;
        tracing::info!("Crawl stopped after {:.1}s", stats.elapsed.as_secs_f64());
        stats.log();
        Ok(stats)
    }

    async fn shutdown(&mut self) -> Result<()> {
        if let Some(reporter) = self.reporter.take() {
            reporter.stop().await;
        }

        if let Some(pool) = self.fetch_pool.take() {
            pool.stop();
            pool.join().await;
        }

        self.buffer.close();
        let Some(pool) = self.analyze_pool.take() else {
            return Ok(());
        };

        // Drain and join share one blocking task so the pool is stopped on
        // every exit path, including a panic while waiting
        let buffer = Arc::clone(&self.buffer);
        let timeout = self.settings.drain_timeout;
        let drain = tokio::task::spawn_blocking(move || {
            let outcome = buffer.wait_drained(timeout, || pool.live_workers() > 0);
            pool.stop();
            pool.join();
            outcome
        })
        .await?;

        match drain {
            Drain::Drained => {}
            Drain::TimedOut => tracing::error!(
                "Drain timeout elapsed with {} responses still buffered; they wait for the next start",
                self.buffer.len()
            ),
            Drain::Abandoned => tracing::error!(
                "No analyze worker left with {} responses still buffered; they wait for the next start",
                self.buffer.len()
            ),
        }
        Ok(())
    }

    /// Starts, runs until `shutdown` resolves or a fatal error occurs, then stops
    ///
    /// A fatal frontier error still goes through the ordered stop before it
    /// is returned as `RelayError::FrontierFatal`.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<CrawlStatistics>
    where
        F: Future<Output = ()>,
    {
        self.start()?;

        let fatal = self.fatal.clone();
        let failure = tokio::select! {
            _ = shutdown => None,
            message = fatal.wait() => Some(message),
        };
        if let Some(message) = &failure {
            tracing::error!("Stopping crawl after fatal error: {}", message);
        }

        let stats = self.stop().await?;
        match failure {
            Some(message) => Err(RelayError::FrontierFatal(message)),
            None => Ok(stats),
        }
    }

    /// Resolves once the crawl has run out of work
    ///
    /// Idle means an empty frontier, an empty buffer and no in-flight item,
    /// observed on two consecutive polls with unchanged counters.
    pub async fn wait_until_idle(&self, poll: Duration) -> Result<()> {
        let mut previous: Option<CounterSnapshot> = None;

        loop {
            if let Some(message) = self.fatal.message() {
                return Err(RelayError::FrontierFatal(message));
            }
            if self.state != CrawlState::Running {
                return Err(RelayError::NotRunning(self.state));
            }

            match self.observe_idle()? {
                Some(snapshot) if previous == Some(snapshot) => {
                    tracing::info!("Crawl is idle");
                    return Ok(());
                }
                observed => previous = observed,
            }

            tokio::time::sleep(poll).await;
        }
    }

    // Checks the stages in flow order; an item moving downstream between two
    // checks shows up in a later stage or in the counters.
    fn observe_idle(&self) -> Result<Option<CounterSnapshot>> {
        if !self.frontier.is_empty()? {
            return Ok(None);
        }
        if self.counters.in_flight_fetches.load(Ordering::SeqCst) > 0 {
            return Ok(None);
        }
        if !self.buffer.is_empty() {
            return Ok(None);
        }
        if self.counters.in_flight_analyses.load(Ordering::SeqCst) > 0 {
            return Ok(None);
        }
        Ok(Some(self.counters.snapshot()))
    }

    /// Current statistics snapshot
    pub fn statistics(&self) -> Result<CrawlStatistics> {
        Ok(self.stats_source().collect()?)
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    fn stats_source(&self) -> StatsSource {
        StatsSource {
            frontier: Arc::clone(&self.frontier),
            counters: Arc::clone(&self.counters),
            buffer: Arc::clone(&self.buffer),
            started_at: self.started_at,
        }
    }
}

impl<A: Analyzer> Drop for Coordinator<A> {
    fn drop(&mut self) {
        // Pools signal their own workers on drop; closing the buffer lets
        // idle analyze threads exit without waiting for the stop flag
        if self.state == CrawlState::Running {
            tracing::warn!("Coordinator dropped while running; workers are detached");
            self.buffer.close();
        }
    }
}
