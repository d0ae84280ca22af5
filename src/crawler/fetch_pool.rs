//! Fetch pool: concurrent workers moving URLs from the frontier to the buffer
//!
//! Each worker is a tokio task. A worker never calls `next()` after the stop
//! signal, and an in-flight request always finishes before the worker exits.

use crate::config::CrawlSettings;
use crate::crawler::counters::CrawlCounters;
use crate::crawler::fetcher::HttpTransport;
use crate::crawler::handoff::HandoffBuffer;
use crate::crawler::signal::FatalSignal;
use crate::frontier::Frontier;
use crate::pipeline::ResponseBody;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle to a running set of fetch workers
pub struct FetchPool {
    stop: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

struct FetchWorker {
    id: usize,
    frontier: Arc<dyn Frontier>,
    transport: Arc<dyn HttpTransport>,
    buffer: Arc<HandoffBuffer>,
    counters: Arc<CrawlCounters>,
    fatal: FatalSignal,
    politeness_delay: Duration,
    idle_backoff: Duration,
    stop: watch::Receiver<bool>,
}

impl FetchPool {
    /// Spawns `settings.fetch_workers` workers on the current runtime
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        frontier: Arc<dyn Frontier>,
        transport: Arc<dyn HttpTransport>,
        buffer: Arc<HandoffBuffer>,
        counters: Arc<CrawlCounters>,
        fatal: FatalSignal,
        settings: &CrawlSettings,
    ) -> Self {
        let (stop, stop_rx) = watch::channel(false);

        let handles = (0..settings.fetch_workers)
            .map(|id| {
                let worker = FetchWorker {
                    id,
                    frontier: Arc::clone(&frontier),
                    transport: Arc::clone(&transport),
                    buffer: Arc::clone(&buffer),
                    counters: Arc::clone(&counters),
                    fatal: fatal.clone(),
                    politeness_delay: settings.politeness_delay,
                    idle_backoff: settings.idle_backoff,
                    stop: stop_rx.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect::<Vec<_>>();

        tracing::info!("Started {} fetch workers", handles.len());
        Self { stop, handles }
    }

    /// Tells every worker to exit after its current item
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// Waits for every worker to exit
    pub async fn join(mut self) {
        for handle in std::mem::take(&mut self.handles) {
            if let Err(e) = handle.await {
                tracing::error!("Fetch worker terminated abnormally: {}", e);
            }
        }
        tracing::debug!("Fetch pool joined");
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Drop for FetchPool {
    fn drop(&mut self) {
        self.stop.send_replace(true);
    }
}

impl FetchWorker {
    async fn run(mut self) {
        let counters = Arc::clone(&self.counters);
        tracing::debug!("Fetch worker {} started", self.id);

        // A raised fatal signal retires every worker; the store is not polled again
        while !self.stopped() && !self.fatal.is_raised() {
            // The gauge covers the window between next() and the push
            let in_flight = CrawlCounters::track(&counters.in_flight_fetches);
            let url = match self.frontier.next() {
                Ok(Some(url)) => url,
                Ok(None) => {
                    drop(in_flight);
                    self.pause(self.idle_backoff).await;
                    continue;
                }
                Err(e) => {
                    tracing::error!("Fetch worker {} could not read the frontier: {}", self.id, e);
                    self.fatal.raise(format!("frontier next() failed: {}", e));
                    break;
                }
            };

            self.fetch_one(&url).await;
            drop(in_flight);

            self.pause(self.politeness_delay).await;
        }

        tracing::debug!("Fetch worker {} exiting", self.id);
    }

    async fn fetch_one(&self, url: &str) {
        tracing::debug!("Fetching {}", url);

        match self.transport.fetch(url).await {
            Ok(response) if response.is_success() => {
                if response.url != url {
                    tracing::debug!("{} redirected to {}", url, response.url);
                }
                let body = ResponseBody::new(response.url, response.status, response.body);
                match self.buffer.push(body) {
                    Ok(()) => CrawlCounters::incr(&self.counters.responses_fetched),
                    Err(body) => {
                        tracing::warn!("Handoff buffer closed, dropping response for {}", body.url);
                        CrawlCounters::incr(&self.counters.fetch_failures);
                    }
                }
            }
            Ok(response) => {
                tracing::warn!("HTTP {} for {}, discarding", response.status, url);
                CrawlCounters::incr(&self.counters.fetch_failures);
            }
            Err(e) => {
                tracing::warn!("Fetch failed: {}", e);
                CrawlCounters::incr(&self.counters.fetch_failures);
            }
        }
    }

    fn stopped(&self) -> bool {
        *self.stop.borrow() || self.stop.has_changed().is_err()
    }

    // Sleeps for `duration`, waking early on stop
    async fn pause(&mut self, duration: Duration) {
        if duration.is_zero() {
            tokio::task::yield_now().await;
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.stop.changed() => {}
        }
    }
}
