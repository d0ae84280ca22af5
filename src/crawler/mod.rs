//! Crawler module: the engine between frontier, analyzer and sink
//!
//! This module contains the core crawling logic, including:
//! - HTTP retrieval behind the `HttpTransport` seam
//! - The handoff buffer between fetching and analysis
//! - The fetch and analyze worker pools
//! - Overall crawl coordination and shutdown ordering

mod analyze_pool;
mod coordinator;
mod counters;
mod fetch_pool;
mod fetcher;
mod handoff;
mod signal;

pub use analyze_pool::AnalyzePool;
pub use coordinator::Coordinator;
pub use counters::{CounterSnapshot, CrawlCounters};
pub use fetch_pool::FetchPool;
pub use fetcher::{
    build_http_client, format_user_agent, FetchResponse, HttpTransport, ReqwestTransport,
    TransportError,
};
pub use handoff::{Drain, HandoffBuffer};
pub use signal::FatalSignal;
