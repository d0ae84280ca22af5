//! State module for the crawl lifecycle
//!
//! # Components
//!
//! - `CrawlState`: Tracks where the coordinator is in its start/stop lifecycle

mod crawl_state;

pub use crawl_state::CrawlState;
