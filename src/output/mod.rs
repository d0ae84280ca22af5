//! Output module for crawl statistics
//!
//! This module handles:
//! - Collecting statistics snapshots from a running crawl
//! - Periodic progress reporting through `tracing`
//! - Printing statistics for the command line

pub mod stats;

pub use stats::{
    print_frontier_stats, print_statistics, CrawlStatistics, StatsReporter, StatsSource,
};
