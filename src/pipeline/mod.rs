//! Pluggable stages around the engine
//!
//! This module contains:
//! - The `Analyzer` and `Sink` capability traits
//! - `HtmlAnalyzer`, a CSS-selector based analyzer
//! - `SqliteSink`, a record sink backed by SQLite

mod html;
mod sqlite_sink;
mod traits;

pub use html::{HtmlAnalyzer, ScrapedItem};
pub use sqlite_sink::SqliteSink;
pub use traits::{AnalyzeError, Analyzer, Extraction, ResponseBody, Sink, SinkError};
