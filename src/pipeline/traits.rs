//! Analyzer and sink capability traits
//!
//! The engine never looks inside a response or a record: it hands bodies to
//! an `Analyzer` and records to a `Sink`, both supplied by the caller.

use thiserror::Error;

/// A successful fetch waiting to be analyzed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseBody {
    /// The URL that was fetched
    pub url: String,
    /// HTTP status code of the response
    pub status: u16,
    /// Response text
    pub body: String,
}

impl ResponseBody {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status,
            body: body.into(),
        }
    }
}

/// What an analyzer found in one response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction<R> {
    /// URLs to offer to the frontier
    pub urls: Vec<String>,
    /// Records to forward to the sink
    pub records: Vec<R>,
}

impl<R> Extraction<R> {
    pub fn new(urls: Vec<String>, records: Vec<R>) -> Self {
        Self { urls, records }
    }
}

/// Errors raised by an analyzer for a single response
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("Failed to analyze {url}: {message}")]
    Failed { url: String, message: String },
}

/// Errors raised by a sink while storing one batch of records
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Sink lock poisoned")]
    Poisoned,

    #[error("Sink rejected records: {0}")]
    Rejected(String),
}

/// Turns a response body into new URLs and records
///
/// Runs on the analyze worker threads, so implementations may be CPU heavy
/// but must be shareable across threads.
pub trait Analyzer: Send + Sync + 'static {
    /// The record type this analyzer produces
    type Record: Send + 'static;

    fn analyze(&self, body: &ResponseBody) -> Result<Extraction<Self::Record>, AnalyzeError>;
}

/// Persists extracted records
pub trait Sink<R>: Send + Sync + 'static {
    fn store(&self, records: Vec<R>) -> Result<(), SinkError>;
}
