//! Frontier trait and error types
//!
//! This module defines the interface every frontier backend implements.

use thiserror::Error;

/// Errors raised by a frontier backing store
///
/// Any of these is fatal to a running crawl: admission atomicity cannot be
/// guaranteed once the store misbehaves.
#[derive(Debug, Error)]
pub enum FrontierError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Frontier lock poisoned")]
    Poisoned,

    #[error("Frontier store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for frontier operations
pub type FrontierResult<T> = Result<T, FrontierError>;

/// Point-in-time sizes of the frontier's two collections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrontierStats {
    /// URLs ever admitted
    pub seen: u64,
    /// URLs waiting to be fetched
    pub pending: u64,
}

/// Deduplicating URL queue shared by the fetch and analyze pools
///
/// Implementations guard the seen set and the pending queue together, so
/// that "first insertion into the seen set" and "append to the pending
/// queue" happen as one step. A URL is therefore handed out by `next` at
/// most once between two calls to `clear`.
pub trait Frontier: Send + Sync {
    /// Admits the initial URLs of a crawl
    ///
    /// Returns the number of URLs that were new.
    fn seed(&self, urls: &[String]) -> FrontierResult<usize> {
        self.discover(urls)
    }

    /// Admits URLs found while analyzing a response
    ///
    /// URLs already seen, and repeats within `urls`, are dropped silently.
    /// Returns the number of URLs that were new.
    fn discover(&self, urls: &[String]) -> FrontierResult<usize>;

    /// Removes and returns the oldest pending URL
    ///
    /// `Ok(None)` means the queue is currently empty. This never blocks.
    fn next(&self) -> FrontierResult<Option<String>>;

    /// Returns true if no URL is pending
    fn is_empty(&self) -> FrontierResult<bool> {
        Ok(self.stats()?.pending == 0)
    }

    /// Returns the current seen and pending counts
    fn stats(&self) -> FrontierResult<FrontierStats>;

    /// Forgets every seen and pending URL
    fn clear(&self) -> FrontierResult<()>;

    /// Verifies that the backing store is reachable
    fn check(&self) -> FrontierResult<()> {
        self.stats().map(|_| ())
    }
}
