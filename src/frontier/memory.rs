//! In-process frontier
//!
//! Both collections live behind one mutex. Nothing survives the process.

use crate::frontier::traits::{Frontier, FrontierError, FrontierResult, FrontierStats};
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct FrontierInner {
    seen: HashSet<String>,
    pending: VecDeque<String>,
}

/// Frontier backed by a `HashSet` and a `VecDeque`
#[derive(Debug, Default)]
pub struct MemoryFrontier {
    inner: Mutex<FrontierInner>,
}

impl MemoryFrontier {
    /// Creates an empty frontier
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> FrontierResult<MutexGuard<'_, FrontierInner>> {
        self.inner.lock().map_err(|_| FrontierError::Poisoned)
    }
}

impl Frontier for MemoryFrontier {
    fn discover(&self, urls: &[String]) -> FrontierResult<usize> {
        if urls.is_empty() {
            return Ok(0);
        }

        let mut inner = self.lock()?;
        let mut admitted = 0;
        for url in urls {
            if inner.seen.insert(url.clone()) {
                inner.pending.push_back(url.clone());
                admitted += 1;
            }
        }
        Ok(admitted)
    }

    fn next(&self) -> FrontierResult<Option<String>> {
        Ok(self.lock()?.pending.pop_front())
    }

    fn is_empty(&self) -> FrontierResult<bool> {
        Ok(self.lock()?.pending.is_empty())
    }

    fn stats(&self) -> FrontierResult<FrontierStats> {
        let inner = self.lock()?;
        Ok(FrontierStats {
            seen: inner.seen.len() as u64,
            pending: inner.pending.len() as u64,
        })
    }

    fn clear(&self) -> FrontierResult<()> {
        let mut inner = self.lock()?;
        inner.seen.clear();
        inner.pending.clear();
        Ok(())
    }
}
