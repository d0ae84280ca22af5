//! URL frontier: the deduplicating queue between discovery and fetching
//!
//! This module contains:
//! - The `Frontier` trait shared by every backend
//! - `MemoryFrontier`, an in-process set + queue
//! - `SqliteFrontier`, a durable store that survives restarts

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryFrontier;
pub use sqlite::SqliteFrontier;
pub use traits::{Frontier, FrontierError, FrontierResult, FrontierStats};

use crate::config::{FrontierBackend, FrontierConfig};
use std::path::Path;
use std::sync::Arc;

/// Opens the frontier backend selected by the configuration
///
/// # Arguments
///
/// * `config` - The frontier section of the configuration
///
/// # Returns
///
/// * `Ok(Arc<dyn Frontier>)` - A ready frontier
/// * `Err(FrontierError)` - The backing store could not be opened
pub fn open_frontier(config: &FrontierConfig) -> FrontierResult<Arc<dyn Frontier>> {
    match config.backend {
        FrontierBackend::Memory => Ok(Arc::new(MemoryFrontier::new())),
        FrontierBackend::Sqlite => {
            let path = config.database_path.as_deref().ok_or_else(|| {
                FrontierError::Unavailable("no database-path configured".to_string())
            })?;
            tracing::info!("Opening durable frontier at {}", path);
            Ok(Arc::new(SqliteFrontier::open(Path::new(path))?))
        }
    }
}
