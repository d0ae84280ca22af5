//! SQLite-backed frontier
//!
//! Keeps the seen set and pending queue on disk so an interrupted crawl can
//! resume where it stopped. Every operation runs in a single transaction on
//! a connection guarded by a mutex.

use crate::frontier::schema::initialize_schema;
use crate::frontier::traits::{Frontier, FrontierError, FrontierResult, FrontierStats};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Durable frontier stored in a SQLite database
pub struct SqliteFrontier {
    conn: Mutex<Connection>,
}

impl SqliteFrontier {
    /// Opens (or creates) a frontier database at `path`
    ///
    /// Existing seen and pending URLs are kept; call `clear` for a fresh crawl.
    pub fn open(path: &Path) -> FrontierResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database (for testing)
    pub fn open_in_memory() -> FrontierResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> FrontierResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| FrontierError::Poisoned)
    }
}

impl Frontier for SqliteFrontier {
    fn discover(&self, urls: &[String]) -> FrontierResult<usize> {
        if urls.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        let mut admitted = 0;
        {
            let mut mark_seen =
                tx.prepare_cached("INSERT OR IGNORE INTO seen_urls (url, admitted_at) VALUES (?1, ?2)")?;
            let mut enqueue = tx.prepare_cached("INSERT INTO pending_urls (url) VALUES (?1)")?;

            for url in urls {
                // One changed row means this is the URL's first insertion
                if mark_seen.execute(params![url, now])? == 1 {
                    enqueue.execute(params![url])?;
                    admitted += 1;
                }
            }
        }
        tx.commit()?;

        Ok(admitted)
    }

    fn next(&self) -> FrontierResult<Option<String>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let head: Option<(i64, String)> = tx
            .query_row(
                "SELECT id, url FROM pending_urls ORDER BY id ASC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        if let Some((id, _)) = &head {
            tx.execute("DELETE FROM pending_urls WHERE id = ?1", params![id])?;
        }
        tx.commit()?;

        Ok(head.map(|(_, url)| url))
    }

    fn stats(&self) -> FrontierResult<FrontierStats> {
        let conn = self.lock()?;
        let seen: i64 = conn.query_row("SELECT COUNT(*) FROM seen_urls", [], |row| row.get(0))?;
        let pending: i64 =
            conn.query_row("SELECT COUNT(*) FROM pending_urls", [], |row| row.get(0))?;
        Ok(FrontierStats {
            seen: seen as u64,
            pending: pending as u64,
        })
    }

    fn clear(&self) -> FrontierResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM pending_urls", [])?;
        tx.execute("DELETE FROM seen_urls", [])?;
        tx.commit()?;
        Ok(())
    }

    fn check(&self) -> FrontierResult<()> {
        let conn = self.lock()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }
}
