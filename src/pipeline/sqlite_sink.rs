//! SQLite record sink
//!
//! Appends `ScrapedItem` records to an `items` table, one transaction per
//! batch handed over by an analyze worker.

use crate::pipeline::html::ScrapedItem;
use crate::pipeline::traits::{Sink, SinkError};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

const ITEMS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_url TEXT NOT NULL,
    title TEXT,
    link TEXT,
    text TEXT,
    stored_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_page_url ON items(page_url);
"#;

/// Sink that writes scraped items to SQLite
pub struct SqliteSink {
    conn: Mutex<Connection>,
}

impl SqliteSink {
    /// Opens (or creates) the items database at `path`
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;
        conn.execute_batch(ITEMS_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, SinkError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(ITEMS_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Counts stored items
    pub fn count(&self) -> Result<u64, SinkError> {
        let conn = self.conn.lock().map_err(|_| SinkError::Poisoned)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Loads every stored item in insertion order
    pub fn load_all(&self) -> Result<Vec<ScrapedItem>, SinkError> {
        let conn = self.conn.lock().map_err(|_| SinkError::Poisoned)?;
        let mut stmt =
            conn.prepare("SELECT page_url, title, link, text FROM items ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(ScrapedItem {
                page_url: row.get(0)?,
                title: row.get(1)?,
                link: row.get(2)?,
                text: row.get(3)?,
            })
        })?;

        let mut items = Vec::new();
        for item in rows {
            items.push(item?);
        }
        Ok(items)
    }
}

impl Sink<ScrapedItem> for SqliteSink {
    fn store(&self, records: Vec<ScrapedItem>) -> Result<(), SinkError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().map_err(|_| SinkError::Poisoned)?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        {
            let mut insert = tx.prepare_cached(
                "INSERT INTO items (page_url, title, link, text, stored_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in &records {
                insert.execute(params![
                    record.page_url,
                    record.title,
                    record.link,
                    record.text,
                    now
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!("Stored {} records", records.len());
        Ok(())
    }
}
