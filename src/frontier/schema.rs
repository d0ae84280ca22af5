//! Database schema for the durable frontier

/// SQL schema for the frontier database
pub const SCHEMA_SQL: &str = r#"
-- Every URL ever admitted
CREATE TABLE IF NOT EXISTS seen_urls (
    url TEXT PRIMARY KEY NOT NULL,
    admitted_at TEXT NOT NULL
);

-- URLs waiting to be fetched, oldest id first
CREATE TABLE IF NOT EXISTS pending_urls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE REFERENCES seen_urls(url)
);
"#;

/// Initializes the frontier schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
