//! ALFA Media Vault - Media Index
//!
//! SQLite record of media metadata, tags and their association.
//! Holds no key material. Nonces are stored in the clear.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

/// Rows per search page
pub const PAGE_SIZE: i64 = 10;

/// How long a writer waits on a lock held by another connection
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS media (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        description TEXT,
        encrypted_path TEXT NOT NULL,
        iv TEXT NOT NULL,
        mimetype TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE TABLE IF NOT EXISTS tags (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS media_tags (
        media_id INTEGER NOT NULL,
        tag_id INTEGER NOT NULL,
        PRIMARY KEY (media_id, tag_id),
        FOREIGN KEY (media_id) REFERENCES media(id) ON DELETE CASCADE,
        FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_media_created ON media(created_at);
    CREATE INDEX IF NOT EXISTS idx_media_tags_tag ON media_tags(tag_id);
"#;

const MEDIA_COLUMNS: &str =
    "m.id, m.title, m.description, m.encrypted_path, m.iv, m.mimetype, m.created_at";

/// Substring match on title, description or any tag name. `?1` is the pattern.
const MATCH_CLAUSE: &str = r#"
    m.title LIKE ?1 ESCAPE '\'
    OR m.description LIKE ?1 ESCAPE '\'
    OR EXISTS (
        SELECT 1 FROM media_tags mt
        JOIN tags t ON t.id = mt.tag_id
        WHERE mt.media_id = m.id AND t.name LIKE ?1 ESCAPE '\'
    )
"#;

/// One media item as recorded in the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Blob file name inside the blob directory
    pub blob_path: String,
    /// Hex-encoded AES-GCM nonce of the blob
    pub nonce: String,
    pub mimetype: String,
    pub created_at: DateTime<Utc>,
}

impl MediaRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let created_raw: String = row.get(6)?;
        let created_at = DateTime::parse_from_rfc3339(&created_raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
            })?;

        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            blob_path: row.get(3)?,
            nonce: row.get(4)?,
            mimetype: row.get(5)?,
            created_at,
        })
    }
}

/// Fields for a new media row
#[derive(Debug, Clone)]
pub struct NewMedia<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub blob_path: &'a str,
    pub nonce_hex: &'a str,
    pub mimetype: &'a str,
}

/// One page of search results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPage {
    pub rows: Vec<MediaRecord>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

/// Media Index
pub struct MediaIndex {
    conn: Mutex<Connection>,
}

impl MediaIndex {
    /// Open (or create) the index at `path`
    pub fn open(path: &Path) -> VaultResult<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Private in-memory index
    pub fn open_in_memory() -> VaultResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> VaultResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a media row, returning its id
    pub fn insert(&self, media: &NewMedia<'_>) -> VaultResult<i64> {
        self.insert_with_tags(media, "")
    }

    /// Insert a media row and its tags in one transaction.
    ///
    /// Either the row and every tag link are committed, or nothing is.
    pub fn insert_with_tags(&self, media: &NewMedia<'_>, raw_tags: &str) -> VaultResult<i64> {
        let names = parse_tags(raw_tags);

        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO media (title, description, encrypted_path, iv, mimetype)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                media.title,
                media.description,
                media.blob_path,
                media.nonce_hex,
                media.mimetype
            ],
        )?;
        let media_id = tx.last_insert_rowid();

        link_tags(&tx, media_id, &names)?;

        tx.commit()?;
        Ok(media_id)
    }

    /// Attach a comma-separated tag list. Idempotent.
    pub fn attach_tags(&self, media_id: i64, raw: &str) -> VaultResult<()> {
        let names = parse_tags(raw);
        if names.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock();
        // IMMEDIATE takes the write lock up front so other connections wait
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists = tx
            .query_row("SELECT 1 FROM media WHERE id = ?1", params![media_id], |_| Ok(()))
            .optional()?;
        if exists.is_none() {
            return Err(VaultError::MediaNotFound(media_id));
        }

        link_tags(&tx, media_id, &names)?;

        tx.commit()?;
        Ok(())
    }

    /// Get media by id
    pub fn get(&self, media_id: i64) -> VaultResult<MediaRecord> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM media m WHERE m.id = ?1", MEDIA_COLUMNS),
            params![media_id],
            MediaRecord::from_row,
        )
        .optional()?
        .ok_or(VaultError::MediaNotFound(media_id))
    }

    /// Tag names attached to a media item, sorted
    pub fn tags_for(&self, media_id: i64) -> VaultResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT t.name FROM tags t
             JOIN media_tags mt ON mt.tag_id = t.id
             WHERE mt.media_id = ?1
             ORDER BY t.name",
        )?;
        let names = stmt
            .query_map(params![media_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Case-insensitive substring search, newest first.
    ///
    /// Pages start at 1; anything lower is treated as 1.
    pub fn search(&self, query: &str, page: i64) -> VaultResult<SearchPage> {
        let page = page.max(1);
        let pattern = like_pattern(query);
        let offset = (page - 1).saturating_mul(PAGE_SIZE);

        let conn = self.conn.lock();

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM media m WHERE {}", MATCH_CLAUSE),
            params![pattern],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM media m WHERE {}
             ORDER BY m.created_at DESC, m.id DESC
             LIMIT ?2 OFFSET ?3",
            MEDIA_COLUMNS, MATCH_CLAUSE
        ))?;
        let rows = stmt
            .query_map(params![pattern, PAGE_SIZE, offset], MediaRecord::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SearchPage {
            rows,
            total,
            page,
            per_page: PAGE_SIZE,
            total_pages: (total + PAGE_SIZE - 1) / PAGE_SIZE,
        })
    }

    /// Delete a media row and return its blob path. Tag links cascade.
    pub fn delete(&self, media_id: i64) -> VaultResult<String> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let blob_path: String = tx
            .query_row(
                "SELECT encrypted_path FROM media WHERE id = ?1",
                params![media_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(VaultError::MediaNotFound(media_id))?;

        tx.execute("DELETE FROM media WHERE id = ?1", params![media_id])?;
        tx.commit()?;

        Ok(blob_path)
    }

    /// Count media rows
    pub fn count(&self) -> VaultResult<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM media", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Create missing tags and link them to `media_id`
fn link_tags(tx: &Transaction<'_>, media_id: i64, names: &[String]) -> VaultResult<()> {
    for name in names {
        // The UNIQUE(name) constraint settles concurrent creators
        tx.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", params![name])?;
        let tag_id: i64 =
            tx.query_row("SELECT id FROM tags WHERE name = ?1", params![name], |row| row.get(0))?;
        tx.execute(
            "INSERT OR IGNORE INTO media_tags (media_id, tag_id) VALUES (?1, ?2)",
            params![media_id, tag_id],
        )?;
    }
    Ok(())
}

/// Split on commas, trim, lower-case, drop empties, keep first occurrence
pub fn parse_tags(raw: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for candidate in raw.split(',') {
        let name = candidate.trim().to_lowercase();
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// `%query%` with LIKE wildcards in the query escaped
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
