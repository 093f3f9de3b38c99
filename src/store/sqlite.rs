// src/store/sqlite.rs
//! SQLite-backed store. Timestamps are stored as unix seconds (UTC).

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use tracing::{debug, info};

use super::{
    BatchOutcome, Category, NewNews, News, NewsId, NewsStore, ScoredNews, Source, StoreError,
};
use crate::ingest::types::SourceKind;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS news_sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    url TEXT NOT NULL,
    source_type TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);
CREATE TABLE IF NOT EXISTS news_categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);
CREATE TABLE IF NOT EXISTS news (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    title_translated TEXT,
    content TEXT NOT NULL DEFAULT '',
    summary TEXT NOT NULL DEFAULT '',
    summary_translated TEXT,
    url TEXT NOT NULL UNIQUE,
    image_url TEXT,
    author TEXT,
    source_id INTEGER NOT NULL REFERENCES news_sources(id),
    category_id INTEGER REFERENCES news_categories(id),
    published_at INTEGER NOT NULL,
    scraped_at INTEGER NOT NULL,
    importance_score REAL NOT NULL DEFAULT 0,
    keywords TEXT NOT NULL DEFAULT '',
    language TEXT NOT NULL DEFAULT 'en',
    is_processed INTEGER NOT NULL DEFAULT 0,
    is_featured INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_published_at ON news(published_at);
CREATE INDEX IF NOT EXISTS idx_importance_score ON news(importance_score);
CREATE INDEX IF NOT EXISTS idx_source_published ON news(source_id, published_at);
CREATE INDEX IF NOT EXISTS idx_featured ON news(is_featured);
";

const NEWS_COLUMNS: &str = "id, title, title_translated, content, summary, summary_translated, url, \
     image_url, author, source_id, category_id, published_at, scraped_at, importance_score, \
     keywords, language, is_processed, is_featured";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file and ensure the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Other(format!("create {}: {e}", parent.display())))?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let store = Self::with_connection(conn)?;
        info!("opened news database at {}", path.display());
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn ts(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp()
}

fn from_ts(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default()
}

fn map_insert_error(url: &str, e: rusqlite::Error) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == ErrorCode::ConstraintViolation
                && f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            StoreError::Conflict(url.to_string())
        }
        _ => StoreError::Database(e),
    }
}

fn insert_row(conn: &Connection, n: &NewNews) -> Result<NewsId, StoreError> {
    conn.execute(
        "INSERT INTO news (title, title_translated, content, summary, summary_translated, url,
             image_url, author, source_id, category_id, published_at, scraped_at,
             importance_score, keywords, language, is_processed, is_featured)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, 0)",
        params![
            n.title,
            n.title_translated,
            n.content,
            n.summary,
            n.summary_translated,
            n.url,
            n.image_url,
            n.author,
            n.source_id,
            n.category_id,
            ts(&n.published_at),
            ts(&n.scraped_at),
            n.importance_score,
            n.keywords.join(","),
            n.language,
            n.is_processed,
        ],
    )
    .map_err(|e| map_insert_error(&n.url, e))?;
    Ok(conn.last_insert_rowid())
}

fn row_to_news(row: &Row<'_>) -> rusqlite::Result<News> {
    let keywords: String = row.get(14)?;
    Ok(News {
        id: row.get(0)?,
        data: NewNews {
            title: row.get(1)?,
            title_translated: row.get(2)?,
            content: row.get(3)?,
            summary: row.get(4)?,
            summary_translated: row.get(5)?,
            url: row.get(6)?,
            image_url: row.get(7)?,
            author: row.get(8)?,
            source_id: row.get(9)?,
            category_id: row.get(10)?,
            published_at: from_ts(row.get(11)?),
            scraped_at: from_ts(row.get(12)?),
            importance_score: row.get(13)?,
            keywords: keywords
                .split(',')
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect(),
            language: row.get(15)?,
            is_processed: row.get(16)?,
        },
        is_featured: row.get(17)?,
    })
}

impl NewsStore for SqliteStore {
    fn seed_categories(&self) -> Result<(), StoreError> {
        let conn = self.conn()?;
        for c in Category::ALL {
            conn.execute(
                "INSERT OR IGNORE INTO news_categories (name) VALUES (?1)",
                params![c.name()],
            )?;
        }
        Ok(())
    }

    fn category_id(&self, category: Category) -> Result<Option<i64>, StoreError> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT id FROM news_categories WHERE name = ?1",
                params![category.name()],
                |r| r.get(0),
            )
            .optional()?)
    }

    fn find_or_create_source(
        &self,
        name: &str,
        url: &str,
        kind: SourceKind,
    ) -> Result<Source, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO news_sources (name, url, source_type) VALUES (?1, ?2, ?3)",
            params![name, url, kind.as_str()],
        )?;
        let src = conn.query_row(
            "SELECT id, name, url, source_type, enabled FROM news_sources WHERE name = ?1",
            params![name],
            |r| {
                let kind: String = r.get(3)?;
                Ok(Source {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    url: r.get(2)?,
                    kind: SourceKind::parse(&kind).unwrap_or(SourceKind::Rss),
                    enabled: r.get(4)?,
                })
            },
        )?;
        Ok(src)
    }

    fn url_exists(&self, normalized_url: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let hit: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM news WHERE url = ?1 LIMIT 1",
                params![normalized_url],
                |r| r.get(0),
            )
            .optional()?;
        Ok(hit.is_some())
    }

    fn titles_since(&self, since: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT title FROM news WHERE published_at >= ?1")?;
        let titles = stmt
            .query_map(params![ts(&since)], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(titles)
    }

    fn insert_news(&self, news: &NewNews) -> Result<NewsId, StoreError> {
        let conn = self.conn()?;
        insert_row(&conn, news)
    }

    fn insert_batch(&self, batch: &[NewNews]) -> Result<BatchOutcome, StoreError> {
        let mut conn = self.conn()?;
        let mut tx = conn.transaction()?;
        let mut out = BatchOutcome::default();

        for n in batch {
            let sp = tx.savepoint()?;
            match insert_row(&sp, n) {
                Ok(id) => {
                    sp.commit()?;
                    out.inserted.push(id);
                }
                Err(e) => {
                    // Dropping the savepoint rolls this row back.
                    drop(sp);
                    debug!(url = %n.url, error = %e, "row rolled back");
                    out.skipped.push((n.url.clone(), e.to_string()));
                }
            }
        }

        tx.commit()?;
        Ok(out)
    }

    fn unfeatured_since(&self, since: DateTime<Utc>) -> Result<Vec<ScoredNews>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, importance_score FROM news WHERE is_featured = 0 AND published_at >= ?1",
        )?;
        let rows = stmt
            .query_map(params![ts(&since)], |r| {
                Ok(ScoredNews {
                    id: r.get(0)?,
                    importance_score: r.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn mark_featured(&self, ids: &[NewsId]) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut changed = 0;
        {
            let mut stmt =
                tx.prepare("UPDATE news SET is_featured = 1 WHERE id = ?1 AND is_featured = 0")?;
            for id in ids {
                changed += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    fn count_news(&self) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM news", [], |r| r.get(0))?;
        Ok(n.max(0) as usize)
    }

    fn get_news(&self, id: NewsId) -> Result<Option<News>, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {NEWS_COLUMNS} FROM news WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], row_to_news).optional()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn row(url: &str, source_id: i64, score: f64) -> NewNews {
        let now = Utc::now();
        NewNews {
            title: format!("title for {url}"),
            title_translated: None,
            content: String::new(),
            summary: "s".into(),
            summary_translated: Some("摘要".into()),
            url: url.into(),
            image_url: None,
            author: None,
            source_id,
            category_id: None,
            published_at: now - Duration::hours(1),
            scraped_at: now,
            importance_score: score,
            keywords: vec!["agent".into(), "model".into()],
            language: "en".into(),
            is_processed: true,
        }
    }

    #[test]
    fn batch_skips_conflicting_rows_only() {
        let s = SqliteStore::in_memory().unwrap();
        let src = s.find_or_create_source("Feed", "https://f.test", SourceKind::Rss).unwrap();
        s.insert_news(&row("https://a.test/1", src.id, 0.5)).unwrap();

        let out = s
            .insert_batch(&[
                row("https://a.test/1", src.id, 0.1),
                row("https://a.test/2", src.id, 0.2),
                row("https://a.test/2", src.id, 0.3),
            ])
            .unwrap();
        assert_eq!(out.inserted.len(), 1);
        assert_eq!(out.skipped.len(), 2);
        assert_eq!(s.count_news().unwrap(), 2);
    }

    #[test]
    fn single_insert_conflict_is_typed() {
        let s = SqliteStore::in_memory().unwrap();
        let src = s.find_or_create_source("Feed", "https://f.test", SourceKind::Rss).unwrap();
        s.insert_news(&row("https://a.test/x", src.id, 0.5)).unwrap();
        let err = s.insert_news(&row("https://a.test/x", src.id, 0.5)).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn sources_and_categories_are_idempotent() {
        let s = SqliteStore::in_memory().unwrap();
        s.seed_categories().unwrap();
        s.seed_categories().unwrap();
        let other = s.category_id(Category::Other).unwrap();
        assert!(other.is_some());

        let a = s.find_or_create_source("X", "https://x.test", SourceKind::Web).unwrap();
        let b = s.find_or_create_source("X", "https://ignored.test", SourceKind::Rss).unwrap();
        assert_eq!(a, b);
        assert_eq!(b.kind, SourceKind::Web);
    }

    #[test]
    fn featured_flags_and_row_round_trip() {
        let s = SqliteStore::in_memory().unwrap();
        let src = s.find_or_create_source("Feed", "https://f.test", SourceKind::Rss).unwrap();
        let id = s.insert_news(&row("https://a.test/r", src.id, 0.7)).unwrap();

        let since = Utc::now() - Duration::days(7);
        assert_eq!(s.unfeatured_since(since).unwrap().len(), 1);
        assert_eq!(s.mark_featured(&[id]).unwrap(), 1);
        assert_eq!(s.mark_featured(&[id]).unwrap(), 0);
        assert!(s.unfeatured_since(since).unwrap().is_empty());

        let got = s.get_news(id).unwrap().unwrap();
        assert!(got.is_featured);
        assert_eq!(got.data.keywords, vec!["agent".to_string(), "model".into()]);
        assert_eq!(got.data.summary_translated.as_deref(), Some("摘要"));
        assert_eq!(s.titles_since(since).unwrap().len(), 1);
    }
}
