use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};

use crate::app::{Result, TokenbookError};
use crate::store::{Content, ContentStore};

/// Sqlite-backed content store. One connection behind a mutex; writes are
/// infrequent (once per changed list per refresh cycle).
pub struct SqliteContentStore {
    conn: Mutex<Connection>,
}

impl SqliteContentStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// `~/.local/share/tokenbook/contents.db` (platform equivalent).
    pub fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| TokenbookError::Config("Could not find data directory".into()))?;
        let dir = data_dir.join("tokenbook");
        std::fs::create_dir_all(&dir)?;
        Ok(dir.join("contents.db"))
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.lock_conn()?;
        migrations
            .to_latest(&mut conn)
            .map_err(|_| TokenbookError::Database(rusqlite::Error::InvalidQuery))?;

        Ok(())
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            TokenbookError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn parse_datetime(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| s.parse::<DateTime<Utc>>())
            .unwrap_or_default()
    }
}

impl ContentStore for SqliteContentStore {
    fn get_etag(&self, id: &str) -> Result<Option<String>> {
        let conn = self.lock_conn()?;
        let etag: Option<Option<String>> = conn
            .query_row(
                "SELECT etag FROM contents WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(etag.flatten())
    }

    fn get(&self, id: &str) -> Result<Option<Content>> {
        let conn = self.lock_conn()?;
        let content = conn
            .query_row(
                "SELECT source_url, etag, body, fetched_at FROM contents WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Content {
                        source_url: row.get(0)?,
                        etag: row.get(1)?,
                        body: row.get(2)?,
                        fetched_at: Self::parse_datetime(&row.get::<_, String>(3)?),
                    })
                },
            )
            .optional()?;
        Ok(content)
    }

    fn set(&self, id: &str, content: Content) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO contents (id, source_url, etag, body, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 source_url = excluded.source_url,
                 etag = excluded.etag,
                 body = excluded.body,
                 fetched_at = excluded.fetched_at",
            params![
                id,
                content.source_url,
                content.etag,
                content.body,
                content.fetched_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn get_all(&self) -> Result<HashMap<String, Content>> {
        let conn = self.lock_conn()?;
        let mut stmt =
            conn.prepare("SELECT id, source_url, etag, body, fetched_at FROM contents")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                Content {
                    source_url: row.get(1)?,
                    etag: row.get(2)?,
                    body: row.get(3)?,
                    fetched_at: Self::parse_datetime(&row.get::<_, String>(4)?),
                },
            ))
        })?;

        let mut all = HashMap::new();
        for row in rows {
            let (id, content) = row?;
            all.insert(id, content);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(url: &str, etag: Option<&str>) -> Content {
        Content {
            source_url: url.into(),
            etag: etag.map(String::from),
            body: br#"{"tokens": []}"#.to_vec(),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_set_and_get_content() {
        let store = SqliteContentStore::in_memory().unwrap();
        let content = sample("https://example.com/uniswap.json", Some("\"v1\""));
        store.set("uniswap", content.clone()).unwrap();

        let retrieved = store.get("uniswap").unwrap().unwrap();
        assert_eq!(retrieved.source_url, content.source_url);
        assert_eq!(retrieved.etag, content.etag);
        assert_eq!(retrieved.body, content.body);
    }

    #[test]
    fn test_get_missing_is_none() {
        let store = SqliteContentStore::in_memory().unwrap();
        assert!(store.get("missing").unwrap().is_none());
        assert!(store.get_etag("missing").unwrap().is_none());
    }

    #[test]
    fn test_set_overwrites_previous_copy() {
        let store = SqliteContentStore::in_memory().unwrap();
        store
            .set("uniswap", sample("https://example.com/u.json", Some("\"v1\"")))
            .unwrap();
        store
            .set("uniswap", sample("https://example.com/u.json", Some("\"v2\"")))
            .unwrap();

        assert_eq!(store.get_etag("uniswap").unwrap(), Some("\"v2\"".into()));
        assert_eq!(store.get_all().unwrap().len(), 1);
    }

    #[test]
    fn test_get_all() {
        let store = SqliteContentStore::in_memory().unwrap();
        store
            .set("a", sample("https://example.com/a.json", None))
            .unwrap();
        store
            .set("b", sample("https://example.com/b.json", Some("\"v1\"")))
            .unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.contains_key("a"));
        assert!(all.contains_key("b"));
    }

    #[test]
    fn test_on_disk_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contents.db");

        {
            let store = SqliteContentStore::new(&path).unwrap();
            store
                .set("a", sample("https://example.com/a.json", Some("\"v1\"")))
                .unwrap();
        }

        let reopened = SqliteContentStore::new(&path).unwrap();
        assert_eq!(reopened.get_etag("a").unwrap(), Some("\"v1\"".into()));
    }
}
