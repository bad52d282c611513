//! SQLite-backed catalog store.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::models::{
    BookRecord, Bookmark, Highlight, HighlightStyle, Locator, NewBook, NewBookmark, NewHighlight,
};
use super::schema::{CATALOG_SCHEMA_SQL, CATALOG_SCHEMA_VERSION};
use super::trait_def::{CatalogStore, StoreError};

/// SQLite-backed catalog store.
///
/// Holds a single connection behind a mutex; statements are short enough that
/// contention is negligible for a single-reader host.
pub struct SqliteCatalogStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalogStore {
    /// Open the catalog database at the given path, creating it (and the
    /// schema) if it does not exist.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let existed = db_path.as_ref().exists();
        let conn = Connection::open(&db_path)?;
        Self::init_connection(&conn)?;
        if !existed {
            info!("Created new catalog database at {:?}", db_path.as_ref());
        }
        Ok(SqliteCatalogStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store.
    ///
    /// Note: not gated to `#[cfg(test)]` so integration tests and embedders
    /// can use throwaway catalogs too.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(&conn)?;
        Ok(SqliteCatalogStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_connection(conn: &Connection) -> Result<(), StoreError> {
        conn.execute("PRAGMA foreign_keys = ON;", [])?;

        let version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if version == 0 {
            conn.execute_batch(CATALOG_SCHEMA_SQL)?;
            conn.execute(
                &format!("PRAGMA user_version = {}", CATALOG_SCHEMA_VERSION),
                [],
            )?;
        }
        // A single schema version exists so far; nothing to migrate.
        Ok(())
    }

    fn locator_to_json(locator: &Locator) -> Result<String, StoreError> {
        serde_json::to_string(locator).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    fn locator_from_json(column: &str, json: Option<String>) -> Result<Option<Locator>, StoreError> {
        json.map(|j| {
            serde_json::from_str(&j)
                .map_err(|e| StoreError::Corrupt(format!("{}: {}", column, e)))
        })
        .transpose()
    }

    fn row_to_book(row: &rusqlite::Row) -> rusqlite::Result<(BookRecord, Option<String>, Option<String>)> {
        Ok((
            BookRecord {
                id: row.get("id")?,
                source_key: row.get("source_key")?,
                title: row.get("title")?,
                href: row.get("href")?,
                media_type: row.get("media_type")?,
                cover_ref: row.get("cover_ref")?,
                progression: None,
                speech_position: None,
                imported_at: row.get("imported_at")?,
            },
            row.get("progression")?,
            row.get("speech_position")?,
        ))
    }

    fn row_to_highlight(row: &rusqlite::Row) -> Result<Highlight, StoreError> {
        let style_str: String = row.get("style")?;
        let style = HighlightStyle::from_str(&style_str)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown highlight style: {}", style_str)))?;
        let locator_json: String = row.get("locator")?;
        let locator = serde_json::from_str(&locator_json)
            .map_err(|e| StoreError::Corrupt(format!("highlight locator: {}", e)))?;
        Ok(Highlight {
            id: row.get("id")?,
            book_id: row.get("book_id")?,
            style,
            tint: row.get::<_, i64>("tint")? as u32,
            locator,
            annotation: row.get("annotation")?,
        })
    }

    /// Map a UNIQUE-constraint violation on books.source_key to the typed
    /// duplicate error; everything else passes through.
    fn map_insert_error(err: rusqlite::Error, source_key: &str) -> StoreError {
        let is_unique_violation = err.sqlite_error_code()
            == Some(rusqlite::ErrorCode::ConstraintViolation)
            && err.to_string().contains("books.source_key");
        if is_unique_violation {
            StoreError::DuplicateSource(source_key.to_string())
        } else {
            StoreError::Sqlite(err)
        }
    }
}

impl CatalogStore for SqliteCatalogStore {
    // === Books ===

    fn insert_book(&self, book: &NewBook) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        let imported_at = chrono::Utc::now().timestamp_millis();
        conn.execute(
            "INSERT INTO books (source_key, title, href, media_type, cover_ref, imported_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                book.source_key,
                book.title,
                book.href,
                book.media_type,
                book.cover_ref,
                imported_at,
            ],
        )
        .map_err(|e| Self::map_insert_error(e, &book.source_key))?;
        Ok(conn.last_insert_rowid())
    }

    fn find_book_id_by_source_key(&self, source_key: &str) -> Result<Option<i64>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let id = conn
            .query_row(
                "SELECT id FROM books WHERE source_key = ?1",
                params![source_key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn latest_book_id(&self) -> Result<Option<i64>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let id = conn
            .query_row("SELECT MAX(id) FROM books", [], |row| row.get(0))
            .optional()?
            .flatten();
        Ok(id)
    }

    fn get_book(&self, id: i64) -> Result<Option<BookRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, source_key, title, href, media_type, cover_ref,
                        progression, speech_position, imported_at
                 FROM books WHERE id = ?1",
                params![id],
                Self::row_to_book,
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((mut book, progression_json, speech_json)) => {
                book.progression = Self::locator_from_json("progression", progression_json)?;
                book.speech_position = Self::locator_from_json("speech_position", speech_json)?;
                Ok(Some(book))
            }
        }
    }

    fn update_progression(&self, id: i64, locator: Option<&Locator>) -> Result<(), StoreError> {
        let json = locator.map(Self::locator_to_json).transpose()?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE books SET progression = ?1 WHERE id = ?2",
            params![json, id],
        )?;
        Ok(())
    }

    fn update_speech_position(&self, id: i64, locator: Option<&Locator>) -> Result<(), StoreError> {
        let json = locator.map(Self::locator_to_json).transpose()?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE books SET speech_position = ?1 WHERE id = ?2",
            params![json, id],
        )?;
        Ok(())
    }

    fn update_cover(&self, id: i64, cover_ref: Option<&str>) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE books SET cover_ref = ?1 WHERE id = ?2",
            params![cover_ref, id],
        )?;
        Ok(())
    }

    fn delete_book(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM books WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    // === Highlights ===

    fn insert_highlight(&self, highlight: &NewHighlight) -> Result<i64, StoreError> {
        let locator_json = Self::locator_to_json(&highlight.locator)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO highlights (book_id, style, tint, locator, annotation)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                highlight.book_id,
                highlight.style.as_str(),
                highlight.tint as i64,
                locator_json,
                highlight.annotation,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn update_highlight_style(
        &self,
        id: i64,
        style: HighlightStyle,
        tint: u32,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE highlights SET style = ?1, tint = ?2 WHERE id = ?3",
            params![style.as_str(), tint as i64, id],
        )?;
        Ok(updated > 0)
    }

    fn update_highlight_annotation(
        &self,
        id: i64,
        annotation: Option<&str>,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE highlights SET annotation = ?1 WHERE id = ?2",
            params![annotation, id],
        )?;
        Ok(updated > 0)
    }

    fn delete_highlight(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM highlights WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn get_highlight(&self, id: i64) -> Result<Option<Highlight>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, book_id, style, tint, locator, annotation
                 FROM highlights WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Self::row_to_highlight(row))
                },
            )
            .optional()?;
        row.transpose()
    }

    fn highlights_for_book(&self, book_id: i64) -> Result<Vec<Highlight>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, book_id, style, tint, locator, annotation
             FROM highlights WHERE book_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![book_id], |row| Ok(Self::row_to_highlight(row)))?;
        let mut highlights = Vec::new();
        for row in rows {
            highlights.push(row??);
        }
        Ok(highlights)
    }

    // === Bookmarks ===

    fn insert_bookmark(&self, bookmark: &NewBookmark) -> Result<i64, StoreError> {
        let locator_json = Self::locator_to_json(&bookmark.locator)?;
        let created_at = chrono::Utc::now().timestamp_millis();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO bookmarks (book_id, locator, created_at) VALUES (?1, ?2, ?3)",
            params![bookmark.book_id, locator_json, created_at],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn delete_bookmark(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute("DELETE FROM bookmarks WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn bookmarks_for_book(&self, book_id: i64) -> Result<Vec<Bookmark>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, book_id, locator, created_at
             FROM bookmarks WHERE book_id = ?1 ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map(params![book_id], |row| {
            let locator_json: String = row.get("locator")?;
            Ok((
                row.get::<_, i64>("id")?,
                row.get::<_, i64>("book_id")?,
                locator_json,
                row.get::<_, i64>("created_at")?,
            ))
        })?;
        let mut bookmarks = Vec::new();
        for row in rows {
            let (id, book_id, locator_json, created_at) = row?;
            let locator = serde_json::from_str(&locator_json)
                .map_err(|e| StoreError::Corrupt(format!("bookmark locator: {}", e)))?;
            bookmarks.push(Bookmark {
                id,
                book_id,
                locator,
                created_at,
            });
        }
        Ok(bookmarks)
    }
}
