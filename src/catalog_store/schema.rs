//! Database schema for the catalog database.
//!
//! Three tables: books (one row per imported publication), highlights, and
//! bookmarks. Locators are stored as JSON text columns.

/// SQL schema for the catalog database (version 1).
pub const CATALOG_SCHEMA_SQL: &str = r#"
-- One row per imported publication
CREATE TABLE IF NOT EXISTS books (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_key TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    href TEXT NOT NULL,
    media_type TEXT NOT NULL,
    cover_ref TEXT,

    -- Reading state (locator JSON, owned by the active session if any)
    progression TEXT,
    speech_position TEXT,

    -- Unix milliseconds
    imported_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_books_source_key ON books(source_key);

-- Highlight decorations
CREATE TABLE IF NOT EXISTS highlights (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    book_id INTEGER NOT NULL,
    style TEXT NOT NULL,
    tint INTEGER NOT NULL,
    locator TEXT NOT NULL,
    annotation TEXT,

    FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_highlights_book ON highlights(book_id);

-- Bookmarks
CREATE TABLE IF NOT EXISTS bookmarks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    book_id INTEGER NOT NULL,
    locator TEXT NOT NULL,
    created_at INTEGER NOT NULL,

    FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_bookmarks_book ON bookmarks(book_id);
"#;

/// Current schema version, written to `PRAGMA user_version` on create.
pub const CATALOG_SCHEMA_VERSION: i64 = 1;
