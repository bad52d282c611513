//! Data models for the book catalog.
//!
//! Defines catalog records, locators, highlights, and bookmarks.

use serde::{Deserialize, Serialize};

/// An opaque position reference within a publication's content.
///
/// Used for reading progression, highlights, bookmarks, and speech tracking.
/// Stored as a JSON text column; the host never interprets it beyond
/// round-tripping it between the renderer and the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locator {
    /// Resource the position points into (e.g., a spine item href).
    pub href: String,
    /// Media type of the resource.
    pub media_type: String,
    /// Progression within the resource (0.0 - 1.0).
    #[serde(default)]
    pub progression: f64,
    /// Synthetic page position, when the renderer provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    /// Progression within the whole publication (0.0 - 1.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_progression: Option<f64>,
    /// Optional fragment identifier within the resource.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,
}

impl Locator {
    /// Create a locator at the beginning of a resource.
    pub fn start_of(href: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            media_type: media_type.into(),
            progression: 0.0,
            position: None,
            total_progression: None,
            fragment: None,
        }
    }
}

/// A durable catalog record representing one imported publication.
///
/// `id` is the SQLite rowid and is immutable once assigned. `source_key` is
/// the business identity (e.g., `local:<path>` or `remote:<url>`) and is
/// unique across all records; re-importing the same source key is rejected
/// by the store, never resolved by updating an existing row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: i64,
    pub source_key: String,
    pub title: String,
    /// Library-relative path of the imported asset.
    pub href: String,
    pub media_type: String,
    pub cover_ref: Option<String>,
    /// Last saved reading position.
    pub progression: Option<Locator>,
    /// Last saved text-to-speech playback position.
    pub speech_position: Option<Locator>,
    /// Unix milliseconds.
    pub imported_at: i64,
}

/// Fields required to insert a new catalog record.
///
/// `id` and `imported_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub source_key: String,
    pub title: String,
    pub href: String,
    pub media_type: String,
    pub cover_ref: Option<String>,
}

/// Visual style of a highlight decoration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightStyle {
    Highlight,
    Underline,
}

impl HighlightStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            HighlightStyle::Highlight => "highlight",
            HighlightStyle::Underline => "underline",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "highlight" => Some(HighlightStyle::Highlight),
            "underline" => Some(HighlightStyle::Underline),
            _ => None,
        }
    }
}

/// A highlight decoration attached to a location within a book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub id: i64,
    pub book_id: i64,
    pub style: HighlightStyle,
    /// Color value as 0xAARRGGBB.
    pub tint: u32,
    pub locator: Locator,
    pub annotation: Option<String>,
}

/// Fields required to insert a new highlight.
#[derive(Debug, Clone)]
pub struct NewHighlight {
    pub book_id: i64,
    pub style: HighlightStyle,
    pub tint: u32,
    pub locator: Locator,
    pub annotation: Option<String>,
}

/// A bookmark at a location within a book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: i64,
    pub book_id: i64,
    pub locator: Locator,
    /// Unix milliseconds.
    pub created_at: i64,
}

/// Fields required to insert a new bookmark.
#[derive(Debug, Clone)]
pub struct NewBookmark {
    pub book_id: i64,
    pub locator: Locator,
}
