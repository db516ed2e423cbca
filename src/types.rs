//! Core data types produced by the engine.
//!
//! This module defines the value types that flow out of every source:
//!
//! - [`MangaSummary`] - One entry of a listing (popular, latest, search, collection)
//! - [`MangaDetail`] - Metadata and chapter list from a detail page
//! - [`ChapterRef`] - A single chapter reference
//! - [`Page`] - One resolved page image
//! - [`ListingPage`] - A page of summaries plus pagination state
//! - [`SearchQuery`] - Query, filters and cursor for a search listing
//!
//! All of them are plain values: the engine never caches or mutates them after
//! returning them.
//!
//! # Examples
//!
//! ```rust
//! use hondana::types::*;
//!
//! let summary = MangaSummary {
//!     title: "One Piece".to_string(),
//!     url: "/manga/one-piece/".to_string(),
//!     thumbnail_url: Some("https://example.com/cover.jpg".to_string()),
//!     source_id: "example".to_string(),
//! };
//! assert!(summary.url.starts_with('/'));
//! ```

use chrono::{DateTime, Utc};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::filter::FilterValue;

/// One entry of a listing.
///
/// `url` is always relative to the source's base URL, so a summary can be
/// turned back into a request without fetching anything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MangaSummary {
    /// Display title
    pub title: String,

    /// Detail page path, relative to the source base URL
    pub url: String,

    /// Absolute cover image URL
    pub thumbnail_url: Option<String>,

    /// Identifier of the source this entry came from
    pub source_id: String,
}

/// Publication status, normalized from free text by the source's status table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MangaStatus {
    Ongoing,
    Completed,
    Hiatus,
    #[default]
    Unknown,
}

/// Full metadata for one manga, produced from a single detail-page fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MangaDetail {
    /// The listing-level fields
    #[serde(flatten)]
    pub summary: MangaSummary,

    pub author: Option<String>,
    pub artist: Option<String>,

    /// Genres in page order, without duplicates
    #[serde(default)]
    pub genres: Vec<String>,

    pub description: Option<String>,
    pub status: MangaStatus,

    /// Chapters in the order configured for the source
    #[serde(default)]
    pub chapters: Vec<ChapterRef>,
}

/// A single chapter of a manga.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterRef {
    /// Chapter name as displayed by the site
    pub name: String,

    /// Chapter page path, relative to the source base URL
    pub url: String,

    /// Chapter number parsed from the name or URL (supports `.5` chapters)
    pub number: Option<f64>,

    /// Upload time; `None` when the site gives no usable date
    pub uploaded_at: Option<DateTime<Utc>>,

    /// Scanlation group or source tag
    pub scanlator: Option<String>,
}

/// One page image of a chapter.
///
/// Indices are contiguous and start at zero; index 0 is the first page shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub index: usize,

    /// Absolute URL of the chapter document, to be sent as `Referer`
    pub referer: String,

    /// Absolute image URL
    pub image_url: String,
}

/// A named category mapped to a URL path segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub label: String,
    pub path: String,

    /// Name of a pagination strategy overriding the source default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<String>,
}

impl Collection {
    pub fn new(label: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
            pagination: None,
        }
    }
}

/// The listing kinds a source can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingKind {
    Popular,
    Latest,
    Search,
    Collection,
}

impl ListingKind {
    /// Operation name used in logs and [`Error::UnsupportedOperation`](crate::Error::UnsupportedOperation).
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingKind::Popular => "popular listing",
            ListingKind::Latest => "latest listing",
            ListingKind::Search => "search",
            ListingKind::Collection => "collection listing",
        }
    }
}

/// Pagination position of a listing request.
///
/// Page numbers start at 1. Sources that paginate with opaque tokens hand
/// out [`Cursor::Token`] values in [`ListingPage::next_cursor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cursor {
    Page(u32),
    Token(String),
}

impl Cursor {
    /// The first page of any listing.
    pub fn first() -> Self {
        Cursor::Page(1)
    }

    /// Page number for templates; token cursors count as page 1.
    pub fn page_number(&self) -> u32 {
        match self {
            Cursor::Page(n) => (*n).max(1),
            Cursor::Token(_) => 1,
        }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Cursor::first()
    }
}

impl From<u32> for Cursor {
    fn from(page: u32) -> Self {
        Cursor::Page(page)
    }
}

/// One page of listing results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingPage {
    pub items: Vec<MangaSummary>,
    pub has_next_page: bool,

    /// Cursor for the following page; `None` whenever `has_next_page` is false
    pub next_cursor: Option<Cursor>,
}

impl ListingPage {
    /// An empty, final page.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            has_next_page: false,
            next_cursor: None,
        }
    }
}

/// Parameters of a search listing.
///
/// The `derive_builder` crate generates a `SearchQueryBuilder`:
///
/// ```rust
/// use hondana::types::{Cursor, SearchQueryBuilder};
/// use hondana::filter::FilterValue;
///
/// let query = SearchQueryBuilder::default()
///     .query("one piece")
///     .cursor(Cursor::Page(2))
///     .filters(vec![FilterValue::text("Author", "Oda")])
///     .build()
///     .unwrap();
///
/// assert_eq!(query.query, "one piece");
/// assert_eq!(query.cursor, Cursor::Page(2));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Builder)]
#[builder(setter(into))]
pub struct SearchQuery {
    pub query: String,
    #[builder(default)]
    pub cursor: Cursor,
    #[builder(default)]
    pub filters: Vec<FilterValue>,
}

impl From<String> for SearchQuery {
    fn from(query: String) -> Self {
        SearchQuery {
            query,
            ..Default::default()
        }
    }
}

impl From<&str> for SearchQuery {
    /// Creates a first-page search without filters.
    ///
    /// ```rust
    /// use hondana::types::{Cursor, SearchQuery};
    ///
    /// let query: SearchQuery = "naruto".into();
    /// assert_eq!(query.query, "naruto");
    /// assert_eq!(query.cursor, Cursor::Page(1));
    /// assert!(query.filters.is_empty());
    /// ```
    fn from(query: &str) -> Self {
        SearchQuery {
            query: query.to_string(),
            ..Default::default()
        }
    }
}
