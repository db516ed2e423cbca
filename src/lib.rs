//! # Hondana - configuration-driven manga scraping engine
//!
//! Hondana scrapes manga sites that share a structure (WordPress themes,
//! reader CMSs, JSON APIs) from declarative configuration instead of one
//! hand-written scraper per site. A [`SourceConfig`](config::SourceConfig)
//! names URL templates, selectors and a few strategies; the engine turns it
//! into a [`Source`] offering popular, latest, search and collection
//! listings, manga detail with chapters, and chapter pages.
//!
//! ## Features
//!
//! - **Declarative sources**: TOML catalogs or preset builders, validated once
//! - **HTML and JSON**: CSS selectors or dot paths over the same pipelines
//! - **Polite HTTP**: per-source token bucket, retries with backoff, UA policy
//! - **Tolerant extraction**: broken items and pages are skipped, not fatal
//! - **Parallel decoding**: page URLs are decoded with rayon
//! - **Fluent multi-source search**: flatten, group, dedupe
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hondana::prelude::*;
//! use hondana::error::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let sources = Sources::from_toml_str(r#"
//!         [[sources]]
//!         id = "example"
//!         name = "Example Scans"
//!         base_url = "https://example.com"
//!         pagination = "selector"
//!
//!         [sources.urls]
//!         popular = "/manga/page/{page}/"
//!         search = "/?s={query}&page={page}"
//!
//!         [sources.selectors]
//!         popular_item = "div.item"
//!         title = "h3"
//!         url = { selector = "a", attrs = ["href"] }
//!         next_page = "a.next"
//!         chapter_item = "li.chapter"
//!         page_item = "div.reader img"
//!     "#)?;
//!
//!     let source = sources.get("example").expect("registered");
//!     let popular = source.popular_list(Cursor::first()).await?;
//!
//!     for manga in &popular.items {
//!         let detail = source.fetch_detail(&manga.url).await?;
//!         println!("{}: {} chapters", detail.summary.title, detail.chapters.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`config`]: source configuration, validation and compiled selectors
//! - [`markup`]: documents, queries and field extraction
//! - [`engine`]: the listing, detail and page pipelines
//! - [`net`]: HTTP client, rate limiter, HTML and JSON helpers
//! - [`source`]: the [`Source`] trait and the [`Sources`] registry
//! - [`search`]: fluent search and result post-processing
//! - [`sources`]: presets for common site themes
//! - [`types`], [`filter`], [`date`], [`error`]

pub mod config;
pub mod date;
pub mod engine;
pub mod error;
pub mod filter;
pub mod markup;
pub mod net;
pub mod search;
pub mod source;
pub mod sources;
pub mod types;

/// Prelude module for convenient imports.
///
/// ```rust
/// use hondana::prelude::*;
///
/// let sources = Sources::new();
/// assert!(sources.is_empty());
/// ```
pub mod prelude {
    pub use crate::{
        config::SourceConfig,
        search::{SearchBuilder, SearchResultExt},
        source::{Source, Sources},
        types::{ChapterRef, Collection, Cursor, ListingPage, MangaDetail, MangaStatus, MangaSummary, Page, SearchQuery},
    };
}

// Re-export main types at crate root for direct access
pub use engine::ConfigurableSource;
pub use error::{Error, Result};
pub use search::{SearchBuilder, SearchResultExt};
pub use source::{Source, Sources};
pub use types::{ChapterRef, Cursor, ListingPage, MangaDetail, MangaSummary, Page, SearchQuery};
