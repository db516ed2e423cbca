//! Source trait and the registry of configured sources.
//!
//! The [`Source`] trait is the host contract: listings, detail, pages, and
//! the filter and collection catalogs. [`Sources`] validates configurations
//! into sources once, keeps them by id, and runs aggregated searches.
//!
//! # Examples
//!
//! ```rust,no_run
//! use hondana::prelude::*;
//! use hondana::error::Result;
//!
//! # async fn example() -> Result<()> {
//! let sources = Sources::load("catalog.toml").await?;
//!
//! // Search across all sources
//! let results = sources.search("one piece").flatten().await?;
//!
//! // Read one manga from a specific source
//! if let Some(source) = sources.get("example") {
//!     let detail = source.fetch_detail("/manga/one-piece/").await?;
//!     println!("{} has {} chapters", detail.summary.title, detail.chapters.len());
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use futures::future;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::{
    config::SourceConfig,
    engine::ConfigurableSource,
    error::{Error, Result},
    filter::FilterDescriptor,
    net::RateLimiter,
    search::SearchBuilder,
    types::{Collection, Cursor, ListingPage, MangaDetail, MangaSummary, Page, SearchQuery},
};

/// Operations a host can invoke on a registered source.
///
/// Listing URLs in results are relative to the source's base URL; the
/// `fetch_*` operations accept them as well as absolute URLs.
///
/// # Errors
///
/// Every async operation may fail with:
///
/// * [`Error::Fetch`] - network failure or non-2xx status, after retries
/// * [`Error::UnsupportedOperation`] - the source has no such capability
/// * [`Error::RequiredFieldMissing`] - a detail page without a title
///
/// Items and pages that fail to extract are skipped, not reported.
#[async_trait]
pub trait Source: Send + Sync {
    /// Unique identifier of the source within a registry.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Base URL, ending with `/`.
    fn base_url(&self) -> &str;

    /// Content language code.
    fn lang(&self) -> &str;

    async fn popular_list(&self, cursor: Cursor) -> Result<ListingPage>;

    async fn latest_list(&self, cursor: Cursor) -> Result<ListingPage>;

    /// Searches with a free-text query and filter values.
    async fn search_list(&self, query: SearchQuery) -> Result<ListingPage>;

    /// Lists one of the entries of [`collections`](Source::collections).
    async fn collection_list(&self, path: &str, cursor: Cursor) -> Result<ListingPage>;

    /// Metadata and chapter list of one manga.
    async fn fetch_detail(&self, manga_url: &str) -> Result<MangaDetail>;

    /// Ordered page images of one chapter, indexed from zero.
    async fn fetch_pages(&self, chapter_url: &str) -> Result<Vec<Page>>;

    /// Filters accepted by [`search_list`](Source::search_list).
    fn filters(&self) -> &[FilterDescriptor];

    fn collections(&self) -> &[Collection];
}

#[derive(Debug, Deserialize)]
struct Catalog {
    #[serde(default)]
    sources: Vec<SourceConfig>,
}

/// A registry of sources sharing one rate limiter.
///
/// # Examples
///
/// ```rust
/// use hondana::prelude::*;
/// use hondana::config::{FieldSpec, SourceConfig};
///
/// let mut config = SourceConfig::new("example", "Example", "https://example.com");
/// config.urls.popular = "/manga/page/{page}/".to_string();
/// config.selectors.popular_item = Some("div.item".to_string());
/// config.selectors.title = Some("h3".into());
/// config.selectors.url = Some(FieldSpec::attr("a", "href"));
/// config.selectors.chapter_item = Some("li.chapter".to_string());
/// config.selectors.page_item = Some("div.page img".to_string());
///
/// let mut sources = Sources::new();
/// sources.register(config.clone()).unwrap();
///
/// assert_eq!(sources.list_ids(), vec!["example"]);
/// assert!(sources.register(config).is_err());
/// ```
pub struct Sources {
    sources: Vec<Box<dyn Source>>,
    by_id: HashMap<String, usize>,
    limiter: Arc<RateLimiter>,
}

impl Sources {
    pub fn new() -> Self {
        Self::with_limiter(Arc::new(RateLimiter::new()))
    }

    /// Creates an empty registry around an existing limiter, so several
    /// registries can share the per-source buckets.
    pub fn with_limiter(limiter: Arc<RateLimiter>) -> Self {
        Self {
            sources: Vec::new(),
            by_id: HashMap::new(),
            limiter,
        }
    }

    /// Builds a registry from a TOML catalog of `[[sources]]` tables.
    ///
    /// # Errors
    ///
    /// [`Error::Toml`] for malformed TOML; [`Error::InvalidConfig`] for the
    /// first source that does not validate, or a duplicate id.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let catalog: Catalog = toml::from_str(text)?;
        let mut sources = Self::new();
        for config in catalog.sources {
            sources.register(config)?;
        }
        Ok(sources)
    }

    /// Reads and registers a catalog file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await?;
        let sources = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), sources = sources.len(), "loaded catalog");
        Ok(sources)
    }

    /// Starts a fluent search across all sources.
    pub fn search(&self, query: impl Into<String>) -> SearchBuilder<'_> {
        SearchBuilder::new(self, query)
    }

    /// Validates a configuration and registers the resulting source.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] when the configuration does not validate or
    /// its id is already registered.
    pub fn register(&mut self, config: SourceConfig) -> Result<&mut Self> {
        let source = ConfigurableSource::new(config, Arc::clone(&self.limiter))?;
        self.add(source)
    }

    /// Registers an already built source.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] when its id is already registered.
    pub fn add(&mut self, source: impl Source + 'static) -> Result<&mut Self> {
        let id = source.id().to_string();
        if self.by_id.contains_key(&id) {
            return Err(Error::invalid_config(id, "duplicate source id"));
        }

        tracing::info!(source = %id, name = %source.name(), lang = %source.lang(), "registered source");
        self.by_id.insert(id, self.sources.len());
        self.sources.push(Box::new(source));
        Ok(self)
    }

    pub fn get(&self, id: &str) -> Option<&dyn Source> {
        self.by_id
            .get(id)
            .and_then(|&index| self.sources.get(index))
            .map(|s| s.as_ref())
    }

    /// Ids in registration order.
    pub fn list_ids(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.id()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Source> {
        self.sources.iter().map(|s| s.as_ref())
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Searches all sources concurrently, one result per source.
    pub async fn search_all_grouped(&self, query: SearchQuery) -> Vec<(String, Result<ListingPage>)> {
        let futures = self.sources.iter().map(|source| {
            let query = query.clone();
            async move { (source.id().to_string(), source.search_list(query).await) }
        });

        future::join_all(futures).await
    }

    /// Searches all sources and concatenates their items.
    ///
    /// Sources that cannot search are left out.
    ///
    /// # Errors
    ///
    /// Only when every source that can search failed.
    pub async fn search_all_flat(&self, query: SearchQuery) -> Result<Vec<MangaSummary>> {
        let grouped = self.search_all_grouped(query).await;

        let mut items = Vec::new();
        let mut succeeded = 0;
        let mut errors = Vec::new();

        for (source_id, result) in grouped {
            match result {
                Ok(page) => {
                    succeeded += 1;
                    items.extend(page.items);
                }
                Err(Error::UnsupportedOperation { .. }) => {
                    tracing::debug!(source = %source_id, "source cannot search");
                }
                Err(e) => {
                    tracing::warn!(source = %source_id, error = %e, "search failed");
                    errors.push(format!("{source_id}: {e}"));
                }
            }
        }

        if succeeded == 0 && !errors.is_empty() {
            return Err(Error::Other(format!("All sources failed: {}", errors.join(", "))));
        }

        Ok(items)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Default for Sources {
    fn default() -> Self {
        Self::new()
    }
}
