//! Fluent search across the sources of a registry.
//!
//! # Examples
//!
//! ```rust
//! use hondana::prelude::*;
//! use hondana::filter::FilterValue;
//! # use hondana::error::Result;
//!
//! # async fn example() -> Result<()> {
//! let sources = Sources::new();
//!
//! // All sources, merged and cleaned up
//! let results = sources
//!     .search("one piece")
//!     .page(2)
//!     .flatten()
//!     .await?
//!     .dedupe_by_title()
//!     .sort_by_query_relevance("one piece");
//!
//! // One result per source, errors included
//! let grouped = sources
//!     .search("naruto")
//!     .filter(FilterValue::select("Status", 1))
//!     .group()
//!     .await;
//! # Ok(())
//! # }
//! ```

use crate::{
    error::{Error, Result},
    filter::FilterValue,
    source::Sources,
    types::{Cursor, ListingPage, MangaSummary, SearchQuery},
};

/// Builder returned by [`Sources::search`].
pub struct SearchBuilder<'a> {
    sources: &'a Sources,
    query: SearchQuery,
}

impl<'a> SearchBuilder<'a> {
    pub(crate) fn new(sources: &'a Sources, query: impl Into<String>) -> Self {
        Self {
            sources,
            query: SearchQuery::from(query.into()),
        }
    }

    /// Requests the given 1-based page.
    pub fn page(mut self, page: u32) -> Self {
        self.query.cursor = Cursor::Page(page.max(1));
        self
    }

    pub fn cursor(mut self, cursor: Cursor) -> Self {
        self.query.cursor = cursor;
        self
    }

    /// Adds a filter value; sources that do not declare the filter ignore it.
    pub fn filter(mut self, value: FilterValue) -> Self {
        self.query.filters.push(value);
        self
    }

    pub fn filters(mut self, values: impl IntoIterator<Item = FilterValue>) -> Self {
        self.query.filters.extend(values);
        self
    }

    /// Searches every source and merges the items.
    pub async fn flatten(self) -> Result<Vec<MangaSummary>> {
        self.sources.search_all_flat(self.query).await
    }

    /// Searches every source, keeping each source's outcome apart.
    pub async fn group(self) -> Vec<(String, Result<ListingPage>)> {
        self.sources.search_all_grouped(self.query).await
    }

    /// Searches a single source.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when no source has this id, otherwise whatever
    /// the source's search returns.
    pub async fn from_source(self, source_id: &str) -> Result<ListingPage> {
        match self.sources.get(source_id) {
            Some(source) => source.search_list(self.query).await,
            None => Err(Error::not_found(format!("Source: {source_id}"))),
        }
    }

    pub fn build(self) -> SearchQuery {
        self.query
    }
}

/// Post-processing of merged search results.
pub trait SearchResultExt {
    /// Keeps the first item of each title, ignoring case.
    fn dedupe_by_title(self) -> Self;

    fn sort_by_title(self) -> Self;

    /// Exact title matches first, then titles containing the query, then by
    /// the share of query words found in the title.
    fn sort_by_query_relevance(self, query: &str) -> Self;
}

impl SearchResultExt for Vec<MangaSummary> {
    fn dedupe_by_title(mut self) -> Self {
        let mut seen = std::collections::HashSet::new();
        self.retain(|manga| seen.insert(manga.title.trim().to_lowercase()));
        self
    }

    fn sort_by_title(mut self) -> Self {
        self.sort_by_cached_key(|manga| manga.title.to_lowercase());
        self
    }

    fn sort_by_query_relevance(mut self, query: &str) -> Self {
        let query = query.trim().to_lowercase();
        self.sort_by_cached_key(|manga| std::cmp::Reverse(relevance(&manga.title, &query)));
        self
    }
}

fn relevance(title: &str, query: &str) -> u32 {
    let title = title.to_lowercase();
    if title == query {
        return 100;
    }
    if !query.is_empty() && title.contains(query) {
        return 50;
    }

    let words: Vec<&str> = query.split_whitespace().collect();
    if words.is_empty() {
        return 0;
    }
    let matched = words.iter().filter(|w| title.contains(*w)).count() as u32;
    matched * 25 / words.len() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manga(title: &str, source: &str) -> MangaSummary {
        MangaSummary {
            title: title.to_string(),
            url: format!("/manga/{}/", title.to_lowercase().replace(' ', "-")),
            thumbnail_url: None,
            source_id: source.to_string(),
        }
    }

    #[test]
    fn dedupe_keeps_first() {
        let results = vec![manga("One Piece", "a"), manga("one piece ", "b"), manga("Naruto", "b")].dedupe_by_title();
        let sources: Vec<_> = results.iter().map(|m| m.source_id.as_str()).collect();
        assert_eq!(sources, vec!["a", "b"]);
        assert_eq!(results[1].title, "Naruto");
    }

    #[test]
    fn relevance_order() {
        let results = vec![
            manga("Piece of Cake", "a"),
            manga("One Piece Party", "a"),
            manga("Bleach", "a"),
            manga("One Piece", "a"),
        ]
        .sort_by_query_relevance("One Piece");

        let titles: Vec<_> = results.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["One Piece", "One Piece Party", "Piece of Cake", "Bleach"]);
    }

    #[test]
    fn title_order() {
        let results = vec![manga("beta", "a"), manga("Alpha", "a")].sort_by_title();
        assert_eq!(results[0].title, "Alpha");
    }
}
