//! The configuration-driven source.
//!
//! [`ConfigurableSource`] is the one [`Source`] implementation of the crate:
//! every site is a [`SourceConfig`] run through the same pipelines.
//!
//! - [`listing`]: popular, latest, search and collection pages;
//! - [`detail`]: manga metadata and chapter lists;
//! - [`pages`]: chapter page images.
//!
//! Pipelines are plain functions over a fetched body. The only suspension
//! points of an operation are its HTTP calls, and a parsed document never
//! lives across one of them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

use crate::config::{CompiledSource, SelectorVars, SourceConfig, expand};
use crate::error::{Error, Result};
use crate::filter::FilterDescriptor;
use crate::markup::{self, Document};
use crate::net::{HttpClient, RateLimiter, Request};
use crate::source::Source;
use crate::types::{ChapterRef, Collection, Cursor, ListingKind, ListingPage, MangaDetail, Page, SearchQuery};

pub mod detail;
pub mod listing;
pub mod pages;

use pages::PagePlan;

/// A site driven entirely by its configuration.
#[derive(Debug)]
pub struct ConfigurableSource {
    compiled: CompiledSource,
    client: HttpClient,
}

impl ConfigurableSource {
    /// Validates `config` and builds the source's HTTP client.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] when the configuration does not validate.
    pub fn new(config: SourceConfig, limiter: Arc<RateLimiter>) -> Result<Self> {
        let compiled = config.compile()?;
        let client = HttpClient::new(compiled.config(), compiled.base(), limiter)?;
        Ok(Self { compiled, client })
    }

    pub fn compiled(&self) -> &CompiledSource {
        &self.compiled
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    async fn list(
        &self,
        kind: ListingKind,
        cursor: &Cursor,
        search: Option<&SearchQuery>,
        collection: Option<&str>,
    ) -> Result<ListingPage> {
        let request = listing::build_listing_request(&self.compiled, kind, cursor, search, collection, Utc::now())?;
        let body = self.client.send(&request.request).await?.text();
        listing::parse_listing(&self.compiled, &request, &body)
    }

    /// Chapters served by `urls.chapter_list`, following `{page}` until a
    /// page adds nothing new.
    async fn alternate_chapters(
        &self,
        manga_url: &Url,
        vars: &SelectorVars,
        now: DateTime<Utc>,
        seen: &mut HashSet<String>,
    ) -> Result<Vec<ChapterRef>> {
        let source = &self.compiled;
        let urls = &source.config().urls;
        let template = urls
            .chapter_list
            .as_deref()
            .ok_or_else(|| Error::invalid_config(source.id(), "missing urls.chapter_list"))?;
        let paginated = template.contains("{page}")
            || urls.chapter_list_body.as_deref().is_some_and(|b| b.contains("{page}"));
        let slug = last_segment(manga_url);

        let mut chapters = Vec::new();
        for page in 1..=urls.chapter_list_max_pages.max(1) {
            let page = page.to_string();
            let lookup = |name: &str| match name {
                "manga_url" => Some(manga_url.as_str()),
                "manga_slug" => Some(slug),
                "page" => Some(page.as_str()),
                "lang" => Some(vars.lang.as_str()),
                _ => None,
            };

            let mut request = Request::new(urls.chapter_list_method, expand(template, lookup))
                .with_header("X-Requested-With", "XMLHttpRequest")
                .with_header("Referer", manga_url.as_str());
            if let Some(body) = &urls.chapter_list_body {
                request = request.with_form(expand(body, lookup));
            }

            let body = self.client.send(&request).await?.text();
            let found = {
                let doc = Document::parse_as(&body, source.config().format)?;
                detail::parse_chapters(source, &doc, vars, now, seen)?
            };

            tracing::debug!(source = %source.id(), page = %page, chapters = found.len(), "chapter list page");
            if found.is_empty() {
                break;
            }
            chapters.extend(found);
            if !paginated {
                break;
            }
        }

        Ok(chapters)
    }

    fn count_view(&self, chapter_url: &Url) {
        let Some(counter) = &self.compiled.config().view_counter else {
            return;
        };
        let slug = last_segment(chapter_url);
        let target = expand(&counter.url, |name| match name {
            "chapter_url" => Some(chapter_url.as_str()),
            "chapter_slug" => Some(slug),
            "lang" => Some(self.compiled.config().lang.as_str()),
            _ => None,
        });
        self.client.fire_and_forget(Request::new(counter.method, target));
    }
}

#[async_trait]
impl Source for ConfigurableSource {
    fn id(&self) -> &str {
        self.compiled.id()
    }

    fn name(&self) -> &str {
        &self.compiled.config().name
    }

    fn base_url(&self) -> &str {
        self.compiled.base().as_str()
    }

    fn lang(&self) -> &str {
        &self.compiled.config().lang
    }

    async fn popular_list(&self, cursor: Cursor) -> Result<ListingPage> {
        self.list(ListingKind::Popular, &cursor, None, None).await
    }

    async fn latest_list(&self, cursor: Cursor) -> Result<ListingPage> {
        self.list(ListingKind::Latest, &cursor, None, None).await
    }

    async fn search_list(&self, query: SearchQuery) -> Result<ListingPage> {
        self.list(ListingKind::Search, &query.cursor, Some(&query), None).await
    }

    async fn collection_list(&self, path: &str, cursor: Cursor) -> Result<ListingPage> {
        self.list(ListingKind::Collection, &cursor, None, Some(path)).await
    }

    async fn fetch_detail(&self, manga_url: &str) -> Result<MangaDetail> {
        let source = &self.compiled;
        let config = source.config();
        let url = self.client.resolve(manga_url)?;
        let canonical = markup::relative_url(source.base(), url.as_str()).ok_or_else(|| {
            Error::fetch(url.as_str(), None, format!("not a page of {}", source.base())).non_retriable()
        })?;

        let body = self.client.send(&Request::get(url.as_str())).await?.text();
        let now = Utc::now();
        let vars = SelectorVars::at(now, &config.lang);
        let mut seen = HashSet::new();

        let (mut detail, mut chapters) = {
            let doc = Document::parse_as(&body, config.format)?;
            let detail = detail::parse_detail(source, &canonical, &doc, &vars)?;
            let chapters = if config.use_alternate_chapter_endpoint {
                Vec::new()
            } else {
                detail::parse_chapters(source, &doc, &vars, now, &mut seen)?
            };
            (detail, chapters)
        };

        if config.use_alternate_chapter_endpoint {
            chapters = self.alternate_chapters(&url, &vars, now, &mut seen).await?;
        }

        detail.chapters = detail::order_chapters(chapters, config.chapter_order);
        tracing::debug!(source = %source.id(), url = %canonical, chapters = detail.chapters.len(), "fetched detail");
        Ok(detail)
    }

    async fn fetch_pages(&self, chapter_url: &str) -> Result<Vec<Page>> {
        let source = &self.compiled;
        let url = self.client.resolve(chapter_url)?;
        let body = self.client.send(&Request::get(url.as_str())).await?.text();
        let vars = SelectorVars::at(Utc::now(), &source.config().lang);

        let pages = match pages::parse_pages(source, &url, &body, &vars)? {
            PagePlan::Ready(pages) => pages,
            PagePlan::Manifest(location) => {
                let manifest_url = self.client.resolve(&location)?;
                let request = Request::get(manifest_url.as_str()).with_header("Referer", url.as_str());
                let manifest = self.client.send(&request).await?.text();
                pages::parse_manifest(source, &url, &manifest_url, &manifest)?
            }
        };

        tracing::debug!(source = %source.id(), url = %url, pages = pages.len(), "fetched pages");
        self.count_view(&url);
        Ok(pages)
    }

    fn filters(&self) -> &[FilterDescriptor] {
        &self.compiled.config().filters
    }

    fn collections(&self) -> &[Collection] {
        &self.compiled.config().collections
    }
}

/// Last non-empty path segment: the slug of `/manga/one-piece/`.
fn last_segment(url: &Url) -> &str {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs() {
        let url = Url::parse("https://example.com/manga/one-piece/").unwrap();
        assert_eq!(last_segment(&url), "one-piece");
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(last_segment(&url), "");
    }
}
