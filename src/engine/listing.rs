//! Listing pipeline: popular, latest, search and collection pages.
//!
//! A listing goes through two pure steps around one fetch:
//!
//! 1. [`build_listing_request`] expands the kind's URL template with the
//!    cursor, query and filters into a [`ListingRequest`];
//! 2. [`parse_listing`] maps the fetched body to a [`ListingPage`].
//!
//! Both are deterministic in their inputs. Time-dependent values (the
//! weekday of schedule pages) are captured in the request, so parsing the
//! same body for the same request always gives the same page.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::config::{CompiledSource, PaginationStrategy, SelectorVars, expand};
use crate::error::{Error, Result};
use crate::filter;
use crate::markup::{self, Document, Field, Node};
use crate::net::Request;
use crate::types::{Cursor, ListingKind, ListingPage, MangaSummary, SearchQuery};

/// A built listing request with everything parsing needs to know about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRequest {
    pub kind: ListingKind,
    pub request: Request,
    pub cursor: Cursor,
    /// Collection path for [`ListingKind::Collection`]
    pub collection: Option<String>,
    pub vars: SelectorVars,
}

/// Builds the request of one listing page.
///
/// # Errors
///
/// [`Error::UnsupportedOperation`] when the source has no template for
/// `kind`; [`Error::Fetch`] (non-retriable) when the expanded URL is invalid.
pub fn build_listing_request(
    source: &CompiledSource,
    kind: ListingKind,
    cursor: &Cursor,
    search: Option<&SearchQuery>,
    collection: Option<&str>,
    now: DateTime<Utc>,
) -> Result<ListingRequest> {
    let config = source.config();
    let template = source
        .listing_template(kind)
        .ok_or_else(|| Error::unsupported(source.id(), kind.as_str()))?;

    let vars = SelectorVars::at(now, &config.lang);
    let page = cursor.page_number();
    let page_size = config.urls.page_size;

    let resolved = match search {
        Some(search) => filter::resolve(&config.filters, &search.filters),
        None => filter::ResolvedFilters::default(),
    };

    let mut values: BTreeMap<&str, String> = BTreeMap::new();
    values.insert("page", page.to_string());
    values.insert("offset", (u64::from(page - 1) * u64::from(page_size)).to_string());
    values.insert("page_size", page_size.to_string());
    values.insert(
        "cursor",
        match cursor {
            Cursor::Page(n) => n.to_string(),
            Cursor::Token(token) => urlencoding::encode(token).into_owned(),
        },
    );
    values.insert(
        "query",
        search.map(|s| urlencoding::encode(s.query.trim()).into_owned()).unwrap_or_default(),
    );
    values.insert("collection", collection.unwrap_or_default().to_string());
    values.insert("lang", vars.lang.clone());
    values.insert("weekday", vars.weekday.clone());
    values.insert("weekday_short", vars.weekday_short.clone());
    for (key, value) in &resolved.path {
        values.insert(key.as_str(), urlencoding::encode(value).into_owned());
    }

    let expanded = expand(template, |name| values.get(name).map(String::as_str));
    let mut url = source
        .base()
        .join(&expanded)
        .map_err(|e| Error::fetch(&expanded, None, format!("invalid listing URL: {e}")).non_retriable())?;
    if !resolved.query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &resolved.query {
            pairs.append_pair(key, value);
        }
    }

    Ok(ListingRequest {
        kind,
        request: Request::get(url.to_string()),
        cursor: cursor.clone(),
        collection: collection.map(String::from),
        vars,
    })
}

/// Parses a fetched listing body.
///
/// Items missing a mandatory field (title, URL) or linking to another host
/// are skipped. Has-next follows the pagination strategy of the kind:
///
/// - `Never`: always false, whatever the markup says;
/// - `Always`: true while the page had candidate items;
/// - `Selector` / `LoadMore`: the `next_page` / `load_more` node is present.
///
/// With a `next_cursor` field the following cursor is the token it reads;
/// otherwise it is the next page number.
pub fn parse_listing(source: &CompiledSource, request: &ListingRequest, body: &str) -> Result<ListingPage> {
    let config = source.config();
    let arena = source.arena();
    let vars = &request.vars;
    let doc = Document::parse_as(body, config.format)?;

    let item_field = source.item_field(request.kind);
    let items_query = arena
        .field(item_field, vars)?
        .ok_or_else(|| Error::invalid_config(source.id(), format!("missing `{item_field}` selector")))?;
    let fields = SummaryFields {
        title: arena
            .field("title", vars)?
            .ok_or_else(|| Error::invalid_config(source.id(), "missing `title` selector"))?,
        url: arena
            .field("url", vars)?
            .ok_or_else(|| Error::invalid_config(source.id(), "missing `url` selector"))?,
        thumbnail: arena.field("thumbnail", vars)?,
    };

    let nodes = doc.select(&items_query.query);
    let mut items = Vec::with_capacity(nodes.len());

    for (index, node) in nodes.iter().enumerate() {
        match summary_from(source, node, &fields) {
            Ok(summary) => items.push(summary),
            Err(Error::RequiredFieldMissing { field }) => {
                tracing::debug!(source = %config.id, index, %field, "skipping listing item");
            }
            Err(e) => return Err(e),
        }
    }

    let strategy = source.pagination_for(request.kind, request.collection.as_deref());
    let mut has_next_page = match strategy {
        PaginationStrategy::Never => false,
        PaginationStrategy::Always => !nodes.is_empty(),
        PaginationStrategy::Selector => marker_present(source, "next_page", vars, &doc)?,
        PaginationStrategy::LoadMore => marker_present(source, "load_more", vars, &doc)?,
    };

    let next_cursor = if has_next_page {
        match arena.field("next_cursor", vars)? {
            Some(field) => {
                let token = field.read_in(&doc);
                has_next_page = token.is_some();
                token.map(Cursor::Token)
            }
            None => {
                let next = request.cursor.page_number().checked_add(1);
                has_next_page = next.is_some();
                next.map(Cursor::Page)
            }
        }
    } else {
        None
    };

    tracing::debug!(
        source = %config.id,
        kind = request.kind.as_str(),
        candidates = nodes.len(),
        items = items.len(),
        has_next_page,
        "parsed listing"
    );

    Ok(ListingPage {
        items,
        has_next_page,
        next_cursor,
    })
}

struct SummaryFields<'c> {
    title: Field<'c>,
    url: Field<'c>,
    thumbnail: Option<Field<'c>>,
}

fn summary_from(source: &CompiledSource, node: &Node<'_>, fields: &SummaryFields<'_>) -> Result<MangaSummary> {
    let title = fields.title.require(node)?;
    let raw_url = fields.url.require(node)?;
    // A link to another host cannot be expressed relative to the base.
    let url = markup::relative_url(source.base(), &raw_url).ok_or_else(|| Error::required_field("url"))?;
    let thumbnail_url = fields
        .thumbnail
        .as_ref()
        .and_then(|f| f.read(node))
        .and_then(|raw| markup::absolute_url(source.base(), &raw));

    Ok(MangaSummary {
        title,
        url,
        thumbnail_url,
        source_id: source.id().to_string(),
    })
}

fn marker_present(source: &CompiledSource, name: &'static str, vars: &SelectorVars, doc: &Document) -> Result<bool> {
    Ok(source
        .arena()
        .field(name, vars)?
        .is_some_and(|field| field.exists_in(doc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldSpec, SourceConfig};
    use crate::filter::{FilterDescriptor, FilterValue, SelectOption};
    use crate::types::SearchQueryBuilder;
    use chrono::TimeZone;

    fn source(pagination: PaginationStrategy) -> CompiledSource {
        let mut config = SourceConfig::new("t", "T", "https://example.com");
        config.urls.popular = "/popular/page/{page}/".to_string();
        config.urls.search = Some("/search?q={query}&offset={offset}".to_string());
        config.selectors.popular_item = Some("div.item".to_string());
        config.selectors.title = Some(FieldSpec::text("h3"));
        config.selectors.url = Some(FieldSpec::attr("a", "href"));
        config.selectors.thumbnail = Some(FieldSpec::attr("img", "data-src").or_attr("src"));
        config.selectors.next_page = Some("a.next".to_string());
        config.selectors.chapter_item = Some("li".to_string());
        config.selectors.page_item = Some("img".to_string());
        config.pagination = pagination;
        config.filters = vec![FilterDescriptor::select(
            "Status",
            "status",
            vec![SelectOption::new("Any", ""), SelectOption::new("Ongoing", "on-going")],
        )];
        config.compile().unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 12, 0, 0).unwrap()
    }

    const PAGE: &str = r#"
        <div class="item"><h3>First</h3><a href="/manga/first/"></a><img data-src="/c/1.jpg"></div>
        <div class="item"><a href="/manga/no-title/"></a></div>
        <div class="item"><h3>Third</h3><a href="https://example.com/manga/third/"></a></div>
        <div class="item"><h3>Elsewhere</h3><a href="https://other.org/manga/x/"></a></div>
        <a class="next" href="/popular/page/2/">Next</a>
    "#;

    #[test]
    fn builds_search_url_with_filters() {
        let source = source(PaginationStrategy::Selector);
        let query = SearchQueryBuilder::default()
            .query("one piece")
            .cursor(Cursor::Page(3))
            .filters(vec![FilterValue::select("Status", 1)])
            .build()
            .unwrap();

        let request = build_listing_request(&source, ListingKind::Search, &query.cursor, Some(&query), None, now()).unwrap();
        assert_eq!(
            request.request.url,
            "https://example.com/search?q=one%20piece&offset=40&status=on-going"
        );
        assert_eq!(request.vars.weekday, "monday");
    }

    #[test]
    fn missing_template_is_unsupported() {
        let source = source(PaginationStrategy::Never);
        let result = build_listing_request(&source, ListingKind::Latest, &Cursor::first(), None, None, now());
        assert!(matches!(result, Err(Error::UnsupportedOperation { .. })));
    }

    #[test]
    fn skips_invalid_items() {
        let source = source(PaginationStrategy::Selector);
        let request = build_listing_request(&source, ListingKind::Popular, &Cursor::first(), None, None, now()).unwrap();
        let page = parse_listing(&source, &request, PAGE).unwrap();

        let titles: Vec<_> = page.items.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Third"]);
        assert_eq!(page.items[1].url, "/manga/third/");
        assert_eq!(page.items[0].thumbnail_url.as_deref(), Some("https://example.com/c/1.jpg"));
        assert!(page.has_next_page);
        assert_eq!(page.next_cursor, Some(Cursor::Page(2)));
    }

    #[test]
    fn never_ignores_next_links() {
        let source = source(PaginationStrategy::Never);
        let request = build_listing_request(&source, ListingKind::Popular, &Cursor::first(), None, None, now()).unwrap();
        let page = parse_listing(&source, &request, PAGE).unwrap();
        assert!(!page.has_next_page);
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn always_stops_on_empty_page() {
        let source = source(PaginationStrategy::Always);
        let request = build_listing_request(&source, ListingKind::Popular, &Cursor::Page(4), None, None, now()).unwrap();

        let page = parse_listing(&source, &request, PAGE).unwrap();
        assert_eq!(page.next_cursor, Some(Cursor::Page(5)));

        let empty = parse_listing(&source, &request, "<p>No results</p>").unwrap();
        assert!(!empty.has_next_page);
    }

    #[test]
    fn last_representable_page_has_no_successor() {
        let source = source(PaginationStrategy::Always);
        let request =
            build_listing_request(&source, ListingKind::Popular, &Cursor::Page(u32::MAX), None, None, now()).unwrap();

        let page = parse_listing(&source, &request, PAGE).unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(!page.has_next_page);
        assert_eq!(page.next_cursor, None);
    }
}
