//! Markup extraction layer.
//!
//! A fetched body becomes a [`Document`] (HTML tree or JSON value). Selector
//! expressions are compiled once into [`Query`] values and evaluated against
//! the document or against a single [`Node`]. A [`Field`] couples a query
//! with the attributes to read, which is all the pipelines need to turn an
//! item node into a value:
//!
//! - an optional field that matches nothing reads as `None`;
//! - a mandatory field that matches nothing fails with
//!   [`Error::RequiredFieldMissing`], which callers turn into "skip this item".
//!
//! ```rust
//! use hondana::config::DocumentFormat;
//! use hondana::markup::{Document, Query};
//!
//! let doc = Document::parse(r#"<div class="item"><a href="/manga/a">A</a></div>"#, Some("text/html")).unwrap();
//! let items = doc.select(&Query::parse("div.item", DocumentFormat::Html).unwrap());
//! let link = Query::parse("a", DocumentFormat::Html).unwrap();
//!
//! assert_eq!(items.len(), 1);
//! assert_eq!(items[0].first(&link).and_then(|a| a.attr("href")), Some("/manga/a".to_string()));
//! ```

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

use crate::config::DocumentFormat;
use crate::error::{Error, Result};
use crate::net::{html, json};

/// A compiled selector expression.
#[derive(Debug, Clone)]
pub enum Query {
    /// CSS selector over an HTML tree
    Css(Selector),
    /// Dot path over a JSON value
    Path(Vec<String>),
    /// The node the query is evaluated on
    Current,
}

impl Query {
    /// Compiles an expression for the given document format.
    ///
    /// An empty expression (or `.` for JSON) designates the current node.
    pub fn parse(expr: &str, format: DocumentFormat) -> std::result::Result<Self, String> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Ok(Query::Current);
        }

        match format {
            DocumentFormat::Html => Selector::parse(expr)
                .map(Query::Css)
                .map_err(|e| format!("invalid CSS selector `{expr}`: {e}")),
            DocumentFormat::Json => {
                let path = json::split_path(expr);
                Ok(if path.is_empty() { Query::Current } else { Query::Path(path) })
            }
        }
    }
}

/// A parsed response body.
#[derive(Debug)]
pub enum Document {
    Html(Html),
    Json(Value),
}

impl Document {
    /// Parses a body, choosing JSON when the content type says so.
    pub fn parse(body: &str, content_type: Option<&str>) -> Result<Self> {
        let is_json = content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("json"));
        Self::parse_as(body, if is_json { DocumentFormat::Json } else { DocumentFormat::Html })
    }

    /// Parses a body in a fixed format.
    ///
    /// HTML parsing never fails; malformed markup is repaired the way
    /// browsers do. JSON bodies must be valid.
    pub fn parse_as(body: &str, format: DocumentFormat) -> Result<Self> {
        match format {
            DocumentFormat::Html => Ok(Document::Html(html::parse(body))),
            DocumentFormat::Json => Ok(Document::Json(serde_json::from_str(body)?)),
        }
    }

    pub fn format(&self) -> DocumentFormat {
        match self {
            Document::Html(_) => DocumentFormat::Html,
            Document::Json(_) => DocumentFormat::Json,
        }
    }

    pub fn root(&self) -> Node<'_> {
        match self {
            Document::Html(doc) => Node::Element(doc.root_element()),
            Document::Json(value) => Node::Json(value),
        }
    }

    /// Every node matching `query` in document order.
    pub fn select(&self, query: &Query) -> Vec<Node<'_>> {
        match (self, query) {
            (Document::Html(doc), Query::Css(selector)) => {
                doc.select(selector).map(Node::Element).collect()
            }
            _ => self.root().select(query),
        }
    }

    /// `<meta property|name="key" content>` of an HTML document.
    pub fn meta(&self, key: &str) -> Option<String> {
        match self {
            Document::Html(doc) => html::meta_content(doc, key),
            Document::Json(_) => None,
        }
    }
}

/// One node of a [`Document`].
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Element(ElementRef<'a>),
    Json(&'a Value),
}

impl<'a> Node<'a> {
    /// Nodes matching `query` below this node.
    ///
    /// A query of the wrong format (CSS on JSON) matches nothing.
    pub fn select(&self, query: &Query) -> Vec<Node<'a>> {
        match (*self, query) {
            (Node::Json(Value::Array(items)), Query::Current) => items.iter().map(Node::Json).collect(),
            (node, Query::Current) => vec![node],
            (Node::Element(el), Query::Css(selector)) => el.select(selector).map(Node::Element).collect(),
            (Node::Json(value), Query::Path(path)) => {
                json::select_path(value, path).into_iter().map(Node::Json).collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn first(&self, query: &Query) -> Option<Node<'a>> {
        self.select(query).into_iter().next()
    }

    /// Visible text, whitespace-collapsed; `None` when empty.
    pub fn text(&self) -> Option<String> {
        match self {
            Node::Element(el) => html::element_text(*el),
            Node::Json(value) => json::scalar_text(value),
        }
    }

    /// Text with whitespace untouched, e.g. the body of a `<script>`.
    pub fn raw_text(&self) -> String {
        match self {
            Node::Element(el) => html::element_raw_text(*el),
            Node::Json(Value::String(s)) => s.clone(),
            Node::Json(value) => value.to_string(),
        }
    }

    /// Non-empty attribute value; for JSON nodes, the scalar under key `name`.
    pub fn attr(&self, name: &str) -> Option<String> {
        match self {
            Node::Element(el) => html::element_attr(*el, name),
            Node::Json(value) => json::extract_path(value, name).and_then(json::scalar_text),
        }
    }

    /// First non-empty attribute out of `attrs`, or the text when `attrs` is empty.
    pub fn value(&self, attrs: &[String]) -> Option<String> {
        if attrs.is_empty() {
            self.text()
        } else {
            attrs.iter().find_map(|a| self.attr(a))
        }
    }

    /// Attribute resolved against `base` into an absolute URL.
    pub fn absolute_url(&self, attr: &str, base: &Url) -> Option<String> {
        self.attr(attr).and_then(|raw| absolute_url(base, &raw))
    }

    /// Whether the node counts as present for has-next checks.
    pub fn is_truthy(&self) -> bool {
        match self {
            Node::Element(_) => true,
            Node::Json(value) => json::is_truthy(value),
        }
    }
}

/// A compiled field: where to look and what to read.
#[derive(Debug, Clone)]
pub struct Field<'c> {
    /// Field name reported by [`Error::RequiredFieldMissing`]
    pub name: &'static str,
    pub query: Arc<Query>,
    pub attrs: &'c [String],
}

impl Field<'_> {
    /// Nodes matched below `node`.
    pub fn nodes<'a>(&self, node: &Node<'a>) -> Vec<Node<'a>> {
        node.select(&self.query)
    }

    /// First value among the matched nodes.
    pub fn read(&self, node: &Node<'_>) -> Option<String> {
        self.nodes(node).into_iter().find_map(|n| n.value(self.attrs))
    }

    /// Every value among the matched nodes, in order.
    pub fn read_all(&self, node: &Node<'_>) -> Vec<String> {
        self.nodes(node).into_iter().filter_map(|n| n.value(self.attrs)).collect()
    }

    /// Like [`read`](Field::read), failing when nothing is found.
    pub fn require(&self, node: &Node<'_>) -> Result<String> {
        self.read(node).ok_or_else(|| Error::required_field(self.name))
    }

    /// First value read against the whole document.
    pub fn read_in(&self, doc: &Document) -> Option<String> {
        doc.select(&self.query).into_iter().find_map(|n| n.value(self.attrs))
    }

    /// Whether a truthy node matches anywhere in the document.
    pub fn exists_in(&self, doc: &Document) -> bool {
        doc.select(&self.query).iter().any(Node::is_truthy)
    }
}

/// Resolves a possibly relative or protocol-relative URL against `base`.
pub fn absolute_url(base: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("javascript:") || raw.starts_with('#') {
        return None;
    }
    base.join(raw).ok().map(String::from)
}

/// Rewrites a URL found on the site as a base-relative path.
///
/// Absolute URLs on another host are rejected: such a link cannot be turned
/// back into a request against this source.
///
/// ```rust
/// use hondana::markup::relative_url;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/").unwrap();
/// assert_eq!(relative_url(&base, "https://example.com/manga/a/?x=1").as_deref(), Some("/manga/a/?x=1"));
/// assert_eq!(relative_url(&base, "manga/b").as_deref(), Some("/manga/b"));
/// assert_eq!(relative_url(&base, "https://other.org/manga/c"), None);
/// ```
pub fn relative_url(base: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("javascript:") {
        return None;
    }

    let resolved = base.join(raw).ok()?;
    let same_host = resolved.host_str().map(|h| h.trim_start_matches("www."))
        == base.host_str().map(|h| h.trim_start_matches("www."));
    if !same_host {
        return None;
    }

    Some(resolved[url::Position::BeforePath..url::Position::AfterQuery].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn css(expr: &str) -> Query {
        Query::parse(expr, DocumentFormat::Html).unwrap()
    }

    #[test]
    fn optional_and_required_fields() {
        let doc = Document::parse_as(
            r#"<div class="item"><img data-src="" src="/c.jpg"></div>"#,
            DocumentFormat::Html,
        )
        .unwrap();
        let item = doc.select(&css("div.item"))[0];

        let attrs = vec!["data-src".to_string(), "src".to_string()];
        let thumb = Field {
            name: "thumbnail",
            query: Arc::new(css("img")),
            attrs: &attrs,
        };
        assert_eq!(thumb.read(&item), Some("/c.jpg".to_string()));

        let title = Field {
            name: "title",
            query: Arc::new(css("h3")),
            attrs: &[],
        };
        assert_eq!(title.read(&item), None);
        assert!(matches!(
            title.require(&item),
            Err(Error::RequiredFieldMissing { field }) if field == "title"
        ));
    }

    #[test]
    fn json_documents() {
        let body = json!({"data": [{"name": "A", "slug": "a"}, {"name": "B"}], "hasNext": false}).to_string();
        let doc = Document::parse(&body, Some("application/json; charset=utf-8")).unwrap();
        assert_eq!(doc.format(), DocumentFormat::Json);

        let items = doc.select(&Query::parse("data", DocumentFormat::Json).unwrap());
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].attr("slug"), Some("a".to_string()));
        assert_eq!(items[1].attr("slug"), None);

        let has_next = Field {
            name: "next_page",
            query: Arc::new(Query::parse("hasNext", DocumentFormat::Json).unwrap()),
            attrs: &[],
        };
        assert!(!has_next.exists_in(&doc));
    }

    #[test]
    fn empty_selector_is_the_node_itself() {
        let doc = Document::parse_as(r#"<a class="t" href="/x"> Title </a>"#, DocumentFormat::Html).unwrap();
        let link = doc.select(&css("a.t"))[0];
        assert_eq!(link.first(&Query::Current).and_then(|n| n.text()), Some("Title".to_string()));
    }

    #[test]
    fn url_resolution() {
        let base = Url::parse("https://example.com/manga/").unwrap();
        assert_eq!(
            absolute_url(&base, "//cdn.example.com/1.jpg").as_deref(),
            Some("https://cdn.example.com/1.jpg")
        );
        assert_eq!(absolute_url(&base, "p/2.jpg").as_deref(), Some("https://example.com/manga/p/2.jpg"));
        assert_eq!(absolute_url(&base, "javascript:void(0)"), None);
        assert_eq!(
            relative_url(&base, "https://www.example.com/manga/x/").as_deref(),
            Some("/manga/x/")
        );
    }
}
