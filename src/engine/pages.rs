//! Page resolution: from a chapter document to ordered image URLs.
//!
//! Raw values are read from the page nodes in document order, then decoded
//! in parallel with rayon according to the source's [`PageStrategy`]. A value
//! that cannot be decoded drops its page only; survivors are re-indexed so
//! indices stay contiguous from zero.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use rayon::prelude::*;
use serde_json::Value;
use url::Url;

use crate::config::{CompiledSource, PageStrategy, SelectorVars};
use crate::error::{Error, Result};
use crate::markup::{self, Document};
use crate::net::json;
use crate::types::Page;

/// Outcome of parsing a chapter document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagePlan {
    /// Pages resolved from the document itself
    Ready(Vec<Page>),
    /// Pages are listed in a JSON manifest at this absolute URL
    Manifest(String),
}

/// Resolves the pages of a chapter document.
///
/// `chapter_url` is the absolute URL the document was fetched from; it is
/// the referer of every page and the base for relative image URLs.
pub fn parse_pages(
    source: &CompiledSource,
    chapter_url: &Url,
    body: &str,
    vars: &SelectorVars,
) -> Result<PagePlan> {
    let config = source.config();
    let doc = Document::parse_as(body, config.format)?;
    let item = source
        .arena()
        .field("page_item", vars)?
        .ok_or_else(|| Error::invalid_config(source.id(), "missing `page_item` selector"))?;
    let nodes = doc.select(&item.query);

    let raw: Vec<Option<String>> = match &config.page_strategy {
        PageStrategy::Attribute { attrs } => nodes.iter().map(|n| n.value(attrs)).collect(),
        PageStrategy::Base64 { attr } | PageStrategy::Template { attr, .. } => {
            nodes.iter().map(|n| n.attr(attr)).collect()
        }
        PageStrategy::Manifest { attr, .. } => {
            let from_attr = attr
                .as_deref()
                .and_then(|a| nodes.iter().find_map(|n| n.attr(a)));
            let from_pattern = || {
                source.manifest_pattern().and_then(|pattern| {
                    nodes.iter().find_map(|n| {
                        pattern
                            .captures(&n.raw_text())
                            .and_then(|caps| caps.get(1).map(|m| m.as_str().to_string()))
                    })
                })
            };
            let location = from_attr
                .or_else(from_pattern)
                .ok_or_else(|| Error::required_field("page_manifest"))?;
            let manifest = markup::absolute_url(chapter_url, &location)
                .ok_or_else(|| Error::parse(format!("invalid manifest URL `{location}`")))?;
            return Ok(PagePlan::Manifest(manifest));
        }
    };

    Ok(PagePlan::Ready(decode_all(source, chapter_url, chapter_url, raw)))
}

/// Resolves the pages listed in a manifest body.
///
/// Entries are URL strings, or objects carrying the URL under `url_field`.
/// Relative entries resolve against the manifest URL.
pub fn parse_manifest(
    source: &CompiledSource,
    chapter_url: &Url,
    manifest_url: &Url,
    body: &str,
) -> Result<Vec<Page>> {
    let PageStrategy::Manifest { path, url_field, .. } = &source.config().page_strategy else {
        return Err(Error::invalid_config(source.id(), "source does not use a page manifest"));
    };

    let value: Value = serde_json::from_str(body)?;
    let raw = json::select_path(&value, &json::split_path(path))
        .into_iter()
        .map(|entry| match (entry, url_field) {
            (Value::String(s), _) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            (entry, Some(field)) => json::extract_path(entry, field).and_then(json::scalar_text),
            _ => None,
        })
        .collect();

    Ok(decode_all(source, chapter_url, manifest_url, raw))
}

fn decode_all(source: &CompiledSource, referer: &Url, base: &Url, raw: Vec<Option<String>>) -> Vec<Page> {
    let strategy = &source.config().page_strategy;

    let decoded: Vec<Result<String>> = raw
        .into_par_iter()
        .enumerate()
        .map(|(index, value)| {
            let value = value.ok_or_else(|| Error::page_decode(index, "no image value"))?;
            decode_page(strategy, index, &value, base)
        })
        .collect();

    decoded
        .into_iter()
        .filter_map(|result| match result {
            Ok(url) => Some(url),
            Err(error) => {
                tracing::debug!(source = %source.id(), %error, "dropping page");
                None
            }
        })
        .enumerate()
        .map(|(index, image_url)| Page {
            index,
            referer: referer.to_string(),
            image_url,
        })
        .collect()
}

/// Turns one raw page value into an absolute image URL.
///
/// # Errors
///
/// [`Error::PageDecode`] for malformed base64, decoded bytes that are not a
/// URL, or values that do not resolve against `base`.
pub fn decode_page(strategy: &PageStrategy, index: usize, value: &str, base: &Url) -> Result<String> {
    let url = match strategy {
        PageStrategy::Base64 { .. } => decode_base64(value).ok_or_else(|| Error::page_decode(index, "malformed base64"))?,
        PageStrategy::Template { width, height, .. } => value
            .replace("{width}", &width.to_string())
            .replace("{height}", &height.to_string()),
        PageStrategy::Attribute { .. } | PageStrategy::Manifest { .. } => value.to_string(),
    };

    if url.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::page_decode(index, "value is not a URL"));
    }
    markup::absolute_url(base, &url).ok_or_else(|| Error::page_decode(index, format!("cannot resolve `{url}`")))
}

/// Decoded text must itself look like a link: absolute http(s),
/// protocol-relative or root-relative.
fn decode_base64(value: &str) -> Option<String> {
    let value = value.trim();
    let bytes = STANDARD
        .decode(value)
        .or_else(|_| URL_SAFE.decode(value))
        .or_else(|_| URL_SAFE_NO_PAD.decode(value))
        .ok()?;
    let decoded = String::from_utf8(bytes).ok()?.trim().to_string();

    let lower = decoded.to_ascii_lowercase();
    let linkish = lower.starts_with("http://") || lower.starts_with("https://") || decoded.starts_with('/');
    linkish.then_some(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/manga/x/chapter-1/").unwrap()
    }

    #[test]
    fn base64_pages() {
        let strategy = PageStrategy::Base64 { attr: "data-b64".to_string() };
        let encoded = STANDARD.encode("https://cdn.example.com/1.jpg");

        assert_eq!(
            decode_page(&strategy, 0, &encoded, &base()).unwrap(),
            "https://cdn.example.com/1.jpg"
        );
        assert!(matches!(
            decode_page(&strategy, 2, "%%%not base64", &base()),
            Err(Error::PageDecode { index: 2, .. })
        ));
    }

    #[test]
    fn base64_must_decode_to_a_link() {
        let strategy = PageStrategy::Base64 { attr: "data-b64".to_string() };

        assert!(matches!(
            decode_page(&strategy, 2, &STANDARD.encode("hello"), &base()),
            Err(Error::PageDecode { index: 2, .. })
        ));
        assert!(matches!(
            decode_page(&strategy, 0, &STANDARD.encode("ftp://cdn.example.com/1.jpg"), &base()),
            Err(Error::PageDecode { .. })
        ));
        assert_eq!(
            decode_page(&strategy, 0, &STANDARD.encode("//cdn.example.com/2.jpg"), &base()).unwrap(),
            "https://cdn.example.com/2.jpg"
        );
        assert_eq!(
            decode_page(&strategy, 0, &STANDARD.encode("/uploads/3.jpg"), &base()).unwrap(),
            "https://example.com/uploads/3.jpg"
        );
    }

    #[test]
    fn template_pages() {
        let strategy = PageStrategy::Template {
            attr: "data-tpl".to_string(),
            width: 800,
            height: 1200,
        };
        assert_eq!(
            decode_page(&strategy, 0, "/img/{width}x{height}/3.webp", &base()).unwrap(),
            "https://example.com/img/800x1200/3.webp"
        );
    }

    #[test]
    fn relative_attribute_pages() {
        let strategy = PageStrategy::default();
        assert_eq!(
            decode_page(&strategy, 0, " 02.jpg ", &base()).unwrap(),
            "https://example.com/manga/x/chapter-1/02.jpg"
        );
    }
}
