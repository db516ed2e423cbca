//! HTML helpers shared by the markup layer.
//!
//! Thin wrappers over the `scraper` crate that normalize what sites put in
//! their markup: runs of whitespace, empty attributes, `<meta>` fallbacks.
//!
//! # Examples
//!
//! ```rust
//! use hondana::net::html;
//!
//! let document = html::parse(r#"
//!     <head><meta property="og:title" content="One Piece"></head>
//!     <div class="manga-item">
//!         <h3 class="title">  One
//!             Piece </h3>
//!         <img data-src="" src="cover.jpg">
//!     </div>
//! "#);
//!
//! let title = html::select_text(&document, ".title");
//! assert_eq!(title, Some("One Piece".to_string()));
//! assert_eq!(html::meta_content(&document, "og:title"), Some("One Piece".to_string()));
//! ```

use scraper::{ElementRef, Html, Selector};

/// Parses an HTML document from a string.
pub fn parse(html: &str) -> Html {
    Html::parse_document(html)
}

/// Text content of an element with whitespace runs collapsed.
///
/// Returns `None` when the element holds no visible text.
pub fn element_text(element: ElementRef<'_>) -> Option<String> {
    let collapsed = collapse_whitespace(&element.text().collect::<String>());
    (!collapsed.is_empty()).then_some(collapsed)
}

/// Raw text of an element, whitespace untouched (script bodies).
pub fn element_raw_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// Non-empty, trimmed attribute value of an element.
pub fn element_attr(element: ElementRef<'_>, name: &str) -> Option<String> {
    element
        .value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Extracts text content from the first element matching a CSS selector.
///
/// Returns `None` if no element matches, the selector is invalid, or the
/// element has no text.
pub fn select_text(html: &Html, selector: &str) -> Option<String> {
    Selector::parse(selector)
        .ok()
        .and_then(|sel| html.select(&sel).find_map(element_text))
}

/// `content` of the `<meta>` tag whose `property` or `name` equals `key`.
pub fn meta_content(html: &Html, key: &str) -> Option<String> {
    let sel = Selector::parse("meta[content]").ok()?;
    html.select(&sel)
        .filter(|el| {
            let value = el.value();
            value.attr("property") == Some(key) || value.attr("name") == Some(key)
        })
        .find_map(|el| element_attr(el, "content"))
}

/// Collapses every whitespace run into one space and trims the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_attributes_are_absent() {
        let doc = parse(r#"<img data-src="  " src="/a.jpg">"#);
        let img = doc.select(&Selector::parse("img").unwrap()).next().unwrap();
        assert_eq!(element_attr(img, "data-src"), None);
        assert_eq!(element_attr(img, "src"), Some("/a.jpg".to_string()));
    }

    #[test]
    fn text_joins_nested_nodes() {
        let doc = parse("<p>Chapter <b>12</b>\n  <i>Part 2</i></p>");
        assert_eq!(select_text(&doc, "p"), Some("Chapter 12 Part 2".to_string()));
        assert_eq!(select_text(&doc, "span"), None);
    }
}
