//! Common test utilities and fixtures
//!
//! Shared configuration builders and markup used across the test modules.
//! Every source points at a local mockito server, so no test touches the
//! network.

use hondana::config::{FieldSpec, PaginationStrategy, RateLimit, SourceConfig};
use hondana::prelude::*;
use std::time::Duration;

#[allow(dead_code)]
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A permissive HTML source served by `base_url`.
///
/// The rate limit is generous so tests do not wait on the bucket.
#[allow(dead_code)]
pub fn html_source(id: &str, base_url: &str) -> SourceConfig {
    let mut config = SourceConfig::new(id, format!("Test {id}"), base_url);
    config.rate_limit = RateLimit::new(100, 1);
    config.max_retries = 0;
    config.pagination = PaginationStrategy::Selector;

    config.urls.popular = "/popular/page/{page}/".to_string();
    config.urls.latest = Some("/latest/page/{page}/".to_string());
    config.urls.search = Some("/search?q={query}&page={page}".to_string());

    let s = &mut config.selectors;
    s.popular_item = Some("div.item".to_string());
    s.title = Some(FieldSpec::text("h3"));
    s.url = Some(FieldSpec::attr("a", "href"));
    s.thumbnail = Some(FieldSpec::attr("img", "data-src").or_attr("src"));
    s.next_page = Some("a.next".to_string());

    s.detail_title = Some(FieldSpec::text("h1.title"));
    s.author = Some(FieldSpec::text("div.author a"));
    s.genre = Some(FieldSpec::text("div.genres a"));
    s.description = Some(FieldSpec::text("div.summary p"));
    s.status = Some(FieldSpec::text("span.status"));

    s.chapter_item = Some("li.chapter".to_string());
    s.chapter_date = Some(FieldSpec::text("span.date"));
    s.page_item = Some("div.reader img".to_string());

    config
}

/// Registers `config` into a fresh registry.
#[allow(dead_code)]
pub fn registry(config: SourceConfig) -> Sources {
    let mut sources = Sources::new();
    sources.register(config).expect("valid test source");
    sources
}

/// Listing markup with one item per `(title, href)`; a `None` title leaves
/// the heading out.
#[allow(dead_code)]
pub fn listing_html(items: &[(Option<&str>, &str)], next: bool) -> String {
    let mut html = String::from("<html><body><div class=\"list\">");
    for (title, href) in items {
        html.push_str("<div class=\"item\">");
        if let Some(title) = title {
            html.push_str(&format!("<h3>{title}</h3>"));
        }
        html.push_str(&format!("<a href=\"{href}\"><img data-src=\"/covers{href}cover.jpg\"></a></div>"));
    }
    html.push_str("</div>");
    if next {
        html.push_str("<a class=\"next\" href=\"?page=2\">Next</a>");
    }
    html.push_str("</body></html>");
    html
}

/// Detail page of a manga with the given chapters `(name, href, date)`.
#[allow(dead_code)]
pub fn detail_html(title: &str, chapters: &[(&str, &str, &str)]) -> String {
    let mut html = format!(
        r#"<html><head><meta property="og:image" content="/covers/main.jpg"></head><body>
        <h1 class="title">{title}</h1>
        <div class="author"><a>Oda Eiichiro</a><a>Oda Eiichiro</a></div>
        <div class="genres"><a>Action</a><a>Adventure</a><a>action</a></div>
        <div class="summary"><p>First paragraph.</p><p>Second paragraph.</p></div>
        <span class="status">Ongoing</span>
        <ul>"#
    );
    for (name, href, date) in chapters {
        html.push_str(&format!(
            r#"<li class="chapter"><a href="{href}">{name}</a><span class="date">{date}</span></li>"#
        ));
    }
    html.push_str("</ul></body></html>");
    html
}
