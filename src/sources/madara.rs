//! Preset for sites running the Madara WordPress theme.
//!
//! ```rust
//! use hondana::sources::madara::MadaraPreset;
//! use hondana::Sources;
//!
//! let config = MadaraPreset::new("lelmanga", "Lelmanga", "https://www.lelmanga.com")
//!     .lang("fr")
//!     .date_format("%d %B %Y")
//!     .build();
//!
//! let mut sources = Sources::new();
//! sources.register(config).unwrap();
//! ```

use crate::config::{FieldSpec, HttpMethod, PaginationStrategy, SourceConfig, UrlTemplates};
use crate::date::DateConfig;
use crate::filter::{FilterDescriptor, SelectOption};

/// Settings that vary between Madara sites.
#[derive(Debug, Clone)]
pub struct MadaraPreset {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub lang: String,
    /// Path segment of series pages, `manga` in `/manga/one-piece/`
    pub manga_path: String,
    pub date_format: String,
    /// Load chapters from `<manga>/ajax/chapters/` instead of the detail page
    pub ajax_chapters: bool,
}

impl MadaraPreset {
    pub fn new(id: impl Into<String>, name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            base_url: base_url.into(),
            lang: "en".to_string(),
            manga_path: "manga".to_string(),
            date_format: "%B %d, %Y".to_string(),
            ajax_chapters: true,
        }
    }

    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn manga_path(mut self, path: impl Into<String>) -> Self {
        self.manga_path = path.into().trim_matches('/').to_string();
        self
    }

    pub fn date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    /// Reads chapters from the detail page itself (older theme versions).
    pub fn inline_chapters(mut self) -> Self {
        self.ajax_chapters = false;
        self
    }

    pub fn build(self) -> SourceConfig {
        let path = &self.manga_path;
        let mut config = SourceConfig::new(self.id.clone(), self.name.clone(), self.base_url.clone());
        config.lang = self.lang.clone();
        config.date = DateConfig::new(self.date_format.clone(), self.lang.clone());

        config.urls = UrlTemplates {
            popular: format!("{path}/page/{{page}}/?m_orderby=views"),
            latest: Some(format!("{path}/page/{{page}}/?m_orderby=latest")),
            search: Some("page/{page}/?s={query}&post_type=wp-manga".to_string()),
            collection: Some("manga-genre/{collection}/page/{page}/".to_string()),
            chapter_list: Some("{manga_url}ajax/chapters/".to_string()),
            chapter_list_method: HttpMethod::Post,
            ..UrlTemplates::default()
        };
        config.use_alternate_chapter_endpoint = self.ajax_chapters;
        config.pagination = PaginationStrategy::Selector;

        let s = &mut config.selectors;
        s.popular_item = Some("div.page-item-detail, div.c-tabs-item__content".to_string());
        s.title = Some(FieldSpec::text("div.post-title a, h3 a, h4 a"));
        s.url = Some(FieldSpec::attr("div.post-title a, h3 a, h4 a", "href"));
        s.thumbnail = Some(
            FieldSpec::attr("img", "data-src")
                .or_attr("data-lazy-src")
                .or_attr("src"),
        );
        s.next_page = Some("div.nav-previous a, a.nextpostslink, div.wp-pagenavi a.next".to_string());

        s.detail_title = Some(FieldSpec::text("div.post-title h1, div.post-title h3"));
        s.author = Some(FieldSpec::text("div.author-content a"));
        s.artist = Some(FieldSpec::text("div.artist-content a"));
        s.genre = Some(FieldSpec::text("div.genres-content a"));
        s.description = Some(FieldSpec::text(
            "div.description-summary div.summary__content p, div.manga-excerpt p",
        ));
        s.status = Some(FieldSpec::text(
            "div.post-status div.post-content_item:last-child div.summary-content",
        ));

        s.chapter_item = Some("li.wp-manga-chapter".to_string());
        s.chapter_date = Some(FieldSpec::text("span.chapter-release-date"));
        s.page_item = Some("div.page-break img, div.reading-content img".to_string());

        config.filters = vec![
            FilterDescriptor::text("Author", "author"),
            FilterDescriptor::text("Artist", "artist"),
            FilterDescriptor::select(
                "Status",
                "status[]",
                vec![
                    SelectOption::new("Any", ""),
                    SelectOption::new("Ongoing", "on-going"),
                    SelectOption::new("Completed", "end"),
                    SelectOption::new("Canceled", "canceled"),
                    SelectOption::new("On Hold", "on-hold"),
                ],
            ),
            FilterDescriptor::select(
                "Order",
                "m_orderby",
                vec![
                    SelectOption::new("Relevance", ""),
                    SelectOption::new("Latest", "latest"),
                    SelectOption::new("A-Z", "alphabet"),
                    SelectOption::new("Rating", "rating"),
                    SelectOption::new("Trending", "trending"),
                    SelectOption::new("Most Views", "views"),
                    SelectOption::new("New", "new-manga"),
                ],
            ),
            FilterDescriptor::select(
                "Adult content",
                "adult",
                vec![
                    SelectOption::new("All", ""),
                    SelectOption::new("None", "0"),
                    SelectOption::new("Only", "1"),
                ],
            ),
        ];

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChapterOrder;

    #[test]
    fn preset_compiles() {
        let config = MadaraPreset::new("madara", "Madara", "https://madara.example")
            .manga_path("/series/")
            .build();
        assert_eq!(config.urls.popular, "series/page/{page}/?m_orderby=views");
        assert_eq!(config.chapter_order, ChapterOrder::Site);

        let compiled = config.compile().unwrap();
        assert_eq!(compiled.id(), "madara");
    }

    #[test]
    fn inline_chapters_disable_ajax() {
        let config = MadaraPreset::new("m", "M", "https://m.example").inline_chapters().build();
        assert!(!config.use_alternate_chapter_endpoint);
        assert!(config.compile().is_ok());
    }
}
