//! Preset for sites running the MangaThemesia (MangaStream) WordPress theme.

use crate::config::{FieldSpec, PaginationStrategy, SourceConfig, UrlTemplates};
use crate::date::DateConfig;
use crate::filter::{FilterDescriptor, SelectOption};
use crate::types::Collection;

/// Settings that vary between MangaThemesia sites.
#[derive(Debug, Clone)]
pub struct MangaThemesiaPreset {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub lang: String,
    pub manga_path: String,
    pub date_format: String,
    pub collections: Vec<Collection>,
}

impl MangaThemesiaPreset {
    pub fn new(id: impl Into<String>, name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            base_url: base_url.into(),
            lang: "en".to_string(),
            manga_path: "manga".to_string(),
            date_format: "%B %d, %Y".to_string(),
            collections: Vec::new(),
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

    /// Adds a genre page, listed at `genres/<slug>/`.
    pub fn genre(mut self, label: impl Into<String>, slug: impl Into<String>) -> Self {
        self.collections.push(Collection::new(label, slug));
        self
    }

    pub fn build(self) -> SourceConfig {
        let path = &self.manga_path;
        let mut config = SourceConfig::new(self.id.clone(), self.name.clone(), self.base_url.clone());
        config.lang = self.lang.clone();
        config.date = DateConfig::new(self.date_format.clone(), self.lang.clone());

        config.urls = UrlTemplates {
            popular: format!("{path}/?page={{page}}&order=popular"),
            latest: Some(format!("{path}/?page={{page}}&order=update")),
            search: Some(format!("{path}/?page={{page}}&title={{query}}")),
            collection: Some("genres/{collection}/page/{page}/".to_string()),
            ..UrlTemplates::default()
        };
        config.pagination = PaginationStrategy::Selector;
        config.collections = self.collections;

        let s = &mut config.selectors;
        s.popular_item = Some("div.listupd div.bsx, div.bsx".to_string());
        s.title = Some(FieldSpec::attr("a", "title").or_attr("oldtitle"));
        s.url = Some(FieldSpec::attr("a", "href"));
        s.thumbnail = Some(
            FieldSpec::attr("img", "data-src")
                .or_attr("data-lazy-src")
                .or_attr("src"),
        );
        s.next_page = Some("div.pagination a.next, div.hpage a.r".to_string());

        s.detail_title = Some(FieldSpec::text("h1.entry-title"));
        s.author = Some(FieldSpec::text("div.fmed:nth-of-type(2) span"));
        s.genre = Some(FieldSpec::text("span.mgen a, div.seriestugenre a"));
        s.description = Some(FieldSpec::text("div[itemprop=description] p"));
        s.status = Some(FieldSpec::text("div.tsinfo div.imptdt:first-child i"));

        s.chapter_item = Some("div#chapterlist li, div.eplister li".to_string());
        s.chapter_name = FieldSpec::text("span.chapternum");
        s.chapter_date = Some(FieldSpec::text("span.chapterdate"));
        s.page_item = Some("div#readerarea img".to_string());

        config.filters = vec![
            FilterDescriptor::select(
                "Status",
                "status",
                vec![
                    SelectOption::new("Any", ""),
                    SelectOption::new("Ongoing", "ongoing"),
                    SelectOption::new("Completed", "completed"),
                    SelectOption::new("Hiatus", "hiatus"),
                ],
            ),
            FilterDescriptor::select(
                "Type",
                "type",
                vec![
                    SelectOption::new("Any", ""),
                    SelectOption::new("Manga", "manga"),
                    SelectOption::new("Manhwa", "manhwa"),
                    SelectOption::new("Manhua", "manhua"),
                    SelectOption::new("Comic", "comic"),
                ],
            ),
            FilterDescriptor::select(
                "Order",
                "order",
                vec![
                    SelectOption::new("Default", ""),
                    SelectOption::new("A-Z", "title"),
                    SelectOption::new("Z-A", "titlereverse"),
                    SelectOption::new("Update", "update"),
                    SelectOption::new("Added", "latest"),
                    SelectOption::new("Popular", "popular"),
                ],
            ),
        ];

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_with_genres_compiles() {
        let config = MangaThemesiaPreset::new("themesia", "Themesia", "https://themesia.example")
            .genre("Action", "action")
            .genre("Romance", "romance")
            .build();

        assert_eq!(config.collections.len(), 2);
        assert!(config.compile().is_ok());
    }
}
