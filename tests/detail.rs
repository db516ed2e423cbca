//! Detail and chapter resolution tests against a local HTTP server.

use chrono::{Duration, TimeZone, Utc};
use hondana::Error;
use hondana::config::{ChapterOrder, HttpMethod};
use hondana::prelude::*;
use mockito::Matcher;

mod common;
use common::{detail_html, html_source, registry};

#[cfg(test)]
mod detail_tests {
    use super::*;

    #[tokio::test]
    async fn test_detail_with_inline_chapters() {
        let mut server = mockito::Server::new_async().await;
        let body = detail_html(
            "One Piece",
            &[
                ("Chapter 2", "/manga/one-piece/chapter-2/", "January 5, 2024"),
                ("Chapter 1.5", "/manga/one-piece/chapter-1-5/", "sometime soon"),
                ("Chapter 1", "https://other.org/one-piece/chapter-1/", "January 1, 2024"),
                ("Chapter 1", "/manga/one-piece/chapter-1/", "2 days ago"),
            ],
        );
        server
            .mock("GET", "/manga/one-piece/")
            .with_body(body)
            .create_async()
            .await;

        let sources = registry(html_source("detail", &server.url()));
        let detail = sources
            .get("detail")
            .unwrap()
            .fetch_detail(&format!("{}/manga/one-piece/", server.url()))
            .await
            .unwrap();

        assert_eq!(detail.summary.title, "One Piece");
        assert_eq!(detail.summary.url, "/manga/one-piece/");
        assert_eq!(detail.summary.source_id, "detail");
        assert_eq!(
            detail.summary.thumbnail_url,
            Some(format!("{}/covers/main.jpg", server.url()))
        );
        assert_eq!(detail.author.as_deref(), Some("Oda Eiichiro"));
        assert_eq!(detail.genres, vec!["Action", "Adventure"]);
        assert_eq!(detail.description.as_deref(), Some("First paragraph.\nSecond paragraph."));
        assert_eq!(detail.status, MangaStatus::Ongoing);

        let chapters = &detail.chapters;
        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[0].url, "/manga/one-piece/chapter-2/");
        assert_eq!(chapters[0].number, Some(2.0));
        assert_eq!(
            chapters[0].uploaded_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap())
        );

        // An unparsable date only clears the timestamp.
        assert_eq!(chapters[1].name, "Chapter 1.5");
        assert_eq!(chapters[1].number, Some(1.5));
        assert_eq!(chapters[1].uploaded_at, None);

        let two_days_ago = Utc::now() - Duration::days(2);
        let uploaded = chapters[2].uploaded_at.expect("relative date parsed");
        assert!((uploaded - two_days_ago).num_seconds().abs() < 60);
    }

    #[tokio::test]
    async fn test_numeric_chapter_order() {
        let mut server = mockito::Server::new_async().await;
        let body = detail_html(
            "Ordered",
            &[
                ("Chapter 1", "/m/o/chapter-1/", ""),
                ("Extra", "/m/o/extra/", ""),
                ("Chapter 3", "/m/o/chapter-3/", ""),
                ("Chapter 2", "/m/o/chapter-2/", ""),
            ],
        );
        server.mock("GET", "/m/o/").with_body(body).create_async().await;

        let mut config = html_source("ordered", &server.url());
        config.chapter_order = ChapterOrder::NumberDescending;
        let sources = registry(config);

        let detail = sources.get("ordered").unwrap().fetch_detail("/m/o/").await.unwrap();
        let names: Vec<_> = detail.chapters.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Chapter 3", "Chapter 2", "Chapter 1", "Extra"]);
    }

    #[tokio::test]
    async fn test_alternate_endpoint_follows_pages_until_nothing_new() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/manga/x/")
            .with_body(detail_html("X", &[("Inline", "/manga/x/inline/", "")]))
            .create_async()
            .await;

        let chapter_page = |chapters: &[(&str, &str)]| {
            let items: String = chapters
                .iter()
                .map(|(name, href)| format!(r#"<li class="chapter"><a href="{href}">{name}</a></li>"#))
                .collect();
            format!("<ul>{items}</ul>")
        };
        let first = ajax_mock(&mut server, 1, chapter_page(&[("Chapter 3", "/manga/x/chapter-3/"), ("Chapter 2", "/manga/x/chapter-2/")])).await;
        let second = ajax_mock(&mut server, 2, chapter_page(&[("Chapter 2", "/manga/x/chapter-2/"), ("Chapter 1", "/manga/x/chapter-1/")])).await;
        let third = ajax_mock(&mut server, 3, chapter_page(&[("Chapter 1", "/manga/x/chapter-1/")])).await;

        let mut config = html_source("ajax", &server.url());
        config.use_alternate_chapter_endpoint = true;
        config.urls.chapter_list = Some("{manga_url}ajax/chapters/".to_string());
        config.urls.chapter_list_method = HttpMethod::Post;
        config.urls.chapter_list_body = Some("manga={manga_slug}&page={page}".to_string());
        let sources = registry(config);

        let detail = sources.get("ajax").unwrap().fetch_detail("/manga/x/").await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        third.assert_async().await;
        let urls: Vec<_> = detail.chapters.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["/manga/x/chapter-3/", "/manga/x/chapter-2/", "/manga/x/chapter-1/"]);
    }

    async fn ajax_mock(server: &mut mockito::ServerGuard, page: u32, body: String) -> mockito::Mock {
        server
            .mock("POST", "/manga/x/ajax/chapters/")
            .match_header("x-requested-with", "XMLHttpRequest")
            .match_body(Matcher::Regex(format!("manga=x&page={page}$")))
            .with_body(body)
            .expect(1)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_detail_without_title_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/manga/empty/")
            .with_body("<html><body><p>Nothing here</p></body></html>")
            .create_async()
            .await;

        let sources = registry(html_source("untitled", &server.url()));
        let result = sources.get("untitled").unwrap().fetch_detail("/manga/empty/").await;
        assert!(matches!(result, Err(Error::RequiredFieldMissing { .. })));
    }

    #[tokio::test]
    async fn test_detail_on_another_host_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", Matcher::Any).expect(0).create_async().await;

        let sources = registry(html_source("local", &server.url()));
        let result = sources
            .get("local")
            .unwrap()
            .fetch_detail("https://elsewhere.example.org/manga/one-piece/")
            .await;

        mock.assert_async().await;
        match result {
            Err(e @ Error::Fetch { .. }) => assert!(!e.is_retriable()),
            other => panic!("expected a fetch error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_manga_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/manga/gone/")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let mut config = html_source("gone", &server.url());
        config.max_retries = 3;
        let sources = registry(config);

        let result = sources.get("gone").unwrap().fetch_detail("/manga/gone/").await;
        mock.assert_async().await;
        match result {
            Err(e) => {
                assert_eq!(e.status(), Some(404));
                assert!(!e.is_retriable());
            }
            Ok(detail) => panic!("expected an error, got {detail:?}"),
        }
    }
}
