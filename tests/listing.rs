//! Listing pipeline tests against a local HTTP server.

use hondana::Error;
use hondana::config::{DocumentFormat, FieldSpec, PaginationStrategy};
use hondana::filter::{FilterDescriptor, FilterValue, SelectOption};
use hondana::prelude::*;
use hondana::types::SearchQueryBuilder;
use mockito::Matcher;

mod common;
use common::{html_source, listing_html, registry};

#[cfg(test)]
mod listing_tests {
    use super::*;

    #[tokio::test]
    async fn test_popular_skips_items_missing_a_title() {
        let mut server = mockito::Server::new_async().await;
        let body = listing_html(
            &[
                (Some("First"), "/manga/first/"),
                (None, "/manga/untitled/"),
                (Some("Third"), "/manga/third/"),
            ],
            true,
        );
        let mock = server
            .mock("GET", "/popular/page/1/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(body)
            .create_async()
            .await;

        let sources = registry(html_source("test", &server.url()));
        let page = sources.get("test").unwrap().popular_list(Cursor::first()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].title, "First");
        assert_eq!(page.items[0].url, "/manga/first/");
        assert_eq!(page.items[0].source_id, "test");
        assert_eq!(page.items[1].title, "Third");
        assert_eq!(
            page.items[0].thumbnail_url,
            Some(format!("{}/covers/manga/first/cover.jpg", server.url()))
        );
        assert!(page.has_next_page);
        assert_eq!(page.next_cursor, Some(Cursor::Page(2)));
    }

    #[tokio::test]
    async fn test_same_body_gives_same_listing() {
        let mut server = mockito::Server::new_async().await;
        let body = listing_html(
            &[
                (Some("First"), "/manga/first/"),
                (None, "/manga/untitled/"),
                (Some("Second"), "/manga/second/"),
            ],
            true,
        );
        let mock = server
            .mock("GET", "/popular/page/1/")
            .with_body(body)
            .expect(2)
            .create_async()
            .await;

        let sources = registry(html_source("stable", &server.url()));
        let source = sources.get("stable").unwrap();
        let first = source.popular_list(Cursor::first()).await.unwrap();
        let second = source.popular_list(Cursor::first()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(first, second);
        assert_eq!(first.items.len(), 2);
    }

    #[tokio::test]
    async fn test_never_strategy_ignores_next_link() {
        let mut server = mockito::Server::new_async().await;
        let body = listing_html(&[(Some("Only"), "/manga/only/")], true);
        server
            .mock("GET", "/latest/page/3/")
            .with_body(body)
            .create_async()
            .await;

        let mut config = html_source("never", &server.url());
        config.pagination = PaginationStrategy::Never;
        let sources = registry(config);

        let page = sources.get("never").unwrap().latest_list(Cursor::Page(3)).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(!page.has_next_page);
        assert_eq!(page.next_cursor, None);
    }

    #[tokio::test]
    async fn test_search_sends_query_and_filters() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "one piece".into()),
                Matcher::UrlEncoded("page".into(), "2".into()),
                Matcher::UrlEncoded("status".into(), "end".into()),
                Matcher::UrlEncoded("author".into(), "Oda".into()),
            ]))
            .with_body(listing_html(&[(Some("One Piece"), "/manga/one-piece/")], false))
            .create_async()
            .await;

        let mut config = html_source("search", &server.url());
        config.filters = vec![
            FilterDescriptor::select(
                "Status",
                "status",
                vec![SelectOption::new("Any", ""), SelectOption::new("Completed", "end")],
            ),
            FilterDescriptor::text("Author", "author"),
        ];
        let sources = registry(config);

        let query = SearchQueryBuilder::default()
            .query("one piece")
            .cursor(Cursor::Page(2))
            .filters(vec![FilterValue::select("Status", 1), FilterValue::text("Author", "Oda")])
            .build()
            .unwrap();
        let page = sources.get("search").unwrap().search_list(query).await.unwrap();

        mock.assert_async().await;
        assert_eq!(page.items.len(), 1);
        assert!(!page.has_next_page);
    }

    #[tokio::test]
    async fn test_missing_template_is_unsupported_without_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", Matcher::Any).expect(0).create_async().await;

        let mut config = html_source("nolatest", &server.url());
        config.urls.latest = None;
        let sources = registry(config);

        let result = sources.get("nolatest").unwrap().latest_list(Cursor::first()).await;
        assert!(matches!(result, Err(Error::UnsupportedOperation { .. })));

        let result = sources
            .get("nolatest")
            .unwrap()
            .collection_list("action", Cursor::first())
            .await;
        assert!(matches!(result, Err(Error::UnsupportedOperation { .. })));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_collection_uses_its_own_pagination() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/genre/action/1")
            .with_body(listing_html(&[(Some("Fighter"), "/manga/fighter/")], false))
            .create_async()
            .await;

        let mut config = html_source("collections", &server.url());
        config.urls.collection = Some("/genre/{collection}/{page}".to_string());
        let mut action = Collection::new("Action", "action");
        action.pagination = Some("always".to_string());
        config.collections = vec![action];
        let sources = registry(config);

        let source = sources.get("collections").unwrap();
        assert_eq!(source.collections().len(), 1);

        let page = source.collection_list("action", Cursor::first()).await.unwrap();
        assert_eq!(page.items[0].title, "Fighter");
        // No next link on the page, but the collection paginates while items come back.
        assert!(page.has_next_page);
        assert_eq!(page.next_cursor, Some(Cursor::Page(2)));
    }

    #[tokio::test]
    async fn test_json_listing_with_token_cursor() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/popular")
            .match_query(Matcher::UrlEncoded("cursor".into(), "abc".into()))
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "data": {
                        "items": [
                            {"name": "Alpha", "slug": "/series/alpha", "cover": {"url": "/img/a.png"}},
                            {"slug": "/series/no-name"},
                            {"name": "Beta", "slug": "/series/beta"}
                        ]
                    },
                    "meta": {"next": "def"}
                }"#,
            )
            .create_async()
            .await;

        let mut config = html_source("json", &server.url());
        config.format = DocumentFormat::Json;
        config.pagination = PaginationStrategy::Selector;
        config.urls.popular = "/api/popular?cursor={cursor}".to_string();
        let s = &mut config.selectors;
        s.popular_item = Some("data.items".to_string());
        s.title = Some(FieldSpec::text("name"));
        s.url = Some(FieldSpec::text("slug"));
        s.thumbnail = Some(FieldSpec::text("cover.url"));
        s.next_page = Some("meta.next".to_string());
        s.next_cursor = Some(FieldSpec::text("meta.next"));
        s.chapter_item = Some("chapters".to_string());
        s.chapter_url = FieldSpec::text("url");
        s.chapter_name = FieldSpec::text("title");
        s.chapter_date = None;
        s.page_item = Some("pages".to_string());
        s.detail_title = None;
        s.author = None;
        s.genre = None;
        s.description = None;
        s.status = None;
        let sources = registry(config);

        let page = sources
            .get("json")
            .unwrap()
            .popular_list(Cursor::Token("abc".to_string()))
            .await
            .unwrap();

        let titles: Vec<_> = page.items.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Beta"]);
        assert_eq!(page.items[0].url, "/series/alpha");
        assert_eq!(page.items[0].thumbnail_url, Some(format!("{}/img/a.png", server.url())));
        assert!(page.has_next_page);
        assert_eq!(page.next_cursor, Some(Cursor::Token("def".to_string())));
    }

    #[tokio::test]
    async fn test_server_error_fails_the_listing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/popular/page/1/")
            .with_status(500)
            .create_async()
            .await;

        let sources = registry(html_source("broken", &server.url()));
        let result = sources.get("broken").unwrap().popular_list(Cursor::first()).await;

        match result {
            Err(Error::Fetch { status, retriable, .. }) => {
                assert_eq!(status, Some(500));
                assert!(retriable);
            }
            other => panic!("expected fetch error, got {other:?}"),
        }
    }
}
