//! HTTP adapter tests: retries, status classification and header policy.

use hondana::Error;
use hondana::config::{RateLimit, SourceConfig, UserAgentPolicy};
use hondana::net::{HttpClient, RateLimiter, Request};
use std::sync::Arc;
use std::time::Instant;
use url::Url;

#[cfg(test)]
mod net_tests {
    use super::*;

    fn client(server: &mockito::ServerGuard, configure: impl FnOnce(&mut SourceConfig)) -> HttpClient {
        let mut config = SourceConfig::new("net", "Net", server.url());
        config.rate_limit = RateLimit::new(100, 1);
        configure(&mut config);
        let base = Url::parse(&server.url()).unwrap();
        HttpClient::new(&config, &base, Arc::new(RateLimiter::new())).unwrap()
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_then_reported() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/flaky")
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let client = client(&server, |c| c.max_retries = 1);
        let result = client.send(&Request::get("/flaky")).await;

        mock.assert_async().await;
        let error = result.unwrap_err();
        assert!(error.is_retriable());
        assert_eq!(error.status(), Some(503));
    }

    #[tokio::test]
    async fn test_retry_after_replaces_backoff() {
        let mut server = mockito::Server::new_async().await;
        let throttled = server
            .mock("GET", "/busy")
            .with_status(429)
            .with_header("retry-after", "0")
            .expect(3)
            .create_async()
            .await;

        let client = client(&server, |c| c.max_retries = 2);
        let start = Instant::now();
        let result = client.send(&Request::get("/busy")).await;

        throttled.assert_async().await;
        assert_eq!(result.unwrap_err().status(), Some(429));
        // A zero Retry-After skips the 500ms and 1s backoffs.
        assert!(start.elapsed().as_millis() < 400);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let client = client(&server, |c| c.max_retries = 3);
        let result = client.send(&Request::get("/missing")).await;

        mock.assert_async().await;
        assert!(matches!(
            result,
            Err(Error::Fetch { status: Some(404), retriable: false, .. })
        ));
    }

    #[tokio::test]
    async fn test_custom_user_agent_and_default_headers() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ua")
            .match_header("user-agent", "HondanaBot/1.0")
            .match_header("accept-language", "en-US")
            .match_header("referer", format!("{}/", server.url()).as_str())
            .create_async()
            .await;

        let client = client(&server, |c| {
            c.user_agent = UserAgentPolicy::Custom("HondanaBot/1.0".to_string());
            c.headers.insert("Accept-Language".to_string(), "en-US".to_string());
        });
        client.send(&Request::get("/ua")).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_request_headers_override_defaults() {
        let mut server = mockito::Server::new_async().await;
        let referer = format!("{}/manga/x/chapter-1/", server.url());
        let mock = server
            .mock("GET", "/img/1.jpg")
            .match_header("referer", referer.as_str())
            .create_async()
            .await;

        let client = client(&server, |_| {});
        client
            .send(&Request::get("/img/1.jpg").with_header("Referer", referer.as_str()))
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_form_posts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/wp-admin/admin-ajax.php")
            .match_header("content-type", mockito::Matcher::Regex("x-www-form-urlencoded".to_string()))
            .match_body("action=manga_get_chapters&manga=42")
            .with_body("<ul></ul>")
            .create_async()
            .await;

        let client = client(&server, |_| {});
        let request = Request::post("/wp-admin/admin-ajax.php").with_form("action=manga_get_chapters&manga=42");
        let response = client.send(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, 200);
        assert_eq!(response.text(), "<ul></ul>");
    }
}
