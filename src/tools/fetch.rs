//! Raw document fetching.
//!
//! This module retrieves plain-text documents (the `llms.txt` feed and the
//! raw markdown of posts) and returns their bodies untouched.

use crate::types::{QuireError, QuireResult};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use url::Url;

/// Default user agent for requests
const USER_AGENT: &str = concat!("quire/", env!("CARGO_PKG_VERSION"));

/// Request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Something that can return the text behind a URL
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch `url` and return its body verbatim
    async fn fetch_text(&self, url: &str) -> QuireResult<String>;
}

/// HTTP client for fetching documents
#[derive(Clone)]
pub struct FetchClient {
    client: Client,
}

impl FetchClient {
    /// Create a new fetch client with the default timeout
    pub fn new() -> QuireResult<Self> {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    /// Create a new fetch client with a custom timeout
    pub fn with_timeout(timeout: Duration) -> QuireResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(QuireError::HttpError)?;

        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentSource for FetchClient {
    /// Fetch `url` and return its body verbatim.
    ///
    /// A single attempt is made. Non-2xx statuses, timeouts and connection
    /// failures are all reported as errors.
    #[instrument(skip(self))]
    async fn fetch_text(&self, url: &str) -> QuireResult<String> {
        let parsed_url = parse_fetch_url(url)?;

        info!(url = %url, "Fetching document");

        let response = self.client.get(parsed_url).send().await.map_err(|e| {
            if e.is_timeout() {
                warn!(url = %url, "Fetch timed out");
                QuireError::Timeout
            } else {
                warn!(error = %e, url = %url, "Fetch request failed");
                QuireError::HttpError(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, url = %url, "Fetch returned non-success status");
            return Err(QuireError::FetchError(format!("HTTP {} for {}", status, url)));
        }

        let body = response.text().await.map_err(|e| {
            error!(error = %e, url = %url, "Failed to read response body");
            QuireError::HttpError(e)
        })?;

        info!(url = %url, bytes = body.len(), "Document fetched");
        Ok(body)
    }
}

/// Parse `url`, accepting only `http` and `https`
fn parse_fetch_url(url: &str) -> QuireResult<Url> {
    let parsed = Url::parse(url)?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(QuireError::InvalidArguments(format!(
            "Unsupported scheme '{}' in {}",
            scheme, url
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_fetch_url() {
        let url = parse_fetch_url("https://raw.example.com/_posts/a.md").unwrap();
        assert_eq!(url.path(), "/_posts/a.md");
        assert_ok!(parse_fetch_url("http://localhost:8080/llms.txt"));

        for bad in ["file:///etc/passwd", "mailto:someone@example.com", "data:text/plain,hi"] {
            let err = parse_fetch_url(bad).unwrap_err();
            assert!(matches!(err, QuireError::InvalidArguments(_)), "{} accepted", bad);
        }
        assert!(matches!(
            parse_fetch_url("/relative/post.md").unwrap_err(),
            QuireError::UrlParseError(_)
        ));
    }

    #[tokio::test]
    async fn test_fetch_returns_body_verbatim() {
        let server = MockServer::start().await;
        let body = "---\ntitle: 'Post'\n---\n\n# Post\n\n  indented line  \n";

        Mock::given(method("GET"))
            .and(path("/post.md"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;

        let client = FetchClient::new().unwrap();
        let text = client.fetch_text(&format!("{}/post.md", server.uri())).await;

        assert_ok!(&text);
        assert_eq!(text.unwrap(), body);
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/missing.md"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = FetchClient::new().unwrap();
        let err = client
            .fetch_text(&format!("{}/missing.md", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, QuireError::FetchError(_)));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = FetchClient::with_timeout(Duration::from_millis(50)).unwrap();
        let err = client.fetch_text(&server.uri()).await.unwrap_err();

        assert!(matches!(err, QuireError::Timeout));
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_http_scheme() {
        let client = FetchClient::new().unwrap();
        let err = client.fetch_text("ftp://example.com/file").await.unwrap_err();
        assert!(matches!(err, QuireError::InvalidArguments(_)));

        let err = client.fetch_text("not a url").await.unwrap_err();
        assert!(matches!(err, QuireError::UrlParseError(_)));
    }
}
