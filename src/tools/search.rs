//! Site-scoped blog search.
//!
//! Queries are sent to SerpApi's Google engine restricted to the blog's
//! host with a `site:` operator, and the organic results are rendered into
//! plain text for the calling agent.

use crate::types::{OrganicResult, QuireError, QuireResult, SerpApiResponse};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Default user agent for requests
const USER_AGENT: &str = concat!("quire/", env!("CARGO_PKG_VERSION"));

/// Request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Search engine requested from SerpApi
const SEARCH_ENGINE: &str = "google";

/// Parameters sent to the search provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Full query string, including the `site:` restriction
    pub q: String,
    /// Provider credential
    pub api_key: String,
}

/// A search backend that can answer a [`SearchRequest`]
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run the search and return the provider's response
    async fn search(&self, request: &SearchRequest) -> QuireResult<SerpApiResponse>;

    /// Human readable provider name
    fn provider_name(&self) -> &str;
}

/// SerpApi client
#[derive(Clone)]
pub struct SerpApiClient {
    client: Client,
    endpoint: String,
}

impl SerpApiClient {
    /// Create a client for the given endpoint
    pub fn new(endpoint: impl Into<String>) -> QuireResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(QuireError::HttpError)?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl SearchProvider for SerpApiClient {
    #[instrument(skip(self, request), fields(q = %request.q))]
    async fn search(&self, request: &SearchRequest) -> QuireResult<SerpApiResponse> {
        let params = [
            ("engine", SEARCH_ENGINE),
            ("q", request.q.as_str()),
            ("api_key", request.api_key.as_str()),
        ];

        let response = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    QuireError::Timeout
                } else {
                    QuireError::HttpError(e)
                }
            })?;

        let status = response.status();
        let body = response.text().await?;

        // SerpApi reports bad keys and quota problems with a 4xx status and a
        // JSON body carrying `error`, so the body is decoded either way.
        match serde_json::from_str::<SerpApiResponse>(&body) {
            Ok(parsed) => {
                if !status.is_success() {
                    warn!(status = %status, error = ?parsed.error, "SerpApi returned non-success status");
                }
                Ok(parsed)
            },
            Err(_) if !status.is_success() => {
                Err(QuireError::SearchError(format!("HTTP {}", status)))
            },
            Err(e) => Err(QuireError::JsonError(e)),
        }
    }

    fn provider_name(&self) -> &str {
        "SerpApi"
    }
}

/// The `search_posts` tool
#[derive(Clone)]
pub struct PostSearch {
    provider: Arc<dyn SearchProvider>,
    scope: String,
    api_key: String,
}

impl PostSearch {
    /// Create the tool for a blog at `base_url`
    pub fn new(provider: Arc<dyn SearchProvider>, base_url: &str, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            scope: scope_token(base_url),
            api_key: api_key.into(),
        }
    }

    /// The `site:` restriction applied to every query
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Build the provider request for a user query
    pub fn build_request(&self, query: &str) -> SearchRequest {
        SearchRequest {
            q: format!("site:{} {}", self.scope, query),
            api_key: self.api_key.clone(),
        }
    }

    /// Search the blog and render the results as text.
    ///
    /// Provider failures and empty result lists produce the same
    /// "No posts found" message.
    #[instrument(skip(self))]
    pub async fn search_posts(&self, query: &str) -> String {
        let request = self.build_request(query);
        info!(provider = self.provider.provider_name(), q = %request.q, "Searching posts");

        match self.provider.search(&request).await {
            Ok(response) if response.is_success() && !response.results().is_empty() => {
                info!(result_count = response.results().len(), "Search completed");
                format_results(query, response.results())
            },
            Ok(response) => {
                info!(status = ?response.status(), "Search returned no posts");
                no_posts_found(query)
            },
            Err(e) => {
                error!(error = %e, "Search failed");
                no_posts_found(query)
            },
        }
    }
}

/// Derive the `site:` scope from a base URL by dropping its scheme.
///
/// Only the `scheme://` prefix and trailing slashes are removed; the rest of
/// the URL is kept as written. `https://jtemporal.com/` becomes
/// `jtemporal.com` and `https://example.com/blog` keeps its path.
pub fn scope_token(base_url: &str) -> String {
    let base_url = base_url.trim();

    base_url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(base_url)
        .trim_end_matches('/')
        .to_string()
}

/// Render search results as text
pub fn format_results(query: &str, results: &[OrganicResult]) -> String {
    let mut output = format!("Found {} post(s) matching '{}':\n\n", results.len(), query);

    for result in results {
        output.push_str(&format!(
            "**{}**\n{}\n{}\n\n",
            result.title.as_deref().unwrap_or_default(),
            result.link.as_deref().unwrap_or_default(),
            result.snippet.as_deref().unwrap_or_default(),
        ));
    }

    output
}

/// Message returned when nothing matched or the provider failed
pub fn no_posts_found(query: &str) -> String {
    format!("No posts found matching '{}'.", query)
}
