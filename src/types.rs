//! Common types and data structures used throughout Quire.
//!
//! This module contains the shared types including:
//! - Tool arguments and their JSON schemas
//! - The typed search provider response
//! - Error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for Quire operations
pub type QuireResult<T> = Result<T, QuireError>;

/// Errors that can occur during Quire operations
#[derive(Error, Debug)]
pub enum QuireError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParseError(#[from] url::ParseError),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Search operation failed
    #[error("Search failed: {0}")]
    SearchError(String),

    /// Remote document fetch failed
    #[error("Failed to fetch document: {0}")]
    FetchError(String),

    /// Invalid arguments provided
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Server error
    #[error("Server error: {0}")]
    ServerError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Timeout occurred
    #[error("Operation timed out")]
    Timeout,
}

impl QuireError {
    /// Whether this error came from talking to a remote host, as opposed to
    /// a local processing failure.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            QuireError::HttpError(_) | QuireError::FetchError(_) | QuireError::Timeout
        )
    }
}

/// Arguments for the `get_post_content` tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPostContentArgs {
    /// Title (or part of the title) of the post
    pub title: String,
}

/// Arguments for the `search_posts` tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPostsArgs {
    /// Free-text search query
    pub query: String,
}

/// Metadata block of a SerpApi response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerpApiMetadata {
    /// Processing status reported by the provider ("Success", "Error", ...)
    #[serde(default)]
    pub status: Option<String>,
}

/// A single organic search result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganicResult {
    /// Result title
    #[serde(default)]
    pub title: Option<String>,

    /// Result URL
    #[serde(default)]
    pub link: Option<String>,

    /// Result snippet
    #[serde(default)]
    pub snippet: Option<String>,
}

/// Response returned by the search provider.
///
/// Every field is optional: the provider omits `organic_results` when
/// nothing matched and may report failures only through `error`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerpApiResponse {
    /// Search metadata
    #[serde(default)]
    pub search_metadata: Option<SerpApiMetadata>,

    /// Organic results in ranking order
    #[serde(default)]
    pub organic_results: Option<Vec<OrganicResult>>,

    /// Provider error message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SerpApiResponse {
    /// Status string reported by the provider
    pub fn status(&self) -> Option<&str> {
        self.search_metadata.as_ref()?.status.as_deref()
    }

    /// Whether the provider reported a successful search
    pub fn is_success(&self) -> bool {
        self.status() == Some("Success")
    }

    /// Organic results, empty when absent
    pub fn results(&self) -> &[OrganicResult] {
        self.organic_results.as_deref().unwrap_or_default()
    }
}

/// JSON Schema for `get_post_content` arguments
pub fn get_post_content_args_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "title": {
                "type": "string",
                "description": "The title of the blog post, or a distinctive part of it (e.g. \"Creating a Travel Diary With Django\")"
            }
        },
        "required": ["title"]
    })
}

/// JSON Schema for `search_posts` arguments
pub fn search_posts_args_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Words to search for in the blog's posts"
            }
        },
        "required": ["query"]
    })
}
