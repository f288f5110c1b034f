//! The `get_post_content` tool.
//!
//! Resolves a title through the blog's `llms.txt` feed and returns the raw
//! markdown of the matching post. Every failure is turned into a message for
//! the caller rather than an error.

use crate::tools::feed::{self, LocateError, ScanPolicy};
use crate::tools::fetch::DocumentSource;
use crate::types::{QuireError, QuireResult};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Outcome of a post lookup, before it is rendered for the caller
#[derive(Debug)]
pub enum PostLookup {
    /// Raw post content
    Found(String),
    /// No feed entry matched the title
    NotFound,
    /// The feed or the post could not be retrieved
    Failed(QuireError),
}

impl PostLookup {
    /// Render the outcome as the tool's text result
    pub fn into_text(self, title: &str) -> String {
        match self {
            PostLookup::Found(content) => content,
            PostLookup::NotFound => not_found_message(title),
            PostLookup::Failed(e) if e.is_transport() => {
                format!("Error fetching content: {}", e)
            },
            PostLookup::Failed(e) => format!("Error processing content: {}", e),
        }
    }
}

/// Message returned when no post matches `title`
pub fn not_found_message(title: &str) -> String {
    format!("Post with title '{}' not found in llms.txt", title)
}

/// Check that `title` can select a post.
///
/// A blank title is a substring of every feed line.
pub fn validate_title(title: &str) -> QuireResult<&str> {
    if title.trim().is_empty() {
        return Err(QuireError::InvalidArguments("title must not be empty".to_string()));
    }
    Ok(title)
}

/// Post retrieval for one blog
#[derive(Clone)]
pub struct PostContentTool {
    fetcher: Arc<dyn DocumentSource>,
    base_url: String,
    policy: ScanPolicy,
}

impl PostContentTool {
    /// Create the tool for the blog at `base_url`
    pub fn new(
        fetcher: impl DocumentSource + 'static,
        base_url: impl Into<String>,
        policy: ScanPolicy,
    ) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            base_url: base_url.into(),
            policy,
        }
    }

    /// URL of the blog's feed
    pub fn feed_url(&self) -> String {
        feed::feed_url(&self.base_url)
    }

    /// Fetch the blog's feed document
    pub async fn fetch_feed(&self) -> QuireResult<String> {
        self.fetcher.fetch_text(&self.feed_url()).await
    }

    /// Look up a post by title
    #[instrument(skip(self), fields(policy = %self.policy))]
    pub async fn lookup(&self, title: &str) -> PostLookup {
        if let Err(e) = validate_title(title) {
            warn!("Rejected empty title");
            return PostLookup::Failed(e);
        }

        let feed_text = match self.fetch_feed().await {
            Ok(text) => text,
            Err(e) => return PostLookup::Failed(e),
        };

        let link = match feed::locate(&feed_text, title, self.policy) {
            Ok(link) => link,
            Err(LocateError::NotFound) => {
                info!(title = %title, "No feed entry matches title");
                return PostLookup::NotFound;
            },
            Err(e @ LocateError::MalformedLine(_)) => {
                warn!(title = %title, error = %e, "Matching feed line is malformed");
                return PostLookup::NotFound;
            },
        };

        info!(title = %title, link = %link, "Resolved post link");

        match self.fetcher.fetch_text(&link).await {
            Ok(content) => PostLookup::Found(content),
            Err(e) => PostLookup::Failed(e),
        }
    }

    /// Get the full content of a post by title, or a message explaining why
    /// it could not be retrieved
    pub async fn get_post_content(&self, title: &str) -> String {
        self.lookup(title).await.into_text(title)
    }
}
