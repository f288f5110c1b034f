//! `llms.txt` feed parsing.
//!
//! A blog's feed lists its posts as markdown links, one per line:
//!
//! ```text
//! # LLM Feed for example.com
//!
//! ## All posts
//! - [Python Tips and Tricks](https://raw.githubusercontent.com/.../python-tips.md)
//! ```
//!
//! [`locate`] resolves a title fragment to the raw-content link of a post.
//! Which line wins when several match is decided by a [`ScanPolicy`].

use crate::types::QuireError;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Section heading that precedes the post list
pub const ALL_POSTS_MARKER: &str = "## All posts";

/// Link targets must start with this scheme to be trusted
pub const TRUSTED_SCHEME: &str = "https://";

/// Path of the feed relative to the blog's base URL
pub const FEED_PATH: &str = "/llms.txt";

/// How feed lines are matched against a requested title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanPolicy {
    /// Only lines after the `## All posts` marker are eligible. The first line
    /// whose display title contains the requested title and whose link uses
    /// the trusted scheme wins.
    #[default]
    Scoped,
    /// Every non-blank, non-heading line is eligible. Every line containing
    /// the requested title overwrites the previous match, so the last one
    /// wins.
    UnscopedLastMatch,
}

impl ScanPolicy {
    /// Stable name used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanPolicy::Scoped => "scoped",
            ScanPolicy::UnscopedLastMatch => "unscoped-last-match",
        }
    }
}

impl fmt::Display for ScanPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanPolicy {
    type Err = QuireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "scoped" => Ok(ScanPolicy::Scoped),
            "unscoped-last-match" | "last-match" => Ok(ScanPolicy::UnscopedLastMatch),
            _ => Err(QuireError::InvalidArguments(format!(
                "Invalid scan policy: {}",
                s
            ))),
        }
    }
}

/// Reasons a title could not be resolved to a link
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocateError {
    /// No eligible line mentions the title
    #[error("no feed entry matches the requested title")]
    NotFound,

    /// A matching line has no `[title](link)` segment
    #[error("feed line has no link target: {0}")]
    MalformedLine(String),
}

/// A post listed in the feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostEntry {
    /// Display title
    pub title: String,
    /// Raw-content link
    pub link: String,
}

impl PostEntry {
    /// Parse a `- [Title](link)` line
    pub fn parse(line: &str) -> Option<Self> {
        let (head, _) = line.split_once("](")?;
        let open = head.find('[')?;
        let link = extract_link(line)?;
        Some(Self {
            title: head[open + 1..].to_string(),
            link: link.to_string(),
        })
    }
}

/// Extract the link target of a markdown link line.
///
/// The target is the text after the first `](` up to the closing `)`.
pub fn extract_link(line: &str) -> Option<&str> {
    let (_, rest) = line.split_once("](")?;
    let end = rest.find(')')?;
    Some(rest[..end].trim())
}

/// Build the feed URL for a blog
pub fn feed_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), FEED_PATH)
}

/// Resolve `title` to the link target of a post in `feed`
pub fn locate(feed: &str, title: &str, policy: ScanPolicy) -> Result<String, LocateError> {
    match policy {
        ScanPolicy::Scoped => locate_scoped(feed, title),
        ScanPolicy::UnscopedLastMatch => locate_last_match(feed, title),
    }
}

fn locate_scoped(feed: &str, title: &str) -> Result<String, LocateError> {
    feed.lines()
        .skip_while(|line| line.trim() != ALL_POSTS_MARKER)
        .skip(1)
        .filter_map(PostEntry::parse)
        .find(|entry| entry.title.contains(title) && entry.link.starts_with(TRUSTED_SCHEME))
        .map(|entry| entry.link)
        .ok_or(LocateError::NotFound)
}

fn locate_last_match(feed: &str, title: &str) -> Result<String, LocateError> {
    let mut found = None;

    for line in feed.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || !line.contains(title) {
            continue;
        }

        let link = extract_link(line)
            .filter(|link| !link.is_empty())
            .ok_or_else(|| LocateError::MalformedLine(trimmed.to_string()))?;
        found = Some(link.to_string());
    }

    found.ok_or(LocateError::NotFound)
}

/// List every well-formed entry in the feed, in document order
pub fn parse_entries(feed: &str) -> Vec<PostEntry> {
    feed.lines().filter_map(PostEntry::parse).collect()
}
