//! Tool implementations for Quire.
//!
//! This module contains the actual implementations of the tools
//! exposed by the MCP server, plus the feed parsing they rely on.

pub mod feed;
pub mod fetch;
pub mod post;
pub mod search;

pub use feed::{LocateError, PostEntry, ScanPolicy, locate};
pub use fetch::{DocumentSource, FetchClient};
pub use post::{PostContentTool, PostLookup, validate_title};
pub use search::{PostSearch, SearchProvider, SearchRequest, SerpApiClient};
