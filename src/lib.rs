//! # Quire - Blog Search and Post Retrieval MCP Server
//!
//! Quire is a Model Context Protocol (MCP) server that lets an agent search a
//! blog and read its posts. It is designed to be used as both a library for
//! programmatic access and as a standalone CLI binary.
//!
//! ## Features
//!
//! - **Post Search**: site-restricted search of the blog through SerpApi
//! - **Post Retrieval**: resolve a post title through the blog's `llms.txt`
//!   feed and return the post's raw markdown
//! - **Layered Configuration**: environment, local file, example file, defaults
//! - **Dual Transport**: Support for both STDIO and HTTP (SSE) transports
//!
//! ## Quick Start
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use quire::{BlogConfig, QuireServer, TransportType};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BlogConfig::load(std::path::Path::new("."))?;
//!     let server = QuireServer::new(&config)?;
//!     server.run(TransportType::Stdio).await?;
//!     Ok(())
//! }
//! ```
//!
//! ### Direct Tool Usage
//!
//! ```rust,no_run
//! use quire::tools::{FetchClient, PostContentTool, ScanPolicy};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let tool = PostContentTool::new(
//!         FetchClient::new()?,
//!         "https://jtemporal.com",
//!         ScanPolicy::Scoped,
//!     );
//!     println!("{}", tool.get_post_content("Python Tips").await);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`server`]: MCP server implementation with transport handling
//! - [`tools`]: Tool implementations (feed lookup, fetching, search)
//! - [`config`]: Configuration resolution
//! - [`types`]: Common types, schemas and errors

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod server;
pub mod tools;
pub mod types;

// Re-export commonly used items at crate root
pub use config::BlogConfig;
pub use server::{QuireHandler, QuireServer, TransportType};
pub use types::{
    GetPostContentArgs, OrganicResult, QuireError, QuireResult, SearchPostsArgs, SerpApiResponse,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Binary name
pub const BIN_NAME: &str = "quire";

/// Server description
pub const SERVER_DESCRIPTION: &str = "Blog search and post retrieval MCP server";
