//! Quire CLI - Blog Search and Post Retrieval MCP Server
//!
//! A command-line interface for the Quire MCP server.

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use quire::{
    BIN_NAME, BlogConfig, QuireResult, VERSION,
    server::{QuireServer, TransportType},
    tools::{FetchClient, PostContentTool, PostSearch, SerpApiClient, feed},
    types::QuireError,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

/// Handle used to swap the log filter once configuration is resolved
type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Quire - Blog Search and Post Retrieval MCP Server
#[derive(Parser, Debug)]
#[command(
    name = "quire",
    version = VERSION,
    about = "An MCP server for searching a blog and reading its posts",
    long_about = "Quire is a Model Context Protocol (MCP) server that searches a blog through SerpApi \
                  and retrieves post content through the blog's llms.txt feed.\n\n\
                  It can be used as:\n\
                  - An MCP server (STDIO or SSE transport)\n\
                  - A CLI tool for direct searches and post lookups"
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable all logging output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Directory containing quire.toml / quire.example.toml
    #[arg(long, global = true, env = "QUIRE_CONFIG_DIR", default_value = ".")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the MCP server
    Serve {
        /// Transport type to use
        #[arg(short, long, default_value = "stdio")]
        transport: TransportOption,

        /// Port for SSE transport (only used with --transport sse)
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to for SSE transport
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },

    /// Search the blog's posts
    Search {
        /// Search query
        query: String,
    },

    /// Print the full content of a post
    Post {
        /// Post title, or a distinctive part of it
        title: String,
    },

    /// List the posts published in the blog's feed
    Posts,

    /// Show the resolved configuration
    Info,

    /// Validate configuration and connectivity
    Check,
}

/// Transport options for the serve command
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum TransportOption {
    /// Standard input/output (for MCP clients)
    #[default]
    Stdio,
    /// Server-Sent Events over HTTP
    Sse,
}

/// Set up logging
///
/// # Arguments
/// * `directive` - Filter directive (`info`, `warn`, ...), ignored when `RUST_LOG` is set
/// * `use_stderr` - Write logs to stderr instead of stdout (required for stdio transport)
fn setup_logging(directive: &str, use_stderr: bool) -> FilterHandle {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    let (filter, handle) = reload::Layer::new(filter);

    let layer = fmt::layer().with_target(false).with_thread_ids(false);

    // Logs must never reach stdout while it carries the JSON-RPC stream
    if use_stderr {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.with_writer(std::io::stderr).with_ansi(false))
            .init();
    } else {
        tracing_subscriber::registry().with(filter).with(layer).init();
    }

    handle
}

fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow(), message.yellow());
}

fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

fn print_info(label: &str, value: &str) {
    println!("  {} {}", format!("{}:", label).bright_blue(), value);
}

fn print_section(title: &str) {
    println!("\n{}", title.yellow().bold());
    println!("{}", "─".repeat(40).bright_black());
}

fn post_tool(config: &BlogConfig) -> QuireResult<PostContentTool> {
    Ok(PostContentTool::new(
        FetchClient::new()?,
        &config.base_url,
        config.scan_policy,
    ))
}

fn search_tool(config: &BlogConfig) -> QuireResult<PostSearch> {
    let provider = Arc::new(SerpApiClient::new(&config.search_endpoint)?);
    Ok(PostSearch::new(provider, &config.base_url, &config.serpapi_key))
}

fn parse_host(host: &str) -> QuireResult<[u8; 4]> {
    let parts: Vec<u8> = host.split('.').filter_map(|s| s.parse().ok()).collect();
    <[u8; 4]>::try_from(parts)
        .map_err(|_| QuireError::InvalidArguments(format!("Invalid host format: {}", host)))
}

async fn run_serve(
    config: &BlogConfig,
    transport: TransportOption,
    port: u16,
    host: String,
) -> QuireResult<()> {
    let server = QuireServer::new(config)?;

    let transport_type = match transport {
        TransportOption::Stdio => TransportType::Stdio,
        TransportOption::Sse => TransportType::Sse {
            port,
            host: parse_host(&host)?,
        },
    };

    server.run(transport_type).await
}

async fn run_search(config: &BlogConfig, query: String) -> QuireResult<()> {
    let text = search_tool(config)?.search_posts(&query).await;
    println!("{}", text);
    Ok(())
}

async fn run_post(config: &BlogConfig, title: String) -> QuireResult<()> {
    let text = post_tool(config)?.get_post_content(&title).await;
    println!("{}", text);
    Ok(())
}

async fn run_posts(config: &BlogConfig, no_color: bool) -> QuireResult<()> {
    let tool = post_tool(config)?;
    let feed_text = tool.fetch_feed().await?;
    let entries = feed::parse_entries(&feed_text);

    if no_color {
        println!("\nPosts in {}", tool.feed_url());
        println!("{}", "=".repeat(50));
        for entry in &entries {
            println!("- {} ({})", entry.title, entry.link);
        }
        println!("\n{} post(s)", entries.len());
    } else {
        print_section(&format!("Posts in {}", tool.feed_url().cyan()));
        for entry in &entries {
            println!(
                "  {} {} {}",
                "→".bright_black(),
                entry.title.white().bold(),
                format!("({})", entry.link).bright_blue()
            );
        }
        println!("\n{} post(s)", entries.len().to_string().green());
    }

    Ok(())
}

fn run_info(config: &BlogConfig, no_color: bool) {
    if no_color {
        println!("\nQuire Server Information");
        println!("{}", "=".repeat(50));
        println!("  Name: {}", config.server_name);
        println!("  Version: {}", VERSION);
        println!("  Blog: {}", config.base_url);
        println!("  Feed: {}", feed::feed_url(&config.base_url));
        println!("  Scan policy: {}", config.scan_policy);
        println!("  Log level: {}", config.log_level);
        println!("  SerpApi key: {}", config.masked_api_key());
        println!();
        println!("Available Tools:");
        println!("  - get_post_content: Fetch a post's markdown by title");
        println!("  - search_posts: Search the blog's posts");
    } else {
        print_section("Server Information");
        print_info("Name", &config.server_name);
        print_info("Version", VERSION);
        print_info("Blog", &config.base_url);
        print_info("Feed", &feed::feed_url(&config.base_url));
        print_info("Scan policy", config.scan_policy.as_str());
        print_info("Log level", &config.log_level);
        print_info("SerpApi key", &config.masked_api_key());

        print_section("Available Tools");
        println!(
            "  {} {}",
            "get_post_content".green(),
            "- Fetch a post's markdown by title".bright_black()
        );
        println!(
            "  {} {}",
            "search_posts".green(),
            "- Search the blog's posts".bright_black()
        );
    }
}

async fn run_check(config: &BlogConfig, no_color: bool) -> QuireResult<()> {
    if no_color {
        println!("\nChecking {} configuration...", BIN_NAME);
    } else {
        print_section("Configuration Check");
    }

    let mut all_ok = true;

    let mut report = |ok: bool, message: String| {
        match (ok, no_color) {
            (true, true) => println!("  [OK] {}", message),
            (true, false) => print_success(&message),
            (false, true) => println!("  [FAIL] {}", message),
            (false, false) => print_error(&message),
        }
        all_ok &= ok;
    };

    let posts = post_tool(config);
    report(
        posts.is_ok(),
        match &posts {
            Ok(_) => "Fetch client initialized".to_string(),
            Err(e) => format!("Fetch client: {}", e),
        },
    );

    let search = search_tool(config);
    report(
        search.is_ok(),
        match &search {
            Ok(_) => "Search client initialized".to_string(),
            Err(e) => format!("Search client: {}", e),
        },
    );

    if let Ok(tool) = &posts {
        match tool.fetch_feed().await {
            Ok(text) => report(
                true,
                format!(
                    "Feed reachable at {} ({} posts)",
                    tool.feed_url(),
                    feed::parse_entries(&text).len()
                ),
            ),
            Err(e) => report(false, format!("Feed at {}: {}", tool.feed_url(), e)),
        }
    }

    if !config.has_real_api_key() {
        if no_color {
            println!("  [WARN] No SerpApi key configured, search_posts will find nothing");
        } else {
            print_warning("No SerpApi key configured, search_posts will find nothing");
        }
    }

    println!();

    if all_ok {
        if no_color {
            println!("All checks passed!");
        } else {
            println!("{}", "✓ All checks passed!".green().bold());
        }
        Ok(())
    } else {
        Err(QuireError::ServerError(
            "Some checks failed. See above for details.".to_string(),
        ))
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Until the config is read only warnings are shown, unless a level was
    // requested on the command line or through RUST_LOG.
    let level_pinned = cli.quiet || cli.verbose || std::env::var_os("RUST_LOG").is_some();
    let directive = if cli.quiet {
        "off"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };

    // Direct commands only log when asked to, and always to stderr
    let logging = match &cli.command {
        Commands::Serve { transport, .. } => Some(setup_logging(
            directive,
            matches!(transport, TransportOption::Stdio),
        )),
        _ if cli.verbose && !cli.quiet => Some(setup_logging(directive, true)),
        _ => None,
    };

    let config = match BlogConfig::load(&cli.config_dir) {
        Ok(config) => config,
        Err(e) => {
            print_error(&e.to_string());
            std::process::exit(1);
        },
    };

    if let Some(handle) = &logging
        && !level_pinned
        && let Err(e) = handle.reload(EnvFilter::new(config.log_filter_directive()))
    {
        warn!(error = %e, "Could not apply configured log level");
    }

    info!(
        blog = %config.base_url,
        scan_policy = %config.scan_policy,
        api_key = config.has_real_api_key(),
        "Configuration resolved"
    );

    let result = match cli.command {
        Commands::Serve {
            transport,
            port,
            host,
        } => run_serve(&config, transport, port, host).await,

        Commands::Search { query } => run_search(&config, query).await,

        Commands::Post { title } => run_post(&config, title).await,

        Commands::Posts => run_posts(&config, cli.no_color).await,

        Commands::Info => {
            run_info(&config, cli.no_color);
            Ok(())
        },

        Commands::Check => run_check(&config, cli.no_color).await,
    };

    if let Err(e) = result {
        if cli.no_color {
            eprintln!("Error: {}", e);
        } else {
            print_error(&e.to_string());
        }
        std::process::exit(1);
    }
}
