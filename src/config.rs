//! Configuration loading for Quire.
//!
//! A [`BlogConfig`] is resolved once at startup and then shared read-only.
//! Each value is taken from the first source that provides it:
//!
//! 1. the environment (`BLOG_BASE_URL`, `SERVER_NAME`, `LOG_LEVEL`,
//!    `SERPAPI_KEY`, `SCAN_POLICY`, `SERPAPI_ENDPOINT`)
//! 2. `quire.toml` in the config directory
//! 3. `quire.example.toml` in the config directory
//! 4. built-in defaults
//!
//! Both files use an `[mcp_server]` table. When `ENV=production` the files
//! are ignored and the default log level drops to `WARNING`.

use crate::tools::feed::ScanPolicy;
use crate::types::{QuireError, QuireResult};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// Local configuration file name
pub const CONFIG_FILE: &str = "quire.toml";

/// Fallback configuration file name, usually committed alongside the binary
pub const EXAMPLE_CONFIG_FILE: &str = "quire.example.toml";

/// Default blog base URL
pub const DEFAULT_BASE_URL: &str = "https://yourblog.com";

/// Default server display name
pub const DEFAULT_SERVER_NAME: &str = "Blog Search Server";

/// Placeholder API key shipped in the example configuration
pub const PLACEHOLDER_API_KEY: &str = "your-serpapi-key";

/// Default SerpApi endpoint
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://serpapi.com/search.json";

/// Deployment environment, selected with the `ENV` variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeEnv {
    /// Development: config files are consulted
    #[default]
    Dev,
    /// Production: environment and defaults only
    Production,
}

impl RuntimeEnv {
    fn from_value(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("production") | Some("prod") => RuntimeEnv::Production,
            _ => RuntimeEnv::Dev,
        }
    }

    fn default_log_level(&self) -> &'static str {
        match self {
            RuntimeEnv::Dev => "INFO",
            RuntimeEnv::Production => "WARNING",
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    mcp_server: FileSection,
}

#[derive(Debug, Deserialize, Default)]
struct FileSection {
    blog_base_url: Option<String>,
    server_name: Option<String>,
    log_level: Option<String>,
    serpapi_key: Option<String>,
    scan_policy: Option<String>,
    search_endpoint: Option<String>,
}

/// Resolved configuration for the server and its tools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlogConfig {
    /// Base URL of the blog, e.g. `https://jtemporal.com`
    pub base_url: String,

    /// Display name reported to MCP clients
    pub server_name: String,

    /// Log level name (`DEBUG`, `INFO`, `WARNING`, ...)
    pub log_level: String,

    /// SerpApi credential
    pub serpapi_key: String,

    /// How feed lines are matched against a requested title
    pub scan_policy: ScanPolicy,

    /// SerpApi endpoint
    pub search_endpoint: String,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            server_name: DEFAULT_SERVER_NAME.to_string(),
            log_level: RuntimeEnv::Dev.default_log_level().to_string(),
            serpapi_key: PLACEHOLDER_API_KEY.to_string(),
            scan_policy: ScanPolicy::default(),
            search_endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
        }
    }
}

impl BlogConfig {
    /// Load configuration from the process environment and `config_dir`
    pub fn load(config_dir: &Path) -> QuireResult<Self> {
        Self::load_with(config_dir, |key| std::env::var(key).ok())
    }

    /// Load configuration using `env` to look up environment variables.
    ///
    /// Empty values are treated as unset.
    pub fn load_with<F>(config_dir: &Path, env: F) -> QuireResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let runtime = RuntimeEnv::from_value(env("ENV").as_deref());
        info!(environment = ?runtime, "Loading configuration");

        let (local, example) = match runtime {
            RuntimeEnv::Dev => (
                read_section(&config_dir.join(CONFIG_FILE)),
                read_section(&config_dir.join(EXAMPLE_CONFIG_FILE)),
            ),
            RuntimeEnv::Production => (None, None),
        };

        if local.is_none() && example.is_none() && runtime == RuntimeEnv::Dev {
            warn!(dir = %config_dir.display(), "No config file found, using environment and defaults");
        }

        let local = local.unwrap_or_default();
        let example = example.unwrap_or_default();

        macro_rules! resolve {
            ($var:literal, $field:ident, $default:expr) => {
                env($var)
                    .or_else(|| local.$field.clone())
                    .or_else(|| example.$field.clone())
                    .unwrap_or_else(|| $default.to_string())
            };
        }

        let scan_policy = resolve!("SCAN_POLICY", scan_policy, ScanPolicy::default().as_str());
        let scan_policy = scan_policy
            .parse::<ScanPolicy>()
            .map_err(|e| QuireError::ConfigError(e.to_string()))?;

        let config = Self {
            base_url: resolve!("BLOG_BASE_URL", blog_base_url, DEFAULT_BASE_URL),
            server_name: resolve!("SERVER_NAME", server_name, DEFAULT_SERVER_NAME),
            log_level: resolve!("LOG_LEVEL", log_level, runtime.default_log_level()),
            serpapi_key: resolve!("SERPAPI_KEY", serpapi_key, PLACEHOLDER_API_KEY),
            scan_policy,
            search_endpoint: resolve!("SERPAPI_ENDPOINT", search_endpoint, DEFAULT_SEARCH_ENDPOINT),
        };

        if config.has_real_api_key() {
            info!("SerpApi key loaded for authenticated requests");
        } else {
            warn!("No SerpApi key configured, search_posts will not return results");
        }

        Ok(config)
    }

    /// Whether a SerpApi key other than the placeholder is configured
    pub fn has_real_api_key(&self) -> bool {
        !self.serpapi_key.is_empty() && self.serpapi_key != PLACEHOLDER_API_KEY
    }

    /// The API key with everything but its last four characters hidden
    pub fn masked_api_key(&self) -> String {
        if !self.has_real_api_key() {
            return "not configured".to_string();
        }
        let chars: Vec<char> = self.serpapi_key.chars().collect();
        let hidden = chars.len().saturating_sub(4);
        let tail: String = chars[hidden..].iter().collect();
        format!("{}{}", "*".repeat(hidden.min(8)), tail)
    }

    /// `tracing` filter directive for the configured log level
    pub fn log_filter_directive(&self) -> &'static str {
        match self.log_level.trim().to_uppercase().as_str() {
            "TRACE" => "trace",
            "DEBUG" => "debug",
            "WARN" | "WARNING" => "warn",
            "ERROR" | "CRITICAL" | "FATAL" => "error",
            "OFF" | "NONE" => "off",
            _ => "info",
        }
    }
}

fn read_section(path: &Path) -> Option<FileSection> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file not found");
        return None;
    }

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read config file");
            return None;
        },
    };

    match toml::from_str::<ConfigFile>(&contents) {
        Ok(file) => {
            info!(path = %path.display(), "Loaded configuration file");
            Some(file.mcp_server)
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not parse config file");
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn write(dir: &TempDir, name: &str, contents: &str) {
        std::fs::write(dir.path().join(name), contents).unwrap();
    }

    #[test]
    fn test_defaults_without_files_or_env() {
        let dir = TempDir::new().unwrap();
        let config = BlogConfig::load_with(dir.path(), env_from(&[])).unwrap();

        assert_eq!(config, BlogConfig::default());
        assert_eq!(config.base_url, "https://yourblog.com");
        assert_eq!(config.server_name, "Blog Search Server");
        assert_eq!(config.log_level, "INFO");
        assert_eq!(config.serpapi_key, "your-serpapi-key");
        assert!(!config.has_real_api_key());
    }

    #[test]
    fn test_environment_values() {
        let dir = TempDir::new().unwrap();
        let env = env_from(&[
            ("BLOG_BASE_URL", "https://test-blog.com"),
            ("SERVER_NAME", "Test Server"),
            ("SERPAPI_KEY", "test-api-key-123"),
        ]);
        let config = BlogConfig::load_with(dir.path(), env).unwrap();

        assert_eq!(config.base_url, "https://test-blog.com");
        assert_eq!(config.server_name, "Test Server");
        assert_eq!(config.serpapi_key, "test-api-key-123");
        assert!(config.has_real_api_key());
    }

    #[test]
    fn test_local_file_values() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            CONFIG_FILE,
            r#"
[mcp_server]
blog_base_url = "https://file-blog.com"
server_name = "File Server"
serpapi_key = "file-api-key"
"#,
        );
        let config = BlogConfig::load_with(dir.path(), env_from(&[])).unwrap();

        assert_eq!(config.base_url, "https://file-blog.com");
        assert_eq!(config.server_name, "File Server");
        assert_eq!(config.serpapi_key, "file-api-key");
        assert_eq!(config.log_level, "INFO");
    }

    #[test]
    fn test_example_file_fallback() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            EXAMPLE_CONFIG_FILE,
            r#"
[mcp_server]
blog_base_url = "https://example.com"
server_name = "Example Server"
serpapi_key = "example-api-key"
"#,
        );
        let config = BlogConfig::load_with(dir.path(), env_from(&[])).unwrap();

        assert_eq!(config.base_url, "https://example.com");
        assert_eq!(config.server_name, "Example Server");
        assert_eq!(config.serpapi_key, "example-api-key");
    }

    #[test]
    fn test_precedence_env_over_local_over_example() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            CONFIG_FILE,
            r#"
[mcp_server]
blog_base_url = "https://local.com"
server_name = "Local Server"
"#,
        );
        write(
            &dir,
            EXAMPLE_CONFIG_FILE,
            r#"
[mcp_server]
blog_base_url = "https://example.com"
server_name = "Example Server"
log_level = "DEBUG"
"#,
        );
        let env = env_from(&[("SERPAPI_KEY", "env-serpapi-key"), ("SERVER_NAME", "Env Server")]);
        let config = BlogConfig::load_with(dir.path(), env).unwrap();

        assert_eq!(config.serpapi_key, "env-serpapi-key");
        assert_eq!(config.server_name, "Env Server");
        assert_eq!(config.base_url, "https://local.com");
        assert_eq!(config.log_level, "DEBUG");
    }

    #[test]
    fn test_empty_env_value_is_unset() {
        let dir = TempDir::new().unwrap();
        let config =
            BlogConfig::load_with(dir.path(), env_from(&[("BLOG_BASE_URL", "  ")])).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_production_ignores_files() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            CONFIG_FILE,
            "[mcp_server]\nblog_base_url = \"https://file-blog.com\"\n",
        );
        let config =
            BlogConfig::load_with(dir.path(), env_from(&[("ENV", "production")])).unwrap();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.log_level, "WARNING");
        assert_eq!(config.log_filter_directive(), "warn");
    }

    #[test]
    fn test_unparseable_file_falls_through() {
        let dir = TempDir::new().unwrap();
        write(&dir, CONFIG_FILE, "this is = = not toml [");
        write(
            &dir,
            EXAMPLE_CONFIG_FILE,
            "[mcp_server]\nserver_name = \"Example Server\"\n",
        );
        let config = BlogConfig::load_with(dir.path(), env_from(&[])).unwrap();

        assert_eq!(config.server_name, "Example Server");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_file_without_section_uses_defaults() {
        let dir = TempDir::new().unwrap();
        write(&dir, CONFIG_FILE, "[other]\nkey = 1\n");
        let config = BlogConfig::load_with(dir.path(), env_from(&[])).unwrap();
        assert_eq!(config, BlogConfig::default());
    }

    #[test]
    fn test_scan_policy_resolution() {
        let dir = TempDir::new().unwrap();
        write(&dir, CONFIG_FILE, "[mcp_server]\nscan_policy = \"unscoped-last-match\"\n");
        let config = BlogConfig::load_with(dir.path(), env_from(&[])).unwrap();
        assert_eq!(config.scan_policy, ScanPolicy::UnscopedLastMatch);

        let config =
            BlogConfig::load_with(dir.path(), env_from(&[("SCAN_POLICY", "scoped")])).unwrap();
        assert_eq!(config.scan_policy, ScanPolicy::Scoped);
    }

    #[test]
    fn test_invalid_scan_policy_is_config_error() {
        let dir = TempDir::new().unwrap();
        let result = BlogConfig::load_with(dir.path(), env_from(&[("SCAN_POLICY", "fuzzy")]));
        assert!(matches!(result, Err(QuireError::ConfigError(_))));
    }

    #[test]
    fn test_log_filter_directive() {
        let mut config = BlogConfig::default();
        for (level, directive) in [
            ("DEBUG", "debug"),
            ("info", "info"),
            ("WARNING", "warn"),
            ("CRITICAL", "error"),
            ("nonsense", "info"),
        ] {
            config.log_level = level.to_string();
            assert_eq!(config.log_filter_directive(), directive);
        }
    }

    #[test]
    fn test_masked_api_key() {
        let mut config = BlogConfig::default();
        assert_eq!(config.masked_api_key(), "not configured");

        config.serpapi_key = "abcdef123456".to_string();
        assert_eq!(config.masked_api_key(), "********3456");
    }
}
