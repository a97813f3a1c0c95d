//! Receiver configuration.
//!
//! User config lives at `~/.linkback/linkback.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{LinkbackError, Result};
use crate::types::Locale;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "linkback.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".linkback";

/// Placeholder replaced by the content id in route patterns.
pub const ID_PLACEHOLDER: &str = "{id}";

// ---------------------------------------------------------------------------
// Config structs (matching linkback.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Local site routing.
    #[serde(default)]
    pub site: SiteConfig,

    /// Remote fetch settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Excerpt window.
    #[serde(default)]
    pub excerpt: ExcerptConfig,
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Absolute base URL of the local site; may carry a sub-path.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Canonical route for a content id, e.g. `/node/{id}`.
    #[serde(default = "default_route_pattern")]
    pub route_pattern: String,

    /// Configured languages.
    #[serde(default = "default_locales")]
    pub locales: Vec<Locale>,

    /// Path aliases keyed by content id.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            route_pattern: default_route_pattern(),
            locales: default_locales(),
            aliases: BTreeMap::new(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost".into()
}
fn default_route_pattern() -> String {
    "/node/{id}".into()
}
fn default_locales() -> Vec<Locale> {
    vec![Locale::new("en", "")]
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Whole-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// `Accept` header sent to the source.
    #[serde(default = "default_accept")]
    pub accept: String,

    /// Maximum redirects to follow.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Largest body accepted, in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: u64,

    /// Allow fetching loopback/private addresses (local testing only).
    #[serde(default)]
    pub allow_private_hosts: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            accept: default_accept(),
            max_redirects: default_max_redirects(),
            max_response_bytes: default_max_response_bytes(),
            allow_private_hosts: false,
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}
fn default_accept() -> String {
    "text/plain".into()
}
fn default_max_redirects() -> usize {
    5
}
fn default_max_response_bytes() -> u64 {
    5 * 1024 * 1024
}

/// `[excerpt]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcerptConfig {
    /// Characters kept on each side of the link text.
    #[serde(default = "default_radius")]
    pub radius: usize,

    /// Hard cap on excerpt length in characters.
    #[serde(default = "default_max_len")]
    pub max_len: usize,
}

impl Default for ExcerptConfig {
    fn default() -> Self {
        Self {
            radius: default_radius(),
            max_len: default_max_len(),
        }
    }
}

fn default_radius() -> usize {
    60
}
fn default_max_len() -> usize {
    256
}

impl AppConfig {
    /// Check values that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let base = Url::parse(&self.site.base_url).map_err(|e| {
            LinkbackError::config(format!("site.base_url {:?}: {e}", self.site.base_url))
        })?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(LinkbackError::config(format!(
                "site.base_url must be http(s), got {}",
                base.scheme()
            )));
        }
        if !self.site.route_pattern.starts_with('/')
            || !self.site.route_pattern.contains(ID_PLACEHOLDER)
        {
            return Err(LinkbackError::config(format!(
                "site.route_pattern must start with '/' and contain {ID_PLACEHOLDER}"
            )));
        }
        if self.site.locales.is_empty() {
            return Err(LinkbackError::config("at least one locale is required"));
        }
        if self.excerpt.max_len == 0 {
            return Err(LinkbackError::config("excerpt.max_len must be positive"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Runtime options (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime fetch options.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub accept: String,
    pub max_redirects: usize,
    pub max_response_bytes: u64,
    pub allow_private_hosts: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for FetchOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.fetch.timeout_secs),
            accept: config.fetch.accept.clone(),
            max_redirects: config.fetch.max_redirects,
            max_response_bytes: config.fetch.max_response_bytes,
            allow_private_hosts: config.fetch.allow_private_hosts,
        }
    }
}

/// Runtime excerpt window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExcerptOptions {
    pub radius: usize,
    pub max_len: usize,
}

impl Default for ExcerptOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ExcerptOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            radius: config.excerpt.radius,
            max_len: config.excerpt.max_len,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.linkback/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LinkbackError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.linkback/linkback.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load and validate the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LinkbackError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        LinkbackError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LinkbackError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LinkbackError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LinkbackError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("base_url"));
        assert!(toml_str.contains("/node/{id}"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_with_locales_and_aliases() {
        let toml_str = r#"
[site]
base_url = "https://mysite.test"

[[site.locales]]
code = "en"

[[site.locales]]
code = "fr"
prefix = "fr"

[site.aliases]
"42" = "/blog/my-post"

[excerpt]
radius = 30
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.site.locales.len(), 2);
        assert_eq!(config.site.locales[0].prefix, "");
        assert_eq!(config.site.aliases["42"], "/blog/my-post");
        assert_eq!(config.site.route_pattern, "/node/{id}");
        assert_eq!(config.excerpt.radius, 30);
        assert_eq!(config.excerpt.max_len, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.site.base_url = "ftp://mysite.test".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.site.route_pattern = "/node/".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.site.locales.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("locale"));
    }

    #[test]
    fn runtime_options_from_app_config() {
        let app = AppConfig::default();
        let fetch = FetchOptions::from(&app);
        assert_eq!(fetch.timeout, Duration::from_secs(10));
        assert_eq!(fetch.accept, "text/plain");
        assert_eq!(fetch.max_redirects, 5);
        assert!(!fetch.allow_private_hosts);

        let excerpt = ExcerptOptions::from(&app);
        assert_eq!(excerpt, ExcerptOptions { radius: 60, max_len: 256 });
    }

    #[test]
    fn load_config_from_file() {
        let dir = std::env::temp_dir().join(format!("lb-config-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[fetch]\ntimeout_secs = 3\naccept = \"text/html\"\n").unwrap();

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.fetch.timeout_secs, 3);
        assert_eq!(config.fetch.accept, "text/html");

        std::fs::write(&path, "[site]\nbase_url = \"not a url\"\n").unwrap();
        assert!(load_config_from(&path).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
