//! Configuration file parser for ~/.config/feedscout/config.toml.
//!
//! The config file is optional. A missing file yields `Config::default()`.
//! Unknown keys are logged as warnings.
use crate::feed::{
    default_user_agent, FetchSettings, ParseMode, DEFAULT_BATCH_SIZE, DEFAULT_MAX_BODY_BYTES,
    DEFAULT_STATIC_SITE_PLATFORMS,
};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-request deadline in seconds (connect + body).
    pub timeout_secs: u64,

    /// `User-Agent` sent with every request.
    pub user_agent: String,

    /// Maximum response body size in bytes.
    pub max_body_bytes: usize,

    /// Number of feeds fetched concurrently per aggregation group.
    pub batch_size: usize,

    /// Disable SSRF checks so localhost/private hosts can be fetched.
    pub allow_private_hosts: bool,

    /// Fail on the first XML syntax error instead of keeping a partial tree.
    pub strict_xml: bool,

    /// Host suffixes of static-site platforms that get extra path probes.
    pub static_site_platforms: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: default_user_agent(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            batch_size: DEFAULT_BATCH_SIZE,
            allow_private_hosts: false,
            strict_xml: false,
            static_site_platforms: DEFAULT_STATIC_SITE_PLATFORMS
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "timeout_secs",
        "user_agent",
        "max_body_bytes",
        "batch_size",
        "allow_private_hosts",
        "strict_xml",
        "static_site_platforms",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content)
    }

    /// Parses TOML text; blank text yields the defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse as a raw table first to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::debug!(
            timeout_secs = config.timeout_secs,
            batch_size = config.batch_size,
            strict_xml = config.strict_xml,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Fetcher settings for this configuration. A zero timeout is raised to one second.
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
            user_agent: self.user_agent.clone(),
            max_body_bytes: self.max_body_bytes,
            allow_private_hosts: self.allow_private_hosts,
        }
    }

    pub fn parse_mode(&self) -> ParseMode {
        if self.strict_xml {
            ParseMode::Strict
        } else {
            ParseMode::Permissive
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_config(test: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("feedscout_config_test_{test}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.max_body_bytes, 10 * 1024 * 1024);
        assert!(!config.allow_private_hosts);
        assert!(!config.strict_xml);
        assert!(config.user_agent.starts_with("feedscout/"));
        assert!(config
            .static_site_platforms
            .iter()
            .any(|p| p == "github.io"));
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedscout_test_nonexistent_config.toml");
        assert_eq!(Config::load(path).unwrap(), Config::default());
    }

    #[test]
    fn test_empty_and_whitespace_files_return_default() {
        let path = write_config("empty", "");
        assert_eq!(Config::load(&path).unwrap(), Config::default());
        cleanup(&path);

        let path = write_config("whitespace", "   \n  \n  ");
        assert_eq!(Config::load(&path).unwrap(), Config::default());
        cleanup(&path);
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let path = write_config("partial", "timeout_secs = 3\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.timeout_secs, 3);
        assert_eq!(config.batch_size, 5); // default
        assert!(!config.strict_xml); // default
        cleanup(&path);
    }

    #[test]
    fn test_full_config() {
        let content = r#"
timeout_secs = 30
user_agent = "custom-agent/1.0"
max_body_bytes = 2048
batch_size = 8
allow_private_hosts = true
strict_xml = true
static_site_platforms = ["example.dev", "pages.example"]
"#;
        let path = write_config("full", content);
        let config = Config::load(&path).unwrap();
        assert_eq!(
            config,
            Config {
                timeout_secs: 30,
                user_agent: "custom-agent/1.0".into(),
                max_body_bytes: 2048,
                batch_size: 8,
                allow_private_hosts: true,
                strict_xml: true,
                static_site_platforms: vec!["example.dev".into(), "pages.example".into()],
            }
        );
        cleanup(&path);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let path = write_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        cleanup(&path);
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let content = r#"
batch_size = 2
totally_fake_key = "should not fail"
"#;
        let config = Config::parse(content).unwrap();
        assert_eq!(config.batch_size, 2);
    }

    #[test]
    fn test_wrong_type_returns_error() {
        // timeout_secs should be an integer, not a string
        assert!(matches!(
            Config::parse("timeout_secs = \"ten\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    // SEC-014: File size limit
    #[test]
    fn test_too_large_file_rejected() {
        let path = write_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        cleanup(&path);
    }

    #[test]
    fn test_fetch_settings_projection() {
        let config = Config {
            timeout_secs: 0,
            allow_private_hosts: true,
            max_body_bytes: 99,
            ..Config::default()
        };
        let settings = config.fetch_settings();
        assert_eq!(settings.timeout, Duration::from_secs(1));
        assert_eq!(settings.max_body_bytes, 99);
        assert!(settings.allow_private_hosts);
        assert_eq!(settings.user_agent, config.user_agent);

        assert_eq!(Config::default().fetch_settings().timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(Config::default().parse_mode(), ParseMode::Permissive);
        let strict = Config {
            strict_xml: true,
            ..Config::default()
        };
        assert_eq!(strict.parse_mode(), ParseMode::Strict);
    }
}
