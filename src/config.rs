//! Settings for embedding hosts
//!
//! Every field has a serde default, so an empty TOML document (or no file at
//! all) yields a working configuration. Durations are written as `30s`, `5m`
//! or `1h`.

use crate::error::ConfigError;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the helper temp-dir root
pub const TMP_DIR_ENV: &str = "DEPCORE_TMP_DIR";

/// Environment variable enabling helper stdout/stderr logging
pub const DEBUG_HELPERS_ENV: &str = "DEPCORE_DEBUG_HELPERS";

/// Parse a duration string such as `30s`, `5m` or `1h`
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidDuration {
        value: s.to_string(),
    };

    let (num_str, unit) = if let Some(n) = s.strip_suffix('s') {
        (n, 's')
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 'm')
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 'h')
    } else {
        return Err(invalid());
    };

    let num: u64 = num_str.trim().parse().map_err(|_| invalid())?;

    let seconds = match unit {
        's' => num,
        'm' => num * 60,
        _ => num * 60 * 60,
    };

    Ok(Duration::from_secs(seconds))
}

fn duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

/// Top-level settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub helper: HelperSettings,
    pub http: HttpSettings,
    pub sources: SourcesSettings,
}

/// Sandboxed helper subprocess settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HelperSettings {
    /// Hard wall-clock limit per helper call
    #[serde(deserialize_with = "duration")]
    pub timeout: Duration,
    /// Budget a killed child has to be reaped
    #[serde(deserialize_with = "duration")]
    pub grace_period: Duration,
    /// Parent directory for helper temp dirs (system temp dir when unset)
    pub tmp_root: Option<PathBuf>,
    pub max_stderr_bytes: usize,
    pub max_retries: u32,
    pub debug_helpers: bool,
}

impl Default for HelperSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20 * 60),
            grace_period: Duration::from_secs(5),
            tmp_root: None,
            max_stderr_bytes: 50_000,
            max_retries: 2,
            debug_helpers: false,
        }
    }
}

/// Registry HTTP client settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    #[serde(deserialize_with = "duration")]
    pub timeout: Duration,
    pub user_agent: String,
    pub max_retries: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("depcore/", env!("CARGO_PKG_VERSION")).to_string(),
            max_retries: 3,
        }
    }
}

/// Self-hosted provider hosts recognised by source URL parsing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourcesSettings {
    pub github_hosts: Vec<String>,
    pub gitlab_hosts: Vec<String>,
    pub bitbucket_hosts: Vec<String>,
}

impl Settings {
    /// Parse settings from TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Self::parse_at(text, Path::new("<inline>"))
    }

    /// Read settings from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidSettings {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse_at(&text, path)
    }

    fn parse_at(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::InvalidSettings {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Apply `DEPCORE_TMP_DIR` and `DEPCORE_DEBUG_HELPERS`
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(TMP_DIR_ENV).filter(|d| !d.is_empty()) {
            self.helper.tmp_root = Some(PathBuf::from(dir));
        }
        if let Some(flag) = lookup(DEBUG_HELPERS_ENV) {
            self.helper.debug_helpers = matches!(flag.as_str(), "1" | "true" | "yes");
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration(" 10s ").unwrap(), Duration::from_secs(10));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("abcs").is_err());
        assert!(matches!(
            parse_duration("3d"),
            Err(ConfigError::InvalidDuration { .. })
        ));
    }

    #[test]
    fn test_defaults_from_empty_document() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.helper.timeout, Duration::from_secs(1200));
        assert_eq!(settings.helper.grace_period, Duration::from_secs(5));
        assert_eq!(settings.helper.max_stderr_bytes, 50_000);
        assert_eq!(settings.http.max_retries, 3);
        assert!(settings.http.user_agent.starts_with("depcore/"));
        assert!(settings.sources.github_hosts.is_empty());
    }

    #[test]
    fn test_from_toml() {
        let settings = Settings::from_toml(
            r#"
[helper]
timeout = "90s"
debug_helpers = true

[http]
timeout = "1m"

[sources]
github_hosts = ["ghe.example.com"]
"#,
        )
        .unwrap();
        assert_eq!(settings.helper.timeout, Duration::from_secs(90));
        assert!(settings.helper.debug_helpers);
        assert_eq!(settings.helper.max_retries, 2);
        assert_eq!(settings.http.timeout, Duration::from_secs(60));
        assert_eq!(settings.sources.github_hosts, vec!["ghe.example.com"]);
    }

    #[test]
    fn test_bad_duration_is_settings_error() {
        let err = Settings::from_toml("[helper]\ntimeout = \"forever\"").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSettings { .. }));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[http]\nuser_agent = \"bot/1\"").unwrap();
        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.http.user_agent, "bot/1");

        let err = Settings::load(Path::new("/nonexistent/depcore.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/depcore.toml"));
    }

    #[test]
    fn test_env_overrides() {
        let settings = Settings::default().with_overrides_from(|key| match key {
            TMP_DIR_ENV => Some("/scratch".to_string()),
            DEBUG_HELPERS_ENV => Some("1".to_string()),
            _ => None,
        });
        assert_eq!(settings.helper.tmp_root, Some(PathBuf::from("/scratch")));
        assert!(settings.helper.debug_helpers);

        let untouched = Settings::default().with_overrides_from(|_| None);
        assert!(untouched.helper.tmp_root.is_none());
        assert!(!untouched.helper.debug_helpers);
    }
}
