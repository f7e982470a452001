use std::path::Path;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::error::ConfigError;

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_base_url() -> String {
    "https://query2.finance.yahoo.com".into()
}

fn default_cookie_url() -> String {
    "https://fc.yahoo.com".into()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0 Safari/537.36"
        .into()
}

fn default_server_name() -> String {
    "technical-analysis".into()
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Page visited once per ticker lookup to obtain the session cookie.
    #[serde(default = "default_cookie_url")]
    pub cookie_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cookie_url: default_cookie_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_name")]
    pub name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
        }
    }
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_log_format(config)?;
    validate_provider(config)?;
    Ok(())
}

fn validate_log_format(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if !VALID_LOG_FORMATS.contains(&config.general.log_format.as_str()) {
        return Err(Report::new(ConfigError::Validation {
            field: format!(
                "general.log_format \"{}\" is not one of {:?}",
                config.general.log_format, VALID_LOG_FORMATS
            ),
        }));
    }
    Ok(())
}

fn validate_provider(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let provider = &config.provider;
    for (name, url) in [
        ("provider.base_url", &provider.base_url),
        ("provider.cookie_url", &provider.cookie_url),
    ] {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(Report::new(ConfigError::Validation {
                field: format!("{name} \"{url}\" must be an http(s) URL"),
            }));
        }
    }

    if provider.timeout_secs == 0 {
        return Err(Report::new(ConfigError::Validation {
            field: "provider.timeout_secs must be greater than 0".into(),
        }));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> AppConfig {
        toml::from_str(toml).expect("parse failed")
    }

    #[test]
    fn valid_full_config_parses() {
        let toml = r#"
[general]
log_level = "debug"
log_format = "json"

[provider]
base_url = "https://query1.finance.yahoo.com"
cookie_url = "https://fc.yahoo.com"
timeout_secs = 30
user_agent = "test-agent"

[server]
name = "ta"
"#;
        let config = parse(toml);
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.provider.base_url, "https://query1.finance.yahoo.com");
        assert_eq!(config.provider.timeout_secs, 30);
        assert_eq!(config.provider.user_agent, "test-agent");
        assert_eq!(config.server.name, "ta");
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn defaults_applied_when_fields_omitted() {
        let config = parse("");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "text");
        assert_eq!(config.provider.base_url, "https://query2.finance.yahoo.com");
        assert_eq!(config.provider.cookie_url, "https://fc.yahoo.com");
        assert_eq!(config.provider.timeout_secs, 10);
        assert_eq!(config.server.name, "technical-analysis");
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = parse(
            r#"
[provider]
timeout_secs = 5
"#,
        );
        assert_eq!(config.provider.timeout_secs, 5);
        assert_eq!(config.provider.base_url, "https://query2.finance.yahoo.com");
    }

    #[test]
    fn unknown_log_format_rejected() {
        let config = parse(
            r#"
[general]
log_format = "xml"
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn non_http_base_url_rejected() {
        let config = parse(
            r#"
[provider]
base_url = "ftp://example.com"
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = parse(
            r#"
[provider]
timeout_secs = 0
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = load(Path::new("/nonexistent/technical-analysis.toml")).unwrap_err();
        assert!(matches!(err.current_context(), ConfigError::ReadFile));
    }
}
