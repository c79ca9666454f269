//! Configuration data model and validation

use crate::types::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How a finished report is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Sectioned card view with badges and colors
    #[default]
    Card,
    /// Plain share digest
    Share,
    /// Serialized report
    Json,
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "card" => Ok(Self::Card),
            "share" | "text" => Ok(Self::Share),
            "json" => Ok(Self::Json),
            other => Err(AppError::config(format!(
                "Unknown output format '{}' (expected card, share or json)",
                other
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Card => "card",
            Self::Share => "share",
            Self::Json => "json",
        };
        f.write_str(name)
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Domain to diagnose; `None` until one is entered
    #[serde(default)]
    pub target_domain: Option<String>,

    /// Per-port TCP connect timeout
    #[serde(default = "default_tcp_timeout_secs")]
    pub tcp_timeout_seconds: u64,

    /// TLS connect plus handshake timeout
    #[serde(default = "default_tls_timeout_secs")]
    pub tls_timeout_seconds: u64,

    /// HTTP connect and read timeout
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_seconds: u64,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Report rendering
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Print a snapshot at every stage boundary
    #[serde(default)]
    pub show_progress: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_domain: None,
            tcp_timeout_seconds: default_tcp_timeout_secs(),
            tls_timeout_seconds: default_tls_timeout_secs(),
            http_timeout_seconds: default_http_timeout_secs(),
            enable_color: default_enable_color(),
            output_format: OutputFormat::default(),
            show_progress: false,
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tcp_timeout(&self) -> Duration {
        Duration::from_secs(self.tcp_timeout_seconds)
    }

    pub fn tls_timeout(&self) -> Duration {
        Duration::from_secs(self.tls_timeout_seconds)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if let Some(domain) = &self.target_domain {
            validate_domain(domain)?;
        }

        for (name, value) in [
            ("TCP", self.tcp_timeout_seconds),
            ("TLS", self.tls_timeout_seconds),
            ("HTTP", self.http_timeout_seconds),
        ] {
            if value == 0 {
                return Err(AppError::config(format!("{} timeout must be greater than 0", name)));
            }
            if value > crate::defaults::MAX_TIMEOUT_SECS {
                return Err(AppError::config(format!(
                    "{} timeout cannot exceed {} seconds",
                    name,
                    crate::defaults::MAX_TIMEOUT_SECS
                )));
            }
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(domain) = std::env::var("TARGET_DOMAIN") {
            let domain = domain.trim();
            if !domain.is_empty() {
                self.target_domain = Some(domain.to_string());
            }
        }

        if let Ok(timeout) = std::env::var("TCP_TIMEOUT_SECONDS") {
            self.tcp_timeout_seconds = timeout.parse().map_err(|e| {
                AppError::config(format!("Invalid TCP_TIMEOUT_SECONDS value '{}': {}", timeout, e))
            })?;
        }

        if let Ok(timeout) = std::env::var("TLS_TIMEOUT_SECONDS") {
            self.tls_timeout_seconds = timeout.parse().map_err(|e| {
                AppError::config(format!("Invalid TLS_TIMEOUT_SECONDS value '{}': {}", timeout, e))
            })?;
        }

        if let Ok(timeout) = std::env::var("HTTP_TIMEOUT_SECONDS") {
            self.http_timeout_seconds = timeout.parse().map_err(|e| {
                AppError::config(format!("Invalid HTTP_TIMEOUT_SECONDS value '{}': {}", timeout, e))
            })?;
        }

        if let Ok(enable_color) = std::env::var("ENABLE_COLOR") {
            self.enable_color = enable_color.parse().map_err(|e| {
                AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", enable_color, e))
            })?;
        }

        if let Ok(format) = std::env::var("OUTPUT_FORMAT") {
            self.output_format = format.parse()?;
        }

        Ok(())
    }
}

/// Check that `domain` is a bare hostname (no scheme, path or port)
pub fn validate_domain(domain: &str) -> Result<()> {
    let domain = domain.trim();
    if domain.is_empty() {
        return Err(AppError::validation("Please enter a domain"));
    }
    if domain.contains("://") || domain.contains('/') {
        let suggestion = url::Url::parse(domain)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .map(|host| format!(" (e.g. {})", host))
            .unwrap_or_default();
        return Err(AppError::validation(format!(
            "'{}' looks like a URL; enter the hostname only{}",
            domain, suggestion
        )));
    }
    if domain.len() > 253 {
        return Err(AppError::validation("Domain exceeds 253 characters"));
    }

    let host = domain.trim_end_matches('.');
    for label in host.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(AppError::validation(format!("Invalid label in domain '{}'", domain)));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(AppError::validation(format!(
                "Domain label '{}' cannot start or end with a hyphen",
                label
            )));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(AppError::validation(format!(
                "Domain '{}' contains invalid characters",
                domain
            )));
        }
    }

    Ok(())
}

// Default value functions for serde
fn default_tcp_timeout_secs() -> u64 {
    crate::defaults::TCP_CONNECT_TIMEOUT.as_secs()
}

fn default_tls_timeout_secs() -> u64 {
    crate::defaults::TLS_HANDSHAKE_TIMEOUT.as_secs()
}

fn default_http_timeout_secs() -> u64 {
    crate::defaults::HTTP_TIMEOUT.as_secs()
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tcp_timeout(), Duration::from_secs(5));
        assert_eq!(config.tls_timeout(), Duration::from_secs(10));
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_zero_timeout_invalid() {
        let mut config = Config::default();
        config.tls_timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_excessive_timeout_invalid() {
        let mut config = Config::default();
        config.http_timeout_seconds = 61;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_domain_validation() {
        assert!(validate_domain("example.com").is_ok());
        assert!(validate_domain("sub-domain.example.co.uk.").is_ok());
        assert!(validate_domain("   ").is_err());
        assert!(validate_domain("https://example.com").is_err());
        assert!(validate_domain("example.com/path").is_err());
        assert!(validate_domain("-bad.example.com").is_err());
        assert!(validate_domain("exa mple.com").is_err());
        assert!(validate_domain("a..b").is_err());
    }

    #[test]
    fn test_url_input_suggests_hostname() {
        let err = validate_domain("https://www.example.com/login").unwrap_err();
        assert!(err.to_string().ends_with("enter the hostname only (e.g. www.example.com)"));

        let err = validate_domain("example.com/path").unwrap_err();
        assert!(err.to_string().ends_with("enter the hostname only"));
    }

    #[test]
    fn test_invalid_domain_fails_config() {
        let mut config = Config::default();
        config.target_domain = Some("http://example.com".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("card".parse::<OutputFormat>().unwrap(), OutputFormat::Card);
        assert_eq!("SHARE".parse::<OutputFormat>().unwrap(), OutputFormat::Share);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("xml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Share.to_string(), "share");
    }
}
