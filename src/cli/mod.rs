//! Command-line interface

use crate::models::OutputFormat;
use clap::Parser;

/// Domain Blockcheck - find out which network layer is blocking a domain
#[derive(Parser, Debug, Clone)]
#[command(name = "blockcheck")]
#[command(version, long_version = crate::LONG_VERSION, about, long_about = None)]
pub struct Cli {
    /// Domain to diagnose, hostname only (falls back to TARGET_DOMAIN)
    #[arg(value_name = "DOMAIN")]
    pub domain: Option<String>,

    /// Per-port TCP connect timeout in seconds
    #[arg(long, value_name = "SECS", value_parser = parse_duration)]
    pub tcp_timeout: Option<u64>,

    /// TLS handshake timeout in seconds
    #[arg(long, value_name = "SECS", value_parser = parse_duration)]
    pub tls_timeout: Option<u64>,

    /// HTTPS connect/read timeout in seconds
    #[arg(long, value_name = "SECS", value_parser = parse_duration)]
    pub http_timeout: Option<u64>,

    /// Report format: card, share or json
    #[arg(short, long, value_name = "FORMAT", value_parser = parse_format)]
    pub format: Option<OutputFormat>,

    /// Force colored output
    #[arg(long, conflicts_with = "no_color")]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Print a line at every stage boundary
    #[arg(long)]
    pub progress: bool,

    /// Include DNS debug detail and stack excerpts
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// List supported environment variables and exit
    #[arg(long)]
    pub env_help: bool,
}

impl Cli {
    /// Validate CLI arguments for conflicts and requirements
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }
        if let Some(ref domain) = self.domain {
            if domain.trim().is_empty() {
                return Err("Please enter a domain".to_string());
            }
        }
        Ok(())
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            supports_color()
        }
    }
}

/// Parse a timeout in whole seconds
fn parse_duration(s: &str) -> Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid duration: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid duration: {}", s))
        .and_then(|secs| {
            if secs == 0 {
                Err("Duration must be greater than 0".to_string())
            } else if secs > crate::defaults::MAX_TIMEOUT_SECS {
                Err(format!(
                    "Duration cannot exceed {} seconds",
                    crate::defaults::MAX_TIMEOUT_SECS
                ))
            } else {
                Ok(secs)
            }
        })
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    s.parse::<OutputFormat>().map_err(|e| e.to_string())
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}
