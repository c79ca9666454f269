//! Configuration validation utilities and rules

use crate::{error::Result, models::Config};
use colored::*;
use std::net::IpAddr;

/// Configuration validator producing non-fatal warnings
pub struct ConfigValidator;

impl ConfigValidator {
    /// Hard validation first, then advisory checks
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        let mut warnings = Vec::new();

        config.validate()?;

        if let Some(ref domain) = config.target_domain {
            warnings.extend(Self::validate_target_domain(domain));
        }
        warnings.extend(Self::validate_timeouts(config));

        Ok(warnings)
    }

    fn validate_target_domain(domain: &str) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let host = domain.trim().trim_end_matches('.');

        if let Ok(ip) = host.parse::<IpAddr>() {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "'{}' is an IP literal; certificate checks against an address usually fail",
                    ip
                ),
            ));
            if let IpAddr::V4(v4) = ip {
                if v4.is_private() || v4.is_loopback() {
                    warnings.push(ValidationWarning::new(
                        ValidationLevel::Info,
                        format!("'{}' targets a private/local network", ip),
                    ));
                }
            }
        } else if !host.contains('.') {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("'{}' has a single label and may resolve through search domains", host),
            ));
        }

        if domain.trim().ends_with('.') {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("'{}' is fully qualified; the trailing dot is kept for resolution", domain),
            ));
        }

        warnings
    }

    /// Compare timeouts with the reference probe timings
    fn validate_timeouts(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let reference = [
            ("TCP", config.tcp_timeout_seconds, crate::defaults::TCP_CONNECT_TIMEOUT.as_secs()),
            ("TLS", config.tls_timeout_seconds, crate::defaults::TLS_HANDSHAKE_TIMEOUT.as_secs()),
            ("HTTP", config.http_timeout_seconds, crate::defaults::HTTP_TIMEOUT.as_secs()),
        ];

        for (name, value, default) in reference {
            if value < default {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!(
                        "{} timeout of {}s is below the reference {}s; slow networks may be reported as blocked",
                        name, value, default
                    ),
                ));
            } else if value > default {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!(
                        "{} timeout of {}s is above the reference {}s; silent drops take longer to detect",
                        name, value, default
                    ),
                ));
            }
        }

        warnings
    }
}

/// Validation warning levels
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Info,
    Warning,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Info => Color::Blue,
            Self::Warning => Color::Yellow,
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        let tag = format!("[{}]", self.level.as_str());
        if use_color {
            format!("{} {}", tag.color(self.level.color()), self.message)
        } else {
            format!("{} {}", tag, self.message)
        }
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}
