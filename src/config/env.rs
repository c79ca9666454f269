//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env from the working directory if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        Self::load_env_file_from(Path::new(".env"), debug)
    }

    /// Load a specific env file if it exists; a missing file is not an error
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<()> {
        if path.exists() {
            dotenv::from_path(path)
                .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;

            if debug {
                eprintln!("Loaded configuration from {}", path.display());
            }
        } else if debug {
            eprintln!("No {} file found, using defaults and CLI arguments", path.display());
        }

        Ok(())
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        match key {
            "TARGET_DOMAIN" => crate::models::config::validate_domain(value),
            "TCP_TIMEOUT_SECONDS" | "TLS_TIMEOUT_SECONDS" | "HTTP_TIMEOUT_SECONDS" => {
                let timeout: u64 = value
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if timeout == 0 || timeout > crate::defaults::MAX_TIMEOUT_SECS {
                    return Err(AppError::config(format!(
                        "{} must be between 1 and {}, got: {}",
                        key,
                        crate::defaults::MAX_TIMEOUT_SECS,
                        timeout
                    )));
                }
                Ok(())
            }
            "ENABLE_COLOR" => value
                .parse::<bool>()
                .map(|_| ())
                .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", value, e))),
            "OUTPUT_FORMAT" => value.parse::<crate::models::OutputFormat>().map(|_| ()),
            // Unknown environment variable, ignore
            _ => Ok(()),
        }
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("TARGET_DOMAIN", "Domain to diagnose when none is given", "example.com"),
            ("TCP_TIMEOUT_SECONDS", "Per-port TCP connect timeout (1-60)", "5"),
            ("TLS_TIMEOUT_SECONDS", "TLS handshake timeout (1-60)", "10"),
            ("HTTP_TIMEOUT_SECONDS", "HTTPS connect/read timeout (1-60)", "10"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
            ("OUTPUT_FORMAT", "Report format: card, share or json", "card"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<22} {}\n", var, description));
            help.push_str(&format!("  {:<22} Example: {}\n\n", "", example));
        }

        help.push_str("Values may also be placed in a .env file in the working directory.\n");
        help.push_str("Command-line flags take precedence over both.\n");
        help
    }

    /// Check every supported variable currently set in the environment
    pub fn validate_current_env() -> Result<()> {
        for (key, _, _) in Self::get_supported_env_vars() {
            if let Ok(value) = std::env::var(key) {
                Self::validate_env_var(key, &value)?;
            }
        }
        Ok(())
    }
}
