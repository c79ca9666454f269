//! Configuration parsing from CLI arguments and environment variables

use crate::{cli::Cli, config::env::EnvManager, error::Result, models::Config};

/// Combines defaults, the .env file, environment variables and CLI flags
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        EnvManager::load_env_file(self.cli.debug)?;
        EnvManager::validate_current_env()?;
        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config);
        config.validate()?;

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) {
        if let Some(ref domain) = self.cli.domain {
            config.target_domain = Some(domain.trim().to_string());
        }
        if let Some(timeout) = self.cli.tcp_timeout {
            config.tcp_timeout_seconds = timeout;
        }
        if let Some(timeout) = self.cli.tls_timeout {
            config.tls_timeout_seconds = timeout;
        }
        if let Some(timeout) = self.cli.http_timeout {
            config.http_timeout_seconds = timeout;
        }
        if let Some(format) = self.cli.format {
            config.output_format = format;
        }

        if self.cli.color {
            config.enable_color = true;
        } else if self.cli.no_color {
            config.enable_color = false;
        }

        // CLI-only switches
        config.show_progress = self.cli.progress;
        config.verbose = self.cli.verbose;
        config.debug = self.cli.debug;

        if config.debug {
            eprintln!("Applied CLI overrides to configuration");
            eprintln!("{}", display_config_summary(config));
        }
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let summary = [
        format!(
            "Target Domain: {}",
            config.target_domain.as_deref().unwrap_or("(none)")
        ),
        format!(
            "Timeouts: TCP {}s, TLS {}s, HTTP {}s",
            config.tcp_timeout_seconds, config.tls_timeout_seconds, config.http_timeout_seconds
        ),
        format!("Output Format: {}", config.output_format),
        format!("Color Output: {}", config.enable_color),
        format!("Progress: {}", config.show_progress),
        format!("Verbose: {}", config.verbose),
        format!("Debug: {}", config.debug),
    ];
    summary.join("\n")
}
