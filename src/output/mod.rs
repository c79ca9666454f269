//! Output formatting and display system
//!
//! Three renderings of a report: the colored card view for terminals, the
//! plain-text share digest and a JSON export.

mod colored;
mod formatter;

pub use colored::{san_summary, ColorScheme, ColoredFormatter};
pub use formatter::{truncate, FormattingOptions, OutputFormatter, PlainFormatter};

use crate::{
    error::{AppError, Result},
    models::{OutputFormat, Report},
};

/// Pretty-printed JSON export of the report
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_report(&self, report: &Report) -> Result<String> {
        serde_json::to_string_pretty(report)
            .map_err(|e| AppError::io(format!("Failed to export report to JSON: {}", e)))
    }

    /// Compact single-line snapshot, one per stage boundary
    fn format_progress(&self, report: &Report) -> Result<String> {
        serde_json::to_string(report)
            .map_err(|e| AppError::io(format!("Failed to export report to JSON: {}", e)))
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(serde_json::json!({ "error": error }).to_string())
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(serde_json::json!({ "warning": warning }).to_string())
    }
}

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    pub fn create_formatter(
        format: OutputFormat,
        enable_color: bool,
        verbose: bool,
    ) -> Box<dyn OutputFormatter> {
        match format {
            OutputFormat::Card => Box::new(ColoredFormatter::new(FormattingOptions {
                enable_color: enable_color && ColoredFormatter::supports_color(),
                verbose_mode: verbose,
            })),
            OutputFormat::Share => Box::new(PlainFormatter::new()),
            OutputFormat::Json => Box::new(JsonFormatter),
        }
    }
}
