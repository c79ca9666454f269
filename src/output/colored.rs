//! Colored card view for the terminal
//!
//! Renders one card per reached stage with status badges and
//! severity-colored findings. Colors are dropped entirely when disabled, so
//! the card also works for pipes and logs.

use super::formatter::{
    fmt_err, last_stage_name, stages_reached, truncate, yes_no, FormattingOptions,
    OutputFormatter,
};
use crate::{
    error::Result,
    models::{DnsResult, HttpResult, Report, TcpResult, TlsResult},
    types::{ConnectionStatus, Severity},
};
use colored::*;
use std::fmt::Write as _;

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            muted: Color::BrightBlack,
        }
    }
}

impl ColorScheme {
    /// Badge color for a connection status
    pub fn status_color(&self, status: ConnectionStatus) -> Color {
        match status {
            ConnectionStatus::Idle | ConnectionStatus::Loading => self.info,
            ConnectionStatus::NotBlocked => self.success,
            ConnectionStatus::Timeout | ConnectionStatus::UnknownError => self.warning,
            _ => self.error,
        }
    }

    pub fn severity_color(&self, severity: Severity) -> Color {
        match severity {
            Severity::Critical | Severity::High => self.error,
            Severity::Medium => self.warning,
            Severity::Low => self.info,
        }
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self {
            options,
            color_scheme: ColorScheme::default(),
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    fn bold(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    fn dimmed(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.dimmed()
        } else {
            text.normal()
        }
    }

    /// `[ Label ]` badge in the status color
    pub fn status_badge(&self, status: ConnectionStatus) -> String {
        let badge = format!("[ {} ]", status.label());
        let color = self.color_scheme.status_color(status);
        if self.options.enable_color {
            badge.color(color).bold().to_string()
        } else {
            badge
        }
    }

    fn card_title(&self, out: &mut String, title: &str, ok: bool) -> Result<()> {
        let (marker, color) = if ok {
            ("●", self.color_scheme.success)
        } else {
            ("✖", self.color_scheme.error)
        };
        writeln!(out, "{} {}", self.colorize(marker, color), self.bold(title)).map_err(fmt_err)
    }

    fn field(&self, out: &mut String, label: &str, value: impl std::fmt::Display) -> Result<()> {
        writeln!(out, "  {:<14}{}", self.dimmed(label), value).map_err(fmt_err)
    }

    fn dns_card(&self, out: &mut String, dns: &DnsResult) -> Result<()> {
        let ok = !dns.ip_addresses.is_empty() && !dns.has_blocked_ip();
        self.card_title(out, "DNS Resolution", ok)?;

        if dns.ip_addresses.is_empty() {
            self.field(out, "Addresses", self.colorize("none", self.color_scheme.error))?;
        }
        if let Some(ref name) = dns.canonical_name {
            self.field(out, "Canonical", name)?;
        }
        self.field(out, "Resolved in", format!("{}ms", dns.resolution_time_ms))?;
        self.field(out, "IPv6", yes_no(dns.has_ipv6))?;

        for analysis in &dns.ip_analysis {
            let mut line = format!(
                "  - {} {}",
                self.bold(&analysis.ip),
                self.dimmed(&format!("({})", analysis.ip_class.description()))
            );
            if let Some(ref reverse) = analysis.reverse_dns {
                let _ = write!(line, " {}", reverse);
            }
            if analysis.is_blocked {
                let reason = analysis.block_reason.as_deref().unwrap_or("blocked address");
                let _ = write!(
                    line,
                    " {}",
                    self.colorize(&format!("BLOCKED: {}", reason), self.color_scheme.error)
                );
            }
            writeln!(out, "{}", line).map_err(fmt_err)?;
        }

        if self.options.verbose_mode {
            if let Some(ref debug) = dns.debug_info {
                writeln!(out, "  {}", self.dimmed("Debug")).map_err(fmt_err)?;
                self.field(
                    out,
                    "Response",
                    format!("{} ({})", debug.response_type, debug.response_type.description()),
                )?;
                self.field(out, "Hint", debug.response_type.developer_hint())?;
                self.field(out, "Query time", format!("{}ms", debug.query_time_ms))?;
                if let Some(ref resolver) = debug.resolver {
                    self.field(out, "Resolver", resolver)?;
                }
                if let Some(ref kind) = debug.exception_kind {
                    let message = debug.exception_message.as_deref().unwrap_or("No message");
                    self.field(out, "Exception", format!("{}: {}", kind, message))?;
                }
                for frame in &debug.stack_excerpt {
                    writeln!(out, "      {}", self.dimmed(frame)).map_err(fmt_err)?;
                }
            }
        }
        Ok(())
    }

    fn tcp_card(&self, out: &mut String, tcp: &TcpResult) -> Result<()> {
        self.card_title(out, "TCP Connection", tcp.any_port_open())?;
        let state = |open: bool| {
            if open {
                self.colorize("open", self.color_scheme.success)
            } else {
                self.colorize("blocked", self.color_scheme.error)
            }
        };
        self.field(out, "Port 443", state(tcp.port_443_open))?;
        self.field(out, "Port 80", state(tcp.port_80_open))?;
        if tcp.latency_ms > 0 {
            self.field(out, "Latency", format!("{}ms", tcp.latency_ms))?;
        }
        if let Some(ref failure) = tcp.failure {
            self.field(out, "Failure", failure)?;
        }
        Ok(())
    }

    fn tls_card(&self, out: &mut String, tls: &TlsResult) -> Result<()> {
        let width = crate::defaults::CARD_TRUNCATE;
        let ok = tls.is_valid && !tls.is_self_signed && !tls.issuer_mismatch;
        self.card_title(out, "TLS Certificate", ok)?;
        self.field(out, "Valid", yes_no(tls.is_valid))?;
        if !tls.protocol.is_empty() {
            self.field(out, "Protocol", &tls.protocol)?;
        }
        if !tls.issuer.is_empty() {
            self.field(out, "Issuer", truncate(&tls.issuer, width))?;
        }
        if !tls.subject.is_empty() {
            self.field(out, "Subject", truncate(&tls.subject, width))?;
        }
        if let Some(expires) = tls.expires_at {
            self.field(out, "Expires", expires.format("%Y-%m-%d"))?;
        }
        if !tls.subject_alt_names.is_empty() {
            self.field(out, "SANs", san_summary(&tls.subject_alt_names))?;
        }
        if tls.is_self_signed {
            writeln!(
                out,
                "  {}",
                self.colorize("Self-signed certificate", self.color_scheme.error)
            )
            .map_err(fmt_err)?;
        }
        if tls.issuer_mismatch {
            writeln!(
                out,
                "  {}",
                self.colorize("Possible proxy/MITM issuer", self.color_scheme.warning)
            )
            .map_err(fmt_err)?;
        }
        Ok(())
    }

    fn http_card(&self, out: &mut String, http: &HttpResult) -> Result<()> {
        self.card_title(out, "HTTP Response", http.is_success() && http.block_header.is_none())?;
        let status = format!("{} {}", http.status_code, http.status_message);
        let color = if http.is_success() {
            self.color_scheme.success
        } else {
            self.color_scheme.error
        };
        self.field(out, "Status", self.colorize(status.trim_end(), color))?;
        self.field(out, "Time", format!("{}ms", http.response_time_ms))?;
        if let Some(ref server) = http.server {
            self.field(out, "Server", server)?;
        }
        if let Some(ref content_type) = http.content_type {
            self.field(out, "Content-Type", content_type)?;
        }
        if let Some(ref header) = http.block_header {
            self.field(out, "Block header", self.colorize(header, self.color_scheme.error))?;
        }
        Ok(())
    }
}

/// First few SANs, then `+N more`
pub fn san_summary(names: &[String]) -> String {
    let limit = crate::defaults::SAN_DISPLAY_LIMIT;
    let shown: Vec<&str> = names.iter().take(limit).map(String::as_str).collect();
    let mut summary = shown.join(", ");
    if names.len() > limit {
        let _ = write!(summary, " +{} more", names.len() - limit);
    }
    summary
}

impl OutputFormatter for ColoredFormatter {
    fn format_report(&self, report: &Report) -> Result<String> {
        let mut out = String::new();

        let title = format!("Domain Check: {}", report.domain);
        writeln!(out, "{}", self.colorize(&"═".repeat(title.chars().count() + 4), self.color_scheme.header))
            .map_err(fmt_err)?;
        writeln!(out, "  {}", self.bold(&title)).map_err(fmt_err)?;
        writeln!(out, "{}", self.colorize(&"═".repeat(title.chars().count() + 4), self.color_scheme.header))
            .map_err(fmt_err)?;
        writeln!(out, "{}", self.status_badge(report.status)).map_err(fmt_err)?;
        if let Some(completed_at) = report.completed_at {
            writeln!(
                out,
                "{}",
                self.dimmed(&format!("Checked {}", completed_at.format("%Y-%m-%d %H:%M:%S UTC")))
            )
            .map_err(fmt_err)?;
        }

        if let Some(dns) = report.dns.result() {
            writeln!(out).map_err(fmt_err)?;
            self.dns_card(&mut out, dns)?;
        }
        if let Some(tcp) = report.tcp.result() {
            writeln!(out).map_err(fmt_err)?;
            self.tcp_card(&mut out, tcp)?;
        }
        if let Some(tls) = report.tls.result() {
            writeln!(out).map_err(fmt_err)?;
            self.tls_card(&mut out, tls)?;
        }
        if let Some(http) = report.http.result() {
            writeln!(out).map_err(fmt_err)?;
            self.http_card(&mut out, http)?;
        }

        let detected: Vec<_> = report.blocking_factors.iter().filter(|f| f.detected).collect();
        if !detected.is_empty() {
            writeln!(out).map_err(fmt_err)?;
            writeln!(out, "{}", self.bold(&format!("Blocking Factors ({})", detected.len())))
                .map_err(fmt_err)?;
            for factor in detected {
                let tag = format!("[{}]", factor.severity.as_str());
                writeln!(
                    out,
                    "  {} {}",
                    self.colorize(&tag, self.color_scheme.severity_color(factor.severity)),
                    self.bold(&factor.name)
                )
                .map_err(fmt_err)?;
                writeln!(out, "      {}", factor.description).map_err(fmt_err)?;
                if let Some(ref detail) = factor.technical_detail {
                    writeln!(out, "      {}", self.dimmed(detail)).map_err(fmt_err)?;
                }
            }
        }

        if !report.exceptions.is_empty() {
            writeln!(out).map_err(fmt_err)?;
            writeln!(out, "{}", self.bold(&format!("Exceptions ({})", report.exceptions.len())))
                .map_err(fmt_err)?;
            for exception in &report.exceptions {
                writeln!(out, "  {}", self.colorize(&exception.to_string(), self.color_scheme.muted))
                    .map_err(fmt_err)?;
            }
        }

        Ok(out)
    }

    fn format_progress(&self, report: &Report) -> Result<String> {
        let stage = last_stage_name(report).unwrap_or("-");
        Ok(format!(
            "{} {} {}",
            self.colorize(&format!("[{}/4]", stages_reached(report)), self.color_scheme.info),
            self.bold(stage),
            self.dimmed(&format!("{} finding(s)", report.blocking_factors.len()))
        ))
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("❌ {}", self.colorize(error, self.color_scheme.error)))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("⚠️  {}", self.colorize(warning, self.color_scheme.warning)))
    }
}

/// Helper functions for color management
impl ColoredFormatter {
    /// Check if terminal supports colors
    pub fn supports_color() -> bool {
        std::env::var("NO_COLOR").is_err()
            && std::env::var("TERM").map(|term| term != "dumb").unwrap_or(true)
    }
}
