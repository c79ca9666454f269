//! Core formatting trait and the plain-text share digest
//!
//! The plain formatter is a pure function of the report: the same report
//! always produces the same bytes.

use crate::{
    error::{AppError, Result},
    models::{DnsResult, HttpResult, Report, TcpResult, TlsResult},
};
use std::fmt::Write as _;

/// Main trait for output formatting
pub trait OutputFormatter {
    /// Format a complete report
    fn format_report(&self, report: &Report) -> Result<String>;

    /// One line describing how far a run has got
    fn format_progress(&self, report: &Report) -> Result<String>;

    fn format_error(&self, error: &str) -> Result<String>;

    fn format_warning(&self, warning: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    pub enable_color: bool,
    /// Include DNS debug detail and stack excerpts
    pub verbose_mode: bool,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: crate::defaults::DEFAULT_ENABLE_COLOR,
            verbose_mode: false,
        }
    }
}

const STAGE_NAMES: [&str; 4] = ["DNS", "TCP", "TLS", "HTTP"];

/// Cut `text` to `max` characters, marking the cut with `...`
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max).collect();
        cut.push_str("...");
        cut
    }
}

pub fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

/// Number of stages whose slot has been filled
pub fn stages_reached(report: &Report) -> usize {
    [
        !report.dns.is_not_run(),
        !report.tcp.is_not_run(),
        !report.tls.is_not_run(),
        !report.http.is_not_run(),
    ]
    .iter()
    .filter(|reached| **reached)
    .count()
}

/// Name of the last stage with a filled slot
pub fn last_stage_name(report: &Report) -> Option<&'static str> {
    let reached = [
        !report.dns.is_not_run(),
        !report.tcp.is_not_run(),
        !report.tls.is_not_run(),
        !report.http.is_not_run(),
    ];
    reached
        .iter()
        .rposition(|r| *r)
        .map(|index| STAGE_NAMES[index])
}

pub(crate) fn fmt_err(e: std::fmt::Error) -> AppError {
    AppError::io(format!("Failed to format report: {}", e))
}

/// Plain-text digest suitable for sharing
#[derive(Debug, Clone, Default)]
pub struct PlainFormatter;

impl PlainFormatter {
    pub fn new() -> Self {
        Self
    }

    fn section_header(out: &mut String, title: &str) -> Result<()> {
        writeln!(out, "{}", title).map_err(fmt_err)?;
        writeln!(out, "{}", "-".repeat(40)).map_err(fmt_err)
    }

    fn write_dns(out: &mut String, dns: &DnsResult) -> Result<()> {
        Self::section_header(out, "DNS INFORMATION")?;
        let addresses: Vec<String> = dns.ip_addresses.iter().map(|ip| ip.to_string()).collect();
        writeln!(out, "IP Addresses: {}", addresses.join(", ")).map_err(fmt_err)?;
        if let Some(ref name) = dns.canonical_name {
            writeln!(out, "Canonical Name: {}", name).map_err(fmt_err)?;
        }
        writeln!(out, "Resolution Time: {}ms", dns.resolution_time_ms).map_err(fmt_err)?;
        writeln!(out, "IPv6 Available: {}", yes_no(dns.has_ipv6)).map_err(fmt_err)?;

        for analysis in &dns.ip_analysis {
            writeln!(out).map_err(fmt_err)?;
            writeln!(out, "  IP: {}", analysis.ip).map_err(fmt_err)?;
            writeln!(out, "  Class: {}", analysis.ip_class.description()).map_err(fmt_err)?;
            writeln!(out, "  Private: {}", yes_no(analysis.is_private)).map_err(fmt_err)?;
            let blocked = match (analysis.is_blocked, analysis.block_reason.as_deref()) {
                (true, Some(reason)) => format!("Yes - {}", reason),
                (true, None) => "Yes".to_string(),
                (false, _) => "No".to_string(),
            };
            writeln!(out, "  Blocked: {}", blocked).map_err(fmt_err)?;
            if let Some(ref reverse) = analysis.reverse_dns {
                writeln!(out, "  Reverse DNS: {}", reverse).map_err(fmt_err)?;
            }
        }

        if let Some(ref debug) = dns.debug_info {
            writeln!(out).map_err(fmt_err)?;
            writeln!(out, "  [Debug]").map_err(fmt_err)?;
            writeln!(out, "  Response Type: {}", debug.response_type).map_err(fmt_err)?;
            writeln!(out, "  Query Time: {}ms", debug.query_time_ms).map_err(fmt_err)?;
            if let Some(ref kind) = debug.exception_kind {
                writeln!(out, "  Exception: {}", kind).map_err(fmt_err)?;
            }
            if let Some(ref message) = debug.exception_message {
                writeln!(out, "  Message: {}", message).map_err(fmt_err)?;
            }
        }
        writeln!(out).map_err(fmt_err)
    }

    fn write_tcp(out: &mut String, tcp: &TcpResult) -> Result<()> {
        let state = |open: bool| if open { "Reachable" } else { "Blocked" };
        Self::section_header(out, "TCP CONNECTION")?;
        writeln!(out, "Port 443 (HTTPS): {}", state(tcp.port_443_open)).map_err(fmt_err)?;
        writeln!(out, "Port 80 (HTTP): {}", state(tcp.port_80_open)).map_err(fmt_err)?;
        if tcp.latency_ms > 0 {
            writeln!(out, "Latency: {}ms", tcp.latency_ms).map_err(fmt_err)?;
        }
        if let Some(ref failure) = tcp.failure {
            writeln!(out, "Exception: {}", failure).map_err(fmt_err)?;
        }
        writeln!(out).map_err(fmt_err)
    }

    fn write_tls(out: &mut String, tls: &TlsResult) -> Result<()> {
        let width = crate::defaults::SHARE_TRUNCATE;
        Self::section_header(out, "SSL/TLS CERTIFICATE")?;
        writeln!(out, "Valid: {}", yes_no(tls.is_valid)).map_err(fmt_err)?;
        if !tls.protocol.is_empty() {
            writeln!(out, "Protocol: {}", tls.protocol).map_err(fmt_err)?;
        }
        if !tls.issuer.is_empty() {
            writeln!(out, "Issuer: {}", truncate(&tls.issuer, width)).map_err(fmt_err)?;
        }
        if !tls.subject.is_empty() {
            writeln!(out, "Subject: {}", truncate(&tls.subject, width)).map_err(fmt_err)?;
        }
        if let Some(expires) = tls.expires_at {
            writeln!(out, "Expires: {}", expires.format("%Y-%m-%d %H:%M:%S UTC")).map_err(fmt_err)?;
        }
        if tls.is_self_signed {
            writeln!(out, "WARNING: Self-signed certificate").map_err(fmt_err)?;
        }
        if tls.issuer_mismatch {
            writeln!(out, "WARNING: Possible proxy/MITM").map_err(fmt_err)?;
        }
        writeln!(out).map_err(fmt_err)
    }

    fn write_http(out: &mut String, http: &HttpResult) -> Result<()> {
        Self::section_header(out, "HTTP RESPONSE")?;
        let status = format!("Status: {} {}", http.status_code, http.status_message);
        writeln!(out, "{}", status.trim_end()).map_err(fmt_err)?;
        writeln!(out, "Response Time: {}ms", http.response_time_ms).map_err(fmt_err)?;
        if let Some(ref server) = http.server {
            writeln!(out, "Server: {}", server).map_err(fmt_err)?;
        }
        if let Some(ref content_type) = http.content_type {
            writeln!(out, "Content-Type: {}", content_type).map_err(fmt_err)?;
        }
        if let Some(ref header) = http.block_header {
            writeln!(out, "Block Header: {}", header).map_err(fmt_err)?;
        }
        writeln!(out).map_err(fmt_err)
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_report(&self, report: &Report) -> Result<String> {
        let mut out = String::new();

        writeln!(out, "DOMAIN CHECK REPORT").map_err(fmt_err)?;
        writeln!(out, "{}", "=".repeat(40)).map_err(fmt_err)?;
        writeln!(out).map_err(fmt_err)?;
        writeln!(out, "Domain: {}", report.domain).map_err(fmt_err)?;
        writeln!(out, "Status: {}", report.status).map_err(fmt_err)?;
        if let Some(completed_at) = report.completed_at {
            writeln!(out, "Timestamp: {}", completed_at.format("%Y-%m-%d %H:%M:%S")).map_err(fmt_err)?;
        }
        writeln!(out).map_err(fmt_err)?;

        if let Some(dns) = report.dns.result() {
            Self::write_dns(&mut out, dns)?;
        }
        if let Some(tcp) = report.tcp.result() {
            Self::write_tcp(&mut out, tcp)?;
        }
        if let Some(tls) = report.tls.result() {
            Self::write_tls(&mut out, tls)?;
        }
        if let Some(http) = report.http.result() {
            Self::write_http(&mut out, http)?;
        }

        let detected: Vec<_> = report.blocking_factors.iter().filter(|f| f.detected).collect();
        if !detected.is_empty() {
            Self::section_header(&mut out, "BLOCKING FACTORS")?;
            for factor in detected {
                writeln!(out).map_err(fmt_err)?;
                writeln!(out, "[{}] {}", factor.severity.as_str(), factor.name).map_err(fmt_err)?;
                writeln!(out, "  {}", factor.description).map_err(fmt_err)?;
                if let Some(ref detail) = factor.technical_detail {
                    writeln!(out, "  Detail: {}", detail).map_err(fmt_err)?;
                }
            }
            writeln!(out).map_err(fmt_err)?;
        }

        if !report.exceptions.is_empty() {
            Self::section_header(&mut out, "EXCEPTIONS")?;
            for exception in &report.exceptions {
                writeln!(out, "{}", exception).map_err(fmt_err)?;
            }
        }

        Ok(out)
    }

    fn format_progress(&self, report: &Report) -> Result<String> {
        match last_stage_name(report) {
            Some(stage) => Ok(format!(
                "[{}/4] {} done - {} finding(s), {}",
                stages_reached(report),
                stage,
                report.blocking_factors.len(),
                report.status
            )),
            None => Ok(format!("[0/4] {} - {}", report.domain, report.status)),
        }
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("Error: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("Warning: {}", warning))
    }
}
