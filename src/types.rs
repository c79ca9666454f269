//! Type definitions and aliases

use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Overall connection status of a diagnostic run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    /// No run has been issued yet
    Idle,
    /// A run is in flight
    Loading,
    /// Every reached layer answered normally
    NotBlocked,
    /// Resolution failed or returned a sinkhole address
    DnsBlocked,
    /// Neither port 443 nor port 80 accepted a connection
    FirewallBlocked,
    /// The TLS handshake ran and the certificate was not accepted
    SslBlocked,
    /// The HTTPS request failed or answered with an error status
    HttpsBlocked,
    /// Reserved for timeouts surfaced as a status of their own
    Timeout,
    /// Reserved for positive interception verdicts
    MitmDetected,
    /// Reserved for runs that ended without a classification
    UnknownError,
}

impl ConnectionStatus {
    /// Screaming-case name used in text reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Loading => "LOADING",
            Self::NotBlocked => "NOT_BLOCKED",
            Self::DnsBlocked => "DNS_BLOCKED",
            Self::FirewallBlocked => "FIREWALL_BLOCKED",
            Self::SslBlocked => "SSL_BLOCKED",
            Self::HttpsBlocked => "HTTPS_BLOCKED",
            Self::Timeout => "TIMEOUT",
            Self::MitmDetected => "MITM_DETECTED",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Short label for status badges
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Ready",
            Self::Loading => "Checking...",
            Self::NotBlocked => "Accessible",
            Self::DnsBlocked => "DNS Blocked",
            Self::FirewallBlocked => "Firewall Blocked",
            Self::SslBlocked => "SSL Blocked",
            Self::HttpsBlocked => "HTTPS Blocked",
            Self::Timeout => "Timeout",
            Self::MitmDetected => "MITM Detected",
            Self::UnknownError => "Unknown Error",
        }
    }

    /// True once a run has reached a final verdict
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Idle | Self::Loading)
    }

    /// True for every terminal status except `NotBlocked`
    pub fn is_blocked(&self) -> bool {
        self.is_terminal() && *self != Self::NotBlocked
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity attached to a blocking factor by fixed policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Definite blocking indicator
    Critical,
    /// Strong indicator
    High,
    /// Moderate indicator
    Medium,
    /// Weak indicator
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline phase that produced an exception record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Dns,
    TcpHttps,
    TcpHttp,
    Tls,
    Http,
}

impl Phase {
    /// Phase tag as shown in reports
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Dns => "DNS",
            Self::TcpHttps => "TCP:443",
            Self::TcpHttp => "TCP:80",
            Self::Tls => "SSL",
            Self::Http => "HTTP",
        }
    }

    /// Phase of a TCP probe against `port`
    pub fn for_port(port: u16) -> Self {
        if port == 80 {
            Self::TcpHttp
        } else {
            Self::TcpHttps
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
