//! Per-stage result records, findings and exception records

use crate::dns::classifier::IpClass;
use crate::types::{Phase, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Aggregate outcome of a DNS query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DnsResponseType {
    Success,
    Nxdomain,
    Servfail,
    Refused,
    Timeout,
    NetworkUnreachable,
    EmptyResponse,
    BlockedIpReturned,
    Unknown,
}

impl DnsResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Nxdomain => "NXDOMAIN",
            Self::Servfail => "SERVFAIL",
            Self::Refused => "REFUSED",
            Self::Timeout => "TIMEOUT",
            Self::NetworkUnreachable => "NETWORK_UNREACHABLE",
            Self::EmptyResponse => "EMPTY_RESPONSE",
            Self::BlockedIpReturned => "BLOCKED_IP_RETURNED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Short description shown next to the type
    pub fn description(&self) -> &'static str {
        match self {
            Self::Success => "Resolved successfully",
            Self::Nxdomain => "Domain does not exist",
            Self::Servfail => "Server failure",
            Self::Refused => "Query refused",
            Self::Timeout => "Query timed out",
            Self::NetworkUnreachable => "Network unreachable",
            Self::EmptyResponse => "Empty response",
            Self::BlockedIpReturned => "Blocked IP returned",
            Self::Unknown => "Unknown",
        }
    }

    /// What the outcome usually means when diagnosing a block
    pub fn developer_hint(&self) -> &'static str {
        match self {
            Self::Success => "DNS query returned valid IP addresses",
            Self::Nxdomain => {
                "DNS server responded that domain doesn't exist - Could be DNS-level blocking via null zone"
            }
            Self::Servfail => "DNS server encountered an error - Could indicate upstream blocking",
            Self::Refused => "DNS server refused to answer - Explicit blocking by DNS provider",
            Self::Timeout => "No response from DNS server - Network level blocking or DNS server down",
            Self::NetworkUnreachable => "Cannot reach DNS server - Check network connectivity",
            Self::EmptyResponse => "DNS returned no records - Possible NODATA response or blocking",
            Self::BlockedIpReturned => {
                "DNS returned sinkhole IP (0.0.0.0, 127.0.0.1, etc.) - Ad blocker active"
            }
            Self::Unknown => "Unexpected error during DNS resolution",
        }
    }
}

impl fmt::Display for DnsResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Developer-facing detail about how a DNS query went
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsDebugInfo {
    pub query_domain: String,
    pub query_time_ms: u64,
    pub resolved: bool,
    pub exception_kind: Option<String>,
    pub exception_message: Option<String>,
    /// Top call-stack frames captured on failure
    pub stack_excerpt: Vec<String>,
    pub response_type: DnsResponseType,
    /// Which resolver configuration answered
    pub resolver: Option<String>,
}

/// Classification of one resolved address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpAnalysis {
    pub ip: String,
    pub ip_class: IpClass,
    pub is_private: bool,
    pub is_blocked: bool,
    pub reverse_dns: Option<String>,
    pub block_reason: Option<String>,
}

impl IpAnalysis {
    /// Analyse `ip` with an optional reverse lookup name
    pub fn new(ip: &str, reverse_dns: Option<String>) -> Self {
        let ip_class = crate::dns::classifier::classify_ip(ip);
        Self {
            ip: ip.to_string(),
            ip_class,
            is_private: ip_class.is_private(),
            is_blocked: ip_class.is_blocked(),
            reverse_dns,
            block_reason: ip_class.block_reason().map(str::to_string),
        }
    }
}

/// Result of the DNS stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsResult {
    /// Addresses in resolver order
    pub ip_addresses: Vec<IpAddr>,
    pub canonical_name: Option<String>,
    pub resolution_time_ms: u64,
    pub has_ipv6: bool,
    pub ip_analysis: Vec<IpAnalysis>,
    pub debug_info: Option<DnsDebugInfo>,
}

impl DnsResult {
    /// True when any analysed address is a blocked class
    pub fn has_blocked_ip(&self) -> bool {
        self.ip_analysis.iter().any(|analysis| analysis.is_blocked)
    }

    pub fn first_address(&self) -> Option<IpAddr> {
        self.ip_addresses.first().copied()
    }
}

/// Result of the TCP stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcpResult {
    pub port_443_open: bool,
    pub port_80_open: bool,
    /// Connect latency on port 443; zero unless that port connected
    pub latency_ms: u64,
    /// Failure tag of the port 443 probe
    pub failure: Option<String>,
}

impl TcpResult {
    pub fn any_port_open(&self) -> bool {
        self.port_443_open || self.port_80_open
    }
}

/// Result of the TLS stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TlsResult {
    pub is_valid: bool,
    pub issuer: String,
    pub subject: String,
    pub protocol: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub subject_alt_names: Vec<String>,
    pub is_self_signed: bool,
    /// Issuer looks like interception infrastructure
    pub issuer_mismatch: bool,
}

impl TlsResult {
    /// Record for a handshake that ran and did not produce a trusted peer
    pub fn invalid() -> Self {
        Self::default()
    }
}

/// Result of the HTTP stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResult {
    /// 0 when the request never completed
    pub status_code: u16,
    pub status_message: String,
    pub server: Option<String>,
    pub content_type: Option<String>,
    pub response_time_ms: u64,
    pub block_header: Option<String>,
}

impl HttpResult {
    /// Sentinel for a request that did not complete
    pub fn failed<S: Into<String>>(message: S, response_time_ms: u64) -> Self {
        Self {
            status_code: 0,
            status_message: message.into(),
            server: None,
            content_type: None,
            response_time_ms,
            block_header: None,
        }
    }

    /// 200 through 399
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status_code)
    }
}

/// One piece of evidence that the connection is interfered with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingFactor {
    pub name: String,
    pub detected: bool,
    pub severity: Severity,
    pub description: String,
    pub technical_detail: Option<String>,
}

impl BlockingFactor {
    pub fn new<N, D>(name: N, severity: Severity, description: D) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Self {
            name: name.into(),
            detected: true,
            severity,
            description: description.into(),
            technical_detail: None,
        }
    }

    pub fn with_detail<S: Into<String>>(mut self, detail: S) -> Self {
        self.technical_detail = Some(detail.into());
        self
    }
}

/// A fault caught at a stage boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionRecord {
    pub kind: String,
    pub message: Option<String>,
    pub phase: Phase,
}

impl ExceptionRecord {
    pub fn new<K: Into<String>>(phase: Phase, kind: K, message: Option<String>) -> Self {
        Self {
            kind: kind.into(),
            message,
            phase,
        }
    }
}

impl fmt::Display for ExceptionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.phase.tag(),
            self.kind,
            self.message.as_deref().unwrap_or("No message")
        )
    }
}
