//! Domain Blockcheck
//!
//! A layered reachability diagnostic that walks a domain through DNS
//! resolution, TCP connect, TLS handshake and an HTTPS request, and
//! attributes any failure to the layer where the connection is interfered
//! with: DNS sinkholing, firewall filtering, TLS interception or HTTP
//! filtering.

pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod diagnostics;
pub mod dns;
pub mod error;
pub mod logging;
pub mod models;
pub mod output;
pub mod tcp;
pub mod tls;
pub mod types;

// Re-export commonly used types
pub use app::{DiagnosticSession, Notification};
pub use diagnostics::{DiagnosticOrchestrator, LiveProbes, ProbeSuite};
pub use error::{AppError, Result};
pub use models::{Config, Report, StageOutcome, StageOutput};
pub use output::{ColoredFormatter, OutputFormatter, PlainFormatter};
pub use types::{ConnectionStatus, Phase, Severity};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
/// Version line for `--version` with build details
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (built ",
    env!("BUILD_TIME"),
    ", ",
    env!("TARGET_TRIPLE"),
    ")"
);

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_DOMAIN: &str = "google.com";
    pub const DEFAULT_ENABLE_COLOR: bool = true;

    pub const TCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
    pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
    /// Upper bound accepted for any configured timeout
    pub const MAX_TIMEOUT_SECS: u64 = 60;

    pub const DNS_QUERY_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DNS_QUERY_ATTEMPTS: usize = 2;
    pub const REVERSE_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

    /// Resolution slower than this raises a finding
    pub const DNS_SLOW_THRESHOLD_MS: u64 = 500;
    /// Port 443 connects slower than this raise a finding
    pub const TCP_SLOW_THRESHOLD_MS: u64 = 300;

    /// Certificate name width in the card view
    pub const CARD_TRUNCATE: usize = 60;
    /// Certificate name width in the share text
    pub const SHARE_TRUNCATE: usize = 80;
    pub const SAN_DISPLAY_LIMIT: usize = 5;
}
