//! Data models and structures for the domain block checker

pub mod config;
pub mod report;
pub mod results;

// Re-export main model types
pub use config::{Config, OutputFormat};
pub use report::{Report, StageOutcome, StageOutput};
pub use results::{
    BlockingFactor, DnsDebugInfo, DnsResponseType, DnsResult, ExceptionRecord, HttpResult,
    IpAnalysis, TcpResult, TlsResult,
};
