//! DNS stage: system resolution, address analysis and fault classification
//!
//! The live [`DnsStage`] wraps the system-configured resolver. Everything it
//! observes is handed to [`evaluate_resolution`], which turns a resolved
//! answer or a classified [`ResolveFault`] into a `DnsResult` plus findings
//! and exception records. The stage never returns an error.

pub mod classifier;

use crate::{
    error::{AppError, Result},
    logging::StageLogger,
    models::{
        BlockingFactor, DnsDebugInfo, DnsResponseType, DnsResult, ExceptionRecord, IpAnalysis,
        StageOutcome, StageOutput,
    },
    types::{Phase, Severity},
};
use regex::Regex;
use std::{
    net::IpAddr,
    sync::LazyLock,
    time::Instant,
};
use trust_dns_resolver::{
    config::{LookupIpStrategy, ResolverConfig, ResolverOpts},
    error::{ResolveError, ResolveErrorKind},
    proto::{error::ProtoErrorKind, rr::RecordType},
    system_conf, TokioAsyncResolver,
};

/// Well-known sinkhole answers: null route, loopback and RFC1918 ranges
static SINKHOLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(0\.0\.0\.0|127\.0\.0\.1|::1|10\.\d{1,3}\.\d{1,3}\.\d{1,3}|172\.(1[6-9]|2[0-9]|3[0-1])\.\d{1,3}\.\d{1,3}|192\.168\.\d{1,3}\.\d{1,3})$",
    )
    .expect("sinkhole pattern is a valid regex")
});

/// Whether `ip` matches one of the fixed sinkhole patterns
pub fn is_sinkhole_address(ip: &str) -> bool {
    SINKHOLE_PATTERN.is_match(ip)
}

/// Number of stack frames kept in the debug record
const STACK_EXCERPT_FRAMES: usize = 10;

/// One resolved address and its reverse name, if any
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAddress {
    pub ip: IpAddr,
    pub reverse_name: Option<String>,
}

/// What the resolver answered
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedAnswer {
    pub addresses: Vec<ResolvedAddress>,
    pub canonical_name: Option<String>,
}

/// Classified resolver fault
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveFault {
    /// The name does not exist
    NotFound { message: String },
    /// The resolver answered without any addresses
    NoData { message: String },
    Timeout { message: String },
    /// Transport-level failure talking to the resolver
    Socket { kind: String, message: String },
    /// The process may not open sockets
    PermissionDenied { message: String },
    /// Anything not matched above
    Other { kind: String, message: String },
}

impl ResolveFault {
    /// Exception kind tag recorded in the report
    pub fn kind(&self) -> &str {
        match self {
            Self::NotFound { .. } => "NoRecordsFound",
            Self::NoData { .. } => "NoData",
            Self::Timeout { .. } => "Timeout",
            Self::Socket { kind, .. } | Self::Other { kind, .. } => kind,
            Self::PermissionDenied { .. } => "PermissionDenied",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::NotFound { message }
            | Self::NoData { message }
            | Self::Timeout { message }
            | Self::Socket { message, .. }
            | Self::PermissionDenied { message }
            | Self::Other { message, .. } => message,
        }
    }

    /// DNS outcome type for this fault
    pub fn response_type(&self) -> DnsResponseType {
        match self {
            Self::NotFound { .. } => DnsResponseType::Nxdomain,
            Self::NoData { .. } => DnsResponseType::EmptyResponse,
            Self::Timeout { .. } => DnsResponseType::Timeout,
            Self::Socket { message, .. } => {
                let message = message.to_lowercase();
                if message.contains("unreachable") {
                    DnsResponseType::NetworkUnreachable
                } else if message.contains("refused") {
                    DnsResponseType::Refused
                } else {
                    DnsResponseType::Servfail
                }
            }
            Self::PermissionDenied { .. } => DnsResponseType::Refused,
            Self::Other { .. } => DnsResponseType::Unknown,
        }
    }

    /// The single CRITICAL finding for this fault; unknown faults have none
    fn finding(&self) -> Option<BlockingFactor> {
        let response_type = self.response_type();
        let factor = match self {
            Self::NotFound { .. } => BlockingFactor::new(
                "DNS Lookup Failed",
                Severity::Critical,
                "Domain does not exist or is blocked at DNS level",
            )
            .with_detail("NXDOMAIN or SERVFAIL response from DNS server"),
            Self::NoData { .. } => BlockingFactor::new(
                "DNS Lookup Failed",
                Severity::Critical,
                "DNS returned no addresses for the domain",
            )
            .with_detail(response_type.developer_hint()),
            Self::Timeout { .. } => BlockingFactor::new(
                "DNS Query Timeout",
                Severity::Critical,
                "DNS query timed out - Network level blocking",
            )
            .with_detail("No response from DNS server within timeout period"),
            Self::Socket { .. } => BlockingFactor::new(
                "DNS Network Error",
                Severity::Critical,
                response_type.description(),
            )
            .with_detail(response_type.developer_hint()),
            Self::PermissionDenied { .. } => BlockingFactor::new(
                "DNS Permission Denied",
                Severity::Critical,
                "Missing network permission blocked the DNS query",
            )
            .with_detail("Process may lack network access or a sandbox policy blocks DNS"),
            Self::Other { .. } => return None,
        };
        Some(factor)
    }
}

impl From<&ResolveError> for ResolveFault {
    fn from(error: &ResolveError) -> Self {
        let message = error.to_string();
        match error.kind() {
            // NXDOMAIN and NODATA both mean the host was not found
            ResolveErrorKind::NoRecordsFound { .. } => Self::NotFound { message },
            ResolveErrorKind::Timeout => Self::Timeout { message },
            ResolveErrorKind::Io(io_error)
                if io_error.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                Self::PermissionDenied { message }
            }
            ResolveErrorKind::Io(io_error) => Self::Socket {
                kind: format!("Io({:?})", io_error.kind()),
                message,
            },
            ResolveErrorKind::Proto(proto) if matches!(proto.kind(), ProtoErrorKind::Timeout) => {
                Self::Timeout { message }
            }
            ResolveErrorKind::Proto(_) => Self::Socket {
                kind: "Proto".to_string(),
                message,
            },
            ResolveErrorKind::NoConnections => Self::Socket {
                kind: "NoConnections".to_string(),
                message,
            },
            _ => Self::Other {
                kind: "ResolveError".to_string(),
                message,
            },
        }
    }
}

/// A fault plus the call stack captured where it was caught
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveFailure {
    pub fault: ResolveFault,
    pub stack_excerpt: Vec<String>,
}

impl ResolveFailure {
    /// Wrap `fault` and capture the current call stack
    pub fn capture(fault: ResolveFault) -> Self {
        Self {
            fault,
            stack_excerpt: capture_stack_excerpt(STACK_EXCERPT_FRAMES),
        }
    }
}

/// Top `frames` symbol names of the current call stack
pub fn capture_stack_excerpt(frames: usize) -> Vec<String> {
    let backtrace = std::backtrace::Backtrace::force_capture().to_string();
    parse_backtrace_frames(&backtrace, frames)
}

/// Frame lines look like `  12: symbol::name`; location lines are skipped
fn parse_backtrace_frames(backtrace: &str, frames: usize) -> Vec<String> {
    backtrace
        .lines()
        .filter_map(|line| {
            let (index, symbol) = line.trim_start().split_once(": ")?;
            if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            Some(format!("at {}", symbol.trim()))
        })
        .take(frames)
        .collect()
}

/// Turn a resolver observation into the DNS stage output
pub fn evaluate_resolution(
    domain: &str,
    outcome: std::result::Result<ResolvedAnswer, ResolveFailure>,
    elapsed_ms: u64,
    resolver: &str,
) -> StageOutput<DnsResult> {
    match outcome {
        Ok(answer) if answer.addresses.is_empty() => evaluate_failure(
            domain,
            ResolveFailure {
                fault: ResolveFault::NoData {
                    message: format!("No addresses returned for {}", domain),
                },
                stack_excerpt: Vec::new(),
            },
            elapsed_ms,
            resolver,
        ),
        Ok(answer) => evaluate_answer(domain, answer, elapsed_ms, resolver),
        Err(failure) => evaluate_failure(domain, failure, elapsed_ms, resolver),
    }
}

fn evaluate_answer(
    domain: &str,
    answer: ResolvedAnswer,
    elapsed_ms: u64,
    resolver: &str,
) -> StageOutput<DnsResult> {
    let ips: Vec<String> = answer.addresses.iter().map(|a| a.ip.to_string()).collect();
    let response_type = if ips.iter().any(|ip| is_sinkhole_address(ip)) {
        DnsResponseType::BlockedIpReturned
    } else {
        DnsResponseType::Success
    };

    let mut factors = Vec::new();
    let ip_analysis: Vec<IpAnalysis> = answer
        .addresses
        .iter()
        .zip(&ips)
        .map(|(address, ip)| {
            let analysis = IpAnalysis::new(ip, address.reverse_name.clone());
            if let Some(reason) = &analysis.block_reason {
                factors.push(
                    BlockingFactor::new("Blocked IP Detected", Severity::Critical, reason.clone())
                        .with_detail(format!(
                            "IP: {} classified as {}",
                            ip,
                            analysis.ip_class.description()
                        )),
                );
            }
            analysis
        })
        .collect();

    if elapsed_ms > crate::defaults::DNS_SLOW_THRESHOLD_MS {
        factors.push(
            BlockingFactor::new(
                "Slow DNS Resolution",
                Severity::Low,
                format!("DNS took {}ms - May indicate DNS filtering", elapsed_ms),
            )
            .with_detail("Normal DNS resolution is typically under 100ms"),
        );
    }

    let address_count = ips.len();
    let result = DnsResult {
        has_ipv6: answer.addresses.iter().any(|a| a.ip.is_ipv6()),
        ip_addresses: answer.addresses.iter().map(|a| a.ip).collect(),
        canonical_name: answer.canonical_name,
        resolution_time_ms: elapsed_ms,
        ip_analysis,
        debug_info: Some(DnsDebugInfo {
            query_domain: domain.to_string(),
            query_time_ms: elapsed_ms,
            resolved: true,
            exception_kind: None,
            exception_message: None,
            stack_excerpt: Vec::new(),
            response_type,
            resolver: Some(format!("{} returned {} address(es)", resolver, address_count)),
        }),
    };

    StageOutput {
        outcome: StageOutcome::Completed(result),
        factors,
        exceptions: Vec::new(),
    }
}

fn evaluate_failure(
    domain: &str,
    failure: ResolveFailure,
    elapsed_ms: u64,
    resolver: &str,
) -> StageOutput<DnsResult> {
    let fault = failure.fault;
    let response_type = fault.response_type();

    let result = DnsResult {
        ip_addresses: Vec::new(),
        canonical_name: None,
        resolution_time_ms: elapsed_ms,
        has_ipv6: false,
        ip_analysis: Vec::new(),
        debug_info: Some(DnsDebugInfo {
            query_domain: domain.to_string(),
            query_time_ms: elapsed_ms,
            resolved: false,
            exception_kind: Some(fault.kind().to_string()),
            exception_message: Some(fault.message().to_string()),
            stack_excerpt: failure.stack_excerpt,
            response_type,
            resolver: Some(resolver.to_string()),
        }),
    };

    let mut output = StageOutput::completed(result).with_exception(ExceptionRecord::new(
        Phase::Dns,
        fault.kind(),
        Some(fault.message().to_string()),
    ));
    if let Some(factor) = fault.finding() {
        output = output.with_factor(factor);
    }
    output
}

/// Live DNS stage backed by the system resolver configuration
pub struct DnsStage {
    resolver: TokioAsyncResolver,
    description: String,
    logger: StageLogger,
}

impl DnsStage {
    /// Build a resolver from the system configuration
    pub fn from_system(logger: StageLogger) -> Result<Self> {
        let (config, opts) = system_conf::read_system_conf().map_err(|e| {
            AppError::dns_resolution(format!("Failed to read system DNS config: {}", e))
        })?;
        Ok(Self::with_config(config, opts, logger))
    }

    /// Build a resolver for explicit name servers
    ///
    /// A and AAAA are always both queried so every address reaches the
    /// analysis.
    pub fn with_config(config: ResolverConfig, mut opts: ResolverOpts, logger: StageLogger) -> Self {
        opts.timeout = crate::defaults::DNS_QUERY_TIMEOUT;
        opts.attempts = crate::defaults::DNS_QUERY_ATTEMPTS;
        opts.ip_strategy = LookupIpStrategy::Ipv4AndIpv6;

        let servers: Vec<String> = config
            .name_servers()
            .iter()
            .map(|ns| ns.socket_addr.to_string())
            .collect();
        let description = if servers.is_empty() {
            "system resolver".to_string()
        } else {
            format!("system resolver ({})", servers.join(", "))
        };

        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
            description,
            logger,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Resolve `domain`; faults are folded into the returned output
    pub async fn resolve(&self, domain: &str) -> StageOutput<DnsResult> {
        let start = Instant::now();
        let lookup = self.resolver.lookup_ip(domain).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let outcome = match lookup {
            Ok(lookup) => {
                let canonical_name = lookup
                    .as_lookup()
                    .records()
                    .iter()
                    .find(|record| {
                        matches!(record.record_type(), RecordType::A | RecordType::AAAA)
                    })
                    .map(|record| record.name().to_utf8().trim_end_matches('.').to_string())
                    .or_else(|| Some(domain.trim_end_matches('.').to_string()));

                let mut addresses = Vec::new();
                for ip in lookup.iter() {
                    addresses.push(ResolvedAddress {
                        ip,
                        reverse_name: self.reverse_name(ip).await,
                    });
                }
                Ok(ResolvedAnswer {
                    addresses,
                    canonical_name,
                })
            }
            Err(error) => Err(ResolveFailure::capture(ResolveFault::from(&error))),
        };

        let output = evaluate_resolution(domain, outcome, elapsed_ms, &self.description);
        if let Some(result) = output.outcome.result() {
            let response_type = result
                .debug_info
                .as_ref()
                .map(|debug| debug.response_type)
                .unwrap_or(DnsResponseType::Unknown);
            self.logger
                .dns_resolution(domain, response_type, result.ip_addresses.len(), elapsed_ms)
                .await;
        }
        output
    }

    /// Best-effort PTR lookup; any failure means no name
    async fn reverse_name(&self, ip: IpAddr) -> Option<String> {
        let lookup = tokio::time::timeout(
            crate::defaults::REVERSE_LOOKUP_TIMEOUT,
            self.resolver.reverse_lookup(ip),
        )
        .await
        .ok()?
        .ok()?;
        lookup
            .iter()
            .next()
            .map(|name| name.to_utf8().trim_end_matches('.').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::classifier::IpClass;
    use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
    use tokio::net::UdpSocket;
    use trust_dns_resolver::config::NameServerConfigGroup;
    use trust_dns_resolver::proto::op::{Message, MessageType, OpCode, ResponseCode};
    use trust_dns_resolver::proto::rr::rdata::{A, AAAA};
    use trust_dns_resolver::proto::rr::{RData, Record};

    fn answer(ips: &[&str]) -> ResolvedAnswer {
        ResolvedAnswer {
            addresses: ips
                .iter()
                .map(|ip| ResolvedAddress {
                    ip: ip.parse().unwrap(),
                    reverse_name: None,
                })
                .collect(),
            canonical_name: Some("example.com".to_string()),
        }
    }

    fn failure(fault: ResolveFault) -> ResolveFailure {
        ResolveFailure {
            fault,
            stack_excerpt: vec!["at frame".to_string()],
        }
    }

    fn result_of(output: &StageOutput<DnsResult>) -> &DnsResult {
        output.outcome.result().expect("dns stage always completes")
    }

    #[test]
    fn test_sinkhole_pattern() {
        for ip in ["0.0.0.0", "127.0.0.1", "::1", "10.1.2.3", "172.16.0.1", "172.31.9.9", "192.168.0.10"] {
            assert!(is_sinkhole_address(ip), "{}", ip);
        }
        for ip in ["8.8.8.8", "172.32.0.1", "127.0.0.2", "169.254.1.1", "2001:db8::1"] {
            assert!(!is_sinkhole_address(ip), "{}", ip);
        }
    }

    #[test]
    fn test_successful_answer() {
        let output = evaluate_resolution(
            "example.com",
            Ok(answer(&["93.184.216.34", "2606:2800:220:1::1"])),
            40,
            "system resolver",
        );
        let result = result_of(&output);
        assert_eq!(result.ip_addresses.len(), 2);
        assert!(result.has_ipv6);
        assert_eq!(result.canonical_name.as_deref(), Some("example.com"));
        assert!(output.factors.is_empty());
        assert!(output.exceptions.is_empty());

        let debug = result.debug_info.as_ref().unwrap();
        assert!(debug.resolved);
        assert_eq!(debug.response_type, DnsResponseType::Success);
        assert_eq!(debug.resolver.as_deref(), Some("system resolver returned 2 address(es)"));
    }

    #[test]
    fn test_slow_resolution_threshold() {
        let slow = evaluate_resolution("example.com", Ok(answer(&["8.8.8.8"])), 501, "r");
        assert_eq!(slow.factors.len(), 1);
        assert_eq!(slow.factors[0].severity, Severity::Low);
        assert_eq!(slow.factors[0].description, "DNS took 501ms - May indicate DNS filtering");

        let fast = evaluate_resolution("example.com", Ok(answer(&["8.8.8.8"])), 499, "r");
        assert!(fast.factors.is_empty());

        let edge = evaluate_resolution("example.com", Ok(answer(&["8.8.8.8"])), 500, "r");
        assert!(edge.factors.is_empty());
    }

    #[test]
    fn test_blocked_ip_findings() {
        let output = evaluate_resolution(
            "ads.example.com",
            Ok(answer(&["0.0.0.0", "8.8.8.8", "10.0.0.1"])),
            10,
            "r",
        );
        let result = result_of(&output);
        assert!(result.has_blocked_ip());
        assert_eq!(
            result.debug_info.as_ref().unwrap().response_type,
            DnsResponseType::BlockedIpReturned
        );
        assert_eq!(output.factors.len(), 2);
        assert!(output.factors.iter().all(|f| f.name == "Blocked IP Detected"));
        assert_eq!(
            output.factors[0].technical_detail.as_deref(),
            Some("IP: 0.0.0.0 classified as Null/Blocked (0.0.0.0)")
        );
        assert_eq!(result.ip_analysis[2].ip_class, IpClass::PrivateA);
    }

    #[test]
    fn test_link_local_blocked_but_not_sinkhole() {
        let output = evaluate_resolution("x.example", Ok(answer(&["169.254.3.3"])), 10, "r");
        let result = result_of(&output);
        assert!(result.has_blocked_ip());
        assert_eq!(
            result.debug_info.as_ref().unwrap().response_type,
            DnsResponseType::Success
        );
    }

    #[test]
    fn test_empty_answer() {
        let output = evaluate_resolution("example.com", Ok(ResolvedAnswer::default()), 12, "r");
        let result = result_of(&output);
        assert!(result.ip_addresses.is_empty());
        assert_eq!(
            result.debug_info.as_ref().unwrap().response_type,
            DnsResponseType::EmptyResponse
        );
        assert_eq!(output.factors.len(), 1);
        assert_eq!(output.exceptions.len(), 1);
    }

    #[test]
    fn test_not_found_failure() {
        let output = evaluate_resolution(
            "nonexistent.invalid",
            Err(failure(ResolveFault::NotFound {
                message: "no record found".to_string(),
            })),
            33,
            "r",
        );
        let result = result_of(&output);
        assert!(result.ip_addresses.is_empty());
        let debug = result.debug_info.as_ref().unwrap();
        assert!(!debug.resolved);
        assert_eq!(debug.query_domain, "nonexistent.invalid");
        assert_eq!(debug.query_time_ms, 33);
        assert_eq!(debug.response_type, DnsResponseType::Nxdomain);
        assert_eq!(debug.exception_kind.as_deref(), Some("NoRecordsFound"));
        assert_eq!(debug.stack_excerpt, vec!["at frame".to_string()]);

        assert_eq!(output.factors.len(), 1);
        assert_eq!(output.factors[0].name, "DNS Lookup Failed");
        assert_eq!(output.factors[0].severity, Severity::Critical);
        assert_eq!(output.exceptions[0].phase, Phase::Dns);
    }

    #[test]
    fn test_timeout_failure() {
        let output = evaluate_resolution(
            "example.com",
            Err(failure(ResolveFault::Timeout {
                message: "request timed out".to_string(),
            })),
            5000,
            "r",
        );
        assert_eq!(output.factors.len(), 1);
        assert_eq!(output.factors[0].name, "DNS Query Timeout");
    }

    #[test]
    fn test_socket_failure_refinement() {
        let cases = [
            ("Network is unreachable (os error 101)", DnsResponseType::NetworkUnreachable),
            ("Connection refused (os error 111)", DnsResponseType::Refused),
            ("broken pipe", DnsResponseType::Servfail),
        ];
        for (message, expected) in cases {
            let fault = ResolveFault::Socket {
                kind: "Io".to_string(),
                message: message.to_string(),
            };
            assert_eq!(fault.response_type(), expected);

            let output = evaluate_resolution("example.com", Err(failure(fault)), 1, "r");
            assert_eq!(output.factors.len(), 1);
            assert_eq!(output.factors[0].name, "DNS Network Error");
            assert_eq!(output.factors[0].description, expected.description());
        }
    }

    #[test]
    fn test_permission_failure() {
        let output = evaluate_resolution(
            "example.com",
            Err(failure(ResolveFault::PermissionDenied {
                message: "Permission denied".to_string(),
            })),
            1,
            "r",
        );
        let debug = result_of(&output).debug_info.clone().unwrap();
        assert_eq!(debug.response_type, DnsResponseType::Refused);
        assert_eq!(output.factors[0].name, "DNS Permission Denied");
    }

    #[test]
    fn test_unknown_failure_has_exception_only() {
        let output = evaluate_resolution(
            "example.com",
            Err(failure(ResolveFault::Other {
                kind: "ResolveError".to_string(),
                message: "weird".to_string(),
            })),
            1,
            "r",
        );
        assert!(output.factors.is_empty());
        assert_eq!(output.exceptions.len(), 1);
        assert_eq!(output.exceptions[0].kind, "ResolveError");
        assert_eq!(
            result_of(&output).debug_info.as_ref().unwrap().response_type,
            DnsResponseType::Unknown
        );
        assert!(matches!(output.outcome, StageOutcome::Completed(_)));
    }

    #[test]
    fn test_resolve_error_mapping() {
        let timeout = ResolveError::from(ResolveErrorKind::Timeout);
        assert!(matches!(ResolveFault::from(&timeout), ResolveFault::Timeout { .. }));

        let io = ResolveError::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert!(matches!(ResolveFault::from(&io), ResolveFault::PermissionDenied { .. }));

        let msg = ResolveError::from("something odd");
        assert!(matches!(ResolveFault::from(&msg), ResolveFault::Other { .. }));
    }

    /// Answers A and AAAA for `dual.example`, NODATA for `empty.example`
    /// and NXDOMAIN for everything else
    fn answer_query(query: &Message) -> Message {
        let mut reply = Message::new();
        reply
            .set_id(query.id())
            .set_message_type(MessageType::Response)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(query.recursion_desired())
            .set_recursion_available(true);
        reply.add_queries(query.queries().to_vec());

        let mut code = ResponseCode::NoError;
        for question in query.queries() {
            let name = question.name().to_utf8();
            match (name.trim_end_matches('.'), question.query_type()) {
                ("dual.example", RecordType::A) => {
                    reply.add_answer(Record::from_rdata(
                        question.name().clone(),
                        60,
                        RData::A(A(Ipv4Addr::new(93, 184, 216, 34))),
                    ));
                }
                ("dual.example", RecordType::AAAA) => {
                    reply.add_answer(Record::from_rdata(
                        question.name().clone(),
                        60,
                        RData::AAAA(AAAA(Ipv6Addr::LOCALHOST)),
                    ));
                }
                ("dual.example" | "empty.example", _) => {}
                _ => code = ResponseCode::NXDomain,
            }
        }
        reply.set_response_code(code);
        reply
    }

    async fn spawn_name_server() -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            while let Ok((len, peer)) = socket.recv_from(&mut buf).await {
                let Ok(query) = Message::from_vec(&buf[..len]) else {
                    continue;
                };
                if let Ok(bytes) = answer_query(&query).to_vec() {
                    let _ = socket.send_to(&bytes, peer).await;
                }
            }
        });
        addr
    }

    fn local_stage(server: SocketAddr) -> DnsStage {
        let servers = NameServerConfigGroup::from_ips_clear(&[server.ip()], server.port(), true);
        DnsStage::with_config(
            ResolverConfig::from_parts(None, vec![], servers),
            ResolverOpts::default(),
            StageLogger::quiet(),
        )
    }

    #[tokio::test]
    async fn test_resolve_collects_both_address_families() {
        let server = spawn_name_server().await;
        let output = local_stage(server).resolve("dual.example").await;
        let result = result_of(&output);

        assert!(result.ip_addresses.contains(&"93.184.216.34".parse().unwrap()));
        assert!(result.ip_addresses.contains(&"::1".parse().unwrap()));
        assert!(result.has_ipv6);
        assert!(result.has_blocked_ip());
        assert_eq!(
            result.debug_info.as_ref().unwrap().response_type,
            DnsResponseType::BlockedIpReturned
        );
        assert!(output.factors.iter().any(|f| f.name == "Blocked IP Detected"));
    }

    #[tokio::test]
    async fn test_resolve_missing_host_is_nxdomain() {
        let server = spawn_name_server().await;
        let stage = local_stage(server);

        for domain in ["missing.example", "empty.example"] {
            let output = stage.resolve(domain).await;
            let debug = result_of(&output).debug_info.clone().unwrap();
            assert!(!debug.resolved, "{}", domain);
            assert_eq!(debug.response_type, DnsResponseType::Nxdomain, "{}", domain);
            assert_eq!(debug.exception_kind.as_deref(), Some("NoRecordsFound"));
            assert_eq!(output.factors.len(), 1);
            assert_eq!(output.factors[0].name, "DNS Lookup Failed");
        }
    }

    #[test]
    fn test_backtrace_parsing() {
        let sample = "   0: std::backtrace::Backtrace::create\n             at /rustc/src/backtrace.rs:331:13\n   1: domain_blockcheck::dns::capture\n   2: main\n";
        let frames = parse_backtrace_frames(sample, 2);
        assert_eq!(
            frames,
            vec![
                "at std::backtrace::Backtrace::create".to_string(),
                "at domain_blockcheck::dns::capture".to_string()
            ]
        );
        assert!(capture_stack_excerpt(10).len() <= 10);
    }
}
