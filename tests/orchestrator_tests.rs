//! Verdict and supersession tests over scripted probe suites
//!
//! No test here touches the network: every stage answer is canned.

use async_trait::async_trait;
use domain_blockcheck::{
    logging::StageLogger,
    models::{
        BlockingFactor, DnsResult, ExceptionRecord, HttpResult, IpAnalysis, StageOutcome,
        StageOutput, TcpResult, TlsResult,
    },
    ConnectionStatus, DiagnosticOrchestrator, DiagnosticSession, Phase, ProbeSuite, Report,
    Severity,
};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const DNS: usize = 0;
const TCP: usize = 1;
const TLS: usize = 2;
const HTTP: usize = 3;

/// Probe suite answering every stage from a script
struct Scripted {
    addresses: Vec<&'static str>,
    tcp: StageOutput<TcpResult>,
    tls: StageOutput<TlsResult>,
    http: StageOutput<HttpResult>,
    dns_delay: Duration,
    calls: [AtomicUsize; 4],
}

impl Scripted {
    /// Everything reachable and trusted
    fn healthy() -> Self {
        Self {
            addresses: vec!["93.184.216.34"],
            tcp: StageOutput::completed(open_ports()),
            tls: StageOutput::completed(trusted_tls()),
            http: StageOutput::completed(http_status(200, "OK")),
            dns_delay: Duration::ZERO,
            calls: Default::default(),
        }
    }

    fn calls(&self, stage: usize) -> usize {
        self.calls[stage].load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProbeSuite for Scripted {
    async fn dns(&self, _domain: &str) -> StageOutput<DnsResult> {
        self.calls[DNS].fetch_add(1, Ordering::SeqCst);
        if !self.dns_delay.is_zero() {
            tokio::time::sleep(self.dns_delay).await;
        }

        let mut output = StageOutput::completed(DnsResult {
            ip_addresses: self.addresses.iter().map(|ip| ip.parse().unwrap()).collect(),
            canonical_name: None,
            resolution_time_ms: 15,
            has_ipv6: false,
            ip_analysis: self.addresses.iter().map(|ip| IpAnalysis::new(ip, None)).collect(),
            debug_info: None,
        });
        if self.addresses.is_empty() {
            output = output.with_factor(BlockingFactor::new(
                "DNS Resolution Failed",
                Severity::Critical,
                "Domain could not be resolved",
            ));
        }
        output
    }

    async fn tcp(&self, _ip: IpAddr) -> StageOutput<TcpResult> {
        self.calls[TCP].fetch_add(1, Ordering::SeqCst);
        self.tcp.clone()
    }

    async fn tls(&self, _domain: &str) -> StageOutput<TlsResult> {
        self.calls[TLS].fetch_add(1, Ordering::SeqCst);
        self.tls.clone()
    }

    async fn http(&self, _domain: &str) -> StageOutput<HttpResult> {
        self.calls[HTTP].fetch_add(1, Ordering::SeqCst);
        self.http.clone()
    }
}

fn open_ports() -> TcpResult {
    TcpResult {
        port_443_open: true,
        port_80_open: true,
        latency_ms: 25,
        failure: None,
    }
}

fn trusted_tls() -> TlsResult {
    TlsResult {
        is_valid: true,
        issuer: "CN=R11, O=Let's Encrypt, C=US".to_string(),
        subject: "CN=example.com".to_string(),
        protocol: "TLSv1.3".to_string(),
        ..TlsResult::default()
    }
}

fn http_status(code: u16, message: &str) -> HttpResult {
    HttpResult {
        status_code: code,
        status_message: message.to_string(),
        server: None,
        content_type: None,
        response_time_ms: 80,
        block_header: None,
    }
}

async fn diagnose(suite: Arc<Scripted>) -> Report {
    DiagnosticOrchestrator::new(suite, StageLogger::quiet())
        .run("example.com", 1, |_| true)
        .await
        .expect("run was not superseded")
}

#[tokio::test]
async fn test_healthy_domain_is_not_blocked() {
    let suite = Arc::new(Scripted::healthy());
    let report = diagnose(suite.clone()).await;

    assert_eq!(report.status, ConnectionStatus::NotBlocked);
    assert!(report.blocking_factors.is_empty());
    assert!(report.exceptions.is_empty());
    assert!(report.completed_at.is_some());
    for stage in [DNS, TCP, TLS, HTTP] {
        assert_eq!(suite.calls(stage), 1);
    }
}

#[tokio::test]
async fn test_no_addresses_is_dns_blocked() {
    let suite = Arc::new(Scripted {
        addresses: vec![],
        ..Scripted::healthy()
    });
    let report = diagnose(suite.clone()).await;

    assert_eq!(report.status, ConnectionStatus::DnsBlocked);
    assert!(report.tcp.is_not_run());
    assert!(report.tls.is_not_run());
    assert!(report.http.is_not_run());
    assert_eq!(suite.calls(TCP), 0);
    assert_eq!(suite.calls(TLS), 0);
    assert_eq!(suite.calls(HTTP), 0);
    assert_eq!(report.factors_at_least(Severity::Critical).count(), 1);
}

#[tokio::test]
async fn test_any_blocked_address_is_dns_blocked() {
    // Public address first, sinkhole second: the whole answer is tainted
    let suite = Arc::new(Scripted {
        addresses: vec!["93.184.216.34", "127.0.0.1"],
        ..Scripted::healthy()
    });
    let report = diagnose(suite.clone()).await;

    assert_eq!(report.status, ConnectionStatus::DnsBlocked);
    assert_eq!(suite.calls(TCP), 0);
    let dns = report.dns.result().unwrap();
    assert!(dns.ip_analysis[1].is_blocked);
    assert!(!dns.ip_analysis[0].is_blocked);
}

#[tokio::test]
async fn test_dns_stage_failure_is_dns_blocked() {
    struct Unresolvable;

    #[async_trait]
    impl ProbeSuite for Unresolvable {
        async fn dns(&self, _domain: &str) -> StageOutput<DnsResult> {
            StageOutput::failed(ExceptionRecord::new(Phase::Dns, "Timeout", None))
        }
        async fn tcp(&self, _ip: IpAddr) -> StageOutput<TcpResult> {
            unreachable!("TCP must not run without an address")
        }
        async fn tls(&self, _domain: &str) -> StageOutput<TlsResult> {
            unreachable!("TLS must not run without an address")
        }
        async fn http(&self, _domain: &str) -> StageOutput<HttpResult> {
            unreachable!("HTTP must not run without an address")
        }
    }

    let report = DiagnosticOrchestrator::new(Arc::new(Unresolvable), StageLogger::quiet())
        .run("example.com", 1, |_| true)
        .await
        .unwrap();

    assert_eq!(report.status, ConnectionStatus::DnsBlocked);
    assert!(matches!(report.dns, StageOutcome::Failed(_)));
    assert_eq!(report.exceptions.len(), 1);
    assert_eq!(report.exceptions[0].to_string(), "[DNS] Timeout: No message");
}

#[tokio::test]
async fn test_closed_ports_are_firewall_blocked() {
    let suite = Arc::new(Scripted {
        tcp: StageOutput::completed(TcpResult {
            port_443_open: false,
            port_80_open: false,
            latency_ms: 0,
            failure: Some("SocketTimeoutException".to_string()),
        })
        .with_factor(BlockingFactor::new(
            "Port 443 Blocked",
            Severity::High,
            "HTTPS port is not reachable",
        )),
        ..Scripted::healthy()
    });
    let report = diagnose(suite.clone()).await;

    assert_eq!(report.status, ConnectionStatus::FirewallBlocked);
    assert!(report.tcp.is_completed());
    assert!(report.tls.is_not_run());
    assert_eq!(suite.calls(TLS), 0);
    assert_eq!(suite.calls(HTTP), 0);
}

#[tokio::test]
async fn test_port_80_alone_keeps_going() {
    let suite = Arc::new(Scripted {
        tcp: StageOutput::completed(TcpResult {
            port_443_open: false,
            port_80_open: true,
            latency_ms: 0,
            failure: Some("ConnectException".to_string()),
        }),
        ..Scripted::healthy()
    });
    let report = diagnose(suite.clone()).await;

    assert_eq!(suite.calls(TLS), 1);
    assert_eq!(report.status, ConnectionStatus::NotBlocked);
}

#[tokio::test]
async fn test_untrusted_tls_then_http_success_is_not_blocked() {
    let suite = Arc::new(Scripted {
        tls: StageOutput::completed(TlsResult::invalid()).with_factor(BlockingFactor::new(
            "SSL Handshake Failed",
            Severity::High,
            "Could not establish a trusted TLS session",
        )),
        ..Scripted::healthy()
    });
    let report = diagnose(suite).await;

    // The HTTP verdict replaces the TLS one
    assert_eq!(report.status, ConnectionStatus::NotBlocked);
    assert_eq!(report.blocking_factors.len(), 1);
}

#[tokio::test]
async fn test_untrusted_tls_then_http_failure_is_https_blocked() {
    let suite = Arc::new(Scripted {
        tls: StageOutput::completed(TlsResult::invalid()),
        http: StageOutput::completed(HttpResult::failed("SSLHandshakeException", 120)),
        ..Scripted::healthy()
    });
    let report = diagnose(suite).await;

    assert_eq!(report.status, ConnectionStatus::HttpsBlocked);
    assert_eq!(report.http.result().unwrap().status_code, 0);
}

#[tokio::test]
async fn test_untrusted_tls_without_http_result_is_ssl_blocked() {
    let suite = Arc::new(Scripted {
        tls: StageOutput::completed(TlsResult::invalid()),
        http: StageOutput::failed(ExceptionRecord::new(Phase::Http, "Interrupted", None)),
        ..Scripted::healthy()
    });
    let report = diagnose(suite).await;

    assert_eq!(report.status, ConnectionStatus::SslBlocked);
}

#[tokio::test]
async fn test_forbidden_response_is_https_blocked() {
    let suite = Arc::new(Scripted {
        http: StageOutput::completed(http_status(403, "Forbidden")),
        ..Scripted::healthy()
    });
    let report = diagnose(suite).await;

    assert_eq!(report.status, ConnectionStatus::HttpsBlocked);
}

#[tokio::test]
async fn test_redirect_status_counts_as_success() {
    let suite = Arc::new(Scripted {
        http: StageOutput::completed(http_status(302, "Found")),
        ..Scripted::healthy()
    });
    let report = diagnose(suite).await;

    assert_eq!(report.status, ConnectionStatus::NotBlocked);
}

#[tokio::test]
async fn test_factors_keep_stage_order() {
    let suite = Arc::new(Scripted {
        tcp: StageOutput::completed(open_ports()).with_factor(BlockingFactor::new(
            "Slow Connection",
            Severity::Low,
            "Connection latency is high",
        )),
        tls: StageOutput::completed(trusted_tls()).with_factor(BlockingFactor::new(
            "Possible Proxy/MITM",
            Severity::High,
            "Certificate issuer suggests interception",
        )),
        ..Scripted::healthy()
    });
    let report = diagnose(suite).await;

    let names: Vec<&str> = report.blocking_factors.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["Slow Connection", "Possible Proxy/MITM"]);
    assert_eq!(report.factors_at_least(Severity::High).count(), 1);
}

#[tokio::test]
async fn test_session_newer_run_wins() {
    let slow = Arc::new(Scripted {
        dns_delay: Duration::from_millis(300),
        ..Scripted::healthy()
    });
    let orchestrator = Arc::new(DiagnosticOrchestrator::new(slow, StageLogger::quiet()));
    let session = DiagnosticSession::new(orchestrator);
    let mut snapshots = session.subscribe();

    let first = session.run_diagnostic("first.example").unwrap();
    let second = session.run_diagnostic("second.example").unwrap();
    assert!(second > first);
    assert_eq!(session.generation(), second);

    let report = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            snapshots.changed().await.unwrap();
            let report = snapshots.borrow_and_update().clone();
            if report.status.is_terminal() {
                break report;
            }
        }
    })
    .await
    .expect("second run finished");

    assert_eq!(report.domain, "second.example");
    assert_eq!(report.status, ConnectionStatus::NotBlocked);

    // Nothing from the first run may show up afterwards
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(session.snapshot().domain, "second.example");
}

#[tokio::test]
async fn test_session_clear_drops_live_run() {
    let slow = Arc::new(Scripted {
        dns_delay: Duration::from_millis(200),
        ..Scripted::healthy()
    });
    let orchestrator = Arc::new(DiagnosticOrchestrator::new(slow, StageLogger::quiet()));
    let session = DiagnosticSession::new(orchestrator);

    session.run_diagnostic("example.com").unwrap();
    assert!(session.snapshot().is_loading());
    session.clear_results();

    tokio::time::sleep(Duration::from_millis(300)).await;
    let report = session.snapshot();
    assert_eq!(report.status, ConnectionStatus::Idle);
    assert_eq!(report.domain, "example.com");
}
