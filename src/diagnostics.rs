//! Diagnostic orchestration
//!
//! Runs the probe stages strictly in sequence, DNS then TCP then TLS then
//! HTTP, short-circuiting when a lower layer already explains the failure.
//! A snapshot of the cumulative report is published after every stage
//! boundary so observers can render partial progress.

use crate::{
    client::HttpsProbe,
    dns::DnsStage,
    error::Result,
    logging::StageLogger,
    models::{
        Config, DnsResult, HttpResult, Report, StageOutcome, StageOutput, TcpResult, TlsResult,
    },
    tcp::TcpStage,
    tls::TlsStage,
    types::ConnectionStatus,
};
use async_trait::async_trait;
use chrono::Utc;
use std::net::IpAddr;
use std::sync::Arc;

/// The four probe stages a run drives
///
/// Implementations fold every expected fault into the returned output and
/// never fail outright.
#[async_trait]
pub trait ProbeSuite: Send + Sync {
    async fn dns(&self, domain: &str) -> StageOutput<DnsResult>;

    /// Connect probes against one resolved address
    async fn tcp(&self, ip: IpAddr) -> StageOutput<TcpResult>;

    async fn tls(&self, domain: &str) -> StageOutput<TlsResult>;

    async fn http(&self, domain: &str) -> StageOutput<HttpResult>;
}

/// Probe stages that talk to the network
pub struct LiveProbes {
    dns: DnsStage,
    tcp: TcpStage,
    tls: TlsStage,
    http: HttpsProbe,
}

impl LiveProbes {
    /// Build every stage from the configured timeouts
    pub fn from_config(config: &Config, logger: StageLogger) -> Result<Self> {
        Ok(Self {
            dns: DnsStage::from_system(logger.clone())?,
            tcp: TcpStage::new(config.tcp_timeout(), logger.clone()),
            tls: TlsStage::new(config.tls_timeout(), logger.clone())?,
            http: HttpsProbe::new(config.http_timeout(), logger)?,
        })
    }

    pub fn resolver_description(&self) -> &str {
        self.dns.description()
    }
}

#[async_trait]
impl ProbeSuite for LiveProbes {
    async fn dns(&self, domain: &str) -> StageOutput<DnsResult> {
        self.dns.resolve(domain).await
    }

    async fn tcp(&self, ip: IpAddr) -> StageOutput<TcpResult> {
        self.tcp.probe(ip).await
    }

    async fn tls(&self, domain: &str) -> StageOutput<TlsResult> {
        self.tls.inspect(domain).await
    }

    async fn http(&self, domain: &str) -> StageOutput<HttpResult> {
        self.http.check(domain).await
    }
}

/// Drives one diagnostic run over a probe suite
pub struct DiagnosticOrchestrator {
    probes: Arc<dyn ProbeSuite>,
    logger: StageLogger,
}

/// Cumulative state of a run in flight
struct RunState<'a> {
    report: Report,
    /// Verdict so far; published snapshots keep `Loading` until the end
    status: ConnectionStatus,
    logger: &'a StageLogger,
}

impl<'a> RunState<'a> {
    fn new(domain: &str, logger: &'a StageLogger) -> Self {
        Self {
            report: Report::loading(domain),
            status: ConnectionStatus::NotBlocked,
            logger,
        }
    }

    /// Append a stage's findings and exceptions and hand back its outcome
    async fn absorb<T>(&mut self, output: StageOutput<T>) -> StageOutcome<T> {
        for factor in &output.factors {
            self.logger.blocking_factor(factor).await;
        }
        self.report.blocking_factors.extend(output.factors);
        self.report.exceptions.extend(output.exceptions);
        output.outcome
    }

    fn finish(mut self, status: ConnectionStatus) -> Report {
        self.report.status = status;
        self.report.completed_at = Some(Utc::now());
        self.report
    }
}

impl DiagnosticOrchestrator {
    pub fn new(probes: Arc<dyn ProbeSuite>, logger: StageLogger) -> Self {
        Self { probes, logger }
    }

    /// Run the diagnostic for `domain`
    ///
    /// `publish` receives every snapshot, the final report included, and
    /// returns `false` once the run has been superseded; the run then stops
    /// without touching the network again and yields `None`.
    pub async fn run<F>(&self, domain: &str, generation: u64, mut publish: F) -> Option<Report>
    where
        F: FnMut(&Report) -> bool + Send,
    {
        let correlation_id = self.logger.run_started(domain, generation).await;
        let mut state = RunState::new(domain, &self.logger);

        // DNS
        let dns = self.probes.dns(domain).await;
        state.report.dns = state.absorb(dns).await;
        if !publish(&state.report) {
            return self.abandon(domain, generation).await;
        }

        let target = match state.report.dns.result() {
            Some(result) if result.has_blocked_ip() => None,
            Some(result) => result.first_address(),
            None => None,
        };
        let Some(target) = target else {
            return self
                .conclude(state, ConnectionStatus::DnsBlocked, &correlation_id, publish)
                .await;
        };

        // TCP
        let tcp = self.probes.tcp(target).await;
        state.report.tcp = state.absorb(tcp).await;
        if !publish(&state.report) {
            return self.abandon(domain, generation).await;
        }

        let reachable = state
            .report
            .tcp
            .result()
            .is_some_and(|result| result.any_port_open());
        if !reachable {
            return self
                .conclude(state, ConnectionStatus::FirewallBlocked, &correlation_id, publish)
                .await;
        }

        // TLS
        let tls = self.probes.tls(domain).await;
        state.report.tls = state.absorb(tls).await;
        if !publish(&state.report) {
            return self.abandon(domain, generation).await;
        }

        if state.report.tls.result().is_some_and(|result| !result.is_valid) {
            state.status = ConnectionStatus::SslBlocked;
        }

        // HTTP
        let http = self.probes.http(domain).await;
        state.report.http = state.absorb(http).await;
        if !publish(&state.report) {
            return self.abandon(domain, generation).await;
        }

        let status = match state.report.http.result() {
            Some(result) if result.is_success() => ConnectionStatus::NotBlocked,
            Some(_) => ConnectionStatus::HttpsBlocked,
            None => state.status,
        };
        self.conclude(state, status, &correlation_id, publish).await
    }

    async fn conclude<F>(
        &self,
        state: RunState<'_>,
        status: ConnectionStatus,
        correlation_id: &str,
        mut publish: F,
    ) -> Option<Report>
    where
        F: FnMut(&Report) -> bool + Send,
    {
        let report = state.finish(status);
        self.logger
            .run_finished(correlation_id, &report.domain, status)
            .await;
        publish(&report).then_some(report)
    }

    async fn abandon(&self, domain: &str, generation: u64) -> Option<Report> {
        self.logger.superseded(domain, generation).await;
        None
    }
}
