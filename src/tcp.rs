//! TCP reachability stage
//!
//! Two sequential connect probes against the first resolved address: port
//! 443 first, then port 80. Port 443 is the primary success criterion and is
//! the only port whose faults raise findings.

use crate::{
    logging::StageLogger,
    models::{BlockingFactor, ExceptionRecord, StageOutcome, StageOutput, TcpResult},
    types::{Phase, Severity},
};
use std::{
    net::{IpAddr, SocketAddr},
    time::{Duration, Instant},
};
use tokio::net::TcpStream;

pub const HTTPS_PORT: u16 = 443;
pub const HTTP_PORT: u16 = 80;

/// Why a connect probe failed
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectFault {
    /// Peer answered with RST
    Refused { message: String },
    /// No answer within the probe timeout
    TimedOut { after: Duration },
    Other { kind: String, message: String },
}

impl ConnectFault {
    /// Failure tag recorded in results and exception records
    pub fn kind(&self) -> &str {
        match self {
            Self::Refused { .. } => "ConnectionRefused",
            Self::TimedOut { .. } => "TimedOut",
            Self::Other { kind, .. } => kind,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Refused { message } | Self::Other { message, .. } => message.clone(),
            Self::TimedOut { after } => format!("connect timed out after {}ms", after.as_millis()),
        }
    }

    fn exception(&self, port: u16) -> ExceptionRecord {
        ExceptionRecord::new(Phase::for_port(port), self.kind(), Some(self.message()))
    }
}

impl From<std::io::Error> for ConnectFault {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::ConnectionRefused => Self::Refused {
                message: error.to_string(),
            },
            kind => Self::Other {
                kind: format!("{:?}", kind),
                message: error.to_string(),
            },
        }
    }
}

/// Connect latency in milliseconds, or the fault
pub type PortProbe = std::result::Result<u64, ConnectFault>;

/// Open and drop one TCP connection to `addr`
pub async fn probe_port(addr: SocketAddr, timeout: Duration) -> PortProbe {
    let start = Instant::now();
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => Ok(start.elapsed().as_millis() as u64),
        Ok(Err(error)) => Err(ConnectFault::from(error)),
        Err(_) => Err(ConnectFault::TimedOut { after: timeout }),
    }
}

/// Fold the two port probes into the TCP stage output
pub fn evaluate_ports(https: PortProbe, http: PortProbe) -> StageOutput<TcpResult> {
    let mut result = TcpResult {
        port_443_open: false,
        port_80_open: false,
        latency_ms: 0,
        failure: None,
    };
    let mut factors = Vec::new();
    let mut exceptions = Vec::new();

    match &https {
        Ok(latency_ms) => {
            result.port_443_open = true;
            result.latency_ms = *latency_ms;
        }
        Err(fault) => {
            result.failure = Some(fault.kind().to_string());
            exceptions.push(fault.exception(HTTPS_PORT));
            match fault {
                ConnectFault::Refused { .. } => factors.push(
                    BlockingFactor::new(
                        "HTTPS Port Blocked",
                        Severity::High,
                        "Connection to port 443 refused - Firewall blocking",
                    )
                    .with_detail("TCP RST received or connection refused"),
                ),
                ConnectFault::TimedOut { after } => factors.push(
                    BlockingFactor::new(
                        "Connection Timeout",
                        Severity::High,
                        "Connection timed out - Possible deep packet inspection",
                    )
                    .with_detail(format!(
                        "No response within {} seconds, packets may be dropped silently",
                        after.as_secs()
                    )),
                ),
                ConnectFault::Other { .. } => {}
            }
        }
    }

    match &http {
        Ok(_) => result.port_80_open = true,
        Err(fault) => exceptions.push(fault.exception(HTTP_PORT)),
    }

    if result.port_443_open && result.latency_ms > crate::defaults::TCP_SLOW_THRESHOLD_MS {
        factors.push(
            BlockingFactor::new(
                "High Connection Latency",
                Severity::Medium,
                format!(
                    "TCP connection took {}ms - Possible traffic shaping",
                    result.latency_ms
                ),
            )
            .with_detail("Normal TCP handshake is typically under 100ms for nearby servers"),
        );
    }

    StageOutput {
        outcome: StageOutcome::Completed(result),
        factors,
        exceptions,
    }
}

/// Live TCP stage
pub struct TcpStage {
    timeout: Duration,
    logger: StageLogger,
}

impl TcpStage {
    pub fn new(timeout: Duration, logger: StageLogger) -> Self {
        Self { timeout, logger }
    }

    /// Probe 443 then 80 on `ip`
    pub async fn probe(&self, ip: IpAddr) -> StageOutput<TcpResult> {
        let https = self.probe_logged(SocketAddr::new(ip, HTTPS_PORT)).await;
        let http = self.probe_logged(SocketAddr::new(ip, HTTP_PORT)).await;
        evaluate_ports(https, http)
    }

    async fn probe_logged(&self, addr: SocketAddr) -> PortProbe {
        let outcome = probe_port(addr, self.timeout).await;
        let target = addr.to_string();
        match &outcome {
            Ok(latency_ms) => self.logger.tcp_connect(&target, Ok(*latency_ms)).await,
            Err(fault) => self.logger.tcp_connect(&target, Err(fault.kind())).await,
        }
        outcome
    }
}
