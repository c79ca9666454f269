//! TLS handshake inspection stage
//!
//! Opens a TLS session to `<domain>:443`, trusting the platform certificate
//! store plus the bundled web PKI roots, and inspects the leaf certificate
//! the peer presents. Handshake outcomes fall into three groups:
//! - handshake completed: certificate fields are extracted and checked for
//!   self-signing and interception-style issuers
//! - handshake rejected, cut off by the peer, or peer identity unverified:
//!   an invalid record
//! - anything else (connect failure, timeout, bad name): no record at all

mod extract;

pub use extract::{parse_certificate, CertificateDetails};

use crate::{
    error::Result,
    logging::StageLogger,
    models::{BlockingFactor, ExceptionRecord, StageOutput, TlsResult},
    types::{Phase, Severity},
};
use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{CertificateError, ClientConfig, ProtocolVersion, RootCertStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

/// Issuer substrings that suggest an intercepting proxy
const PROXY_ISSUER_KEYWORDS: [&str; 3] = ["proxy", "firewall", "security"];

/// What a completed handshake revealed
#[derive(Debug, Clone, PartialEq)]
pub struct HandshakeSummary {
    pub protocol: String,
    pub certificate: CertificateDetails,
}

/// Why a handshake did not complete
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeFault {
    /// The handshake ran and the peer or its certificate was rejected
    Rejected { message: String },
    /// The peer could not be verified as the requested host
    PeerUnverified { message: String },
    /// The handshake could not be attempted or did not finish in time
    Failed { kind: String, message: String },
}

impl HandshakeFault {
    pub fn kind(&self) -> &str {
        match self {
            Self::Rejected { .. } => "HandshakeRejected",
            Self::PeerUnverified { .. } => "PeerUnverified",
            Self::Failed { kind, .. } => kind,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Rejected { message }
            | Self::PeerUnverified { message }
            | Self::Failed { message, .. } => message,
        }
    }

    fn exception(&self) -> ExceptionRecord {
        ExceptionRecord::new(Phase::Tls, self.kind(), Some(self.message().to_string()))
    }
}

/// Classifies errors raised by the handshake itself, after the TCP connect
impl From<std::io::Error> for HandshakeFault {
    fn from(error: std::io::Error) -> Self {
        let message = error.to_string();
        let tls_error = error
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<rustls::Error>());

        match tls_error {
            Some(rustls::Error::InvalidCertificate(cert_error))
                if is_name_mismatch(cert_error) =>
            {
                Self::PeerUnverified { message }
            }
            Some(_) => Self::Rejected { message },
            // Peer or middlebox hung up mid-handshake: SNI filtering
            None if is_terminated_by_peer(error.kind()) => Self::Rejected {
                message: format!("Remote host terminated the handshake: {}", message),
            },
            None => Self::Failed {
                kind: format!("{:?}", error.kind()),
                message,
            },
        }
    }
}

fn is_terminated_by_peer(kind: std::io::ErrorKind) -> bool {
    matches!(
        kind,
        std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
    )
}

fn is_name_mismatch(error: &CertificateError) -> bool {
    matches!(error, CertificateError::NotValidForName)
        || format!("{:?}", error).starts_with("NotValidForName")
}

/// Self-signed and proxy-suspected verdicts for an issuer/subject pair
pub fn inspect_certificate(issuer: &str, subject: &str) -> (bool, bool) {
    let is_self_signed = issuer == subject;
    let issuer_lower = issuer.to_lowercase();
    let proxy_suspected = PROXY_ISSUER_KEYWORDS
        .iter()
        .any(|keyword| issuer_lower.contains(keyword));
    (is_self_signed, proxy_suspected)
}

/// Fold a handshake outcome into the TLS stage output
pub fn evaluate_handshake(
    outcome: std::result::Result<HandshakeSummary, HandshakeFault>,
) -> StageOutput<TlsResult> {
    match outcome {
        Ok(summary) => {
            let cert = summary.certificate;
            let (is_self_signed, proxy_suspected) = inspect_certificate(&cert.issuer, &cert.subject);

            let mut output = StageOutput::completed(TlsResult {
                is_valid: true,
                issuer: cert.issuer,
                subject: cert.subject,
                protocol: summary.protocol,
                expires_at: cert.expires_at,
                subject_alt_names: cert.subject_alt_names,
                is_self_signed,
                issuer_mismatch: proxy_suspected,
            });

            if is_self_signed {
                output = output.with_factor(
                    BlockingFactor::new(
                        "Self-Signed Certificate",
                        Severity::Critical,
                        "Certificate is self-signed - Possible MITM proxy",
                    )
                    .with_detail("Issuer and Subject are identical, not from trusted CA"),
                );
            }
            if proxy_suspected {
                output = output.with_factor(
                    BlockingFactor::new(
                        "Corporate Proxy Detected",
                        Severity::High,
                        "Certificate issued by corporate security infrastructure",
                    )
                    .with_detail("Issuer contains proxy/firewall/security keywords"),
                );
            }
            output
        }
        Err(fault @ HandshakeFault::Rejected { .. }) => {
            StageOutput::completed(TlsResult::invalid())
                .with_exception(fault.exception())
                .with_factor(
                    BlockingFactor::new(
                        "SSL Handshake Failed",
                        Severity::Critical,
                        "TLS handshake failed - Certificate rejected or MITM detected",
                    )
                    .with_detail(fault.message()),
                )
        }
        Err(fault @ HandshakeFault::PeerUnverified { .. }) => {
            StageOutput::completed(TlsResult::invalid())
                .with_exception(fault.exception())
                .with_factor(
                    BlockingFactor::new(
                        "Certificate Verification Failed",
                        Severity::Critical,
                        "Server certificate could not be verified - MITM attack possible",
                    )
                    .with_detail("Certificate chain validation failed"),
                )
        }
        Err(fault @ HandshakeFault::Failed { .. }) => StageOutput::failed(fault.exception()),
    }
}

/// Trust anchors: the bundled web PKI roots plus every parsable root in
/// the platform store, so locally installed interception roots verify
pub fn root_store() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    add_native_roots(&mut root_store, rustls_native_certs::load_native_certs().certs);
    root_store
}

/// Add `certs` to `store`, skipping unparsable ones; returns how many were added
fn add_native_roots(store: &mut RootCertStore, certs: Vec<CertificateDer<'static>>) -> usize {
    let (added, _ignored) = store.add_parsable_certificates(certs);
    added
}

/// Build a verifying client configuration over [`root_store`]
pub fn client_config() -> Result<ClientConfig> {
    let config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()?
    .with_root_certificates(root_store())
    .with_no_client_auth();

    Ok(config)
}

fn protocol_name(version: ProtocolVersion) -> String {
    match version {
        ProtocolVersion::TLSv1_3 => "TLSv1.3".to_string(),
        ProtocolVersion::TLSv1_2 => "TLSv1.2".to_string(),
        other => format!("{:?}", other),
    }
}

/// Live TLS stage
pub struct TlsStage {
    connector: TlsConnector,
    port: u16,
    timeout: Duration,
    logger: StageLogger,
}

impl TlsStage {
    pub fn new(timeout: Duration, logger: StageLogger) -> Result<Self> {
        Ok(Self {
            connector: TlsConnector::from(Arc::new(client_config()?)),
            port: crate::tcp::HTTPS_PORT,
            timeout,
            logger,
        })
    }

    /// Handshake on `port` instead of 443
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Handshake with `domain` and inspect its certificate
    pub async fn inspect(&self, domain: &str) -> StageOutput<TlsResult> {
        let outcome = match tokio::time::timeout(self.timeout, self.handshake(domain)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(HandshakeFault::Failed {
                kind: "TimedOut".to_string(),
                message: format!("TLS handshake timed out after {}s", self.timeout.as_secs()),
            }),
        };

        let protocol = outcome.as_ref().ok().map(|summary| summary.protocol.clone());
        let output = evaluate_handshake(outcome);
        let valid = output.outcome.result().is_some_and(|result| result.is_valid);
        self.logger
            .tls_handshake(domain, protocol.as_deref(), valid)
            .await;
        output
    }

    async fn handshake(&self, domain: &str) -> std::result::Result<HandshakeSummary, HandshakeFault> {
        let server_name =
            ServerName::try_from(domain.to_string()).map_err(|e| HandshakeFault::Failed {
                kind: "InvalidDnsName".to_string(),
                message: e.to_string(),
            })?;

        let socket = TcpStream::connect((domain, self.port))
            .await
            .map_err(|e| HandshakeFault::Failed {
                kind: format!("{:?}", e.kind()),
                message: e.to_string(),
            })?;

        let stream = self
            .connector
            .connect(server_name, socket)
            .await
            .map_err(HandshakeFault::from)?;

        let (_, session) = stream.get_ref();
        let protocol = session
            .protocol_version()
            .map(protocol_name)
            .unwrap_or_else(|| "Unknown".to_string());

        let leaf = session
            .peer_certificates()
            .and_then(|certs| certs.first())
            .ok_or_else(|| HandshakeFault::PeerUnverified {
                message: "Peer presented no certificate".to_string(),
            })?;

        let certificate = parse_certificate(leaf.as_ref()).map_err(|message| {
            HandshakeFault::Failed {
                kind: "CertificateParse".to_string(),
                message,
            }
        })?;

        Ok(HandshakeSummary {
            protocol,
            certificate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StageOutcome;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn summary(issuer: &str, subject: &str) -> HandshakeSummary {
        HandshakeSummary {
            protocol: "TLSv1.3".to_string(),
            certificate: CertificateDetails {
                issuer: issuer.to_string(),
                subject: subject.to_string(),
                expires_at: None,
                subject_alt_names: vec!["example.com".to_string()],
            },
        }
    }

    #[test]
    fn test_self_signed_detection() {
        assert_eq!(inspect_certificate("CN=test", "CN=test"), (true, false));
        assert_eq!(inspect_certificate("CN=test1", "CN=test2"), (false, false));
        // Byte-for-byte comparison
        assert_eq!(inspect_certificate("CN=Test", "CN=test"), (false, false));
    }

    #[test]
    fn test_proxy_keywords() {
        assert_eq!(inspect_certificate("CN=Corp Web PROXY CA", "CN=example.com").1, true);
        assert_eq!(inspect_certificate("O=Firewall Inc", "CN=example.com").1, true);
        assert_eq!(inspect_certificate("CN=NetSecurity Root", "CN=example.com").1, true);
        assert_eq!(inspect_certificate("CN=R3, O=Let's Encrypt", "CN=example.com").1, false);
    }

    #[test]
    fn test_self_signed_finding() {
        let output = evaluate_handshake(Ok(summary("CN=test", "CN=test")));
        let result = output.outcome.result().unwrap();
        assert!(result.is_valid);
        assert!(result.is_self_signed);
        assert!(!result.issuer_mismatch);
        assert_eq!(output.factors.len(), 1);
        assert_eq!(output.factors[0].name, "Self-Signed Certificate");
        assert_eq!(output.factors[0].severity, Severity::Critical);
    }

    #[test]
    fn test_both_flags_can_fire() {
        let output = evaluate_handshake(Ok(summary("CN=Security Proxy", "CN=Security Proxy")));
        let result = output.outcome.result().unwrap();
        assert!(result.is_self_signed);
        assert!(result.issuer_mismatch);
        let names: Vec<_> = output.factors.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Self-Signed Certificate", "Corporate Proxy Detected"]);
    }

    #[test]
    fn test_clean_certificate() {
        let output = evaluate_handshake(Ok(summary("CN=R3, O=Let's Encrypt", "CN=example.com")));
        assert!(output.factors.is_empty());
        assert!(output.exceptions.is_empty());
        assert_eq!(output.outcome.result().unwrap().protocol, "TLSv1.3");
    }

    #[test]
    fn test_rejected_handshake() {
        let output = evaluate_handshake(Err(HandshakeFault::Rejected {
            message: "invalid peer certificate: UnknownIssuer".to_string(),
        }));
        let result = output.outcome.result().unwrap();
        assert!(!result.is_valid);
        assert!(result.issuer.is_empty());
        assert_eq!(output.factors[0].name, "SSL Handshake Failed");
        assert_eq!(
            output.factors[0].technical_detail.as_deref(),
            Some("invalid peer certificate: UnknownIssuer")
        );
        assert_eq!(output.exceptions[0].phase, Phase::Tls);
    }

    #[test]
    fn test_unverified_peer() {
        let output = evaluate_handshake(Err(HandshakeFault::PeerUnverified {
            message: "certificate not valid for name".to_string(),
        }));
        assert!(!output.outcome.result().unwrap().is_valid);
        assert_eq!(output.factors[0].name, "Certificate Verification Failed");
    }

    #[test]
    fn test_other_fault_leaves_no_result() {
        let output = evaluate_handshake(Err(HandshakeFault::Failed {
            kind: "ConnectionReset".to_string(),
            message: "connection reset by peer".to_string(),
        }));
        assert!(matches!(output.outcome, StageOutcome::Failed(_)));
        assert!(output.factors.is_empty());
        assert_eq!(output.exceptions.len(), 1);
        assert_eq!(output.exceptions[0].kind, "ConnectionReset");
    }

    #[test]
    fn test_io_error_classification() {
        let rejected = std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            rustls::Error::InvalidCertificate(CertificateError::UnknownIssuer),
        );
        assert!(matches!(HandshakeFault::from(rejected), HandshakeFault::Rejected { .. }));

        let unverified = std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            rustls::Error::InvalidCertificate(CertificateError::NotValidForName),
        );
        assert!(matches!(
            HandshakeFault::from(unverified),
            HandshakeFault::PeerUnverified { .. }
        ));

        for kind in [
            std::io::ErrorKind::UnexpectedEof,
            std::io::ErrorKind::ConnectionReset,
            std::io::ErrorKind::ConnectionAborted,
        ] {
            let fault = HandshakeFault::from(std::io::Error::new(kind, "tls handshake eof"));
            assert!(matches!(fault, HandshakeFault::Rejected { .. }), "{:?}", kind);
            assert!(fault.message().starts_with("Remote host terminated the handshake"));
        }

        let other = std::io::Error::new(std::io::ErrorKind::Other, "odd");
        assert!(matches!(HandshakeFault::from(other), HandshakeFault::Failed { .. }));
    }

    #[test]
    fn test_client_config_builds() {
        assert!(client_config().is_ok());
        assert_eq!(protocol_name(ProtocolVersion::TLSv1_2), "TLSv1.2");
    }

    #[test]
    fn test_root_store_includes_web_pki() {
        assert!(root_store().len() >= webpki_roots::TLS_SERVER_ROOTS.len());

        let mut store = RootCertStore::empty();
        let garbage = vec![CertificateDer::from(vec![0x30, 0x03, 0x02, 0x01, 0x00])];
        assert_eq!(add_native_roots(&mut store, garbage), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_connection_dropped_after_client_hello() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut hello = [0u8; 4096];
                let _ = socket.read(&mut hello).await;
            }
        });

        let stage = TlsStage::new(Duration::from_secs(5), StageLogger::quiet())
            .unwrap()
            .with_port(port);
        let output = stage.inspect("127.0.0.1").await;

        let result = output.outcome.result().expect("dropped handshake keeps a record");
        assert!(!result.is_valid);
        assert_eq!(output.factors.len(), 1);
        assert_eq!(output.factors[0].name, "SSL Handshake Failed");
        assert_eq!(output.factors[0].severity, Severity::Critical);
        assert_eq!(output.exceptions[0].kind, "HandshakeRejected");
    }

    #[tokio::test]
    async fn test_refused_connect_leaves_no_result() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let stage = TlsStage::new(Duration::from_secs(5), StageLogger::quiet())
            .unwrap()
            .with_port(port);
        let output = stage.inspect("127.0.0.1").await;

        assert!(matches!(output.outcome, StageOutcome::Failed(_)));
        assert!(output.factors.is_empty());
        assert_eq!(output.exceptions[0].kind, "ConnectionRefused");
    }
}
