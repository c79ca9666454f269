//! Leaf certificate field extraction.

use chrono::{DateTime, Utc};
use std::net::{Ipv4Addr, Ipv6Addr};
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::{GeneralName, ParsedExtension};

/// Fields of the peer's leaf certificate that end up in the report
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CertificateDetails {
    pub issuer: String,
    pub subject: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub subject_alt_names: Vec<String>,
}

/// Parse a DER-encoded certificate
pub fn parse_certificate(der: &[u8]) -> Result<CertificateDetails, String> {
    let (_, cert) = x509_parser::parse_x509_certificate(der)
        .map_err(|e| format!("Failed to parse peer certificate: {}", e))?;
    let tbs = &cert.tbs_certificate;

    Ok(CertificateDetails {
        issuer: tbs.issuer.to_string(),
        subject: tbs.subject.to_string(),
        expires_at: DateTime::from_timestamp(tbs.validity.not_after.timestamp(), 0),
        subject_alt_names: extract_subject_alt_names(&cert),
    })
}

/// All SAN entries in certificate order; name kinds without a textual form are skipped
pub(crate) fn extract_subject_alt_names(cert: &X509Certificate<'_>) -> Vec<String> {
    let mut sans = Vec::new();

    for ext in cert.extensions() {
        if let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() {
            for general_name in &san.general_names {
                match general_name {
                    GeneralName::DNSName(name)
                    | GeneralName::RFC822Name(name)
                    | GeneralName::URI(name) => sans.push(name.to_string()),
                    GeneralName::IPAddress(bytes) => {
                        if let Some(ip) = ip_from_bytes(bytes) {
                            sans.push(ip);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    sans
}

fn ip_from_bytes(bytes: &[u8]) -> Option<String> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(Ipv4Addr::from(octets).to_string())
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(Ipv6Addr::from(octets).to_string())
        }
        _ => None,
    }
}
