//! Address classification for resolved IPs
//!
//! Maps an IP literal to its address class and decides whether a resolver
//! answer with that address points at a sinkhole. Classification works on the
//! textual form so malformed literals land in [`IpClass::Unknown`] instead of
//! failing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic class of an IP address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IpClass {
    ClassA,
    ClassB,
    ClassC,
    ClassD,
    ClassE,
    Loopback,
    PrivateA,
    PrivateB,
    PrivateC,
    LinkLocal,
    Localhost,
    NullIp,
    Ipv6Loopback,
    Ipv6,
    Unknown,
}

impl IpClass {
    /// Fixed human-readable description of the class
    pub fn description(&self) -> &'static str {
        match self {
            Self::ClassA => "Class A (1.0.0.0 - 127.255.255.255)",
            Self::ClassB => "Class B (128.0.0.0 - 191.255.255.255)",
            Self::ClassC => "Class C (192.0.0.0 - 223.255.255.255)",
            Self::ClassD => "Class D Multicast (224.0.0.0 - 239.255.255.255)",
            Self::ClassE => "Class E Reserved (240.0.0.0 - 255.255.255.255)",
            Self::Loopback => "Loopback (127.x.x.x)",
            Self::PrivateA => "Private Class A (10.x.x.x)",
            Self::PrivateB => "Private Class B (172.16-31.x.x)",
            Self::PrivateC => "Private Class C (192.168.x.x)",
            Self::LinkLocal => "Link-Local (169.254.x.x)",
            Self::Localhost => "Localhost (127.0.0.1)",
            Self::NullIp => "Null/Blocked (0.0.0.0)",
            Self::Ipv6Loopback => "IPv6 Loopback (::1)",
            Self::Ipv6 => "IPv6 Address",
            Self::Unknown => "Unknown",
        }
    }

    /// Whether an answer containing this class counts as a blocked resolution
    pub fn is_blocked(&self) -> bool {
        self.block_reason().is_some()
    }

    /// RFC1918 ranges
    pub fn is_private(&self) -> bool {
        matches!(self, Self::PrivateA | Self::PrivateB | Self::PrivateC)
    }

    /// Reason attached to CRITICAL findings for blocked classes
    pub fn block_reason(&self) -> Option<&'static str> {
        let reason = match self {
            Self::NullIp => "IP is null-routed (0.0.0.0) - Common ad blocker technique",
            Self::Localhost => "Redirected to localhost (127.0.0.1) - Ad blocker sinkhole",
            Self::Loopback => "Loopback address - Requests sent to local machine",
            Self::PrivateA => "Private Class A network (10.x.x.x) - Local network redirect",
            Self::PrivateB => "Private Class B network (172.16-31.x.x) - Enterprise blocking",
            Self::PrivateC => "Private Class C network (192.168.x.x) - Home router blocking",
            Self::LinkLocal => "Link-local address - Network misconfiguration or blocking",
            Self::Ipv6Loopback => "IPv6 loopback (::1) - Ad blocker sinkhole",
            _ => return None,
        };
        Some(reason)
    }
}

impl fmt::Display for IpClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Classify an IP literal. First matching rule wins.
pub fn classify_ip(ip: &str) -> IpClass {
    if ip.contains(':') {
        return if ip == "::1" {
            IpClass::Ipv6Loopback
        } else {
            IpClass::Ipv6
        };
    }

    let octets = match parse_octets(ip) {
        Some(octets) => octets,
        None => return IpClass::Unknown,
    };

    match octets {
        [0, 0, 0, 0] => IpClass::NullIp,
        [127, 0, 0, 1] => IpClass::Localhost,
        [127, ..] => IpClass::Loopback,
        [10, ..] => IpClass::PrivateA,
        [172, 16..=31, ..] => IpClass::PrivateB,
        [192, 168, ..] => IpClass::PrivateC,
        [169, 254, ..] => IpClass::LinkLocal,
        [1..=126, ..] => IpClass::ClassA,
        [128..=191, ..] => IpClass::ClassB,
        [192..=223, ..] => IpClass::ClassC,
        [224..=239, ..] => IpClass::ClassD,
        [240..=255, ..] => IpClass::ClassE,
        _ => IpClass::Unknown,
    }
}

/// Blocked verdict for an IP literal
pub fn is_blocked_ip(ip: &str) -> bool {
    classify_ip(ip).is_blocked()
}

/// Exactly four dot-separated decimal integers in 0..=255
fn parse_octets(ip: &str) -> Option<[u8; 4]> {
    let mut octets = [0u8; 4];
    let mut parts = ip.split('.');
    for slot in octets.iter_mut() {
        let part = parts.next()?;
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *slot = part.parse::<u8>().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(octets)
}
