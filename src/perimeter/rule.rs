//! Security rule model and predicate matching.
//!
//! # Responsibilities
//! - Represent one admission rule (priority, direction, action, predicates)
//! - Parse port ranges and address prefixes from config strings
//! - Match a rule against a concrete access request
//!
//! # Design Decisions
//! - `*` is the universal match for protocol, ports, and prefixes
//! - Prefix matching is plain mask arithmetic; no index structure is needed
//!   at perimeter scale
//! - Rules never match across address families

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Traffic direction a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Verdict of a matching rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Allow,
    Deny,
}

/// Transport protocol predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Protocol {
    #[serde(rename = "tcp")]
    Tcp,
    #[serde(rename = "udp")]
    Udp,
    #[serde(rename = "icmp")]
    Icmp,
    #[serde(rename = "*")]
    Any,
}

impl Protocol {
    /// Whether this rule predicate admits the request's protocol.
    pub fn admits(&self, requested: Protocol) -> bool {
        *self == Protocol::Any || *self == requested
    }
}

/// Port predicate: `*`, a single port, or an inclusive range like `80-443`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum PortRange {
    Any,
    Range(u16, u16),
}

impl PortRange {
    pub fn contains(&self, port: u16) -> bool {
        match self {
            PortRange::Any => true,
            PortRange::Range(lo, hi) => (*lo..=*hi).contains(&port),
        }
    }
}

impl TryFrom<String> for PortRange {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let s = s.trim();
        if s == "*" {
            return Ok(PortRange::Any);
        }
        if let Some((lo, hi)) = s.split_once('-') {
            let lo: u16 = lo
                .trim()
                .parse()
                .map_err(|_| format!("invalid port range '{}'", s))?;
            let hi: u16 = hi
                .trim()
                .parse()
                .map_err(|_| format!("invalid port range '{}'", s))?;
            if lo > hi {
                return Err(format!("inverted port range '{}'", s));
            }
            return Ok(PortRange::Range(lo, hi));
        }
        let port: u16 = s.parse().map_err(|_| format!("invalid port '{}'", s))?;
        Ok(PortRange::Range(port, port))
    }
}

impl From<PortRange> for String {
    fn from(r: PortRange) -> String {
        match r {
            PortRange::Any => "*".to_string(),
            PortRange::Range(lo, hi) if lo == hi => lo.to_string(),
            PortRange::Range(lo, hi) => format!("{}-{}", lo, hi),
        }
    }
}

/// Address prefix predicate: `*` or CIDR notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum Prefix {
    Any,
    Cidr { addr: IpAddr, bits: u8 },
}

impl Prefix {
    pub fn contains(&self, ip: IpAddr) -> bool {
        match self {
            Prefix::Any => true,
            Prefix::Cidr { addr, bits } => match (addr, ip) {
                (IpAddr::V4(net), IpAddr::V4(ip)) => {
                    let mask = if *bits == 0 {
                        0u32
                    } else {
                        u32::MAX << (32 - *bits as u32)
                    };
                    (u32::from(*net) & mask) == (u32::from(ip) & mask)
                }
                (IpAddr::V6(net), IpAddr::V6(ip)) => {
                    let mask = if *bits == 0 {
                        0u128
                    } else {
                        u128::MAX << (128 - *bits as u32)
                    };
                    (u128::from(*net) & mask) == (u128::from(ip) & mask)
                }
                _ => false,
            },
        }
    }
}

impl TryFrom<String> for Prefix {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let s = s.trim();
        if s == "*" {
            return Ok(Prefix::Any);
        }
        let (addr, bits) = match s.split_once('/') {
            Some((addr, bits)) => {
                let addr: IpAddr = addr
                    .parse()
                    .map_err(|_| format!("invalid prefix address '{}'", s))?;
                let bits: u8 = bits
                    .parse()
                    .map_err(|_| format!("invalid prefix length '{}'", s))?;
                (addr, bits)
            }
            // Bare address is a host prefix.
            None => {
                let addr: IpAddr = s.parse().map_err(|_| format!("invalid prefix '{}'", s))?;
                let bits = if addr.is_ipv4() { 32 } else { 128 };
                (addr, bits)
            }
        };
        let max_bits = if addr.is_ipv4() { 32 } else { 128 };
        if bits > max_bits {
            return Err(format!("prefix length {} too long in '{}'", bits, s));
        }
        Ok(Prefix::Cidr { addr, bits })
    }
}

impl From<Prefix> for String {
    fn from(p: Prefix) -> String {
        match p {
            Prefix::Any => "*".to_string(),
            Prefix::Cidr { addr, bits } => format!("{}/{}", addr, bits),
        }
    }
}

/// One admission rule. Priorities are unique ascending integers within a
/// perimeter; lower numbers evaluate first.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecurityRule {
    pub priority: u32,
    pub direction: Direction,
    pub action: Action,
    pub protocol: Protocol,
    pub ports: PortRange,
    pub source: Prefix,
    pub destination: Prefix,
}

impl SecurityRule {
    /// Whether every predicate of this rule matches the request tuple.
    pub fn matches(
        &self,
        direction: Direction,
        protocol: Protocol,
        port: u16,
        source: IpAddr,
        destination: IpAddr,
    ) -> bool {
        self.direction == direction
            && self.protocol.admits(protocol)
            && self.ports.contains(port)
            && self.source.contains(source)
            && self.destination.contains(destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_range_parsing() {
        assert_eq!(PortRange::try_from("*".to_string()), Ok(PortRange::Any));
        assert_eq!(
            PortRange::try_from("80".to_string()),
            Ok(PortRange::Range(80, 80))
        );
        assert_eq!(
            PortRange::try_from("80-443".to_string()),
            Ok(PortRange::Range(80, 443))
        );
        assert!(PortRange::try_from("443-80".to_string()).is_err());
        assert!(PortRange::try_from("http".to_string()).is_err());
    }

    #[test]
    fn prefix_contains_v4() {
        let p = Prefix::try_from("10.0.0.0/16".to_string()).unwrap();
        assert!(p.contains("10.0.200.7".parse().unwrap()));
        assert!(!p.contains("10.1.0.1".parse().unwrap()));
        assert!(!p.contains("203.0.113.5".parse().unwrap()));
    }

    #[test]
    fn prefix_zero_bits_matches_everything_in_family() {
        let p = Prefix::try_from("0.0.0.0/0".to_string()).unwrap();
        assert!(p.contains("203.0.113.5".parse().unwrap()));
        // Different family never matches a CIDR prefix.
        assert!(!p.contains("::1".parse().unwrap()));
    }

    #[test]
    fn bare_address_is_host_prefix() {
        let p = Prefix::try_from("192.0.2.1".to_string()).unwrap();
        assert!(p.contains("192.0.2.1".parse().unwrap()));
        assert!(!p.contains("192.0.2.2".parse().unwrap()));
    }

    #[test]
    fn overlong_prefix_rejected() {
        assert!(Prefix::try_from("10.0.0.0/33".to_string()).is_err());
    }

    #[test]
    fn any_protocol_admits_all() {
        assert!(Protocol::Any.admits(Protocol::Tcp));
        assert!(Protocol::Tcp.admits(Protocol::Tcp));
        assert!(!Protocol::Tcp.admits(Protocol::Udp));
    }
}
