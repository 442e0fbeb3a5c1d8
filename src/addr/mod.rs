//! Pure address logic: families, canonical text, normalization and
//! classification. No I/O and no unsafe code lives here.

pub mod classify;
pub mod decode;
pub mod normalize;

pub use classify::{classify, classify_v4, classify_v6, AddressScope};
pub use decode::{decode_sockaddr, DecodedAddress};
pub use normalize::normalize_ipv6;

use crate::base::LookupError;
use std::fmt;

/// IP address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    V4,
    V6,
}

/// A decoded IP address: family plus canonical textual form.
///
/// For IPv6 the canonical form is always the fully expanded 8-group
/// lower-case representation with any zone suffix stripped. Equality,
/// hashing and deduplication all work on the canonical form; [`fmt::Display`]
/// renders the conventional shortened form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IpAddress {
    family: AddressFamily,
    canonical: String,
}

impl IpAddress {
    /// Parse and canonicalize textual input (user- or DNS-supplied).
    pub fn from_text(text: &str) -> Result<Self, LookupError> {
        if text.contains(':') {
            Ok(IpAddress {
                family: AddressFamily::V6,
                canonical: normalize_ipv6(text)?,
            })
        } else if text.contains('.') {
            let octets = classify::parse_v4(text)?;
            Ok(Self::from_v4_octets(octets))
        } else {
            Err(LookupError::malformed(text))
        }
    }

    /// Build an IPv4 address from its four network-order octets.
    pub(crate) fn from_v4_octets(octets: [u8; 4]) -> Self {
        IpAddress {
            family: AddressFamily::V4,
            canonical: format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3]),
        }
    }

    /// Build an IPv6 address from its eight big-endian groups.
    pub(crate) fn from_v6_groups(groups: [u16; 8]) -> Self {
        IpAddress {
            family: AddressFamily::V6,
            canonical: normalize::groups_to_canonical(&groups),
        }
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// The canonical textual form (expanded, lower-case for IPv6).
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Classify this address by routing scope.
    pub fn scope(&self) -> Result<AddressScope, LookupError> {
        classify(&self.canonical)
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.family {
            AddressFamily::V4 => f.write_str(&self.canonical),
            AddressFamily::V6 => f.write_str(&normalize::compress_ipv6(&self.canonical)),
        }
    }
}

/// Deduplicate by canonical form, preserving first-seen order.
pub fn dedup_addresses(addresses: Vec<IpAddress>) -> Vec<IpAddress> {
    let mut seen = std::collections::HashSet::new();
    addresses
        .into_iter()
        .filter(|a| seen.insert(a.canonical.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_text_v4() {
        let addr = IpAddress::from_text("192.168.2.1").unwrap();
        assert_eq!(addr.family(), AddressFamily::V4);
        assert_eq!(addr.canonical(), "192.168.2.1");
        assert_eq!(addr.to_string(), "192.168.2.1");
    }

    #[test]
    fn test_from_text_v6_canonicalizes() {
        let addr = IpAddress::from_text("fe80::1%eth0").unwrap();
        assert_eq!(addr.family(), AddressFamily::V6);
        assert_eq!(addr.canonical(), "fe80:0000:0000:0000:0000:0000:0000:0001");
        assert_eq!(addr.to_string(), "fe80::1");
    }

    #[test]
    fn test_from_text_rejects_garbage() {
        assert!(IpAddress::from_text("blah").is_err());
        assert!(IpAddress::from_text("300.1.1.1").is_err());
    }

    #[test]
    fn test_dedup_preserves_first_seen_order() {
        let addrs = vec![
            IpAddress::from_text("2001:db8::1").unwrap(),
            IpAddress::from_text("8.8.8.8").unwrap(),
            // Same address, different abbreviation: canonical forms collide.
            IpAddress::from_text("2001:0db8:0000:0000:0000:0000:0000:0001").unwrap(),
            IpAddress::from_text("8.8.8.8").unwrap(),
            IpAddress::from_text("8.8.4.4").unwrap(),
        ];
        let deduped = dedup_addresses(addrs);
        let texts: Vec<String> = deduped.iter().map(|a| a.to_string()).collect();
        assert_eq!(texts, vec!["2001:db8::1", "8.8.8.8", "8.8.4.4"]);
    }

    #[test]
    fn test_scope_shortcut() {
        let addr = IpAddress::from_text("10.0.0.1").unwrap();
        assert_eq!(addr.scope().unwrap(), AddressScope::Rfc1918);
    }
}
