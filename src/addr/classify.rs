//! Address scope classification.
//!
//! Pure, stateless mapping from a textual address to its routing scope.
//! Classification is a function of the canonical textual form only; it never
//! depends on where the address came from. Malformed input is rejected with
//! an error, never silently treated as `Global`.

use crate::addr::normalize::normalize_ipv6;
use crate::base::LookupError;
use std::fmt;

/// Routing/visibility scope of an address.
///
/// The IPv4 table follows RFC 3330 allocation rules; the IPv6 table follows
/// the conventional prefix classes. `Localhost`, `LinkLocal`, `Multicast`
/// and `Global` are shared between the two families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressScope {
    /// 0.0.0.0/8 "this network".
    Route,
    /// 127.0.0.0/8 or ::1.
    Localhost,
    /// RFC 1918 private ranges.
    Rfc1918,
    /// 169.254.0.0/16 or fe80::/10.
    LinkLocal,
    /// 240.0.0.0/4 reserved for future use.
    Reserved,
    /// Test-net documentation ranges.
    Documentation,
    /// 192.88.99.0/24 6to4 relay anycast.
    SixToFourRelay,
    /// 198.18.0.0/15 benchmark testing.
    Benchmark,
    /// 224.0.0.0/4 or ff00::/8.
    Multicast,
    /// :: all-zero.
    Unspecified,
    /// fec0::/10 (deprecated).
    SiteLocal,
    /// fc00::/7.
    UniqueLocal,
    /// 2002::/16.
    SixToFour,
    /// 2001:0::/32.
    Teredo,
    /// Everything else: globally routable.
    Global,
}

impl AddressScope {
    /// True for globally-routable addresses.
    pub fn is_global(self) -> bool {
        matches!(self, AddressScope::Global)
    }

    /// True for loopback addresses (either family).
    pub fn is_localhost(self) -> bool {
        matches!(self, AddressScope::Localhost)
    }
}

impl fmt::Display for AddressScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AddressScope::Route => "route",
            AddressScope::Localhost => "localhost",
            AddressScope::Rfc1918 => "rfc1918",
            AddressScope::LinkLocal => "linklocal",
            AddressScope::Reserved => "reserved",
            AddressScope::Documentation => "documentation",
            AddressScope::SixToFourRelay => "6to4relay",
            AddressScope::Benchmark => "benchmark",
            AddressScope::Multicast => "multicast",
            AddressScope::Unspecified => "unspecified",
            AddressScope::SiteLocal => "sitelocal",
            AddressScope::UniqueLocal => "uniquelocal",
            AddressScope::SixToFour => "6to4",
            AddressScope::Teredo => "teredo",
            AddressScope::Global => "global",
        };
        f.write_str(name)
    }
}

/// Classify any textual address, picking the family from its separator.
pub fn classify(text: &str) -> Result<AddressScope, LookupError> {
    if text.contains(':') {
        classify_v6(text)
    } else if text.contains('.') {
        classify_v4(text)
    } else {
        Err(LookupError::malformed(text))
    }
}

/// Classify a dotted-decimal IPv4 address.
///
/// Most-specific match wins, evaluated in priority order.
pub fn classify_v4(text: &str) -> Result<AddressScope, LookupError> {
    let octets = parse_v4(text)?;
    let scope = match octets {
        [0, ..] => AddressScope::Route,
        [127, ..] => AddressScope::Localhost,
        [10, ..] => AddressScope::Rfc1918,
        [172, b, ..] if (16..=31).contains(&b) => AddressScope::Rfc1918,
        [192, 168, ..] => AddressScope::Rfc1918,
        [169, 254, ..] => AddressScope::LinkLocal,
        [a, ..] if a >= 240 => AddressScope::Reserved,
        [192, 0, 2, _] => AddressScope::Documentation,
        [198, 51, 100, _] => AddressScope::Documentation,
        [203, 0, 113, _] => AddressScope::Documentation,
        [192, 88, 99, _] => AddressScope::SixToFourRelay,
        [198, b, ..] if b == 18 || b == 19 => AddressScope::Benchmark,
        [a, ..] if (224..=239).contains(&a) => AddressScope::Multicast,
        _ => AddressScope::Global,
    };
    Ok(scope)
}

/// Classify an IPv6 address by prefix of its canonical text.
///
/// The input is normalized first, so any legal abbreviation is accepted.
/// The documentation (`2001:db8::/32`) and benchmark (`2001:2::/48`) ranges
/// are deliberately absent from this table and fall through to `Global`.
pub fn classify_v6(text: &str) -> Result<AddressScope, LookupError> {
    let norm = normalize_ipv6(text)?;
    let scope = if norm == "0000:0000:0000:0000:0000:0000:0000:0000" {
        AddressScope::Unspecified
    } else if norm == "0000:0000:0000:0000:0000:0000:0000:0001" {
        AddressScope::Localhost
    } else if matches!(&norm[..3], "fe8" | "fe9" | "fea" | "feb") {
        AddressScope::LinkLocal
    } else if matches!(&norm[..3], "fec" | "fed" | "fee" | "fef") {
        AddressScope::SiteLocal
    } else if matches!(&norm[..2], "fc" | "fd") {
        AddressScope::UniqueLocal
    } else if &norm[..2] == "ff" {
        AddressScope::Multicast
    } else if &norm[..4] == "2002" {
        AddressScope::SixToFour
    } else if &norm[..9] == "2001:0000" {
        AddressScope::Teredo
    } else {
        AddressScope::Global
    };
    Ok(scope)
}

pub(crate) fn parse_v4(text: &str) -> Result<[u8; 4], LookupError> {
    let mut octets = [0u8; 4];
    let mut count = 0;
    for part in text.split('.') {
        if count == 4 || part.is_empty() || part.len() > 3 {
            return Err(LookupError::malformed(text));
        }
        octets[count] = part
            .parse::<u8>()
            .map_err(|_| LookupError::malformed(text))?;
        count += 1;
    }
    if count != 4 {
        return Err(LookupError::malformed(text));
    }
    Ok(octets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_v4_table() {
        let cases = [
            ("0.1.2.3", AddressScope::Route),
            ("127.0.0.1", AddressScope::Localhost),
            ("10.1.2.3", AddressScope::Rfc1918),
            ("172.16.0.1", AddressScope::Rfc1918),
            ("172.31.255.255", AddressScope::Rfc1918),
            ("172.32.0.1", AddressScope::Global),
            ("192.168.2.1", AddressScope::Rfc1918),
            ("169.254.0.1", AddressScope::LinkLocal),
            ("240.0.0.1", AddressScope::Reserved),
            ("255.255.255.255", AddressScope::Reserved),
            ("192.0.2.1", AddressScope::Documentation),
            ("198.51.100.7", AddressScope::Documentation),
            ("203.0.113.9", AddressScope::Documentation),
            ("192.88.99.1", AddressScope::SixToFourRelay),
            ("198.18.0.1", AddressScope::Benchmark),
            ("198.19.255.1", AddressScope::Benchmark),
            ("224.0.0.251", AddressScope::Multicast),
            ("239.255.255.250", AddressScope::Multicast),
            ("8.8.8.8", AddressScope::Global),
        ];
        for (addr, expected) in cases {
            assert_eq!(classify_v4(addr).unwrap(), expected, "address {addr}");
        }
    }

    #[test]
    fn test_classify_v6_table() {
        // Vectors carried over from the original classifier self-test.
        let cases = [
            ("::", AddressScope::Unspecified),
            ("::1", AddressScope::Localhost),
            ("fe80::fa22:22ff:fee8:2222", AddressScope::LinkLocal),
            ("fec0::ffff:fa22:22ff:fee8:2222", AddressScope::SiteLocal),
            ("fc00::1", AddressScope::UniqueLocal),
            ("fd00::1", AddressScope::UniqueLocal),
            ("ff00::1", AddressScope::Multicast),
            ("2002::1", AddressScope::SixToFour),
            ("2001:0000::1", AddressScope::Teredo),
            ("2001:8b1:1fe4:1::2222", AddressScope::Global),
        ];
        for (addr, expected) in cases {
            assert_eq!(classify_v6(addr).unwrap(), expected, "address {addr}");
        }
    }

    #[test]
    fn test_v6_documentation_range_stays_global() {
        // 2001:db8::/32 and 2001:2::/48 are intentionally not in the table.
        assert_eq!(classify_v6("2001:db8::1").unwrap(), AddressScope::Global);
        assert_eq!(classify_v6("2001:2::1").unwrap(), AddressScope::Global);
    }

    #[test]
    fn test_classify_rejects_malformed() {
        for bad in ["blah", ":", "...", "256.1.1.1", "1.2.3", "1.2.3.4.5", ""] {
            assert!(classify(bad).is_err(), "expected rejection for {bad:?}");
        }
    }

    #[test]
    fn test_classify_is_pure() {
        for addr in ["8.8.8.8", "2001:db8::1", "fe80::1"] {
            assert_eq!(classify(addr).unwrap(), classify(addr).unwrap());
        }
    }

    #[test]
    fn test_scope_accessors() {
        assert!(AddressScope::Global.is_global());
        assert!(!AddressScope::Rfc1918.is_global());
        assert!(AddressScope::Localhost.is_localhost());
    }
}
