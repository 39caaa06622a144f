//! Endpoint address extraction and network equivalence.
//!
//! Media servers report a session's origin as a `RemoteEndPoint` string in a
//! handful of shapes (`ipv4:port`, `[ipv6]:port`, bare addresses, link-local
//! addresses with a `%zone` suffix). Extraction never fails: whatever cannot
//! be recognized is kept as an opaque key so two sessions from the same
//! unparseable endpoint still compare equal, while anything else compares
//! distinct.
//!
//! Two sessions are "on the same network" when their network keys match
//! within one address family: the literal address for IPv4, the configured
//! prefix for IPv6. Mixed or unknown families never match.

use crate::network::types::AddressFamily;
use regex::Regex;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::OnceLock;

fn ipv4_endpoint_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,3}(?:\.\d{1,3}){3}):\d+$").unwrap())
}

/// Strips an interface/zone suffix such as `%eth0` or `%12`.
fn strip_zone(address: &str) -> &str {
    match address.split_once('%') {
        Some((addr, _)) => addr,
        None => address,
    }
}

/// Extracts the address part of a remote endpoint string.
///
/// Recognized shapes are `[ipv6]:port`, `ipv4:port`, bare `ipv6` (with an
/// optional `%zone` suffix) and bare `ipv4`. Anything else is returned with
/// the zone suffix stripped and treated downstream as an opaque key.
pub fn extract_address(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return String::new();
    }

    // [ipv6]:port, zone allowed inside the brackets
    if let Some(rest) = endpoint.strip_prefix('[') {
        if let Some((inner, _)) = rest.split_once(']') {
            return strip_zone(inner).to_string();
        }
    }

    if let Some(caps) = ipv4_endpoint_re().captures(endpoint) {
        return caps[1].to_string();
    }

    let bare = strip_zone(endpoint);
    if bare.parse::<Ipv4Addr>().is_ok() || bare.parse::<Ipv6Addr>().is_ok() {
        return bare.to_string();
    }

    // Unrecognized shape, kept as an opaque key
    bare.to_string()
}

/// Classifies an extracted address by strict parsing.
pub fn classify(address: &str) -> AddressFamily {
    if address.parse::<Ipv4Addr>().is_ok() {
        AddressFamily::Ipv4
    } else if address.parse::<Ipv6Addr>().is_ok() {
        AddressFamily::Ipv6
    } else {
        AddressFamily::Unknown
    }
}

/// Derives the network key of an address.
///
/// IPv4 and unparseable addresses are their own key. IPv6 addresses are
/// truncated to `prefix_bits` (0..=128) and rendered in canonical compressed
/// form, zero-padded beyond the prefix, e.g. `2001:db8:aaaa::1` at 64 bits
/// becomes `2001:db8:aaaa::`.
pub fn network_key(address: &str, prefix_bits: u8) -> String {
    let addr = match address.parse::<Ipv6Addr>() {
        Ok(addr) => addr,
        Err(_) => return address.to_string(),
    };
    let bits = prefix_bits.min(128) as u32;
    let mask: u128 = if bits == 0 {
        0
    } else {
        u128::MAX << (128 - bits)
    };
    Ipv6Addr::from(u128::from(addr) & mask).to_string()
}

/// Tests whether two addresses belong to the same network.
///
/// Exact equality short-circuits. Two IPv6 addresses match on their
/// `prefix_bits` network key; two IPv4 addresses only on literal equality.
/// Differing or unknown families never match, so an unclassifiable address
/// always counts as a distinct network.
pub fn is_same_network(a: &str, b: &str, prefix_bits: u8) -> bool {
    if a == b {
        return true;
    }
    match (classify(a), classify(b)) {
        (AddressFamily::Ipv6, AddressFamily::Ipv6) => {
            network_key(a, prefix_bits) == network_key(b, prefix_bits)
        }
        (AddressFamily::Ipv4, AddressFamily::Ipv4) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_ipv4_with_port() {
        assert_eq!(extract_address("203.0.113.5:8096"), "203.0.113.5");
    }

    #[test]
    fn extract_bracketed_ipv6_with_port() {
        assert_eq!(extract_address("[2001:db8::1]:8096"), "2001:db8::1");
    }

    #[test]
    fn extract_bare_addresses() {
        assert_eq!(extract_address("2001:db8::1"), "2001:db8::1");
        assert_eq!(extract_address("203.0.113.5"), "203.0.113.5");
    }

    #[test]
    fn extract_strips_zone_suffix() {
        assert_eq!(extract_address("2001:db8::1%eth0"), "2001:db8::1");
        assert_eq!(extract_address("[fe80::1%eth0]:8096"), "fe80::1");
    }

    #[test]
    fn extract_keeps_unrecognized_shapes_as_opaque_keys() {
        assert_eq!(extract_address("not-an-address"), "not-an-address");
        assert_eq!(extract_address("garbage%zone"), "garbage");
        assert_eq!(extract_address(""), "");
    }

    #[test]
    fn classify_is_strict() {
        assert_eq!(classify("203.0.113.5"), AddressFamily::Ipv4);
        assert_eq!(classify("2001:db8::1"), AddressFamily::Ipv6);
        assert_eq!(classify("203.0.113.5:8096"), AddressFamily::Unknown);
        assert_eq!(classify("2001:db8::1%eth0"), AddressFamily::Unknown);
        assert_eq!(classify(""), AddressFamily::Unknown);
    }

    #[test]
    fn network_key_truncates_ipv6() {
        assert_eq!(network_key("2001:db8:aaaa::1", 64), "2001:db8:aaaa::");
        assert_eq!(
            network_key("2001:db8:aaaa:bbbb:cccc::1", 64),
            "2001:db8:aaaa:bbbb::"
        );
        assert_eq!(network_key("2001:db8::1", 0), "::");
        assert_eq!(network_key("2001:db8::1", 128), "2001:db8::1");
    }

    #[test]
    fn network_key_passes_ipv4_and_unknown_through() {
        assert_eq!(network_key("203.0.113.5", 64), "203.0.113.5");
        assert_eq!(network_key("opaque-key", 64), "opaque-key");
    }

    #[test]
    fn same_network_ipv6_prefix() {
        assert!(is_same_network("2001:db8:aaaa::1", "2001:db8:aaaa::2", 64));
        assert!(!is_same_network("2001:db8:aaaa::1", "2001:db8:bbbb::1", 64));
    }

    #[test]
    fn same_network_ipv4_is_literal() {
        assert!(is_same_network("203.0.113.5", "203.0.113.5", 64));
        assert!(!is_same_network("203.0.113.5", "203.0.113.6", 64));
    }

    #[test]
    fn mixed_families_are_distinct() {
        assert!(!is_same_network("203.0.113.5", "2001:db8::1", 64));
        assert!(!is_same_network("opaque-a", "opaque-b", 64));
        // identical opaque keys still match via the equality short-circuit
        assert!(is_same_network("opaque-a", "opaque-a", 64));
    }
}
