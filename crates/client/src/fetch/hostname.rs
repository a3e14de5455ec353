//! SSRF (Server-Side Request Forgery) protection by hostname shape.
//!
//! Decides, without resolving DNS, whether a requested hostname looks like a
//! public domain. Loopback, private, link-local and mDNS names are refused, as
//! is anything that is not a conventional `label.label.tld` name or a public
//! IPv4 literal.

use std::net::Ipv4Addr;
use std::sync::LazyLock;

use regex::Regex;

static IPV4_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(?:\.\d{1,3}){3}$").expect("valid IPv4 literal regex"));

static DOMAIN_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z0-9-]+\.)+[a-z]{2,}$").expect("valid domain name regex"));

/// Check whether `hostname` may be fetched.
///
/// Rejects:
/// - the empty string and `localhost`
/// - names ending in `.local`
/// - anything containing `:` (IPv6 literals, host:port confusion)
/// - IPv4 literals with an octet above 255, or inside
///   0/8, 10/8, 127/8, 169.254/16, 172.16/12, 192.168/16
///
/// Everything else must be dot-separated `[a-z0-9-]` labels ending in an
/// alphabetic TLD of at least two letters. Matching is case-insensitive.
pub fn is_safe_hostname(hostname: &str) -> bool {
    let h = hostname.to_ascii_lowercase();

    if h.is_empty() || h == "localhost" || h.ends_with(".local") || h.contains(':') {
        return false;
    }

    if IPV4_LITERAL.is_match(&h) {
        return parse_ipv4_literal(&h).is_some_and(|ip| !is_private_ipv4(ip));
    }

    DOMAIN_NAME.is_match(&h)
}

/// Parse a dotted-quad literal; `None` when an octet is out of range.
fn parse_ipv4_literal(h: &str) -> Option<Ipv4Addr> {
    let mut octets = [0u8; 4];
    let mut parts = h.split('.');
    for octet in &mut octets {
        *octet = parts.next()?.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(Ipv4Addr::from(octets))
}

/// Whether an IPv4 address is in a range that must never be fetched.
///
/// This covers:
/// - "This network" (0.0.0.0/8)
/// - RFC 1918 private ranges (10/8, 172.16/12, 192.168/16)
/// - Loopback (127/8)
/// - Link-local (169.254/16)
fn is_private_ipv4(ip: Ipv4Addr) -> bool {
    ip.octets()[0] == 0 || ip.is_private() || ip.is_loopback() || ip.is_link_local()
}
