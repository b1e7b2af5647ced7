//! Caller address resolution
//!
//! `X-Forwarded-For` may be repeated and each value may be a comma-separated
//! list. All entries are read in header order; the rightmost entry is the one
//! our proxy appended, so counting from that end the second entry is the
//! caller as the proxy saw it. With a single usable entry, that entry wins.

use http::HeaderMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// Returned when nothing parseable is available
pub const UNKNOWN_PEER: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Resolve the caller's address from forwarded headers or the connection
pub fn resolve_peer_address(headers: &HeaderMap, remote_addr: Option<&str>) -> IpAddr {
    let mut forwarded = headers.get_all(FORWARDED_FOR).iter().peekable();
    if forwarded.peek().is_some() {
        let hops: Vec<IpAddr> = forwarded
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .filter_map(parse_address)
            .collect();

        let chosen = match hops.len() {
            0 => None,
            1 => Some(hops[0]),
            n => Some(hops[n - 2]),
        };
        if let Some(ip) = chosen {
            return ip;
        }
    }

    remote_addr.and_then(parse_address).unwrap_or(UNKNOWN_PEER)
}

/// Parse `ip`, `ip:port` or `[v6]:port`, ignoring surrounding whitespace
fn parse_address(raw: &str) -> Option<IpAddr> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ip) = raw.parse::<IpAddr>() {
        return Some(ip);
    }
    if let Ok(addr) = raw.parse::<SocketAddr>() {
        return Some(addr.ip());
    }
    raw.strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .and_then(|inner| inner.parse::<IpAddr>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn forwarded(values: &[&str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for value in values {
            headers.append(FORWARDED_FOR, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_two_forwarded_hops() {
        let headers = forwarded(&["12.34.56.78, 23.45.67.89"]);
        assert_eq!(resolve_peer_address(&headers, None), ip("12.34.56.78"));
    }

    #[test]
    fn test_single_forwarded_hop() {
        let headers = forwarded(&["12.34.56.78"]);
        assert_eq!(
            resolve_peer_address(&headers, Some("10.0.0.1:443")),
            ip("12.34.56.78")
        );
    }

    #[test]
    fn test_repeated_headers_are_concatenated() {
        let headers = forwarded(&["1.1.1.1, 2.2.2.2", "3.3.3.3"]);
        assert_eq!(resolve_peer_address(&headers, None), ip("2.2.2.2"));
    }

    #[test]
    fn test_unparseable_tokens_are_dropped() {
        let headers = forwarded(&["unknown, 12.34.56.78, , garbage, 23.45.67.89"]);
        assert_eq!(resolve_peer_address(&headers, None), ip("12.34.56.78"));
    }

    #[test]
    fn test_forwarded_tokens_with_ports() {
        let headers = forwarded(&["[2001:db8::1]:8443, 10.0.0.2:80"]);
        assert_eq!(resolve_peer_address(&headers, None), ip("2001:db8::1"));
    }

    #[test]
    fn test_remote_address_port_is_stripped() {
        assert_eq!(
            resolve_peer_address(&HeaderMap::new(), Some("12.34.56.78:54321")),
            ip("12.34.56.78")
        );
        assert_eq!(
            resolve_peer_address(&HeaderMap::new(), Some("[::1]:54321")),
            ip("::1")
        );
        assert_eq!(
            resolve_peer_address(&HeaderMap::new(), Some("12.34.56.78")),
            ip("12.34.56.78")
        );
    }

    #[test]
    fn test_nothing_available() {
        assert_eq!(resolve_peer_address(&HeaderMap::new(), None), UNKNOWN_PEER);
        assert_eq!(UNKNOWN_PEER.to_string(), "0.0.0.0");
    }

    #[test]
    fn test_unusable_forwarded_header_falls_back_to_remote() {
        let headers = forwarded(&["unknown"]);
        assert_eq!(
            resolve_peer_address(&headers, Some("9.9.9.9:1000")),
            ip("9.9.9.9")
        );
        assert_eq!(resolve_peer_address(&headers, Some("not an address")), UNKNOWN_PEER);
    }
}
