//! Host endpoint records.
//!
//! A [`Host`] is one crawlable endpoint discovered by the scan-index
//! query: an address, a port and a scheme, plus the canonical URL the
//! crawler actually fetches. Hosts are immutable after construction.

use std::net::IpAddr;

use url::Url;

/// URL scheme of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// Scheme inferred from a port number: 443 is HTTPS, everything else
    /// HTTP.
    pub fn from_port(port: u16) -> Self {
        if port == 443 {
            Scheme::Https
        } else {
            Scheme::Http
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// A single endpoint to scan.
#[derive(Debug, Clone)]
pub struct Host {
    /// Hostname or IP used in the URL (reverse-DNS name when available).
    pub base_address: String,
    /// Raw IP the scan index reported.
    pub ip: String,
    pub port: u16,
    pub scheme: Scheme,
    /// Canonical URL: IPv6 literals bracketed, standard ports collapsed
    /// (`https://h` for 443, `http://h` for 80).
    pub url: String,
}

impl Host {
    /// Builds a host with its canonical URL.
    pub fn new(base_address: String, ip: String, port: u16, scheme: Scheme) -> Self {
        let address_for_url = if is_ipv6(&base_address) {
            format!("[{base_address}]")
        } else {
            base_address.clone()
        };

        let url = match (scheme, port) {
            (Scheme::Https, 443) => format!("https://{address_for_url}"),
            (Scheme::Http, 80) => format!("http://{address_for_url}"),
            _ => format!("{}://{}:{}", scheme.as_str(), address_for_url, port),
        };

        Host {
            base_address,
            ip,
            port,
            scheme,
            url,
        }
    }
}

/// Whether the string is an IPv6 address literal.
fn is_ipv6(address: &str) -> bool {
    matches!(address.parse::<IpAddr>(), Ok(IpAddr::V6(_)))
}

/// Extracts the base host of a URL: the bare hostname or IP, without
/// scheme, port or IPv6 brackets. This is the unit of persistent
/// blocking.
///
/// Falls back to the input string when it does not parse as a URL.
pub fn base_host(full_url: &str) -> String {
    match Url::parse(full_url) {
        Ok(url) => match url.host() {
            Some(url::Host::Domain(d)) => d.to_string(),
            Some(url::Host::Ipv4(a)) => a.to_string(),
            Some(url::Host::Ipv6(a)) => a.to_string(),
            None => full_url.to_string(),
        },
        Err(_) => full_url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_ports_collapse() {
        let https = Host::new("10.0.0.1".into(), "10.0.0.1".into(), 443, Scheme::Https);
        assert_eq!(https.url, "https://10.0.0.1");

        let http = Host::new("example.test".into(), "10.0.0.2".into(), 80, Scheme::Http);
        assert_eq!(http.url, "http://example.test");
    }

    #[test]
    fn test_non_standard_port_kept() {
        let host = Host::new("10.0.0.3".into(), "10.0.0.3".into(), 8080, Scheme::Http);
        assert_eq!(host.url, "http://10.0.0.3:8080");
    }

    #[test]
    fn test_ipv6_literal_is_bracketed() {
        let host = Host::new("2001:db8::1".into(), "2001:db8::1".into(), 8443, Scheme::Https);
        assert_eq!(host.url, "https://[2001:db8::1]:8443");

        let standard = Host::new("2001:db8::1".into(), "2001:db8::1".into(), 443, Scheme::Https);
        assert_eq!(standard.url, "https://[2001:db8::1]");
    }

    #[test]
    fn test_scheme_from_port() {
        assert_eq!(Scheme::from_port(443), Scheme::Https);
        assert_eq!(Scheme::from_port(80), Scheme::Http);
        assert_eq!(Scheme::from_port(8080), Scheme::Http);
    }

    #[test]
    fn test_base_host_strips_scheme_and_port() {
        assert_eq!(base_host("http://evil.test:8080/path"), "evil.test");
        assert_eq!(base_host("https://10.1.2.3"), "10.1.2.3");
    }

    #[test]
    fn test_base_host_unwraps_ipv6_brackets() {
        assert_eq!(base_host("http://[2001:db8::1]:8080/"), "2001:db8::1");
    }

    #[test]
    fn test_base_host_falls_back_to_input() {
        assert_eq!(base_host("not a url"), "not a url");
    }
}
