//! Proxy-aware client-IP extraction: `X-Forwarded-For` is only trusted when
//! the direct connection IP lies in a configured trusted-proxies CIDR list.

use std::net::IpAddr;

use ipnet::IpNet;

/// A list of trusted proxy networks (IPv4 and IPv6), used to decide
/// whether `X-Forwarded-For` should be honored.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies {
    networks: Vec<IpNet>,
}

impl TrustedProxies {
    /// Parses each entry as a bare IP (treated as a /32 or /128) or CIDR.
    /// Unparsable entries are dropped with a warning rather than rejected
    /// wholesale, so one bad config line doesn't disable the whole list.
    pub fn parse(entries: &[impl AsRef<str>]) -> Self {
        let networks = entries
            .iter()
            .filter_map(|entry| {
                let entry = entry.as_ref();
                entry.parse::<IpNet>().ok().or_else(|| {
                    entry
                        .parse::<IpAddr>()
                        .ok()
                        .map(|ip| IpNet::new(ip, if ip.is_ipv4() { 32 } else { 128 }).expect("host prefix is always valid"))
                }).or_else(|| {
                    tracing::warn!(entry, "ignoring unparsable trusted-proxy entry");
                    None
                })
            })
            .collect();
        Self { networks }
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.networks.iter().any(|net| net.contains(&ip))
    }
}

/// Extracts the client IP for a request given the direct connection IP and
/// an optional `X-Forwarded-For` header value. `X-Forwarded-For` is trusted
/// only when `direct_ip` is itself a trusted proxy; its leftmost entry is
/// then taken as the real client IP.
pub fn client_ip(direct_ip: IpAddr, forwarded_for: Option<&str>, trusted_proxies: &TrustedProxies) -> IpAddr {
    if let Some(forwarded) = forwarded_for {
        if trusted_proxies.contains(direct_ip) {
            if let Some(first) = forwarded.split(',').next() {
                if let Ok(parsed) = first.trim().parse::<IpAddr>() {
                    return parsed;
                }
            }
        } else {
            tracing::warn!(%direct_ip, forwarded, "X-Forwarded-For from untrusted source ignored");
        }
    }
    direct_ip
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn honors_forwarded_for_from_trusted_proxy() {
        let proxies = TrustedProxies::parse(&["10.0.0.0/8"]);
        let direct: IpAddr = "10.1.2.3".parse().unwrap();
        let resolved = client_ip(direct, Some("203.0.113.9"), &proxies);
        assert_eq!(resolved, "203.0.113.9".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn ignores_forwarded_for_from_untrusted_source() {
        let proxies = TrustedProxies::parse(&["10.0.0.0/8"]);
        let direct: IpAddr = "203.0.113.5".parse().unwrap();
        let resolved = client_ip(direct, Some("198.51.100.1"), &proxies);
        assert_eq!(resolved, direct);
    }

    #[test]
    fn no_forwarded_header_returns_direct_ip() {
        let proxies = TrustedProxies::parse(&["10.0.0.0/8"]);
        let direct: IpAddr = "10.0.0.1".parse().unwrap();
        assert_eq!(client_ip(direct, None, &proxies), direct);
    }

    #[test]
    fn supports_ipv6_cidrs() {
        let proxies = TrustedProxies::parse(&["::1/128", "fd00::/8"]);
        let direct: IpAddr = "fd00::1".parse().unwrap();
        let resolved = client_ip(direct, Some("2001:db8::42"), &proxies);
        assert_eq!(resolved, "2001:db8::42".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn bare_ip_entries_are_treated_as_host_routes() {
        let proxies = TrustedProxies::parse(&["127.0.0.1"]);
        assert!(proxies.contains("127.0.0.1".parse().unwrap()));
        assert!(!proxies.contains("127.0.0.2".parse().unwrap()));
    }
}
