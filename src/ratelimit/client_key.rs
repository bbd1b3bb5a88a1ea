//! Client identification for rate limiting.
//!
//! Derives a stable per-client key from the request: the client IP as seen
//! through the configured proxy trust policy. Supports the Cloudflare
//! vendor header, RFC 7239 `Forwarded`, and `X-Forwarded-For`, falling
//! back to the socket remote address when headers cannot be trusted.

use std::net::IpAddr;

use axum::http::HeaderMap;
use ipnet::IpNet;
use tracing::warn;

use crate::config::TrustedProxyMode;

pub struct ClientKeyExtractor {
    mode: TrustedProxyMode,
    trusted_proxies: Vec<IpNet>,
    num_trusted_proxies: Option<usize>,
}

impl ClientKeyExtractor {
    pub fn new(
        mode: TrustedProxyMode,
        trusted_proxies: &[String],
        num_trusted_proxies: Option<usize>,
    ) -> Self {
        let trusted_proxies = trusted_proxies
            .iter()
            .filter_map(|cidr| match cidr.parse::<IpNet>() {
                Ok(net) => Some(net),
                Err(_) => {
                    warn!(cidr = %cidr, "ignoring unparseable trusted proxy CIDR");
                    None
                }
            })
            .collect();

        Self {
            mode,
            trusted_proxies,
            num_trusted_proxies,
        }
    }

    /// Rate-limit key for one request.
    pub fn key(&self, headers: &HeaderMap, socket_addr: IpAddr) -> String {
        self.client_ip(headers, socket_addr).to_string()
    }

    pub fn client_ip(&self, headers: &HeaderMap, socket_addr: IpAddr) -> IpAddr {
        match self.mode {
            TrustedProxyMode::Cloudflare => cloudflare_ip(headers).unwrap_or_else(|| {
                warn!("CF-Connecting-IP header missing in Cloudflare mode, using socket address");
                socket_addr
            }),
            TrustedProxyMode::Standard => self.standard_ip(headers).unwrap_or(socket_addr),
            TrustedProxyMode::None => socket_addr,
        }
    }

    /// Prefer RFC 7239 Forwarded, fall back to X-Forwarded-For.
    fn standard_ip(&self, headers: &HeaderMap) -> Option<IpAddr> {
        if let Some(ip) = self.forwarded_ip(headers) {
            return Some(ip);
        }
        self.x_forwarded_for_ip(headers)
    }

    fn forwarded_ip(&self, headers: &HeaderMap) -> Option<IpAddr> {
        let forwarded = headers.get("forwarded")?.to_str().ok()?;
        let ips: Vec<IpAddr> = forwarded.split(',').filter_map(forwarded_element_ip).collect();
        self.pick_client(&ips)
    }

    fn x_forwarded_for_ip(&self, headers: &HeaderMap) -> Option<IpAddr> {
        let xff = headers.get("x-forwarded-for")?.to_str().ok()?;
        let ips: Vec<IpAddr> = xff
            .split(',')
            .filter_map(|s| s.trim().parse::<IpAddr>().ok())
            .collect();
        self.pick_client(&ips)
    }

    /// Pick the client address out of a proxy chain (leftmost = origin).
    ///
    /// With a fixed proxy count, skip that many hops from the right. With a
    /// CIDR list, walk right to left and take the first address outside
    /// every trusted range. Without trust configuration the rightmost hop
    /// is all we can believe.
    fn pick_client(&self, ips: &[IpAddr]) -> Option<IpAddr> {
        if ips.is_empty() {
            return None;
        }

        if let Some(num_trusted) = self.num_trusted_proxies {
            return if ips.len() > num_trusted {
                Some(ips[ips.len() - num_trusted - 1])
            } else {
                ips.first().copied()
            };
        }

        if !self.trusted_proxies.is_empty() {
            for ip in ips.iter().rev() {
                if !self.is_trusted(*ip) {
                    return Some(*ip);
                }
            }
            // Every hop is a proxy we run; the leftmost is the best guess.
            return ips.first().copied();
        }

        ips.last().copied()
    }

    fn is_trusted(&self, ip: IpAddr) -> bool {
        self.trusted_proxies.iter().any(|net| net.contains(&ip))
    }
}

fn cloudflare_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("cf-connecting-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.parse::<IpAddr>().ok())
}

/// Pull the `for=` address out of one RFC 7239 Forwarded element.
/// Handles quoting, bracketed IPv6, and trailing ports.
fn forwarded_element_ip(element: &str) -> Option<IpAddr> {
    for param in element.split(';') {
        let param = param.trim();
        if let Some(value) = param.strip_prefix("for=") {
            let unbracketed = value
                .trim_matches('"')
                .trim_start_matches('[')
                .split(']')
                .next()
                .unwrap_or(value);

            if let Ok(ip) = unbracketed.parse::<IpAddr>() {
                return Some(ip);
            }
            // IPv4 with a port; IPv6 ports sit outside the brackets and
            // were already dropped above.
            let without_port = unbracketed.split(':').next().unwrap_or(unbracketed);
            if let Ok(ip) = without_port.parse::<IpAddr>() {
                return Some(ip);
            }
        }
    }
    None
}
