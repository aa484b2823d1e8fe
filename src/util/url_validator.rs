use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;
use url::{Host, Url};

/// Why a client-supplied feed URL was refused.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// Only `http` and `https` feeds can be fetched.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
    /// Private, link-local, shared or unspecified address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(IpAddr),
    #[error("Localhost not allowed")]
    Localhost,
}

/// Checks a feed URL before the server fetches it on a client's behalf.
///
/// Refuses non-HTTP(S) schemes, `localhost` (and `*.localhost`), loopback,
/// and addresses in private, link-local, carrier-grade NAT or unique-local
/// ranges, including IPv4 addresses embedded in IPv6. Host names are not
/// resolved.
///
/// # Examples
///
/// ```
/// use podcast_feed_editor::util::validate_url;
///
/// assert!(validate_url("https://feeds.example.com/show.xml").is_ok());
/// assert!(validate_url("http://localhost/feed").is_err());
/// assert!(validate_url("http://10.1.2.3/feed").is_err());
/// assert!(validate_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = validate_scheme(url_str)?;

    match url.host() {
        None => return Err(UrlValidationError::MissingHost),
        Some(Host::Domain(name)) => {
            let name = name.trim_end_matches('.').to_ascii_lowercase();
            if name == "localhost" || name.ends_with(".localhost") {
                return Err(UrlValidationError::Localhost);
            }
        }
        Some(Host::Ipv4(ip)) => check_ip(IpAddr::V4(ip))?,
        Some(Host::Ipv6(ip)) => check_ip(IpAddr::V6(ip))?,
    }

    Ok(url)
}

/// Parses the URL and checks only the scheme. Used when private hosts are
/// explicitly allowed (local development, tests).
pub fn validate_scheme(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(UrlValidationError::UnsupportedScheme(other.to_string())),
    }
}

fn check_ip(ip: IpAddr) -> Result<(), UrlValidationError> {
    let ip = match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    };
    if ip.is_loopback() {
        return Err(UrlValidationError::Localhost);
    }
    let blocked = match ip {
        IpAddr::V4(v4) => is_internal_v4(v4),
        IpAddr::V6(v6) => is_internal_v6(v6),
    };
    if blocked {
        return Err(UrlValidationError::PrivateIp(ip));
    }
    Ok(())
}

fn is_internal_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        // 100.64.0.0/10
        || (a == 100 && (b & 0xc0) == 64)
}

fn is_internal_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_unspecified()
        // fc00::/7
        || (first & 0xfe00) == 0xfc00
        // fe80::/10
        || (first & 0xffc0) == 0xfe80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_feed_hosts_accepted() {
        assert!(validate_url("https://feeds.example.com/podcast.xml").is_ok());
        assert!(validate_url("http://example.org/rss?format=xml").is_ok());
        assert!(validate_url("https://93.184.216.34:8443/feed").is_ok());
        assert!(validate_url("https://[2606:2800:220:1::]/feed").is_ok());
    }

    #[test]
    fn test_only_http_schemes() {
        assert!(matches!(
            validate_url("file:///etc/passwd"),
            Err(UrlValidationError::UnsupportedScheme(s)) if s == "file"
        ));
        assert!(validate_url("ftp://example.com/feed.xml").is_err());
        assert!(validate_url("gopher://example.com/").is_err());
    }

    #[test]
    fn test_unparsable_url() {
        assert!(matches!(
            validate_url("not a url"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_loopback_hosts_refused() {
        for url in [
            "http://localhost/feed",
            "http://LOCALHOST./feed",
            "http://podcasts.localhost/feed",
            "http://127.0.0.1/feed",
            "http://127.8.9.10/feed",
            "http://[::1]/feed",
            "http://[::ffff:127.0.0.1]/feed",
        ] {
            assert!(
                matches!(validate_url(url), Err(UrlValidationError::Localhost)),
                "{url} should be refused as localhost"
            );
        }
    }

    #[test]
    fn test_internal_ranges_refused() {
        for url in [
            "http://10.0.0.1:3000/feed",
            "http://172.16.0.1/feed",
            "http://192.168.1.1/feed",
            "http://169.254.169.254/latest/meta-data",
            "http://100.64.0.1/feed",
            "http://0.0.0.0/feed",
            "http://255.255.255.255/feed",
            "http://[fe80::1]/feed",
            "http://[fd00::1]/feed",
            "http://[::ffff:192.168.0.1]/feed",
        ] {
            assert!(
                matches!(validate_url(url), Err(UrlValidationError::PrivateIp(_))),
                "{url} should be refused as private"
            );
        }
    }

    #[test]
    fn test_validate_scheme_allows_private_hosts() {
        assert!(validate_scheme("http://127.0.0.1:8080/feed").is_ok());
        assert!(validate_scheme("https://192.168.1.5/feed.xml").is_ok());
        assert!(validate_scheme("file:///etc/passwd").is_err());
    }
}
