//! Proxy-DNS guard.
//!
//! Lookup results are misleading when the proxy carrying the traffic
//! resolves hostnames on its far end: whatever the local resolver returns
//! is not the address the connection will use. The guard answers one
//! question, "is DNS for this URL resolved by the proxy", so callers can
//! skip the lookup instead of presenting wrong answers.

use url::Url;

/// Proxy protocol type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyTransport {
    /// HTTP proxy (CONNECT tunnel).
    Http,
    /// HTTPS proxy (TLS to proxy).
    Https,
    /// SOCKS proxy, any version.
    Socks,
}

/// Configuration of one proxy, with its bypass rules.
#[derive(Debug, Clone)]
pub struct ProxySettings {
    /// Proxy URL (e.g. `socks5h://proxy.example:1080`).
    pub url: Url,
    /// Whether hostname resolution happens on the proxy's end. Implied by
    /// the `socks5h`/`socks4a` schemes.
    remote_dns: bool,
    bypass: BypassRules,
}

impl ProxySettings {
    /// Create proxy settings from a URL string.
    pub fn new(url_str: &str) -> Option<Self> {
        let url = Url::parse(url_str).ok()?;
        let remote_dns = matches!(url.scheme(), "socks5h" | "socks4a");
        Some(Self {
            url,
            remote_dns,
            bypass: BypassRules::default(),
        })
    }

    /// Create proxy settings from environment variables.
    ///
    /// Checks `ALL_PROXY`, `HTTPS_PROXY` and `HTTP_PROXY` in both cases,
    /// plus `NO_PROXY` for bypass rules.
    pub fn from_env() -> Option<Self> {
        let url_str = std::env::var("ALL_PROXY")
            .or_else(|_| std::env::var("all_proxy"))
            .or_else(|_| std::env::var("HTTPS_PROXY"))
            .or_else(|_| std::env::var("https_proxy"))
            .or_else(|_| std::env::var("HTTP_PROXY"))
            .or_else(|_| std::env::var("http_proxy"))
            .ok()?;

        let mut settings = Self::new(&url_str)?;
        settings.bypass = BypassRules::from_env();
        Some(settings)
    }

    /// Add bypass rules from a NO_PROXY string.
    pub fn with_bypass(mut self, no_proxy: &str) -> Self {
        self.bypass = BypassRules::from_string(no_proxy);
        self
    }

    /// Force the remote-DNS flag, for proxy sources that carry it
    /// separately from the URL scheme.
    pub fn with_remote_dns(mut self, remote_dns: bool) -> Self {
        self.remote_dns = remote_dns;
        self
    }

    /// Get proxy type from the URL scheme.
    pub fn transport(&self) -> ProxyTransport {
        match self.url.scheme() {
            "https" => ProxyTransport::Https,
            "socks" | "socks4" | "socks4a" | "socks5" | "socks5h" => ProxyTransport::Socks,
            _ => ProxyTransport::Http,
        }
    }

    /// Whether hostnames sent through this proxy are resolved remotely.
    pub fn resolves_host_remotely(&self) -> bool {
        self.remote_dns
    }

    /// Check if a target URL should bypass this proxy.
    pub fn should_bypass(&self, target: &Url) -> bool {
        target
            .host_str()
            .is_some_and(|host| self.bypass.matches(host))
    }
}

/// NO_PROXY bypass rules.
///
/// Based on curl's NO_PROXY behavior: comma-separated hostnames matched as
/// suffixes (with or without a leading dot), literal IP addresses matched
/// exactly, and `*` matching everything.
#[derive(Debug, Clone, Default)]
struct BypassRules {
    domains: Vec<String>,
    match_all: bool,
}

impl BypassRules {
    fn from_env() -> Self {
        let raw = std::env::var("NO_PROXY")
            .or_else(|_| std::env::var("no_proxy"))
            .unwrap_or_default();
        Self::from_string(&raw)
    }

    fn from_string(no_proxy: &str) -> Self {
        let mut rules = BypassRules::default();
        for part in no_proxy.split(',').map(str::trim) {
            if part.is_empty() {
                continue;
            }
            if part == "*" {
                rules.match_all = true;
                continue;
            }
            rules
                .domains
                .push(part.trim_start_matches('.').to_lowercase());
        }
        rules
    }

    fn matches(&self, host: &str) -> bool {
        if self.match_all {
            return true;
        }
        let host = host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_lowercase();
        self.domains.iter().any(|rule| {
            host == *rule || host.ends_with(&format!(".{rule}"))
        })
    }
}

/// Source of proxy configuration for a target URL.
///
/// A trait seam so hosts embedding the engine can plug in their own proxy
/// discovery (PAC evaluation, per-profile settings) in place of the
/// environment-variable default.
pub trait ProxyResolver: Send + Sync {
    /// The proxy that would carry traffic to `target`, if any.
    fn proxy_for_url(&self, target: &Url) -> Option<ProxySettings>;
}

/// Environment-variable proxy discovery, resolved once at construction.
#[derive(Debug, Default)]
pub struct EnvProxyResolver {
    settings: Option<ProxySettings>,
}

impl EnvProxyResolver {
    pub fn new() -> Self {
        EnvProxyResolver {
            settings: ProxySettings::from_env(),
        }
    }
}

impl ProxyResolver for EnvProxyResolver {
    fn proxy_for_url(&self, target: &Url) -> Option<ProxySettings> {
        let settings = self.settings.as_ref()?;
        if settings.should_bypass(target) {
            None
        } else {
            Some(settings.clone())
        }
    }
}

/// Decides whether DNS for a URL is resolved by its proxy.
pub struct ProxyDnsGuard {
    resolver: Box<dyn ProxyResolver>,
}

impl ProxyDnsGuard {
    /// Guard backed by environment-variable proxy discovery.
    pub fn from_env() -> Self {
        Self::new(Box::new(EnvProxyResolver::new()))
    }

    pub fn new(resolver: Box<dyn ProxyResolver>) -> Self {
        ProxyDnsGuard { resolver }
    }

    /// True when the proxy carrying traffic to `url_text` resolves
    /// hostnames on its far end. Unparseable URLs and direct connections
    /// answer false.
    pub fn is_dns_proxied(&self, url_text: &str) -> bool {
        let Ok(url) = Url::parse(url_text) else {
            return false;
        };
        match self.resolver.proxy_for_url(&url) {
            Some(settings) if settings.resolves_host_remotely() => {
                tracing::debug!(url = url_text, proxy = %settings.url, "DNS resolved by proxy");
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedResolver(Option<ProxySettings>);

    impl ProxyResolver for FixedResolver {
        fn proxy_for_url(&self, target: &Url) -> Option<ProxySettings> {
            self.0
                .as_ref()
                .filter(|s| !s.should_bypass(target))
                .cloned()
        }
    }

    #[test]
    fn test_remote_dns_schemes() {
        assert!(ProxySettings::new("socks5h://p:1080")
            .unwrap()
            .resolves_host_remotely());
        assert!(ProxySettings::new("socks4a://p:1080")
            .unwrap()
            .resolves_host_remotely());
        assert!(!ProxySettings::new("socks5://p:1080")
            .unwrap()
            .resolves_host_remotely());
        assert!(!ProxySettings::new("http://p:8080")
            .unwrap()
            .resolves_host_remotely());
    }

    #[test]
    fn test_transport_from_scheme() {
        assert_eq!(
            ProxySettings::new("socks5h://p:1080").unwrap().transport(),
            ProxyTransport::Socks
        );
        assert_eq!(
            ProxySettings::new("https://p:8443").unwrap().transport(),
            ProxyTransport::Https
        );
        assert_eq!(
            ProxySettings::new("http://p:8080").unwrap().transport(),
            ProxyTransport::Http
        );
    }

    #[test]
    fn test_guard_with_remote_dns_proxy() {
        let settings = ProxySettings::new("socks5h://p:1080").unwrap();
        let guard = ProxyDnsGuard::new(Box::new(FixedResolver(Some(settings))));
        assert!(guard.is_dns_proxied("https://example.com/"));
    }

    #[test]
    fn test_guard_with_local_dns_proxy() {
        let settings = ProxySettings::new("socks5://p:1080").unwrap();
        let guard = ProxyDnsGuard::new(Box::new(FixedResolver(Some(settings))));
        assert!(!guard.is_dns_proxied("https://example.com/"));
    }

    #[test]
    fn test_guard_without_proxy() {
        let guard = ProxyDnsGuard::new(Box::new(FixedResolver(None)));
        assert!(!guard.is_dns_proxied("https://example.com/"));
        assert!(!guard.is_dns_proxied("not a url"));
    }

    #[test]
    fn test_bypass_suffix_matching() {
        let settings = ProxySettings::new("socks5h://p:1080")
            .unwrap()
            .with_bypass(".internal.example, 127.0.0.1");
        let guard = ProxyDnsGuard::new(Box::new(FixedResolver(Some(settings))));
        assert!(!guard.is_dns_proxied("https://db.internal.example/"));
        assert!(!guard.is_dns_proxied("http://127.0.0.1:8080/"));
        assert!(guard.is_dns_proxied("https://example.com/"));
    }

    #[test]
    fn test_bypass_wildcard() {
        let settings = ProxySettings::new("socks5h://p:1080")
            .unwrap()
            .with_bypass("*");
        let guard = ProxyDnsGuard::new(Box::new(FixedResolver(Some(settings))));
        assert!(!guard.is_dns_proxied("https://example.com/"));
    }
}
