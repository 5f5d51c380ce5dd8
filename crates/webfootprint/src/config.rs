//! Analyzer configuration: wait policy, timeouts, and the resolver table.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// A named public DNS resolver benchmarked by the latency pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverEntry {
    pub name: String,
    pub addr: IpAddr,
}

impl ResolverEntry {
    pub fn new(name: &str, addr: IpAddr) -> Self {
        Self {
            name: name.to_string(),
            addr,
        }
    }
}

/// Tunables for one analyzer instance.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Fixed wait after navigation before the DOM snapshot is taken.
    ///
    /// Known-fragile heuristic: pages still loading third-party content when
    /// the wait expires lose assets silently, and static pages pay the full
    /// wait for nothing. Tune via `WEBFOOTPRINT_SETTLE_WAIT_MS` until a real
    /// settle signal replaces it.
    pub settle_wait: Duration,
    /// Upper bound on page navigation before the render is abandoned.
    pub render_timeout: Duration,
    /// Per-resolver probe timeout.
    pub probe_timeout: Duration,
    /// Base URL of the ip-api.com-compatible geolocation endpoint.
    pub geo_endpoint: String,
    /// Resolvers probed by the latency pipeline. An empty table completes
    /// the pipeline immediately with no results.
    pub resolvers: Vec<ResolverEntry>,
    /// Buffer capacity of the analysis event bus.
    pub event_capacity: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            settle_wait: Duration::from_secs(10),
            render_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            geo_endpoint: "http://ip-api.com/json".to_string(),
            resolvers: default_resolvers(),
            event_capacity: 256,
        }
    }
}

impl AnalyzerConfig {
    /// Defaults overlaid with `WEBFOOTPRINT_*` environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(wait) = env_duration_ms("WEBFOOTPRINT_SETTLE_WAIT_MS") {
            config.settle_wait = wait;
        }
        if let Some(timeout) = env_duration_ms("WEBFOOTPRINT_RENDER_TIMEOUT_MS") {
            config.render_timeout = timeout;
        }
        if let Some(timeout) = env_duration_ms("WEBFOOTPRINT_PROBE_TIMEOUT_MS") {
            config.probe_timeout = timeout;
        }
        if let Ok(endpoint) = std::env::var("WEBFOOTPRINT_GEO_ENDPOINT") {
            config.geo_endpoint = endpoint;
        }
        config
    }
}

fn env_duration_ms(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_millis)
}

/// The ten public resolvers probed when no custom table is configured.
pub fn default_resolvers() -> Vec<ResolverEntry> {
    vec![
        ResolverEntry::new("Google (USA)", IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))),
        ResolverEntry::new("Cloudflare (USA)", IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1))),
        ResolverEntry::new("Quad9 (Switzerland)", IpAddr::V4(Ipv4Addr::new(9, 9, 9, 9))),
        ResolverEntry::new("OpenDNS (USA)", IpAddr::V4(Ipv4Addr::new(208, 67, 222, 222))),
        ResolverEntry::new("Comodo (USA)", IpAddr::V4(Ipv4Addr::new(8, 26, 56, 26))),
        ResolverEntry::new("Yandex (Russia)", IpAddr::V4(Ipv4Addr::new(77, 88, 8, 8))),
        ResolverEntry::new("DNS.WATCH (Germany)", IpAddr::V4(Ipv4Addr::new(84, 200, 69, 80))),
        ResolverEntry::new("Level3 (USA)", IpAddr::V4(Ipv4Addr::new(4, 2, 2, 1))),
        ResolverEntry::new("Neustar (USA)", IpAddr::V4(Ipv4Addr::new(156, 154, 70, 1))),
        ResolverEntry::new("AdGuard (Cyprus)", IpAddr::V4(Ipv4Addr::new(94, 140, 14, 14))),
    ]
}
