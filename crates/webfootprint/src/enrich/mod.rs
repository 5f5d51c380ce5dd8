//! Per-run domain enrichment with negative-result caching.

pub mod dns;
pub mod geo;

pub use dns::{DnsClient, HickoryDns};
pub use geo::{GeoInfo, GeoProvider, IpApiClient};

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::types::Enrichment;

const UNKNOWN: &str = "Unknown";

/// Memoizing enrichment cache, scoped to one analysis run.
///
/// A domain is resolved and geolocated at most once per run; `None` entries
/// are the negative cache, so a failed domain is never retried. Concurrent
/// first calls for the same uncached domain may both reach the network; both
/// compute the same answer and the second insert is harmless.
pub struct DomainEnricher {
    dns: Arc<dyn DnsClient>,
    geo: Arc<dyn GeoProvider>,
    cache: DashMap<String, Option<Enrichment>>,
}

impl DomainEnricher {
    pub fn new(dns: Arc<dyn DnsClient>, geo: Arc<dyn GeoProvider>) -> Self {
        Self {
            dns,
            geo,
            cache: DashMap::new(),
        }
    }

    /// Enrichment for `domain`, memoized. `None` means the domain failed
    /// resolution or geolocation in this run.
    pub async fn enrich(&self, domain: &str) -> Option<Enrichment> {
        if let Some(cached) = self.cache.get(domain) {
            return cached.clone();
        }
        let enrichment = self.lookup(domain).await;
        self.cache.insert(domain.to_string(), enrichment.clone());
        enrichment
    }

    /// Number of domains with a cached outcome, positive or negative.
    pub fn cached_domains(&self) -> usize {
        self.cache.len()
    }

    async fn lookup(&self, domain: &str) -> Option<Enrichment> {
        let ip = match self.dns.resolve(domain).await {
            Ok(ip) => ip,
            Err(e) => {
                debug!("DNS resolution failed for {domain}: {e:#}");
                return None;
            }
        };
        match self.geo.locate(ip).await {
            Ok(geo) => Some(Enrichment {
                ip: ip.to_string(),
                lat: geo.lat,
                lon: geo.lon,
                city: geo.city.unwrap_or_else(|| UNKNOWN.to_string()),
                country: geo.country.unwrap_or_else(|| UNKNOWN.to_string()),
                isp: geo.isp.unwrap_or_else(|| UNKNOWN.to_string()),
            }),
            Err(e) => {
                // All-or-nothing: a resolved IP without location data is not recorded.
                debug!("geolocation failed for {domain} ({ip}): {e:#}");
                None
            }
        }
    }
}
