//! Domain resolution behind a swappable trait.

use std::net::IpAddr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;

/// Resolves a domain name to one address.
#[async_trait]
pub trait DnsClient: Send + Sync {
    /// First address for `domain`, or an error when nothing resolves.
    async fn resolve(&self, domain: &str) -> Result<IpAddr>;
}

/// Resolver using the default upstream configuration.
pub struct HickoryDns {
    resolver: TokioAsyncResolver,
}

impl HickoryDns {
    pub fn new() -> Self {
        let resolver =
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
        Self { resolver }
    }
}

impl Default for HickoryDns {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DnsClient for HickoryDns {
    async fn resolve(&self, domain: &str) -> Result<IpAddr> {
        let lookup = self
            .resolver
            .lookup_ip(domain)
            .await
            .with_context(|| format!("DNS lookup failed for {domain}"))?;
        lookup
            .iter()
            .next()
            .with_context(|| format!("no addresses for {domain}"))
    }
}
