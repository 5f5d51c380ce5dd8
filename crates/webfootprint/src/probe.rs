//! Resolver latency benchmarking.
//!
//! Every configured resolver is probed simultaneously with a single directed
//! lookup of the target domain. Each measurement is appended to the record
//! the moment its probe settles, so observers watch the table fill in rather
//! than waiting for the slowest resolver.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use futures::Stream;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use tracing::{debug, info, warn};

use crate::config::ResolverEntry;
use crate::events::{AnalysisEvent, EventBus};
use crate::store::{RecordStore, FIELD_DNS_STATUS, FIELD_LATENCY_RESULTS};
use crate::types::{LatencyResult, PipelineOutcome, PipelineStatus};

/// Measures one directed resolution against one resolver.
#[async_trait]
pub trait ResolverProbe: Send + Sync {
    /// Elapsed milliseconds for resolving `domain` via the resolver at `addr`.
    async fn measure(&self, addr: IpAddr, domain: &str) -> Result<f64>;
}

/// Probe issuing a single uncached lookup directed at the resolver address.
pub struct DnsProbe {
    timeout: Duration,
}

impl DnsProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ResolverProbe for DnsProbe {
    async fn measure(&self, addr: IpAddr, domain: &str) -> Result<f64> {
        let group = NameServerConfigGroup::from_ips_clear(&[addr], 53, true);
        let config = ResolverConfig::from_parts(None, Vec::new(), group);
        let mut opts = ResolverOpts::default();
        opts.timeout = self.timeout;
        opts.attempts = 1;
        // A warm local cache would measure nothing.
        opts.cache_size = 0;
        let resolver = TokioAsyncResolver::tokio(config, opts);

        let start = Instant::now();
        resolver
            .lookup_ip(domain)
            .await
            .with_context(|| format!("probe against {addr} failed for {domain}"))?;
        Ok(start.elapsed().as_secs_f64() * 1000.0)
    }
}

/// Fan-out over the resolver table with individually captured outcomes.
pub struct LatencyProber {
    probe: Arc<dyn ResolverProbe>,
    resolvers: Vec<ResolverEntry>,
}

impl LatencyProber {
    pub fn new(probe: Arc<dyn ResolverProbe>, resolvers: Vec<ResolverEntry>) -> Self {
        Self { probe, resolvers }
    }

    /// Probe every resolver concurrently, yielding `(resolver name, outcome)`
    /// pairs in completion order.
    pub fn probe_stream<'a>(
        &'a self,
        domain: &'a str,
    ) -> impl Stream<Item = (String, Result<f64>)> + 'a {
        let concurrency = self.resolvers.len().max(1);
        stream::iter(self.resolvers.iter().cloned())
            .map(move |resolver| {
                let probe = Arc::clone(&self.probe);
                async move {
                    let outcome = probe.measure(resolver.addr, domain).await;
                    (resolver.name, outcome)
                }
            })
            .buffer_unordered(concurrency)
    }

    /// Probe every resolver and collect the successful measurements.
    pub async fn probe_all(&self, domain: &str) -> Vec<LatencyResult> {
        self.probe_stream(domain)
            .filter_map(|(name, outcome)| async move {
                match outcome {
                    Ok(latency_ms) => Some(LatencyResult {
                        resolver_name: name,
                        latency_ms,
                    }),
                    Err(e) => {
                        debug!("latency probe failed for {name}: {e:#}");
                        None
                    }
                }
            })
            .collect()
            .await
    }
}

/// The DNS latency pipeline: benchmark the target domain across the resolver
/// table, appending each measurement to the record as it arrives.
pub struct LatencyPipeline {
    store: Arc<dyn RecordStore>,
    events: Arc<EventBus>,
    prober: LatencyProber,
}

impl LatencyPipeline {
    pub fn new(store: Arc<dyn RecordStore>, events: Arc<EventBus>, prober: LatencyProber) -> Self {
        Self {
            store,
            events,
            prober,
        }
    }

    /// Run to completion. Failed probes produce no entry; the pipeline
    /// terminates `completed` even when every probe failed.
    pub async fn run(&self, analysis_id: &str, target_domain: &str) -> PipelineOutcome {
        info!("starting DNS latency analysis for '{target_domain}'");
        self.set_status(analysis_id, PipelineStatus::Running).await;

        let mut results = 0usize;
        let mut stream = self.prober.probe_stream(target_domain);
        while let Some((name, outcome)) = stream.next().await {
            match outcome {
                Ok(latency_ms) => {
                    let result = LatencyResult {
                        resolver_name: name,
                        latency_ms,
                    };
                    if let Err(e) = self.record_result(analysis_id, &result).await {
                        warn!(
                            "failed to record latency for {}: {e:#}",
                            result.resolver_name
                        );
                        continue;
                    }
                    results += 1;
                    self.events.emit(AnalysisEvent::ProbeRecorded {
                        analysis_id: analysis_id.to_string(),
                        resolver_name: result.resolver_name,
                        latency_ms,
                    });
                }
                Err(e) => debug!("latency probe failed for {name}: {e:#}"),
            }
        }

        self.set_status(analysis_id, PipelineStatus::Completed).await;
        self.events.emit(AnalysisEvent::LatencyCompleted {
            analysis_id: analysis_id.to_string(),
            results,
        });
        info!("DNS latency analysis completed with {results} measurements");
        PipelineOutcome::Completed
    }

    async fn record_result(&self, analysis_id: &str, result: &LatencyResult) -> Result<()> {
        let value = serde_json::to_value(result)?;
        self.store
            .append_union(analysis_id, FIELD_LATENCY_RESULTS, value)
            .await?;
        Ok(())
    }

    async fn set_status(&self, analysis_id: &str, status: PipelineStatus) {
        if let Err(e) = self
            .store
            .update_field(analysis_id, FIELD_DNS_STATUS, serde_json::json!(status))
            .await
        {
            warn!("failed to update latency status: {e}");
        }
    }
}
