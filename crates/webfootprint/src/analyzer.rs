//! Analysis orchestration.
//!
//! [`Analyzer`] is the single entry point callers use: it registers the
//! initial record, returns the fresh analysis id immediately, and supervises
//! the two pipelines in the background. The overall `status` field belongs to
//! the supervisor alone; each pipeline only ever writes its own status field.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::AnalyzerConfig;
use crate::enrich::{DnsClient, DomainEnricher, GeoProvider};
use crate::error::{FootprintError, FootprintResult};
use crate::events::{now_timestamp, AnalysisEvent, EventBus};
use crate::probe::{DnsProbe, LatencyPipeline, LatencyProber, ResolverProbe};
use crate::render::PageRenderer;
use crate::store::{RecordStore, FIELD_DNS_STATUS, FIELD_STATUS, FIELD_SUPPLY_STATUS};
use crate::supply_chain::SupplyChainPipeline;
use crate::types::{PipelineOutcome, PipelineStatus};

#[derive(Clone)]
pub struct Analyzer {
    config: Arc<AnalyzerConfig>,
    store: Arc<dyn RecordStore>,
    renderer: Arc<dyn PageRenderer>,
    dns: Arc<dyn DnsClient>,
    geo: Arc<dyn GeoProvider>,
    probe: Arc<dyn ResolverProbe>,
    events: Arc<EventBus>,
}

impl Analyzer {
    pub fn new(
        config: AnalyzerConfig,
        store: Arc<dyn RecordStore>,
        renderer: Arc<dyn PageRenderer>,
        dns: Arc<dyn DnsClient>,
        geo: Arc<dyn GeoProvider>,
    ) -> Self {
        let probe: Arc<dyn ResolverProbe> = Arc::new(DnsProbe::new(config.probe_timeout));
        let events = Arc::new(EventBus::new(config.event_capacity));
        Self {
            config: Arc::new(config),
            store,
            renderer,
            dns,
            geo,
            probe,
            events,
        }
    }

    /// Replace the resolver probe. Used by tests to avoid real DNS traffic.
    pub fn with_probe(mut self, probe: Arc<dyn ResolverProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        Arc::clone(&self.store)
    }

    /// Register a new analysis and launch both pipelines in the background.
    ///
    /// Returns the analysis id as soon as the initial record is stored. From
    /// that point the pipelines report progress through the record and the
    /// event bus; this call never waits for them.
    pub async fn start_analysis(&self, target_url: &str) -> FootprintResult<String> {
        let target_url = target_url.trim();
        if target_url.is_empty() {
            return Err(FootprintError::MissingUrl);
        }
        let analysis_id = Uuid::new_v4().to_string();

        let initial = json!({
            "analysis_id": analysis_id,
            "target_url": target_url,
            "status": PipelineStatus::Starting,
            "status_supply_chain": PipelineStatus::Starting,
            "status_dns_latency": PipelineStatus::Starting,
            "assets": [],
            "dns_latency_results": [],
            "created_at": Utc::now(),
        });
        self.store.create(&analysis_id, initial).await?;

        self.events.emit(AnalysisEvent::AnalysisStarted {
            analysis_id: analysis_id.clone(),
            target_url: target_url.to_string(),
            timestamp: now_timestamp(),
        });
        info!("analysis {analysis_id} started for {target_url}");

        self.spawn_pipelines(analysis_id.clone(), target_url.to_string());
        Ok(analysis_id)
    }

    fn spawn_pipelines(&self, analysis_id: String, target_url: String) {
        let supply = SupplyChainPipeline::new(
            Arc::clone(&self.store),
            Arc::clone(&self.events),
            Arc::clone(&self.renderer),
            DomainEnricher::new(Arc::clone(&self.dns), Arc::clone(&self.geo)),
        );
        let latency = LatencyPipeline::new(
            Arc::clone(&self.store),
            Arc::clone(&self.events),
            LatencyProber::new(Arc::clone(&self.probe), self.config.resolvers.clone()),
        );
        let store = Arc::clone(&self.store);
        let events = Arc::clone(&self.events);

        tokio::spawn(async move {
            set_overall_status(&*store, &analysis_id, PipelineStatus::Running).await;

            // Latency probes query for the page's own host.
            let target_domain = Url::parse(&target_url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .unwrap_or_default();

            let supply_task = {
                let id = analysis_id.clone();
                let url = target_url.clone();
                tokio::spawn(async move { supply.run(&id, &url).await })
            };
            let latency_task = {
                let id = analysis_id.clone();
                tokio::spawn(async move { latency.run(&id, &target_domain).await })
            };

            // A panicked pipeline counts as that pipeline's error.
            let supply_outcome =
                finish_task(&*store, &analysis_id, FIELD_SUPPLY_STATUS, supply_task).await;
            let latency_outcome =
                finish_task(&*store, &analysis_id, FIELD_DNS_STATUS, latency_task).await;

            let overall = if supply_outcome == PipelineOutcome::Completed
                && latency_outcome == PipelineOutcome::Completed
            {
                PipelineStatus::Completed
            } else {
                PipelineStatus::Error
            };
            set_overall_status(&*store, &analysis_id, overall).await;
            events.emit(AnalysisEvent::AnalysisCompleted {
                analysis_id: analysis_id.clone(),
                status: overall,
            });
            info!("analysis {analysis_id} finished with status {overall}");
        });
    }
}

async fn set_overall_status(store: &dyn RecordStore, analysis_id: &str, status: PipelineStatus) {
    if let Err(e) = store.update_field(analysis_id, FIELD_STATUS, json!(status)).await {
        warn!("failed to update analysis status: {e}");
    }
}

/// Join one pipeline task; a panic is recorded as that pipeline's error.
async fn finish_task(
    store: &dyn RecordStore,
    analysis_id: &str,
    status_field: &str,
    handle: tokio::task::JoinHandle<PipelineOutcome>,
) -> PipelineOutcome {
    match handle.await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("pipeline task for {analysis_id} did not finish: {e}");
            if let Err(e) = store
                .update_field(analysis_id, status_field, json!(PipelineStatus::Error))
                .await
            {
                warn!("failed to update pipeline status: {e}");
            }
            PipelineOutcome::Failed
        }
    }
}
