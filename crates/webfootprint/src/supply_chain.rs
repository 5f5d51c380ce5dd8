//! Supply-chain pipeline: render, extract, enrich, record.
//!
//! One rendered snapshot of the target page is expanded into enriched,
//! timing-correlated asset records. Assets whose domain cannot be enriched
//! are dropped one by one; a render or store failure ends the whole run with
//! the error absorbed into the record.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::enrich::DomainEnricher;
use crate::events::{AnalysisEvent, EventBus};
use crate::extract;
use crate::render::PageRenderer;
use crate::store::{
    RecordStore, FIELD_ASSETS, FIELD_ASSETS_FOUND, FIELD_ERROR_MESSAGE, FIELD_SUPPLY_STATUS,
};
use crate::types::{PipelineOutcome, PipelineStatus};

pub struct SupplyChainPipeline {
    store: Arc<dyn RecordStore>,
    events: Arc<EventBus>,
    renderer: Arc<dyn PageRenderer>,
    enricher: DomainEnricher,
}

struct RunStats {
    recorded: usize,
    dropped: usize,
}

impl SupplyChainPipeline {
    pub fn new(
        store: Arc<dyn RecordStore>,
        events: Arc<EventBus>,
        renderer: Arc<dyn PageRenderer>,
        enricher: DomainEnricher,
    ) -> Self {
        Self {
            store,
            events,
            renderer,
            enricher,
        }
    }

    /// Run to completion, absorbing failures into the record's status
    /// fields. Individual enrichment misses drop single assets; a render or
    /// store failure halts the run with no further asset data.
    pub async fn run(&self, analysis_id: &str, target_url: &str) -> PipelineOutcome {
        info!("starting supply chain analysis for {target_url}");
        self.set_status(analysis_id, PipelineStatus::Running).await;

        match self.run_inner(analysis_id, target_url).await {
            Ok(stats) => {
                self.set_status(analysis_id, PipelineStatus::Completed).await;
                self.events.emit(AnalysisEvent::SupplyChainCompleted {
                    analysis_id: analysis_id.to_string(),
                    recorded: stats.recorded,
                    dropped: stats.dropped,
                });
                info!(
                    "supply chain analysis completed: {} assets recorded, {} dropped",
                    stats.recorded, stats.dropped
                );
                PipelineOutcome::Completed
            }
            Err(e) => {
                warn!("supply chain analysis failed: {e:#}");
                self.record_error(analysis_id, &e).await;
                self.events.emit(AnalysisEvent::SupplyChainFailed {
                    analysis_id: analysis_id.to_string(),
                    error: format!("{e:#}"),
                });
                PipelineOutcome::Failed
            }
        }
    }

    async fn run_inner(&self, analysis_id: &str, target_url: &str) -> Result<RunStats> {
        let started = Instant::now();
        let mut rendered = self
            .renderer
            .render(target_url)
            .await
            .context("page render failed")?;
        self.events.emit(AnalysisEvent::PageRendered {
            analysis_id: analysis_id.to_string(),
            final_url: rendered.final_url.clone(),
            network_events: rendered.network_log.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        });

        // Parse in a blocking task (scraper types are not Send).
        let html = std::mem::take(&mut rendered.html);
        let base = target_url.to_string();
        let assets = tokio::task::spawn_blocking(move || extract::extract_assets(&html, &base))
            .await
            .context("asset extraction task failed")?;

        let found = assets.len();
        self.store
            .update_field(analysis_id, FIELD_ASSETS_FOUND, json!(found))
            .await
            .context("failed to record asset count")?;
        self.events.emit(AnalysisEvent::AssetsDiscovered {
            analysis_id: analysis_id.to_string(),
            count: found,
        });
        info!("found {found} unique assets");

        let mut stats = RunStats {
            recorded: 0,
            dropped: 0,
        };
        for asset in assets {
            let Some(enrichment) = self.enricher.enrich(&asset.domain).await else {
                debug!("dropping {} (domain {} not enrichable)", asset.url, asset.domain);
                stats.dropped += 1;
                continue;
            };
            let mut enriched = asset.with_enrichment(&enrichment);
            enriched.load_start_time = rendered.load_start_time(&enriched.url);

            let value = serde_json::to_value(&enriched)?;
            self.store
                .append_union(analysis_id, FIELD_ASSETS, value)
                .await
                .context("failed to append asset")?;
            stats.recorded += 1;
            self.events.emit(AnalysisEvent::AssetRecorded {
                analysis_id: analysis_id.to_string(),
                url: enriched.url,
                domain: enriched.domain,
            });
        }
        Ok(stats)
    }

    async fn record_error(&self, analysis_id: &str, error: &anyhow::Error) {
        if let Err(e) = self
            .store
            .update_field(analysis_id, FIELD_ERROR_MESSAGE, json!(format!("{error:#}")))
            .await
        {
            warn!("failed to record error message: {e}");
        }
        self.set_status(analysis_id, PipelineStatus::Error).await;
    }

    async fn set_status(&self, analysis_id: &str, status: PipelineStatus) {
        if let Err(e) = self
            .store
            .update_field(analysis_id, FIELD_SUPPLY_STATUS, json!(status))
            .await
        {
            warn!("failed to update supply chain status: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::{DnsClient, GeoInfo, GeoProvider};
    use crate::render::{NetworkEvent, RenderedPage};
    use crate::store::MemoryStore;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Mutex;

    struct FakeRenderer {
        page: RenderedPage,
    }

    #[async_trait]
    impl PageRenderer for FakeRenderer {
        async fn render(&self, _url: &str) -> Result<RenderedPage> {
            Ok(self.page.clone())
        }
    }

    struct FailingRenderer;

    #[async_trait]
    impl PageRenderer for FailingRenderer {
        async fn render(&self, _url: &str) -> Result<RenderedPage> {
            Err(anyhow!("browser crashed during navigation"))
        }
    }

    struct FakeDns {
        answers: HashMap<String, IpAddr>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeDns {
        fn new(domains: &[&str]) -> Self {
            Self {
                answers: domains
                    .iter()
                    .enumerate()
                    .map(|(i, d)| {
                        (
                            d.to_string(),
                            IpAddr::V4(Ipv4Addr::new(203, 0, 113, i as u8 + 1)),
                        )
                    })
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls_for(&self, domain: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|d| d.as_str() == domain)
                .count()
        }
    }

    #[async_trait]
    impl DnsClient for FakeDns {
        async fn resolve(&self, domain: &str) -> Result<IpAddr> {
            self.calls.lock().unwrap().push(domain.to_string());
            self.answers
                .get(domain)
                .copied()
                .ok_or_else(|| anyhow!("no addresses for {domain}"))
        }
    }

    struct FakeGeo;

    #[async_trait]
    impl GeoProvider for FakeGeo {
        async fn locate(&self, _ip: IpAddr) -> Result<GeoInfo> {
            Ok(GeoInfo {
                lat: Some(48.85),
                lon: Some(2.35),
                city: Some("Paris".to_string()),
                country: Some("France".to_string()),
                isp: Some("Example SA".to_string()),
            })
        }
    }

    const TARGET: &str = "https://shop.example.com/";

    fn rendered_page() -> RenderedPage {
        RenderedPage {
            final_url: TARGET.to_string(),
            html: r#"
                <link rel="stylesheet" href="https://cdn.example.com/styles.css">
                <script src="https://analytics.example.net/tag.js"></script>
                <img src="https://cdn.example.com/logo.png">
            "#
            .to_string(),
            network_log: vec![NetworkEvent {
                url: "https://analytics.example.net/tag.js".to_string(),
                timestamp_ms: 1_700_000_000_123.0,
            }],
        }
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .create(
                "run-1",
                json!({
                    "status_supply_chain": "starting",
                    "assets": [],
                }),
            )
            .await
            .unwrap();
        store
    }

    fn pipeline_with(
        store: Arc<MemoryStore>,
        renderer: Arc<dyn PageRenderer>,
        dns: Arc<dyn DnsClient>,
    ) -> SupplyChainPipeline {
        SupplyChainPipeline::new(
            store,
            Arc::new(EventBus::new(64)),
            renderer,
            DomainEnricher::new(dns, Arc::new(FakeGeo)),
        )
    }

    #[tokio::test]
    async fn test_happy_path_records_enriched_assets() {
        let store = seeded_store().await;
        let dns = Arc::new(FakeDns::new(&[
            "cdn.example.com",
            "analytics.example.net",
            "shop.example.com",
        ]));
        let pipeline = pipeline_with(
            Arc::clone(&store),
            Arc::new(FakeRenderer {
                page: rendered_page(),
            }),
            dns,
        );

        let outcome = pipeline.run("run-1", TARGET).await;
        assert_eq!(outcome, PipelineOutcome::Completed);

        let doc = store.fetch("run-1").await.unwrap().unwrap();
        assert_eq!(doc["status_supply_chain"], "completed");
        assert_eq!(doc["assets_found"], 4);

        let assets = doc["assets"].as_array().unwrap();
        assert_eq!(assets.len(), 4);
        for asset in assets {
            assert!(asset["ip"].is_string());
            assert_eq!(asset["city"], "Paris");
        }

        let tag = assets
            .iter()
            .find(|a| a["url"] == "https://analytics.example.net/tag.js")
            .unwrap();
        assert_eq!(tag["load_start_time"], 1_700_000_000_123.0);
        assert_eq!(tag["type"], "Script");

        let base = assets.iter().find(|a| a["url"] == TARGET).unwrap();
        assert_eq!(base["type"], "HTML Document");
        assert!(base.get("load_start_time").is_none());
    }

    #[tokio::test]
    async fn test_unresolvable_domain_drops_its_assets() {
        let html = r#"
            <script src="https://dead.example.org/a.js"></script>
            <script src="https://dead.example.org/b.js"></script>
            <img src="https://cdn.example.com/logo.png">
        "#;
        let store = seeded_store().await;
        let dns = Arc::new(FakeDns::new(&["cdn.example.com", "shop.example.com"]));
        let pipeline = pipeline_with(
            Arc::clone(&store),
            Arc::new(FakeRenderer {
                page: RenderedPage {
                    final_url: TARGET.to_string(),
                    html: html.to_string(),
                    network_log: Vec::new(),
                },
            }),
            Arc::clone(&dns) as Arc<dyn DnsClient>,
        );

        let outcome = pipeline.run("run-1", TARGET).await;
        assert_eq!(outcome, PipelineOutcome::Completed);

        let doc = store.fetch("run-1").await.unwrap().unwrap();
        let assets = doc["assets"].as_array().unwrap();
        assert_eq!(assets.len(), 2, "both dead-domain assets dropped");
        assert!(assets
            .iter()
            .all(|a| a["domain"] != "dead.example.org"));
        assert_eq!(
            dns.calls_for("dead.example.org"),
            1,
            "negative cache must stop repeat lookups"
        );
        assert_eq!(doc["status_supply_chain"], "completed");
    }

    #[tokio::test]
    async fn test_render_failure_sets_error_and_message() {
        let store = seeded_store().await;
        let dns = Arc::new(FakeDns::new(&[]));
        let pipeline = pipeline_with(Arc::clone(&store), Arc::new(FailingRenderer), dns);

        let outcome = pipeline.run("run-1", TARGET).await;
        assert_eq!(outcome, PipelineOutcome::Failed);

        let doc = store.fetch("run-1").await.unwrap().unwrap();
        assert_eq!(doc["status_supply_chain"], "error");
        let message = doc["error_message"].as_str().unwrap();
        assert!(message.contains("render failed"), "got: {message}");
        assert!(doc["assets"].as_array().unwrap().is_empty());
        assert!(doc.get("assets_found").is_none());
    }
}
