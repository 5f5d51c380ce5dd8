//! Run the HTTP analysis service.

use std::net::IpAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use webfootprint::render::{ChromiumRenderer, NoopRenderer, PageRenderer};
use webfootprint::store::MemoryStore;
use webfootprint::{Analyzer, AnalyzerConfig, HickoryDns, IpApiClient};

use crate::rest::{self, AppState};

/// Wire up the full analyzer stack and serve the REST API until shutdown.
pub async fn run(bind: IpAddr, port: u16) -> Result<()> {
    let config = AnalyzerConfig::from_env();
    info!("starting webfootprint v{}", env!("CARGO_PKG_VERSION"));

    // A missing browser degrades the service instead of killing it: the
    // latency pipeline still works, supply chain runs end in `error`.
    let (renderer, renderer_available): (Arc<dyn PageRenderer>, bool) =
        match ChromiumRenderer::launch(config.settle_wait, config.render_timeout).await {
            Ok(renderer) => {
                info!("Chromium renderer initialized");
                (Arc::new(renderer), true)
            }
            Err(e) => {
                warn!("failed to initialize Chromium: {e:#}");
                warn!("running in latency-only mode");
                (Arc::new(NoopRenderer), false)
            }
        };

    let store = Arc::new(MemoryStore::new());
    let dns = Arc::new(HickoryDns::new());
    let geo = Arc::new(IpApiClient::new(&config.geo_endpoint));
    let analyzer = Analyzer::new(config, store, renderer, dns, geo);

    let state = Arc::new(AppState::new(analyzer, renderer_available));
    rest::start(bind, port, state).await
}
