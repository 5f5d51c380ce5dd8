//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the [`PageRenderer`] trait that abstracts over the browser engine
//! (currently Chromium via chromiumoxide). The analyzer only needs a settled
//! DOM snapshot plus the network response log for timing correlation.

pub mod chromium;

pub use chromium::ChromiumRenderer;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One observed network response during a render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkEvent {
    /// Response URL as the browser reported it.
    pub url: String,
    /// Epoch milliseconds at which the response was observed.
    pub timestamp_ms: f64,
}

/// Result of rendering a page to a settled DOM snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedPage {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Serialized DOM after the settle wait.
    pub html: String,
    /// Chronological network response log captured during the render.
    pub network_log: Vec<NetworkEvent>,
}

impl RenderedPage {
    /// Load-start timestamp for `url`, if a response event matched it.
    ///
    /// The latest matching event wins, so a revalidated resource reports its
    /// most recent response.
    pub fn load_start_time(&self, url: &str) -> Option<f64> {
        self.network_log
            .iter()
            .rev()
            .find(|event| event.url == url)
            .map(|event| event.timestamp_ms)
    }
}

/// A browser engine that renders pages to settled DOM snapshots.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Render `url`, returning the settled DOM and the network log.
    async fn render(&self, url: &str) -> Result<RenderedPage>;
}

/// A no-op renderer used when Chromium is unavailable.
///
/// The latency pipeline works without a browser; this stub makes the
/// supply-chain pipeline report a render error while everything else still
/// functions.
pub struct NoopRenderer;

#[async_trait]
impl PageRenderer for NoopRenderer {
    async fn render(&self, _url: &str) -> Result<RenderedPage> {
        Err(anyhow::anyhow!("browser not available, latency-only mode"))
    }
}
