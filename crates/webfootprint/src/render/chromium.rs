//! Chromium-based renderer using chromiumoxide.

use super::{NetworkEvent, PageRenderer, RenderedPage};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, EventResponseReceived};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Desktop Chrome user agent presented to target pages. Some CDNs serve a
/// reduced asset set to obvious headless agents.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36";

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. WEBFOOTPRINT_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("WEBFOOTPRINT_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. ~/.webfootprint/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".webfootprint/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".webfootprint/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".webfootprint/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".webfootprint/chromium/chrome-linux64/chrome"),
                home.join(".webfootprint/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Common macOS locations
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Headless Chromium renderer.
///
/// One browser instance serves all renders; each render gets a fresh page
/// that is closed when the snapshot has been taken.
pub struct ChromiumRenderer {
    browser: Browser,
    settle_wait: Duration,
    nav_timeout: Duration,
}

impl ChromiumRenderer {
    /// Launch a headless Chromium instance configured for analysis renders.
    pub async fn launch(settle_wait: Duration, nav_timeout: Duration) -> Result<Self> {
        let chrome_path = find_chromium().context(
            "Chromium not found. Set WEBFOOTPRINT_CHROMIUM_PATH or install google-chrome.",
        )?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg(format!("--user-agent={USER_AGENT}"))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Spawn the handler task
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self {
            browser,
            settle_wait,
            nav_timeout,
        })
    }

    async fn capture(&self, page: &Page, url: &str) -> Result<(String, String)> {
        let nav = tokio::time::timeout(self.nav_timeout, page.goto(url)).await;
        match nav {
            Ok(Ok(_response)) => {}
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!(
                "navigation timed out after {}ms",
                self.nav_timeout.as_millis()
            ),
        }

        // Wait for page to be loaded
        let _ = page.wait_for_navigation().await;

        // Fixed settle wait so late third-party content reaches the DOM.
        tokio::time::sleep(self.settle_wait).await;

        let html: String = page
            .evaluate("document.documentElement.outerHTML")
            .await
            .context("failed to get HTML")?
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert HTML result: {e:?}"))?;

        let final_url = page
            .url()
            .await
            .unwrap_or_default()
            .map(|u| u.to_string())
            .unwrap_or_else(|| url.to_string());

        Ok((final_url, html))
    }
}

/// Subscribe to `Network.responseReceived` and collect events into `log`
/// until the returned task is aborted.
async fn spawn_response_collector(
    page: &Page,
    log: Arc<Mutex<Vec<NetworkEvent>>>,
) -> Option<JoinHandle<()>> {
    if let Err(e) = page.execute(EnableParams::default()).await {
        debug!("failed to enable network domain: {e}");
    }
    match page.event_listener::<EventResponseReceived>().await {
        Ok(mut events) => Some(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let observed = NetworkEvent {
                    url: event.response.url.clone(),
                    timestamp_ms: chrono::Utc::now().timestamp_millis() as f64,
                };
                if let Ok(mut log) = log.lock() {
                    log.push(observed);
                }
            }
        })),
        Err(e) => {
            debug!("failed to subscribe to response events: {e}");
            None
        }
    }
}

#[async_trait]
impl PageRenderer for ChromiumRenderer {
    async fn render(&self, url: &str) -> Result<RenderedPage> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;

        // The listener must exist before navigation starts or early
        // responses are lost.
        let log: Arc<Mutex<Vec<NetworkEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let collector = spawn_response_collector(&page, Arc::clone(&log)).await;

        let outcome = self.capture(&page, url).await;

        if let Some(handle) = collector {
            handle.abort();
        }
        let network_log = log.lock().map(|events| events.clone()).unwrap_or_default();
        let _ = page.close().await;

        let (final_url, html) = outcome?;
        debug!(
            "rendered {url}: {} bytes of HTML, {} network events",
            html.len(),
            network_log.len()
        );
        Ok(RenderedPage {
            final_url,
            html,
            network_log,
        })
    }
}
