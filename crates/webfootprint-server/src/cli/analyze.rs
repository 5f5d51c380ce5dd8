//! One-shot analysis from the command line.
//!
//! Runs the same analyzer stack the server uses, but against a local
//! in-memory record, then prints a grouped footprint report once both
//! pipelines settle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use webfootprint::events::event_matches_analysis;
use webfootprint::render::{ChromiumRenderer, NoopRenderer, PageRenderer};
use webfootprint::store::{MemoryStore, RecordStore};
use webfootprint::{
    AnalysisEvent, AnalysisRecord, Analyzer, AnalyzerConfig, Asset, HickoryDns, IpApiClient,
};

/// Analyze one URL and print the report (or the raw record with `--json`).
pub async fn run(url: &str, json: bool, wait_secs: u64) -> Result<()> {
    let config = AnalyzerConfig::from_env();

    let renderer: Arc<dyn PageRenderer> =
        match ChromiumRenderer::launch(config.settle_wait, config.render_timeout).await {
            Ok(renderer) => Arc::new(renderer),
            Err(e) => {
                warn!("failed to initialize Chromium: {e:#}");
                warn!("running the latency benchmark only");
                Arc::new(NoopRenderer)
            }
        };

    let store = Arc::new(MemoryStore::new());
    let geo = Arc::new(IpApiClient::new(&config.geo_endpoint));
    let analyzer = Analyzer::new(
        config,
        Arc::clone(&store) as _,
        renderer,
        Arc::new(HickoryDns::new()),
        geo,
    );

    let mut rx = analyzer.events().subscribe();
    if !json {
        println!("--- Starting dynamic analysis for: {url} ---");
    }
    let analysis_id = analyzer.start_analysis(url).await?;

    // Follow the event stream until this run goes terminal.
    let deadline = Instant::now() + Duration::from_secs(wait_secs);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            bail!("timed out after {wait_secs}s waiting for the analysis to finish");
        }
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Ok(event)) => {
                if !event_matches_analysis(&event, &analysis_id) {
                    continue;
                }
                if !json {
                    print_progress(&event);
                }
                if matches!(event, AnalysisEvent::AnalysisCompleted { .. }) {
                    break;
                }
            }
            Ok(Err(RecvError::Lagged(_))) => continue,
            Ok(Err(RecvError::Closed)) => break,
            Err(_) => {
                bail!("timed out after {wait_secs}s waiting for the analysis to finish")
            }
        }
    }

    let doc = store
        .fetch(&analysis_id)
        .await?
        .context("analysis record disappeared")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    let record: AnalysisRecord =
        serde_json::from_value(doc).context("malformed analysis record")?;
    print_report(&record);
    Ok(())
}

fn print_progress(event: &AnalysisEvent) {
    match event {
        AnalysisEvent::PageRendered {
            network_events,
            elapsed_ms,
            ..
        } => {
            println!(
                "  ...browser finished in {elapsed_ms}ms, {network_events} network responses captured"
            );
        }
        AnalysisEvent::AssetsDiscovered { count, .. } => {
            println!("  ...found {count} unique assets");
        }
        AnalysisEvent::AssetRecorded { url, .. } => {
            println!("  [+] recorded: {}", display_url(url));
        }
        AnalysisEvent::SupplyChainFailed { error, .. } => {
            println!("  [!] supply chain analysis failed: {error}");
        }
        AnalysisEvent::ProbeRecorded {
            resolver_name,
            latency_ms,
            ..
        } => {
            println!("  [+] {resolver_name}: {latency_ms:.1} ms");
        }
        _ => {}
    }
}

fn print_report(record: &AnalysisRecord) {
    println!();
    println!("----- Dynamic analysis for {} -----", record.target_url);
    println!(
        "Overall: {}  supply chain: {}  dns latency: {}",
        record.status, record.status_supply_chain, record.status_dns_latency
    );
    if let Some(message) = &record.error_message {
        println!("Error: {message}");
    }

    // Group assets by domain, preserving discovery order.
    let mut order: Vec<&str> = Vec::new();
    let mut grouped: HashMap<&str, Vec<&Asset>> = HashMap::new();
    for asset in &record.assets {
        if !grouped.contains_key(asset.domain.as_str()) {
            order.push(&asset.domain);
        }
        grouped.entry(&asset.domain).or_default().push(asset);
    }

    for domain in order {
        let assets = &grouped[domain];
        let first = assets[0];
        let city = first.city.as_deref().unwrap_or("Unknown");
        let country = first.country.as_deref().unwrap_or("Unknown");
        let ip = first.ip.as_deref().unwrap_or("?");
        println!();
        println!("Server location: {city}, {country} (IP: {ip})");
        println!("  Domain: {domain}");
        println!("  Assets fetched from this domain:");
        for asset in assets {
            println!(
                "    - [{:<12}] {}",
                asset.kind.to_string(),
                display_url(&asset.url)
            );
        }
    }

    if !record.dns_latency_results.is_empty() {
        let mut results = record.dns_latency_results.clone();
        results.sort_by(|a, b| a.latency_ms.total_cmp(&b.latency_ms));
        println!();
        println!("Resolver latency:");
        for result in &results {
            println!(
                "    {:<24} {:>8.1} ms",
                result.resolver_name, result.latency_ms
            );
        }
    }
}

/// Truncate long URLs for cleaner terminal output.
fn display_url(url: &str) -> String {
    if url.chars().count() < 80 {
        url.to_string()
    } else {
        let head: String = url.chars().take(77).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_url_truncation() {
        let short = "https://example.com/a.js";
        assert_eq!(display_url(short), short);

        let long = format!("https://example.com/{}", "x".repeat(100));
        let shown = display_url(&long);
        assert_eq!(shown.chars().count(), 80);
        assert!(shown.ends_with("..."));
    }
}
