//! Core data types for analysis records, assets, and latency results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of a discovered page asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    #[serde(rename = "HTML Document")]
    HtmlDocument,
    Stylesheet,
    Script,
    #[serde(rename = "Image/Media")]
    ImageMedia,
    #[serde(rename = "iFrame")]
    Iframe,
    Other,
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AssetKind::HtmlDocument => "HTML Document",
            AssetKind::Stylesheet => "Stylesheet",
            AssetKind::Script => "Script",
            AssetKind::ImageMedia => "Image/Media",
            AssetKind::Iframe => "iFrame",
            AssetKind::Other => "Other",
        };
        write!(f, "{name}")
    }
}

/// A network asset discovered on the rendered page.
///
/// Enrichment fields stay absent until the domain enrichment cache produces
/// them; `load_start_time` stays absent when the renderer's network log has
/// no response event for the exact URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub url: String,
    pub domain: String,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_start_time: Option<f64>,
}

impl Asset {
    /// A bare asset with no enrichment applied yet.
    pub fn new(url: impl Into<String>, domain: impl Into<String>, kind: AssetKind) -> Self {
        Self {
            url: url.into(),
            domain: domain.into(),
            kind,
            ip: None,
            lat: None,
            lon: None,
            city: None,
            country: None,
            isp: None,
            load_start_time: None,
        }
    }

    /// Merge enrichment data into the asset.
    pub fn with_enrichment(mut self, enrichment: &Enrichment) -> Self {
        self.ip = Some(enrichment.ip.clone());
        self.lat = enrichment.lat;
        self.lon = enrichment.lon;
        self.city = Some(enrichment.city.clone());
        self.country = Some(enrichment.country.clone());
        self.isp = Some(enrichment.isp.clone());
        self
    }
}

/// Successful per-domain enrichment: resolved address plus geolocation.
///
/// String fields the geolocation service omitted hold the literal
/// `"Unknown"`; latitude/longitude have no sentinel and stay `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub ip: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub city: String,
    pub country: String,
    pub isp: String,
}

/// One resolver latency measurement, appended as the probe completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyResult {
    pub resolver_name: String,
    pub latency_ms: f64,
}

/// Lifecycle of one pipeline (or the overall analysis).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Starting,
    Running,
    Completed,
    Error,
}

impl PipelineStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStatus::Completed | PipelineStatus::Error)
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStatus::Starting => "starting",
            PipelineStatus::Running => "running",
            PipelineStatus::Completed => "completed",
            PipelineStatus::Error => "error",
        };
        write!(f, "{name}")
    }
}

/// Terminal outcome of one pipeline run, as seen by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    Completed,
    Failed,
}

/// The full analysis record as stored and served to observers.
///
/// The store operates on raw JSON documents; this typed view exists for
/// readers (CLI output, tests) that want structured access to a fetched
/// record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub analysis_id: String,
    pub target_url: String,
    pub status: PipelineStatus,
    pub status_supply_chain: PipelineStatus,
    pub status_dns_latency: PipelineStatus,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub dns_latency_results: Vec<LatencyResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets_found: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRecord {
    /// Whether both pipelines and the overall status have settled.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
            && self.status_supply_chain.is_terminal()
            && self.status_dns_latency.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_kind_wire_names() {
        let json = serde_json::to_string(&AssetKind::HtmlDocument).unwrap();
        assert_eq!(json, "\"HTML Document\"");
        let json = serde_json::to_string(&AssetKind::ImageMedia).unwrap();
        assert_eq!(json, "\"Image/Media\"");
        let json = serde_json::to_string(&AssetKind::Iframe).unwrap();
        assert_eq!(json, "\"iFrame\"");

        let parsed: AssetKind = serde_json::from_str("\"Stylesheet\"").unwrap();
        assert_eq!(parsed, AssetKind::Stylesheet);
    }

    #[test]
    fn test_asset_serialization_skips_absent_enrichment() {
        let asset = Asset::new("https://cdn.example.com/app.js", "cdn.example.com", AssetKind::Script);
        let value = serde_json::to_value(&asset).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj["type"], "Script");
        assert!(!obj.contains_key("ip"));
        assert!(!obj.contains_key("load_start_time"));
    }

    #[test]
    fn test_asset_with_enrichment() {
        let enrichment = Enrichment {
            ip: "93.184.216.34".to_string(),
            lat: Some(42.15),
            lon: Some(-70.82),
            city: "Norwell".to_string(),
            country: "United States".to_string(),
            isp: "EdgeCast".to_string(),
        };
        let asset = Asset::new("https://example.com/a.css", "example.com", AssetKind::Stylesheet)
            .with_enrichment(&enrichment);
        assert_eq!(asset.ip.as_deref(), Some("93.184.216.34"));
        assert_eq!(asset.lat, Some(42.15));
        assert_eq!(asset.isp.as_deref(), Some("EdgeCast"));
        assert_eq!(asset.kind, AssetKind::Stylesheet);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&PipelineStatus::Starting).unwrap(), "\"starting\"");
        assert_eq!(serde_json::to_string(&PipelineStatus::Error).unwrap(), "\"error\"");
        assert!(PipelineStatus::Completed.is_terminal());
        assert!(!PipelineStatus::Running.is_terminal());
    }
}
