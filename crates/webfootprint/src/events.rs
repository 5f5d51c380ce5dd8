//! Analysis event bus: typed progress events from both pipelines.
//!
//! The bus is a `tokio::sync::broadcast` channel carrying [`AnalysisEvent`]
//! values. The REST SSE endpoint, the CLI, and tests can subscribe
//! independently. When no subscribers exist, events are silently dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::PipelineStatus;

/// Every event an analysis run emits. Serialized to JSON for SSE streaming.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnalysisEvent {
    // ── Lifecycle ─────────────────────────
    /// A new analysis has been accepted and its record created.
    AnalysisStarted {
        analysis_id: String,
        target_url: String,
        timestamp: String,
    },
    /// Both pipelines have settled and the overall status is terminal.
    AnalysisCompleted {
        analysis_id: String,
        status: PipelineStatus,
    },

    // ── Supply-chain pipeline ─────────────
    /// The renderer produced a DOM snapshot and network log.
    PageRendered {
        analysis_id: String,
        final_url: String,
        network_events: usize,
        elapsed_ms: u64,
    },
    /// Extraction finished; enrichment of each asset follows.
    AssetsDiscovered { analysis_id: String, count: usize },
    /// An enriched asset was appended to the record.
    AssetRecorded {
        analysis_id: String,
        url: String,
        domain: String,
    },
    /// The supply-chain pipeline reached its terminal `completed` state.
    SupplyChainCompleted {
        analysis_id: String,
        recorded: usize,
        dropped: usize,
    },
    /// The supply-chain pipeline failed.
    SupplyChainFailed { analysis_id: String, error: String },

    // ── Latency pipeline ──────────────────
    /// One resolver probe finished and its result was appended.
    ProbeRecorded {
        analysis_id: String,
        resolver_name: String,
        latency_ms: f64,
    },
    /// All resolver probes have settled.
    LatencyCompleted { analysis_id: String, results: usize },
}

/// The broadcast bus every analysis publishes to.
pub struct EventBus {
    sender: broadcast::Sender<AnalysisEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers. Silently ignores if no subscribers.
    pub fn emit(&self, event: AnalysisEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisEvent> {
        self.sender.subscribe()
    }
}

/// Check whether an event belongs to a specific analysis run.
pub fn event_matches_analysis(event: &AnalysisEvent, analysis_id: &str) -> bool {
    match event {
        AnalysisEvent::AnalysisStarted { analysis_id: id, .. }
        | AnalysisEvent::AnalysisCompleted { analysis_id: id, .. }
        | AnalysisEvent::PageRendered { analysis_id: id, .. }
        | AnalysisEvent::AssetsDiscovered { analysis_id: id, .. }
        | AnalysisEvent::AssetRecorded { analysis_id: id, .. }
        | AnalysisEvent::SupplyChainCompleted { analysis_id: id, .. }
        | AnalysisEvent::SupplyChainFailed { analysis_id: id, .. }
        | AnalysisEvent::ProbeRecorded { analysis_id: id, .. }
        | AnalysisEvent::LatencyCompleted { analysis_id: id, .. } => id == analysis_id,
    }
}

/// RFC 3339 timestamp for the current instant.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
