//! Core analysis library for mapping a web page's content delivery
//! footprint: headless rendering, asset extraction, DNS and geolocation
//! enrichment, and resolver latency benchmarking.

pub mod analyzer;
pub mod config;
pub mod enrich;
pub mod error;
pub mod events;
pub mod extract;
pub mod probe;
pub mod render;
pub mod store;
pub mod supply_chain;
pub mod types;

pub use analyzer::Analyzer;
pub use config::{AnalyzerConfig, ResolverEntry};
pub use enrich::{DnsClient, DomainEnricher, GeoProvider, HickoryDns, IpApiClient};
pub use error::{FootprintError, FootprintResult};
pub use events::{AnalysisEvent, EventBus};
pub use extract::extract_assets;
pub use probe::{DnsProbe, LatencyPipeline, LatencyProber, ResolverProbe};
pub use render::{ChromiumRenderer, NoopRenderer, PageRenderer, RenderedPage};
pub use store::{MemoryStore, RecordStore, StoreError};
pub use supply_chain::SupplyChainPipeline;
pub use types::*;
