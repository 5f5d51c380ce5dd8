//! Record store: the shared, growing analysis record.
//!
//! Both pipelines mutate one record concurrently, so the contract is a small
//! set of per-call-atomic operations over JSON documents. External document
//! stores implement the same trait the in-memory default does; nothing in
//! the pipelines knows which one is behind it.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::Value;

/// Record field names shared by writers and observers.
pub const FIELD_STATUS: &str = "status";
pub const FIELD_SUPPLY_STATUS: &str = "status_supply_chain";
pub const FIELD_DNS_STATUS: &str = "status_dns_latency";
pub const FIELD_ASSETS: &str = "assets";
pub const FIELD_LATENCY_RESULTS: &str = "dns_latency_results";
pub const FIELD_ASSETS_FOUND: &str = "assets_found";
pub const FIELD_ERROR_MESSAGE: &str = "error_message";

/// Contract violations reported by a record store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("field '{0}' is not an array")]
    NotAnArray(String),

    #[error("initial record payload must be a JSON object")]
    NotAnObject,

    #[error("backend error: {0}")]
    Backend(String),
}

/// Append-or-update access to analysis records.
///
/// Every call is atomic with respect to concurrent calls on the same record:
/// an observer never sees a partially applied mutation, and concurrent
/// appends from both pipelines never lose writes.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create the record for `id`, replacing any previous document.
    async fn create(&self, id: &str, initial: Value) -> Result<(), StoreError>;

    /// Set one top-level field of an existing record.
    async fn update_field(&self, id: &str, field: &str, value: Value) -> Result<(), StoreError>;

    /// Append `value` to an array field unless an identical value is already
    /// present (union semantics). A missing field starts as an empty array.
    async fn append_union(&self, id: &str, field: &str, value: Value) -> Result<(), StoreError>;

    /// The current record document, if it exists.
    async fn fetch(&self, id: &str) -> Result<Option<Value>, StoreError>;
}
