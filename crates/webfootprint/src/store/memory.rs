//! In-memory record store.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::{RecordStore, StoreError};

/// Process-local store holding records as JSON objects behind an async lock.
///
/// The write lock covers each mutation in full, which is exactly the
/// per-call atomicity the [`RecordStore`] contract asks for.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Map<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, id: &str, initial: Value) -> Result<(), StoreError> {
        let Value::Object(doc) = initial else {
            return Err(StoreError::NotAnObject);
        };
        self.records.write().await.insert(id.to_string(), doc);
        Ok(())
    }

    async fn update_field(&self, id: &str, field: &str, value: Value) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let doc = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        doc.insert(field.to_string(), value);
        Ok(())
    }

    async fn append_union(&self, id: &str, field: &str, value: Value) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let doc = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let entry = doc
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        let Value::Array(items) = entry else {
            return Err(StoreError::NotAnArray(field.to_string()));
        };
        if !items.contains(&value) {
            items.push(value);
        }
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<Value>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(id).cloned().map(Value::Object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_create_then_fetch() {
        let store = MemoryStore::new();
        store
            .create("run-1", json!({"status": "starting", "assets": []}))
            .await
            .unwrap();

        let doc = store.fetch("run-1").await.unwrap().unwrap();
        assert_eq!(doc["status"], "starting");
        assert_eq!(store.count().await, 1);
        assert!(store.fetch("run-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_replaces_previous_document() {
        let store = MemoryStore::new();
        store.create("run-1", json!({"a": 1})).await.unwrap();
        store.create("run-1", json!({"b": 2})).await.unwrap();

        let doc = store.fetch("run-1").await.unwrap().unwrap();
        assert!(doc.get("a").is_none());
        assert_eq!(doc["b"], 2);
    }

    #[tokio::test]
    async fn test_create_rejects_non_object() {
        let store = MemoryStore::new();
        let err = store.create("run-1", json!([1, 2])).await.unwrap_err();
        assert!(matches!(err, StoreError::NotAnObject));
    }

    #[tokio::test]
    async fn test_update_field_requires_existing_record() {
        let store = MemoryStore::new();
        let err = store
            .update_field("missing", "status", json!("running"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_append_union_dedupes_identical_payloads() {
        let store = MemoryStore::new();
        store.create("run-1", json!({"assets": []})).await.unwrap();

        let payload = json!({"url": "https://cdn.example.com/a.js", "latency_ms": 12.5});
        store.append_union("run-1", "assets", payload.clone()).await.unwrap();
        store.append_union("run-1", "assets", payload.clone()).await.unwrap();
        store
            .append_union("run-1", "assets", json!({"url": "https://cdn.example.com/b.js"}))
            .await
            .unwrap();

        let doc = store.fetch("run-1").await.unwrap().unwrap();
        assert_eq!(doc["assets"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_append_union_creates_missing_array() {
        let store = MemoryStore::new();
        store.create("run-1", json!({})).await.unwrap();
        store
            .append_union("run-1", "dns_latency_results", json!({"resolver_name": "x"}))
            .await
            .unwrap();

        let doc = store.fetch("run-1").await.unwrap().unwrap();
        assert_eq!(doc["dns_latency_results"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_append_union_rejects_non_array_field() {
        let store = MemoryStore::new();
        store.create("run-1", json!({"status": "starting"})).await.unwrap();
        let err = store
            .append_union("run-1", "status", json!("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotAnArray(_)));
    }

    #[tokio::test]
    async fn test_concurrent_appends_lose_nothing() {
        let store = Arc::new(MemoryStore::new());
        store
            .create("run-1", json!({"assets": [], "dns_latency_results": []}))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = Arc::clone(&store);
            let field = if i % 2 == 0 { "assets" } else { "dns_latency_results" };
            handles.push(tokio::spawn(async move {
                store
                    .append_union("run-1", field, json!({"n": i}))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let doc = store.fetch("run-1").await.unwrap().unwrap();
        assert_eq!(doc["assets"].as_array().unwrap().len(), 16);
        assert_eq!(doc["dns_latency_results"].as_array().unwrap().len(), 16);
    }
}
