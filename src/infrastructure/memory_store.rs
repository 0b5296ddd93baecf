use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageError;
use crate::models::{ProcessorProvider, StoredPaymentRecord, record_key};
use crate::ports::PaymentStore;

/// A thread-safe in-memory payment store.
///
/// Keys follow the same `<provider>:<id>` layout as the Redis store, so
/// saving the same id twice under one provider overwrites. Records never
/// expire. Used when no Redis URL is configured, and in tests.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    records: Arc<RwLock<HashMap<String, StoredPaymentRecord>>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, provider: ProcessorProvider, id: &str) -> Option<StoredPaymentRecord> {
        let records = self.records.read().await;
        records.get(&record_key(provider, id)).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn save(&self, record: &StoredPaymentRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        records.insert(record.key(), record.clone());
        Ok(())
    }

    async fn scan(
        &self,
        provider: ProcessorProvider,
    ) -> Result<Vec<StoredPaymentRecord>, StorageError> {
        let prefix = format!("{}:", provider);
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(_, record)| record.clone())
            .collect())
    }
}
