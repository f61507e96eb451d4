//! Proof record publisher.
//!
//! Once a mint is included, a [`ProofRecord`] is written to object storage
//! under `<prefix>/<expected-address>`; the display flow reads it back by
//! the same key. Storage is best effort: publish failures are logged and
//! never fail the mint that produced the record.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::types::ProofRecord;

pub mod http;

pub use http::HttpRecordStore;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("object storage request failed: {0}")]
    Transport(String),
    #[error("object storage returned HTTP status {0}")]
    Status(u16),
    #[error("stored record is malformed: {0}")]
    Decode(String),
}

/// Key-value object storage.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError>;

    /// `Ok(None)` when no object exists under `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
}

pub struct ProofRecordPublisher {
    store: Arc<dyn RecordStore>,
    prefix: String,
}

impl ProofRecordPublisher {
    pub fn new(store: Arc<dyn RecordStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    pub fn object_key(&self, key: &str) -> String {
        format!("{}/{}", self.prefix.trim_end_matches('/'), key)
    }

    /// Stores `record` under `key`. Returns whether the write succeeded.
    pub async fn publish(&self, key: &str, record: &ProofRecord) -> bool {
        let object = self.object_key(key);
        let body = match serde_json::to_vec(record) {
            Ok(b) => b,
            Err(e) => {
                warn!(object, "failed to encode proof record: {e}");
                return false;
            }
        };

        match self.store.put(&object, body).await {
            Ok(()) => {
                info!(object, "proof record published");
                true
            }
            Err(e) => {
                warn!(object, "proof record publish failed: {e}");
                false
            }
        }
    }

    /// Reads the record stored under `key`, if any.
    pub async fn fetch(&self, key: &str) -> Option<ProofRecord> {
        let object = self.object_key(key);
        match self.store.get(&object).await {
            Ok(Some(body)) => match serde_json::from_slice(&body) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(object, "{}", StoreError::Decode(e.to_string()));
                    None
                }
            },
            Ok(None) => {
                debug!(object, "no proof record stored");
                None
            }
            Err(e) => {
                warn!(object, "proof record fetch failed: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use serde_json::json;

    use crate::types::ProofInfo;

    #[derive(Default)]
    struct MemoryStore {
        objects: Mutex<HashMap<String, Vec<u8>>>,
        fail_puts: bool,
    }

    impl MemoryStore {
        fn failing() -> Self {
            Self {
                fail_puts: true,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl RecordStore for MemoryStore {
        async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
            if self.fail_puts {
                return Err(StoreError::Status(403));
            }
            self.objects.lock().unwrap().insert(key.to_string(), body);
            Ok(())
        }

        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            Ok(self.objects.lock().unwrap().get(key).cloned())
        }
    }

    fn record() -> ProofRecord {
        ProofRecord::new(
            "dmyjURuBeJwFo4Nvf2GZ8f5E2Asz98JY2d7UcaDykqYm1zpoi",
            "zkBAB",
            ProofInfo {
                proof_id: "0x01".into(),
                blur_url: "https://example.invalid/front.jpg".into(),
                asset_id: "5".into(),
                transaction_data: json!({ "ToPrivate": [] }),
            },
        )
    }

    #[tokio::test]
    async fn publish_then_fetch_uses_prefixed_key() {
        let store = Arc::new(MemoryStore::default());
        let publisher = ProofRecordPublisher::new(store.clone(), "kyc");

        assert!(publisher.publish("0xabc", &record()).await);
        assert!(store.objects.lock().unwrap().contains_key("kyc/0xabc"));
        assert_eq!(publisher.fetch("0xabc").await, Some(record()));
        assert_eq!(publisher.fetch("0xother").await, None);
    }

    #[tokio::test]
    async fn publish_failure_is_swallowed() {
        let publisher = ProofRecordPublisher::new(Arc::new(MemoryStore::failing()), "kyc");
        assert!(!publisher.publish("0xabc", &record()).await);
    }

    #[tokio::test]
    async fn malformed_record_is_none() {
        let store = Arc::new(MemoryStore::default());
        store
            .objects
            .lock()
            .unwrap()
            .insert("kyc/0xabc".into(), b"not json".to_vec());
        let publisher = ProofRecordPublisher::new(store, "kyc/");
        assert_eq!(publisher.fetch("0xabc").await, None);
    }
}
