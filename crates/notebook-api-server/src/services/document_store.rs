use anyhow::Result;
use dashmap::DashMap;
use tracing::debug;

use crate::models::document::DocumentRecord;
use crate::services::conversation::DocumentStore;

/// Registry of uploaded documents keyed by `file_id`.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    records: DashMap<String, DocumentRecord>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait::async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, record: DocumentRecord) -> Result<()> {
        debug!(file_id = %record.file_id, file_name = %record.file_name, "Registering document");
        self.records.insert(record.file_id.clone(), record);
        Ok(())
    }

    async fn get(&self, document_id: &str) -> Result<Option<DocumentRecord>> {
        Ok(self.records.get(document_id).map(|r| r.value().clone()))
    }

    async fn contains(&self, document_id: &str) -> Result<bool> {
        Ok(self.records.contains_key(document_id))
    }

    /// Oldest first
    async fn list(&self) -> Result<Vec<DocumentRecord>> {
        let mut records: Vec<DocumentRecord> =
            self.records.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.file_id.cmp(&b.file_id))
        });
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn record(id: &str, age_secs: i64) -> DocumentRecord {
        DocumentRecord {
            file_id: id.to_string(),
            file_name: format!("{}.txt", id),
            file_size: 0.0,
            content_type: "text/plain".to_string(),
            chunk_count: 1,
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let store = InMemoryDocumentStore::new();
        assert!(store.is_empty());

        store.insert(record("a", 0)).await.unwrap();
        assert!(store.contains("a").await.unwrap());
        assert!(!store.contains("b").await.unwrap());
        assert_eq!(store.get("a").await.unwrap().unwrap().file_name, "a.txt");
        assert!(store.get("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_is_oldest_first() {
        let store = InMemoryDocumentStore::new();
        store.insert(record("new", 0)).await.unwrap();
        store.insert(record("old", 60)).await.unwrap();

        let ids: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.file_id)
            .collect();
        assert_eq!(ids, vec!["old", "new"]);
        assert_eq!(store.len(), 2);
    }
}
