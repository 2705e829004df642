//! Result Store
//!
//! Keyed storage for completed assessments. The in-memory implementation
//! keeps everything until shutdown; deployments needing persistence or
//! eviction can provide another [`ResultStore`].

use crate::types::UnifiedAssessment;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Storage for completed assessments
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Store an assessment under its id (replaces an existing entry)
    async fn put(&self, assessment: UnifiedAssessment);

    async fn get(&self, id: Uuid) -> Option<UnifiedAssessment>;

    /// Most recent assessments first
    ///
    /// Ordered by `created_at` descending; on equal timestamps the later
    /// insertion comes first.
    async fn list_recent(&self, limit: usize) -> Vec<UnifiedAssessment>;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

struct StoredAssessment {
    sequence: u64,
    assessment: UnifiedAssessment,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<Uuid, StoredAssessment>,
    next_sequence: u64,
}

/// Process-local store guarded by an async RwLock
#[derive(Default)]
pub struct InMemoryResultStore {
    inner: RwLock<Inner>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn put(&self, assessment: UnifiedAssessment) {
        let mut inner = self.inner.write().await;
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.entries.insert(
            assessment.id,
            StoredAssessment {
                sequence,
                assessment,
            },
        );
    }

    async fn get(&self, id: Uuid) -> Option<UnifiedAssessment> {
        self.inner
            .read()
            .await
            .entries
            .get(&id)
            .map(|stored| stored.assessment.clone())
    }

    async fn list_recent(&self, limit: usize) -> Vec<UnifiedAssessment> {
        let inner = self.inner.read().await;
        let mut stored: Vec<&StoredAssessment> = inner.entries.values().collect();
        stored.sort_by(|a, b| {
            b.assessment
                .created_at
                .cmp(&a.assessment.created_at)
                .then(b.sequence.cmp(&a.sequence))
        });
        stored
            .into_iter()
            .take(limit)
            .map(|s| s.assessment.clone())
            .collect()
    }

    async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RiskTier;
    use chrono::{DateTime, Duration, Utc};

    fn assessment(name: &str, created_at: DateTime<Utc>) -> UnifiedAssessment {
        UnifiedAssessment {
            id: Uuid::new_v4(),
            original_filename: name.to_string(),
            content_hash: "00".to_string(),
            content_type: "image/png".to_string(),
            file_size: 4,
            overall_risk_tier: RiskTier::Low,
            overall_confidence: 0.0,
            total_matches: 0,
            total_elapsed_ms: 0,
            reports: Vec::new(),
            risk_factors: Vec::new(),
            recommendations: Vec::new(),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = InMemoryResultStore::new();
        let a = assessment("a.png", Utc::now());
        let id = a.id;

        assert!(store.is_empty().await);
        store.put(a.clone()).await;

        assert_eq!(store.get(id).await, Some(a));
        assert_eq!(store.get(Uuid::new_v4()).await, None);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_list_recent_orders_newest_first() {
        let store = InMemoryResultStore::new();
        let now = Utc::now();

        store.put(assessment("old.png", now - Duration::seconds(10))).await;
        store.put(assessment("tie-first.png", now)).await;
        store.put(assessment("tie-second.png", now)).await;
        store.put(assessment("middle.png", now - Duration::seconds(5))).await;

        let names: Vec<String> = store
            .list_recent(10)
            .await
            .into_iter()
            .map(|a| a.original_filename)
            .collect();
        assert_eq!(
            names,
            vec!["tie-second.png", "tie-first.png", "middle.png", "old.png"]
        );

        assert_eq!(store.list_recent(2).await.len(), 2);
        assert!(store.list_recent(0).await.is_empty());
    }
}
