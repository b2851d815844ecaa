//! Boundary to the persistent storage collaborator.
//!
//! Jobs, automation-attempt logs, and their actual backing store live
//! outside this engine; the core consumes them only through [`JobStore`].
//! [`MemoryJobStore`] is the in-process implementation used by tests and
//! the CLI.

use crate::core::types::{AutomationAttempt, JobRecord, ManualAssistRequest};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Look up one job record by id.
    async fn job(&self, id: &str) -> Result<Option<JobRecord>, StoreError>;

    /// Append one automation-attempt log record.
    async fn record_attempt(&self, attempt: AutomationAttempt) -> Result<(), StoreError>;

    /// Queue a job for human takeover.
    async fn record_manual_assist(&self, request: ManualAssistRequest) -> Result<(), StoreError>;
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, JobRecord>>,
    attempts: RwLock<Vec<AutomationAttempt>>,
    manual_assists: RwLock<Vec<ManualAssistRequest>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jobs(jobs: impl IntoIterator<Item = JobRecord>) -> Self {
        let store = Self::default();
        {
            let mut guard = store.jobs.try_write().expect("fresh store");
            for job in jobs {
                guard.insert(job.id.clone(), job);
            }
        }
        store
    }

    pub async fn insert_job(&self, job: JobRecord) {
        self.jobs.write().await.insert(job.id.clone(), job);
    }

    /// Snapshot of recorded attempts, in append order.
    pub async fn attempts(&self) -> Vec<AutomationAttempt> {
        self.attempts.read().await.clone()
    }

    /// Snapshot of queued manual-assist requests.
    pub async fn manual_assists(&self) -> Vec<ManualAssistRequest> {
        self.manual_assists.read().await.clone()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn job(&self, id: &str) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn record_attempt(&self, attempt: AutomationAttempt) -> Result<(), StoreError> {
        self.attempts.write().await.push(attempt);
        Ok(())
    }

    async fn record_manual_assist(&self, request: ManualAssistRequest) -> Result<(), StoreError> {
        self.manual_assists.write().await.push(request);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn job(id: &str) -> JobRecord {
        JobRecord {
            id: id.to_string(),
            url: format!("https://example.com/jobs/{}", id),
            title: "Engineer".to_string(),
            board_hint: None,
        }
    }

    #[tokio::test]
    async fn test_lookup_and_missing() {
        let store = MemoryJobStore::with_jobs([job("a")]);
        assert!(store.job("a").await.unwrap().is_some());
        assert!(store.job("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_attempts_append_in_order() {
        let store = MemoryJobStore::new();
        for stage in ["detect", "fill", "submit"] {
            store
                .record_attempt(AutomationAttempt {
                    job_id: "a".into(),
                    stage: stage.into(),
                    success: true,
                    message: String::new(),
                    timestamp: Utc::now(),
                })
                .await
                .unwrap();
        }
        let stages: Vec<String> = store
            .attempts()
            .await
            .into_iter()
            .map(|a| a.stage)
            .collect();
        assert_eq!(stages, vec!["detect", "fill", "submit"]);
    }
}
