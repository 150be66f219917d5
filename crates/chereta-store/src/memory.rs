//! In-memory [`TenderStore`] for tests and pipeline scenarios.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use chereta_core::{dates, RunStatus, TenderDetail, TenderSummary};

use crate::{StoreError, TenderStore};

#[derive(Debug, Default)]
struct Inner {
    /// Insertion order preserved so listings read oldest-first, matching
    /// the append-only production table.
    summaries: Vec<TenderSummary>,
    details: HashMap<String, TenderDetail>,
    runs: Vec<RunStatus>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every operation fail with a pool timeout, for exercising
    /// degraded-database paths.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TenderStore for MemoryStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.check()
    }

    async fn existing_ids(&self) -> Result<HashSet<String>, StoreError> {
        self.check()?;
        let inner = self.inner.lock().await;
        Ok(inner.summaries.iter().map(|s| s.id.clone()).collect())
    }

    async fn insert_summary(&self, summary: &TenderSummary) -> Result<bool, StoreError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        if inner.summaries.iter().any(|s| s.id == summary.id) {
            return Ok(false);
        }
        inner.summaries.push(summary.clone());
        Ok(true)
    }

    async fn upsert_detail(&self, id: &str, detail: &TenderDetail) -> Result<(), StoreError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        inner.details.insert(id.to_string(), detail.clone());
        Ok(())
    }

    async fn record_run(&self, status: &RunStatus) -> Result<(), StoreError> {
        self.check()?;
        let mut inner = self.inner.lock().await;
        inner.runs.push(status.clone());
        Ok(())
    }

    async fn latest_run(&self) -> Result<Option<RunStatus>, StoreError> {
        self.check()?;
        let inner = self.inner.lock().await;
        Ok(inner.runs.iter().max_by_key(|run| run.run_at).cloned())
    }

    async fn find_summary(&self, id: &str) -> Result<Option<TenderSummary>, StoreError> {
        self.check()?;
        let inner = self.inner.lock().await;
        Ok(inner.summaries.iter().find(|s| s.id == id).cloned())
    }

    async fn find_detail(&self, id: &str) -> Result<Option<TenderDetail>, StoreError> {
        self.check()?;
        let inner = self.inner.lock().await;
        Ok(inner.details.get(id).cloned())
    }

    async fn summaries_since(&self, cutoff: NaiveDate) -> Result<Vec<TenderSummary>, StoreError> {
        self.check()?;
        let inner = self.inner.lock().await;
        Ok(inner
            .summaries
            .iter()
            .filter(|s| dates::in_window(s.published_on.as_deref(), cutoff))
            .cloned()
            .collect())
    }
}
