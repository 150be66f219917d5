//! Persistence gateway: the only crate that speaks SQL.
//!
//! [`TenderStore`] is the seam between the pipeline/chat layers and the
//! database. [`PgTenderStore`] is the production Postgres implementation;
//! [`MemoryStore`] backs tests and end-to-end pipeline scenarios.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use chereta_core::{RunStatus, TenderDetail, TenderSummary};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgTenderStore;

pub const CRATE_NAME: &str = "chereta-store";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("could not encode detail payload: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait TenderStore: Send + Sync {
    /// Creates the schema if absent. Safe to call on every startup.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Every tender id currently stored. Loaded once per run so page
    /// filtering never round-trips per record.
    async fn existing_ids(&self) -> Result<HashSet<String>, StoreError>;

    /// Inserts a summary, returning `true` iff the row is new. An existing
    /// id is left untouched.
    async fn insert_summary(&self, summary: &TenderSummary) -> Result<bool, StoreError>;

    /// Inserts or fully replaces the detail row for `id`.
    async fn upsert_detail(&self, id: &str, detail: &TenderDetail) -> Result<(), StoreError>;

    async fn record_run(&self, status: &RunStatus) -> Result<(), StoreError>;

    async fn latest_run(&self) -> Result<Option<RunStatus>, StoreError>;

    async fn find_summary(&self, id: &str) -> Result<Option<TenderSummary>, StoreError>;

    async fn find_detail(&self, id: &str) -> Result<Option<TenderDetail>, StoreError>;

    /// Summaries whose published date parses and falls on or after `cutoff`.
    /// Stored dates are free text, so the window test runs here rather than
    /// in SQL.
    async fn summaries_since(&self, cutoff: NaiveDate) -> Result<Vec<TenderSummary>, StoreError>;
}
