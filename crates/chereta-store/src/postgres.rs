//! Postgres-backed [`TenderStore`] on a shared `sqlx` pool.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::warn;

use chereta_core::{dates, RunStatus, TenderDetail, TenderSummary};

use crate::{StoreError, TenderStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tenders (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    bid_closing_date TEXT,
    bid_opening_date TEXT,
    published_on TEXT
);
CREATE TABLE IF NOT EXISTS tender_details (
    id TEXT PRIMARY KEY REFERENCES tenders(id) ON DELETE CASCADE,
    title TEXT,
    description TEXT,
    filed_under TEXT,
    company TEXT,
    metadata TEXT NOT NULL DEFAULT '{}',
    extra_fields TEXT NOT NULL DEFAULT '{}'
);
CREATE TABLE IF NOT EXISTS scrape_status (
    id BIGSERIAL PRIMARY KEY,
    run_at TIMESTAMPTZ NOT NULL,
    pages_scraped INTEGER NOT NULL,
    tenders_saved INTEGER NOT NULL
);
"#;

#[derive(Clone)]
pub struct PgTenderStore {
    pool: PgPool,
}

impl PgTenderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(5).connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn summary_from_row(row: &sqlx::postgres::PgRow) -> Result<TenderSummary, sqlx::Error> {
    Ok(TenderSummary {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        url: row.try_get("url")?,
        bid_closing_date: row.try_get("bid_closing_date")?,
        bid_opening_date: row.try_get("bid_opening_date")?,
        published_on: row.try_get("published_on")?,
    })
}

/// Decodes a stored JSON map, falling back to empty on malformed text so
/// one bad row never takes a query down.
fn decode_map(id: &str, column: &str, raw: &str) -> BTreeMap<String, String> {
    match serde_json::from_str(raw) {
        Ok(map) => map,
        Err(err) => {
            warn!(%id, column, "malformed stored map, treating as empty: {err}");
            BTreeMap::new()
        }
    }
}

#[async_trait]
impl TenderStore for PgTenderStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    async fn existing_ids(&self) -> Result<HashSet<String>, StoreError> {
        let rows = sqlx::query("SELECT id FROM tenders").fetch_all(&self.pool).await?;
        rows.iter().map(|row| row.try_get::<String, _>("id").map_err(StoreError::from)).collect()
    }

    async fn insert_summary(&self, summary: &TenderSummary) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO tenders (id, title, url, bid_closing_date, bid_opening_date, published_on) \
             VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (id) DO NOTHING",
        )
        .bind(&summary.id)
        .bind(&summary.title)
        .bind(&summary.url)
        .bind(&summary.bid_closing_date)
        .bind(&summary.bid_opening_date)
        .bind(&summary.published_on)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn upsert_detail(&self, id: &str, detail: &TenderDetail) -> Result<(), StoreError> {
        let metadata = serde_json::to_string(&detail.metadata)?;
        let extra_fields = serde_json::to_string(&detail.extra_fields)?;
        sqlx::query(
            "INSERT INTO tender_details (id, title, description, filed_under, company, metadata, extra_fields) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO UPDATE SET \
             title = EXCLUDED.title, description = EXCLUDED.description, \
             filed_under = EXCLUDED.filed_under, company = EXCLUDED.company, \
             metadata = EXCLUDED.metadata, extra_fields = EXCLUDED.extra_fields",
        )
        .bind(id)
        .bind(&detail.title)
        .bind(&detail.description)
        .bind(&detail.filed_under)
        .bind(&detail.company)
        .bind(&metadata)
        .bind(&extra_fields)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_run(&self, status: &RunStatus) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO scrape_status (run_at, pages_scraped, tenders_saved) VALUES ($1, $2, $3)",
        )
        .bind(status.run_at)
        .bind(status.pages_scraped as i32)
        .bind(status.tenders_saved as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_run(&self) -> Result<Option<RunStatus>, StoreError> {
        let row = sqlx::query(
            "SELECT run_at, pages_scraped, tenders_saved FROM scrape_status \
             ORDER BY run_at DESC, id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| {
            Ok(RunStatus {
                run_at: row.try_get::<DateTime<Utc>, _>("run_at")?,
                pages_scraped: row.try_get::<i32, _>("pages_scraped")? as u32,
                tenders_saved: row.try_get::<i32, _>("tenders_saved")? as u32,
            })
        })
        .transpose()
    }

    async fn find_summary(&self, id: &str) -> Result<Option<TenderSummary>, StoreError> {
        let row = sqlx::query(
            "SELECT id, title, url, bid_closing_date, bid_opening_date, published_on \
             FROM tenders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(summary_from_row).transpose().map_err(StoreError::from)
    }

    async fn find_detail(&self, id: &str) -> Result<Option<TenderDetail>, StoreError> {
        let row = sqlx::query(
            "SELECT title, description, filed_under, company, metadata, extra_fields \
             FROM tender_details WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let metadata: String = row.try_get("metadata")?;
        let extra_fields: String = row.try_get("extra_fields")?;
        Ok(Some(TenderDetail {
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            filed_under: row.try_get("filed_under")?,
            company: row.try_get("company")?,
            metadata: decode_map(id, "metadata", &metadata),
            extra_fields: decode_map(id, "extra_fields", &extra_fields),
        }))
    }

    async fn summaries_since(&self, cutoff: NaiveDate) -> Result<Vec<TenderSummary>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, title, url, bid_closing_date, bid_opening_date, published_on FROM tenders",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut summaries = Vec::new();
        for row in &rows {
            let summary = summary_from_row(row)?;
            if dates::in_window(summary.published_on.as_deref(), cutoff) {
                summaries.push(summary);
            }
        }
        Ok(summaries)
    }
}
