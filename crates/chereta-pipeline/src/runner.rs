//! The two pipeline drivers: on-demand window collection and persisting
//! seed runs, plus the interval watch loop built on the latter.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use chereta_core::{dates, RunStatus, TenderSummary};
use chereta_scrape::detail::{extract_detail, DETAIL_READY_SELECTOR};
use chereta_scrape::listing::{extract_summaries, LISTING_READY_SELECTOR};
use chereta_scrape::{PageRenderer, RenderError};
use chereta_store::{StoreError, TenderStore};

use crate::config::PipelineConfig;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Pipeline {
    renderer: Arc<dyn PageRenderer>,
    store: Arc<dyn TenderStore>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        store: Arc<dyn TenderStore>,
        config: PipelineConfig,
    ) -> Self {
        Self { renderer, store, config }
    }

    async fn fetch_listing(&self, page: u32) -> Result<String, RenderError> {
        let url = self.config.listing_url(page);
        self.renderer.render(&url, LISTING_READY_SELECTOR, self.config.fetch_timeout).await
    }

    /// Walks listing pages newest-first and returns every tender published
    /// within the last `days` days, without touching the store.
    ///
    /// Pagination stops at the first page that carries parseable published
    /// dates but nothing inside the window, once at least one match is in
    /// hand; listings are newest-first, so later pages are older still.
    pub async fn collect_recent(&self, days: u32) -> Result<Vec<TenderSummary>, PipelineError> {
        let today = Utc::now().date_naive();
        let cutoff = dates::cutoff_for_days(days, today);
        let mut collected: Vec<TenderSummary> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for page in 1..=self.config.max_pages {
            let body = match self.fetch_listing(page).await {
                Ok(body) => body,
                Err(err) if !collected.is_empty() => {
                    warn!(page, "listing fetch failed, returning what was collected: {err}");
                    break;
                }
                Err(err) => return Err(err.into()),
            };
            let extraction = extract_summaries(&body, &self.config.origin);
            for skipped in &extraction.skipped {
                warn!(page, reason = ?skipped.reason, context = %skipped.context, "skipping entry");
            }
            if extraction.summaries.is_empty() {
                break;
            }

            let mut page_has_dated = false;
            let mut page_has_recent = false;
            for summary in extraction.summaries {
                if dates::parse(summary.published_on.as_deref().unwrap_or_default()).is_some() {
                    page_has_dated = true;
                }
                if dates::in_window_at(summary.published_on.as_deref(), cutoff, today)
                    && seen.insert(summary.id.clone())
                {
                    page_has_recent = true;
                    collected.push(summary);
                }
            }
            if page_has_dated && !page_has_recent && !collected.is_empty() {
                break;
            }
        }
        Ok(collected)
    }

    /// One persisting run: walks up to `pages` listing pages, stores records
    /// the database has not seen, optionally enriches each new record from
    /// its detail page, and appends a provenance row.
    pub async fn seed(&self, pages: u32, scrape_details: bool) -> Result<RunStatus, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("seed_run", %run_id, pages, scrape_details);
        self.seed_inner(pages, scrape_details).instrument(span).await
    }

    async fn seed_inner(
        &self,
        pages: u32,
        scrape_details: bool,
    ) -> Result<RunStatus, PipelineError> {
        self.store.ensure_schema().await?;
        let mut known = self.store.existing_ids().await?;
        let mut saved: u32 = 0;

        'pages: for page in 1..=pages {
            let body = match self.fetch_listing(page).await {
                Ok(body) => body,
                Err(err) => {
                    warn!(page, "listing fetch failed, ending run early: {err}");
                    break 'pages;
                }
            };
            let extraction = extract_summaries(&body, &self.config.origin);
            for skipped in &extraction.skipped {
                warn!(page, reason = ?skipped.reason, context = %skipped.context, "skipping entry");
            }
            if extraction.summaries.is_empty() {
                info!(page, "empty listing page, ending run");
                break 'pages;
            }
            for summary in extraction.summaries {
                if !known.insert(summary.id.clone()) {
                    continue;
                }
                if self.store.insert_summary(&summary).await? {
                    saved += 1;
                }
                if scrape_details {
                    self.enrich(&summary).await;
                }
            }
        }

        let status = RunStatus { run_at: Utc::now(), pages_scraped: pages, tenders_saved: saved };
        self.store.record_run(&status).await?;
        info!(saved, "run complete");
        Ok(status)
    }

    /// Detail enrichment is best effort: a failed detail page costs that
    /// record its detail row, never the run.
    async fn enrich(&self, summary: &TenderSummary) {
        let body = match self
            .renderer
            .render(&summary.url, DETAIL_READY_SELECTOR, self.config.fetch_timeout)
            .await
        {
            Ok(body) => body,
            Err(err) => {
                warn!(id = %summary.id, "detail fetch failed, keeping summary only: {err}");
                return;
            }
        };
        let detail = extract_detail(&body);
        if let Err(err) = self.store.upsert_detail(&summary.id, &detail).await {
            warn!(id = %summary.id, "detail upsert failed: {err}");
        }
    }

    /// Runs [`Self::seed`] forever at a fixed interval. A failed run is
    /// logged and the loop keeps going.
    pub async fn run_forever(&self, interval: Duration, pages: u32, scrape_details: bool) -> ! {
        loop {
            if let Err(err) = self.seed(pages, scrape_details).await {
                warn!("scheduled run failed: {err}");
            }
            tokio::time::sleep(interval).await;
        }
    }
}
