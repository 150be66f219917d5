//! Chat-facing read layer over the tender store.
//!
//! Exposed as a small JSON API shaped like the bot conversation: a range
//! query returns one message per tender with a follow-up action token, the
//! detail endpoint resolves that token, and `/status` reports the last run.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::error;

use chereta_core::{dates, TenderSummary};
use chereta_store::TenderStore;

pub mod format;
pub mod session;

pub use session::SessionCache;

pub const CRATE_NAME: &str = "chereta-bot";

const SESSION_CACHE_CAPACITY: usize = 512;

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn TenderStore>,
    cache: Arc<Mutex<SessionCache>>,
}

impl AppState {
    pub fn new(store: Arc<dyn TenderStore>) -> Self {
        Self {
            store,
            cache: Arc::new(Mutex::new(SessionCache::new(SESSION_CACHE_CAPACITY))),
        }
    }
}

/// One outgoing chat message. `action` carries the token a client sends
/// back to drill into a tender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl ChatMessage {
    fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), action: None }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RangeQuery {
    days: Option<u32>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/tenders", get(range_handler))
        .route("/tenders/{id}", get(detail_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}

pub async fn serve(store: Arc<dyn TenderStore>, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    axum::serve(listener, app(AppState::new(store))).await?;
    Ok(())
}

fn db_unavailable(err: impl std::fmt::Display) -> Response {
    error!("store query failed: {err}");
    (StatusCode::SERVICE_UNAVAILABLE, Json(ChatMessage::plain(format::DB_NOT_READY)))
        .into_response()
}

async fn range_handler(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Response {
    let days = query.days.unwrap_or(1).max(1);
    let cutoff = dates::cutoff_for_days(days, chrono::Utc::now().date_naive());
    let summaries = match state.store.summaries_since(cutoff).await {
        Ok(summaries) => summaries,
        Err(err) => return db_unavailable(err),
    };
    if summaries.is_empty() {
        return Json(vec![ChatMessage::plain(format::NO_TENDERS)]).into_response();
    }

    let mut cache = state.cache.lock().await;
    let messages: Vec<ChatMessage> = summaries
        .into_iter()
        .map(|summary| {
            let message = ChatMessage {
                text: format::summary_message(&summary),
                action: Some(format!("details:{}", summary.id)),
            };
            cache.insert(summary);
            message
        })
        .collect();
    Json(messages).into_response()
}

async fn detail_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let cached: Option<TenderSummary> = state.cache.lock().await.get(&id).cloned();
    let summary = match cached {
        Some(summary) => Some(summary),
        None => match state.store.find_summary(&id).await {
            Ok(summary) => summary,
            Err(err) => return db_unavailable(err),
        },
    };
    let Some(summary) = summary else {
        return (StatusCode::NOT_FOUND, Json(ChatMessage::plain(format::TENDER_NOT_FOUND)))
            .into_response();
    };
    let detail = match state.store.find_detail(&id).await {
        Ok(detail) => detail,
        Err(err) => return db_unavailable(err),
    };
    Json(ChatMessage::plain(format::detail_message(&summary, detail.as_ref()))).into_response()
}

async fn status_handler(State(state): State<AppState>) -> Response {
    match state.store.latest_run().await {
        Ok(status) => {
            Json(ChatMessage::plain(format::status_message(status.as_ref()))).into_response()
        }
        Err(err) => db_unavailable(err),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use chrono::Utc;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use chereta_core::TenderDetail;
    use chereta_store::MemoryStore;

    use super::*;

    fn summary(id: &str, published_on: Option<String>) -> TenderSummary {
        TenderSummary {
            id: id.to_string(),
            title: format!("Tender {id}"),
            url: format!("https://tender.example.test/tenders/{id}"),
            bid_closing_date: Some("Sep 10 2026".to_string()),
            bid_opening_date: None,
            published_on,
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn request(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn range_reply_lists_recent_tenders_with_actions() {
        let store = Arc::new(MemoryStore::new());
        let today = Utc::now().date_naive().format("%b %-d %Y").to_string();
        store.insert_summary(&summary("fresh", Some(today))).await.unwrap();
        store.insert_summary(&summary("stale", Some("Jan 2 2020".to_string()))).await.unwrap();

        let response = app(AppState::new(store)).oneshot(request("/tenders?days=7")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let messages = body.as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0]["text"].as_str().unwrap().contains("Tender fresh"));
        assert_eq!(messages[0]["action"].as_str().unwrap(), "details:fresh");
    }

    #[tokio::test]
    async fn empty_window_says_so() {
        let store = Arc::new(MemoryStore::new());
        let response = app(AppState::new(store)).oneshot(request("/tenders")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body[0]["text"], format::NO_TENDERS);
    }

    #[tokio::test]
    async fn failing_store_degrades_to_a_generic_notice() {
        let store = Arc::new(MemoryStore::new());
        store.set_failing(true);
        let response =
            app(AppState::new(store)).oneshot(request("/tenders?days=7")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["text"], format::DB_NOT_READY);
    }

    #[tokio::test]
    async fn detail_reply_for_unknown_id_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let response =
            app(AppState::new(store)).oneshot(request("/tenders/ghost")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["text"], format::TENDER_NOT_FOUND);
    }

    #[tokio::test]
    async fn detail_reply_before_enrichment_is_the_pending_notice() {
        let store = Arc::new(MemoryStore::new());
        store.insert_summary(&summary("bare", None)).await.unwrap();
        let response =
            app(AppState::new(store)).oneshot(request("/tenders/bare")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["text"], format::DETAILS_PENDING);
    }

    #[tokio::test]
    async fn detail_reply_renders_the_stored_record() {
        let store = Arc::new(MemoryStore::new());
        store.insert_summary(&summary("rich", None)).await.unwrap();
        let mut detail = TenderDetail::default();
        detail.company = Some("Roads Authority".to_string());
        store.upsert_detail("rich", &detail).await.unwrap();

        let response =
            app(AppState::new(store)).oneshot(request("/tenders/rich")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let text = body["text"].as_str().unwrap();
        assert!(text.contains("🏢 <b>Company</b>: Roads Authority"));
        assert!(text.contains("No description available."));
    }

    #[tokio::test]
    async fn status_with_no_runs_says_so() {
        let store = Arc::new(MemoryStore::new());
        let response = app(AppState::new(store)).oneshot(request("/status")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["text"], format::NO_RUNS);
    }
}
