//! The fetch capability: "rendered HTML for a url, waiting for a named
//! element, within a timeout".

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum RenderError {
    /// The page loaded but the ready element never appeared, or the request
    /// itself timed out.
    #[error("timed out waiting for `{selector}` at {url}")]
    ElementTimeout { url: String, selector: String },
    #[error("navigation failed for {url}: {reason}")]
    Navigation { url: String, reason: String },
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("invalid ready selector `{0}`")]
    Selector(String),
}

#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Fetches the rendered document at `url`, failing unless an element
    /// matching `ready_selector` is present within `timeout`.
    async fn render(
        &self,
        url: &str,
        ready_selector: &str,
        timeout: Duration,
    ) -> Result<String, RenderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryDisposition {
    Retryable,
    NonRetryable,
}

fn classify_status(status: reqwest::StatusCode) -> RetryDisposition {
    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

fn classify_reqwest_error(err: &reqwest::Error) -> RetryDisposition {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl BackoffPolicy {
    fn delay_for_attempt(&self, attempt_index: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt_index as u32).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// HTTP-backed renderer. The ready selector is verified against the fetched
/// document; a page that never grew the element is reported as the
/// timeout-class failure. A headless-browser renderer can be slotted behind
/// the same trait without touching callers.
#[derive(Debug)]
pub struct HttpRenderer {
    client: reqwest::Client,
    backoff: BackoffPolicy,
}

impl HttpRenderer {
    pub fn new(user_agent: &str) -> Result<Self, RenderError> {
        let client = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .user_agent(user_agent)
            .build()
            .map_err(|err| RenderError::Navigation {
                url: String::new(),
                reason: err.to_string(),
            })?;
        Ok(Self {
            client,
            backoff: BackoffPolicy::default(),
        })
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    async fn fetch_body(&self, url: &str, timeout: Duration) -> Result<String, RenderError> {
        for attempt in 0..=self.backoff.max_retries {
            let response = self.client.get(url).timeout(timeout).send().await;
            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp.text().await.map_err(|err| RenderError::Navigation {
                            url: url.to_string(),
                            reason: err.to_string(),
                        });
                    }
                    if classify_status(status) == RetryDisposition::Retryable
                        && attempt < self.backoff.max_retries
                    {
                        tokio::time::sleep(self.backoff.delay_for_attempt(attempt)).await;
                        continue;
                    }
                    return Err(RenderError::HttpStatus {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }
                Err(err) if err.is_timeout() => {
                    if attempt < self.backoff.max_retries {
                        tokio::time::sleep(self.backoff.delay_for_attempt(attempt)).await;
                        continue;
                    }
                    return Err(RenderError::ElementTimeout {
                        url: url.to_string(),
                        selector: String::new(),
                    });
                }
                Err(err) => {
                    if classify_reqwest_error(&err) == RetryDisposition::Retryable
                        && attempt < self.backoff.max_retries
                    {
                        warn!(url, attempt, "retrying fetch: {err}");
                        tokio::time::sleep(self.backoff.delay_for_attempt(attempt)).await;
                        continue;
                    }
                    return Err(RenderError::Navigation {
                        url: url.to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        unreachable!("retry loop always returns")
    }
}

fn has_ready_element(body: &str, ready_selector: &str) -> Result<bool, RenderError> {
    let selector = Selector::parse(ready_selector)
        .map_err(|_| RenderError::Selector(ready_selector.to_string()))?;
    let document = Html::parse_document(body);
    Ok(document.select(&selector).next().is_some())
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    async fn render(
        &self,
        url: &str,
        ready_selector: &str,
        timeout: Duration,
    ) -> Result<String, RenderError> {
        let body = self.fetch_body(url, timeout).await.map_err(|err| match err {
            RenderError::ElementTimeout { url, .. } => RenderError::ElementTimeout {
                url,
                selector: ready_selector.to_string(),
            },
            other => other,
        })?;
        if has_ready_element(&body, ready_selector)? {
            Ok(body)
        } else {
            Err(RenderError::ElementTimeout {
                url: url.to_string(),
                selector: ready_selector.to_string(),
            })
        }
    }
}

/// In-memory renderer mapping urls to canned documents. Used by pipeline
/// and extractor tests in place of the live site.
#[derive(Debug, Default)]
pub struct FixtureRenderer {
    pages: HashMap<String, String>,
}

impl FixtureRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.insert(url.into(), body.into());
        self
    }
}

#[async_trait]
impl PageRenderer for FixtureRenderer {
    async fn render(
        &self,
        url: &str,
        ready_selector: &str,
        _timeout: Duration,
    ) -> Result<String, RenderError> {
        let body = self.pages.get(url).ok_or_else(|| RenderError::Navigation {
            url: url.to_string(),
            reason: "no fixture registered".to_string(),
        })?;
        if has_ready_element(body, ready_selector)? {
            Ok(body.clone())
        } else {
            Err(RenderError::ElementTimeout {
                url: url.to_string(),
                selector: ready_selector.to_string(),
            })
        }
    }
}
