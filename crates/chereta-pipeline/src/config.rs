//! Pipeline settings, environment-driven with workable defaults.

use std::time::Duration;

use chereta_core::config::{env_or, env_parse_or};

pub const DEFAULT_ORIGIN: &str = "https://tender.2merkato.com";
pub const DEFAULT_MAX_PAGES: u32 = 50;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Site origin; listing and detail urls are resolved against it.
    pub origin: String,
    /// Hard ceiling on pages walked in one run, whatever the stop rules say.
    pub max_pages: u32,
    pub fetch_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            max_pages: DEFAULT_MAX_PAGES,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self {
            origin: env_or("CHERETA_ORIGIN", DEFAULT_ORIGIN),
            max_pages: env_parse_or("CHERETA_MAX_PAGES", DEFAULT_MAX_PAGES),
            fetch_timeout: Duration::from_secs(env_parse_or(
                "CHERETA_FETCH_TIMEOUT_SECS",
                DEFAULT_FETCH_TIMEOUT_SECS,
            )),
        }
    }

    /// Url of the paginated free-tender listing, 1-based.
    pub fn listing_url(&self, page: u32) -> String {
        format!("{}/tenders/free?page={page}", self.origin.trim_end_matches('/'))
    }
}
