//! Scraping pipeline drivers: on-demand recent-window collection and
//! persisting seed/watch runs.

pub mod config;
pub mod runner;

pub use config::PipelineConfig;
pub use runner::{Pipeline, PipelineError};

pub const CRATE_NAME: &str = "chereta-pipeline";
