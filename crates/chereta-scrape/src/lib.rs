//! Page rendering and markup extraction.
//!
//! Everything that knows about the tender site's CSS structure lives in
//! [`listing`] and [`detail`]; a markup change on the site is a change in
//! this crate only.

pub mod detail;
pub mod listing;
pub mod renderer;

pub use renderer::{FixtureRenderer, HttpRenderer, PageRenderer, RenderError};

pub const CRATE_NAME: &str = "chereta-scrape";
