//! Core domain model for the tender notifier.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod config;
pub mod dates;

pub const CRATE_NAME: &str = "chereta-core";

/// One listing-page entry, keyed by the trailing path segment of its
/// canonical url. Date fields keep the raw page text verbatim; parsing
/// happens only at the window-filter boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenderSummary {
    pub id: String,
    pub title: String,
    pub url: String,
    pub bid_closing_date: Option<String>,
    pub bid_opening_date: Option<String>,
    pub published_on: Option<String>,
}

/// Enriched record scraped from a tender's detail page. At most one per
/// [`TenderSummary`] id; a detail upsert replaces the whole row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TenderDetail {
    pub title: Option<String>,
    pub description: Option<String>,
    pub filed_under: Option<String>,
    pub company: Option<String>,
    /// Values for the fixed set of known detail labels, keyed by the
    /// canonical names in [`METADATA_DISPLAY_ORDER`] plus the two bid dates.
    pub metadata: BTreeMap<String, String>,
    /// Values for labels outside the known set, keyed by the label text as
    /// it appeared on the page (trailing colon stripped).
    pub extra_fields: BTreeMap<String, String>,
}

/// Append-only provenance row written at the end of every persisting run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatus {
    pub run_at: DateTime<Utc>,
    pub pages_scraped: u32,
    pub tenders_saved: u32,
}

/// Known detail-page labels and their canonical metadata keys.
const DETAIL_FIELDS: &[(&str, &str)] = &[
    ("bid closing date", "bid_closing_date"),
    ("bid opening date", "bid_opening_date"),
    ("published on", "published_on"),
    ("posted", "posted"),
    ("bid document price", "bid_document_price"),
    ("bid bond", "bid_bond"),
    ("region", "region"),
    ("bidding", "bidding_type"),
];

/// Display order for known metadata keys in chat messages. Closing and
/// opening dates are rendered from the summary instead.
pub const METADATA_DISPLAY_ORDER: &[(&str, &str)] = &[
    ("published_on", "Published"),
    ("posted", "Posted"),
    ("bid_document_price", "Bid document price"),
    ("bid_bond", "Bid bond"),
    ("region", "Region"),
    ("bidding_type", "Bidding"),
];

/// Maps a lower-cased, colon-stripped detail label to its canonical
/// metadata key, or `None` for labels outside the known set.
pub fn canonical_metadata_key(label: &str) -> Option<&'static str> {
    DETAIL_FIELDS
        .iter()
        .find(|(l, _)| *l == label)
        .map(|(_, key)| *key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_labels_map_to_canonical_keys() {
        assert_eq!(canonical_metadata_key("bid bond"), Some("bid_bond"));
        assert_eq!(canonical_metadata_key("bidding"), Some("bidding_type"));
        assert_eq!(canonical_metadata_key("lot number"), None);
    }

    #[test]
    fn detail_default_has_empty_maps() {
        let detail = TenderDetail::default();
        assert!(detail.metadata.is_empty());
        assert!(detail.extra_fields.is_empty());
    }
}
