//! Listing-page extraction: one [`TenderSummary`] per card.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use chereta_core::TenderSummary;

/// Element whose presence marks a listing page as fully rendered.
pub const LISTING_READY_SELECTOR: &str = "h3.font-medium.text-lg.tracking-wide.leading-6 a";

static HEADING: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("h3.font-medium.text-lg.tracking-wide.leading-6").expect("heading selector")
});
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").expect("anchor selector"));
static META_ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.flex.gap-x-4").expect("meta row selector"));
static META_LABEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.font-medium").expect("meta label selector"));

/// Why a listing card was dropped instead of becoming a summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingLink,
    MissingTitle,
    EmptyId,
    DuplicateId(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub reason: SkipReason,
    /// Nearby text from the card, for log lines.
    pub context: String,
}

/// Result of extracting one listing page. Skips are per-card; a malformed
/// card never aborts the page.
#[derive(Debug, Default)]
pub struct PageExtraction {
    pub summaries: Vec<TenderSummary>,
    pub skipped: Vec<SkippedEntry>,
}

fn collapse_ws(text: impl Iterator<Item = impl AsRef<str>>) -> String {
    let mut joined = String::new();
    for piece in text {
        for word in piece.as_ref().split_whitespace() {
            if !joined.is_empty() {
                joined.push(' ');
            }
            joined.push_str(word);
        }
    }
    joined
}

fn element_text(el: ElementRef<'_>) -> String {
    collapse_ws(el.text())
}

/// Joins a relative href onto the site origin; absolute urls pass through.
pub fn absolutize(origin: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    let origin = origin.trim_end_matches('/');
    if href.starts_with('/') {
        format!("{origin}{href}")
    } else {
        format!("{origin}/{href}")
    }
}

/// The tender id is the final non-empty path segment of the canonical url.
pub fn id_from_url(url: &str) -> Option<String> {
    let trimmed = url.trim_end_matches('/');
    let without_scheme = trimmed.split_once("://").map_or(trimmed, |(_, rest)| rest);
    let segment = without_scheme.rsplit('/').next()?;
    if segment.is_empty() || !without_scheme.contains('/') {
        None
    } else {
        Some(segment.to_string())
    }
}

fn normalize_label(raw: &str) -> String {
    raw.trim().trim_end_matches(':').trim().to_lowercase()
}

/// Label/value pair from one metadata row. The label sits in the
/// `font-medium` div; the value is the div that follows it.
fn read_meta_row(row: ElementRef<'_>) -> Option<(String, String)> {
    let label_el = row.select(&META_LABEL).next()?;
    let label = element_text(label_el);
    let value = label_el
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "div")
        .map(element_text)?;
    if label.is_empty() || value.is_empty() {
        return None;
    }
    Some((normalize_label(&label), value))
}

/// Reads the three dates shown on a listing card. The rows live in the
/// div that follows the heading's parent.
fn card_dates(heading: ElementRef<'_>) -> (Option<String>, Option<String>, Option<String>) {
    let mut closing = None;
    let mut opening = None;
    let mut published = None;
    let Some(detail_div) = heading.parent().and_then(ElementRef::wrap).and_then(|parent| {
        parent
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "div")
    }) else {
        return (closing, opening, published);
    };
    for row in detail_div.select(&META_ROW) {
        let Some((label, value)) = read_meta_row(row) else {
            continue;
        };
        if label.contains("closing date") {
            closing.get_or_insert(value);
        } else if label.contains("opening date") {
            opening.get_or_insert(value);
        } else if label.contains("published") {
            published.get_or_insert(value);
        }
    }
    (closing, opening, published)
}

/// Extracts every tender card on a rendered listing page. Ids repeated on
/// the same page are kept once, first occurrence wins.
pub fn extract_summaries(body: &str, origin: &str) -> PageExtraction {
    let document = Html::parse_document(body);
    let mut out = PageExtraction::default();
    let mut seen: HashSet<String> = HashSet::new();

    for heading in document.select(&HEADING) {
        let context = element_text(heading);
        let Some(anchor) = heading.select(&ANCHOR).next() else {
            out.skipped.push(SkippedEntry { reason: SkipReason::MissingLink, context });
            continue;
        };
        let Some(href) = anchor.value().attr("href") else {
            out.skipped.push(SkippedEntry { reason: SkipReason::MissingLink, context });
            continue;
        };
        let title = element_text(anchor);
        if title.is_empty() {
            out.skipped.push(SkippedEntry { reason: SkipReason::MissingTitle, context });
            continue;
        }
        let url = absolutize(origin, href);
        let Some(id) = id_from_url(&url) else {
            out.skipped.push(SkippedEntry { reason: SkipReason::EmptyId, context });
            continue;
        };
        if !seen.insert(id.clone()) {
            debug!(%id, "duplicate id on page, keeping first");
            out.skipped.push(SkippedEntry {
                reason: SkipReason::DuplicateId(id),
                context,
            });
            continue;
        }
        let (bid_closing_date, bid_opening_date, published_on) = card_dates(heading);
        out.summaries.push(TenderSummary {
            id,
            title,
            url,
            bid_closing_date,
            bid_opening_date,
            published_on,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: &str, title: &str, published: &str) -> String {
        format!(
            r#"<div class="card">
              <div>
                <h3 class="font-medium text-lg tracking-wide leading-6">
                  <a href="/tenders/{id}">{title}</a>
                </h3>
              </div>
              <div>
                <div class="flex gap-x-4">
                  <div class="font-medium">Bid closing date :</div>
                  <div>Sep 10 2026</div>
                </div>
                <div class="flex gap-x-4">
                  <div class="font-medium">Published on :</div>
                  <div>{published}</div>
                </div>
              </div>
            </div>"#
        )
    }

    fn page(cards: &[String]) -> String {
        format!("<html><body>{}</body></html>", cards.join("\n"))
    }

    #[test]
    fn extracts_title_url_id_and_dates() {
        let body = page(&[card("road-maintenance-7", "Road Maintenance", "Aug 25 2026")]);
        let out = extract_summaries(&body, "https://tender.example.test");
        assert!(out.skipped.is_empty());
        assert_eq!(out.summaries.len(), 1);
        let s = &out.summaries[0];
        assert_eq!(s.id, "road-maintenance-7");
        assert_eq!(s.title, "Road Maintenance");
        assert_eq!(s.url, "https://tender.example.test/tenders/road-maintenance-7");
        assert_eq!(s.bid_closing_date.as_deref(), Some("Sep 10 2026"));
        assert_eq!(s.bid_opening_date, None);
        assert_eq!(s.published_on.as_deref(), Some("Aug 25 2026"));
    }

    #[test]
    fn absolute_hrefs_pass_through() {
        let body = page(&[r#"<h3 class="font-medium text-lg tracking-wide leading-6">
              <a href="https://other.example.test/tenders/abc/">Cross-listed</a>
            </h3>"#
            .to_string()]);
        let out = extract_summaries(&body, "https://tender.example.test");
        assert_eq!(out.summaries[0].url, "https://other.example.test/tenders/abc/");
        assert_eq!(out.summaries[0].id, "abc");
    }

    #[test]
    fn malformed_cards_are_skipped_with_reasons() {
        let body = page(&[
            r#"<h3 class="font-medium text-lg tracking-wide leading-6">No link here</h3>"#
                .to_string(),
            r#"<h3 class="font-medium text-lg tracking-wide leading-6">
                 <a href="/tenders/blank-title">   </a>
               </h3>"#
                .to_string(),
            card("kept", "Survivor", "Aug 25 2026"),
        ]);
        let out = extract_summaries(&body, "https://tender.example.test");
        assert_eq!(out.summaries.len(), 1);
        assert_eq!(out.summaries[0].id, "kept");
        assert_eq!(out.skipped.len(), 2);
        assert_eq!(out.skipped[0].reason, SkipReason::MissingLink);
        assert_eq!(out.skipped[1].reason, SkipReason::MissingTitle);
    }

    #[test]
    fn repeated_ids_keep_first_occurrence() {
        let body = page(&[
            card("dup-1", "First copy", "Aug 25 2026"),
            card("dup-1", "Second copy", "Aug 24 2026"),
        ]);
        let out = extract_summaries(&body, "https://tender.example.test");
        assert_eq!(out.summaries.len(), 1);
        assert_eq!(out.summaries[0].title, "First copy");
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(out.skipped[0].reason, SkipReason::DuplicateId("dup-1".to_string()));
    }

    #[test]
    fn date_labels_match_by_containment_not_equality() {
        let body = r#"<html><body><div class="card">
          <div>
            <h3 class="font-medium text-lg tracking-wide leading-6">
              <a href="/tenders/loose-labels">Loose labels</a>
            </h3>
          </div>
          <div>
            <div class="flex gap-x-4">
              <div class="font-medium">Closing Date (ext.) :</div>
              <div>Sep 12 2026</div>
            </div>
            <div class="flex gap-x-4">
              <div class="font-medium">Opening Date :</div>
              <div>Sep 13 2026</div>
            </div>
            <div class="flex gap-x-4">
              <div class="font-medium">Published :</div>
              <div>Aug 25 2026</div>
            </div>
          </div>
        </div></body></html>"#;
        let out = extract_summaries(body, "https://tender.example.test");
        let s = &out.summaries[0];
        assert_eq!(s.bid_closing_date.as_deref(), Some("Sep 12 2026"));
        assert_eq!(s.bid_opening_date.as_deref(), Some("Sep 13 2026"));
        assert_eq!(s.published_on.as_deref(), Some("Aug 25 2026"));
    }

    #[test]
    fn id_is_final_path_segment() {
        assert_eq!(
            id_from_url("https://t.example/tenders/abc-123/"),
            Some("abc-123".to_string())
        );
        assert_eq!(id_from_url("https://t.example/abc"), Some("abc".to_string()));
        assert_eq!(id_from_url("https://t.example/"), None);
        assert_eq!(id_from_url("https://t.example"), None);
    }
}
