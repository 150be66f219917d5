//! Best-effort parsing for the free-text dates typed into the tender site.
//!
//! The source markup mixes ordinal suffixes, month names, separators and
//! relative words ("today"), so a strict parser would drop most records.
//! [`parse`] normalizes the text, picks the most plausible date substring
//! and tries a fixed list of formats, returning `None` when nothing fits.

use std::sync::LazyLock;

use chrono::{Days, NaiveDate, Utc};
use regex::Regex;

static ORDINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)(st|nd|rd|th)").expect("ordinal pattern"));

/// Candidate patterns in priority order, each paired with the chrono format
/// used to parse a match.
static CANDIDATES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (
            r"(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\s+\d{1,2}\s+\d{4}",
            "%b %d %Y",
        ),
        (
            r"(January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2}\s+\d{4}",
            "%B %d %Y",
        ),
        (
            r"\d{1,2}\s+(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\s+\d{4}",
            "%d %b %Y",
        ),
        (
            r"\d{1,2}\s+(January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{4}",
            "%d %B %Y",
        ),
        (r"\d{4}-\d{2}-\d{2}", "%Y-%m-%d"),
        (r"\d{1,2}/\d{1,2}/\d{4}", "%d/%m/%Y"),
    ]
    .into_iter()
    .map(|(pattern, format)| (Regex::new(pattern).expect("date pattern"), format))
    .collect()
});

const FORMATS: &[&str] = &["%b %d %Y", "%B %d %Y", "%d %b %Y", "%d %B %Y", "%Y-%m-%d", "%d/%m/%Y"];

/// Strips commas, parentheses and ordinal suffixes, collapses whitespace.
pub fn normalize(raw: &str) -> String {
    let cleaned = raw.replace(',', " ").replace(['(', ')'], " ");
    let cleaned = ORDINAL.replace_all(&cleaned, "$1");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns the first substring of the normalized text matching one of the
/// candidate patterns, or the whole normalized text if none match.
pub fn extract_candidate(raw: &str) -> String {
    let cleaned = normalize(raw);
    if cleaned.is_empty() {
        return cleaned;
    }
    for (pattern, _) in CANDIDATES.iter() {
        if let Some(found) = pattern.find(&cleaned) {
            return found.as_str().to_string();
        }
    }
    cleaned
}

/// Best-effort parse against the current UTC date. `None` means
/// "unparseable", never an error.
pub fn parse(raw: &str) -> Option<NaiveDate> {
    parse_with_today(raw, Utc::now().date_naive())
}

/// [`parse`] with an explicit "today", so relative words are testable.
pub fn parse_with_today(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    let candidate = extract_candidate(raw);
    if candidate.is_empty() {
        return None;
    }
    let lowered = candidate.to_lowercase();
    if lowered == "today" {
        return Some(today);
    }
    if lowered == "yesterday" {
        return today.checked_sub_days(Days::new(1));
    }
    FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&candidate, format).ok())
}

/// Cutoff for a "last `days` days" window ending at `today`, inclusive on
/// both ends: `days = 1` means today only.
pub fn cutoff_for_days(days: u32, today: NaiveDate) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(days.saturating_sub(1))))
        .unwrap_or(today)
}

/// True iff the raw published date parses and falls on or after `cutoff`.
/// Unparseable dates are excluded: unknown is not confirmed recent.
pub fn in_window(published_on: Option<&str>, cutoff: NaiveDate) -> bool {
    in_window_at(published_on, cutoff, Utc::now().date_naive())
}

/// [`in_window`] with an explicit "today" for relative-word handling.
pub fn in_window_at(published_on: Option<&str>, cutoff: NaiveDate, today: NaiveDate) -> bool {
    published_on
        .and_then(|raw| parse_with_today(raw, today))
        .is_some_and(|date| date >= cutoff)
}
