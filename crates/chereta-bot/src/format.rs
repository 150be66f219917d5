//! Chat message rendering. Output is Telegram-flavored HTML text; the
//! transport layer sends it verbatim.

use chereta_core::{RunStatus, TenderDetail, TenderSummary, METADATA_DISPLAY_ORDER};

/// Hard ceiling on one outgoing chat message.
pub const MESSAGE_LIMIT: usize = 4000;
pub const DESCRIPTION_LIMIT: usize = 1800;
pub const REDUCED_DESCRIPTION_LIMIT: usize = 1200;

pub const DB_NOT_READY: &str = "Database is not ready yet. Please try later.";
pub const NO_TENDERS: &str = "No tenders found for that period.";
pub const TENDER_NOT_FOUND: &str = "Tender not found.";
pub const NO_RUNS: &str = "No scraping runs recorded yet.";
pub const DETAILS_PENDING: &str = "ℹ️ Details are not available yet.\nPlease try again later after the scheduled scraper runs.";

/// Escapes the three HTML metacharacters, ampersand first.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Caps `text` at `max_chars` characters, marking the cut with a trailing
/// `...` inside the budget.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

fn or_na(value: Option<&str>) -> String {
    escape(value.unwrap_or("N/A"))
}

fn metadata_emoji(key: &str) -> &'static str {
    match key {
        "published_on" => "📅",
        "posted" => "🗓",
        "bid_document_price" => "💵",
        "bid_bond" => "💰",
        "region" => "📍",
        "bidding_type" => "🧾",
        _ => "•",
    }
}

/// One listing line item, as sent for each tender in a range reply.
pub fn summary_message(summary: &TenderSummary) -> String {
    format!(
        "📌 <b>{}</b>\n🗓 <b>Closing</b>: {}\n🗓 <b>Opening</b>: {}\n📅 <b>Published</b>: {}",
        escape(&summary.title),
        or_na(summary.bid_closing_date.as_deref()),
        or_na(summary.bid_opening_date.as_deref()),
        or_na(summary.published_on.as_deref()),
    )
}

/// Full detail reply. When no detail row exists yet the reply says so
/// instead of rendering an empty record.
///
/// The description is budgeted so the whole message fits under
/// [`MESSAGE_LIMIT`]: full budget first, then a reduced budget, then the
/// unknown-label bullet lines are dropped.
pub fn detail_message(summary: &TenderSummary, detail: Option<&TenderDetail>) -> String {
    let Some(detail) = detail else {
        return DETAILS_PENDING.to_string();
    };

    let title = detail.title.as_deref().unwrap_or(&summary.title);
    let mut lines = vec![
        format!("📌 <b>{}</b>", escape(title)),
        format!("🗓 <b>Closing</b>: {}", or_na(summary.bid_closing_date.as_deref())),
        format!("🗓 <b>Opening</b>: {}", or_na(summary.bid_opening_date.as_deref())),
        format!("🏢 <b>Company</b>: {}", or_na(detail.company.as_deref())),
        format!("🗂 <b>Filed under</b>: {}", or_na(detail.filed_under.as_deref())),
    ];

    for (key, label) in METADATA_DISPLAY_ORDER {
        if let Some(value) = detail.metadata.get(*key).filter(|v| !v.is_empty()) {
            lines.push(format!("{} <b>{label}</b>: {}", metadata_emoji(key), escape(value)));
        }
    }
    for (label, value) in &detail.extra_fields {
        if !value.is_empty() {
            lines.push(format!("• <b>{}</b>: {}", escape(label), escape(value)));
        }
    }

    let description =
        escape(detail.description.as_deref().unwrap_or("No description available."));

    let assemble = |lines: &[String], budget: usize| {
        format!("{}\n\n{}", lines.join("\n"), truncate(&description, budget))
    };

    let mut message = assemble(&lines, DESCRIPTION_LIMIT);
    if message.chars().count() > MESSAGE_LIMIT {
        message = assemble(&lines, REDUCED_DESCRIPTION_LIMIT);
    }
    if message.chars().count() > MESSAGE_LIMIT {
        lines.retain(|line| !line.starts_with("• "));
        message = assemble(&lines, REDUCED_DESCRIPTION_LIMIT);
    }
    message
}

pub fn status_message(status: Option<&RunStatus>) -> String {
    let Some(status) = status else {
        return NO_RUNS.to_string();
    };
    format!(
        "📊 <b>Scrape Status</b>\n🕒 <b>Last run</b>: {}\n📄 <b>Pages scraped</b>: {}\n✅ <b>New tenders saved</b>: {}",
        status.run_at.format("%Y-%m-%d %H:%M:%S UTC"),
        status.pages_scraped,
        status.tenders_saved,
    )
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn summary() -> TenderSummary {
        TenderSummary {
            id: "water-works-3".to_string(),
            title: "Water Works <Phase 3>".to_string(),
            url: "https://tender.example.test/tenders/water-works-3".to_string(),
            bid_closing_date: Some("Sep 10 2026".to_string()),
            bid_opening_date: None,
            published_on: Some("Aug 25 2026".to_string()),
        }
    }

    #[test]
    fn summary_message_escapes_and_fills_na() {
        let text = summary_message(&summary());
        assert_eq!(
            text,
            "📌 <b>Water Works &lt;Phase 3&gt;</b>\n\
             🗓 <b>Closing</b>: Sep 10 2026\n\
             🗓 <b>Opening</b>: N/A\n\
             📅 <b>Published</b>: Aug 25 2026"
        );
    }

    #[test]
    fn missing_detail_row_gets_the_pending_notice() {
        assert_eq!(detail_message(&summary(), None), DETAILS_PENDING);
    }

    #[test]
    fn detail_message_orders_known_fields_then_bullets() {
        let mut detail = TenderDetail::default();
        detail.company = Some("City Water Authority".to_string());
        detail.metadata.insert("bid_bond".to_string(), "2%".to_string());
        detail.metadata.insert("region".to_string(), "Addis Ababa".to_string());
        detail.extra_fields.insert("Lot number".to_string(), "LOT-4".to_string());
        detail.description = Some("Scope & schedule attached.".to_string());

        let text = detail_message(&summary(), Some(&detail));
        let bond = text.find("💰 <b>Bid bond</b>: 2%").unwrap();
        let region = text.find("📍 <b>Region</b>: Addis Ababa").unwrap();
        let bullet = text.find("• <b>Lot number</b>: LOT-4").unwrap();
        assert!(bond < region && region < bullet);
        assert!(text.ends_with("Scope &amp; schedule attached."));
    }

    #[test]
    fn truncate_marks_the_cut_inside_the_budget() {
        assert_eq!(truncate("short", 10), "short");
        let cut = truncate(&"x".repeat(50), 10);
        assert_eq!(cut, "xxxxxxx...");
        assert_eq!(cut.chars().count(), 10);
    }

    #[test]
    fn long_description_is_reduced_before_bullets_are_dropped() {
        let mut detail = TenderDetail::default();
        detail.description = Some("d".repeat(5000));
        for n in 0..25 {
            detail.extra_fields.insert(format!("Field {n:02}"), "v".repeat(80));
        }

        let text = detail_message(&summary(), Some(&detail));
        assert!(text.chars().count() <= MESSAGE_LIMIT);
        assert!(text.contains("• <b>Field 00</b>"));
        assert!(text.contains("..."));
    }

    #[test]
    fn bullets_are_dropped_when_reduction_is_not_enough() {
        let mut detail = TenderDetail::default();
        detail.description = Some("d".repeat(5000));
        for n in 0..40 {
            detail.extra_fields.insert(format!("Field {n:02}"), "v".repeat(100));
        }

        let text = detail_message(&summary(), Some(&detail));
        assert!(text.chars().count() <= MESSAGE_LIMIT);
        assert!(!text.contains("• <b>"));
        assert!(text.contains("📌 <b>"));
    }

    #[test]
    fn status_message_renders_the_latest_run() {
        let status = RunStatus {
            run_at: Utc.with_ymd_and_hms(2026, 8, 26, 6, 0, 0).unwrap(),
            pages_scraped: 3,
            tenders_saved: 12,
        };
        let text = status_message(Some(&status));
        assert!(text.contains("🕒 <b>Last run</b>: 2026-08-26 06:00:00 UTC"));
        assert!(text.contains("📄 <b>Pages scraped</b>: 3"));
        assert!(text.contains("✅ <b>New tenders saved</b>: 12"));
        assert_eq!(status_message(None), NO_RUNS);
    }
}
