//! Detail-page extraction: one [`TenderDetail`] per rendered page.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use chereta_core::{canonical_metadata_key, TenderDetail};

/// Element whose presence marks a detail page as fully rendered. The
/// category tree is the last widget the site hydrates.
pub const DETAIL_READY_SELECTOR: &str = "div.ant-tree-list";

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1.text-xl.font-semibold").expect("title selector"));
static PARAGRAPH: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("paragraph selector"));
static CATEGORY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.ant-tree-title a").expect("category selector"));
static COMPANY: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("h3.text-lg.font-medium.m-0.underline.text-blue-600 a")
        .expect("company selector")
});
static FIELD_ROW: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.flex.gap-x-4.gap-y-0.p-2.flex-wrap").expect("field row selector")
});
static FIELD_LABEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.font-medium").expect("field label selector"));

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn strip_label(raw: &str) -> String {
    raw.trim().trim_end_matches(':').trim().to_string()
}

/// Label sits in the `font-medium` div; the value is the div after it.
fn field_row(row: ElementRef<'_>) -> Option<(String, String)> {
    let label_el = row.select(&FIELD_LABEL).next()?;
    let label = non_empty(element_text(label_el))?;
    let value = label_el
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "div")
        .map(element_text)
        .and_then(non_empty)?;
    Some((strip_label(&label), value))
}

/// Extracts the enriched record from a rendered detail page. Absent parts
/// stay `None`/empty; a sparse page is data, not an error.
pub fn extract_detail(body: &str) -> TenderDetail {
    let document = Html::parse_document(body);
    let mut detail = TenderDetail::default();

    detail.title = document.select(&TITLE).next().map(element_text).and_then(non_empty);
    detail.company = document.select(&COMPANY).next().map(element_text).and_then(non_empty);

    let paragraphs: Vec<String> = document
        .select(&PARAGRAPH)
        .map(element_text)
        .filter(|p| !p.is_empty())
        .collect();
    if !paragraphs.is_empty() {
        detail.description = Some(paragraphs.join("\n"));
    }

    let mut categories: Vec<String> = document
        .select(&CATEGORY)
        .map(element_text)
        .filter(|c| !c.is_empty())
        .collect();
    if !categories.is_empty() {
        categories.sort();
        categories.dedup();
        detail.filed_under = Some(categories.join(", "));
    }

    for row in document.select(&FIELD_ROW) {
        let Some((label, value)) = field_row(row) else {
            continue;
        };
        match canonical_metadata_key(&label.to_lowercase()) {
            Some(key) => {
                detail.metadata.entry(key.to_string()).or_insert(value);
            }
            None => {
                detail.extra_fields.entry(label).or_insert(value);
            }
        }
    }

    detail
}
