//! Table location and row tokenization.
//!
//! An FBref page carries a dozen or more `<table>` elements. We tokenize
//! every one of them once into plain text rows, then let each pipeline pick
//! out the table it wants by semantic role: a case-insensitive substring
//! match on the table's `id` attribute, falling back to header-keyword
//! scanning for tables whose ids are unstable.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::warn;

static SELECTOR_TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("Invalid table selector"));
static SELECTOR_TR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("Invalid tr selector"));
static SELECTOR_CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("th, td").expect("Invalid cell selector"));
static SELECTOR_ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("Invalid anchor selector"));

/// A tokenized table: its `id` attribute (if any) and every `<tr>` as a row
/// of cell texts in document order. Header rows are included; callers know
/// how many leading rows are headers for their table family.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub id: Option<String>,
    pub rows: Vec<Vec<String>>,
}

/// Semantic role of a table family on the page.
///
/// `id_substrings` must all appear in the table id. When the list is empty
/// (or nothing matches), any table whose header cells contain one of
/// `header_keywords` is accepted instead.
#[derive(Debug, Clone, Copy)]
pub struct TableRole {
    pub name: &'static str,
    pub id_substrings: &'static [&'static str],
    pub header_keywords: &'static [&'static str],
}

/// Tokenize every table in the document, preserving document order.
pub fn extract_tables(html: &str) -> Vec<RawTable> {
    let document = Html::parse_document(html);
    document
        .select(&SELECTOR_TABLE)
        .map(|table| RawTable {
            id: table.value().attr("id").map(|s| s.to_string()),
            rows: tokenize(&table),
        })
        .collect()
}

/// One row of cell text per `<tr>`, in document order.
fn tokenize(table: &ElementRef) -> Vec<Vec<String>> {
    table
        .select(&SELECTOR_TR)
        .map(|tr| tr.select(&SELECTOR_CELL).map(|cell| cell_text(&cell)).collect())
        .filter(|row: &Vec<String>| !row.is_empty())
        .collect()
}

/// Text of a single cell. Anchor text is preferred over the raw cell text:
/// FBref attaches decorative suffixes outside the link in name-bearing
/// cells, and the link text is the clean name.
fn cell_text(cell: &ElementRef) -> String {
    if let Some(anchor) = cell.select(&SELECTOR_ANCHOR).next() {
        let text = collapse_whitespace(&anchor.text().collect::<String>());
        if !text.is_empty() {
            return text;
        }
    }
    collapse_whitespace(&cell.text().collect::<String>())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Find the first table matching a role. Returns `None` (after a warning)
/// when nothing matches so the caller can skip that table family and move
/// on to the rest of the page.
pub fn locate<'a>(tables: &'a [RawTable], role: &TableRole) -> Option<&'a RawTable> {
    if !role.id_substrings.is_empty() {
        let found = tables.iter().find(|table| {
            table.id.as_deref().is_some_and(|id| {
                let id = id.to_lowercase();
                role.id_substrings.iter().all(|sub| id.contains(sub))
            })
        });
        if found.is_some() {
            return found;
        }
    }

    if !role.header_keywords.is_empty() {
        let found = tables.iter().find(|table| {
            table.rows.first().is_some_and(|header| {
                header.iter().any(|cell| {
                    let cell = cell.to_lowercase();
                    role.header_keywords.iter().any(|kw| cell.contains(kw))
                })
            })
        });
        if found.is_some() {
            return found;
        }
    }

    warn!(role = role.name, "table not found on page, skipping");
    None
}
