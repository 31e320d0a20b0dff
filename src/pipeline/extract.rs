// src/pipeline/extract.rs

//! Record extraction: turns one index row into an [`ItemRecord`].

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::{Catalog, ColumnLayout, IndexRow, ItemRecord};

/// Trailing `" - Part N"` / `": Part N"` suffix.
static PART_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s?[-:]\sPart\s(\d+)$").expect("part suffix pattern"));

static FIRST_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("integer pattern"));

/// Strip a trailing part suffix from `title`.
///
/// ```
/// use comic_mailer::pipeline::base_title;
///
/// assert_eq!(base_title("Foo - Part 3"), "Foo");
/// assert_eq!(base_title("Foo"), "Foo");
/// ```
pub fn base_title(title: &str) -> String {
    PART_SUFFIX.replace(title, "").into_owned()
}

/// Part number from a trailing part suffix, if any.
pub fn part_number(title: &str) -> Option<u32> {
    PART_SUFFIX
        .captures(title)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// First run of digits in `text`.
fn first_integer(text: &str) -> Option<&str> {
    FIRST_INTEGER.find(text).map(|m| m.as_str())
}

/// True for a part > 1 whose chain head could not be found.
pub fn is_orphan_part(record: &ItemRecord) -> bool {
    record.predecessor.is_none()
        && record.is_multi_part()
        && part_number(&record.title).is_some_and(|n| n > 1)
}

/// Build an item record from `row`.
///
/// The predecessor is the nearest lower id in `catalog` sharing the base
/// title, looked up only for parts numbered above 1.
pub fn extract_record(row: &IndexRow, layout: &ColumnLayout, catalog: &Catalog) -> Result<ItemRecord> {
    if row.cells.len() < layout.width() {
        return Err(AppError::extract(
            row.describe(),
            format!("expected {} cells, found {}", layout.width(), row.cells.len()),
        ));
    }

    let cell = |column: usize| row.cell(column).unwrap_or_default().to_string();
    let url = cell(layout.id);
    let digits = first_integer(&url)
        .ok_or_else(|| AppError::extract(row.describe(), "no integer id in first cell"))?;
    let id: u32 = digits
        .parse()
        .map_err(|e| AppError::extract(row.describe(), format!("id {digits}: {e}")))?;
    if id == 0 {
        return Err(AppError::extract(row.describe(), "id 0 is reserved"));
    }

    let title = cell(layout.title);
    let base = base_title(&title);

    let predecessor = match part_number(&title) {
        Some(n) if n > 1 && title != base => catalog.find_prior_with_base(id, &base),
        _ => None,
    };

    Ok(ItemRecord {
        id,
        url,
        date: cell(layout.date),
        title,
        base_title: base,
        predecessor,
    })
}
