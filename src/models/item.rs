//! Item records and raw index rows.

use serde::{Deserialize, Serialize};

/// One entry of the series as scraped from the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemRecord {
    /// Series number, primary key
    pub id: u32,

    /// Canonical locator, taken verbatim from the index
    pub url: String,

    /// Display title, possibly carrying a part suffix
    pub title: String,

    /// Publication date as shown by the index
    pub date: String,

    /// Title with any trailing part suffix removed
    pub base_title: String,

    /// Id of the immediately preceding part in the same chain
    #[serde(default)]
    pub predecessor: Option<u32>,
}

impl ItemRecord {
    /// Whether the title carries a part suffix.
    pub fn is_multi_part(&self) -> bool {
        self.title != self.base_title
    }
}

/// A slot in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogEntry {
    /// Index 0, never holds data
    Sentinel,

    /// Id exists upstream but no record has been scraped for it
    Missing,

    /// A scraped record
    Item(ItemRecord),
}

impl CatalogEntry {
    /// Borrow the record if this slot holds one.
    pub fn as_item(&self) -> Option<&ItemRecord> {
        match self {
            CatalogEntry::Item(record) => Some(record),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CatalogEntry::Missing)
    }
}

/// One table row of an index page: trimmed cell texts in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexRow {
    pub cells: Vec<String>,
}

impl IndexRow {
    pub fn new<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cells: cells.into_iter().map(Into::into).collect(),
        }
    }

    /// Cell text at `column`, if the row is wide enough.
    pub fn cell(&self, column: usize) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }

    /// Short description used in log lines and errors.
    pub fn describe(&self) -> String {
        self.cells.first().cloned().unwrap_or_else(|| "<empty>".into())
    }
}
