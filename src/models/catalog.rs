//! The persisted catalog of series items.
//!
//! The catalog is a dense vector indexed by item id. Slot 0 is a sentinel so
//! that ids map to indices directly; every slot between 1 and the upper bound
//! is either a scraped [`ItemRecord`] or an explicit [`CatalogEntry::Missing`]
//! marker. Anything above the upper bound has simply not been scraped yet.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::item::{CatalogEntry, ItemRecord};

/// How a record landed in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Appended past the old upper bound, after `gap` missing markers
    Appended { gap: u32 },
    /// Replaced a missing marker
    FilledGap,
    /// Replaced an older, different record for the same id
    Replaced,
    /// Identical record already present
    Unchanged,
}

/// Ordered collection of entries indexed by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CatalogEntry>", into = "Vec<CatalogEntry>")]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// An empty catalog holding only the sentinel.
    pub fn new() -> Self {
        Self {
            entries: vec![CatalogEntry::Sentinel],
        }
    }

    /// Highest id with a slot (0 when empty).
    pub fn upper_bound(&self) -> u32 {
        (self.entries.len() - 1) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() == 1
    }

    pub fn get(&self, id: u32) -> Option<&CatalogEntry> {
        self.entries.get(id as usize)
    }

    /// The record stored for `id`, if any.
    pub fn item(&self, id: u32) -> Option<&ItemRecord> {
        self.get(id).and_then(CatalogEntry::as_item)
    }

    /// All scraped records in ascending id order.
    pub fn items(&self) -> impl Iterator<Item = &ItemRecord> {
        self.entries.iter().filter_map(CatalogEntry::as_item)
    }

    /// Ids currently held by missing markers.
    pub fn missing_ids(&self) -> Vec<u32> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_missing())
            .map(|(id, _)| id as u32)
            .collect()
    }

    /// Number of distinct multi-part chains.
    pub fn chain_count(&self) -> usize {
        self.items()
            .filter(|record| record.is_multi_part())
            .map(|record| record.base_title.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Store `record` at its id, growing the catalog with missing markers as
    /// needed. Existing entries are overwritten.
    pub fn put(&mut self, record: ItemRecord) -> Placement {
        let index = record.id as usize;

        if index >= self.entries.len() {
            let gap = (index - self.entries.len()) as u32;
            self.entries.resize(index, CatalogEntry::Missing);
            self.entries.push(CatalogEntry::Item(record));
            return Placement::Appended { gap };
        }

        let slot = &mut self.entries[index];
        let placement = match slot {
            CatalogEntry::Item(existing) if *existing == record => return Placement::Unchanged,
            CatalogEntry::Item(_) => Placement::Replaced,
            _ => Placement::FilledGap,
        };
        *slot = CatalogEntry::Item(record);
        placement
    }

    /// Overwrite the stored link of `id`. Returns false when `id` holds no
    /// record.
    pub fn set_predecessor(&mut self, id: u32, predecessor: Option<u32>) -> bool {
        match self.entries.get_mut(id as usize) {
            Some(CatalogEntry::Item(record)) => {
                record.predecessor = predecessor;
                true
            }
            _ => false,
        }
    }

    /// Nearest id below `id` whose record shares `base_title`.
    ///
    /// Missing slots are skipped.
    pub fn find_prior_with_base(&self, id: u32, base_title: &str) -> Option<u32> {
        let start = (id as usize).min(self.entries.len());
        (1..start)
            .rev()
            .find(|&p| {
                self.entries[p]
                    .as_item()
                    .is_some_and(|record| record.base_title == base_title)
            })
            .map(|p| p as u32)
    }

    /// The predecessor of `id`, provided the link still holds.
    ///
    /// A link holds when the predecessor is a lower id that is present and
    /// shares the base title. Links broken by a later overwrite are ignored.
    pub fn predecessor_of(&self, id: u32) -> Option<u32> {
        let record = self.item(id)?;
        let prev = record.predecessor?;
        if prev >= id {
            return None;
        }
        self.item(prev)
            .filter(|p| p.base_title == record.base_title)
            .map(|_| prev)
    }
}

impl TryFrom<Vec<CatalogEntry>> for Catalog {
    type Error = String;

    fn try_from(entries: Vec<CatalogEntry>) -> std::result::Result<Self, Self::Error> {
        match entries.first() {
            Some(CatalogEntry::Sentinel) => {}
            _ => return Err("catalog does not start with the sentinel entry".into()),
        }

        for (index, entry) in entries.iter().enumerate().skip(1) {
            match entry {
                CatalogEntry::Sentinel => {
                    return Err(format!("unexpected sentinel at index {index}"));
                }
                CatalogEntry::Item(record) if record.id as usize != index => {
                    return Err(format!(
                        "record with id {} stored at index {index}",
                        record.id
                    ));
                }
                _ => {}
            }
        }

        Ok(Self { entries })
    }
}

impl From<Catalog> for Vec<CatalogEntry> {
    fn from(catalog: Catalog) -> Self {
        catalog.entries
    }
}
