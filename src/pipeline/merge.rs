// src/pipeline/merge.rs

//! Catalog merging.
//!
//! Index pages list items newest-first. Rows are applied in reverse so that
//! every record is merged after the lower ids its predecessor lookup scans.
//! Merging is idempotent: applying the same page twice leaves the catalog as
//! it was after the first application.
//!
//! After each page the stored links are recomputed, so an overwrite or a
//! filled gap never leaves a later part pointing at the wrong record.

use crate::models::{Catalog, ColumnLayout, IndexRow, Placement};

use super::extract::{extract_record, is_orphan_part, part_number};

/// Counters describing one or more merged pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Records appended past the previous upper bound
    pub appended: usize,
    /// Missing markers replaced by a record
    pub gaps_filled: usize,
    /// Existing records replaced by newer data
    pub replaced: usize,
    /// Records identical to what was stored
    pub unchanged: usize,
    /// Missing markers inserted while growing
    pub missing_added: usize,
    /// Rows that could not be extracted
    pub skipped: usize,
    /// Parts > 1 whose chain head was not found
    pub orphan_parts: usize,
    /// Rows whose id lies above the page ceiling
    pub out_of_range: usize,
    /// Stored links rewritten after the merge
    pub relinked: usize,
}

impl MergeReport {
    /// Fold another report into this one.
    pub fn absorb(&mut self, other: &MergeReport) {
        self.appended += other.appended;
        self.gaps_filled += other.gaps_filled;
        self.replaced += other.replaced;
        self.unchanged += other.unchanged;
        self.missing_added += other.missing_added;
        self.skipped += other.skipped;
        self.orphan_parts += other.orphan_parts;
        self.out_of_range += other.out_of_range;
        self.relinked += other.relinked;
    }

    /// Rows that produced a record.
    pub fn merged(&self) -> usize {
        self.appended + self.gaps_filled + self.replaced + self.unchanged
    }
}

/// Merge one page of rows, given newest-first, into `catalog`.
///
/// Records with an id above `ceiling` are dropped; the catalog never grows
/// past the newest id the index admits to.
pub fn merge_page(
    catalog: &mut Catalog,
    rows: &[IndexRow],
    layout: &ColumnLayout,
    ceiling: u32,
) -> MergeReport {
    let mut report = MergeReport::default();

    for row in rows.iter().rev() {
        let record = match extract_record(row, layout, catalog) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Skipping row: {e}");
                report.skipped += 1;
                continue;
            }
        };

        if record.id > ceiling {
            log::warn!(
                "Skipping #{} \"{}\": above the newest id #{ceiling}",
                record.id,
                record.title
            );
            report.out_of_range += 1;
            continue;
        }

        if is_orphan_part(&record) {
            log::warn!(
                "No earlier part found for #{} \"{}\"; treating it as a chain start",
                record.id,
                record.title
            );
            report.orphan_parts += 1;
        }

        let id = record.id;
        match catalog.put(record) {
            Placement::Appended { gap } => {
                report.appended += 1;
                report.missing_added += gap as usize;
                if gap > 0 {
                    log::debug!("Marked {gap} ids below #{id} as missing");
                }
            }
            Placement::FilledGap => report.gaps_filled += 1,
            Placement::Replaced => {
                log::debug!("Replaced stale record #{id}");
                report.replaced += 1;
            }
            Placement::Unchanged => report.unchanged += 1,
        }
    }

    report.relinked = relink_chains(catalog);
    report
}

/// Point every part > 1 at the nearest earlier record sharing its base
/// title, and clear links on records that are no longer later parts.
///
/// Returns the number of records whose link changed.
pub fn relink_chains(catalog: &mut Catalog) -> usize {
    let updates: Vec<(u32, Option<u32>)> = catalog
        .items()
        .filter_map(|record| {
            let later_part = record.is_multi_part()
                && part_number(&record.title).is_some_and(|n| n > 1);
            let wanted = if later_part {
                catalog.find_prior_with_base(record.id, &record.base_title)
            } else {
                None
            };
            (wanted != record.predecessor).then_some((record.id, wanted))
        })
        .collect();

    for &(id, predecessor) in &updates {
        log::debug!("Relinking #{id} to {predecessor:?}");
        catalog.set_predecessor(id, predecessor);
    }
    updates.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CatalogEntry;

    const OPEN: u32 = u32::MAX;

    fn row(id: u32, title: &str) -> IndexRow {
        IndexRow::new([
            format!("https://xkcd.com/{id}"),
            title.to_string(),
            String::new(),
            String::new(),
            format!("2010-01-{:02}", id % 28 + 1),
        ])
    }

    /// Newest-first page of `ids`, titled by the closure.
    fn page(ids: impl DoubleEndedIterator<Item = u32>, title: impl Fn(u32) -> String) -> Vec<IndexRow> {
        ids.rev().map(|id| row(id, &title(id))).collect()
    }

    #[test]
    fn test_merge_is_idempotent() {
        let rows = page(1..=6, |id| match id {
            2 => "Barrel - Part 1".into(),
            4 => "Barrel - Part 2".into(),
            6 => "Barrel - Part 3".into(),
            _ => format!("Standalone {id}"),
        });
        let layout = ColumnLayout::default();

        let mut once = Catalog::new();
        merge_page(&mut once, &rows, &layout, OPEN);

        let mut twice = once.clone();
        let report = merge_page(&mut twice, &rows, &layout, OPEN);

        assert_eq!(once, twice);
        assert_eq!(report.unchanged, 6);
        assert_eq!(twice.item(6).unwrap().predecessor, Some(4));
        assert_eq!(twice.item(4).unwrap().predecessor, Some(2));
    }

    #[test]
    fn test_gap_is_marked_then_filled() {
        let layout = ColumnLayout::default();
        let mut catalog = Catalog::new();
        let report = merge_page(
            &mut catalog,
            &page((1..=40).filter(|id| *id != 37), |id| format!("Comic {id}")),
            &layout,
            OPEN,
        );
        assert_eq!(report.appended, 39);
        assert_eq!(catalog.get(37), Some(&CatalogEntry::Missing));

        let before = catalog.clone();
        let report = merge_page(&mut catalog, &[row(37, "Comic 37")], &layout, OPEN);
        assert_eq!(report.gaps_filled, 1);
        assert_eq!(catalog.item(37).unwrap().title, "Comic 37");
        for id in (1..=40).filter(|id| *id != 37) {
            assert_eq!(catalog.get(id), before.get(id));
        }
    }

    #[test]
    fn test_latest_scrape_wins() {
        let layout = ColumnLayout::default();
        let mut catalog = Catalog::new();
        merge_page(&mut catalog, &[row(2, "Typo"), row(1, "One")], &layout, OPEN);
        let report = merge_page(&mut catalog, &[row(2, "Fixed")], &layout, OPEN);

        assert_eq!(report.replaced, 1);
        assert_eq!(catalog.item(2).unwrap().title, "Fixed");
        assert_eq!(catalog.upper_bound(), 2);
    }

    #[test]
    fn test_bad_rows_are_skipped_not_fatal() {
        let layout = ColumnLayout::default();
        let mut catalog = Catalog::new();
        let rows = vec![
            row(3, "Three"),
            IndexRow::new(["Upcoming", "TBA", "", "", ""]),
            IndexRow::new(["xkcd.com/2"]),
            row(1, "One"),
        ];
        let report = merge_page(&mut catalog, &rows, &layout, OPEN);

        assert_eq!(report.skipped, 2);
        assert_eq!(report.merged(), 2);
        assert_eq!(catalog.get(2), Some(&CatalogEntry::Missing));
    }

    #[test]
    fn test_chain_invariant_holds_after_merge() {
        let layout = ColumnLayout::default();
        let mut catalog = Catalog::new();
        let rows = page(1..=30, |id| match id % 3 {
            0 => format!("Saga - Part {}", id / 3),
            1 => format!("Tale: Part {}", id / 3 + 1),
            _ => format!("Single {id}"),
        });
        merge_page(&mut catalog, &rows, &layout, OPEN);

        for record in catalog.items() {
            if let Some(prev) = record.predecessor {
                assert!(prev < record.id);
                assert_eq!(catalog.item(prev).unwrap().base_title, record.base_title);
            }
        }
        assert_eq!(catalog.item(6).unwrap().predecessor, Some(3));
        assert_eq!(catalog.item(3).unwrap().predecessor, None);
    }

    #[test]
    fn test_orphan_parts_are_counted() {
        let layout = ColumnLayout::default();
        let mut catalog = Catalog::new();
        let report = merge_page(&mut catalog, &[row(9, "Lost - Part 4")], &layout, OPEN);
        assert_eq!(report.orphan_parts, 1);
        assert_eq!(catalog.item(9).unwrap().predecessor, None);
    }

    #[test]
    fn test_ids_above_ceiling_are_dropped() {
        let layout = ColumnLayout::default();
        let mut catalog = Catalog::new();
        let rows = vec![
            IndexRow::new(["https://xkcd.com/4000000000", "Stray", "", "", ""]),
            row(3, "Three"),
            row(2, "Two"),
        ];
        let report = merge_page(&mut catalog, &rows, &layout, 3);

        assert_eq!(report.out_of_range, 1);
        assert_eq!(report.merged(), 2);
        assert_eq!(catalog.upper_bound(), 3);
    }

    #[test]
    fn test_renamed_head_clears_stale_link() {
        let layout = ColumnLayout::default();
        let mut catalog = Catalog::new();
        merge_page(
            &mut catalog,
            &[row(2, "Barrel - Part 2"), row(1, "Barrel - Part 1")],
            &layout,
            OPEN,
        );
        assert_eq!(catalog.item(2).unwrap().predecessor, Some(1));

        let report = merge_page(&mut catalog, &[row(1, "Something Else")], &layout, OPEN);
        assert_eq!(report.relinked, 1);
        assert_eq!(catalog.item(2).unwrap().predecessor, None);
    }

    #[test]
    fn test_filled_gap_becomes_the_nearer_link() {
        let layout = ColumnLayout::default();
        let mut catalog = Catalog::new();
        merge_page(
            &mut catalog,
            &[row(5, "Tale - Part 3"), row(1, "Tale - Part 1")],
            &layout,
            OPEN,
        );
        assert_eq!(catalog.item(5).unwrap().predecessor, Some(1));

        let report = merge_page(&mut catalog, &[row(3, "Tale - Part 2")], &layout, OPEN);
        assert_eq!(report.relinked, 1);
        assert_eq!(catalog.item(3).unwrap().predecessor, Some(1));
        assert_eq!(catalog.item(5).unwrap().predecessor, Some(3));

        let again = merge_page(&mut catalog, &[row(3, "Tale - Part 2")], &layout, OPEN);
        assert_eq!(again.relinked, 0);
        assert_eq!(again.unchanged, 1);
    }

    #[test]
    fn test_orphan_is_adopted_once_its_head_arrives() {
        let layout = ColumnLayout::default();
        let mut catalog = Catalog::new();
        merge_page(&mut catalog, &[row(9, "Lost - Part 2")], &layout, OPEN);
        assert_eq!(catalog.item(9).unwrap().predecessor, None);

        merge_page(&mut catalog, &[row(4, "Lost - Part 1")], &layout, OPEN);
        assert_eq!(catalog.predecessor_of(9), Some(4));
    }
}
