// src/pipeline/select.rs

//! Per-run selection of unread items.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::models::{Catalog, ItemRecord, Ledger};

use super::chain::{delivered_ancestor_chain, earliest_undelivered_ancestor};

/// Result of drawing a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Drawn ids, in draw order
    pub chosen: Vec<u32>,
    /// Size of the candidate pool the batch was drawn from
    pub candidates: usize,
    /// True when this batch empties the backlog
    pub caught_up: bool,
}

/// An item ready for the digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryItem {
    pub record: ItemRecord,
    /// Urls of previously delivered parts, oldest first
    pub previous: Vec<String>,
}

/// Ids the reader can be sent: unread in the ledger and scraped in the
/// catalog. Missing entries wait until a later scrape fills them.
pub fn candidate_ids(catalog: &Catalog, ledger: &Ledger) -> Vec<u32> {
    ledger
        .unread_ids()
        .into_iter()
        .filter(|id| catalog.item(*id).is_some())
        .collect()
}

/// Draw up to `batch_size` candidates uniformly without replacement.
///
/// Returns `None` when nothing is left to send.
pub fn select_unread<R: Rng + ?Sized>(
    catalog: &Catalog,
    ledger: &Ledger,
    batch_size: usize,
    rng: &mut R,
) -> Option<Selection> {
    let candidates = candidate_ids(catalog, ledger);
    if candidates.is_empty() {
        return None;
    }

    let chosen: Vec<u32> = candidates
        .choose_multiple(rng, batch_size.min(candidates.len()))
        .copied()
        .collect();

    Some(Selection {
        chosen,
        candidates: candidates.len(),
        caught_up: candidates.len() <= batch_size,
    })
}

/// Swap each chosen id for its earliest undelivered ancestor and mark it
/// delivered in `ledger`.
///
/// Ids are processed lowest first and marked as they go, so two picks from
/// the same chain surface two consecutive parts rather than one part twice.
pub fn resolve_selection(catalog: &Catalog, ledger: &mut Ledger, chosen: &[u32]) -> Vec<DeliveryItem> {
    let mut ordered = chosen.to_vec();
    ordered.sort_unstable();
    ordered.dedup();
    let mut items = Vec::with_capacity(ordered.len());

    for id in ordered {
        let target = earliest_undelivered_ancestor(catalog, ledger, id);
        let Some(record) = catalog.item(target) else {
            continue;
        };
        if ledger.is_delivered(target) {
            continue;
        }
        if target != id {
            log::debug!("Picked #{id}, delivering earlier part #{target} first");
        }

        ledger.mark_delivered(target);
        let mut previous = delivered_ancestor_chain(catalog, ledger, target);
        previous.reverse();

        items.push(DeliveryItem {
            record: record.clone(),
            previous,
        });
    }

    items
}
