// src/pipeline/chain.rs

//! Multi-part chain resolution.
//!
//! Links only ever point to lower ids (see [`Catalog::predecessor_of`]), so
//! every walk here terminates.

use crate::models::{Catalog, Ledger};

/// Walk back from `id` while the predecessor is present and undelivered.
///
/// Returns the earliest undelivered part of the chain, which is `id` itself
/// when nothing earlier is pending.
pub fn earliest_undelivered_ancestor(catalog: &Catalog, ledger: &Ledger, id: u32) -> u32 {
    let mut current = id;
    while let Some(prev) = catalog.predecessor_of(current) {
        if ledger.is_delivered(prev) {
            break;
        }
        current = prev;
    }
    current
}

/// Urls of the delivered ancestors of `id`, nearest first.
pub fn delivered_ancestor_chain(catalog: &Catalog, ledger: &Ledger, id: u32) -> Vec<String> {
    let mut urls = Vec::new();
    let mut current = id;
    while let Some(prev) = catalog.predecessor_of(current) {
        if ledger.is_delivered(prev) {
            if let Some(record) = catalog.item(prev) {
                urls.push(record.url.clone());
            }
        }
        current = prev;
    }
    urls
}
