// src/pipeline/run.rs

//! One scheduled run: sync, select, deliver, record.
//!
//! Ordering matters. The catalog is saved right after the sync, before
//! anything is selected. The ledger is saved only after the mailer reports
//! success, so a failed send leaves every selected item unread for the next
//! run.

use chrono::{Local, NaiveDate};
use rand::Rng;

use crate::error::Result;
use crate::models::Config;
use crate::services::{IndexFetcher, Mailer};
use crate::storage::{BlobStore, StateStore};

use super::digest::{Digest, render_digest};
use super::select::{candidate_ids, resolve_selection, select_unread};
use super::sync::{SyncReport, sync_catalog};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// A digest was sent
    Delivered(Delivery),
    /// Nothing unread remains; no mail was sent
    Exhausted { sync: SyncReport },
}

/// Details of a successful delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Ids sent, in digest order
    pub delivered: Vec<u32>,
    pub caught_up: bool,
    pub digest: Digest,
    pub sync: SyncReport,
    /// False for dry runs
    pub history_saved: bool,
}

/// Knobs for a single run.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Persist the read history after sending
    pub persist_history: bool,
    /// Date printed in the subject
    pub date: NaiveDate,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            persist_history: true,
            date: Local::now().date_naive(),
        }
    }
}

impl RunOptions {
    /// Send, but leave the read history untouched.
    pub fn dry_run() -> Self {
        Self {
            persist_history: false,
            ..Self::default()
        }
    }
}

/// Catalog and ledger figures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub upper_bound: u32,
    pub items: usize,
    pub missing: usize,
    pub chains: usize,
    pub delivered: usize,
    /// Unread items that could be sent right now
    pub unread: usize,
    /// Ids the catalog reaches that the saved ledger does not track yet
    pub untracked: u32,
}

/// Wires the collaborators of a run together.
pub struct Runner<'a> {
    config: &'a Config,
    store: &'a dyn BlobStore,
    fetcher: &'a dyn IndexFetcher,
    mailer: &'a dyn Mailer,
}

impl<'a> Runner<'a> {
    pub fn new(
        config: &'a Config,
        store: &'a dyn BlobStore,
        fetcher: &'a dyn IndexFetcher,
        mailer: &'a dyn Mailer,
    ) -> Self {
        Self {
            config,
            store,
            fetcher,
            mailer,
        }
    }

    fn state(&self) -> StateStore<'_> {
        StateStore::new(self.store, &self.config.storage)
    }

    /// Run the full cycle.
    pub async fn run<R: Rng + Send>(&self, rng: &mut R, options: RunOptions) -> Result<RunOutcome> {
        let state = self.state();
        let mut catalog = state.load_catalog().await?;
        let mut ledger = state.load_ledger().await?;

        let sync = sync_catalog(self.config, self.fetcher, &mut catalog).await?;
        state.save_catalog(&catalog).await?;
        log::info!(
            "Catalog saved: #{} -> #{} ({} new, {} missing added, {} replaced)",
            sync.upper_bound_before,
            sync.upper_bound_after,
            sync.merge.appended + sync.merge.gaps_filled,
            sync.merge.missing_added,
            sync.merge.replaced
        );

        let added = ledger.extend_to(catalog.upper_bound());
        if added > 0 {
            log::debug!("Tracking {added} new ids");
        }

        let batch_size = self.config.selection.batch_size;
        let Some(selection) = select_unread(&catalog, &ledger, batch_size, rng) else {
            log::info!("Up to date: nothing left to send");
            return Ok(RunOutcome::Exhausted { sync });
        };
        log::info!(
            "Selected {} of {} unread items{}",
            selection.chosen.len(),
            selection.candidates,
            if selection.caught_up { " (clears the backlog)" } else { "" }
        );

        let items = resolve_selection(&catalog, &mut ledger, &selection.chosen);
        let digest = render_digest(&items, selection.caught_up, &self.config.digest, options.date);

        self.mailer.send(&digest).await?;

        if options.persist_history {
            state.save_ledger(&ledger).await?;
        } else {
            log::info!("Dry run: read history left unchanged");
        }

        Ok(RunOutcome::Delivered(Delivery {
            delivered: items.iter().map(|item| item.record.id).collect(),
            caught_up: selection.caught_up,
            digest,
            sync,
            history_saved: options.persist_history,
        }))
    }
}

/// Bring the persisted catalog up to date without selecting anything.
pub async fn sync(config: &Config, store: &dyn BlobStore, fetcher: &dyn IndexFetcher) -> Result<SyncReport> {
    let state = StateStore::new(store, &config.storage);
    let mut catalog = state.load_catalog().await?;
    let report = sync_catalog(config, fetcher, &mut catalog).await?;
    state.save_catalog(&catalog).await?;
    Ok(report)
}

/// Summarise the persisted state without touching the network.
pub async fn status(config: &Config, store: &dyn BlobStore) -> Result<StatusReport> {
    let state = StateStore::new(store, &config.storage);
    let catalog = state.load_catalog().await?;
    let mut ledger = state.load_ledger().await?;
    let untracked = catalog.upper_bound().saturating_sub(ledger.upper_bound());
    ledger.extend_to(catalog.upper_bound());

    Ok(StatusReport {
        upper_bound: catalog.upper_bound(),
        items: catalog.items().count(),
        missing: catalog.missing_ids().len(),
        chains: catalog.chain_count(),
        delivered: ledger.delivered_count(),
        unread: candidate_ids(&catalog, &ledger).len(),
        untracked,
    })
}
