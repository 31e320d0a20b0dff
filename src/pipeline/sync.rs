// src/pipeline/sync.rs

//! Catalog synchronisation against the live index.

use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::{Catalog, Config, IndexRow};
use crate::services::{IndexFetcher, IndexPage};

use super::extract::extract_record;
use super::merge::{MergeReport, merge_page};

/// What a sync did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Highest id listed on the latest page
    pub latest_id: u32,
    /// Catalog upper bound before and after
    pub upper_bound_before: u32,
    pub upper_bound_after: u32,
    /// Pages fetched, in merge order
    pub pages: Vec<IndexPage>,
    pub merge: MergeReport,
}

/// Archive pages needed to bring a catalog that ends at `known_upper` up to
/// the page that holds `latest_id`.
///
/// The block containing `known_upper` is fetched again since it may have been
/// only partly filled; the block containing `latest_id` is left to the latest
/// page.
pub fn plan_archive_pages(known_upper: u32, latest_id: u32, page_size: u32) -> Vec<IndexPage> {
    if latest_id == 0 || page_size == 0 {
        return Vec::new();
    }
    let first = known_upper / page_size;
    let last = (latest_id - 1) / page_size;
    (first..last)
        .map(|block| IndexPage::Range {
            start: block * page_size + 1,
            end: block * page_size + page_size,
        })
        .collect()
}

/// Id of the newest item: the first parseable row, since pages list
/// newest first.
fn latest_id(rows: &[IndexRow], config: &Config) -> Option<u32> {
    let empty = Catalog::new();
    rows.iter()
        .find_map(|row| extract_record(row, &config.source.columns, &empty).ok())
        .map(|record| record.id)
}

/// Fetch every page the catalog is behind on and merge them oldest first,
/// finishing with the latest page.
pub async fn sync_catalog(
    config: &Config,
    fetcher: &dyn IndexFetcher,
    catalog: &mut Catalog,
) -> Result<SyncReport> {
    let upper_bound_before = catalog.upper_bound();

    let latest_rows = fetcher.fetch_page(&IndexPage::Latest).await?;
    let latest_id = latest_id(&latest_rows, config)
        .ok_or_else(|| AppError::validation("latest index page lists no items"))?;
    log::info!("Latest item is #{latest_id}; catalog reaches #{upper_bound_before}");

    let archive = plan_archive_pages(upper_bound_before, latest_id, config.source.page_size);
    let delay = Duration::from_millis(config.source.request_delay_ms);
    let mut report = SyncReport {
        latest_id,
        upper_bound_before,
        ..SyncReport::default()
    };

    for page in archive {
        if delay.as_millis() > 0 {
            tokio::time::sleep(delay).await;
        }
        let rows = fetcher.fetch_page(&page).await?;
        let merged = merge_page(catalog, &rows, &config.source.columns, latest_id);
        log::info!(
            "Merged archive page {page}: {} records, {} skipped",
            merged.merged(),
            merged.skipped
        );
        report.merge.absorb(&merged);
        report.pages.push(page);
    }

    let merged = merge_page(catalog, &latest_rows, &config.source.columns, latest_id);
    log::info!(
        "Merged latest page: {} records, {} skipped",
        merged.merged(),
        merged.skipped
    );
    report.merge.absorb(&merged);
    report.pages.push(IndexPage::Latest);
    report.upper_bound_after = catalog.upper_bound();

    Ok(report)
}
