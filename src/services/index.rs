// src/services/index.rs

//! Index page fetching.
//!
//! The index is a set of HTML tables, one row per item, newest first. The
//! newest items live on a single "latest" page; older items are split over
//! archive pages covering fixed id ranges.

use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{IndexRow, SourceConfig};
use crate::utils::{base_url, http, page_url};

/// One page of the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexPage {
    /// The page listing the newest items
    Latest,
    /// Archive page covering ids `start..=end`
    Range { start: u32, end: u32 },
}

impl IndexPage {
    /// Page name relative to the index base URL.
    pub fn name(&self, source: &SourceConfig) -> String {
        match self {
            IndexPage::Latest => source.latest_page.clone(),
            IndexPage::Range { start, end } => source.range_page_name(*start, *end),
        }
    }
}

impl fmt::Display for IndexPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexPage::Latest => write!(f, "latest"),
            IndexPage::Range { start, end } => write!(f, "{start}-{end}"),
        }
    }
}

/// Source of index rows.
#[async_trait]
pub trait IndexFetcher: Send + Sync {
    /// Fetch the rows of `page`, newest first.
    async fn fetch_page(&self, page: &IndexPage) -> Result<Vec<IndexRow>>;
}

/// Fetches index pages over HTTP.
pub struct HttpIndexFetcher {
    client: Client,
    source: SourceConfig,
    base: Url,
}

impl HttpIndexFetcher {
    pub fn new(source: &SourceConfig) -> Result<Self> {
        Ok(Self {
            client: http::create_async_client(source)?,
            base: base_url(&source.base_url)?,
            source: source.clone(),
        })
    }

    /// Full URL of `page`.
    pub fn url_for(&self, page: &IndexPage) -> Result<Url> {
        page_url(&self.base, &page.name(&self.source))
    }
}

#[async_trait]
impl IndexFetcher for HttpIndexFetcher {
    async fn fetch_page(&self, page: &IndexPage) -> Result<Vec<IndexRow>> {
        let url = self.url_for(page)?;
        log::debug!("Fetching index page {page} from {url}");
        let html = http::fetch_text(&self.client, url.as_str()).await?;
        let rows = parse_index_rows(&html)?;
        log::debug!("Index page {page}: {} rows", rows.len());
        Ok(rows)
    }
}

/// Extract table rows from an index page.
///
/// Every `tr` with at least one `td` becomes a row; header rows made only of
/// `th` cells are dropped. A cell contributes the text of its first link when
/// it has one, otherwise its own text, trimmed.
pub fn parse_index_rows(html: &str) -> Result<Vec<IndexRow>> {
    let document = Html::parse_document(html);
    let row_sel = parse_selector("tr")?;
    let cell_sel = parse_selector("td")?;
    let link_sel = parse_selector("a")?;

    let rows = document
        .select(&row_sel)
        .map(|tr| IndexRow {
            cells: tr
                .select(&cell_sel)
                .map(|td| cell_text(&td, &link_sel))
                .collect(),
        })
        .filter(|row| !row.cells.is_empty())
        .collect();

    Ok(rows)
}

fn cell_text(td: &ElementRef<'_>, link_sel: &Selector) -> String {
    let source = td.select(link_sel).next().unwrap_or(*td);
    source.text().collect::<String>().trim().to_string()
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
