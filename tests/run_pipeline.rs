//! End-to-end runs against an in-memory store, a scripted index and a
//! recording mailer.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use comic_mailer::error::{AppError, Result};
use comic_mailer::models::{Catalog, Config, IndexRow, Ledger};
use comic_mailer::pipeline::{self, Digest, RunOptions, RunOutcome, Runner};
use comic_mailer::services::{IndexFetcher, IndexPage, Mailer};
use comic_mailer::storage::BlobStore;
use rand::SeedableRng;
use rand::rngs::StdRng;

#[derive(Default)]
struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.lock().unwrap().get(key).cloned()
    }

    fn catalog(&self) -> Catalog {
        serde_json::from_slice(&self.get("details.json").expect("catalog saved")).unwrap()
    }

    fn ledger(&self) -> Option<Ledger> {
        self.get("history.json")
            .map(|bytes| serde_json::from_slice(&bytes).unwrap())
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.get(key))
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.blobs
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        format!("memory://{key}")
    }
}

#[derive(Default)]
struct ScriptedIndex {
    pages: Mutex<HashMap<IndexPage, Vec<IndexRow>>>,
    fetched: Mutex<Vec<IndexPage>>,
}

impl ScriptedIndex {
    fn set_page(&self, page: IndexPage, rows: Vec<IndexRow>) {
        self.pages.lock().unwrap().insert(page, rows);
    }

    fn fetched(&self) -> Vec<IndexPage> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl IndexFetcher for ScriptedIndex {
    async fn fetch_page(&self, page: &IndexPage) -> Result<Vec<IndexRow>> {
        self.fetched.lock().unwrap().push(*page);
        self.pages
            .lock()
            .unwrap()
            .get(page)
            .cloned()
            .ok_or_else(|| AppError::validation(format!("no page {page}")))
    }
}

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<Digest>>,
}

impl RecordingMailer {
    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, digest: &Digest) -> Result<()> {
        self.sent.lock().unwrap().push(digest.clone());
        Ok(())
    }
}

struct RefusingMailer;

#[async_trait]
impl Mailer for RefusingMailer {
    async fn send(&self, _digest: &Digest) -> Result<()> {
        Err(AppError::mail("relay refused the message"))
    }
}

fn row(id: u32, title: &str) -> IndexRow {
    IndexRow::new([
        format!("https://xkcd.com/{id}"),
        title.to_string(),
        String::new(),
        String::new(),
        format!("2007-01-{:02}", id % 28 + 1),
    ])
}

/// Rows for `ids`, newest first, with a three-part story at 3, 5 and 9.
fn rows(ids: &[u32]) -> Vec<IndexRow> {
    let mut ids = ids.to_vec();
    ids.sort_unstable_by(|a, b| b.cmp(a));
    ids.into_iter()
        .map(|id| match id {
            3 => row(id, "Tale - Part 1"),
            5 => row(id, "Tale - Part 2"),
            9 => row(id, "Tale - Part 3"),
            _ => row(id, &format!("Comic {id}")),
        })
        .collect()
}

/// Archive 1-10 without 7, latest page 11, 13 and 14.
fn index() -> ScriptedIndex {
    let index = ScriptedIndex::default();
    index.set_page(
        IndexPage::Range { start: 1, end: 10 },
        rows(&[1, 2, 3, 4, 5, 6, 8, 9, 10]),
    );
    index.set_page(IndexPage::Latest, rows(&[11, 13, 14]));
    index
}

fn config(batch_size: usize) -> Config {
    let mut config = Config::default();
    config.source.page_size = 10;
    config.source.request_delay_ms = 0;
    config.selection.batch_size = batch_size;
    config
}

fn options(persist_history: bool) -> RunOptions {
    RunOptions {
        persist_history,
        date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
    }
}

fn delivered(ledger: &Ledger) -> BTreeSet<u32> {
    (1..=ledger.upper_bound())
        .filter(|id| ledger.is_delivered(*id))
        .collect()
}

fn assert_no_part_skipped(catalog: &Catalog, ledger: &Ledger) {
    for id in delivered(ledger) {
        if let Some(prev) = catalog.predecessor_of(id) {
            assert!(
                ledger.is_delivered(prev),
                "#{id} delivered before its earlier part #{prev}"
            );
        }
    }
}

#[tokio::test]
async fn test_first_run_builds_state_and_sends() {
    let config = config(3);
    let store = MemoryStore::default();
    let index = index();
    let mailer = RecordingMailer::default();
    let mut rng = StdRng::seed_from_u64(7);

    let outcome = Runner::new(&config, &store, &index, &mailer)
        .run(&mut rng, options(true))
        .await
        .unwrap();

    let RunOutcome::Delivered(delivery) = outcome else {
        panic!("expected a delivery");
    };
    assert_eq!(delivery.delivered.len(), 3);
    assert!(!delivery.caught_up);
    assert!(delivery.history_saved);
    assert_eq!(delivery.sync.upper_bound_after, 14);
    assert_eq!(
        index.fetched(),
        vec![IndexPage::Latest, IndexPage::Range { start: 1, end: 10 }]
    );

    let catalog = store.catalog();
    assert_eq!(catalog.upper_bound(), 14);
    assert_eq!(catalog.missing_ids(), vec![7, 12]);
    assert_eq!(catalog.predecessor_of(9), Some(5));
    assert_eq!(catalog.predecessor_of(5), Some(3));

    let ledger = store.ledger().expect("history saved");
    assert_eq!(ledger.upper_bound(), 14);
    assert_eq!(
        delivered(&ledger),
        delivery.delivered.iter().copied().collect::<BTreeSet<_>>()
    );
    assert_no_part_skipped(&catalog, &ledger);

    assert_eq!(mailer.count(), 1);
    let sent = mailer.sent.lock().unwrap()[0].clone();
    assert_eq!(sent.subject, "Your XKCD comics for 2026-10-18");
    assert_eq!(sent, delivery.digest);
}

#[tokio::test]
async fn test_runs_until_exhausted_keep_order_and_history() {
    let config = config(4);
    let store = MemoryStore::default();
    let index = index();
    let mailer = RecordingMailer::default();
    let mut rng = StdRng::seed_from_u64(42);
    let runner = Runner::new(&config, &store, &index, &mailer);

    let mut previous = BTreeSet::new();
    let mut exhausted = false;
    let mut announced_caught_up = false;
    for _ in 0..20 {
        match runner.run(&mut rng, options(true)).await.unwrap() {
            RunOutcome::Delivered(delivery) => {
                assert!(!announced_caught_up, "sent more after announcing caught up");
                announced_caught_up = delivery.caught_up;
                assert!(!delivery.delivered.is_empty());
                let catalog = store.catalog();
                let ledger = store.ledger().unwrap();
                let now = delivered(&ledger);
                assert!(previous.is_subset(&now), "delivery was undone");
                assert_no_part_skipped(&catalog, &ledger);
                previous = now;
            }
            RunOutcome::Exhausted { .. } => {
                assert!(announced_caught_up);
                exhausted = true;
                break;
            }
        }
    }

    assert!(exhausted, "backlog never cleared");
    let catalog = store.catalog();
    let scraped: BTreeSet<u32> = catalog.items().map(|item| item.id).collect();
    assert_eq!(previous, scraped);

    let sent = mailer.count();
    let history = store.get("history.json");
    let outcome = runner.run(&mut rng, options(true)).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Exhausted { .. }));
    assert_eq!(mailer.count(), sent);
    assert_eq!(store.get("history.json"), history);
}

#[tokio::test]
async fn test_failed_send_leaves_history_unsaved() {
    let config = config(3);
    let store = MemoryStore::default();
    let index = index();
    let mut rng = StdRng::seed_from_u64(1);

    let result = Runner::new(&config, &store, &index, &RefusingMailer)
        .run(&mut rng, options(true))
        .await;

    assert!(matches!(result, Err(AppError::Mail(_))));
    assert_eq!(store.catalog().upper_bound(), 14);
    assert!(store.ledger().is_none());

    let mailer = RecordingMailer::default();
    let outcome = Runner::new(&config, &store, &index, &mailer)
        .run(&mut rng, options(true))
        .await
        .unwrap();
    let RunOutcome::Delivered(delivery) = outcome else {
        panic!("expected a delivery");
    };
    assert_eq!(
        delivered(&store.ledger().unwrap()),
        delivery.delivered.iter().copied().collect::<BTreeSet<_>>()
    );
}

#[tokio::test]
async fn test_dry_run_sends_without_recording() {
    let config = config(2);
    let store = MemoryStore::default();
    let index = index();
    let mailer = RecordingMailer::default();
    let mut rng = StdRng::seed_from_u64(3);

    let outcome = Runner::new(&config, &store, &index, &mailer)
        .run(&mut rng, options(false))
        .await
        .unwrap();

    let RunOutcome::Delivered(delivery) = outcome else {
        panic!("expected a delivery");
    };
    assert!(!delivery.history_saved);
    assert_eq!(mailer.count(), 1);
    assert!(store.ledger().is_none());
    assert_eq!(store.catalog().upper_bound(), 14);
}

#[tokio::test]
async fn test_later_scrape_fills_gap_and_grows() {
    let config = config(1);
    let store = MemoryStore::default();
    let index = index();

    let report = pipeline::sync(&config, &store, &index).await.unwrap();
    assert_eq!(report.latest_id, 14);
    assert_eq!(report.merge.missing_added, 2);

    index.set_page(IndexPage::Latest, rows(&[11, 12, 13, 14, 15]));
    let report = pipeline::sync(&config, &store, &index).await.unwrap();
    assert_eq!(report.upper_bound_before, 14);
    assert_eq!(report.upper_bound_after, 15);
    assert_eq!(report.merge.gaps_filled, 1);
    assert_eq!(report.merge.appended, 1);
    assert_eq!(report.pages, vec![IndexPage::Latest]);

    let catalog = store.catalog();
    assert_eq!(catalog.missing_ids(), vec![7]);
    assert_eq!(catalog.item(12).unwrap().title, "Comic 12");

    let status = pipeline::status(&config, &store).await.unwrap();
    assert_eq!(status.upper_bound, 15);
    assert_eq!(status.items, 14);
    assert_eq!(status.missing, 1);
    assert_eq!(status.chains, 1);
    assert_eq!(status.delivered, 0);
    assert_eq!(status.unread, 14);
    assert_eq!(status.untracked, 15);
}

#[tokio::test]
async fn test_corrupt_history_is_fatal() {
    let config = config(3);
    let store = MemoryStore::default();
    store.save("history.json", b"{not json").await.unwrap();
    let index = index();
    let mailer = RecordingMailer::default();
    let mut rng = StdRng::seed_from_u64(5);

    let result = Runner::new(&config, &store, &index, &mailer)
        .run(&mut rng, options(true))
        .await;

    assert!(matches!(result, Err(AppError::CorruptState { .. })));
    assert_eq!(mailer.count(), 0);
    assert!(index.fetched().is_empty());
}
