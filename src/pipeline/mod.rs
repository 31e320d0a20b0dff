//! Pipeline stages for a mailer run.
//!
//! - `extract`: Turn index rows into item records
//! - `merge`: Fold records into the persisted catalog
//! - `chain`: Walk multi-part chains
//! - `select`: Draw and resolve the unread batch
//! - `digest`: Render the message
//! - `sync`: Fetch the pages the catalog is behind on
//! - `run`: Tie it all together

pub mod chain;
pub mod digest;
pub mod extract;
pub mod merge;
pub mod run;
pub mod select;
pub mod sync;

pub use chain::{delivered_ancestor_chain, earliest_undelivered_ancestor};
pub use digest::{Digest, render_digest};
pub use extract::{base_title, extract_record, part_number};
pub use merge::{MergeReport, merge_page};
pub use run::{Delivery, RunOptions, RunOutcome, Runner, StatusReport, status, sync};
pub use select::{DeliveryItem, Selection, candidate_ids, resolve_selection, select_unread};
pub use sync::{SyncReport, plan_archive_pages, sync_catalog};
