//! Storage abstractions for persisted run state.
//!
//! Two blobs survive between runs:
//!
//! ```text
//! {root or bucket/prefix}/
//! ├── details.json          # Catalog: one entry per id, slot 0 is a sentinel
//! └── history.json          # Ledger: read state per id, same indexing
//! ```
//!
//! A missing blob is normal on the first run and yields empty state. A blob
//! that exists but cannot be decoded is an error; state is never silently
//! reset.

pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{AppError, Result};
use crate::models::{Catalog, Ledger, StorageConfig};

// Re-export for convenience
pub use local::LocalStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;

/// Trait for key/value blob backends.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read a blob, `None` if the key does not exist.
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Create or replace a blob.
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Human-readable location of `key`, for logs.
    fn location(&self, key: &str) -> String;
}

/// Read and decode a JSON blob.
pub async fn load_json<T: DeserializeOwned>(store: &dyn BlobStore, key: &str) -> Result<Option<T>> {
    match store.load(key).await? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| AppError::corrupt(key, e)),
        None => Ok(None),
    }
}

/// Encode and write a JSON blob.
pub async fn save_json<T: Serialize + ?Sized>(store: &dyn BlobStore, key: &str, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    store.save(key, &bytes).await
}

/// Typed access to the catalog and ledger blobs.
pub struct StateStore<'a> {
    store: &'a dyn BlobStore,
    keys: &'a StorageConfig,
}

impl<'a> StateStore<'a> {
    pub fn new(store: &'a dyn BlobStore, keys: &'a StorageConfig) -> Self {
        Self { store, keys }
    }

    /// Load the catalog, starting empty on the first run.
    pub async fn load_catalog(&self) -> Result<Catalog> {
        let key = &self.keys.details_key;
        match load_json::<Catalog>(self.store, key).await? {
            Some(catalog) => {
                log::debug!(
                    "Loaded catalog up to #{} from {}",
                    catalog.upper_bound(),
                    self.store.location(key)
                );
                Ok(catalog)
            }
            None => {
                log::info!("No catalog at {}; starting empty", self.store.location(key));
                Ok(Catalog::new())
            }
        }
    }

    /// Load the ledger, starting empty on the first run.
    pub async fn load_ledger(&self) -> Result<Ledger> {
        let key = &self.keys.history_key;
        match load_json::<Ledger>(self.store, key).await? {
            Some(ledger) => Ok(ledger),
            None => {
                log::info!("No read history at {}; starting empty", self.store.location(key));
                Ok(Ledger::new())
            }
        }
    }

    pub async fn save_catalog(&self, catalog: &Catalog) -> Result<()> {
        save_json(self.store, &self.keys.details_key, catalog).await
    }

    pub async fn save_ledger(&self, ledger: &Ledger) -> Result<()> {
        save_json(self.store, &self.keys.history_key, ledger).await
    }
}
