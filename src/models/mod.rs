// src/models/mod.rs

//! Domain models for the mailer application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod catalog;
mod config;
mod item;
mod ledger;

// Re-export all public types
pub use catalog::{Catalog, Placement};
pub use config::{
    ColumnLayout, Config, DigestConfig, LoggingConfig, MailConfig, NoticePlacement,
    SelectionConfig, SourceConfig, StorageConfig, PLACEHOLDER,
};
pub use item::{CatalogEntry, IndexRow, ItemRecord};
pub use ledger::{Ledger, ReadState};
