// src/lib.rs

//! Comic mailer library
//!
//! Keeps a catalog of a numbered series scraped from a paginated index and
//! mails a batch of unread items per run, never sending a later part before
//! the earlier ones.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
