//! Bill status tracking for the Illinois General Assembly.
//!
//! This library fetches per-bill status XML, extracts the last action,
//! sponsor, next hearing and amendment history, classifies each bill into a
//! pipeline stage and reconciles the result with the previously persisted
//! bills.json so failed fetches never lose data.

pub mod catalog;
pub mod config;
pub mod document;
pub mod error;
pub mod fetch;
pub mod processor;
pub mod reconcile;
pub mod stage;
pub mod store;
pub mod types;

pub use config::{Config, ConfigBuilder};
pub use document::{extract, ExtractedFields, StatusDocument};
pub use error::{Error, Result};
pub use fetch::{FetchOutcome, Fetcher, HttpFetcher};
pub use processor::{observe, BillProcessor, ProcessedBill, RunReport, RunSummary, UpdateStatus};
pub use reconcile::{has_changed, merge_record, reconcile, Observation};
pub use stage::classify;
pub use types::{
    Amendment, BillNumber, BillRecord, Chamber, InferredFields, NextAction, Stage,
};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::{Config, ConfigBuilder};
    pub use crate::error::{Error, Result};
    pub use crate::fetch::{Fetcher, HttpFetcher};
    pub use crate::processor::{BillProcessor, RunReport, RunSummary, UpdateStatus};
    pub use crate::types::{BillNumber, BillRecord, InferredFields, Stage};
    pub use futures::StreamExt;
}
