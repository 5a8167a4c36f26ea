use crate::catalog::{self, CatalogEntry};
use crate::config::Config;
use crate::document::{self, StatusDocument};
use crate::error::Result;
use crate::fetch::{fetch_outcome, FetchOutcome, Fetcher};
use crate::reconcile::{has_changed, merge_record, reconcile, Observation};
use crate::stage;
use crate::store;
use crate::types::{bill_number_of, format_timestamp, BillNumber, BillRecord, InferredFields};
use async_stream::stream;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{error, info, warn};

/// Parse, extract and classify one status document
pub fn observe(bytes: &[u8], bill: &BillNumber) -> Result<Observation> {
    let doc = StatusDocument::parse(bytes)?;
    let fields = document::extract(&doc)?;
    let stage = stage::classify(&fields.last_action, &fields.action_history, bill.prefix());
    Ok(Observation { fields, stage })
}

/// How a single bill's refresh went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    Updated,
    FetchFailed(String),
    ParseFailed(String),
    /// Malformed bill number; no locator was built
    Rejected(String),
}

#[derive(Debug, Clone)]
pub struct ProcessedBill {
    pub bill_number: String,
    pub record: BillRecord,
    pub status: UpdateStatus,
    /// Stage or last action differ from the previous record
    pub changed: bool,
}

/// Aggregate counts for one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub updated: usize,
    pub fetch_failed: usize,
    pub parse_failed: usize,
    pub rejected: usize,
    pub changed: usize,
}

impl RunSummary {
    pub fn record(&mut self, bill: &ProcessedBill) {
        self.total += 1;
        match bill.status {
            UpdateStatus::Updated => self.updated += 1,
            UpdateStatus::FetchFailed(_) => self.fetch_failed += 1,
            UpdateStatus::ParseFailed(_) => self.parse_failed += 1,
            UpdateStatus::Rejected(_) => self.rejected += 1,
        }
        if bill.changed {
            self.changed += 1;
        }
    }
}

/// Results of a full `update` run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub bills: RunSummary,
    /// `None` when user bills were skipped or there were none
    pub user_bills: Option<RunSummary>,
}

/// Sequential bill refresher
pub struct BillProcessor<F> {
    config: Config,
    fetcher: F,
    clock: fn() -> DateTime<Utc>,
}

impl<F: Fetcher> BillProcessor<F> {
    pub fn new(config: Config, fetcher: F) -> Self {
        Self {
            config,
            fetcher,
            clock: Utc::now,
        }
    }

    /// Replace the wall clock (tests pin timestamps with this)
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    fn now(&self) -> String {
        format_timestamp((self.clock)())
    }

    /// Refresh one bill: fetch, observe, reconcile against `previous`.
    /// Never fails; every problem is reported through [`UpdateStatus`].
    pub async fn refresh(
        &self,
        opaque: Map<String, Value>,
        previous: Option<&InferredFields>,
        fetched_at: &str,
    ) -> ProcessedBill {
        let code = bill_number_of(&opaque).unwrap_or_default().to_string();

        let bill = match BillNumber::parse(&code) {
            Ok(bill) => bill,
            Err(e) => {
                error!(bill = %code, error = %e, "rejecting bill with malformed number");
                let inferred = previous.cloned().unwrap_or_default();
                return ProcessedBill {
                    bill_number: code,
                    record: merge_record(opaque, inferred),
                    status: UpdateStatus::Rejected(e.to_string()),
                    changed: false,
                };
            }
        };

        let url = self.config.locator(&bill);
        info!(bill = %bill, url = %url, "fetching status");

        let (observation, status) = match fetch_outcome(&self.fetcher, &url).await {
            FetchOutcome::Failed(reason) => (None, UpdateStatus::FetchFailed(reason)),
            FetchOutcome::Fetched(bytes) => match observe(&bytes, &bill) {
                Ok(observation) => (Some(observation), UpdateStatus::Updated),
                Err(e) => {
                    warn!(bill = %bill, error = %e, "keeping previous status");
                    (None, UpdateStatus::ParseFailed(e.to_string()))
                }
            },
        };

        let inferred = reconcile(previous, observation, fetched_at);
        if status == UpdateStatus::Updated {
            info!(
                bill = %bill,
                stage = %inferred.stage,
                sponsor = %inferred.primary_sponsor,
                last_action = %truncate(&inferred.last_action, 60),
                "status refreshed"
            );
        }
        let changed = has_changed(previous, &inferred);

        ProcessedBill {
            bill_number: code,
            record: merge_record(opaque, inferred),
            status,
            changed,
        }
    }

    /// Refresh every catalog entry against the previous bills.json.
    /// Editorial fields always come from the catalog.
    pub fn process_catalog<'a>(
        &'a self,
        catalog: Vec<CatalogEntry>,
        previous: &'a HashMap<String, BillRecord>,
    ) -> impl Stream<Item = ProcessedBill> + 'a {
        Box::pin(stream! {
            for entry in catalog {
                let prev = bill_number_of(&entry)
                    .and_then(|code| previous.get(code))
                    .map(|record| &record.inferred);
                let fetched_at = self.now();
                yield self.refresh(entry, prev, &fetched_at).await;
            }
        })
    }

    /// Refresh user-added bills in place, keeping every user-set field.
    /// One fetch timestamp is shared by the whole batch.
    pub fn process_user_bills(
        &self,
        bills: Vec<BillRecord>,
    ) -> impl Stream<Item = ProcessedBill> + '_ {
        let fetched_at = self.now();
        Box::pin(stream! {
            for bill in bills {
                let BillRecord { opaque, inferred } = bill;
                yield self.refresh(opaque, Some(&inferred), &fetched_at).await;
            }
        })
    }

    /// Full run: catalog bills into bills.json, then user-bills.json.
    pub async fn run(&self) -> Result<RunReport> {
        let catalog = catalog::load_catalog(&self.config.catalog_path)?;
        let previous = store::load_previous(&self.config.output_path);
        info!(
            count = catalog.len(),
            output = %self.config.output_path.display(),
            "updating base bills"
        );

        let (records, bills) = collect(self.process_catalog(catalog, &previous)).await;
        store::write_records(&self.config.output_path, &records)?;
        info!(
            changed = bills.changed,
            failed = bills.fetch_failed + bills.parse_failed,
            rejected = bills.rejected,
            "base bills written"
        );

        let mut report = RunReport {
            bills,
            user_bills: None,
        };

        if !self.config.refresh_user_bills {
            return Ok(report);
        }

        let user_bills = store::load_user_bills(&self.config.user_bills_path);
        if user_bills.is_empty() {
            info!("no user-added bills to refresh");
            return Ok(report);
        }

        info!(
            count = user_bills.len(),
            output = %self.config.user_bills_path.display(),
            "refreshing user-added bills"
        );
        let (records, summary) = collect(self.process_user_bills(user_bills)).await;
        store::write_records(&self.config.user_bills_path, &records)?;
        info!(refreshed = summary.total, "user-added bills written");
        report.user_bills = Some(summary);

        Ok(report)
    }
}

async fn collect(stream: impl Stream<Item = ProcessedBill>) -> (Vec<BillRecord>, RunSummary) {
    let mut summary = RunSummary::default();
    let records = stream
        .map(|bill| {
            summary.record(&bill);
            bill.record
        })
        .collect::<Vec<_>>()
        .await;
    (records, summary)
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
