//! Merging a fresh observation with the previously persisted state.

use crate::document::ExtractedFields;
use crate::types::{BillRecord, InferredFields, Stage};
use serde_json::{Map, Value};

/// A successfully parsed and classified status document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub fields: ExtractedFields,
    pub stage: Stage,
}

/// Compute this run's inferred fields.
///
/// With no observation (fetch or parse failed) the previous fields are kept
/// as they were, or defaults with stage `Unknown` for a bill never fetched.
/// Otherwise `stageChangedAt` moves to `fetched_at` only when the stage
/// differs from the previous one.
pub fn reconcile(
    previous: Option<&InferredFields>,
    observation: Option<Observation>,
    fetched_at: &str,
) -> InferredFields {
    let Some(Observation { fields, stage }) = observation else {
        return previous.cloned().unwrap_or_default();
    };

    let stage_changed_at = match previous {
        Some(prev) if prev.stage == stage && !prev.stage_changed_at.is_empty() => {
            prev.stage_changed_at.clone()
        }
        _ => fetched_at.to_string(),
    };

    let (next_action_date, next_action_type) = match fields.next_action {
        Some(next) => (Some(next.date), next.action_type),
        None => (None, None),
    };
    let (last_amendment_name, last_amendment_date) = match fields.last_amendment {
        Some(amendment) => (Some(amendment.name), amendment.date),
        None => (None, None),
    };

    InferredFields {
        stage,
        primary_sponsor: fields.primary_sponsor,
        last_action: fields.last_action,
        last_action_date: fields.last_action_date,
        ilga_fetched_at: fetched_at.to_string(),
        stage_changed_at,
        next_action_date,
        next_action_type,
        last_amendment_name,
        last_amendment_date,
        is_shell_bill: fields.is_shell_bill,
    }
}

/// Overlay inferred fields on an entry's opaque fields
pub fn merge_record(opaque: Map<String, Value>, inferred: InferredFields) -> BillRecord {
    BillRecord::new(opaque, inferred)
}

/// Reporting signal: stage or last action text moved
pub fn has_changed(previous: Option<&InferredFields>, next: &InferredFields) -> bool {
    match previous {
        Some(prev) => prev.stage != next.stage || prev.last_action != next.last_action,
        None => true,
    }
}
