use crate::error::Result;
use crate::types::BillRecord;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Previous bills.json keyed by bill number.
/// Missing or unreadable files yield an empty map: every bill is then new.
pub fn load_previous(path: &Path) -> HashMap<String, BillRecord> {
    load_records(path)
        .into_iter()
        .filter_map(|record| {
            let key = record.bill_number()?.to_string();
            Some((key, record))
        })
        .collect()
}

/// user-bills.json; empty when missing or invalid
pub fn load_user_bills(path: &Path) -> Vec<BillRecord> {
    load_records(path)
}

fn load_records(path: &Path) -> Vec<BillRecord> {
    if !path.exists() {
        return Vec::new();
    }
    match read_records(path) {
        Ok(records) => records,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable records file");
            Vec::new()
        }
    }
}

/// Records are read one at a time so a bad entry only costs itself
fn read_records(path: &Path) -> Result<Vec<BillRecord>> {
    let contents = fs::read_to_string(path)?;
    let entries: Vec<Value> = serde_json::from_str(&contents)?;
    let records = entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match entry {
            Value::Object(map) => Some(BillRecord::from_map(map)),
            _ => {
                warn!(path = %path.display(), index, "skipping record that is not an object");
                None
            }
        })
        .collect();
    Ok(records)
}

/// Replace `path` with `records` as a pretty-printed JSON array
pub fn write_records(path: &Path, records: &[BillRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json)?;
    Ok(())
}
