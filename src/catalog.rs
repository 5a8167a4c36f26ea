use crate::error::{Error, Result};
use crate::types::bill_number_of;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// One tracked bill's editorial fields (title, description, category, ...)
pub type CatalogEntry = Map<String, Value>;

/// Load the tracked-bill catalog.
/// YAML unless the file ends in `.json`. Every entry must carry a string
/// `billNumber`; whether that code is well formed is checked per bill at
/// update time.
pub fn load_catalog(path: &Path) -> Result<Vec<CatalogEntry>> {
    let contents = fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let entries: Vec<CatalogEntry> = if is_json {
        serde_json::from_str(&contents)?
    } else {
        serde_yaml::from_str(&contents)?
    };

    for (idx, entry) in entries.iter().enumerate() {
        if bill_number_of(entry).is_none() {
            return Err(Error::Config(format!(
                "Catalog entry {} in {} has no billNumber",
                idx,
                path.display()
            )));
        }
    }

    Ok(entries)
}
