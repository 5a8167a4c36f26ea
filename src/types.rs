use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;

/// Timestamp format used for `ilgaFetchedAt` and `stageChangedAt`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Format a UTC instant the way it is persisted in bills.json
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.format(TIMESTAMP_FORMAT).to_string()
}

/// Position of a bill in the legislative pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    InHouseCommittee,
    InSenateCommittee,
    PassedHouse,
    PassedSenate,
    Enrolled,
    AwaitingSignature,
    Signed,
    Failed,
    #[default]
    Unknown,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::InHouseCommittee,
        Stage::InSenateCommittee,
        Stage::PassedHouse,
        Stage::PassedSenate,
        Stage::Enrolled,
        Stage::AwaitingSignature,
        Stage::Signed,
        Stage::Failed,
        Stage::Unknown,
    ];

    /// Stable label consumed by display layers
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::InHouseCommittee => "InHouseCommittee",
            Stage::InSenateCommittee => "InSenateCommittee",
            Stage::PassedHouse => "PassedHouse",
            Stage::PassedSenate => "PassedSenate",
            Stage::Enrolled => "Enrolled",
            Stage::AwaitingSignature => "AwaitingSignature",
            Stage::Signed => "Signed",
            Stage::Failed => "Failed",
            Stage::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the stable labels as well as the display labels older
/// bills.json files were written with. Anything else is `Unknown`.
impl From<&str> for Stage {
    fn from(s: &str) -> Self {
        match s.trim() {
            "InHouseCommittee" | "In House Committee" => Stage::InHouseCommittee,
            "InSenateCommittee" | "In Senate Committee" => Stage::InSenateCommittee,
            "PassedHouse" | "Passed House" => Stage::PassedHouse,
            "PassedSenate" | "Passed Senate" => Stage::PassedSenate,
            "Enrolled" => Stage::Enrolled,
            "AwaitingSignature" | "Awaiting Governor Signature" => Stage::AwaitingSignature,
            "Signed" | "Signed into Law" => Stage::Signed,
            "Failed" => Stage::Failed,
            _ => Stage::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for Stage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = Option::<String>::deserialize(deserializer)?;
        Ok(label.as_deref().map(Stage::from).unwrap_or_default())
    }
}

/// Chamber a bill originates in, inferred from its type prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chamber {
    House,
    Senate,
}

impl Chamber {
    /// `HB`, `HR`, `HJR`, ... are House documents; every other prefix is Senate.
    pub fn from_prefix(prefix: &str) -> Self {
        if prefix.starts_with('H') {
            Chamber::House
        } else {
            Chamber::Senate
        }
    }

    /// Committee stage a bill sits in while still in this chamber
    pub fn committee_stage(&self) -> Stage {
        match self {
            Chamber::House => Stage::InHouseCommittee,
            Chamber::Senate => Stage::InSenateCommittee,
        }
    }
}

/// Identity of a tracked bill, e.g. `HB3466` -> prefix `HB`, number `3466`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BillNumber {
    prefix: String,
    number: String,
}

impl BillNumber {
    pub fn parse(code: &str) -> Result<Self> {
        let pattern = Regex::new(r"^([A-Z]+)(\d+)$")?;
        let caps = pattern
            .captures(code)
            .ok_or_else(|| Error::MalformedIdentity(code.to_string()))?;
        Ok(Self {
            prefix: caps[1].to_string(),
            number: caps[2].to_string(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn chamber(&self) -> Chamber {
        Chamber::from_prefix(&self.prefix)
    }

    /// ILGA FTP XML URL. The document number is zero-padded to 4 digits.
    pub fn locator(&self, base_url: &str) -> String {
        format!("{}{}{:0>4}.xml", base_url, self.prefix, self.number)
    }
}

impl fmt::Display for BillNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix, self.number)
    }
}

/// Next scheduled action (hearing, deadline, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextAction {
    pub date: String,
    pub action_type: Option<String>,
}

/// Most recent amendment listed in the synopsis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amendment {
    pub name: String,
    /// Status date of the first action mentioning the amendment
    pub date: Option<String>,
}

/// Fields produced by the inference pipeline. These are the only keys of a
/// persisted record that billbot writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InferredFields {
    pub stage: Stage,
    pub primary_sponsor: String,
    pub last_action: String,
    pub last_action_date: String,
    pub ilga_fetched_at: String,
    pub stage_changed_at: String,
    pub next_action_date: Option<String>,
    pub next_action_type: Option<String>,
    pub last_amendment_name: Option<String>,
    pub last_amendment_date: Option<String>,
    pub is_shell_bill: bool,
}

impl InferredFields {
    /// Serialized names of every owned key
    pub const KEYS: [&'static str; 11] = [
        "stage",
        "primarySponsor",
        "lastAction",
        "lastActionDate",
        "ilgaFetchedAt",
        "stageChangedAt",
        "nextActionDate",
        "nextActionType",
        "lastAmendmentName",
        "lastAmendmentDate",
        "isShellBill",
    ];

    pub fn owns(key: &str) -> bool {
        Self::KEYS.contains(&key)
    }

    pub fn next_action(&self) -> Option<NextAction> {
        self.next_action_date.as_ref().map(|date| NextAction {
            date: date.clone(),
            action_type: self.next_action_type.clone(),
        })
    }

    pub fn last_amendment(&self) -> Option<Amendment> {
        self.last_amendment_name.as_ref().map(|name| Amendment {
            name: name.clone(),
            date: self.last_amendment_date.clone(),
        })
    }
}

/// A persisted bill: editorial and user-set fields billbot never touches,
/// plus the inferred fields it recomputes each run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BillRecord {
    /// Every key as it was read, in order. Owned keys only hold their slot
    /// here; their values always come from `inferred` on write.
    pub opaque: Map<String, Value>,
    pub inferred: InferredFields,
}

impl BillRecord {
    pub fn new(opaque: Map<String, Value>, inferred: InferredFields) -> Self {
        Self { opaque, inferred }
    }

    /// Read the owned keys out of a raw JSON object. An owned key with a
    /// value of the wrong type falls back to its default, so one bad field
    /// never costs the rest of the record.
    pub fn from_map(map: Map<String, Value>) -> Self {
        let owned: Map<String, Value> = map
            .iter()
            .filter(|(key, _)| InferredFields::owns(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let inferred = match serde_json::from_value(Value::Object(owned.clone())) {
            Ok(inferred) => inferred,
            Err(_) => {
                let usable: Map<String, Value> = owned
                    .into_iter()
                    .filter(|(key, value)| {
                        let single: Map<String, Value> =
                            [(key.clone(), value.clone())].into_iter().collect();
                        match serde_json::from_value::<InferredFields>(Value::Object(single)) {
                            Ok(_) => true,
                            Err(e) => {
                                warn!(
                                    bill = bill_number_of(&map).unwrap_or_default(),
                                    key = %key,
                                    error = %e,
                                    "ignoring unreadable field"
                                );
                                false
                            }
                        }
                    })
                    .collect();
                serde_json::from_value(Value::Object(usable)).unwrap_or_default()
            }
        };

        Self {
            opaque: map,
            inferred,
        }
    }

    /// Keys keep the order they were read in; owned keys the record did not
    /// have yet are appended.
    pub fn to_map(&self) -> Result<Map<String, Value>> {
        let mut map = self.opaque.clone();
        if let Value::Object(owned) = serde_json::to_value(&self.inferred)? {
            for (key, value) in owned {
                map.insert(key, value);
            }
        }
        Ok(map)
    }

    pub fn bill_number(&self) -> Option<&str> {
        bill_number_of(&self.opaque)
    }
}

/// `billNumber` of a raw catalog or persisted entry
pub fn bill_number_of(fields: &Map<String, Value>) -> Option<&str> {
    fields.get("billNumber").and_then(Value::as_str)
}

impl Serialize for BillRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_map()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BillRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        Ok(BillRecord::from_map(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_bill_number() {
        let bill = BillNumber::parse("HB3466").unwrap();
        assert_eq!(bill.prefix(), "HB");
        assert_eq!(bill.number(), "3466");
        assert_eq!(bill.chamber(), Chamber::House);
        assert_eq!(bill.to_string(), "HB3466");
    }

    #[test]
    fn test_malformed_bill_number() {
        for code in ["", "3466", "hb3466", "HB", "HB 3466", "HB3466a"] {
            match BillNumber::parse(code) {
                Err(Error::MalformedIdentity(got)) => assert_eq!(got, code),
                other => panic!("expected MalformedIdentity for {:?}, got {:?}", code, other),
            }
        }
    }

    #[test]
    fn test_locator_pads_number() {
        let base = "https://www.ilga.gov/ftp/legislation/104/BillStatus/XML/10400";
        assert_eq!(
            BillNumber::parse("SB62").unwrap().locator(base),
            "https://www.ilga.gov/ftp/legislation/104/BillStatus/XML/10400SB0062.xml"
        );
        assert_eq!(
            BillNumber::parse("HB3466").unwrap().locator(base),
            "https://www.ilga.gov/ftp/legislation/104/BillStatus/XML/10400HB3466.xml"
        );
    }

    #[test]
    fn test_stage_labels() {
        for stage in Stage::ALL {
            let encoded = serde_json::to_value(stage).unwrap();
            assert_eq!(encoded, json!(stage.as_str()));
            let decoded: Stage = serde_json::from_value(encoded).unwrap();
            assert_eq!(decoded, stage);
        }
    }

    #[test]
    fn test_legacy_stage_labels() {
        assert_eq!(Stage::from("Signed into Law"), Stage::Signed);
        assert_eq!(Stage::from("Awaiting Governor Signature"), Stage::AwaitingSignature);
        assert_eq!(Stage::from("In Senate Committee"), Stage::InSenateCommittee);
        assert_eq!(Stage::from("Something new"), Stage::Unknown);
        let decoded: Stage = serde_json::from_value(Value::Null).unwrap();
        assert_eq!(decoded, Stage::Unknown);
    }

    #[test]
    fn test_record_split_and_overlay() {
        let raw = json!({
            "id": 7,
            "billNumber": "HB3552",
            "stage": "Passed House",
            "title": "Local Accessory Dwelling Unit Act",
            "notes": { "owner": "policy", "tags": ["adu", 3] },
            "isShellBill": true
        });
        let record: BillRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(record.inferred.stage, Stage::PassedHouse);
        assert!(record.inferred.is_shell_bill);
        assert_eq!(record.inferred.primary_sponsor, "");
        assert_eq!(record.bill_number(), Some("HB3552"));

        let map = record.to_map().unwrap();
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "id",
                "billNumber",
                "stage",
                "title",
                "notes",
                "isShellBill",
                "primarySponsor",
                "lastAction",
                "lastActionDate",
                "ilgaFetchedAt",
                "stageChangedAt",
                "nextActionDate",
                "nextActionType",
                "lastAmendmentName",
                "lastAmendmentDate",
            ]
        );
        assert_eq!(map["notes"], json!({ "owner": "policy", "tags": ["adu", 3] }));
        assert_eq!(map["stage"], json!("PassedHouse"));
        assert_eq!(map["nextActionDate"], Value::Null);
    }

    #[test]
    fn test_record_keeps_existing_key_positions() {
        let raw = json!({
            "billNumber": "SB3671",
            "stage": "InSenateCommittee",
            "stageChangedAt": "2026-02-07T06:00:00Z",
            "title": "Rental Property Registry",
            "userAdded": true
        });
        let Value::Object(map) = raw else { unreachable!() };
        let mut record = BillRecord::from_map(map);
        record.inferred.stage = Stage::PassedSenate;

        let out = record.to_map().unwrap();
        let keys: Vec<&str> = out.keys().map(String::as_str).collect();
        assert_eq!(
            &keys[..5],
            &["billNumber", "stage", "stageChangedAt", "title", "userAdded"]
        );
        assert_eq!(keys.len(), 14);
        assert_eq!(out["stage"], json!("PassedSenate"));
    }

    #[test]
    fn test_wrongly_typed_field_falls_back_to_default() {
        let raw = json!({
            "billNumber": "HB2",
            "stage": "Passed House",
            "primarySponsor": null,
            "isShellBill": "yes",
            "stageChangedAt": "2025-03-01T12:00:00Z"
        });
        let record: BillRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(record.inferred.stage, Stage::PassedHouse);
        assert_eq!(record.inferred.primary_sponsor, "");
        assert!(!record.inferred.is_shell_bill);
        assert_eq!(record.inferred.stage_changed_at, "2025-03-01T12:00:00Z");
    }

    #[test]
    fn test_chamber_from_prefix() {
        for prefix in ["HB", "HR", "HJR", "HJRCA"] {
            assert_eq!(Chamber::from_prefix(prefix), Chamber::House, "{}", prefix);
        }
        for prefix in ["SB", "SR", "SJR", "EO"] {
            assert_eq!(Chamber::from_prefix(prefix), Chamber::Senate, "{}", prefix);
        }
    }
}
