//! Field extraction from ILGA bill status XML.
//!
//! The XML is parsed once into a [`StatusDocument`], an owned view holding
//! only the elements billbot reads. Missing elements become empty or absent
//! values; only bytes that are not a well-formed document are an error.

use crate::error::{Error, Result};
use crate::types::{Amendment, NextAction};
use regex::Regex;
use roxmltree::Node;

/// Synopsis body prefix marking an amendment that replaces the whole bill
pub const SHELL_BILL_MARKER: &str = "Replaces everything after the enacting clause";

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// `<lastaction>` / `<nextaction>` pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatedAction {
    pub action: String,
    pub date: String,
}

/// Flat children of `<actions>`, in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionItem {
    Date(String),
    Text(String),
}

/// Flat children of `<synopsis>`, in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynopsisItem {
    Title(String),
    Body(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusDocument {
    pub last_action: Option<DatedAction>,
    pub sponsors: Option<String>,
    pub actions: Vec<ActionItem>,
    pub next_action: Option<DatedAction>,
    pub committee_hearing: Option<String>,
    pub synopsis: Vec<SynopsisItem>,
}

/// Everything the extractor derives from one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFields {
    pub last_action: String,
    pub last_action_date: String,
    pub primary_sponsor: String,
    /// Lower-cased action texts, only used for classification
    pub action_history: Vec<String>,
    pub next_action: Option<NextAction>,
    pub last_amendment: Option<Amendment>,
    pub is_shell_bill: bool,
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn raw_text(node: Node) -> String {
    node.text().unwrap_or("").to_string()
}

fn trimmed_text(node: Node) -> String {
    node.text().unwrap_or("").trim().to_string()
}

fn dated_action(node: Node) -> DatedAction {
    DatedAction {
        action: child(node, "action").map(trimmed_text).unwrap_or_default(),
        date: child(node, "statusdate").map(trimmed_text).unwrap_or_default(),
    }
}

impl StatusDocument {
    /// Parse raw XML bytes. Fails only when the bytes are not a document.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::Parse(format!("status document is not UTF-8: {}", e)))?;
        let text = text.trim_start_matches('\u{feff}');
        let xml = roxmltree::Document::parse(text).map_err(|e| Error::Parse(e.to_string()))?;
        let root = xml.root_element();

        let sponsors = child(root, "sponsor")
            .and_then(|s| child(s, "sponsors"))
            .and_then(|s| s.text())
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        let actions = child(root, "actions")
            .map(|actions| {
                actions
                    .children()
                    .filter(Node::is_element)
                    .filter_map(|n| match n.tag_name().name() {
                        "statusdate" => Some(ActionItem::Date(trimmed_text(n))),
                        "action" => Some(ActionItem::Text(raw_text(n))),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let synopsis = child(root, "synopsis")
            .map(|synopsis| {
                synopsis
                    .children()
                    .filter(Node::is_element)
                    // ILGA capitalizes the body element only
                    .filter_map(|n| match n.tag_name().name() {
                        "synopsistitle" => Some(SynopsisItem::Title(trimmed_text(n))),
                        "SynopsisText" => Some(SynopsisItem::Body(trimmed_text(n))),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Ok(Self {
            last_action: child(root, "lastaction").map(dated_action),
            sponsors,
            actions,
            next_action: child(root, "nextaction").map(dated_action),
            committee_hearing: child(root, "committeehearing")
                .and_then(|n| n.text())
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            synopsis,
        })
    }

    /// `(text, date)` of the last action, both empty when absent
    pub fn last_action(&self) -> (String, String) {
        self.last_action
            .as_ref()
            .map(|la| (la.action.clone(), la.date.clone()))
            .unwrap_or_default()
    }

    /// Chief sponsor: first name in the sponsor list
    pub fn primary_sponsor(&self) -> Result<String> {
        let Some(sponsors) = self.sponsors.as_deref() else {
            return Ok(String::new());
        };
        let separators = Regex::new(r"-|,|\s+and\s+")?;
        let first = separators
            .split(sponsors.trim())
            .next()
            .unwrap_or("")
            .trim()
            .to_string();
        Ok(first)
    }

    pub fn action_history(&self) -> Vec<String> {
        self.actions
            .iter()
            .filter_map(|item| match item {
                ActionItem::Text(text) if !text.is_empty() => Some(text.trim().to_lowercase()),
                _ => None,
            })
            .collect()
    }

    /// Next scheduled action from `<nextaction>`, falling back to the date
    /// embedded in the `<committeehearing>` text.
    pub fn next_action(&self) -> Result<Option<NextAction>> {
        if let Some(na) = self.next_action.as_ref().filter(|na| !na.date.is_empty()) {
            return Ok(Some(NextAction {
                date: na.date.clone(),
                action_type: non_empty(&na.action),
            }));
        }

        let Some(hearing) = self.committee_hearing.as_deref() else {
            return Ok(None);
        };
        let raw = hearing.trim();
        let pattern = Regex::new(&format!(
            r"\b({})\s+(\d{{1,2}})\s+(\d{{4}})\b",
            MONTHS.join("|")
        ))?;
        let Some(caps) = pattern.captures(raw) else {
            return Ok(None);
        };
        let month = MONTHS
            .iter()
            .position(|m| *m == &caps[1])
            .map(|i| i + 1)
            .unwrap_or_default();
        let start = caps.get(0).map(|m| m.start()).unwrap_or_default();
        Ok(Some(NextAction {
            date: format!("{}/{}/{}", month, &caps[2], &caps[3]),
            action_type: non_empty(raw[..start].trim()),
        }))
    }

    /// Last amendment named in the synopsis and whether any consumed
    /// amendment replaces the bill wholesale.
    pub fn amendments(&self) -> (Option<Amendment>, bool) {
        let mut scan = AmendmentScan::default();
        let mut state = SynopsisState::AwaitingTitle;
        for item in &self.synopsis {
            state = state.step(item, &mut scan);
        }

        let amendment = scan.last_name.map(|name| Amendment {
            date: self.first_mention_date(&name),
            name,
        });
        (amendment, scan.is_shell_bill)
    }

    /// Status date in effect at the first action whose text mentions `needle`
    fn first_mention_date(&self, needle: &str) -> Option<String> {
        let needle = needle.trim();
        let mut current_date: Option<&str> = None;
        for item in &self.actions {
            match item {
                ActionItem::Date(date) => current_date = Some(date.as_str()),
                ActionItem::Text(text) if text.contains(needle) => {
                    return current_date.and_then(|d| non_empty(d));
                }
                ActionItem::Text(_) => {}
            }
        }
        None
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[derive(Debug, Default)]
struct AmendmentScan {
    last_name: Option<String>,
    is_shell_bill: bool,
}

/// Synopsis walk: a title waits for its body, the body commits the title.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SynopsisState {
    AwaitingTitle,
    AwaitingBody(String),
}

impl SynopsisState {
    fn step(self, item: &SynopsisItem, scan: &mut AmendmentScan) -> Self {
        match (self, item) {
            (state, SynopsisItem::Title(title)) if title.is_empty() => state,
            (_, SynopsisItem::Title(title)) => SynopsisState::AwaitingBody(title.clone()),
            (SynopsisState::AwaitingTitle, SynopsisItem::Body(_)) => SynopsisState::AwaitingTitle,
            (SynopsisState::AwaitingBody(title), SynopsisItem::Body(body)) => {
                if body.starts_with(SHELL_BILL_MARKER) {
                    scan.is_shell_bill = true;
                }
                scan.last_name = Some(title);
                SynopsisState::AwaitingTitle
            }
        }
    }
}

/// Pull every field billbot persists out of a parsed document
pub fn extract(doc: &StatusDocument) -> Result<ExtractedFields> {
    let (last_action, last_action_date) = doc.last_action();
    let (last_amendment, is_shell_bill) = doc.amendments();
    Ok(ExtractedFields {
        last_action,
        last_action_date,
        primary_sponsor: doc.primary_sponsor()?,
        action_history: doc.action_history(),
        next_action: doc.next_action()?,
        last_amendment,
        is_shell_bill,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HB3552: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<billstatus>
  <lastaction>
    <statusdate>4/11/2025</statusdate>
    <chamber>House</chamber>
    <action>Rule 19(a) / Re-referred to Rules Committee</action>
  </lastaction>
  <sponsor>
    <sponsors>Rep. Ann M. Williams - Kam Buckner, Lilian Jiménez and Will Guzzardi</sponsors>
  </sponsor>
  <actions>
    <statusdate>2/18/2025</statusdate>
    <chamber>House</chamber>
    <action>Filed with the Clerk by Rep. Ann M. Williams</action>
    <statusdate>3/20/2025</statusdate>
    <chamber>House</chamber>
    <action>House Committee Amendment No. 1 Filed with Clerk by Rep. Ann M. Williams</action>
    <statusdate>3/26/2025</statusdate>
    <chamber>House</chamber>
    <action>House Committee Amendment No. 1 Adopted in Housing Committee</action>
    <statusdate>4/11/2025</statusdate>
    <chamber>House</chamber>
    <action>Rule 19(a) / Re-referred to Rules Committee</action>
  </actions>
  <committeehearing>Housing Committee Hearing Mar 26 2025 2:00PM Capitol Building Room 122B Springfield, IL</committeehearing>
  <synopsis>
    <synopsistitle>House Committee Amendment No. 1</synopsistitle>
    <SynopsisText>Replaces everything after the enacting clause with the following: Creates the Local Accessory Dwelling Unit Act.</SynopsisText>
  </synopsis>
</billstatus>"#;

    fn parse(xml: &str) -> StatusDocument {
        StatusDocument::parse(xml.as_bytes()).unwrap()
    }

    #[test]
    fn test_extract_full_document() {
        let fields = extract(&parse(HB3552)).unwrap();
        assert_eq!(fields.last_action, "Rule 19(a) / Re-referred to Rules Committee");
        assert_eq!(fields.last_action_date, "4/11/2025");
        assert_eq!(fields.primary_sponsor, "Rep. Ann M. Williams");
        assert_eq!(fields.action_history.len(), 4);
        assert_eq!(
            fields.action_history[0],
            "filed with the clerk by rep. ann m. williams"
        );
        assert_eq!(
            fields.next_action,
            Some(NextAction {
                date: "3/26/2025".to_string(),
                action_type: Some("Housing Committee Hearing".to_string()),
            })
        );
        assert_eq!(
            fields.last_amendment,
            Some(Amendment {
                name: "House Committee Amendment No. 1".to_string(),
                date: Some("3/20/2025".to_string()),
            })
        );
        assert!(fields.is_shell_bill);
    }

    #[test]
    fn test_empty_document_is_not_an_error() {
        let fields = extract(&parse("<billstatus/>")).unwrap();
        assert_eq!(fields, ExtractedFields::default());
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(
            StatusDocument::parse(b"<billstatus><lastaction>"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            StatusDocument::parse(&[0xff, 0xfe, 0x00]),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_sponsor_separators() {
        let sponsor = |text: &str| {
            parse(&format!(
                "<b><sponsor><sponsors>{}</sponsors></sponsor></b>",
                text
            ))
            .primary_sponsor()
            .unwrap()
        };
        assert_eq!(sponsor("Sen. Mike Simmons, Robert Peters"), "Sen. Mike Simmons");
        assert_eq!(sponsor("  Rep. Kam Buckner and Rep. Will Guzzardi"), "Rep. Kam Buckner");
        assert_eq!(sponsor("Sen. Sara Feigenholtz"), "Sen. Sara Feigenholtz");
        assert_eq!(parse("<b><sponsor/></b>").primary_sponsor().unwrap(), "");
    }

    #[test]
    fn test_next_action_element_wins() {
        let doc = parse(
            "<b><nextaction><statusdate>5/31/2025</statusdate><action>Third Reading Deadline</action></nextaction>\
             <committeehearing>Hearing Jan 2 2025</committeehearing></b>",
        );
        assert_eq!(
            doc.next_action().unwrap(),
            Some(NextAction {
                date: "5/31/2025".to_string(),
                action_type: Some("Third Reading Deadline".to_string()),
            })
        );

        let doc = parse("<b><nextaction><statusdate>5/31/2025</statusdate></nextaction></b>");
        assert_eq!(
            doc.next_action().unwrap(),
            Some(NextAction { date: "5/31/2025".to_string(), action_type: None })
        );
    }

    #[test]
    fn test_next_action_without_date_falls_back() {
        let doc = parse(
            "<b><nextaction><statusdate/><action>Pending</action></nextaction>\
             <committeehearing>Dec 3 2025 Revenue</committeehearing></b>",
        );
        assert_eq!(
            doc.next_action().unwrap(),
            Some(NextAction { date: "12/3/2025".to_string(), action_type: None })
        );
        let doc = parse("<b><committeehearing>To be announced</committeehearing></b>");
        assert_eq!(doc.next_action().unwrap(), None);
    }

    #[test]
    fn test_last_amendment_wins() {
        let doc = parse(
            "<b><actions>\
               <statusdate>3/1/2025</statusdate><action>Senate Floor Amendment No. 2 Filed</action>\
               <statusdate>3/4/2025</statusdate><action>Senate Floor Amendment No. 2 Adopted</action>\
             </actions><synopsis>\
               <synopsistitle>Senate Committee Amendment No. 1</synopsistitle>\
               <SynopsisText>Deletes reference to the Property Tax Code.</SynopsisText>\
               <synopsistitle></synopsistitle>\
               <SynopsisText>Orphan body with no title.</SynopsisText>\
               <synopsistitle>Senate Floor Amendment No. 2</synopsistitle>\
               <SynopsisText>Adds an effective date.</SynopsisText>\
             </synopsis></b>",
        );
        let (amendment, shell) = doc.amendments();
        assert_eq!(
            amendment,
            Some(Amendment {
                name: "Senate Floor Amendment No. 2".to_string(),
                date: Some("3/1/2025".to_string()),
            })
        );
        assert!(!shell);
    }

    #[test]
    fn test_shell_bill_requires_prefix() {
        let shell = |body: &str| {
            parse(&format!(
                "<b><synopsis><synopsistitle>House Floor Amendment No. 1</synopsistitle>\
                 <SynopsisText>{}</SynopsisText></synopsis></b>",
                body
            ))
            .amendments()
            .1
        };
        assert!(shell("Replaces everything after the enacting clause with the following:..."));
        assert!(!shell(
            "Makes changes. Replaces everything after the enacting clause with the following:..."
        ));
        assert!(!shell("replaces everything after the enacting clause"));
    }

    #[test]
    fn test_amendment_without_mention_has_no_date() {
        let doc = parse(
            "<b><actions><statusdate>1/9/2025</statusdate><action>Filed</action></actions>\
             <synopsis><synopsistitle>House Amendment No. 3</synopsistitle>\
             <SynopsisText>Technical.</SynopsisText></synopsis></b>",
        );
        let (amendment, _) = doc.amendments();
        assert_eq!(
            amendment,
            Some(Amendment { name: "House Amendment No. 3".to_string(), date: None })
        );
    }

    #[test]
    fn test_pending_title_replaced_before_body() {
        let mut scan = AmendmentScan::default();
        let state = SynopsisState::AwaitingTitle
            .step(&SynopsisItem::Title("A".to_string()), &mut scan)
            .step(&SynopsisItem::Title("B".to_string()), &mut scan);
        assert_eq!(state, SynopsisState::AwaitingBody("B".to_string()));
        let state = state.step(&SynopsisItem::Body("text".to_string()), &mut scan);
        assert_eq!(state, SynopsisState::AwaitingTitle);
        assert_eq!(scan.last_name.as_deref(), Some("B"));
    }

    #[test]
    fn test_tag_names_are_case_sensitive() {
        let doc = parse(
            "<b><actions><StatusDate>1/9/2025</StatusDate><Action>Filed</Action></actions>\
             <synopsis><synopsistitle>Senate Floor Amendment No. 1</synopsistitle>\
             <synopsistext>Replaces everything after the enacting clause.</synopsistext></synopsis></b>",
        );
        assert!(doc.actions.is_empty());
        assert_eq!(
            doc.synopsis,
            vec![SynopsisItem::Title("Senate Floor Amendment No. 1".to_string())]
        );
        let fields = extract(&doc).unwrap();
        assert_eq!(fields.last_amendment, None);
        assert!(!fields.is_shell_bill);
    }
}
