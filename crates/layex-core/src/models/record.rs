//! Parsed document records.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::geometry::Region;

/// Keys that carry record metadata and can never be used as field names.
pub const RESERVED_KEYS: &[&str] = &[
    "case_id",
    "filename",
    "parsed",
    "unreadable",
    "unparseable",
    "unparsed_data",
];

/// A typed field value.
///
/// Serialized without a tag. Stored strings read back as `Text`, so a text
/// field that happens to look like a date keeps its type; the converter
/// named in the layout is what produces `Date` and `Time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    Integer(i64),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Boolean(v) => write!(f, "{v}"),
            FieldValue::Integer(v) => write!(f, "{v}"),
            FieldValue::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            FieldValue::Time(v) => write!(f, "{}", v.format("%H:%M")),
            FieldValue::Text(v) => write!(f, "{v}"),
        }
    }
}

/// Why a fragment did not become a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldErrorKind {
    /// No field region contains the fragment.
    NoCandidates,
    /// More than one field region contains the fragment.
    MultipleCandidates,
    /// The matched field's converter rejected the text.
    ConversionFailed,
}

impl std::fmt::Display for FieldErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FieldErrorKind::NoCandidates => "no candidates",
            FieldErrorKind::MultipleCandidates => "multiple candidates",
            FieldErrorKind::ConversionFailed => "conversion failed",
        };
        f.write_str(s)
    }
}

/// A field-level failure, kept on the record so it can be replayed later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnparsedEntry {
    pub kind: FieldErrorKind,
    pub page: u32,
    pub page_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<String>,
    pub text: String,
    pub region: Region,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// One record per document.
///
/// Fields that never resolved are absent. Field order is sorted by name, so
/// parsing the same document twice serializes identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRecord {
    /// Case identifier derived from the file name.
    pub case_id: String,

    /// File name of the source document.
    pub filename: String,

    /// Whether the parser ran to completion over the document.
    pub parsed: bool,

    /// The layout provider could not open the document.
    #[serde(default, skip_serializing_if = "is_false")]
    pub unreadable: bool,

    /// No page was classified, or a required first-page field was missing.
    #[serde(default, skip_serializing_if = "is_false")]
    pub unparseable: bool,

    /// Field-level failures in fragment order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unparsed_data: Vec<UnparsedEntry>,

    /// Resolved field values.
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

fn is_false(v: &bool) -> bool {
    !*v
}

impl ParsedRecord {
    pub fn new(case_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            case_id: case_id.into(),
            filename: filename.into(),
            parsed: false,
            unreadable: false,
            unparseable: false,
            unparsed_data: Vec::new(),
            fields: BTreeMap::new(),
        }
    }

    /// Minimal record for a document the provider could not open.
    pub fn unreadable(case_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            unreadable: true,
            ..Self::new(case_id, filename)
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Store a value. Later fragments for the same field overwrite earlier ones.
    pub fn set(&mut self, field: impl Into<String>, value: FieldValue) {
        self.fields.insert(field.into(), value);
    }

    pub fn push_error(&mut self, entry: UnparsedEntry) {
        self.unparsed_data.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_serialize_flattens_fields_and_hides_clean_flags() {
        let mut record = ParsedRecord::new("AB-1234", "AB1234.PDF");
        record.parsed = true;
        record.set("date", FieldValue::Date(NaiveDate::from_ymd_opt(2019, 3, 4).unwrap()));
        record.set("vehicles", FieldValue::Integer(2));

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"case_id":"AB-1234","filename":"AB1234.PDF","parsed":true,"date":"2019-03-04","vehicles":2}"#
        );
    }

    #[test]
    fn test_unreadable_record() {
        let record = ParsedRecord::unreadable("AB-1", "AB1.PDF");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["unreadable"], serde_json::json!(true));
        assert_eq!(value["parsed"], serde_json::json!(false));
        assert!(record.fields.is_empty());
    }

    #[test]
    fn test_round_trip_through_json() {
        let mut record = ParsedRecord::new("AB-1234", "AB1234.PDF");
        record.parsed = true;
        record.set("vehicles", FieldValue::Integer(2));
        record.set("hit_and_run", FieldValue::Boolean(false));
        record.set("initials", FieldValue::Text("JQP".to_string()));
        record.push_error(UnparsedEntry {
            kind: FieldErrorKind::NoCandidates,
            page: 1,
            page_type: "report".to_string(),
            field: None,
            candidates: Vec::new(),
            text: "stray".to_string(),
            region: Region::new(1.0, 2.0, 3.0, 4.0),
            reason: None,
        });

        let json = serde_json::to_string(&record).unwrap();
        let back: ParsedRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_text_that_looks_like_a_date_reads_back_as_text() {
        let mut record = ParsedRecord::new("AB-1234", "AB1234.PDF");
        record.set("badge", FieldValue::Text("2019-03-04".to_string()));
        record.set("shift", FieldValue::Text("09:30:00".to_string()));
        record.set("date", FieldValue::Date(NaiveDate::from_ymd_opt(2019, 3, 4).unwrap()));

        let json = serde_json::to_string(&record).unwrap();
        let back: ParsedRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(back.get("badge"), Some(&FieldValue::Text("2019-03-04".to_string())));
        assert_eq!(back.get("shift"), Some(&FieldValue::Text("09:30:00".to_string())));
        assert_eq!(back.get("date"), Some(&FieldValue::Text("2019-03-04".to_string())));
        assert_eq!(serde_json::to_string(&back).unwrap(), json);
    }

    #[test]
    fn test_display_values() {
        assert_eq!(
            FieldValue::Time(NaiveTime::from_hms_opt(7, 5, 0).unwrap()).to_string(),
            "07:05"
        );
        assert_eq!(FieldValue::Integer(-3).to_string(), "-3");
    }
}
