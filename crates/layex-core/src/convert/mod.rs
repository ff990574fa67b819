//! Typed conversion of raw fragment text.
//!
//! Every converter is a variant of the closed [`Converter`] enum. Layout files
//! name converters by identifier, and [`Converter::from_spec`] is the only
//! place those identifiers are interpreted.

pub mod dates;
mod patterns;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConversionError, SchemaError};
use crate::models::record::FieldValue;

pub use dates::{normalize_year, parse_date, parse_time};
use patterns::OCCUPANT_SUFFIX;

/// Converter declaration as written in a layout file.
///
/// Either a bare identifier (`Date`) or a mapping with a `class` key and its
/// parameters (`{ class: IntegerMapping, values: { 1: Head } }`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConverterSpec {
    Named(String),
    Parameterized {
        class: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        values: BTreeMap<i64, Option<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mark: Option<String>,
    },
}

impl ConverterSpec {
    pub fn class(&self) -> &str {
        match self {
            ConverterSpec::Named(name) => name,
            ConverterSpec::Parameterized { class, .. } => class,
        }
    }
}

const DEFAULT_CHECKBOX_MARK: &str = "x";

/// A field converter.
#[derive(Debug, Clone, PartialEq)]
pub enum Converter {
    /// Signed integer.
    Integer,
    /// Month/day/year date with year repair.
    Date,
    /// `HH:MM` or `HHMM` time.
    Time,
    /// Checkbox: true when the text equals the mark, case-insensitively.
    Boolean { mark: String },
    /// Integer key looked up in a fixed table; a `None` entry means "no value".
    IntegerMapping(BTreeMap<i64, Option<String>>),
    /// Free text, trimmed.
    Text,
    /// Consumes the fragment but never produces a value.
    Pii,
    /// Reduces a name to its initials after dropping an occupant index suffix.
    Initials,
}

impl Converter {
    /// Build a converter from its layout declaration.
    pub fn from_spec(field: &str, spec: &ConverterSpec) -> Result<Self, SchemaError> {
        let unknown = || SchemaError::UnknownConverter {
            field: field.to_string(),
            name: spec.class().to_string(),
        };

        let converter = match spec {
            ConverterSpec::Named(name) => match name.as_str() {
                "Integer" => Converter::Integer,
                "Date" => Converter::Date,
                "Time" => Converter::Time,
                "Boolean" | "BooleanChoice" | "MultipleChoice" => Converter::Boolean {
                    mark: DEFAULT_CHECKBOX_MARK.to_string(),
                },
                "Text" => Converter::Text,
                "PII" | "Discard" => Converter::Pii,
                "Initials" => Converter::Initials,
                _ => return Err(unknown()),
            },
            ConverterSpec::Parameterized { class, values, mark } => match class.as_str() {
                "IntegerMapping" => Converter::IntegerMapping(values.clone()),
                "Boolean" | "BooleanChoice" | "MultipleChoice" => Converter::Boolean {
                    mark: mark.clone().unwrap_or_else(|| DEFAULT_CHECKBOX_MARK.to_string()),
                },
                other => Converter::from_spec(field, &ConverterSpec::Named(other.to_string()))?,
            },
        };
        Ok(converter)
    }

    /// Declaration that reproduces this converter when loaded again.
    pub fn to_spec(&self) -> ConverterSpec {
        match self {
            Converter::IntegerMapping(values) => ConverterSpec::Parameterized {
                class: self.name().to_string(),
                values: values.clone(),
                mark: None,
            },
            Converter::Boolean { mark } if mark != DEFAULT_CHECKBOX_MARK => {
                ConverterSpec::Parameterized {
                    class: self.name().to_string(),
                    values: BTreeMap::new(),
                    mark: Some(mark.clone()),
                }
            }
            _ => ConverterSpec::Named(self.name().to_string()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Converter::Integer => "Integer",
            Converter::Date => "Date",
            Converter::Time => "Time",
            Converter::Boolean { .. } => "Boolean",
            Converter::IntegerMapping(_) => "IntegerMapping",
            Converter::Text => "Text",
            Converter::Pii => "PII",
            Converter::Initials => "Initials",
        }
    }

    /// Convert raw text. `Ok(None)` means the fragment was consumed without a value.
    pub fn convert(&self, raw: &str) -> Result<Option<FieldValue>, ConversionError> {
        let text = raw.trim();
        let value = match self {
            Converter::Integer => FieldValue::Integer(parse_integer(self.name(), text)?),
            Converter::Date => FieldValue::Date(parse_date(text)?),
            Converter::Time => FieldValue::Time(parse_time(text)?),
            Converter::Boolean { mark } => FieldValue::Boolean(text.eq_ignore_ascii_case(mark)),
            Converter::IntegerMapping(values) => {
                let key = parse_integer(self.name(), text)?;
                match values.get(&key) {
                    Some(Some(label)) => FieldValue::Text(label.clone()),
                    Some(None) => return Ok(None),
                    None => {
                        return Err(ConversionError::new(
                            self.name(),
                            text,
                            format!("no mapping for {key}"),
                        ))
                    }
                }
            }
            Converter::Text => FieldValue::Text(text.to_string()),
            Converter::Pii => return Ok(None),
            Converter::Initials => FieldValue::Text(initials(text).ok_or_else(|| {
                ConversionError::new(self.name(), text, "no name to abbreviate")
            })?),
        };
        Ok(Some(value))
    }
}

fn parse_integer(converter: &'static str, text: &str) -> Result<i64, ConversionError> {
    text.parse()
        .map_err(|e| ConversionError::new(converter, text, e))
}

/// First letter of every word, after dropping a trailing occupant index.
pub fn initials(name: &str) -> Option<String> {
    let name = OCCUPANT_SUFFIX
        .captures(name)
        .and_then(|caps| caps.name("name"))
        .map_or(name, |m| m.as_str());
    let initials: String = name
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .collect();
    (!initials.is_empty()).then_some(initials)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};
    use pretty_assertions::assert_eq;

    use super::*;

    fn named(name: &str) -> Converter {
        Converter::from_spec("field", &ConverterSpec::Named(name.to_string())).unwrap()
    }

    #[test]
    fn test_factory_names() {
        assert_eq!(named("Integer"), Converter::Integer);
        assert_eq!(named("PII"), Converter::Pii);
        assert_eq!(named("Discard"), Converter::Pii);
        assert_eq!(
            named("MultipleChoice"),
            Converter::Boolean { mark: "x".to_string() }
        );
    }

    #[test]
    fn test_factory_rejects_unknown() {
        let err = Converter::from_spec("speed", &ConverterSpec::Named("Float".to_string()))
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownConverter { ref name, .. } if name == "Float"));
    }

    #[test]
    fn test_integer() {
        assert_eq!(named("Integer").convert(" 42\n").unwrap(), Some(FieldValue::Integer(42)));
        assert!(named("Integer").convert("4two").is_err());
    }

    #[test]
    fn test_date_and_time() {
        assert_eq!(
            named("Date").convert("03-04-2019").unwrap(),
            Some(FieldValue::Date(NaiveDate::from_ymd_opt(2019, 3, 4).unwrap()))
        );
        assert_eq!(
            named("Time").convert("1730").unwrap(),
            Some(FieldValue::Time(NaiveTime::from_hms_opt(17, 30, 0).unwrap()))
        );
    }

    #[test]
    fn test_boolean_mark_is_case_insensitive() {
        let checkbox = named("Boolean");
        assert_eq!(checkbox.convert("X").unwrap(), Some(FieldValue::Boolean(true)));
        assert_eq!(checkbox.convert("x").unwrap(), Some(FieldValue::Boolean(true)));
        assert_eq!(checkbox.convert("-").unwrap(), Some(FieldValue::Boolean(false)));
    }

    #[test]
    fn test_integer_mapping() {
        let spec: ConverterSpec =
            serde_yaml::from_str("{ class: IntegerMapping, values: { 1: Head, 13: null } }")
                .unwrap();
        let regions = Converter::from_spec("injury_region", &spec).unwrap();

        assert_eq!(regions.convert("01").unwrap(), Some(FieldValue::Text("Head".to_string())));
        assert_eq!(regions.convert("13").unwrap(), None);
        assert!(regions.convert("7").is_err());
        assert!(regions.convert("head").is_err());
    }

    #[test]
    fn test_pii_consumes_without_value() {
        assert_eq!(named("PII").convert("John Smith").unwrap(), None);
    }

    #[test]
    fn test_initials() {
        let conv = named("Initials");
        assert_eq!(
            conv.convert("JOHN Q PUBLIC 2").unwrap(),
            Some(FieldValue::Text("JQP".to_string()))
        );
        assert_eq!(conv.convert("  mary ann").unwrap(), Some(FieldValue::Text("ma".to_string())));
        assert!(conv.convert("  ").is_err());
    }

    #[test]
    fn test_spec_round_trips_through_factory() {
        for spec in [
            ConverterSpec::Named("Date".to_string()),
            ConverterSpec::Parameterized {
                class: "IntegerMapping".to_string(),
                values: BTreeMap::from([(1, Some("Head".to_string())), (13, None)]),
                mark: None,
            },
            ConverterSpec::Parameterized {
                class: "Boolean".to_string(),
                values: BTreeMap::new(),
                mark: Some("Y".to_string()),
            },
        ] {
            let converter = Converter::from_spec("f", &spec).unwrap();
            assert_eq!(converter.to_spec(), spec);
        }
    }
}
