//! On-disk shape of a layout file.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::convert::ConverterSpec;
use crate::geometry::Region;

/// Top level of a layout file. Page types are classified in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutFile {
    #[serde(default)]
    pub page_types: Vec<PageTypeConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageTypeConfig {
    pub name: String,

    #[serde(rename = "match")]
    pub predicate: PagePredicate,

    /// Fragments before this index are boilerplate.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub start_index: usize,

    /// Fragments whose bottom edge lies above this value are ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_y: Option<f64>,

    #[serde(default)]
    pub fields: BTreeMap<String, FieldConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip: Vec<Region>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub region: Region,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub converter: Option<ConverterSpec>,

    /// Abandon the document if this field has no value once this page is passed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_circuit: Option<u32>,
}

/// Rule deciding whether a page is of a given type.
///
/// Tests the text of the fragment at `index` (default 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagePredicate {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub index: usize,

    #[serde(flatten)]
    pub rule: MatchRule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    Contains(String),
    StartsWith(String),
}

impl MatchRule {
    pub fn accepts(&self, text: &str) -> bool {
        match self {
            MatchRule::Contains(marker) => text.contains(marker.as_str()),
            MatchRule::StartsWith(marker) => text.starts_with(marker.as_str()),
        }
    }

    pub fn marker(&self) -> &str {
        match self {
            MatchRule::Contains(marker) | MatchRule::StartsWith(marker) => marker,
        }
    }
}

impl PagePredicate {
    pub fn new(index: usize, rule: MatchRule) -> Self {
        Self { index, rule }
    }

    pub fn matches(&self, texts: &[&str]) -> bool {
        texts.get(self.index).is_some_and(|text| self.rule.accepts(text))
    }

    /// Whether a single fragment is known to satisfy both predicates.
    ///
    /// Only provable overlaps are detected: same fragment index, and one
    /// predicate's marker text satisfies the other predicate.
    pub fn provably_overlaps(&self, other: &PagePredicate) -> bool {
        self.index == other.index
            && (self.rule.accepts(other.rule.marker()) || other.rule.accepts(self.rule.marker()))
    }
}

fn is_zero(v: &usize) -> bool {
    *v == 0
}
