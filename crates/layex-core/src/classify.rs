//! Page classification.

use tracing::warn;

use crate::layout::PageType;
use crate::provider::TextFragment;

/// Outcome of classifying one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Classification<'a> {
    /// The page matched a declared page type. `index` is its position in the
    /// schema's declaration order.
    Known { index: usize, page_type: &'a PageType },
    Unknown,
}

impl<'a> Classification<'a> {
    pub fn page_type(&self) -> Option<&'a PageType> {
        match self {
            Classification::Known { page_type, .. } => Some(page_type),
            Classification::Unknown => None,
        }
    }
}

/// Test each page type's predicate in declaration order. The first match wins.
pub fn classify<'a>(page_types: &'a [PageType], fragments: &[TextFragment]) -> Classification<'a> {
    let mut matching = page_types
        .iter()
        .enumerate()
        .filter(|(_, page_type)| page_type.matches(fragments));

    let Some((index, page_type)) = matching.next() else {
        return Classification::Unknown;
    };

    // Load-time validation only rejects provable overlaps
    for (_, other) in matching {
        warn!(
            "Page matches both {} and {}; using {}",
            page_type.name, other.name, page_type.name
        );
    }

    Classification::Known { index, page_type }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Region;
    use crate::layout::{MatchRule, PagePredicate};

    fn page_type(name: &str, index: usize, rule: MatchRule) -> PageType {
        PageType::new(name, PagePredicate::new(index, rule))
    }

    fn fragments(texts: &[&str]) -> Vec<TextFragment> {
        texts
            .iter()
            .map(|t| TextFragment::new(*t, Region::new(0.0, 1.0, 0.0, 1.0)))
            .collect()
    }

    #[test]
    fn test_first_declared_match_wins() {
        let types = vec![
            page_type("report", 0, MatchRule::Contains("Report".to_string())),
            page_type("narrative", 1, MatchRule::StartsWith("NARRATIVE".to_string())),
        ];

        let page = fragments(&["Accident Report", "NARRATIVE"]);
        let result = classify(&types, &page);
        assert!(matches!(result, Classification::Known { index: 0, .. }));
        assert_eq!(result.page_type().unwrap().name, "report");

        let page = fragments(&["Page 2", "NARRATIVE continued"]);
        assert_eq!(classify(&types, &page).page_type().unwrap().name, "narrative");
    }

    #[test]
    fn test_unknown_page() {
        let types = vec![page_type("report", 0, MatchRule::Contains("Report".to_string()))];
        assert_eq!(classify(&types, &fragments(&["Witness Statement"])), Classification::Unknown);
        assert_eq!(classify(&types, &[]), Classification::Unknown);
    }

    #[test]
    fn test_predicate_index_out_of_range() {
        let types = vec![page_type("diagram", 5, MatchRule::Contains("DIAGRAM".to_string()))];
        assert_eq!(classify(&types, &fragments(&["DIAGRAM"])), Classification::Unknown);
    }
}
