//! Fragment to field resolution.

use crate::geometry::{Region, DEFAULT_FUZZ};
use crate::layout::{FieldDefinition, PageType};
use crate::provider::TextFragment;

/// Why a fragment was dropped without an outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiscardReason {
    /// Text is empty or whitespace.
    Blank,
    /// Fragment lies inside this skip region.
    SkipRegion(Region),
}

/// Exactly one of these is produced per fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<'a> {
    Discarded(DiscardReason),
    Resolved(&'a FieldDefinition),
    NoCandidates,
    /// Candidates in field name order.
    MultipleCandidates(Vec<&'a FieldDefinition>),
}

/// Resolves fragments against a page type's field and skip regions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldResolver {
    fuzz: f64,
}

impl Default for FieldResolver {
    fn default() -> Self {
        Self { fuzz: DEFAULT_FUZZ }
    }
}

impl FieldResolver {
    /// `fuzz` must match the value the layout was authored with.
    pub fn new(fuzz: f64) -> Self {
        Self { fuzz }
    }

    pub fn fuzz(&self) -> f64 {
        self.fuzz
    }

    pub fn resolve<'a>(&self, fragment: &TextFragment, page_type: &'a PageType) -> Resolution<'a> {
        if fragment.is_blank() {
            return Resolution::Discarded(DiscardReason::Blank);
        }

        if let Some(skip) = page_type
            .skip
            .iter()
            .find(|skip| skip.contains(&fragment.region, self.fuzz))
        {
            return Resolution::Discarded(DiscardReason::SkipRegion(*skip));
        }

        let mut candidates: Vec<&FieldDefinition> = page_type
            .fields
            .iter()
            .filter(|field| field.region.contains(&fragment.region, self.fuzz))
            .collect();

        match candidates.len() {
            0 => Resolution::NoCandidates,
            1 => Resolution::Resolved(candidates.remove(0)),
            _ => Resolution::MultipleCandidates(candidates),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::Converter;
    use crate::layout::LayoutSchema;

    fn page_type(yaml_fields: &str) -> PageType {
        let yaml = format!(
            "page_types: [{{ name: p, match: {{ contains: x }}, {yaml_fields} }}]"
        );
        let schema = LayoutSchema::from_yaml_str(&yaml).unwrap();
        schema.page_types()[0].clone()
    }

    #[test]
    fn test_clean_single_field() {
        let page = page_type("fields: { date: { region: [0, 10, 0, 5], type: Date } }");
        let fragment = TextFragment::new("03-04-2019", Region::new(2.0, 8.0, 1.0, 4.0));

        match FieldResolver::default().resolve(&fragment, &page) {
            Resolution::Resolved(field) => {
                assert_eq!(field.name, "date");
                assert_eq!(field.converter, Some(Converter::Date));
            }
            other => panic!("expected resolved, got {other:?}"),
        }
    }

    #[test]
    fn test_ambiguous_overlap() {
        let page = page_type(
            "fields: { b: { region: [5, 15, 5, 15] }, a: { region: [0, 10, 0, 10] } }",
        );
        let fragment = TextFragment::new("7", Region::new(6.0, 9.0, 6.0, 9.0));

        match FieldResolver::default().resolve(&fragment, &page) {
            Resolution::MultipleCandidates(fields) => {
                let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
                assert_eq!(names, vec!["a", "b"]);
            }
            other => panic!("expected multiple candidates, got {other:?}"),
        }
    }

    #[test]
    fn test_no_candidates() {
        let page = page_type("fields: { a: { region: [0, 10, 0, 10] } }");
        let fragment = TextFragment::new("far away", Region::new(50.0, 60.0, 50.0, 60.0));
        assert_eq!(
            FieldResolver::default().resolve(&fragment, &page),
            Resolution::NoCandidates
        );
    }

    #[test]
    fn test_blank_and_skip_are_discarded() {
        let page = page_type(
            "fields: { a: { region: [0, 100, 0, 100] } }, skip: [[0, 20, 80, 100]]",
        );
        let resolver = FieldResolver::default();

        let blank = TextFragment::new("  ", Region::new(1.0, 2.0, 1.0, 2.0));
        assert_eq!(
            resolver.resolve(&blank, &page),
            Resolution::Discarded(DiscardReason::Blank)
        );

        let header = TextFragment::new("Page 1 of 3", Region::new(2.0, 18.0, 85.0, 95.0));
        assert_eq!(
            resolver.resolve(&header, &page),
            Resolution::Discarded(DiscardReason::SkipRegion(Region::new(0.0, 20.0, 80.0, 100.0)))
        );
    }

    #[test]
    fn test_fuzz_admits_boundary_overshoot() {
        let page = page_type("fields: { a: { region: [0, 10, 0, 10] } }");
        let fragment = TextFragment::new("edge", Region::new(-0.05, 10.05, 0.0, 10.0));

        assert!(matches!(
            FieldResolver::new(0.1).resolve(&fragment, &page),
            Resolution::Resolved(_)
        ));
        assert_eq!(
            FieldResolver::new(0.0).resolve(&fragment, &page),
            Resolution::NoCandidates
        );
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let page = page_type(
            "fields: { a: { region: [0, 10, 0, 10] }, b: { region: [5, 15, 5, 15] } }",
        );
        let fragment = TextFragment::new("7", Region::new(6.0, 9.0, 6.0, 9.0));
        let resolver = FieldResolver::default();
        let first = resolver.resolve(&fragment, &page);
        for _ in 0..10 {
            assert_eq!(resolver.resolve(&fragment, &page), first);
        }
    }
}
