//! Layout schema: page types, their field regions and skip regions.
//!
//! A [`LayoutSchema`] is loaded from YAML, validated once, and then shared
//! read-only by parser workers. Interactive teaching mutates a private copy
//! through [`LayoutSchema::widen_field`], [`LayoutSchema::add_field`] and
//! [`LayoutSchema::add_skip_region`], after which it can be written back with
//! [`LayoutSchema::save`].

pub mod config;

use std::path::Path;

use tracing::{debug, info};

use crate::convert::Converter;
use crate::error::SchemaError;
use crate::geometry::Region;
use crate::models::record::RESERVED_KEYS;
use crate::provider::TextFragment;

pub use config::{FieldConfig, LayoutFile, MatchRule, PageTypeConfig, PagePredicate};

/// A named field region on a page type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    pub region: Region,
    /// Without a converter the trimmed text is stored as-is.
    pub converter: Option<Converter>,
    /// Last page by which this field must have a value.
    pub short_circuit: Option<u32>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, region: Region) -> Self {
        Self {
            name: name.into(),
            region,
            converter: None,
            short_circuit: None,
        }
    }

    pub fn with_converter(mut self, converter: Converter) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn with_short_circuit(mut self, page: u32) -> Self {
        self.short_circuit = Some(page);
        self
    }
}

/// A recognizable kind of page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageType {
    pub name: String,
    pub predicate: PagePredicate,
    pub start_index: usize,
    pub start_y: Option<f64>,
    /// Sorted by name.
    pub fields: Vec<FieldDefinition>,
    pub skip: Vec<Region>,
}

impl PageType {
    pub fn new(name: impl Into<String>, predicate: PagePredicate) -> Self {
        Self {
            name: name.into(),
            predicate,
            start_index: 0,
            start_y: None,
            fields: Vec::new(),
            skip: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Whether the page's leading fragments satisfy this type's predicate.
    pub fn matches(&self, fragments: &[TextFragment]) -> bool {
        let texts: Vec<&str> = fragments.iter().map(|f| f.text.as_str()).collect();
        self.predicate.matches(&texts)
    }

    /// Fragments that carry data: past `start_index` and below `start_y`.
    pub fn data_fragments<'f>(
        &self,
        fragments: &'f [TextFragment],
    ) -> impl Iterator<Item = &'f TextFragment> + use<'f> {
        let start_y = self.start_y;
        fragments
            .iter()
            .skip(self.start_index)
            .filter(move |f| start_y.is_none_or(|limit| f.region.ymin() <= limit))
    }

    fn insert_field(&mut self, field: FieldDefinition) {
        let at = self.fields.partition_point(|f| f.name < field.name);
        self.fields.insert(at, field);
    }
}

/// A validated layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutSchema {
    page_types: Vec<PageType>,
    modified: bool,
}

impl LayoutSchema {
    /// Load and validate a layout file.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let schema = Self::from_yaml_str(&content)?;
        info!(
            "Loaded layout {} with {} page types",
            path.display(),
            schema.page_types.len()
        );
        Ok(schema)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, SchemaError> {
        let file: LayoutFile = serde_yaml::from_str(content)?;
        Self::from_config(file)
    }

    /// Validate a layout file and build the schema.
    pub fn from_config(file: LayoutFile) -> Result<Self, SchemaError> {
        let mut page_types: Vec<PageType> = Vec::with_capacity(file.page_types.len());

        for config in file.page_types {
            if page_types.iter().any(|p| p.name == config.name) {
                return Err(SchemaError::DuplicatePageType(config.name));
            }
            for earlier in &page_types {
                if earlier.predicate.provably_overlaps(&config.predicate) {
                    return Err(SchemaError::AmbiguousPageTypes {
                        first: earlier.name.clone(),
                        second: config.name.clone(),
                    });
                }
            }
            page_types.push(build_page_type(config)?);
        }

        Ok(Self {
            page_types,
            modified: false,
        })
    }

    /// The declaration this schema was built from, including any edits.
    pub fn to_config(&self) -> LayoutFile {
        let page_types = self
            .page_types
            .iter()
            .map(|page_type| PageTypeConfig {
                name: page_type.name.clone(),
                predicate: page_type.predicate.clone(),
                start_index: page_type.start_index,
                start_y: page_type.start_y,
                fields: page_type
                    .fields
                    .iter()
                    .map(|field| {
                        let config = FieldConfig {
                            region: field.region,
                            converter: field.converter.as_ref().map(Converter::to_spec),
                            short_circuit: field.short_circuit,
                        };
                        (field.name.clone(), config)
                    })
                    .collect(),
                skip: page_type.skip.clone(),
            })
            .collect();
        LayoutFile { page_types }
    }

    pub fn to_yaml(&self) -> Result<String, SchemaError> {
        Ok(serde_yaml::to_string(&self.to_config())?)
    }

    /// Write the layout back to disk.
    pub fn save(&self, path: &Path) -> Result<(), SchemaError> {
        let content = self.to_yaml()?;
        std::fs::write(path, content).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Saved layout to {}", path.display());
        Ok(())
    }

    /// Page types in classification order.
    pub fn page_types(&self) -> &[PageType] {
        &self.page_types
    }

    pub fn page_type(&self, name: &str) -> Option<&PageType> {
        self.page_types.iter().find(|p| p.name == name)
    }

    /// Fields that end parsing early when missing, with their page limit.
    pub fn short_circuit_fields(&self) -> Vec<(String, u32)> {
        self.page_types
            .iter()
            .flat_map(|p| &p.fields)
            .filter_map(|f| f.short_circuit.map(|page| (f.name.clone(), page)))
            .collect()
    }

    /// Whether any edit was applied since loading.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Grow a field's region to also cover `region`. Returns the new region.
    pub fn widen_field(
        &mut self,
        page_type: &str,
        field: &str,
        region: &Region,
    ) -> Result<Region, SchemaError> {
        let page = self.page_type_mut(page_type)?;
        let definition = page
            .fields
            .iter_mut()
            .find(|f| f.name == field)
            .ok_or_else(|| SchemaError::NotFound {
                kind: "field",
                name: field.to_string(),
            })?;
        definition.region = definition.region.merge(region);
        let widened = definition.region;
        debug!("Widened {}.{} to {}", page_type, field, widened);
        self.modified = true;
        Ok(widened)
    }

    /// Declare a new field on a page type.
    pub fn add_field(&mut self, page_type: &str, field: FieldDefinition) -> Result<(), SchemaError> {
        check_field_name(page_type, &field.name)?;
        check_region(&format!("{}.{}", page_type, field.name), &field.region)?;
        let page = self.page_type_mut(page_type)?;
        if page.field(&field.name).is_some() {
            return Err(SchemaError::DuplicateField {
                page_type: page_type.to_string(),
                field: field.name,
            });
        }
        debug!("Added field {}.{} at {}", page_type, field.name, field.region);
        page.insert_field(field);
        self.modified = true;
        Ok(())
    }

    /// Mark a region of a page type as carrying no data.
    pub fn add_skip_region(&mut self, page_type: &str, region: Region) -> Result<(), SchemaError> {
        check_region(&format!("{page_type} skip region"), &region)?;
        let page = self.page_type_mut(page_type)?;
        page.skip.push(region);
        debug!("Added skip region {} to {}", region, page_type);
        self.modified = true;
        Ok(())
    }

    fn page_type_mut(&mut self, name: &str) -> Result<&mut PageType, SchemaError> {
        self.page_types
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| SchemaError::NotFound {
                kind: "page type",
                name: name.to_string(),
            })
    }
}

fn build_page_type(config: PageTypeConfig) -> Result<PageType, SchemaError> {
    if let Some(limit) = config.start_y {
        if !limit.is_finite() {
            return Err(SchemaError::InvalidRegion {
                owner: format!("{} start_y", config.name),
                reason: format!("{limit} is not finite"),
            });
        }
    }

    let mut fields = Vec::with_capacity(config.fields.len());
    for (name, field) in config.fields {
        check_field_name(&config.name, &name)?;
        check_region(&format!("{}.{}", config.name, name), &field.region)?;
        let converter = field
            .converter
            .as_ref()
            .map(|spec| Converter::from_spec(&name, spec))
            .transpose()?;
        fields.push(FieldDefinition {
            name,
            region: field.region,
            converter,
            short_circuit: field.short_circuit,
        });
    }

    for region in &config.skip {
        check_region(&format!("{} skip region", config.name), region)?;
    }

    Ok(PageType {
        name: config.name,
        predicate: config.predicate,
        start_index: config.start_index,
        start_y: config.start_y,
        fields,
        skip: config.skip,
    })
}

fn check_field_name(page_type: &str, field: &str) -> Result<(), SchemaError> {
    if RESERVED_KEYS.contains(&field) {
        return Err(SchemaError::ReservedFieldName {
            page_type: page_type.to_string(),
            field: field.to_string(),
        });
    }
    Ok(())
}

fn check_region(owner: &str, region: &Region) -> Result<(), SchemaError> {
    if !region.is_finite() {
        return Err(SchemaError::InvalidRegion {
            owner: owner.to_string(),
            reason: format!("{region} has non-finite coordinates"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const LAYOUT: &str = r#"
page_types:
  - name: report
    match: { contains: "Accident Report" }
    start_index: 1
    fields:
      date: { region: [10, 60, 700, 712], type: Date, short_circuit: 1 }
      vehicles: { region: [100, 120, 700, 712], type: Integer }
      narrative: { region: [10, 500, 100, 300] }
    skip:
      - [400, 600, 740, 760]
  - name: diagram
    match: { starts_with: "DIAGRAM", index: 2 }
    start_y: 650
"#;

    #[test]
    fn test_load_sorted_fields() {
        let schema = LayoutSchema::from_yaml_str(LAYOUT).unwrap();
        assert_eq!(schema.page_types().len(), 2);

        let report = schema.page_type("report").unwrap();
        assert_eq!(report.field_names(), vec!["date", "narrative", "vehicles"]);
        assert_eq!(report.field("date").unwrap().converter, Some(Converter::Date));
        assert_eq!(report.field("narrative").unwrap().converter, None);
        assert_eq!(report.skip.len(), 1);
        assert_eq!(schema.short_circuit_fields(), vec![("date".to_string(), 1)]);

        let diagram = schema.page_type("diagram").unwrap();
        assert_eq!(diagram.predicate.index, 2);
        assert_eq!(diagram.start_y, Some(650.0));
    }

    #[test]
    fn test_rejects_reserved_field() {
        let err = LayoutSchema::from_yaml_str(
            "page_types: [{ name: p, match: { contains: x }, fields: { parsed: { region: [0, 1, 0, 1] } } }]",
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::ReservedFieldName { ref field, .. } if field == "parsed"));
    }

    #[test]
    fn test_rejects_unknown_converter() {
        let err = LayoutSchema::from_yaml_str(
            "page_types: [{ name: p, match: { contains: x }, fields: { speed: { region: [0, 1, 0, 1], type: Float } } }]",
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownConverter { .. }));
    }

    #[test]
    fn test_rejects_bad_region() {
        let err = LayoutSchema::from_yaml_str(
            "page_types: [{ name: p, match: { contains: x }, fields: { a: { region: [0, 1, 0] } } }]",
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::Malformed(_)));

        let err = LayoutSchema::from_yaml_str(
            "page_types: [{ name: p, match: { contains: x }, skip: [[0, .inf, 0, 1]] }]",
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidRegion { .. }));
    }

    #[test]
    fn test_rejects_duplicate_and_ambiguous_page_types() {
        let err = LayoutSchema::from_yaml_str(
            "page_types: [{ name: p, match: { contains: a } }, { name: p, match: { contains: b } }]",
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicatePageType(ref name) if name == "p"));

        let err = LayoutSchema::from_yaml_str(
            "page_types: [{ name: main, match: { contains: Report } }, { name: supplement, match: { starts_with: Report Supplement } }]",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::AmbiguousPageTypes { ref first, ref second }
                if first == "main" && second == "supplement"
        ));
    }

    #[test]
    fn test_edits_mark_modified_and_survive_save() {
        let mut schema = LayoutSchema::from_yaml_str(LAYOUT).unwrap();
        assert!(!schema.is_modified());

        let widened = schema
            .widen_field("report", "vehicles", &Region::new(95.0, 118.0, 698.0, 710.0))
            .unwrap();
        assert_eq!(widened, Region::new(95.0, 120.0, 698.0, 712.0));

        schema
            .add_field(
                "report",
                FieldDefinition::new("county", Region::new(200.0, 260.0, 650.0, 660.0))
                    .with_converter(Converter::Text),
            )
            .unwrap();
        schema
            .add_skip_region("diagram", Region::new(0.0, 5.0, 0.0, 5.0))
            .unwrap();
        assert!(schema.is_modified());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.yaml");
        schema.save(&path).unwrap();

        let reloaded = LayoutSchema::load(&path).unwrap();
        assert_eq!(reloaded.page_types(), schema.page_types());
        assert_eq!(
            reloaded.page_type("report").unwrap().field_names(),
            vec!["county", "date", "narrative", "vehicles"]
        );
    }

    #[test]
    fn test_edit_errors() {
        let mut schema = LayoutSchema::from_yaml_str(LAYOUT).unwrap();
        let region = Region::new(0.0, 1.0, 0.0, 1.0);

        assert!(matches!(
            schema.add_field("report", FieldDefinition::new("date", region)),
            Err(SchemaError::DuplicateField { .. })
        ));
        assert!(matches!(
            schema.add_field("report", FieldDefinition::new("case_id", region)),
            Err(SchemaError::ReservedFieldName { .. })
        ));
        assert!(matches!(
            schema.widen_field("nope", "date", &region),
            Err(SchemaError::NotFound { kind: "page type", .. })
        ));
        assert!(matches!(
            schema.widen_field("report", "nope", &region),
            Err(SchemaError::NotFound { kind: "field", .. })
        ));
        assert!(!schema.is_modified());
    }

    #[test]
    fn test_data_fragments_respect_start_index_and_start_y() {
        let schema = LayoutSchema::from_yaml_str(LAYOUT).unwrap();
        let fragments = vec![
            TextFragment::new("header", Region::new(0.0, 10.0, 760.0, 770.0)),
            TextFragment::new("high", Region::new(0.0, 10.0, 700.0, 710.0)),
            TextFragment::new("low", Region::new(0.0, 10.0, 100.0, 110.0)),
        ];

        let report = schema.page_type("report").unwrap();
        let texts: Vec<_> = report.data_fragments(&fragments).map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["high", "low"]);

        let diagram = schema.page_type("diagram").unwrap();
        let texts: Vec<_> = diagram.data_fragments(&fragments).map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["low"]);
    }
}
