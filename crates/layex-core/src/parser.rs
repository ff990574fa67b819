//! Document parser: one document in, one record out.
//!
//! For each page: classify, skip unknown and repeated page types, resolve
//! every data fragment to a field, convert it and merge it into the record.
//! Field- and page-level problems never abort the document.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, trace, warn};

use crate::classify::{classify, Classification};
use crate::editor::{Candidate, EditDecision, SchemaEditor, Unresolved};
use crate::error::SchemaError;
use crate::layout::{FieldDefinition, LayoutSchema};
use crate::models::config::LayexConfig;
use crate::models::record::{FieldErrorKind, FieldValue, ParsedRecord, UnparsedEntry};
use crate::naming::{display_filename, filename_to_case_id};
use crate::provider::{AutoLayoutProvider, LayoutProvider, Page, TextFragment};
use crate::resolve::{FieldResolver, Resolution};

/// Parses documents against a layout.
///
/// Cloning is cheap: the layout and provider are shared.
#[derive(Clone)]
pub struct DocumentParser {
    schema: Arc<LayoutSchema>,
    provider: Arc<dyn LayoutProvider>,
    resolver: FieldResolver,
}

impl DocumentParser {
    pub fn new(schema: impl Into<Arc<LayoutSchema>>, provider: Arc<dyn LayoutProvider>) -> Self {
        Self {
            schema: schema.into(),
            provider,
            resolver: FieldResolver::default(),
        }
    }

    /// Parser for the configured layout, reading PDFs and fragment dumps.
    pub fn from_config(config: &LayexConfig) -> crate::Result<Self> {
        let schema = LayoutSchema::load(&config.paths.layout)?;
        Ok(Self::new(schema, Arc::new(AutoLayoutProvider::new())).with_fuzz(config.parse.fuzz))
    }

    /// Set the containment tolerance used for field and skip regions.
    pub fn with_fuzz(mut self, fuzz: f64) -> Self {
        self.resolver = FieldResolver::new(fuzz);
        self
    }

    pub fn schema(&self) -> &LayoutSchema {
        &self.schema
    }

    pub fn resolver(&self) -> &FieldResolver {
        &self.resolver
    }

    /// Parse in batch mode. Unresolved fragments are recorded on the record.
    pub fn parse(&self, path: &Path) -> ParsedRecord {
        let case_id = filename_to_case_id(path);
        let filename = display_filename(path);
        info!("Parsing {} from {}", case_id, path.display());

        let pages = match self.provider.load(path) {
            Ok(pages) => pages,
            Err(e) => {
                error!("{}: {}", case_id, e);
                return ParsedRecord::unreadable(case_id, filename);
            }
        };

        Session::new(self.resolver, SchemaAccess::Shared(&self.schema), case_id, filename)
            .run(&pages)
    }

    /// Parse with a human resolving unplaced fragments.
    ///
    /// Edits land in this parser's own copy of the layout; clones made
    /// earlier keep the layout they were created with.
    pub fn parse_interactive(&mut self, path: &Path, editor: &mut dyn SchemaEditor) -> ParsedRecord {
        let case_id = filename_to_case_id(path);
        let filename = display_filename(path);
        info!("Parsing {} interactively from {}", case_id, path.display());

        let pages = match self.provider.load(path) {
            Ok(pages) => pages,
            Err(e) => {
                error!("{}: {}", case_id, e);
                return ParsedRecord::unreadable(case_id, filename);
            }
        };

        let schema = Arc::make_mut(&mut self.schema);
        Session::new(
            self.resolver,
            SchemaAccess::Editable { schema, editor },
            case_id,
            filename,
        )
        .run(&pages)
    }
}

enum SchemaAccess<'s> {
    Shared(&'s LayoutSchema),
    Editable {
        schema: &'s mut LayoutSchema,
        editor: &'s mut dyn SchemaEditor,
    },
}

impl SchemaAccess<'_> {
    fn get(&self) -> &LayoutSchema {
        match self {
            SchemaAccess::Shared(schema) => schema,
            SchemaAccess::Editable { schema, .. } => schema,
        }
    }
}

/// A fragment no single field claimed.
enum Unplaced {
    Nowhere,
    Ambiguous(Vec<Candidate>),
}

/// State for one document.
struct Session<'s> {
    resolver: FieldResolver,
    schema: SchemaAccess<'s>,
    case_id: String,
    record: ParsedRecord,
}

impl<'s> Session<'s> {
    fn new(
        resolver: FieldResolver,
        schema: SchemaAccess<'s>,
        case_id: String,
        filename: String,
    ) -> Self {
        Self {
            resolver,
            schema,
            record: ParsedRecord::new(case_id.clone(), filename),
            case_id,
        }
    }

    fn run(mut self, pages: &[Page]) -> ParsedRecord {
        let short_circuits = self.schema.get().short_circuit_fields();
        let mut seen: Vec<String> = Vec::new();

        for page in pages {
            let classified = match classify(self.schema.get().page_types(), &page.fragments) {
                Classification::Known { index, page_type } => Some((index, page_type.name.clone())),
                Classification::Unknown => None,
            };

            match classified {
                None => warn!(
                    "{}: page {} matches no page type, skipping",
                    self.case_id, page.number
                ),
                Some((_, name)) if seen.contains(&name) => warn!(
                    "{}: page {} repeats page type {}, skipping",
                    self.case_id, page.number, name
                ),
                Some((index, name)) => {
                    debug!("{}: page {} is {}", self.case_id, page.number, name);
                    self.parse_page(index, &name, page);
                    seen.push(name);
                }
            }

            let missing = short_circuits
                .iter()
                .find(|(field, limit)| page.number >= *limit && !self.record.has(field));
            if let Some((field, _)) = missing {
                warn!(
                    "{}: no {} found by page {}, abandoning remaining pages",
                    self.case_id, field, page.number
                );
                if page.number <= 1 {
                    self.record.unparseable = true;
                }
                break;
            }
        }

        if seen.is_empty() {
            warn!("{}: no page matched any page type", self.case_id);
            self.record.unparseable = true;
        }
        self.record.parsed = true;
        self.record
    }

    fn parse_page(&mut self, type_index: usize, page_type: &str, page: &Page) {
        let fragments: Vec<&TextFragment> = self.schema.get().page_types()[type_index]
            .data_fragments(&page.fragments)
            .collect();

        for fragment in fragments {
            let site = Unresolved {
                case_id: &self.case_id,
                page: page.number,
                page_type,
                fragment,
            };

            let unplaced = {
                let definition = &self.schema.get().page_types()[type_index];
                match self.resolver.resolve(fragment, definition) {
                    Resolution::Discarded(reason) => {
                        trace!("{}: discarded {:?} ({:?})", self.case_id, fragment.text, reason);
                        continue;
                    }
                    Resolution::Resolved(field) => {
                        store_value(&mut self.record, &site, field);
                        continue;
                    }
                    Resolution::NoCandidates => Unplaced::Nowhere,
                    Resolution::MultipleCandidates(fields) => Unplaced::Ambiguous(
                        fields
                            .iter()
                            .map(|f| Candidate {
                                name: f.name.clone(),
                                region: f.region,
                            })
                            .collect(),
                    ),
                }
            };

            match &mut self.schema {
                SchemaAccess::Shared(_) => record_unplaced(&mut self.record, &site, unplaced),
                SchemaAccess::Editable { schema, editor } => {
                    let decision = match &unplaced {
                        Unplaced::Ambiguous(candidates) => editor.choose_candidate(&site, candidates),
                        Unplaced::Nowhere => {
                            let existing = schema.page_types()[type_index].field_names();
                            editor.place_fragment(&site, &existing)
                        }
                    };
                    let applied = match decision {
                        Ok(decision) => {
                            apply_decision(schema, &mut self.record, &site, &unplaced, decision)
                                .map_err(|e| e.to_string())
                        }
                        Err(e) => Err(e.to_string()),
                    };
                    if let Err(reason) = applied {
                        warn!("{}: could not apply edit: {}", self.case_id, reason);
                        record_unplaced(&mut self.record, &site, unplaced);
                    }
                }
            }
        }
    }
}

/// Convert a resolved fragment and merge it into the record.
fn store_value(record: &mut ParsedRecord, site: &Unresolved<'_>, field: &FieldDefinition) {
    let fragment = site.fragment;
    let converted = match &field.converter {
        Some(converter) => converter.convert(&fragment.text),
        None => Ok(Some(FieldValue::Text(fragment.text.trim().to_string()))),
    };

    match converted {
        Ok(Some(value)) => {
            trace!("{}: {} = {}", site.case_id, field.name, value);
            record.set(field.name.clone(), value);
        }
        Ok(None) => trace!("{}: {} consumed without value", site.case_id, field.name),
        Err(e) => {
            error!(
                "{}: page {} field {}: {}",
                site.case_id, site.page, field.name, e
            );
            record.push_error(UnparsedEntry {
                kind: FieldErrorKind::ConversionFailed,
                page: site.page,
                page_type: site.page_type.to_string(),
                field: Some(field.name.clone()),
                candidates: Vec::new(),
                text: fragment.text.clone(),
                region: fragment.region,
                reason: Some(e.reason),
            });
        }
    }
}

fn record_unplaced(record: &mut ParsedRecord, site: &Unresolved<'_>, unplaced: Unplaced) {
    let fragment = site.fragment;
    let (kind, candidates) = match unplaced {
        Unplaced::Nowhere => (FieldErrorKind::NoCandidates, Vec::new()),
        Unplaced::Ambiguous(candidates) => (
            FieldErrorKind::MultipleCandidates,
            candidates.into_iter().map(|c| c.name).collect(),
        ),
    };

    error!(
        "{}: page {} ({}): {} for {:?} at {}{}",
        site.case_id,
        site.page,
        site.page_type,
        kind,
        fragment.text,
        fragment.region,
        if candidates.is_empty() {
            String::new()
        } else {
            format!(" [{}]", candidates.join(", "))
        }
    );

    record.push_error(UnparsedEntry {
        kind,
        page: site.page,
        page_type: site.page_type.to_string(),
        field: None,
        candidates,
        text: fragment.text.clone(),
        region: fragment.region,
        reason: None,
    });
}

fn apply_decision(
    schema: &mut LayoutSchema,
    record: &mut ParsedRecord,
    site: &Unresolved<'_>,
    unplaced: &Unplaced,
    decision: EditDecision,
) -> Result<(), SchemaError> {
    let region = site.fragment.region;
    let field_name = match decision {
        EditDecision::Choose(name) => {
            if let Unplaced::Ambiguous(candidates) = unplaced {
                if !candidates.iter().any(|c| c.name == name) {
                    return Err(SchemaError::NotFound {
                        kind: "candidate",
                        name,
                    });
                }
            }
            schema.widen_field(site.page_type, &name, &region)?;
            name
        }
        EditDecision::NewField { name, converter } => {
            let mut field = FieldDefinition::new(name.clone(), region);
            field.converter = converter;
            schema.add_field(site.page_type, field)?;
            name
        }
        EditDecision::Skip => {
            schema.add_skip_region(site.page_type, region)?;
            return Ok(());
        }
    };

    let field = schema
        .page_type(site.page_type)
        .and_then(|page_type| page_type.field(&field_name))
        .ok_or(SchemaError::NotFound {
            kind: "field",
            name: field_name.clone(),
        })?;
    store_value(record, site, field);
    Ok(())
}
