//! Interactive teaching capability.
//!
//! A [`SchemaEditor`] is only handed to the parser in interactive mode. Batch
//! workers never receive one, so the shared layout is never mutated
//! concurrently.

use crate::convert::Converter;
use crate::geometry::Region;
use crate::provider::TextFragment;

/// A fragment the layout could not place.
#[derive(Debug, Clone, Copy)]
pub struct Unresolved<'a> {
    pub case_id: &'a str,
    pub page: u32,
    pub page_type: &'a str,
    pub fragment: &'a TextFragment,
}

/// A named field region offered to the editor.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub name: String,
    pub region: Region,
}

/// What to do with an unresolved fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum EditDecision {
    /// Assign to an existing candidate and widen its region over the fragment.
    Choose(String),
    /// Declare a new field whose region is the fragment's region.
    NewField {
        name: String,
        converter: Option<Converter>,
    },
    /// Mark the fragment's region as a skip region.
    Skip,
}

/// Resolves ambiguous or unmatched fragments by asking someone.
pub trait SchemaEditor {
    /// Called for fragments inside more than one field region.
    fn choose_candidate(
        &mut self,
        unresolved: &Unresolved<'_>,
        candidates: &[Candidate],
    ) -> std::io::Result<EditDecision>;

    /// Called for fragments outside every field region. `existing` lists the
    /// page type's current field names.
    fn place_fragment(
        &mut self,
        unresolved: &Unresolved<'_>,
        existing: &[String],
    ) -> std::io::Result<EditDecision>;
}

/// Replays a fixed list of decisions. Useful for scripted teaching and tests.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEditor {
    decisions: std::collections::VecDeque<EditDecision>,
    asked: usize,
}

impl ScriptedEditor {
    pub fn new(decisions: impl IntoIterator<Item = EditDecision>) -> Self {
        Self {
            decisions: decisions.into_iter().collect(),
            asked: 0,
        }
    }

    /// Number of prompts answered so far.
    pub fn asked(&self) -> usize {
        self.asked
    }

    fn next(&mut self) -> std::io::Result<EditDecision> {
        self.asked += 1;
        self.decisions.pop_front().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "no scripted decision left")
        })
    }
}

impl SchemaEditor for ScriptedEditor {
    fn choose_candidate(
        &mut self,
        _unresolved: &Unresolved<'_>,
        _candidates: &[Candidate],
    ) -> std::io::Result<EditDecision> {
        self.next()
    }

    fn place_fragment(
        &mut self,
        _unresolved: &Unresolved<'_>,
        _existing: &[String],
    ) -> std::io::Result<EditDecision> {
        self.next()
    }
}
