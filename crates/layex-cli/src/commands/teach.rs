//! Console prompts for interactive layout teaching.

use std::io;

use console::{style, Term};
use tracing::debug;

use layex_core::{Candidate, Converter, ConverterSpec, EditDecision, SchemaEditor, Unresolved};

/// Asks on the terminal what to do with fragments the layout cannot place.
pub struct ConsoleEditor {
    term: Term,
}

impl ConsoleEditor {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }

    fn describe(&self, unresolved: &Unresolved<'_>) -> io::Result<()> {
        self.term.write_line("")?;
        self.term.write_line(&format!(
            "{} {} page {} ({})",
            style("?").yellow(),
            unresolved.case_id,
            unresolved.page,
            unresolved.page_type
        ))?;
        self.term.write_line(&format!(
            "  text:   {}",
            style(&unresolved.fragment.text).bold()
        ))?;
        self.term
            .write_line(&format!("  region: {}", unresolved.fragment.region))
    }

    fn prompt(&self, question: &str) -> io::Result<String> {
        self.term.write_str(&format!("{} ", style(question).cyan()))?;
        Ok(self.term.read_line()?.trim().to_string())
    }

    /// Optional converter for a new field; empty input means plain text.
    fn prompt_converter(&self, field: &str) -> io::Result<Option<Converter>> {
        loop {
            let answer = self.prompt("Converter (Integer, Date, Time, Boolean, Text, PII, Initials; empty for text):")?;
            if answer.is_empty() {
                return Ok(None);
            }
            match Converter::from_spec(field, &ConverterSpec::Named(answer)) {
                Ok(converter) => return Ok(Some(converter)),
                Err(e) => self.term.write_line(&format!("{} {}", style("✗").red(), e))?,
            }
        }
    }
}

impl SchemaEditor for ConsoleEditor {
    fn choose_candidate(
        &mut self,
        unresolved: &Unresolved<'_>,
        candidates: &[Candidate],
    ) -> io::Result<EditDecision> {
        self.describe(unresolved)?;
        self.term.write_line("  inside more than one field:")?;
        for candidate in candidates {
            self.term.write_line(&format!(
                "    {:<24} {}",
                candidate.name, candidate.region
            ))?;
        }

        loop {
            let answer = self.prompt("Which field?")?;
            if candidates.iter().any(|c| c.name == answer) {
                debug!("Assigning fragment to {}", answer);
                return Ok(EditDecision::Choose(answer));
            }
            self.term
                .write_line(&format!("{} not a candidate: {:?}", style("✗").red(), answer))?;
        }
    }

    fn place_fragment(
        &mut self,
        unresolved: &Unresolved<'_>,
        existing: &[String],
    ) -> io::Result<EditDecision> {
        self.describe(unresolved)?;
        self.term.write_line("  outside every field")?;

        loop {
            let answer = self.prompt("New field name, or S to skip this region:")?;
            if answer.eq_ignore_ascii_case("s") {
                return Ok(EditDecision::Skip);
            }
            if answer.is_empty() {
                continue;
            }
            if existing.contains(&answer) {
                self.term.write_line(&format!(
                    "{} field {} already exists on {}",
                    style("✗").red(),
                    answer,
                    unresolved.page_type
                ))?;
                continue;
            }
            let converter = self.prompt_converter(&answer)?;
            return Ok(EditDecision::NewField {
                name: answer,
                converter,
            });
        }
    }
}

/// Ask a yes/no question on stderr. Anything but `y`/`yes` is no.
pub fn confirm(question: &str) -> io::Result<bool> {
    let term = Term::stderr();
    term.write_str(&format!("{} {} [y/N] ", style("?").yellow(), question))?;
    let answer = term.read_line()?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
