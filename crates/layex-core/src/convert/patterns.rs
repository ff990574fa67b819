//! Regex patterns shared by the converters.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Dates are month/day/year, with either separator
    pub static ref DATE_SEPARATOR: Regex = Regex::new(r"[-/]").unwrap();

    pub static ref COMPACT_TIME: Regex = Regex::new(r"^(\d{2})(\d{2})$").unwrap();

    // "JOHN Q PUBLIC 2" -> "JOHN Q PUBLIC"; the trailing number is the occupant index
    pub static ref OCCUPANT_SUFFIX: Regex = Regex::new(
        r"^\s*(?P<name>[^\d]*?)\s+\d"
    ).unwrap();
}
