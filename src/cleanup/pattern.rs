//! Search specs and the per-run declination tally

use std::collections::HashSet;
use std::fmt;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::catalog::{UpdateId, UpdateRecord};
use crate::error::{CleanupError, Result};

/// Record field a pattern is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchField {
    Title,
    /// Any one of the record's product titles
    ProductTitles,
    UpdateClassificationTitle,
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchField::Title => "title",
            SearchField::ProductTitles => "product",
            SearchField::UpdateClassificationTitle => "classification",
        })
    }
}

/// A compiled obsolescence pattern bound to one field.
///
/// Patterns are unanchored and case-insensitive, so plain text such as
/// `Windows 7` matches any value containing it.
#[derive(Debug, Clone)]
pub struct SearchSpec {
    pattern: String,
    field: SearchField,
    matcher: Regex,
}

impl SearchSpec {
    pub fn new(pattern: impl Into<String>, field: SearchField) -> Result<Self> {
        let pattern = pattern.into();
        let matcher = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| CleanupError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;

        Ok(Self {
            pattern,
            field,
            matcher,
        })
    }

    pub fn title(pattern: impl Into<String>) -> Result<Self> {
        Self::new(pattern, SearchField::Title)
    }

    pub fn product(pattern: impl Into<String>) -> Result<Self> {
        Self::new(pattern, SearchField::ProductTitles)
    }

    pub fn classification(pattern: impl Into<String>) -> Result<Self> {
        Self::new(pattern, SearchField::UpdateClassificationTitle)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn field(&self) -> SearchField {
        self.field
    }

    /// Does the selected field of `record` match, regardless of approval
    pub fn matches(&self, record: &UpdateRecord) -> bool {
        match self.field {
            SearchField::Title => self.matcher.is_match(&record.title),
            SearchField::ProductTitles => record
                .product_titles
                .iter()
                .any(|product| self.matcher.is_match(product)),
            SearchField::UpdateClassificationTitle => {
                self.matcher.is_match(&record.classification)
            }
        }
    }

    /// Approved records matching this spec are the ones we decline
    pub fn selects(&self, record: &UpdateRecord) -> bool {
        record.is_effectively_approved() && self.matches(record)
    }
}

impl fmt::Display for SearchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ~ {:?}", self.field, self.pattern)
    }
}

/// Records declined during one engine invocation.
///
/// The grand total counts distinct records, so a record reached by two
/// patterns (or by a pattern and the supersession pass) counts once.
#[derive(Debug, Default)]
pub struct DeclinationTally {
    declined: HashSet<UpdateId>,
}

impl DeclinationTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if `id` was already counted
    pub fn record(&mut self, id: &UpdateId) -> bool {
        self.declined.insert(id.clone())
    }

    pub fn contains(&self, id: &UpdateId) -> bool {
        self.declined.contains(id)
    }

    pub fn total(&self) -> usize {
        self.declined.len()
    }
}
