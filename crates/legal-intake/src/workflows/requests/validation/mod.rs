//! Declarative per-field and cross-field validation, evaluated one section at a time.

mod rules;
mod sections;

use std::fmt;

use serde::{Serialize, Serializer};

pub use rules::{apply_rules, FieldRule, FieldSource, FieldValue, PatternKind, Rule};
pub use sections::ValidationContext;

use super::blueprint::SectionSpec;
use super::domain::{FormDocument, SectionKey};
use super::lists::shift_after_removal;

/// Location of a field inside the document, rendered as `debts[1].capital`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    pub section: SectionKey,
    pub item: Option<usize>,
    /// Dotted field name relative to the section or item; empty for the collection itself.
    pub field: String,
}

impl FieldPath {
    pub fn section(section: SectionKey, field: impl Into<String>) -> Self {
        Self {
            section,
            item: None,
            field: field.into(),
        }
    }

    pub fn item(section: SectionKey, index: usize, field: impl Into<String>) -> Self {
        Self {
            section,
            item: Some(index),
            field: field.into(),
        }
    }

    pub fn collection(section: SectionKey) -> Self {
        Self::section(section, "")
    }

    fn prefix(&self) -> &'static str {
        match (self.section, self.item) {
            (SectionKey::Annexes, Some(_)) => "attachments",
            (section, _) => section.as_str(),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self.prefix();
        match (self.item, self.field.is_empty()) {
            (Some(index), true) => write!(f, "{prefix}[{index}]"),
            (Some(index), false) => write!(f, "{prefix}[{index}].{}", self.field),
            (None, true) => f.write_str(prefix),
            (None, false) => write!(f, "{prefix}.{}", self.field),
        }
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Field,
    Cardinality,
    Categorical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub path: FieldPath,
    pub kind: ErrorKind,
    pub message: String,
}

impl FieldError {
    pub fn new(path: FieldPath, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            path,
            kind,
            message: message.into(),
        }
    }

    pub fn field(path: FieldPath, message: impl Into<String>) -> Self {
        Self::new(path, ErrorKind::Field, message)
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.path, self.message)
    }
}

/// Outcome of validating one section. Kept by the session for inline display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub section: SectionKey,
    pub errors: Vec<FieldError>,
    /// Failures that could not be tied to the section's declared field set.
    pub unattributed: Vec<FieldError>,
}

impl ValidationReport {
    pub fn new(section: SectionKey) -> Self {
        Self {
            section,
            errors: Vec::new(),
            unattributed: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.unattributed.is_empty()
    }

    pub fn has_unattributed(&self) -> bool {
        !self.unattributed.is_empty()
    }

    pub fn error_for(&self, rendered_path: &str) -> Option<&FieldError> {
        self.errors
            .iter()
            .find(|error| error.path.to_string() == rendered_path)
    }

    /// Aggregate message for the section-save banner.
    pub fn banner(&self) -> Option<String> {
        if self.has_unattributed() {
            return Some(format!(
                "{} could not be validated. Review the section and try again.",
                self.section.label()
            ));
        }
        if self.errors.is_empty() {
            return None;
        }

        let mut banner = format!(
            "{}: {} problem(s) must be fixed before saving",
            self.section.label(),
            self.errors.len()
        );
        for error in self
            .errors
            .iter()
            .filter(|error| error.kind == ErrorKind::Cardinality)
        {
            banner.push_str("; ");
            banner.push_str(&error.message);
        }
        Some(banner)
    }

    /// Re-resolve index-keyed paths after item `removed` left the section's collection.
    pub fn reindex_after_removal(&mut self, removed: usize) {
        for list in [&mut self.errors, &mut self.unattributed] {
            list.retain_mut(|error| match error.path.item {
                None => true,
                Some(index) => match shift_after_removal(index, removed) {
                    Some(shifted) => {
                        error.path.item = Some(shifted);
                        true
                    }
                    None => false,
                },
            });
        }
    }
}

/// Runs the rules declared for a section against the current document.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldValidationEngine;

impl FieldValidationEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(
        &self,
        document: &FormDocument,
        spec: &SectionSpec,
        context: &ValidationContext<'_>,
    ) -> ValidationReport {
        let mut report = ValidationReport::new(spec.key);

        for error in sections::collect_errors(document, spec, context) {
            if spec.declares(&error.path.field) {
                report.errors.push(error);
            } else {
                tracing::error!(
                    section = %spec.key,
                    path = %error.path,
                    message = %error.message,
                    "validation failure outside the section's declared fields"
                );
                report.unattributed.push(error);
            }
        }

        report
    }
}
