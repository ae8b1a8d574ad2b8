//! Ordered section gating: a section unlocks only once every earlier section is saved.

use serde::Serialize;

use super::blueprint::RequestBlueprint;
use super::domain::{FormDocument, SectionKey};
use super::validation::{FieldValidationEngine, ValidationContext, ValidationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    Locked,
    Unsaved,
    Saved,
}

impl SectionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Locked => "Locked",
            Self::Unsaved => "In progress",
            Self::Saved => "Saved",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("section '{0}' is not part of this request")]
    UnknownSection(SectionKey),
    #[error("section ordinal {0} is out of range")]
    OutOfRange(usize),
    #[error("section '{0}' is locked until every earlier section is saved")]
    Locked(SectionKey),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SectionSaveError {
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error("{banner}")]
    Invalid {
        banner: String,
        report: ValidationReport,
    },
    #[error("{banner}")]
    Unattributed {
        banner: String,
        report: ValidationReport,
    },
}

/// Transition produced by a successful save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub section: SectionKey,
    pub ordinal: usize,
    /// False when the section was already saved and nothing changed.
    pub newly_saved: bool,
    pub unlocked: Option<SectionKey>,
}

#[derive(Debug, Clone)]
pub struct SectionGateController {
    keys: Vec<SectionKey>,
    states: Vec<SectionStatus>,
    active: usize,
}

impl SectionGateController {
    /// New request: the first section is open, everything else is locked.
    pub fn new(blueprint: &RequestBlueprint) -> Self {
        let keys: Vec<SectionKey> = blueprint.keys().collect();
        let states = (0..keys.len())
            .map(|ordinal| {
                if ordinal == 0 {
                    SectionStatus::Unsaved
                } else {
                    SectionStatus::Locked
                }
            })
            .collect();

        Self {
            keys,
            states,
            active: 0,
        }
    }

    /// Edit mode: every section starts saved.
    pub fn hydrated(blueprint: &RequestBlueprint) -> Self {
        let keys: Vec<SectionKey> = blueprint.keys().collect();
        let states = vec![SectionStatus::Saved; keys.len()];
        Self {
            keys,
            states,
            active: 0,
        }
    }

    pub fn ordinal_of(&self, key: SectionKey) -> Result<usize, GateError> {
        self.keys
            .iter()
            .position(|candidate| *candidate == key)
            .ok_or(GateError::UnknownSection(key))
    }

    pub fn status(&self, ordinal: usize) -> Option<SectionStatus> {
        self.states.get(ordinal).copied()
    }

    pub fn status_of(&self, key: SectionKey) -> Option<SectionStatus> {
        self.ordinal_of(key).ok().and_then(|ordinal| self.status(ordinal))
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn active_key(&self) -> Option<SectionKey> {
        self.keys.get(self.active).copied()
    }

    pub fn all_saved(&self) -> bool {
        self.states.iter().all(|status| *status == SectionStatus::Saved)
    }

    /// Move the active pointer. Locked sections cannot be entered.
    pub fn select(&mut self, ordinal: usize) -> Result<SectionKey, GateError> {
        let key = self.check_open(ordinal)?;
        self.active = ordinal;
        Ok(key)
    }

    /// Fails when the section is absent or still locked.
    pub fn check_open(&self, ordinal: usize) -> Result<SectionKey, GateError> {
        let key = *self.keys.get(ordinal).ok_or(GateError::OutOfRange(ordinal))?;
        match self.states[ordinal] {
            SectionStatus::Locked => Err(GateError::Locked(key)),
            _ => Ok(key),
        }
    }

    /// Mark a section saved and unlock its successor. The active pointer advances only
    /// on the first save of a section.
    pub fn commit(&mut self, ordinal: usize) -> Result<SaveOutcome, GateError> {
        let section = self.check_open(ordinal)?;
        let newly_saved = self.states[ordinal] != SectionStatus::Saved;
        self.states[ordinal] = SectionStatus::Saved;

        let mut unlocked = None;
        if let Some(next) = self.states.get_mut(ordinal + 1) {
            if *next == SectionStatus::Locked {
                *next = SectionStatus::Unsaved;
                unlocked = self.keys.get(ordinal + 1).copied();
            }
        }

        if newly_saved && ordinal + 1 < self.keys.len() {
            self.active = ordinal + 1;
        }

        Ok(SaveOutcome {
            section,
            ordinal,
            newly_saved,
            unlocked,
        })
    }

    /// Validate exactly the section's declared field set and commit on success. Failure
    /// leaves every state untouched.
    pub fn save_section(
        &mut self,
        ordinal: usize,
        document: &FormDocument,
        blueprint: &RequestBlueprint,
        engine: &FieldValidationEngine,
        context: &ValidationContext<'_>,
    ) -> Result<(SaveOutcome, ValidationReport), SectionSaveError> {
        let report = self.check_section(ordinal, document, blueprint, engine, context)?;
        let outcome = self.commit(ordinal)?;
        Ok((outcome, report))
    }

    /// Validation half of a save, without any transition.
    pub fn check_section(
        &self,
        ordinal: usize,
        document: &FormDocument,
        blueprint: &RequestBlueprint,
        engine: &FieldValidationEngine,
        context: &ValidationContext<'_>,
    ) -> Result<ValidationReport, SectionSaveError> {
        self.check_open(ordinal)?;
        let spec = blueprint
            .section(ordinal)
            .ok_or(GateError::OutOfRange(ordinal))?;

        let report = engine.validate(document, spec, context);
        if report.is_valid() {
            return Ok(report);
        }

        let banner = report.banner().unwrap_or_default();
        if report.has_unattributed() {
            Err(SectionSaveError::Unattributed { banner, report })
        } else {
            Err(SectionSaveError::Invalid { banner, report })
        }
    }

    pub fn view(&self) -> GateView {
        GateView {
            active: self.active_key(),
            all_saved: self.all_saved(),
            sections: self
                .keys
                .iter()
                .zip(&self.states)
                .enumerate()
                .map(|(ordinal, (key, status))| SectionStateView {
                    key: *key,
                    ordinal,
                    label: key.label(),
                    status: *status,
                    status_label: status.label(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionStateView {
    pub key: SectionKey,
    pub ordinal: usize,
    pub label: &'static str,
    pub status: SectionStatus,
    pub status_label: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct GateView {
    pub active: Option<SectionKey>,
    pub all_saved: bool,
    pub sections: Vec<SectionStateView>,
}
