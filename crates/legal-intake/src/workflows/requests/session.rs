//! One owned editing session: the document, its section gate, the last validation report
//! per section and the memoized financial derivations.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::blueprint::RequestBlueprint;
use super::domain::{
    AssetKind, Attachment, Collection, DocumentId, FileHandle, FormDocument, IncomeSection, Party,
    PartyKind, ProposalSection, RequestId, RequestKind, SectionKey, SignatureCapture,
};
use super::finance::{
    CapacityToPay, DebtAssessment, Derivations, FinancialCalculator, Projection, RateError,
};
use super::gate::{GateError, GateView, SaveOutcome, SectionGateController, SectionSaveError};
use super::lists::{Discriminated, ItemList, ListError, RepeatableItem};
use super::mora::{MoraDateReconciler, MoraError};
use super::reference::{set_location_level, LocationError, LocationLevel};
use super::validation::{FieldValidationEngine, ValidationContext, ValidationReport};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SessionMode {
    New,
    Edit { document_id: DocumentId },
}

/// A single edit applied to the document. Derived values are refreshed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SectionMutation {
    ReplaceDebtor {
        debtor: Party,
    },
    ReplaceIncome {
        income: IncomeSection,
    },
    ReplaceProposal {
        proposal: ProposalSection,
    },
    /// Appends the given item, or the collection's blank shape when `item` is absent.
    AppendItem {
        collection: Collection,
        #[serde(default)]
        item: Option<Value>,
    },
    RemoveItem {
        collection: Collection,
        index: usize,
    },
    ReplaceItem {
        collection: Collection,
        index: usize,
        item: Value,
    },
    /// `index` addresses the parties collection; absent means the debtor.
    SetPartyKind {
        #[serde(default)]
        index: Option<usize>,
        kind: PartyKind,
    },
    SetAssetKind {
        index: usize,
        kind: AssetKind,
    },
    SetOverdue {
        index: usize,
        overdue: bool,
    },
    SetElapsedDays {
        index: usize,
        days: u32,
    },
    SetDueDate {
        index: usize,
        due_date: NaiveDate,
    },
    SetOver90 {
        index: usize,
        over_90: bool,
    },
    SetEffectiveAnnualRate {
        value: f64,
    },
    SetMonthlyRate {
        value: f64,
    },
    SetLocation {
        #[serde(default)]
        party: Option<usize>,
        level: LocationLevel,
        #[serde(default)]
        value: Option<String>,
    },
    SetDrawnSignature {
        image: String,
    },
    ClearSignature,
}

impl SectionMutation {
    /// Section whose data the mutation touches.
    pub fn section(&self) -> SectionKey {
        match self {
            Self::ReplaceDebtor { .. } => SectionKey::Debtor,
            Self::ReplaceIncome { .. } => SectionKey::Income,
            Self::ReplaceProposal { .. }
            | Self::SetEffectiveAnnualRate { .. }
            | Self::SetMonthlyRate { .. } => SectionKey::Proposal,
            Self::AppendItem { collection, .. }
            | Self::RemoveItem { collection, .. }
            | Self::ReplaceItem { collection, .. } => collection.section(),
            Self::SetPartyKind { index, .. } | Self::SetLocation { party: index, .. } => {
                if index.is_some() {
                    SectionKey::Parties
                } else {
                    SectionKey::Debtor
                }
            }
            Self::SetAssetKind { .. } => SectionKey::Assets,
            Self::SetOverdue { .. }
            | Self::SetElapsedDays { .. }
            | Self::SetDueDate { .. }
            | Self::SetOver90 { .. } => SectionKey::Debts,
            Self::SetDrawnSignature { .. } | Self::ClearSignature => SectionKey::Annexes,
        }
    }
}

/// What a mutation changed, beyond the field it targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MutationOutcome {
    pub section: SectionKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<usize>,
    /// A dependent field (the other rate, a cleared child selection, ...) was rewritten.
    pub counterpart_updated: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error(transparent)]
    List(#[from] ListError),
    #[error(transparent)]
    Mora(#[from] MoraError),
    #[error(transparent)]
    Rate(#[from] RateError),
    #[error(transparent)]
    Location(#[from] LocationError),
    #[error("invalid {} payload: {source}", .collection.item_label())]
    InvalidItem {
        collection: Collection,
        #[source]
        source: serde_json::Error,
    },
    #[error("stored document could not be read: {0}")]
    Snapshot(#[source] serde_json::Error),
}

impl SessionError {
    /// Categorical rejections still leave a field-level message on the document.
    pub fn is_categorical_rejection(&self) -> bool {
        matches!(self, SessionError::Mora(MoraError::CategoryRejected { .. }))
    }
}

#[derive(Debug, Clone)]
pub struct IntakeSession {
    id: RequestId,
    mode: SessionMode,
    document: FormDocument,
    blueprint: RequestBlueprint,
    gate: SectionGateController,
    reports: BTreeMap<SectionKey, ValidationReport>,
    calculator: FinancialCalculator,
    derivations: Derivations,
}

impl IntakeSession {
    pub fn new(id: RequestId, kind: RequestKind, calculator: FinancialCalculator) -> Self {
        let blueprint = RequestBlueprint::new(kind, calculator.policy().min_debts());
        let gate = SectionGateController::new(&blueprint);
        Self::assemble(id, SessionMode::New, FormDocument::new(kind), blueprint, gate, calculator)
    }

    /// Edit mode. Dates are normalized while reading the snapshot and every section
    /// starts saved.
    pub fn hydrate(
        id: RequestId,
        document_id: DocumentId,
        kind: RequestKind,
        snapshot: Value,
        calculator: FinancialCalculator,
        today: NaiveDate,
    ) -> Result<Self, SessionError> {
        let mut document = FormDocument::from_snapshot(kind, snapshot).map_err(SessionError::Snapshot)?;

        let reconciler = MoraDateReconciler::new(today);
        for index in 0..document.debts.len() {
            let debt = document.debts.get_mut(Collection::Debts, index)?;
            if let (true, false, Some(due)) = (debt.overdue, debt.mora.over_90, debt.mora.due_date) {
                reconciler.set_due_date(debt, due)?;
            }
        }

        let blueprint = RequestBlueprint::new(kind, calculator.policy().min_debts());
        let gate = SectionGateController::hydrated(&blueprint);
        Ok(Self::assemble(
            id,
            SessionMode::Edit { document_id },
            document,
            blueprint,
            gate,
            calculator,
        ))
    }

    fn assemble(
        id: RequestId,
        mode: SessionMode,
        document: FormDocument,
        blueprint: RequestBlueprint,
        gate: SectionGateController,
        calculator: FinancialCalculator,
    ) -> Self {
        let mut session = Self {
            id,
            mode,
            document,
            blueprint,
            gate,
            reports: BTreeMap::new(),
            calculator,
            derivations: Derivations::default(),
        };
        session.refresh();
        session
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn kind(&self) -> RequestKind {
        self.document.kind
    }

    pub fn mode(&self) -> &SessionMode {
        &self.mode
    }

    pub fn document(&self) -> &FormDocument {
        &self.document
    }

    pub fn blueprint(&self) -> &RequestBlueprint {
        &self.blueprint
    }

    pub fn gate(&self) -> &SectionGateController {
        &self.gate
    }

    pub fn report(&self, section: SectionKey) -> Option<&ValidationReport> {
        self.reports.get(&section)
    }

    pub fn derivations(&self) -> &Derivations {
        &self.derivations
    }

    pub fn assessment(&self) -> Option<&DebtAssessment> {
        self.derivations.assessment()
    }

    pub fn projection(&self) -> Option<&Projection> {
        self.derivations.projection()
    }

    pub fn capacity(&self) -> Option<&CapacityToPay> {
        self.derivations.capacity()
    }

    /// Record the identifier the transport assigned; later submissions update it.
    pub fn mark_persisted(&mut self, document_id: DocumentId) {
        self.mode = SessionMode::Edit { document_id };
    }

    pub fn select_section(&mut self, key: SectionKey) -> Result<SectionKey, GateError> {
        let ordinal = self.gate.ordinal_of(key)?;
        self.gate.select(ordinal)
    }

    /// Apply one mutation. Sections that are still locked cannot be edited.
    pub fn apply(
        &mut self,
        mutation: SectionMutation,
        context: &ValidationContext<'_>,
    ) -> Result<MutationOutcome, SessionError> {
        let section = mutation.section();
        self.ensure_editable(section)?;

        let result = self.apply_unchecked(mutation, context);
        // A refused over-90 toggle still changed the document (the rejection message).
        self.refresh();
        result
    }

    fn ensure_editable(&self, section: SectionKey) -> Result<usize, GateError> {
        let ordinal = self.gate.ordinal_of(section)?;
        self.gate.check_open(ordinal)?;
        Ok(ordinal)
    }

    fn apply_unchecked(
        &mut self,
        mutation: SectionMutation,
        context: &ValidationContext<'_>,
    ) -> Result<MutationOutcome, SessionError> {
        let section = mutation.section();
        let reconciler = MoraDateReconciler::new(context.today);
        let mut outcome = MutationOutcome {
            section,
            item: None,
            counterpart_updated: false,
        };
        let document = &mut self.document;

        match mutation {
            SectionMutation::ReplaceDebtor { debtor } => document.debtor = debtor,
            SectionMutation::ReplaceIncome { income } => document.income = income,
            SectionMutation::ReplaceProposal { proposal } => document.proposal = proposal,
            SectionMutation::AppendItem { collection, item } => {
                outcome.item = Some(append_item(document, collection, item)?);
            }
            SectionMutation::RemoveItem { collection, index } => {
                remove_item(document, collection, index)?;
                if let Some(report) = self.reports.get_mut(&section) {
                    report.reindex_after_removal(index);
                }
            }
            SectionMutation::ReplaceItem {
                collection,
                index,
                item,
            } => {
                replace_item(document, collection, index, item)?;
                outcome.item = Some(index);
            }
            SectionMutation::SetPartyKind { index, kind } => {
                let party = match index {
                    Some(index) => document.parties.get_mut(Collection::Parties, index)?,
                    None => &mut document.debtor,
                };
                outcome.counterpart_updated = party.set_kind(kind);
                outcome.item = index;
            }
            SectionMutation::SetAssetKind { index, kind } => {
                let asset = document.assets.get_mut(Collection::Assets, index)?;
                outcome.counterpart_updated = asset.set_kind(kind);
                outcome.item = Some(index);
            }
            SectionMutation::SetOverdue { index, overdue } => {
                let debt = document.debts.get_mut(Collection::Debts, index)?;
                reconciler.set_overdue(debt, overdue);
                outcome.item = Some(index);
            }
            SectionMutation::SetElapsedDays { index, days } => {
                let debt = document.debts.get_mut(Collection::Debts, index)?;
                reconciler.set_elapsed_days(debt, days)?;
                outcome.item = Some(index);
                outcome.counterpart_updated = true;
            }
            SectionMutation::SetDueDate { index, due_date } => {
                let debt = document.debts.get_mut(Collection::Debts, index)?;
                reconciler.set_due_date(debt, due_date)?;
                outcome.item = Some(index);
                outcome.counterpart_updated = debt.mora.elapsed_days.is_some();
            }
            SectionMutation::SetOver90 { index, over_90 } => {
                let debt = document.debts.get_mut(Collection::Debts, index)?;
                reconciler.set_over_90(debt, over_90)?;
                outcome.item = Some(index);
            }
            SectionMutation::SetEffectiveAnnualRate { value } => {
                outcome.counterpart_updated = document.proposal.rates.set_effective_annual(value)?;
            }
            SectionMutation::SetMonthlyRate { value } => {
                outcome.counterpart_updated = document.proposal.rates.set_monthly(value)?;
            }
            SectionMutation::SetLocation {
                party,
                level,
                value,
            } => {
                let target = match party {
                    Some(index) => document.parties.get_mut(Collection::Parties, index)?,
                    None => &mut document.debtor,
                };
                let before = target.contact.location.clone();
                set_location_level(context.reference, &mut target.contact.location, level, value)?;
                let location = &target.contact.location;
                outcome.counterpart_updated = (level != LocationLevel::City
                    && before.city.is_some()
                    && location.city.is_none())
                    || (level == LocationLevel::Country
                        && before.region.is_some()
                        && location.region.is_none());
                outcome.item = party;
            }
            SectionMutation::SetDrawnSignature { image } => {
                document.annexes.signature = Some(SignatureCapture::Drawn { image });
            }
            SectionMutation::ClearSignature => document.annexes.signature = None,
        }

        Ok(outcome)
    }

    /// Add a named attachment with its content.
    pub fn attach_file(&mut self, display_name: &str, file: FileHandle) -> Result<usize, SessionError> {
        self.ensure_editable(SectionKey::Annexes)?;
        let index = self.document.annexes.attachments.append_unique(Attachment {
            display_name: display_name.trim().to_string(),
            file: Some(file),
        })?;
        Ok(index)
    }

    pub fn upload_signature(&mut self, file: FileHandle) -> Result<(), SessionError> {
        self.ensure_editable(SectionKey::Annexes)?;
        self.document.annexes.signature = Some(SignatureCapture::Uploaded { file });
        Ok(())
    }

    /// Validation half of a save. The report is kept for inline display whatever the result.
    pub fn validate_section(
        &mut self,
        key: SectionKey,
        engine: &FieldValidationEngine,
        context: &ValidationContext<'_>,
    ) -> Result<usize, SectionSaveError> {
        let ordinal = self.gate.ordinal_of(key)?;
        match self
            .gate
            .check_section(ordinal, &self.document, &self.blueprint, engine, context)
        {
            Ok(report) => {
                self.reports.insert(key, report);
                Ok(ordinal)
            }
            Err(error) => {
                if let SectionSaveError::Invalid { report, .. }
                | SectionSaveError::Unattributed { report, .. } = &error
                {
                    self.reports.insert(key, report.clone());
                }
                Err(error)
            }
        }
    }

    /// Validate every section again, in order, stopping at the first invalid one.
    /// Saved sections stay editable, so a submission re-checks what a save once accepted.
    pub fn validate_all(
        &mut self,
        engine: &FieldValidationEngine,
        context: &ValidationContext<'_>,
    ) -> Result<(), SectionSaveError> {
        let keys: Vec<SectionKey> = self.blueprint.keys().collect();
        for key in keys {
            self.validate_section(key, engine, context)?;
        }
        Ok(())
    }

    pub fn commit_section(&mut self, ordinal: usize) -> Result<SaveOutcome, GateError> {
        self.gate.commit(ordinal)
    }

    /// Validate and commit without any persistence delay.
    pub fn save_section(
        &mut self,
        key: SectionKey,
        engine: &FieldValidationEngine,
        context: &ValidationContext<'_>,
    ) -> Result<SaveOutcome, SectionSaveError> {
        let ordinal = self.validate_section(key, engine, context)?;
        Ok(self.commit_section(ordinal)?)
    }

    fn refresh(&mut self) {
        self.derivations.refresh(&self.calculator, &self.document);
    }

    pub fn view(&self) -> SessionView<'_> {
        SessionView {
            request_id: &self.id,
            kind: self.document.kind,
            kind_label: self.document.kind.label(),
            mode: &self.mode,
            gate: self.gate.view(),
            document: &self.document,
            reports: self.reports.values().collect(),
            finance: (self.document.kind == RequestKind::Insolvency).then(|| FinanceView {
                assessment: self.derivations.assessment(),
                capacity: self.derivations.capacity(),
                projection: self.derivations.projection(),
            }),
        }
    }
}

/// Serializable snapshot of a session for API responses.
#[derive(Debug, Serialize)]
pub struct SessionView<'a> {
    pub request_id: &'a RequestId,
    pub kind: RequestKind,
    pub kind_label: &'static str,
    pub mode: &'a SessionMode,
    pub gate: GateView,
    pub document: &'a FormDocument,
    pub reports: Vec<&'a ValidationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finance: Option<FinanceView<'a>>,
}

#[derive(Debug, Serialize)]
pub struct FinanceView<'a> {
    pub assessment: Option<&'a DebtAssessment>,
    pub capacity: Option<&'a CapacityToPay>,
    pub projection: Option<&'a Projection>,
}

fn decode<T: DeserializeOwned>(collection: Collection, value: Value) -> Result<T, SessionError> {
    serde_json::from_value(value).map_err(|source| SessionError::InvalidItem { collection, source })
}

fn decode_or_blank<T: DeserializeOwned + RepeatableItem>(
    collection: Collection,
    value: Option<Value>,
) -> Result<T, SessionError> {
    value.map_or_else(|| Ok(T::blank()), |value| decode(collection, value))
}

fn append_item(
    document: &mut FormDocument,
    collection: Collection,
    item: Option<Value>,
) -> Result<usize, SessionError> {
    let index = match collection {
        Collection::Parties => document.parties.append(decode_or_blank(collection, item)?),
        Collection::Facts => document.facts.append(decode_or_blank(collection, item)?),
        Collection::Claims => document.claims.append(decode_or_blank(collection, item)?),
        Collection::Debts => document.debts.append(decode_or_blank(collection, item)?),
        Collection::Assets => document.assets.append(decode_or_blank(collection, item)?),
        Collection::Attachments => {
            let attachment: Attachment = decode_or_blank(collection, item)?;
            document.annexes.attachments.append_unique(attachment)?
        }
    };
    Ok(index)
}

fn remove_item(
    document: &mut FormDocument,
    collection: Collection,
    index: usize,
) -> Result<(), ListError> {
    match collection {
        Collection::Parties => document.parties.remove(collection, index).map(drop),
        Collection::Facts => document.facts.remove(collection, index).map(drop),
        Collection::Claims => document.claims.remove(collection, index).map(drop),
        Collection::Debts => document.debts.remove(collection, index).map(drop),
        Collection::Assets => document.assets.remove(collection, index).map(drop),
        Collection::Attachments => document
            .annexes
            .attachments
            .remove(collection, index)
            .map(drop),
    }
}

fn replace_in<T: DeserializeOwned + RepeatableItem>(
    list: &mut ItemList<T>,
    collection: Collection,
    index: usize,
    item: Value,
) -> Result<(), SessionError> {
    let item = decode(collection, item)?;
    list.replace(collection, index, item)?;
    Ok(())
}

fn replace_item(
    document: &mut FormDocument,
    collection: Collection,
    index: usize,
    item: Value,
) -> Result<(), SessionError> {
    match collection {
        Collection::Parties => replace_in(&mut document.parties, collection, index, item),
        Collection::Facts => replace_in(&mut document.facts, collection, index, item),
        Collection::Claims => replace_in(&mut document.claims, collection, index, item),
        Collection::Debts => replace_in(&mut document.debts, collection, index, item),
        Collection::Assets => replace_in(&mut document.assets, collection, index, item),
        Collection::Attachments => {
            let attachment: Attachment = decode(collection, item)?;
            let attachments = &mut document.annexes.attachments;
            match attachments.position_of(&attachment.display_name) {
                Some(existing) if existing != index => {
                    Err(ListError::DuplicateName(attachment.display_name.trim().to_string()).into())
                }
                _ => {
                    attachments.replace(collection, index, attachment)?;
                    Ok(())
                }
            }
        }
    }
}
