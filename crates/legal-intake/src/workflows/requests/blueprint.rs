use serde::Serialize;

use super::domain::{Collection, RequestKind, SectionKey};

/// Static description of one ordered section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionSpec {
    pub key: SectionKey,
    pub ordinal: usize,
    pub label: &'static str,
    /// Top-level field names this section's rules may report against.
    pub fields: Vec<&'static str>,
    /// Repeatable collection held by the section and its minimum length.
    pub collection: Option<CollectionRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CollectionRule {
    pub collection: Collection,
    pub min: usize,
}

impl SectionSpec {
    pub fn declares(&self, field: &str) -> bool {
        let head = field.split('.').next().unwrap_or(field);
        head.is_empty() || self.fields.iter().any(|declared| *declared == head)
    }
}

/// Ordered section list for one request kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestBlueprint {
    kind: RequestKind,
    sections: Vec<SectionSpec>,
}

impl RequestBlueprint {
    pub fn new(kind: RequestKind, min_debts: usize) -> Self {
        let keys: &[SectionKey] = match kind {
            RequestKind::Insolvency => &[
                SectionKey::Debtor,
                SectionKey::Facts,
                SectionKey::Debts,
                SectionKey::Assets,
                SectionKey::Income,
                SectionKey::Proposal,
                SectionKey::Annexes,
            ],
            RequestKind::Conciliation => &[
                SectionKey::Parties,
                SectionKey::Facts,
                SectionKey::Claims,
                SectionKey::Annexes,
            ],
        };

        let sections = keys
            .iter()
            .enumerate()
            .map(|(ordinal, key)| section_spec(*key, ordinal, min_debts))
            .collect();

        Self { kind, sections }
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn sections(&self) -> &[SectionSpec] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn section(&self, ordinal: usize) -> Option<&SectionSpec> {
        self.sections.get(ordinal)
    }

    pub fn ordinal_of(&self, key: SectionKey) -> Option<usize> {
        self.sections.iter().position(|spec| spec.key == key)
    }

    pub fn spec_for(&self, key: SectionKey) -> Option<&SectionSpec> {
        self.sections.iter().find(|spec| spec.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = SectionKey> + '_ {
        self.sections.iter().map(|spec| spec.key)
    }
}

fn section_spec(key: SectionKey, ordinal: usize, min_debts: usize) -> SectionSpec {
    let (fields, collection): (Vec<&'static str>, Option<CollectionRule>) = match key {
        SectionKey::Debtor => (vec!["role", "identity", "contact"], None),
        SectionKey::Parties => (
            vec!["parties", "role", "identity", "contact"],
            Some(CollectionRule {
                collection: Collection::Parties,
                min: 1,
            }),
        ),
        SectionKey::Facts => (
            vec!["facts", "description"],
            Some(CollectionRule {
                collection: Collection::Facts,
                min: 1,
            }),
        ),
        SectionKey::Claims => (
            vec!["claims", "description"],
            Some(CollectionRule {
                collection: Collection::Claims,
                min: 1,
            }),
        ),
        SectionKey::Debts => (
            vec![
                "debts",
                "creditor",
                "creditor_tax_id",
                "capital",
                "current_interest_rate",
                "current_interest",
                "default_interest_rate",
                "default_interest",
                "overdue",
                "mora",
            ],
            Some(CollectionRule {
                collection: Collection::Debts,
                min: min_debts,
            }),
        ),
        SectionKey::Assets => (
            vec!["assets", "description", "appraisal_value", "encumbered", "details"],
            Some(CollectionRule {
                collection: Collection::Assets,
                min: 0,
            }),
        ),
        SectionKey::Income => (vec!["monthly_income", "expenses"], None),
        SectionKey::Proposal => (
            vec!["capital", "term_months", "rates", "start_date", "pay_day"],
            None,
        ),
        SectionKey::Annexes => (
            vec!["attachments", "display_name", "file", "signature"],
            Some(CollectionRule {
                collection: Collection::Attachments,
                min: 0,
            }),
        ),
    };

    SectionSpec {
        key,
        ordinal,
        label: key.label(),
        fields,
        collection,
    }
}
