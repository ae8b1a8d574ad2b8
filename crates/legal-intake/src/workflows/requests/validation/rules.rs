use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::super::domain::{
    Asset, AssetDetails, Attachment, Claim, Debt, Fact, IdentityDocument, IncomeSection, Party,
    PartyIdentity, ProposalSection,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Email,
    Phone,
    DocumentNumber,
    TaxId,
    Plate,
}

impl PatternKind {
    const ALL: [PatternKind; 5] = [
        PatternKind::Email,
        PatternKind::Phone,
        PatternKind::DocumentNumber,
        PatternKind::TaxId,
        PatternKind::Plate,
    ];

    const fn source(self) -> &'static str {
        match self {
            Self::Email => r"^[^@\s]+@[^@\s]+\.[^@\s]+$",
            Self::Phone => r"^\+?[0-9][0-9 ()-]{6,19}$",
            Self::DocumentNumber => r"^[0-9A-Za-z]{5,15}$",
            Self::TaxId => r"^[0-9]{6,12}(-[0-9])?$",
            Self::Plate => r"(?i)^[A-Z]{3}[0-9]{2}[0-9A-Z]$",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Email => "e-mail address",
            Self::Phone => "phone number",
            Self::DocumentNumber => "identity document number",
            Self::TaxId => "tax identification number",
            Self::Plate => "licence plate",
        }
    }

    fn compiled(self) -> Option<&'static Regex> {
        static PATTERNS: OnceLock<Vec<(PatternKind, Regex)>> = OnceLock::new();
        PATTERNS
            .get_or_init(|| {
                PatternKind::ALL
                    .iter()
                    .filter_map(|kind| match Regex::new(kind.source()) {
                        Ok(regex) => Some((*kind, regex)),
                        Err(err) => {
                            tracing::error!(pattern = ?kind, %err, "failed to compile validation pattern");
                            None
                        }
                    })
                    .collect()
            })
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, regex)| regex)
    }

    pub fn matches(self, value: &str) -> bool {
        self.compiled()
            .is_some_and(|regex| regex.is_match(value.trim()))
    }
}

/// Declarative single-field rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    Required,
    MinLen(usize),
    MaxLen(usize),
    Pattern(PatternKind),
    Min(f64),
    Max(f64),
    Positive,
    OneOf(&'static [&'static str]),
}

/// Borrowed view of a field's current value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Number(Option<f64>),
    Date(Option<NaiveDate>),
    Flag(bool),
    /// The field name does not exist on this item shape.
    Unknown,
}

impl FieldValue<'_> {
    fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(text) => text.trim().is_empty(),
            FieldValue::Number(number) => number.is_none(),
            FieldValue::Date(date) => date.is_none(),
            FieldValue::Flag(_) => false,
            FieldValue::Unknown => true,
        }
    }
}

impl Rule {
    /// Non-`Required` rules skip empty values, so optional fields only fail when filled in.
    pub fn check(&self, value: &FieldValue<'_>) -> Result<(), String> {
        if matches!(value, FieldValue::Unknown) {
            return Err("is not a field of this item".to_string());
        }
        if value.is_empty() {
            return match self {
                Rule::Required => Err("is required".to_string()),
                _ => Ok(()),
            };
        }

        match (self, value) {
            (Rule::Required, _) => Ok(()),
            (Rule::MinLen(min), FieldValue::Text(text)) if text.trim().chars().count() < *min => {
                Err(format!("must be at least {min} characters"))
            }
            (Rule::MaxLen(max), FieldValue::Text(text)) if text.trim().chars().count() > *max => {
                Err(format!("must be at most {max} characters"))
            }
            (Rule::Pattern(kind), FieldValue::Text(text)) if !kind.matches(text) => {
                Err(format!("must be a valid {}", kind.description()))
            }
            (Rule::Min(min), FieldValue::Number(Some(number))) if number < min => {
                Err(format!("must be at least {min}"))
            }
            (Rule::Max(max), FieldValue::Number(Some(number))) if number > max => {
                Err(format!("must be at most {max}"))
            }
            (Rule::Positive, FieldValue::Number(Some(number))) if *number <= 0.0 => {
                Err("must be greater than zero".to_string())
            }
            (Rule::OneOf(options), FieldValue::Text(text)) if !options.contains(&text.trim()) => {
                Err(format!("must be one of: {}", options.join(", ")))
            }
            _ => Ok(()),
        }
    }
}

/// Rules attached to one field of an item or section.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: &'static str,
    pub rules: &'static [Rule],
}

/// Anything whose fields can be read by name for rule evaluation.
pub trait FieldSource {
    fn field_value(&self, field: &str) -> FieldValue<'_>;
}

/// Evaluate a rule table, reporting at most one message per field.
pub fn apply_rules(
    source: &impl FieldSource,
    table: &[FieldRule],
    mut report: impl FnMut(&'static str, String),
) {
    for field_rule in table {
        let value = source.field_value(field_rule.field);
        if let Some(message) = field_rule
            .rules
            .iter()
            .find_map(|rule| rule.check(&value).err())
        {
            report(field_rule.field, message);
        }
    }
}

fn text_opt(value: &Option<String>) -> FieldValue<'_> {
    FieldValue::Text(value.as_deref().unwrap_or(""))
}

impl FieldSource for Party {
    fn field_value(&self, field: &str) -> FieldValue<'_> {
        match (field, &self.identity) {
            ("contact.email", _) => FieldValue::Text(&self.contact.email),
            ("contact.phone", _) => FieldValue::Text(&self.contact.phone),
            ("contact.address", _) => FieldValue::Text(&self.contact.address),
            ("identity.first_name", PartyIdentity::NaturalPerson { first_name, .. }) => {
                FieldValue::Text(first_name)
            }
            ("identity.last_name", PartyIdentity::NaturalPerson { last_name, .. }) => {
                FieldValue::Text(last_name)
            }
            (
                "identity.document_type",
                PartyIdentity::NaturalPerson { document_type, .. },
            ) => FieldValue::Text(match document_type {
                IdentityDocument::CitizenshipCard => "citizenship_card",
                IdentityDocument::ForeignerId => "foreigner_id",
                IdentityDocument::Passport => "passport",
            }),
            (
                "identity.document_number",
                PartyIdentity::NaturalPerson {
                    document_number, ..
                },
            ) => FieldValue::Text(document_number),
            ("identity.birth_date", PartyIdentity::NaturalPerson { birth_date, .. }) => {
                FieldValue::Date(*birth_date)
            }
            ("identity.business_name", PartyIdentity::LegalEntity { business_name, .. }) => {
                FieldValue::Text(business_name)
            }
            ("identity.tax_id", PartyIdentity::LegalEntity { tax_id, .. }) => {
                FieldValue::Text(tax_id)
            }
            (
                "identity.legal_representative",
                PartyIdentity::LegalEntity {
                    legal_representative,
                    ..
                },
            ) => FieldValue::Text(legal_representative),
            _ => FieldValue::Unknown,
        }
    }
}

impl FieldSource for Fact {
    fn field_value(&self, field: &str) -> FieldValue<'_> {
        match field {
            "description" => FieldValue::Text(&self.description),
            _ => FieldValue::Unknown,
        }
    }
}

impl FieldSource for Claim {
    fn field_value(&self, field: &str) -> FieldValue<'_> {
        match field {
            "description" => FieldValue::Text(&self.description),
            _ => FieldValue::Unknown,
        }
    }
}

impl FieldSource for Debt {
    fn field_value(&self, field: &str) -> FieldValue<'_> {
        match field {
            "creditor" => FieldValue::Text(&self.creditor),
            "creditor_tax_id" => text_opt(&self.creditor_tax_id),
            "capital" => FieldValue::Number(Some(self.capital)),
            "current_interest_rate" => FieldValue::Number(self.current_interest_rate),
            "current_interest" => FieldValue::Number(self.current_interest),
            "default_interest_rate" => FieldValue::Number(self.default_interest_rate),
            "default_interest" => FieldValue::Number(self.default_interest),
            "overdue" => FieldValue::Flag(self.overdue),
            "mora.due_date" => FieldValue::Date(self.mora.due_date),
            "mora.elapsed_days" => FieldValue::Number(self.mora.elapsed_days.map(f64::from)),
            "mora.over_90" => FieldValue::Flag(self.mora.over_90),
            _ => FieldValue::Unknown,
        }
    }
}

impl FieldSource for Asset {
    fn field_value(&self, field: &str) -> FieldValue<'_> {
        match (field, &self.details) {
            ("description", _) => FieldValue::Text(&self.description),
            ("appraisal_value", _) => FieldValue::Number(Some(self.appraisal_value)),
            ("encumbered", _) => FieldValue::Flag(self.encumbered),
            ("details.plate", AssetDetails::Vehicle { plate, .. }) => FieldValue::Text(plate),
            ("details.brand", AssetDetails::Vehicle { brand, .. }) => FieldValue::Text(brand),
            ("details.model_year", AssetDetails::Vehicle { model_year, .. }) => {
                FieldValue::Number(model_year.map(f64::from))
            }
            ("details.registry_number", AssetDetails::RealEstate { registry_number, .. }) => {
                FieldValue::Text(registry_number)
            }
            ("details.address", AssetDetails::RealEstate { address, .. }) => {
                FieldValue::Text(address)
            }
            _ => FieldValue::Unknown,
        }
    }
}

impl FieldSource for Attachment {
    fn field_value(&self, field: &str) -> FieldValue<'_> {
        match field {
            "display_name" => FieldValue::Text(&self.display_name),
            "file" => FieldValue::Text(
                self.file
                    .as_ref()
                    .filter(|file| file.has_content())
                    .map_or("", |file| file.file_name.as_str()),
            ),
            _ => FieldValue::Unknown,
        }
    }
}

impl FieldSource for IncomeSection {
    fn field_value(&self, field: &str) -> FieldValue<'_> {
        if field == "monthly_income" {
            return FieldValue::Number(self.monthly_income);
        }
        field
            .strip_prefix("expenses.")
            .and_then(|name| {
                self.expenses
                    .entries()
                    .into_iter()
                    .find(|(entry, _)| *entry == name)
            })
            .map_or(FieldValue::Unknown, |(_, amount)| {
                FieldValue::Number(Some(amount))
            })
    }
}

impl FieldSource for ProposalSection {
    fn field_value(&self, field: &str) -> FieldValue<'_> {
        match field {
            "capital" => FieldValue::Number(self.capital),
            "term_months" => FieldValue::Number(self.term_months.map(f64::from)),
            "rates.effective_annual" => FieldValue::Number(self.rates.effective_annual),
            "rates.monthly" => FieldValue::Number(self.rates.monthly),
            "start_date" => FieldValue::Date(self.start_date),
            "pay_day" => FieldValue::Number(self.pay_day.map(f64::from)),
            _ => FieldValue::Unknown,
        }
    }
}
