use chrono::NaiveDate;

use super::super::blueprint::SectionSpec;
use super::super::domain::{
    AnnexSection, AssetDetails, Collection, FormDocument, Party, PartyIdentity, PartyKind,
    PartyRole, SectionKey, SignatureCapture,
};
use super::super::finance::aggregate;
use super::super::lists::{ItemList, RepeatableItem};
use super::super::mora::OVERDUE_CATEGORY_THRESHOLD_DAYS;
use super::super::reference::{location_mismatch, ReferenceData};
use super::rules::{apply_rules, FieldRule, FieldSource, PatternKind, Rule};
use super::{ErrorKind, FieldError, FieldPath};

/// Inputs the rules need beyond the document itself.
#[derive(Clone, Copy)]
pub struct ValidationContext<'a> {
    pub today: NaiveDate,
    pub reference: &'a dyn ReferenceData,
}

const DOCUMENT_TYPES: &[&str] = &["citizenship_card", "foreigner_id", "passport"];

const NATURAL_PERSON_RULES: &[FieldRule] = &[
    FieldRule {
        field: "identity.first_name",
        rules: &[Rule::Required, Rule::MaxLen(80)],
    },
    FieldRule {
        field: "identity.last_name",
        rules: &[Rule::Required, Rule::MaxLen(80)],
    },
    FieldRule {
        field: "identity.document_type",
        rules: &[Rule::Required, Rule::OneOf(DOCUMENT_TYPES)],
    },
    FieldRule {
        field: "identity.document_number",
        rules: &[Rule::Required, Rule::Pattern(PatternKind::DocumentNumber)],
    },
];

const LEGAL_ENTITY_RULES: &[FieldRule] = &[
    FieldRule {
        field: "identity.business_name",
        rules: &[Rule::Required, Rule::MaxLen(160)],
    },
    FieldRule {
        field: "identity.tax_id",
        rules: &[Rule::Required, Rule::Pattern(PatternKind::TaxId)],
    },
    FieldRule {
        field: "identity.legal_representative",
        rules: &[Rule::Required, Rule::MaxLen(120)],
    },
];

const CONTACT_RULES: &[FieldRule] = &[
    FieldRule {
        field: "contact.email",
        rules: &[Rule::Required, Rule::Pattern(PatternKind::Email)],
    },
    FieldRule {
        field: "contact.phone",
        rules: &[Rule::Pattern(PatternKind::Phone)],
    },
    FieldRule {
        field: "contact.address",
        rules: &[Rule::MaxLen(200)],
    },
];

const NARRATIVE_RULES: &[FieldRule] = &[FieldRule {
    field: "description",
    rules: &[Rule::Required, Rule::MinLen(10), Rule::MaxLen(2000)],
}];

const DEBT_RULES: &[FieldRule] = &[
    FieldRule {
        field: "creditor",
        rules: &[Rule::Required, Rule::MaxLen(160)],
    },
    FieldRule {
        field: "creditor_tax_id",
        rules: &[Rule::Pattern(PatternKind::TaxId)],
    },
    FieldRule {
        field: "capital",
        rules: &[Rule::Positive],
    },
    FieldRule {
        field: "current_interest_rate",
        rules: &[Rule::Min(0.0), Rule::Max(100.0)],
    },
    FieldRule {
        field: "current_interest",
        rules: &[Rule::Min(0.0)],
    },
    FieldRule {
        field: "default_interest_rate",
        rules: &[Rule::Min(0.0), Rule::Max(100.0)],
    },
    FieldRule {
        field: "default_interest",
        rules: &[Rule::Min(0.0)],
    },
];

const ASSET_RULES: &[FieldRule] = &[
    FieldRule {
        field: "description",
        rules: &[Rule::Required, Rule::MaxLen(500)],
    },
    FieldRule {
        field: "appraisal_value",
        rules: &[Rule::Positive],
    },
];

const VEHICLE_RULES: &[FieldRule] = &[
    FieldRule {
        field: "details.plate",
        rules: &[Rule::Required, Rule::Pattern(PatternKind::Plate)],
    },
    FieldRule {
        field: "details.brand",
        rules: &[Rule::Required],
    },
    FieldRule {
        field: "details.model_year",
        rules: &[Rule::Min(1900.0), Rule::Max(2100.0)],
    },
];

const REAL_ESTATE_RULES: &[FieldRule] = &[
    FieldRule {
        field: "details.registry_number",
        rules: &[Rule::Required],
    },
    FieldRule {
        field: "details.address",
        rules: &[Rule::Required],
    },
];

const ATTACHMENT_RULES: &[FieldRule] = &[
    FieldRule {
        field: "display_name",
        rules: &[Rule::Required, Rule::MaxLen(120)],
    },
    FieldRule {
        field: "file",
        rules: &[Rule::Required],
    },
];

const INCOME_RULES: &[FieldRule] = &[
    FieldRule {
        field: "monthly_income",
        rules: &[Rule::Required, Rule::Min(0.0)],
    },
    FieldRule {
        field: "expenses.food",
        rules: &[Rule::Min(0.0)],
    },
    FieldRule {
        field: "expenses.housing",
        rules: &[Rule::Min(0.0)],
    },
    FieldRule {
        field: "expenses.utilities",
        rules: &[Rule::Min(0.0)],
    },
    FieldRule {
        field: "expenses.transport",
        rules: &[Rule::Min(0.0)],
    },
    FieldRule {
        field: "expenses.health",
        rules: &[Rule::Min(0.0)],
    },
    FieldRule {
        field: "expenses.education",
        rules: &[Rule::Min(0.0)],
    },
    FieldRule {
        field: "expenses.other",
        rules: &[Rule::Min(0.0)],
    },
];

const PROPOSAL_RULES: &[FieldRule] = &[
    FieldRule {
        field: "term_months",
        rules: &[Rule::Required, Rule::Min(1.0), Rule::Max(240.0)],
    },
    FieldRule {
        field: "rates.effective_annual",
        rules: &[Rule::Min(0.0)],
    },
    FieldRule {
        field: "rates.monthly",
        rules: &[Rule::Min(0.0)],
    },
    FieldRule {
        field: "start_date",
        rules: &[Rule::Required],
    },
    FieldRule {
        field: "pay_day",
        rules: &[Rule::Required, Rule::Min(1.0), Rule::Max(31.0)],
    },
];

/// Collect every error for one section, attributed or not.
pub(super) fn collect_errors(
    document: &FormDocument,
    spec: &SectionSpec,
    context: &ValidationContext<'_>,
) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let section = spec.key;

    match section {
        SectionKey::Debtor => {
            check_party(&document.debtor, context, &mut |field, kind, message| {
                errors.push(FieldError::new(FieldPath::section(section, field), kind, message));
            });
            if document.debtor.identity.kind() != PartyKind::NaturalPerson {
                errors.push(FieldError::field(
                    FieldPath::section(section, "identity"),
                    "the debtor must be a natural person",
                ));
            }
        }
        SectionKey::Parties => {
            for (index, party) in document.parties.iter().enumerate() {
                check_party(party, context, &mut |field, kind, message| {
                    errors.push(FieldError::new(
                        FieldPath::item(section, index, field),
                        kind,
                        message,
                    ));
                });
            }
            if !document.parties.is_empty()
                && !document
                    .parties
                    .iter()
                    .any(|party| party.role == PartyRole::Applicant)
            {
                errors.push(FieldError::field(
                    FieldPath::section(section, "role"),
                    "at least one party must be the applicant",
                ));
            }
        }
        SectionKey::Facts => {
            check_items(section, &document.facts, NARRATIVE_RULES, &mut errors);
        }
        SectionKey::Claims => {
            check_items(section, &document.claims, NARRATIVE_RULES, &mut errors);
        }
        SectionKey::Debts => {
            check_items(section, &document.debts, DEBT_RULES, &mut errors);
            for (index, debt) in document.debts.iter().enumerate() {
                if let (Some(current), Some(default)) =
                    (debt.current_interest_rate, debt.default_interest_rate)
                {
                    if default < current {
                        errors.push(FieldError::field(
                            FieldPath::item(section, index, "default_interest_rate"),
                            "must not be lower than the current interest rate",
                        ));
                    }
                }

                if !debt.overdue {
                    continue;
                }
                if let Some(rejection) = &debt.mora.rejection {
                    errors.push(FieldError::new(
                        FieldPath::item(section, index, "mora.over_90"),
                        ErrorKind::Categorical,
                        rejection.clone(),
                    ));
                } else if !debt.mora.category_holds(context.today) {
                    errors.push(FieldError::new(
                        FieldPath::item(section, index, "mora.over_90"),
                        ErrorKind::Categorical,
                        format!(
                            "the due date no longer puts the debt more than {OVERDUE_CATEGORY_THRESHOLD_DAYS} days overdue"
                        ),
                    ));
                } else if !debt.mora.over_90
                    && debt.mora.due_date.is_none()
                    && debt.mora.elapsed_days.is_none()
                {
                    errors.push(FieldError::field(
                        FieldPath::item(section, index, "mora.due_date"),
                        "an overdue debt needs a due date or the days elapsed since it",
                    ));
                }
            }
        }
        SectionKey::Assets => {
            for (index, asset) in document.assets.iter().enumerate() {
                let mut report = |field: &'static str, message: String| {
                    errors.push(FieldError::field(FieldPath::item(section, index, field), message));
                };
                apply_rules(asset, ASSET_RULES, &mut report);
                match asset.details {
                    AssetDetails::Vehicle { .. } => {
                        apply_rules(asset, VEHICLE_RULES, &mut report)
                    }
                    AssetDetails::RealEstate { .. } => {
                        apply_rules(asset, REAL_ESTATE_RULES, &mut report)
                    }
                    AssetDetails::Other => {}
                }
            }
        }
        SectionKey::Income => {
            apply_rules(&document.income, INCOME_RULES, |field, message| {
                errors.push(FieldError::field(FieldPath::section(section, field), message));
            });
        }
        SectionKey::Proposal => {
            let proposal = &document.proposal;
            apply_rules(proposal, PROPOSAL_RULES, |field, message| {
                errors.push(FieldError::field(FieldPath::section(section, field), message));
            });

            let capital = proposal
                .capital
                .unwrap_or_else(|| aggregate(document.debts.as_slice()).total_capital);
            if capital <= 0.0 {
                errors.push(FieldError::field(
                    FieldPath::section(section, "capital"),
                    "must be greater than zero (enter it or declare debts)",
                ));
            }
            if proposal.rates.effective_annual.is_none() && proposal.rates.monthly.is_none() {
                errors.push(FieldError::field(
                    FieldPath::section(section, "rates"),
                    "enter either the effective annual or the monthly rate",
                ));
            }
            if proposal.start_date.is_some_and(|start| start < context.today) {
                errors.push(FieldError::field(
                    FieldPath::section(section, "start_date"),
                    "cannot be in the past",
                ));
            }
        }
        SectionKey::Annexes => {
            check_items(section, &document.annexes.attachments, ATTACHMENT_RULES, &mut errors);
            if let Some(message) = signature_problem(&document.annexes) {
                errors.push(FieldError::field(FieldPath::section(section, "signature"), message));
            }
        }
    }

    if let Some(rule) = spec.collection {
        if let Some(error) = cardinality_error(document, rule.collection, rule.min) {
            errors.push(error);
        }
    }

    errors
}

fn check_items<T>(
    section: SectionKey,
    items: &ItemList<T>,
    table: &[FieldRule],
    errors: &mut Vec<FieldError>,
) where
    T: RepeatableItem + FieldSource,
{
    for (index, item) in items.iter().enumerate() {
        apply_rules(item, table, |field, message| {
            errors.push(FieldError::field(FieldPath::item(section, index, field), message));
        });
    }
}

fn check_party(
    party: &Party,
    context: &ValidationContext<'_>,
    report: &mut dyn FnMut(&'static str, ErrorKind, String),
) {
    let identity_rules = match party.identity {
        PartyIdentity::NaturalPerson { .. } => NATURAL_PERSON_RULES,
        PartyIdentity::LegalEntity { .. } => LEGAL_ENTITY_RULES,
    };
    apply_rules(party, identity_rules, |field, message| {
        report(field, ErrorKind::Field, message)
    });
    apply_rules(party, CONTACT_RULES, |field, message| {
        report(field, ErrorKind::Field, message)
    });

    if let PartyIdentity::NaturalPerson {
        birth_date: Some(born),
        ..
    } = party.identity
    {
        if born > context.today {
            report(
                "identity.birth_date",
                ErrorKind::Field,
                "cannot be in the future".to_string(),
            );
        }
    }

    if let Some(level) = location_mismatch(context.reference, &party.contact.location) {
        report(
            "contact.location",
            ErrorKind::Field,
            format!("the selected {level:?} does not match the reference data").to_lowercase(),
        );
    }
}

fn signature_problem(annexes: &AnnexSection) -> Option<String> {
    match &annexes.signature {
        None => Some("is required".to_string()),
        Some(SignatureCapture::Drawn { image }) => (!image.starts_with("data:image/"))
            .then(|| "a drawn signature must be an embedded image".to_string()),
        Some(SignatureCapture::Uploaded { file }) => {
            if !file.has_content() {
                return Some("the uploaded signature file is empty".to_string());
            }
            let content_type = file
                .content_type
                .as_deref()
                .and_then(|raw| raw.parse::<mime::Mime>().ok())
                .unwrap_or_else(|| mime_guess::from_path(&file.file_name).first_or_octet_stream());
            (content_type.type_() != mime::IMAGE).then(|| {
                format!("the uploaded signature must be an image, got {content_type}")
            })
        }
    }
}

fn cardinality_error(document: &FormDocument, collection: Collection, min: usize) -> Option<FieldError> {
    let result = match collection {
        Collection::Parties => document.parties.validate_cardinality(collection, min),
        Collection::Facts => document.facts.validate_cardinality(collection, min),
        Collection::Claims => document.claims.validate_cardinality(collection, min),
        Collection::Debts => document.debts.validate_cardinality(collection, min),
        Collection::Assets => document.assets.validate_cardinality(collection, min),
        Collection::Attachments => document
            .annexes
            .attachments
            .validate_cardinality(collection, min),
    };

    result.err().map(|error| {
        FieldError::new(
            FieldPath::collection(collection.section()),
            ErrorKind::Cardinality,
            error.to_string(),
        )
    })
}
