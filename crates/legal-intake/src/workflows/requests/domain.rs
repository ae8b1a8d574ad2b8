use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::dates::lenient_date_opt;
use super::finance::RatePair;
use super::lists::{Discriminated, ItemList, RepeatableItem};
use super::mora::MoraState;

/// Identifier of an editing session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier returned by the transport once a document has been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Insolvency,
    Conciliation,
}

impl RequestKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Insolvency => "Insolvency request",
            Self::Conciliation => "Conciliation request",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKey {
    Debtor,
    Parties,
    Facts,
    Claims,
    Debts,
    Assets,
    Income,
    Proposal,
    Annexes,
}

impl SectionKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debtor => "debtor",
            Self::Parties => "parties",
            Self::Facts => "facts",
            Self::Claims => "claims",
            Self::Debts => "debts",
            Self::Assets => "assets",
            Self::Income => "income",
            Self::Proposal => "proposal",
            Self::Annexes => "annexes",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Debtor => "Debtor",
            Self::Parties => "Parties",
            Self::Facts => "Facts",
            Self::Claims => "Claims",
            Self::Debts => "Debts",
            Self::Assets => "Assets",
            Self::Income => "Income & Expenses",
            Self::Proposal => "Payment Proposal",
            Self::Annexes => "Annexes & Signature",
        }
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "debtor" => Ok(Self::Debtor),
            "parties" => Ok(Self::Parties),
            "facts" => Ok(Self::Facts),
            "claims" => Ok(Self::Claims),
            "debts" => Ok(Self::Debts),
            "assets" => Ok(Self::Assets),
            "income" => Ok(Self::Income),
            "proposal" => Ok(Self::Proposal),
            "annexes" => Ok(Self::Annexes),
            other => Err(format!("unknown section '{other}'")),
        }
    }
}

/// Repeatable collections managed by [`ItemList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Parties,
    Facts,
    Claims,
    Debts,
    Assets,
    Attachments,
}

impl Collection {
    /// Field name the collection occupies inside its section.
    pub const fn field(self) -> &'static str {
        match self {
            Self::Parties => "parties",
            Self::Facts => "facts",
            Self::Claims => "claims",
            Self::Debts => "debts",
            Self::Assets => "assets",
            Self::Attachments => "attachments",
        }
    }

    pub const fn section(self) -> SectionKey {
        match self {
            Self::Parties => SectionKey::Parties,
            Self::Facts => SectionKey::Facts,
            Self::Claims => SectionKey::Claims,
            Self::Debts => SectionKey::Debts,
            Self::Assets => SectionKey::Assets,
            Self::Attachments => SectionKey::Annexes,
        }
    }

    pub const fn item_label(self) -> &'static str {
        match self {
            Self::Parties => "party",
            Self::Facts => "fact",
            Self::Claims => "claim",
            Self::Debts => "debt",
            Self::Assets => "asset",
            Self::Attachments => "attachment",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    #[default]
    Applicant,
    Respondent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyKind {
    NaturalPerson,
    LegalEntity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityDocument {
    #[default]
    CitizenshipCard,
    ForeignerId,
    Passport,
}

/// Identity block; the tag decides which sub-fields exist at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartyIdentity {
    NaturalPerson {
        #[serde(default)]
        first_name: String,
        #[serde(default)]
        last_name: String,
        #[serde(default)]
        document_type: IdentityDocument,
        #[serde(default)]
        document_number: String,
        #[serde(default, with = "lenient_date_opt")]
        birth_date: Option<NaiveDate>,
    },
    LegalEntity {
        #[serde(default)]
        business_name: String,
        #[serde(default)]
        tax_id: String,
        #[serde(default)]
        legal_representative: String,
    },
}

impl PartyIdentity {
    pub fn blank(kind: PartyKind) -> Self {
        match kind {
            PartyKind::NaturalPerson => Self::NaturalPerson {
                first_name: String::new(),
                last_name: String::new(),
                document_type: IdentityDocument::default(),
                document_number: String::new(),
                birth_date: None,
            },
            PartyKind::LegalEntity => Self::LegalEntity {
                business_name: String::new(),
                tax_id: String::new(),
                legal_representative: String::new(),
            },
        }
    }

    pub fn kind(&self) -> PartyKind {
        match self {
            Self::NaturalPerson { .. } => PartyKind::NaturalPerson,
            Self::LegalEntity { .. } => PartyKind::LegalEntity,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Self::NaturalPerson {
                first_name,
                last_name,
                ..
            } => format!("{} {}", first_name.trim(), last_name.trim())
                .trim()
                .to_string(),
            Self::LegalEntity { business_name, .. } => business_name.trim().to_string(),
        }
    }
}

/// Country → region → city selection backed by the reference-data collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub location: Location,
}

impl Default for PartyIdentity {
    fn default() -> Self {
        Self::blank(PartyKind::NaturalPerson)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Party {
    #[serde(default)]
    pub role: PartyRole,
    #[serde(default)]
    pub identity: PartyIdentity,
    #[serde(default)]
    pub contact: Contact,
}

impl RepeatableItem for Party {
    fn blank() -> Self {
        Self::default()
    }
}

impl Discriminated for Party {
    type Kind = PartyKind;

    fn kind(&self) -> PartyKind {
        self.identity.kind()
    }

    fn reset_for(&mut self, kind: PartyKind) {
        self.identity = PartyIdentity::blank(kind);
    }
}

/// A numbered statement of fact supporting the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    #[serde(default)]
    pub description: String,
}

impl RepeatableItem for Fact {
    fn blank() -> Self {
        Self::default()
    }
}

/// What the applicant asks the counterpart or the conciliator for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    #[serde(default)]
    pub description: String,
}

impl RepeatableItem for Claim {
    fn blank() -> Self {
        Self::default()
    }
}

/// One creditor obligation. Amounts are in the filing currency; rates are percentages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Debt {
    #[serde(default)]
    pub creditor: String,
    #[serde(default)]
    pub creditor_tax_id: Option<String>,
    #[serde(default)]
    pub capital: f64,
    #[serde(default)]
    pub current_interest_rate: Option<f64>,
    #[serde(default)]
    pub current_interest: Option<f64>,
    #[serde(default)]
    pub default_interest_rate: Option<f64>,
    #[serde(default)]
    pub default_interest: Option<f64>,
    #[serde(default)]
    pub overdue: bool,
    #[serde(default)]
    pub mora: MoraState,
}

impl RepeatableItem for Debt {
    fn blank() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Vehicle,
    RealEstate,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetDetails {
    Vehicle {
        #[serde(default)]
        plate: String,
        #[serde(default)]
        brand: String,
        #[serde(default)]
        model_year: Option<i32>,
    },
    RealEstate {
        #[serde(default)]
        registry_number: String,
        #[serde(default)]
        address: String,
    },
    Other,
}

impl Default for AssetDetails {
    fn default() -> Self {
        Self::Other
    }
}

impl AssetDetails {
    pub fn blank(kind: AssetKind) -> Self {
        match kind {
            AssetKind::Vehicle => Self::Vehicle {
                plate: String::new(),
                brand: String::new(),
                model_year: None,
            },
            AssetKind::RealEstate => Self::RealEstate {
                registry_number: String::new(),
                address: String::new(),
            },
            AssetKind::Other => Self::Other,
        }
    }

    pub fn kind(&self) -> AssetKind {
        match self {
            Self::Vehicle { .. } => AssetKind::Vehicle,
            Self::RealEstate { .. } => AssetKind::RealEstate,
            Self::Other => AssetKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub appraisal_value: f64,
    #[serde(default)]
    pub encumbered: bool,
    #[serde(default)]
    pub details: AssetDetails,
}

impl RepeatableItem for Asset {
    fn blank() -> Self {
        Self {
            description: String::new(),
            appraisal_value: 0.0,
            encumbered: false,
            details: AssetDetails::Other,
        }
    }
}

impl Discriminated for Asset {
    type Kind = AssetKind;

    fn kind(&self) -> AssetKind {
        self.details.kind()
    }

    fn reset_for(&mut self, kind: AssetKind) {
        self.details = AssetDetails::blank(kind);
    }
}

/// Monthly household expenses used for the capacity-to-pay figure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseBreakdown {
    #[serde(default)]
    pub food: f64,
    #[serde(default)]
    pub housing: f64,
    #[serde(default)]
    pub utilities: f64,
    #[serde(default)]
    pub transport: f64,
    #[serde(default)]
    pub health: f64,
    #[serde(default)]
    pub education: f64,
    #[serde(default)]
    pub other: f64,
}

impl ExpenseBreakdown {
    pub fn entries(&self) -> [(&'static str, f64); 7] {
        [
            ("food", self.food),
            ("housing", self.housing),
            ("utilities", self.utilities),
            ("transport", self.transport),
            ("health", self.health),
            ("education", self.education),
            ("other", self.other),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncomeSection {
    #[serde(default)]
    pub monthly_income: Option<f64>,
    #[serde(default)]
    pub expenses: ExpenseBreakdown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalSection {
    /// Falls back to the aggregated debt capital when absent.
    #[serde(default)]
    pub capital: Option<f64>,
    #[serde(default)]
    pub term_months: Option<u32>,
    #[serde(default)]
    pub rates: RatePair,
    #[serde(default, with = "lenient_date_opt")]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub pay_day: Option<u32>,
}

/// Binary content received from the client. Serializes as its file name only, so any
/// document snapshot or outbound metadata carries the name and never the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FileHandle {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Option<Arc<[u8]>>,
}

impl FileHandle {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: Some(content_type.into()),
            bytes: Some(Arc::from(bytes)),
        }
    }

    pub fn has_content(&self) -> bool {
        self.bytes.as_ref().is_some_and(|bytes| !bytes.is_empty())
    }

    pub fn size(&self) -> usize {
        self.bytes.as_ref().map_or(0, |bytes| bytes.len())
    }
}

impl From<String> for FileHandle {
    fn from(file_name: String) -> Self {
        Self {
            file_name,
            content_type: None,
            bytes: None,
        }
    }
}

impl From<FileHandle> for String {
    fn from(handle: FileHandle) -> Self {
        handle.file_name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub display_name: String,
    #[serde(default)]
    pub file: Option<FileHandle>,
}

impl RepeatableItem for Attachment {
    fn blank() -> Self {
        Self {
            display_name: String::new(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SignatureCapture {
    /// Canvas snapshot, embedded as a `data:image/...` payload.
    Drawn { image: String },
    Uploaded { file: FileHandle },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnexSection {
    #[serde(default)]
    pub attachments: ItemList<Attachment>,
    #[serde(default)]
    pub signature: Option<SignatureCapture>,
}

/// The full record being edited in one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDocument {
    pub kind: RequestKind,
    #[serde(default)]
    pub debtor: Party,
    #[serde(default)]
    pub parties: ItemList<Party>,
    #[serde(default)]
    pub facts: ItemList<Fact>,
    #[serde(default)]
    pub claims: ItemList<Claim>,
    #[serde(default)]
    pub debts: ItemList<Debt>,
    #[serde(default)]
    pub assets: ItemList<Asset>,
    #[serde(default)]
    pub income: IncomeSection,
    #[serde(default)]
    pub proposal: ProposalSection,
    #[serde(default)]
    pub annexes: AnnexSection,
}

impl FormDocument {
    pub fn new(kind: RequestKind) -> Self {
        Self {
            kind,
            debtor: Party::default(),
            parties: ItemList::default(),
            facts: ItemList::default(),
            claims: ItemList::default(),
            debts: ItemList::default(),
            assets: ItemList::default(),
            income: IncomeSection::default(),
            proposal: ProposalSection::default(),
            annexes: AnnexSection::default(),
        }
    }

    /// Hydrate a previously persisted document. Date fields are normalized on the way in;
    /// the requested kind overrides whatever the snapshot recorded.
    pub fn from_snapshot(
        kind: RequestKind,
        mut snapshot: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        if let Some(object) = snapshot.as_object_mut() {
            object.insert("kind".to_string(), serde_json::to_value(kind)?);
        }
        serde_json::from_value(snapshot)
    }

    /// JSON view of one section's payload.
    pub fn section_value(&self, key: SectionKey) -> Result<serde_json::Value, serde_json::Error> {
        match key {
            SectionKey::Debtor => serde_json::to_value(&self.debtor),
            SectionKey::Parties => serde_json::to_value(&self.parties),
            SectionKey::Facts => serde_json::to_value(&self.facts),
            SectionKey::Claims => serde_json::to_value(&self.claims),
            SectionKey::Debts => serde_json::to_value(&self.debts),
            SectionKey::Assets => serde_json::to_value(&self.assets),
            SectionKey::Income => serde_json::to_value(&self.income),
            SectionKey::Proposal => serde_json::to_value(&self.proposal),
            SectionKey::Annexes => serde_json::to_value(&self.annexes),
        }
    }

    pub fn finalize(&self) -> FinalizedDocument {
        FinalizedDocument(Arc::new(self.clone()))
    }
}

/// Immutable snapshot taken at submission time.
#[derive(Debug, Clone)]
pub struct FinalizedDocument(Arc<FormDocument>);

impl Deref for FinalizedDocument {
    type Target = FormDocument;

    fn deref(&self) -> &FormDocument {
        &self.0
    }
}
