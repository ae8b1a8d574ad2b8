//! Multi-section legal request intake: insolvency and conciliation forms edited section by
//! section, gated in order, validated declaratively and submitted as metadata plus files.

pub mod blueprint;
pub mod clock;
pub mod dates;
pub mod domain;
pub mod finance;
pub mod gate;
pub mod lists;
pub mod mora;
pub mod reference;
pub mod repository;
pub mod router;
pub mod service;
pub mod session;
pub mod submission;
pub mod validation;

#[cfg(test)]
mod tests;

pub use blueprint::{CollectionRule, RequestBlueprint, SectionSpec};
pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::{
    AnnexSection, Asset, AssetDetails, AssetKind, Attachment, Claim, Collection, Contact, Debt,
    DocumentId, ExpenseBreakdown, Fact, FileHandle, FinalizedDocument, FormDocument,
    IdentityDocument, IncomeSection, Location, Party, PartyIdentity, PartyKind, PartyRole,
    ProposalSection, RequestId, RequestKind, SectionKey, SignatureCapture,
};
pub use finance::{DebtAssessment, FinancialCalculator, Projection, ProjectionInputs};
pub use gate::{GateError, SaveOutcome, SectionGateController, SectionSaveError, SectionStatus};
pub use lists::{ItemList, ListError};
pub use mora::{MoraDateReconciler, MoraError, MoraState};
pub use reference::{LocationLevel, MapReferenceData, ReferenceData, ReferenceOption};
pub use repository::{
    RepositoryError, RequestRepository, SubmissionAction, SubmissionReceipt, SubmissionTransport,
    TransportError,
};
pub use router::request_router;
pub use service::{IntakeService, IntakeServiceError, IntakeSettings};
pub use session::{IntakeSession, MutationOutcome, SectionMutation, SessionError, SessionMode};
pub use submission::{SubmissionAssembler, SubmissionPayload};
pub use validation::{FieldPath, FieldValidationEngine, ValidationContext, ValidationReport};
