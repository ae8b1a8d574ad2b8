use serde::Serialize;

use super::domain::{DocumentId, RequestId};
use super::session::IntakeSession;
use super::submission::{SubmissionManifest, SubmissionPayload};

/// Storage abstraction for editing sessions so the service can be exercised in isolation.
pub trait RequestRepository: Send + Sync {
    fn insert(&self, session: IntakeSession) -> Result<IntakeSession, RepositoryError>;
    fn update(&self, session: IntakeSession) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &RequestId) -> Result<Option<IntakeSession>, RepositoryError>;
    /// Returns whether a session was actually removed.
    fn remove(&self, id: &RequestId) -> Result<bool, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound persistence of assembled submissions. The wire protocol lives behind this trait.
pub trait SubmissionTransport: Send + Sync {
    fn create(&self, payload: &SubmissionPayload) -> Result<DocumentId, TransportError>;
    fn update(
        &self,
        document_id: &DocumentId,
        payload: &SubmissionPayload,
    ) -> Result<DocumentId, TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("submission rejected by the document service: {0}")]
    Rejected(String),
    #[error("document service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionAction {
    Created,
    Updated,
}

/// Returned to callers once the transport accepted a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    pub request_id: RequestId,
    pub document_id: DocumentId,
    pub action: SubmissionAction,
    pub manifest: SubmissionManifest,
}
