use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::IntakeConfig;

use super::clock::Clock;
use super::domain::{DocumentId, FileHandle, RequestId, RequestKind, SectionKey};
use super::finance::{EligibilityPolicy, FinancialCalculator};
use super::gate::{GateError, SaveOutcome, SectionSaveError};
use super::reference::ReferenceData;
use super::repository::{
    RepositoryError, RequestRepository, SubmissionAction, SubmissionReceipt, SubmissionTransport,
    TransportError,
};
use super::session::{IntakeSession, MutationOutcome, SectionMutation, SessionError, SessionMode};
use super::submission::{AssemblyError, SubmissionAssembler};
use super::validation::{FieldValidationEngine, ValidationContext};

/// Runtime knobs of the intake service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntakeSettings {
    /// Persistence latency a section save waits out before committing.
    pub save_delay: Duration,
    pub policy: EligibilityPolicy,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self::from(&IntakeConfig::default())
    }
}

impl From<&IntakeConfig> for IntakeSettings {
    fn from(config: &IntakeConfig) -> Self {
        Self {
            save_delay: config.save_delay,
            policy: EligibilityPolicy::new(config.min_debts, config.overdue_share_threshold_pct),
        }
    }
}

static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> RequestId {
    let id = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RequestId(format!("req-{id:06}"))
}

type InFlightKey = (RequestId, SectionKey);

/// Releases the in-flight marker of a save or mutation however it ends.
struct InFlightGuard<'a> {
    registry: &'a Mutex<HashSet<InFlightKey>>,
    key: InFlightKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

type CancellationRegistry = Mutex<HashMap<RequestId, watch::Sender<bool>>>;

/// Subscription to a request's discard signal. The sender leaves the registry once
/// its last subscriber is dropped.
struct CancellationWatch<'a> {
    registry: &'a CancellationRegistry,
    id: RequestId,
    receiver: Option<watch::Receiver<bool>>,
}

impl CancellationWatch<'_> {
    /// Resolves once the request is discarded.
    async fn cancelled(&mut self) {
        match self.receiver.as_mut() {
            // A closed channel also means the sender was discarded.
            Some(receiver) => {
                let _ = receiver.wait_for(|flag| *flag).await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

impl Drop for CancellationWatch<'_> {
    fn drop(&mut self) {
        drop(self.receiver.take());
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        if registry
            .get(&self.id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            registry.remove(&self.id);
        }
    }
}

/// Facade composing sessions, validation, the save gate and the outbound transport.
pub struct IntakeService<R, T> {
    repository: Arc<R>,
    transport: Arc<T>,
    reference: Arc<dyn ReferenceData>,
    clock: Arc<dyn Clock>,
    engine: FieldValidationEngine,
    assembler: SubmissionAssembler,
    calculator: FinancialCalculator,
    settings: IntakeSettings,
    in_flight: Mutex<HashSet<InFlightKey>>,
    cancellations: CancellationRegistry,
}

impl<R, T> IntakeService<R, T>
where
    R: RequestRepository + 'static,
    T: SubmissionTransport + 'static,
{
    pub fn new(
        repository: Arc<R>,
        transport: Arc<T>,
        reference: Arc<dyn ReferenceData>,
        clock: Arc<dyn Clock>,
        settings: IntakeSettings,
    ) -> Self {
        Self {
            repository,
            transport,
            reference,
            clock,
            engine: FieldValidationEngine::new(),
            assembler: SubmissionAssembler::new(),
            calculator: FinancialCalculator::new(settings.policy),
            settings,
            in_flight: Mutex::new(HashSet::new()),
            cancellations: Mutex::new(HashMap::new()),
        }
    }

    pub fn calculator(&self) -> &FinancialCalculator {
        &self.calculator
    }

    pub fn settings(&self) -> &IntakeSettings {
        &self.settings
    }

    /// Open a session for a new, empty request.
    pub fn create(&self, kind: RequestKind) -> Result<IntakeSession, IntakeServiceError> {
        let session = IntakeSession::new(next_request_id(), kind, self.calculator);
        let stored = self.repository.insert(session)?;
        info!(request_id = %stored.id(), ?kind, "request session created");
        Ok(stored)
    }

    /// Open a session over a previously persisted document; every section starts saved.
    pub fn hydrate(
        &self,
        document_id: DocumentId,
        kind: RequestKind,
        snapshot: Value,
    ) -> Result<IntakeSession, IntakeServiceError> {
        let session = IntakeSession::hydrate(
            next_request_id(),
            document_id,
            kind,
            snapshot,
            self.calculator,
            self.clock.today(),
        )?;
        let stored = self.repository.insert(session)?;
        info!(request_id = %stored.id(), ?kind, "request session hydrated for editing");
        Ok(stored)
    }

    pub fn get(&self, id: &RequestId) -> Result<IntakeSession, IntakeServiceError> {
        let session = self
            .repository
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(session)
    }

    pub fn apply(
        &self,
        id: &RequestId,
        mutation: SectionMutation,
    ) -> Result<(IntakeSession, MutationOutcome), IntakeServiceError> {
        let section = mutation.section();
        let _claim = self.claim(id, section)?;

        let mut session = self.get(id)?;
        let today = self.clock.today();
        let context = self.context(today);
        match session.apply(mutation, &context) {
            Ok(outcome) => {
                self.repository.update(session.clone())?;
                debug!(request_id = %id, %section, ?outcome, "mutation applied");
                Ok((session, outcome))
            }
            Err(error) if error.is_categorical_rejection() => {
                self.repository.update(session)?;
                Err(error.into())
            }
            Err(error) => Err(error.into()),
        }
    }

    pub fn select_section(
        &self,
        id: &RequestId,
        section: SectionKey,
    ) -> Result<IntakeSession, IntakeServiceError> {
        let mut session = self.get(id)?;
        session.select_section(section)?;
        self.repository.update(session.clone())?;
        Ok(session)
    }

    /// Store a named attachment. The content type falls back to a guess from the name.
    pub fn attach_file(
        &self,
        id: &RequestId,
        display_name: &str,
        content_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<(IntakeSession, usize), IntakeServiceError> {
        let _claim = self.claim(id, SectionKey::Annexes)?;
        let mut session = self.get(id)?;
        let file = file_handle(display_name, content_type, bytes);
        let size = file.size();
        let index = session.attach_file(display_name, file)?;
        self.repository.update(session.clone())?;
        info!(request_id = %id, attachment = display_name, size, "attachment stored");
        Ok((session, index))
    }

    pub fn upload_signature(
        &self,
        id: &RequestId,
        file_name: &str,
        content_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<IntakeSession, IntakeServiceError> {
        let _claim = self.claim(id, SectionKey::Annexes)?;
        let mut session = self.get(id)?;
        session.upload_signature(file_handle(file_name, content_type, bytes))?;
        self.repository.update(session.clone())?;
        Ok(session)
    }

    /// Validate a section, wait out the persistence delay, then commit the transition.
    /// Teardown of the request while the delay is pending cancels the save.
    pub async fn save_section(
        &self,
        id: &RequestId,
        section: SectionKey,
    ) -> Result<(IntakeSession, SaveOutcome), IntakeServiceError> {
        let _guard = self.claim(id, section)?;

        let mut session = self.get(id)?;
        let context = self.context(self.clock.today());
        let validated = session.validate_section(section, &self.engine, &context);
        self.repository.update(session)?;
        let ordinal = match validated {
            Ok(ordinal) => ordinal,
            Err(error) => {
                warn!(request_id = %id, %section, %error, "section save rejected");
                return Err(error.into());
            }
        };

        let mut discard = self.cancellation(id);
        tokio::select! {
            _ = tokio::time::sleep(self.settings.save_delay) => {}
            _ = discard.cancelled() => {
                info!(request_id = %id, %section, "section save cancelled");
                return Err(IntakeServiceError::Cancelled);
            }
        }

        let mut session = self
            .repository
            .fetch(id)?
            .ok_or(IntakeServiceError::Cancelled)?;
        let outcome = session.commit_section(ordinal)?;
        self.repository.update(session.clone())?;
        info!(
            request_id = %id,
            %section,
            newly_saved = outcome.newly_saved,
            unlocked = ?outcome.unlocked,
            "section saved"
        );
        Ok((session, outcome))
    }

    /// Finalize, assemble and hand the document to the transport. A transport failure
    /// leaves the session exactly as it was.
    pub fn submit(&self, id: &RequestId) -> Result<SubmissionReceipt, IntakeServiceError> {
        let mut session = self.get(id)?;
        if !session.gate().all_saved() {
            return Err(IntakeServiceError::NotReady);
        }
        if self.has_save_in_flight(id) {
            return Err(IntakeServiceError::SaveInFlight);
        }

        let context = self.context(self.clock.today());
        if let Err(error) = session.validate_all(&self.engine, &context) {
            self.repository.update(session)?;
            warn!(request_id = %id, %error, "submission rejected by validation");
            return Err(error.into());
        }

        let finalized = session.document().finalize();
        let payload = self.assembler.assemble(&finalized, session.blueprint())?;

        let (document_id, action) = match session.mode() {
            SessionMode::New => (self.transport.create(&payload), SubmissionAction::Created),
            SessionMode::Edit { document_id } => (
                self.transport.update(document_id, &payload),
                SubmissionAction::Updated,
            ),
        };
        let document_id = document_id.map_err(|error| {
            warn!(request_id = %id, %error, "submission transport failed");
            IntakeServiceError::Transport(error)
        })?;

        session.mark_persisted(document_id.clone());
        self.repository.update(session)?;

        let receipt = SubmissionReceipt {
            request_id: id.clone(),
            document_id,
            action,
            manifest: payload.manifest(),
        };
        info!(
            request_id = %id,
            document_id = %receipt.document_id.0,
            files = receipt.manifest.file_fields.len(),
            "request submitted"
        );
        Ok(receipt)
    }

    /// Tear the session down, cancelling any pending section save.
    pub fn discard(&self, id: &RequestId) -> Result<(), IntakeServiceError> {
        if let Some(sender) = self
            .cancellations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
        {
            sender.send_replace(true);
        }

        if !self.repository.remove(id)? {
            return Err(RepositoryError::NotFound.into());
        }
        info!(request_id = %id, "request session discarded");
        Ok(())
    }

    fn context(&self, today: chrono::NaiveDate) -> ValidationContext<'_> {
        ValidationContext {
            today,
            reference: self.reference.as_ref(),
        }
    }

    fn claim(&self, id: &RequestId, section: SectionKey) -> Result<InFlightGuard<'_>, IntakeServiceError> {
        let key = (id.clone(), section);
        let mut registry = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !registry.insert(key.clone()) {
            return Err(IntakeServiceError::SaveInFlight);
        }
        Ok(InFlightGuard {
            registry: &self.in_flight,
            key,
        })
    }

    fn has_save_in_flight(&self, id: &RequestId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|(request, _)| request == id)
    }

    fn cancellation(&self, id: &RequestId) -> CancellationWatch<'_> {
        let receiver = self
            .cancellations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id.clone())
            .or_insert_with(|| watch::channel(false).0)
            .subscribe();
        CancellationWatch {
            registry: &self.cancellations,
            id: id.clone(),
            receiver: Some(receiver),
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_cancellations(&self) -> usize {
        self.cancellations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn file_handle(file_name: &str, content_type: Option<String>, bytes: Vec<u8>) -> FileHandle {
    let content_type = content_type
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| {
            mime_guess::from_path(file_name)
                .first_or_octet_stream()
                .to_string()
        });
    FileHandle::new(file_name.trim(), content_type, bytes)
}

/// Error raised by the intake service.
#[derive(Debug, thiserror::Error)]
pub enum IntakeServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Save(#[from] SectionSaveError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error("a save for this section is already in flight")]
    SaveInFlight,
    #[error("the pending save was cancelled because the request was discarded")]
    Cancelled,
    #[error("every section must be saved before the request can be submitted")]
    NotReady,
}

impl From<GateError> for IntakeServiceError {
    fn from(value: GateError) -> Self {
        Self::Session(SessionError::Gate(value))
    }
}
