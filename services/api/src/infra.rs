use chrono::NaiveDate;
use legal_intake::workflows::requests::{
    DocumentId, IntakeSession, MapReferenceData, ReferenceData, ReferenceOption,
    RepositoryError, RequestId, RequestRepository, SubmissionPayload, SubmissionTransport,
    TransportError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) reference: Arc<dyn ReferenceData>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemorySessionRepository {
    sessions: Arc<Mutex<HashMap<RequestId, IntakeSession>>>,
}

impl RequestRepository for InMemorySessionRepository {
    fn insert(&self, session: IntakeSession) -> Result<IntakeSession, RepositoryError> {
        let mut guard = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.contains_key(session.id()) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(session.id().clone(), session.clone());
        Ok(session)
    }

    fn update(&self, session: IntakeSession) -> Result<(), RepositoryError> {
        let mut guard = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.get_mut(session.id()) {
            Some(slot) => {
                *slot = session;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &RequestId) -> Result<Option<IntakeSession>, RepositoryError> {
        let guard = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(id).cloned())
    }

    fn remove(&self, id: &RequestId) -> Result<bool, RepositoryError> {
        let mut guard = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.remove(id).is_some())
    }
}

/// Keeps submitted payloads in memory, standing in for the remote document service.
#[derive(Default)]
pub(crate) struct InMemoryDocumentStore {
    sequence: AtomicU64,
    documents: Mutex<HashMap<DocumentId, SubmissionPayload>>,
}

impl InMemoryDocumentStore {
    pub(crate) fn document(&self, id: &DocumentId) -> Option<SubmissionPayload> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }
}

impl SubmissionTransport for InMemoryDocumentStore {
    fn create(&self, payload: &SubmissionPayload) -> Result<DocumentId, TransportError> {
        let id = DocumentId(format!(
            "doc-{:05}",
            self.sequence.fetch_add(1, Ordering::Relaxed) + 1
        ));
        let manifest = payload.manifest();
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), payload.clone());
        info!(document_id = %id.0, files = manifest.file_fields.len(), bytes = manifest.total_bytes, "document stored");
        Ok(id)
    }

    fn update(
        &self,
        document_id: &DocumentId,
        payload: &SubmissionPayload,
    ) -> Result<DocumentId, TransportError> {
        let mut guard = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.get_mut(document_id) {
            Some(slot) => {
                *slot = payload.clone();
                info!(document_id = %document_id.0, "document updated");
                Ok(document_id.clone())
            }
            None => Err(TransportError::Rejected(format!(
                "document {} does not exist",
                document_id.0
            ))),
        }
    }
}

/// Country, region and city lists served to the cascading location selects.
pub(crate) fn seeded_reference_data() -> MapReferenceData {
    MapReferenceData::new()
        .with_children("", [ReferenceOption::new("co", "Colombia")])
        .with_children(
            "co",
            [
                ReferenceOption::new("ant", "Antioquia"),
                ReferenceOption::new("cun", "Cundinamarca"),
                ReferenceOption::new("dc", "Bogotá D.C."),
                ReferenceOption::new("val", "Valle del Cauca"),
            ],
        )
        .with_children(
            "ant",
            [
                ReferenceOption::new("med", "Medellín"),
                ReferenceOption::new("env", "Envigado"),
                ReferenceOption::new("rio", "Rionegro"),
            ],
        )
        .with_children(
            "cun",
            [
                ReferenceOption::new("soa", "Soacha"),
                ReferenceOption::new("zip", "Zipaquirá"),
            ],
        )
        .with_children("dc", [ReferenceOption::new("bog", "Bogotá")])
        .with_children(
            "val",
            [
                ReferenceOption::new("cal", "Cali"),
                ReferenceOption::new("pal", "Palmira"),
            ],
        )
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_locations_cascade_from_countries_to_cities() {
        let reference = seeded_reference_data();

        assert!(reference.contains("", "co"));
        assert!(reference.contains("ant", "med"));
        assert!(!reference.contains("cun", "med"));
        assert!(reference.lookup("unknown").is_empty());
    }

    #[test]
    fn updates_of_unknown_documents_are_rejected() {
        let store = InMemoryDocumentStore::default();
        let payload = SubmissionPayload {
            metadata: serde_json::json!({ "kind": "conciliation" }),
            files: Vec::new(),
        };

        let created = store.create(&payload).expect("stored");
        assert_eq!(created.0, "doc-00001");
        assert!(store.document(&created).is_some());
        assert!(store
            .update(&DocumentId("doc-99999".to_string()), &payload)
            .is_err());
    }

    #[test]
    fn parse_date_reports_the_expected_format() {
        assert_eq!(
            parse_date(" 2025-07-01 "),
            Ok(NaiveDate::from_ymd_opt(2025, 7, 1).expect("valid"))
        );
        assert!(parse_date("01/07/2025")
            .expect_err("wrong format")
            .contains("YYYY-MM-DD"));
    }
}
