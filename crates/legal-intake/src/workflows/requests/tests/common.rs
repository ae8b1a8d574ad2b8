use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::response::Response;
use chrono::{Days, NaiveDate};
use serde_json::{json, Value};

use crate::workflows::requests::domain::{
    Asset, AssetDetails, Collection, Contact, Debt, DocumentId, Fact, IdentityDocument,
    IncomeSection, Location, Party, PartyIdentity, PartyRole, ProposalSection, RequestId,
    RequestKind, SectionKey,
};
use crate::workflows::requests::finance::{EligibilityPolicy, FinancialCalculator, RatePair};
use crate::workflows::requests::mora::MoraState;
use crate::workflows::requests::reference::{MapReferenceData, ReferenceOption};
use crate::workflows::requests::repository::{
    RepositoryError, RequestRepository, SubmissionTransport, TransportError,
};
use crate::workflows::requests::session::{IntakeSession, SectionMutation};
use crate::workflows::requests::submission::SubmissionPayload;
use crate::workflows::requests::validation::{FieldValidationEngine, ValidationContext};
use crate::workflows::requests::{request_router, FixedClock, IntakeService, IntakeSettings};

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 15).expect("valid date")
}

pub(super) fn days_ago(days: u64) -> NaiveDate {
    today().checked_sub_days(Days::new(days)).expect("valid date")
}

pub(super) fn days_ahead(days: u64) -> NaiveDate {
    today().checked_add_days(Days::new(days)).expect("valid date")
}

pub(super) fn reference_data() -> MapReferenceData {
    MapReferenceData::new()
        .with_children("", [ReferenceOption::new("co", "Colombia")])
        .with_children(
            "co",
            [
                ReferenceOption::new("ant", "Antioquia"),
                ReferenceOption::new("cun", "Cundinamarca"),
            ],
        )
        .with_children("ant", [ReferenceOption::new("med", "Medellín")])
        .with_children("cun", [ReferenceOption::new("bog", "Bogotá")])
}

pub(super) fn context(reference: &MapReferenceData) -> ValidationContext<'_> {
    ValidationContext {
        today: today(),
        reference,
    }
}

pub(super) fn calculator() -> FinancialCalculator {
    FinancialCalculator::new(EligibilityPolicy::default())
}

pub(super) fn debtor() -> Party {
    Party {
        role: PartyRole::Applicant,
        identity: PartyIdentity::NaturalPerson {
            first_name: "Ana".to_string(),
            last_name: "Restrepo".to_string(),
            document_type: IdentityDocument::CitizenshipCard,
            document_number: "1020304050".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1985, 4, 12),
        },
        contact: Contact {
            email: "ana.restrepo@example.com".to_string(),
            phone: "+57 300 123 4567".to_string(),
            address: "Calle 10 # 43-12".to_string(),
            location: Location {
                country: Some("co".to_string()),
                region: Some("ant".to_string()),
                city: Some("med".to_string()),
            },
        },
    }
}

pub(super) fn respondent() -> Party {
    Party {
        role: PartyRole::Respondent,
        identity: PartyIdentity::LegalEntity {
            business_name: "Banco Andino S.A.".to_string(),
            tax_id: "900123456-7".to_string(),
            legal_representative: "Luis Ortega".to_string(),
        },
        contact: Contact {
            email: "legal@bancoandino.example".to_string(),
            ..Contact::default()
        },
    }
}

pub(super) fn fact() -> Fact {
    Fact {
        description: "The debtor lost their main source of income in March 2025.".to_string(),
    }
}

pub(super) fn current_debt(creditor: &str, capital: f64) -> Debt {
    Debt {
        creditor: creditor.to_string(),
        creditor_tax_id: Some("800765432-1".to_string()),
        capital,
        current_interest_rate: Some(1.5),
        current_interest: Some(0.0),
        default_interest_rate: Some(2.0),
        default_interest: Some(0.0),
        overdue: false,
        mora: MoraState::default(),
    }
}

pub(super) fn overdue_debt(creditor: &str, capital: f64, days: u32) -> Debt {
    Debt {
        overdue: true,
        default_interest: Some(capital * 0.02),
        mora: MoraState {
            elapsed_days: Some(days),
            due_date: Some(days_ago(u64::from(days))),
            over_90: false,
            rejection: None,
        },
        ..current_debt(creditor, capital)
    }
}

pub(super) fn vehicle() -> Asset {
    Asset {
        description: "Family car used for work".to_string(),
        appraisal_value: 35_000_000.0,
        encumbered: false,
        details: AssetDetails::Vehicle {
            plate: "ABC123".to_string(),
            brand: "Renault".to_string(),
            model_year: Some(2018),
        },
    }
}

pub(super) fn income() -> IncomeSection {
    let mut income = IncomeSection {
        monthly_income: Some(3_000_000.0),
        ..IncomeSection::default()
    };
    income.expenses.food = 800_000.0;
    income.expenses.housing = 900_000.0;
    income
}

pub(super) fn proposal() -> ProposalSection {
    ProposalSection {
        capital: None,
        term_months: Some(12),
        rates: RatePair {
            effective_annual: Some(12.0),
            monthly: None,
        },
        start_date: Some(days_ahead(30)),
        pay_day: Some(15),
    }
}

pub(super) const DRAWN_SIGNATURE: &str = "data:image/png;base64,iVBORw0KGgo=";

pub(super) fn append(collection: Collection, item: Value) -> SectionMutation {
    SectionMutation::AppendItem {
        collection,
        item: Some(item),
    }
}

pub(super) fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).expect("serializable fixture")
}

/// Insolvency session with every section filled in and saved, without any persistence delay.
pub(super) fn saved_insolvency_session(reference: &MapReferenceData) -> IntakeSession {
    let mut session = IntakeSession::new(
        RequestId("req-test".to_string()),
        RequestKind::Insolvency,
        calculator(),
    );
    let engine = FieldValidationEngine::new();
    let context = context(reference);

    for mutation in insolvency_mutations() {
        let section = mutation.section();
        session.apply(mutation, &context).expect("fixture mutation applies");
        if section_complete(section, &session) {
            session
                .save_section(section, &engine, &context)
                .expect("fixture section saves");
        }
    }
    session
}

pub(super) fn section_complete(section: SectionKey, session: &IntakeSession) -> bool {
    section != SectionKey::Debts || session.document().debts.len() == 2
}

/// Mutations that fill an insolvency request, in section order. Saving is left to the caller.
pub(super) fn insolvency_mutations() -> Vec<SectionMutation> {
    vec![
        SectionMutation::ReplaceDebtor { debtor: debtor() },
        append(Collection::Facts, to_value(&fact())),
        append(
            Collection::Debts,
            to_value(&current_debt("Banco Andino", 1_000_000.0)),
        ),
        append(
            Collection::Debts,
            to_value(&overdue_debt("Cooperativa Sur", 500_000.0, 120)),
        ),
        append(Collection::Assets, to_value(&vehicle())),
        SectionMutation::ReplaceIncome { income: income() },
        SectionMutation::ReplaceProposal {
            proposal: proposal(),
        },
        SectionMutation::SetDrawnSignature {
            image: DRAWN_SIGNATURE.to_string(),
        },
    ]
}

pub(super) type TestService = IntakeService<MemoryRepository, MemoryTransport>;

pub(super) fn settings(save_delay: Duration) -> IntakeSettings {
    IntakeSettings {
        save_delay,
        ..IntakeSettings::default()
    }
}

pub(super) fn build_service_with_delay(
    save_delay: Duration,
) -> (TestService, Arc<MemoryRepository>, Arc<MemoryTransport>) {
    let repository = Arc::new(MemoryRepository::default());
    let transport = Arc::new(MemoryTransport::default());
    let service = IntakeService::new(
        repository.clone(),
        transport.clone(),
        Arc::new(reference_data()),
        Arc::new(FixedClock(today())),
        settings(save_delay),
    );
    (service, repository, transport)
}

pub(super) fn build_service() -> (TestService, Arc<MemoryRepository>, Arc<MemoryTransport>) {
    build_service_with_delay(Duration::from_millis(1))
}

/// Drive a fresh insolvency request through every section save.
pub(super) async fn complete_insolvency<R, T>(service: &IntakeService<R, T>) -> RequestId
where
    R: RequestRepository + 'static,
    T: SubmissionTransport + 'static,
{
    let session = service
        .create(RequestKind::Insolvency)
        .expect("session created");
    let id = session.id().clone();

    for mutation in insolvency_mutations() {
        let section = mutation.section();
        service.apply(&id, mutation).expect("mutation applies");
        let session = service.get(&id).expect("session exists");
        if section_complete(section, &session) {
            service
                .save_section(&id, section)
                .await
                .expect("section saves");
        }
    }
    id
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) sessions: Arc<Mutex<HashMap<RequestId, IntakeSession>>>,
}

impl RequestRepository for MemoryRepository {
    fn insert(&self, session: IntakeSession) -> Result<IntakeSession, RepositoryError> {
        let mut guard = self.sessions.lock().expect("repository mutex poisoned");
        if guard.contains_key(session.id()) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(session.id().clone(), session.clone());
        Ok(session)
    }

    fn update(&self, session: IntakeSession) -> Result<(), RepositoryError> {
        let mut guard = self.sessions.lock().expect("repository mutex poisoned");
        guard.insert(session.id().clone(), session);
        Ok(())
    }

    fn fetch(&self, id: &RequestId) -> Result<Option<IntakeSession>, RepositoryError> {
        let guard = self.sessions.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn remove(&self, id: &RequestId) -> Result<bool, RepositoryError> {
        let mut guard = self.sessions.lock().expect("repository mutex poisoned");
        Ok(guard.remove(id).is_some())
    }
}

pub(super) struct UnavailableRepository;

impl RequestRepository for UnavailableRepository {
    fn insert(&self, _session: IntakeSession) -> Result<IntakeSession, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _session: IntakeSession) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &RequestId) -> Result<Option<IntakeSession>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn remove(&self, _id: &RequestId) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Records every payload it receives, keyed by the document id it handed out.
#[derive(Default)]
pub(super) struct MemoryTransport {
    sequence: AtomicU64,
    pub(super) created: Mutex<Vec<SubmissionPayload>>,
    pub(super) updated: Mutex<Vec<(DocumentId, SubmissionPayload)>>,
}

impl MemoryTransport {
    pub(super) fn created(&self) -> Vec<SubmissionPayload> {
        self.created.lock().expect("transport mutex poisoned").clone()
    }

    pub(super) fn updated(&self) -> Vec<(DocumentId, SubmissionPayload)> {
        self.updated.lock().expect("transport mutex poisoned").clone()
    }
}

impl SubmissionTransport for MemoryTransport {
    fn create(&self, payload: &SubmissionPayload) -> Result<DocumentId, TransportError> {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        self.created
            .lock()
            .expect("transport mutex poisoned")
            .push(payload.clone());
        Ok(DocumentId(format!("doc-{id}")))
    }

    fn update(
        &self,
        document_id: &DocumentId,
        payload: &SubmissionPayload,
    ) -> Result<DocumentId, TransportError> {
        self.updated
            .lock()
            .expect("transport mutex poisoned")
            .push((document_id.clone(), payload.clone()));
        Ok(document_id.clone())
    }
}

pub(super) struct OfflineTransport;

impl SubmissionTransport for OfflineTransport {
    fn create(&self, _payload: &SubmissionPayload) -> Result<DocumentId, TransportError> {
        Err(TransportError::Unavailable("connection refused".to_string()))
    }

    fn update(
        &self,
        _document_id: &DocumentId,
        _payload: &SubmissionPayload,
    ) -> Result<DocumentId, TransportError> {
        Err(TransportError::Unavailable("connection refused".to_string()))
    }
}

pub(super) fn service_with<R, T>(repository: Arc<R>, transport: Arc<T>) -> IntakeService<R, T>
where
    R: RequestRepository + 'static,
    T: SubmissionTransport + 'static,
{
    IntakeService::new(
        repository,
        transport,
        Arc::new(reference_data()),
        Arc::new(FixedClock(today())),
        settings(Duration::from_millis(1)),
    )
}

pub(super) fn persisted_snapshot() -> Value {
    json!({
        "debtor": to_value(&debtor()),
        "facts": [to_value(&fact())],
        "debts": [
            to_value(&current_debt("Banco Andino", 1_000_000.0)),
            {
                "creditor": "Cooperativa Sur",
                "capital": 500000.0,
                "overdue": true,
                "mora": {
                    "due_date": "2025-03-17T00:00:00.000Z",
                    "elapsed_days": 3,
                    "over_90": false
                }
            }
        ],
        "income": to_value(&income()),
        "proposal": {
            "term_months": 12,
            "rates": { "monthly": 2.0 },
            "start_date": "15/07/2025",
            "pay_day": 15
        },
        "annexes": {
            "attachments": [{ "display_name": "Payslip", "file": "payslip.pdf" }],
            "signature": { "mode": "drawn", "image": DRAWN_SIGNATURE }
        }
    })
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    request_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}
