//! Integration specifications for the conciliation request workflow: multi-party editing,
//! cascading locations, attachments and hydrated edits of stored requests.

mod common {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use chrono::NaiveDate;
    use serde_json::{json, Value};

    use legal_intake::workflows::requests::{
        Contact, DocumentId, FixedClock, IdentityDocument, IntakeService, IntakeSession,
        IntakeSettings, Location, MapReferenceData, Party, PartyIdentity, PartyRole,
        ReferenceOption, RepositoryError, RequestId, RequestRepository, SubmissionPayload,
        SubmissionTransport, TransportError,
    };

    pub(super) const DRAWN_SIGNATURE: &str = "data:image/png;base64,iVBORw0KGgo=";

    fn reference_data() -> MapReferenceData {
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

    pub(super) fn applicant() -> Party {
        Party {
            role: PartyRole::Applicant,
            identity: PartyIdentity::NaturalPerson {
                first_name: "Lucía".to_string(),
                last_name: "Gómez".to_string(),
                document_type: IdentityDocument::Passport,
                document_number: "PA123456".to_string(),
                birth_date: NaiveDate::from_ymd_opt(1990, 1, 20),
            },
            contact: Contact {
                email: "lucia.gomez@example.com".to_string(),
                phone: "3001112233".to_string(),
                address: "Calle 50 # 10-20".to_string(),
                location: Location {
                    country: Some("co".to_string()),
                    region: Some("ant".to_string()),
                    city: Some("med".to_string()),
                },
            },
        }
    }

    pub(super) fn respondent() -> Value {
        json!({
            "role": "respondent",
            "identity": {
                "kind": "legal_entity",
                "business_name": "Inmobiliaria Central S.A.S.",
                "tax_id": "901234567-8",
                "legal_representative": "Marta Ruiz"
            },
            "contact": { "email": "juridica@inmocentral.example" }
        })
    }

    pub(super) fn narrative(text: &str) -> Value {
        json!({ "description": text })
    }

    #[derive(Default, Clone)]
    pub(super) struct MemoryRepository {
        sessions: Arc<Mutex<HashMap<RequestId, IntakeSession>>>,
    }

    impl RequestRepository for MemoryRepository {
        fn insert(&self, session: IntakeSession) -> Result<IntakeSession, RepositoryError> {
            let mut guard = self.sessions.lock().expect("lock");
            if guard.contains_key(session.id()) {
                return Err(RepositoryError::Conflict);
            }
            guard.insert(session.id().clone(), session.clone());
            Ok(session)
        }

        fn update(&self, session: IntakeSession) -> Result<(), RepositoryError> {
            self.sessions
                .lock()
                .expect("lock")
                .insert(session.id().clone(), session);
            Ok(())
        }

        fn fetch(&self, id: &RequestId) -> Result<Option<IntakeSession>, RepositoryError> {
            Ok(self.sessions.lock().expect("lock").get(id).cloned())
        }

        fn remove(&self, id: &RequestId) -> Result<bool, RepositoryError> {
            Ok(self.sessions.lock().expect("lock").remove(id).is_some())
        }
    }

    #[derive(Default)]
    pub(super) struct CapturingTransport {
        calls: Mutex<Vec<(Option<DocumentId>, SubmissionPayload)>>,
    }

    impl CapturingTransport {
        pub(super) fn calls(&self) -> Vec<(Option<DocumentId>, SubmissionPayload)> {
            self.calls.lock().expect("lock").clone()
        }
    }

    impl SubmissionTransport for CapturingTransport {
        fn create(&self, payload: &SubmissionPayload) -> Result<DocumentId, TransportError> {
            self.calls.lock().expect("lock").push((None, payload.clone()));
            Ok(DocumentId("conc-1".to_string()))
        }

        fn update(
            &self,
            document_id: &DocumentId,
            payload: &SubmissionPayload,
        ) -> Result<DocumentId, TransportError> {
            self.calls
                .lock()
                .expect("lock")
                .push((Some(document_id.clone()), payload.clone()));
            Ok(document_id.clone())
        }
    }

    pub(super) type Service = IntakeService<MemoryRepository, CapturingTransport>;

    pub(super) fn build_service() -> (Service, Arc<CapturingTransport>) {
        let transport = Arc::new(CapturingTransport::default());
        let service = IntakeService::new(
            Arc::new(MemoryRepository::default()),
            transport.clone(),
            Arc::new(reference_data()),
            Arc::new(FixedClock(
                NaiveDate::from_ymd_opt(2025, 6, 15).expect("valid date"),
            )),
            IntakeSettings {
                save_delay: Duration::from_millis(1),
                ..IntakeSettings::default()
            },
        );
        (service, transport)
    }
}

mod parties {
    use super::common::*;
    use legal_intake::workflows::requests::{
        Collection, LocationLevel, PartyIdentity, PartyKind, RequestKind, SectionKey,
        SectionMutation, SectionStatus,
    };

    #[tokio::test]
    async fn parties_are_edited_item_by_item() {
        let (service, _) = build_service();
        let id = service
            .create(RequestKind::Conciliation)
            .expect("created")
            .id()
            .clone();

        service
            .apply(
                &id,
                SectionMutation::AppendItem {
                    collection: Collection::Parties,
                    item: Some(serde_json::to_value(applicant()).expect("json")),
                },
            )
            .expect("applicant");
        let (_, outcome) = service
            .apply(
                &id,
                SectionMutation::AppendItem {
                    collection: Collection::Parties,
                    item: None,
                },
            )
            .expect("blank party");
        assert_eq!(outcome.item, Some(1));

        let (session, outcome) = service
            .apply(
                &id,
                SectionMutation::SetPartyKind {
                    index: Some(1),
                    kind: PartyKind::LegalEntity,
                },
            )
            .expect("kind switch");
        assert!(outcome.counterpart_updated);
        assert_eq!(
            session.document().parties.get(1).map(|party| &party.identity),
            Some(&PartyIdentity::blank(PartyKind::LegalEntity))
        );

        service
            .apply(
                &id,
                SectionMutation::ReplaceItem {
                    collection: Collection::Parties,
                    index: 1,
                    item: respondent(),
                },
            )
            .expect("respondent details");

        let (_, saved) = service
            .save_section(&id, SectionKey::Parties)
            .await
            .expect("parties save");
        assert_eq!(saved.unlocked, Some(SectionKey::Facts));
        let session = service.get(&id).expect("stored");
        assert_eq!(session.gate().status_of(SectionKey::Parties), Some(SectionStatus::Saved));
    }

    #[tokio::test]
    async fn changing_the_region_clears_a_city_outside_it() {
        let (service, _) = build_service();
        let id = service
            .create(RequestKind::Conciliation)
            .expect("created")
            .id()
            .clone();
        service
            .apply(
                &id,
                SectionMutation::AppendItem {
                    collection: Collection::Parties,
                    item: Some(serde_json::to_value(applicant()).expect("json")),
                },
            )
            .expect("applicant");

        let (session, outcome) = service
            .apply(
                &id,
                SectionMutation::SetLocation {
                    party: Some(0),
                    level: LocationLevel::Region,
                    value: Some("cun".to_string()),
                },
            )
            .expect("region change");
        assert!(outcome.counterpart_updated);
        let location = &session.document().parties.get(0).expect("party").contact.location;
        assert_eq!(location.region.as_deref(), Some("cun"));
        assert_eq!(location.city, None);

        let refused = service.apply(
            &id,
            SectionMutation::SetLocation {
                party: Some(0),
                level: LocationLevel::City,
                value: Some("med".to_string()),
            },
        );
        assert!(refused.is_err(), "Medellín is not a city of Cundinamarca");

        let (session, _) = service
            .apply(
                &id,
                SectionMutation::SetLocation {
                    party: Some(0),
                    level: LocationLevel::City,
                    value: Some("bog".to_string()),
                },
            )
            .expect("city inside the region");
        let location = &session.document().parties.get(0).expect("party").contact.location;
        assert_eq!(location.city.as_deref(), Some("bog"));
    }
}

mod submission {
    use serde_json::json;

    use super::common::*;
    use legal_intake::workflows::requests::{
        Collection, DocumentId, IntakeServiceError, ListError, RequestId, RequestKind,
        SectionKey, SectionMutation, SessionError, SubmissionAction,
    };

    async fn completed(service: &Service) -> RequestId {
        let id = service
            .create(RequestKind::Conciliation)
            .expect("created")
            .id()
            .clone();
        let steps = [
            (
                SectionKey::Parties,
                vec![
                    (Collection::Parties, serde_json::to_value(applicant()).expect("json")),
                    (Collection::Parties, respondent()),
                ],
            ),
            (
                SectionKey::Facts,
                vec![(
                    Collection::Facts,
                    narrative("The lease ended in April and the deposit was never returned."),
                )],
            ),
            (
                SectionKey::Claims,
                vec![(
                    Collection::Claims,
                    narrative("Return of the security deposit plus legal interest."),
                )],
            ),
        ];

        for (section, items) in steps {
            for (collection, item) in items {
                service
                    .apply(
                        &id,
                        SectionMutation::AppendItem {
                            collection,
                            item: Some(item),
                        },
                    )
                    .expect("item appended");
            }
            service.save_section(&id, section).await.expect("section saves");
        }
        id
    }

    #[tokio::test]
    async fn conciliation_metadata_lists_parties_and_claims() {
        let (service, transport) = build_service();
        let id = completed(&service).await;
        service
            .apply(
                &id,
                SectionMutation::SetDrawnSignature {
                    image: DRAWN_SIGNATURE.to_string(),
                },
            )
            .expect("signature");
        service
            .attach_file(&id, "lease.pdf", None, b"%PDF-1.5 lease".to_vec())
            .expect("attachment");
        service
            .save_section(&id, SectionKey::Annexes)
            .await
            .expect("annexes save");

        let receipt = service.submit(&id).expect("submitted");

        assert_eq!(receipt.action, SubmissionAction::Created);
        assert_eq!(receipt.manifest.file_fields, vec!["attachments[0]"]);
        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        let metadata = &calls[0].1.metadata;
        assert_eq!(metadata["kind"], "conciliation");
        assert_eq!(metadata["parties"].as_array().map(Vec::len), Some(2));
        assert_eq!(metadata["parties"][1]["role"], "respondent");
        assert_eq!(metadata["claims"][0]["description"], "Return of the security deposit plus legal interest.");
        assert_eq!(metadata["annexes"]["signature"]["mode"], "drawn");
        for absent in ["debtor", "debts", "assets", "income", "proposal"] {
            assert!(metadata.get(absent).is_none(), "{absent} is insolvency only");
        }
        assert!(service.get(&id).expect("stored").assessment().is_none());
    }

    #[tokio::test]
    async fn attachment_names_must_be_unique() {
        let (service, _) = build_service();
        let id = completed(&service).await;
        service
            .attach_file(&id, "Lease.pdf", None, b"1".to_vec())
            .expect("first upload");

        let error = service
            .attach_file(&id, " lease.PDF ", None, b"2".to_vec())
            .expect_err("same name");

        assert!(matches!(
            error,
            IntakeServiceError::Session(SessionError::List(ListError::DuplicateName(_)))
        ));
    }

    #[tokio::test]
    async fn stored_requests_are_reopened_for_editing() {
        let (service, transport) = build_service();
        let snapshot = json!({
            "parties": [serde_json::to_value(applicant()).expect("json"), respondent()],
            "facts": [narrative("The lease ended in April and the deposit was never returned.")],
            "claims": [narrative("Return of the security deposit plus legal interest.")],
            "annexes": {
                "attachments": [{ "display_name": "Lease", "file": "lease.pdf" }],
                "signature": { "mode": "drawn", "image": DRAWN_SIGNATURE }
            }
        });

        let session = service
            .hydrate(DocumentId("conc-9".to_string()), RequestKind::Conciliation, snapshot)
            .expect("hydrated");
        assert!(session.gate().all_saved());

        let (_, outcome) = service
            .apply(
                session.id(),
                SectionMutation::ReplaceItem {
                    collection: Collection::Claims,
                    index: 0,
                    item: narrative("Return of the deposit and the last month of rent."),
                },
            )
            .expect("saved sections stay editable");
        assert_eq!(outcome.item, Some(0));

        let receipt = service.submit(session.id()).expect("submitted");
        assert_eq!(receipt.action, SubmissionAction::Updated);
        let calls = transport.calls();
        assert_eq!(calls[0].0, Some(DocumentId("conc-9".to_string())));
        assert_eq!(
            calls[0].1.metadata["claims"][0]["description"],
            "Return of the deposit and the last month of rent."
        );
    }
}
