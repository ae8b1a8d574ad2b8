use super::common::*;
use crate::workflows::requests::blueprint::RequestBlueprint;
use crate::workflows::requests::domain::{Collection, RequestId, RequestKind, SectionKey};
use crate::workflows::requests::gate::{
    GateError, SectionGateController, SectionSaveError, SectionStatus,
};
use crate::workflows::requests::session::{IntakeSession, SectionMutation, SessionError};
use crate::workflows::requests::validation::FieldValidationEngine;

fn insolvency_gate() -> SectionGateController {
    SectionGateController::new(&RequestBlueprint::new(RequestKind::Insolvency, 2))
}

#[test]
fn new_requests_open_only_the_first_section() {
    let gate = insolvency_gate();

    assert_eq!(gate.status(0), Some(SectionStatus::Unsaved));
    for ordinal in 1..7 {
        assert_eq!(gate.status(ordinal), Some(SectionStatus::Locked));
    }
    assert_eq!(gate.active_key(), Some(SectionKey::Debtor));
    assert!(!gate.all_saved());
}

#[test]
fn commit_unlocks_the_successor_and_advances_the_pointer() {
    let mut gate = insolvency_gate();

    let outcome = gate.commit(0).expect("first section commits");

    assert!(outcome.newly_saved);
    assert_eq!(outcome.unlocked, Some(SectionKey::Facts));
    assert_eq!(gate.status(0), Some(SectionStatus::Saved));
    assert_eq!(gate.status(1), Some(SectionStatus::Unsaved));
    assert_eq!(gate.status(2), Some(SectionStatus::Locked));
    assert_eq!(gate.active(), 1);
}

#[test]
fn resaving_a_saved_section_changes_nothing() {
    let mut gate = insolvency_gate();
    gate.commit(0).expect("first save");
    gate.commit(1).expect("second save");
    gate.select(0).expect("saved sections stay selectable");

    let outcome = gate.commit(0).expect("re-save");

    assert!(!outcome.newly_saved);
    assert_eq!(outcome.unlocked, None);
    assert_eq!(gate.active(), 0, "pointer stays on the re-saved section");
    assert_eq!(gate.status(1), Some(SectionStatus::Saved));
    assert_eq!(gate.status(2), Some(SectionStatus::Unsaved));
}

#[test]
fn locked_sections_cannot_be_selected_or_committed() {
    let mut gate = insolvency_gate();

    assert_eq!(gate.select(3), Err(GateError::Locked(SectionKey::Assets)));
    assert_eq!(gate.commit(3), Err(GateError::Locked(SectionKey::Assets)));
    assert_eq!(gate.select(42), Err(GateError::OutOfRange(42)));
    assert_eq!(gate.active(), 0);
}

#[test]
fn unlocked_sections_always_form_a_prefix() {
    let mut gate = insolvency_gate();

    for ordinal in 0..7 {
        gate.commit(ordinal).expect("sequential saves succeed");
        let statuses: Vec<_> = (0..7).filter_map(|index| gate.status(index)).collect();
        let first_locked = statuses
            .iter()
            .position(|status| *status == SectionStatus::Locked)
            .unwrap_or(statuses.len());
        assert!(statuses[first_locked..]
            .iter()
            .all(|status| *status == SectionStatus::Locked));
        assert!(statuses[..ordinal + 1]
            .iter()
            .all(|status| *status == SectionStatus::Saved));
    }

    assert!(gate.all_saved());
    assert_eq!(gate.active(), 6, "pointer stays on the last section");
}

#[test]
fn hydrated_gates_start_fully_saved() {
    let gate = SectionGateController::hydrated(&RequestBlueprint::new(RequestKind::Conciliation, 2));

    assert!(gate.all_saved());
    assert_eq!(gate.active_key(), Some(SectionKey::Parties));
    assert_eq!(gate.ordinal_of(SectionKey::Debts), Err(GateError::UnknownSection(SectionKey::Debts)));
}

#[test]
fn failed_save_leaves_every_state_untouched() {
    let reference = reference_data();
    let context = context(&reference);
    let engine = FieldValidationEngine::new();
    let mut session = IntakeSession::new(
        RequestId("req-gate".to_string()),
        RequestKind::Insolvency,
        calculator(),
    );

    let error = session
        .save_section(SectionKey::Debtor, &engine, &context)
        .expect_err("blank debtor is invalid");

    match error {
        SectionSaveError::Invalid { banner, report } => {
            assert!(banner.starts_with("Debtor: "));
            assert!(report.error_for("debtor.identity.first_name").is_some());
        }
        other => panic!("expected invalid section, got {other:?}"),
    }
    assert_eq!(session.gate().status(0), Some(SectionStatus::Unsaved));
    assert_eq!(session.gate().status(1), Some(SectionStatus::Locked));
    assert!(session.report(SectionKey::Debtor).is_some(), "report kept for inline display");
}

#[test]
fn editing_a_locked_section_is_refused() {
    let reference = reference_data();
    let context = context(&reference);
    let mut session = IntakeSession::new(
        RequestId("req-locked".to_string()),
        RequestKind::Insolvency,
        calculator(),
    );

    let error = session
        .apply(
            SectionMutation::AppendItem {
                collection: Collection::Debts,
                item: None,
            },
            &context,
        )
        .expect_err("debts are locked");

    assert!(matches!(
        error,
        SessionError::Gate(GateError::Locked(SectionKey::Debts))
    ));
    assert!(session.document().debts.is_empty());
}

#[test]
fn editing_a_saved_section_keeps_it_saved() {
    let reference = reference_data();
    let context = context(&reference);
    let mut session = saved_insolvency_session(&reference);
    assert!(session.gate().all_saved());

    let mut debtor = debtor();
    debtor.contact.phone = String::new();
    session
        .apply(SectionMutation::ReplaceDebtor { debtor }, &context)
        .expect("saved sections stay editable");

    assert_eq!(
        session.gate().status_of(SectionKey::Debtor),
        Some(SectionStatus::Saved)
    );
}

#[test]
fn conciliation_sections_follow_their_own_order() {
    let blueprint = RequestBlueprint::new(RequestKind::Conciliation, 2);
    let keys: Vec<_> = blueprint.keys().collect();

    assert_eq!(
        keys,
        vec![
            SectionKey::Parties,
            SectionKey::Facts,
            SectionKey::Claims,
            SectionKey::Annexes
        ]
    );
    assert_eq!(blueprint.ordinal_of(SectionKey::Claims), Some(2));
    assert!(blueprint.spec_for(SectionKey::Income).is_none());
}
