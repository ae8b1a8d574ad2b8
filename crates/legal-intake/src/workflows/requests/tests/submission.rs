use super::common::*;
use crate::workflows::requests::blueprint::RequestBlueprint;
use crate::workflows::requests::domain::{
    Attachment, FileHandle, FormDocument, RequestKind, SignatureCapture,
};
use crate::workflows::requests::lists::ItemList;
use crate::workflows::requests::submission::SubmissionAssembler;

fn pdf(name: &str, bytes: &[u8]) -> Attachment {
    Attachment {
        display_name: name.to_string(),
        file: Some(FileHandle::new(
            format!("{}.pdf", name.to_lowercase().replace(' ', "-")),
            "application/pdf",
            bytes.to_vec(),
        )),
    }
}

#[test]
fn metadata_holds_every_section_and_files_travel_separately() {
    let reference = reference_data();
    let mut session = saved_insolvency_session(&reference);
    session
        .attach_file("Payslip", FileHandle::new("payslip.pdf", "application/pdf", b"%PDF-1".to_vec()))
        .expect("attachment stored");
    session
        .upload_signature(FileHandle::new("signature.png", "image/png", b"\x89PNG".to_vec()))
        .expect("signature stored");

    let payload = SubmissionAssembler::new()
        .assemble(&session.document().finalize(), session.blueprint())
        .expect("payload assembles");

    let metadata = payload.metadata.as_object().expect("metadata object");
    for key in [
        "kind", "debtor", "facts", "debts", "assets", "income", "proposal", "annexes",
    ] {
        assert!(metadata.contains_key(key), "missing {key}");
    }
    assert!(!metadata.contains_key("parties"));
    assert_eq!(payload.metadata["kind"], "insolvency");
    assert_eq!(
        payload.metadata["annexes"]["attachments"][0]["file"],
        "payslip.pdf",
        "metadata carries the file name only"
    );
    assert_eq!(payload.metadata["annexes"]["signature"]["file"], "signature.png");

    let manifest = payload.manifest();
    assert_eq!(manifest.file_fields, vec!["attachments[0]", "signature"]);
    assert_eq!(manifest.total_bytes, 10);
}

#[test]
fn drawn_signatures_and_empty_files_are_not_sent_as_parts() {
    let mut document = FormDocument::new(RequestKind::Conciliation);
    document.parties = ItemList::from(vec![debtor(), respondent()]);
    document.annexes.attachments = ItemList::from(vec![
        pdf("Agreement draft", b""),
        pdf("Power of attorney", b"%PDF-1.7"),
    ]);
    document.annexes.signature = Some(SignatureCapture::Drawn {
        image: DRAWN_SIGNATURE.to_string(),
    });
    let blueprint = RequestBlueprint::new(RequestKind::Conciliation, 2);

    let payload = SubmissionAssembler::new()
        .assemble(&document.finalize(), &blueprint)
        .expect("payload assembles");

    assert_eq!(payload.files.len(), 1);
    assert_eq!(payload.files[0].field_name, "attachments[1]");
    assert_eq!(payload.metadata["annexes"]["signature"]["image"], DRAWN_SIGNATURE);
    assert_eq!(payload.metadata["parties"][1]["identity"]["kind"], "legal_entity");
    assert!(payload.metadata.get("debts").is_none());
}

#[test]
fn finalized_documents_are_detached_from_later_edits() {
    let mut document = FormDocument::new(RequestKind::Conciliation);
    document.facts = ItemList::from(vec![fact()]);

    let finalized = document.finalize();
    document.facts = ItemList::default();

    assert_eq!(finalized.facts.len(), 1);
}
