use serde::Serialize;
use serde_json::{Map, Value};

use super::blueprint::RequestBlueprint;
use super::domain::{FileHandle, FinalizedDocument, SectionKey, SignatureCapture};

/// Binary part handed to the transport next to the metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFile {
    pub field_name: String,
    pub file: FileHandle,
}

/// Everything the transport needs to persist one request.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionPayload {
    pub metadata: Value,
    pub files: Vec<OutboundFile>,
}

impl SubmissionPayload {
    pub fn manifest(&self) -> SubmissionManifest {
        SubmissionManifest {
            file_fields: self
                .files
                .iter()
                .map(|file| file.field_name.clone())
                .collect(),
            total_bytes: self.files.iter().map(|file| file.file.size()).sum(),
        }
    }
}

/// Lightweight description of the outbound files, for logs and API receipts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionManifest {
    pub file_fields: Vec<String>,
    pub total_bytes: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("failed to serialize section '{section}': {source}")]
    Serialization {
        section: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Splits a finalized document into structured metadata and binary parts. File handles
/// serialize as their file name, so metadata never carries raw bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmissionAssembler;

impl SubmissionAssembler {
    pub fn new() -> Self {
        Self
    }

    pub fn assemble(
        &self,
        document: &FinalizedDocument,
        blueprint: &RequestBlueprint,
    ) -> Result<SubmissionPayload, AssemblyError> {
        let mut metadata = Map::new();
        metadata.insert(
            "kind".to_string(),
            serde_json::to_value(document.kind).map_err(|source| AssemblyError::Serialization {
                section: "kind",
                source,
            })?,
        );

        for key in blueprint.keys() {
            let value = document
                .section_value(key)
                .map_err(|source| AssemblyError::Serialization {
                    section: key.as_str(),
                    source,
                })?;
            metadata.insert(key.as_str().to_string(), value);
        }

        let mut files = Vec::new();
        if blueprint.ordinal_of(SectionKey::Annexes).is_some() {
            for (index, attachment) in document.annexes.attachments.iter().enumerate() {
                if let Some(file) = attachment.file.as_ref().filter(|file| file.has_content()) {
                    files.push(OutboundFile {
                        field_name: format!("attachments[{index}]"),
                        file: file.clone(),
                    });
                }
            }

            // Drawn signatures already live in the metadata as an embedded image.
            if let Some(SignatureCapture::Uploaded { file }) = &document.annexes.signature {
                if file.has_content() {
                    files.push(OutboundFile {
                        field_name: "signature".to_string(),
                        file: file.clone(),
                    });
                }
            }
        }

        Ok(SubmissionPayload {
            metadata: Value::Object(metadata),
            files,
        })
    }
}
