//! Stage dispatch table and per-stage completion rules
//!
//! Every stage goes through the same pipeline: merge the payload over the
//! stored sub-document, deserialize into the typed stage, derive `completed`
//! (and date stamps), and hand back a [`StageRecord`] for the store.

use super::error::{TrackerError, TrackerResult};
use super::models::*;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// The eight stages of a visa tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StageKind {
    Agreement,
    Meeting,
    DocumentCollection,
    VisaApplication,
    SupportingDocuments,
    Payment,
    Appointment,
    VisaOutcome,
}

/// Where uploaded files land in a stage payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileTarget {
    /// Single file, reference stored in this field
    Field(&'static str),
    /// Positional files: file `i` goes to `documents[i].fileUrl`, and the
    /// named date field on that document is stamped
    PerDocument { stamp: &'static str },
}

/// Multipart part name and its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileBinding {
    pub part: &'static str,
    pub target: FileTarget,
}

/// Static description of a stage
#[derive(Debug)]
pub struct StageSpec {
    pub kind: StageKind,
    /// Field name on the tracker document
    pub field: &'static str,
    /// URL path segment
    pub slug: &'static str,
    pub aliases: &'static [&'static str],
    /// Fields replaced wholesale on merge
    pub array_fields: &'static [&'static str],
    pub file: Option<FileBinding>,
    pub counts_toward_progress: bool,
}

static STAGES: [StageSpec; 8] = [
    StageSpec {
        kind: StageKind::Agreement,
        field: "agreement",
        slug: "agreement",
        aliases: &[],
        array_fields: &[],
        file: Some(FileBinding {
            part: "document",
            target: FileTarget::Field("documentUrl"),
        }),
        counts_toward_progress: true,
    },
    StageSpec {
        kind: StageKind::Meeting,
        field: "meeting",
        slug: "meeting",
        aliases: &[],
        array_fields: &["followUpActions"],
        file: None,
        counts_toward_progress: true,
    },
    StageSpec {
        kind: StageKind::DocumentCollection,
        field: "documentCollection",
        slug: "documents",
        aliases: &["document-collection"],
        array_fields: &["documents"],
        file: Some(FileBinding {
            part: "documents",
            target: FileTarget::PerDocument {
                stamp: "uploadDate",
            },
        }),
        counts_toward_progress: true,
    },
    StageSpec {
        kind: StageKind::VisaApplication,
        field: "visaApplication",
        slug: "application",
        aliases: &["visa-application"],
        array_fields: &[],
        file: Some(FileBinding {
            part: "formFile",
            target: FileTarget::Field("formFileUrl"),
        }),
        counts_toward_progress: true,
    },
    StageSpec {
        kind: StageKind::SupportingDocuments,
        field: "supportingDocuments",
        slug: "supporting-docs",
        aliases: &["supporting-documents"],
        array_fields: &["documents"],
        file: Some(FileBinding {
            part: "documents",
            target: FileTarget::PerDocument {
                stamp: "preparationDate",
            },
        }),
        counts_toward_progress: true,
    },
    StageSpec {
        kind: StageKind::Payment,
        field: "payment",
        slug: "payment",
        aliases: &[],
        array_fields: &[],
        file: None,
        counts_toward_progress: true,
    },
    StageSpec {
        kind: StageKind::Appointment,
        field: "appointment",
        slug: "appointment",
        aliases: &[],
        array_fields: &[],
        file: None,
        counts_toward_progress: true,
    },
    // The outcome is recorded but never counted: progress is over 7 steps.
    StageSpec {
        kind: StageKind::VisaOutcome,
        field: "visaOutcome",
        slug: "outcome",
        aliases: &["visa-outcome"],
        array_fields: &[],
        file: None,
        counts_toward_progress: false,
    },
];

impl StageKind {
    pub const ALL: [StageKind; 8] = [
        StageKind::Agreement,
        StageKind::Meeting,
        StageKind::DocumentCollection,
        StageKind::VisaApplication,
        StageKind::SupportingDocuments,
        StageKind::Payment,
        StageKind::Appointment,
        StageKind::VisaOutcome,
    ];

    pub fn spec(self) -> &'static StageSpec {
        // STAGES is declared in the same order as the enum
        &STAGES[self as usize]
    }

    pub fn field(self) -> &'static str {
        self.spec().field
    }

    pub fn slug(self) -> &'static str {
        self.spec().slug
    }

    pub fn counts_toward_progress(self) -> bool {
        self.spec().counts_toward_progress
    }

    /// Resolve a path segment: slug, alias, or the tracker field name
    pub fn from_slug(raw: &str) -> Option<Self> {
        STAGES
            .iter()
            .find(|s| s.slug == raw || s.field == raw || s.aliases.contains(&raw))
            .map(|s| s.kind)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

impl FromStr for StageKind {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_slug(s).ok_or_else(|| {
            let known: Vec<&str> = STAGES.iter().map(|s| s.slug).collect();
            TrackerError::Validation(format!(
                "unknown stage '{}' (expected one of: {})",
                s,
                known.join(", ")
            ))
        })
    }
}

// ============================================================================
// Completion rules
// ============================================================================

/// Behaviour shared by the typed stage sub-documents
pub trait Stage: Serialize + DeserializeOwned + Default {
    /// Set `completed` from the stage's own status and stamp dates
    fn derive(&mut self, now: DateTime<Utc>);

    fn into_record(self) -> StageRecord;
}

impl Stage for AgreementStage {
    fn derive(&mut self, _now: DateTime<Utc>) {
        self.completed = self.status == Some(AgreementStatus::Signed);
    }

    fn into_record(self) -> StageRecord {
        StageRecord::Agreement(self)
    }
}

impl Stage for MeetingStage {
    fn derive(&mut self, now: DateTime<Utc>) {
        self.completed = self.scheduled_date.is_some_and(|at| at < now);
    }

    fn into_record(self) -> StageRecord {
        StageRecord::Meeting(self)
    }
}

impl Stage for DocumentCollectionStage {
    fn derive(&mut self, _now: DateTime<Utc>) {
        // An empty document list is vacuously verified.
        self.completed = self.collection_status == Some(CollectionStatus::Completed)
            && self
                .documents
                .iter()
                .all(|d| d.verification_status == Some(VerificationStatus::Verified));
    }

    fn into_record(self) -> StageRecord {
        StageRecord::DocumentCollection(self)
    }
}

impl Stage for VisaApplicationStage {
    fn derive(&mut self, now: DateTime<Utc>) {
        self.completed = self.status == Some(ApplicationStatus::Submitted);
        if self.completed && self.submission_date.is_none() {
            self.submission_date = Some(now);
        }
    }

    fn into_record(self) -> StageRecord {
        StageRecord::VisaApplication(self)
    }
}

impl Stage for SupportingDocumentsStage {
    fn derive(&mut self, _now: DateTime<Utc>) {
        self.completed = self.preparation_status == Some(CollectionStatus::Completed)
            && !self.documents.is_empty();
    }

    fn into_record(self) -> StageRecord {
        StageRecord::SupportingDocuments(self)
    }
}

impl Stage for PaymentStage {
    fn derive(&mut self, now: DateTime<Utc>) {
        self.completed = self.status == Some(PaymentStatus::Received);
        if self.completed && self.payment_date.is_none() {
            self.payment_date = Some(now);
        }
    }

    fn into_record(self) -> StageRecord {
        StageRecord::Payment(self)
    }
}

impl Stage for AppointmentStage {
    fn derive(&mut self, _now: DateTime<Utc>) {
        self.completed = self.status == Some(AppointmentStatus::Attended);
    }

    fn into_record(self) -> StageRecord {
        StageRecord::Appointment(self)
    }
}

impl Stage for VisaOutcomeStage {
    fn derive(&mut self, now: DateTime<Utc>) {
        self.completed = matches!(
            self.status,
            Some(OutcomeStatus::Approved) | Some(OutcomeStatus::Rejected)
        );
        if self.completed && self.decision_date.is_none() {
            self.decision_date = Some(now);
        }
    }

    fn into_record(self) -> StageRecord {
        StageRecord::VisaOutcome(self)
    }
}

fn finalize_as<S: Stage>(
    kind: StageKind,
    merged: Map<String, Value>,
    now: DateTime<Utc>,
) -> TrackerResult<StageRecord> {
    let mut stage: S = serde_json::from_value(Value::Object(merged))
        .map_err(|e| TrackerError::Validation(format!("invalid {} data: {}", kind, e)))?;
    stage.derive(now);
    Ok(stage.into_record())
}

/// Type-check a merged payload and derive completion for `kind`
pub fn finalize(
    kind: StageKind,
    merged: Map<String, Value>,
    now: DateTime<Utc>,
) -> TrackerResult<StageRecord> {
    match kind {
        StageKind::Agreement => finalize_as::<AgreementStage>(kind, merged, now),
        StageKind::Meeting => finalize_as::<MeetingStage>(kind, merged, now),
        StageKind::DocumentCollection => {
            finalize_as::<DocumentCollectionStage>(kind, merged, now)
        }
        StageKind::VisaApplication => finalize_as::<VisaApplicationStage>(kind, merged, now),
        StageKind::SupportingDocuments => {
            finalize_as::<SupportingDocumentsStage>(kind, merged, now)
        }
        StageKind::Payment => finalize_as::<PaymentStage>(kind, merged, now),
        StageKind::Appointment => finalize_as::<AppointmentStage>(kind, merged, now),
        StageKind::VisaOutcome => finalize_as::<VisaOutcomeStage>(kind, merged, now),
    }
}

// ============================================================================
// Merge and file splicing
// ============================================================================

/// Shallow-merge `payload` over the stored stage object.
///
/// Scalars and nested objects overwrite; array fields are replaced wholesale
/// and must be arrays (or null, which clears them). `completed` is derived,
/// so a client-supplied value is dropped.
pub fn merge(
    kind: StageKind,
    existing: Option<Map<String, Value>>,
    payload: Map<String, Value>,
) -> TrackerResult<Map<String, Value>> {
    let spec = kind.spec();
    let mut merged = existing.unwrap_or_default();
    merged.remove("completed");

    for (key, value) in payload {
        if key == "completed" {
            continue;
        }
        if spec.array_fields.contains(&key.as_str()) {
            match value {
                Value::Array(_) => {
                    merged.insert(key, value);
                }
                Value::Null => {
                    merged.remove(&key);
                }
                _ => {
                    return Err(TrackerError::Validation(format!(
                        "{}.{} must be an array",
                        kind, key
                    )))
                }
            }
            continue;
        }
        merged.insert(key, value);
    }
    Ok(merged)
}

/// Check that the uploaded file count fits the stage's binding
pub fn check_file_count(
    kind: StageKind,
    payload: &Map<String, Value>,
    count: usize,
) -> TrackerResult<()> {
    if count == 0 {
        return Ok(());
    }
    let Some(binding) = kind.spec().file else {
        return Err(TrackerError::Validation(format!(
            "{} does not accept file uploads",
            kind
        )));
    };
    match binding.target {
        FileTarget::Field(_) if count > 1 => Err(TrackerError::Validation(format!(
            "{} accepts a single '{}' file",
            kind, binding.part
        ))),
        FileTarget::Field(_) => Ok(()),
        FileTarget::PerDocument { .. } => {
            let documents = payload
                .get("documents")
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0);
            if count > documents {
                return Err(TrackerError::Validation(format!(
                    "{} files uploaded for {} documents; each file needs a matching documents[] entry",
                    count, documents
                )));
            }
            Ok(())
        }
    }
}

/// Write blob references into the payload. Call `check_file_count` first.
pub fn splice_files(
    kind: StageKind,
    payload: &mut Map<String, Value>,
    refs: &[String],
    now: DateTime<Utc>,
) {
    let Some(binding) = kind.spec().file else {
        return;
    };
    match binding.target {
        FileTarget::Field(field) => {
            if let Some(reference) = refs.first() {
                payload.insert(field.to_string(), Value::String(reference.clone()));
            }
        }
        FileTarget::PerDocument { stamp } => {
            let Some(Value::Array(documents)) = payload.get_mut("documents") else {
                return;
            };
            for (doc, reference) in documents.iter_mut().zip(refs) {
                if let Value::Object(doc) = doc {
                    doc.insert("fileUrl".to_string(), Value::String(reference.clone()));
                    doc.insert(stamp.to_string(), Value::String(now.to_rfc3339()));
                }
            }
        }
    }
}

/// Fill agreement `type` / `status` when neither the payload nor the stored
/// stage set them
pub fn apply_agreement_defaults(merged: &mut Map<String, Value>) {
    let missing = |m: &Map<String, Value>, k: &str| m.get(k).is_none_or(Value::is_null);
    if missing(merged, "type") {
        merged.insert("type".into(), Value::String("Standard".into()));
    }
    if missing(merged, "status") {
        merged.insert("status".into(), Value::String("DRAFT".into()));
    }
}

impl AgreementStage {
    /// Initial agreement of a lazily created tracker
    pub fn draft() -> Self {
        Self {
            agreement_type: Some(AgreementType::Standard),
            status: Some(AgreementStatus::Draft),
            ..Default::default()
        }
    }
}
