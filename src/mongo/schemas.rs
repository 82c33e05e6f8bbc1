//! MongoDB document schemas
//!
//! Field names follow the existing CRM collections (camelCase, ObjectId
//! references). Conversion into the tracker models turns ids into hex strings.

use crate::tracker::{
    AgreementRecord, AgreementStage, AppointmentStage, BranchRecord, BranchSeed, ClientRecord,
    DocumentCollectionStage, MeetingStage, OverallStatus, PaymentStage, Progress,
    SupportingDocumentsStage, VisaApplicationStage, VisaOutcomeStage, VisaTracker,
};
use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

pub const CLIENT_COLLECTION: &str = "clients";
pub const BRANCH_COLLECTION: &str = "branches";
pub const TRACKER_COLLECTION: &str = "visatrackers";
pub const AGREEMENT_COLLECTION: &str = "visaagreements";

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

// ============================================================================
// Clients
// ============================================================================

/// The fields of a CRM client the tracker reads
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ClientDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<ObjectId>,
}

impl From<ClientDoc> for ClientRecord {
    fn from(doc: ClientDoc) -> Self {
        Self {
            id: doc.id.to_hex(),
            first_name: doc.first_name,
            last_name: doc.last_name,
            email: doc.email,
            phone: doc.phone,
            branch_id: doc.branch_id.map(|id| id.to_hex()),
        }
    }
}

// ============================================================================
// Branches
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct BranchHeadDoc {
    pub name: String,
    pub contact_no: String,
    pub email: String,
    pub gender: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BranchDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub branch_name: String,
    #[serde(default)]
    pub branch_location: String,
    /// Human-readable branch code, unique
    #[serde(default)]
    pub branch_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub contact_no: String,
    #[serde(default)]
    pub head: BranchHeadDoc,
}

impl BranchDoc {
    pub fn from_seed(seed: &BranchSeed) -> Self {
        Self {
            id: None,
            branch_name: seed.branch_name.clone(),
            branch_location: seed.branch_location.clone(),
            branch_id: seed.code.clone(),
            email: seed.email.clone(),
            contact_no: seed.contact_no.clone(),
            head: BranchHeadDoc {
                name: seed.head.name.clone(),
                contact_no: seed.head.contact_no.clone(),
                email: seed.head.email.clone(),
                gender: seed.head.gender.clone(),
            },
        }
    }

    pub fn into_record(self) -> BranchRecord {
        BranchRecord {
            id: self.id.map(|id| id.to_hex()).unwrap_or_default(),
            branch_name: self.branch_name,
            branch_location: self.branch_location,
        }
    }
}

impl IntoIndexes for BranchDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "branchId": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("branchId_unique".to_string())
                    .build(),
            ),
        )]
    }
}

// ============================================================================
// Visa trackers
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TrackerDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub client_id: ObjectId,
    pub branch_id: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agreement: Option<AgreementStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting: Option<MeetingStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_collection: Option<DocumentCollectionStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visa_application: Option<VisaApplicationStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supporting_documents: Option<SupportingDocumentsStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment: Option<AppointmentStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visa_outcome: Option<VisaOutcomeStage>,
    #[serde(default)]
    pub overall_status: OverallStatus,
    #[serde(default)]
    pub progress: Progress,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl From<TrackerDoc> for VisaTracker {
    fn from(doc: TrackerDoc) -> Self {
        Self {
            id: doc.id.map(|id| id.to_hex()).unwrap_or_default(),
            client_id: doc.client_id.to_hex(),
            branch_id: doc.branch_id.to_hex(),
            agreement: doc.agreement,
            meeting: doc.meeting,
            document_collection: doc.document_collection,
            visa_application: doc.visa_application,
            supporting_documents: doc.supporting_documents,
            payment: doc.payment,
            appointment: doc.appointment,
            visa_outcome: doc.visa_outcome,
            overall_status: doc.overall_status,
            progress: doc.progress,
            created_at: doc.created_at.to_chrono(),
            updated_at: doc.updated_at.to_chrono(),
        }
    }
}

impl IntoIndexes for TrackerDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // At most one tracker per client
            (
                doc! { "clientId": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("clientId_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "branchId": 1, "createdAt": -1 },
                Some(
                    IndexOptions::builder()
                        .name("branchId_createdAt".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

// ============================================================================
// Agreement shadow
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VisaAgreementDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub client_id: ObjectId,
    pub branch_id: ObjectId,
    #[serde(default)]
    pub agreement: AgreementStage,
    pub updated_at: DateTime,
}

impl From<VisaAgreementDoc> for AgreementRecord {
    fn from(doc: VisaAgreementDoc) -> Self {
        Self {
            client_id: doc.client_id.to_hex(),
            branch_id: doc.branch_id.to_hex(),
            agreement: doc.agreement,
        }
    }
}

impl IntoIndexes for VisaAgreementDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "clientId": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("clientId_unique".to_string())
                    .build(),
            ),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{AgreementStatus, AgreementType};

    #[test]
    fn test_tracker_doc_bson_field_names() {
        let now = DateTime::now();
        let doc = TrackerDoc {
            id: None,
            client_id: ObjectId::new(),
            branch_id: ObjectId::new(),
            agreement: Some(AgreementStage {
                agreement_type: Some(AgreementType::Standard),
                status: Some(AgreementStatus::Draft),
                ..Default::default()
            }),
            meeting: None,
            document_collection: None,
            visa_application: None,
            supporting_documents: None,
            payment: None,
            appointment: None,
            visa_outcome: None,
            overall_status: OverallStatus::NotStarted,
            progress: Progress::initial(),
            created_at: now,
            updated_at: now,
        };
        let bson = bson::to_document(&doc).unwrap();
        assert!(bson.get("_id").is_none());
        assert!(bson.get_object_id("clientId").is_ok());
        assert_eq!(bson.get_str("overallStatus").unwrap(), "NOT_STARTED");
        let agreement = bson.get_document("agreement").unwrap();
        assert_eq!(agreement.get_str("type").unwrap(), "Standard");
        assert!(!agreement.get_bool("completed").unwrap());
        assert!(bson.get("meeting").is_none());
    }

    #[test]
    fn test_tracker_doc_into_model() {
        let client_id = ObjectId::new();
        let raw = doc! {
            "_id": ObjectId::new(),
            "clientId": client_id,
            "branchId": ObjectId::new(),
            "payment": { "status": "RECEIVED", "paymentDate": "2025-02-01T10:00:00Z", "completed": true },
            "overallStatus": "IN_PROGRESS",
            "progress": { "completedSteps": 1, "totalSteps": 7, "percentage": 14 },
            "createdAt": DateTime::now(),
            "updatedAt": DateTime::now(),
        };
        let doc: TrackerDoc = bson::from_document(raw).unwrap();
        let tracker: VisaTracker = doc.into();
        assert_eq!(tracker.client_id, client_id.to_hex());
        assert_eq!(tracker.progress.percentage, 14);
        assert!(tracker.payment.unwrap().completed);
    }

    #[test]
    fn test_tracker_doc_reads_bson_stage_dates() {
        let paid = DateTime::from_millis(1_738_404_000_000);
        let uploaded = DateTime::from_millis(1_738_000_000_000);
        let raw = doc! {
            "_id": ObjectId::new(),
            "clientId": ObjectId::new(),
            "branchId": ObjectId::new(),
            "agreement": { "type": "Standard", "status": "SENT", "sentDate": paid, "completed": false },
            "documentCollection": {
                "documents": [
                    { "type": "PASSPORT", "verificationStatus": "VERIFIED", "uploadDate": uploaded },
                ],
                "collectionStatus": "COMPLETED",
                "completed": true,
            },
            "payment": { "status": "RECEIVED", "paymentDate": paid, "completed": true },
            "overallStatus": "IN_PROGRESS",
            "progress": { "completedSteps": 2, "totalSteps": 7, "percentage": 29 },
            "createdAt": DateTime::now(),
            "updatedAt": DateTime::now(),
        };
        let tracker: VisaTracker = bson::from_document::<TrackerDoc>(raw).unwrap().into();
        assert_eq!(
            tracker.payment.unwrap().payment_date,
            Some(paid.to_chrono())
        );
        assert_eq!(
            tracker.agreement.unwrap().sent_date,
            Some(paid.to_chrono())
        );
        assert_eq!(
            tracker.document_collection.unwrap().documents[0].upload_date,
            Some(uploaded.to_chrono())
        );
    }

    #[test]
    fn test_client_doc_tolerates_missing_branch() {
        let raw = doc! {
            "_id": ObjectId::new(),
            "firstName": "Asha",
            "lastName": "Verma",
            "email": "asha@example.com",
            "passportNumber": "X1234567",
        };
        let client: ClientRecord = bson::from_document::<ClientDoc>(raw).unwrap().into();
        assert!(client.branch_id.is_none());
        assert!(client.phone.is_none());
    }

    #[test]
    fn test_branch_seed_maps_code_to_branch_id() {
        let seed: BranchSeed = serde_yaml::from_str(
            r#"
branch_name: Indore Branch
branch_location: Indore
code: IND001
email: indore@example.com
contact_no: "0000000000"
head:
  name: Branch Head
  contact_no: "0000000000"
  email: head@example.com
  gender: Other
"#,
        )
        .unwrap();
        let doc = BranchDoc::from_seed(&seed);
        assert_eq!(doc.branch_id, "IND001");
        let bson = bson::to_document(&doc).unwrap();
        assert_eq!(bson.get_str("branchName").unwrap(), "Indore Branch");
        assert_eq!(
            bson.get_document("head").unwrap().get_str("contactNo").unwrap(),
            "0000000000"
        );
    }

    #[test]
    fn test_unique_client_index() {
        let indices = TrackerDoc::into_indices();
        let (keys, opts) = &indices[0];
        assert_eq!(keys, &doc! { "clientId": 1 });
        assert_eq!(opts.as_ref().and_then(|o| o.unique), Some(true));
    }
}
