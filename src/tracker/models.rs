//! Visa tracker models and DTOs

use super::dates;
use super::stages::StageKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Aggregate status
// ============================================================================

/// Overall status of a client's visa journey
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    OnHold,
}

impl OverallStatus {
    /// Wire/storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::NotStarted => "NOT_STARTED",
            OverallStatus::InProgress => "IN_PROGRESS",
            OverallStatus::Completed => "COMPLETED",
            OverallStatus::OnHold => "ON_HOLD",
        }
    }
}

/// Derived progress summary
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub completed_steps: u32,
    pub total_steps: u32,
    /// 0-100
    pub percentage: u32,
}

impl Default for Progress {
    fn default() -> Self {
        Self::initial()
    }
}

// ============================================================================
// Stage 1: agreement
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AgreementType {
    Standard,
    Premium,
    Custom,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgreementStatus {
    Draft,
    Sent,
    Signed,
    Rejected,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgreementStage {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub agreement_type: Option<AgreementType>,
    #[serde(
        default,
        deserialize_with = "dates::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub sent_date: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "dates::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_signature_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AgreementStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Blob reference of the signed/sent agreement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_url: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

// ============================================================================
// Stage 2: meeting
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeetingType {
    Initial,
    DocumentReview,
    FinalReview,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeetingLocation {
    Office,
    Virtual,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MeetingStage {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub meeting_type: Option<MeetingType>,
    #[serde(
        default,
        deserialize_with = "dates::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub scheduled_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<MeetingLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub follow_up_actions: Vec<String>,
    #[serde(default)]
    pub completed: bool,
}

// ============================================================================
// Stage 3: document collection
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectedDocumentType {
    Passport,
    BankStatement,
    InvitationLetter,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
}

/// PENDING / COMPLETED marker shared by the two document stages
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectedDocument {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<CollectedDocumentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_status: Option<VerificationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(
        default,
        deserialize_with = "dates::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub upload_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentCollectionStage {
    #[serde(default)]
    pub documents: Vec<CollectedDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_status: Option<CollectionStatus>,
    #[serde(default)]
    pub completed: bool,
}

// ============================================================================
// Stage 4: visa application
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisaCategory {
    Tourist,
    Student,
    Work,
    Business,
    Medical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    NotStarted,
    InProgress,
    Submitted,
    UnderReview,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VisaApplicationStage {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub visa_type: Option<VisaCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_file_url: Option<String>,
    #[serde(
        default,
        deserialize_with = "dates::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub submission_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ApplicationStatus>,
    #[serde(default)]
    pub completed: bool,
}

// ============================================================================
// Stage 5: supporting documents
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupportingDocumentType {
    FlightItinerary,
    HotelBooking,
    InvitationLetter,
    Other,
}

/// Reservation details attached to itineraries and hotel bookings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hotel_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "dates::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub check_in_date: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "dates::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub check_out_date: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "dates::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub cancellation_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_passenger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_card: Option<String>,
    #[serde(
        default,
        deserialize_with = "dates::deserialize_opt_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount: Option<f64>,
    #[serde(
        default,
        deserialize_with = "dates::deserialize_opt_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub cancellation_charges: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SupportingDocument {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<SupportingDocumentType>,
    #[serde(
        default,
        deserialize_with = "dates::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub preparation_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_details: Option<BookingDetails>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SupportingDocumentsStage {
    #[serde(default)]
    pub documents: Vec<SupportingDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preparation_status: Option<CollectionStatus>,
    #[serde(default)]
    pub completed: bool,
}

// ============================================================================
// Stage 6: payment
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    VisaFee,
    ServiceFee,
    DocumentationFee,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    BankTransfer,
    CreditCard,
    Cash,
    Upi,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Received,
    Overdue,
    Partial,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStage {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<PaymentType>,
    #[serde(
        default,
        deserialize_with = "dates::deserialize_opt_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<PaymentMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
    #[serde(
        default,
        deserialize_with = "dates::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "dates::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub payment_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
}

// ============================================================================
// Stage 7: embassy appointment
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentType {
    VisaInterview,
    Biometrics,
    DocumentSubmission,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    NotScheduled,
    Scheduled,
    Attended,
    Missed,
    Rescheduled,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentStage {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub appointment_type: Option<AppointmentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embassy: Option<String>,
    #[serde(
        default,
        deserialize_with = "dates::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub date_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

// ============================================================================
// Stage 8: visa outcome
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeStatus {
    Pending,
    Approved,
    Rejected,
    Appealed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VisaOutcomeStage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OutcomeStatus>,
    #[serde(
        default,
        deserialize_with = "dates::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub decision_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visa_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

// ============================================================================
// Stage record (one of the eight sub-documents)
// ============================================================================

/// A finalized stage sub-document, tagged by which stage it belongs to.
///
/// Serializes as the bare sub-document.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum StageRecord {
    Agreement(AgreementStage),
    Meeting(MeetingStage),
    DocumentCollection(DocumentCollectionStage),
    VisaApplication(VisaApplicationStage),
    SupportingDocuments(SupportingDocumentsStage),
    Payment(PaymentStage),
    Appointment(AppointmentStage),
    VisaOutcome(VisaOutcomeStage),
}

impl StageRecord {
    pub fn kind(&self) -> StageKind {
        match self {
            StageRecord::Agreement(_) => StageKind::Agreement,
            StageRecord::Meeting(_) => StageKind::Meeting,
            StageRecord::DocumentCollection(_) => StageKind::DocumentCollection,
            StageRecord::VisaApplication(_) => StageKind::VisaApplication,
            StageRecord::SupportingDocuments(_) => StageKind::SupportingDocuments,
            StageRecord::Payment(_) => StageKind::Payment,
            StageRecord::Appointment(_) => StageKind::Appointment,
            StageRecord::VisaOutcome(_) => StageKind::VisaOutcome,
        }
    }

    pub fn is_completed(&self) -> bool {
        match self {
            StageRecord::Agreement(s) => s.completed,
            StageRecord::Meeting(s) => s.completed,
            StageRecord::DocumentCollection(s) => s.completed,
            StageRecord::VisaApplication(s) => s.completed,
            StageRecord::SupportingDocuments(s) => s.completed,
            StageRecord::Payment(s) => s.completed,
            StageRecord::Appointment(s) => s.completed,
            StageRecord::VisaOutcome(s) => s.completed,
        }
    }

    /// JSON object form, used as the merge base for the next upsert
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }
}

// ============================================================================
// Tracker aggregate
// ============================================================================

/// The per-client visa tracker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VisaTracker {
    pub id: String,
    pub client_id: String,
    pub branch_id: String,
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
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VisaTracker {
    /// Build a fresh tracker (progress computed, timestamps set to now)
    pub fn new(id: String, new: &NewTracker) -> Self {
        let now = Utc::now();
        let mut tracker = Self {
            id,
            client_id: new.client_id.clone(),
            branch_id: new.branch_id.clone(),
            agreement: new.agreement.clone(),
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
        tracker.recompute_progress();
        tracker
    }

    /// Current sub-document of a stage, if it was ever written
    pub fn stage(&self, kind: StageKind) -> Option<StageRecord> {
        match kind {
            StageKind::Agreement => self.agreement.clone().map(StageRecord::Agreement),
            StageKind::Meeting => self.meeting.clone().map(StageRecord::Meeting),
            StageKind::DocumentCollection => self
                .document_collection
                .clone()
                .map(StageRecord::DocumentCollection),
            StageKind::VisaApplication => self
                .visa_application
                .clone()
                .map(StageRecord::VisaApplication),
            StageKind::SupportingDocuments => self
                .supporting_documents
                .clone()
                .map(StageRecord::SupportingDocuments),
            StageKind::Payment => self.payment.clone().map(StageRecord::Payment),
            StageKind::Appointment => self.appointment.clone().map(StageRecord::Appointment),
            StageKind::VisaOutcome => self.visa_outcome.clone().map(StageRecord::VisaOutcome),
        }
    }

    /// `completed` flag of a stage (false when the stage is absent)
    pub fn stage_completed(&self, kind: StageKind) -> bool {
        match kind {
            StageKind::Agreement => self.agreement.as_ref().is_some_and(|s| s.completed),
            StageKind::Meeting => self.meeting.as_ref().is_some_and(|s| s.completed),
            StageKind::DocumentCollection => self
                .document_collection
                .as_ref()
                .is_some_and(|s| s.completed),
            StageKind::VisaApplication => {
                self.visa_application.as_ref().is_some_and(|s| s.completed)
            }
            StageKind::SupportingDocuments => self
                .supporting_documents
                .as_ref()
                .is_some_and(|s| s.completed),
            StageKind::Payment => self.payment.as_ref().is_some_and(|s| s.completed),
            StageKind::Appointment => self.appointment.as_ref().is_some_and(|s| s.completed),
            StageKind::VisaOutcome => self.visa_outcome.as_ref().is_some_and(|s| s.completed),
        }
    }

    /// Replace one stage sub-document. Does not touch progress.
    pub fn set_stage(&mut self, record: StageRecord) {
        match record {
            StageRecord::Agreement(s) => self.agreement = Some(s),
            StageRecord::Meeting(s) => self.meeting = Some(s),
            StageRecord::DocumentCollection(s) => self.document_collection = Some(s),
            StageRecord::VisaApplication(s) => self.visa_application = Some(s),
            StageRecord::SupportingDocuments(s) => self.supporting_documents = Some(s),
            StageRecord::Payment(s) => self.payment = Some(s),
            StageRecord::Appointment(s) => self.appointment = Some(s),
            StageRecord::VisaOutcome(s) => self.visa_outcome = Some(s),
        }
    }
}

/// Input for inserting a tracker; the store assigns id and timestamps
#[derive(Debug, Clone)]
pub struct NewTracker {
    pub client_id: String,
    pub branch_id: String,
    pub agreement: Option<AgreementStage>,
}

// ============================================================================
// Registry records (client / branch collaborators)
// ============================================================================

/// The subset of a CRM client the tracker needs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// None for legacy clients created before branches existed
    #[serde(default)]
    pub branch_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BranchRecord {
    pub id: String,
    pub branch_name: String,
    pub branch_location: String,
}

/// Branch created at startup when the registry is empty
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BranchSeed {
    pub branch_name: String,
    pub branch_location: String,
    /// Human-readable branch code (e.g. "IND001")
    pub code: String,
    pub email: String,
    pub contact_no: String,
    pub head: BranchHeadSeed,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BranchHeadSeed {
    pub name: String,
    pub contact_no: String,
    pub email: String,
    pub gender: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientSummary {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl From<&ClientRecord> for ClientSummary {
    fn from(client: &ClientRecord) -> Self {
        Self {
            id: client.id.clone(),
            first_name: client.first_name.clone(),
            last_name: client.last_name.clone(),
            email: client.email.clone(),
            phone: client.phone.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BranchSummary {
    pub id: String,
    pub branch_name: String,
    pub branch_location: String,
}

impl From<&BranchRecord> for BranchSummary {
    fn from(branch: &BranchRecord) -> Self {
        Self {
            id: branch.id.clone(),
            branch_name: branch.branch_name.clone(),
            branch_location: branch.branch_location.clone(),
        }
    }
}

/// Tracker with client and branch summaries attached
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackerDetails {
    #[serde(flatten)]
    pub tracker: VisaTracker,
    pub client: Option<ClientSummary>,
    pub branch: Option<BranchSummary>,
}

// ============================================================================
// Agreement shadow
// ============================================================================

/// Legacy copy of the agreement stage, one per client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgreementRecord {
    pub client_id: String,
    pub branch_id: String,
    pub agreement: AgreementStage,
}

/// Where an agreement read was served from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgreementSource {
    Tracker,
    Shadow,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AgreementView {
    #[serde(flatten)]
    pub agreement: AgreementStage,
    pub branch_name: Option<String>,
    pub source: AgreementSource,
}

// ============================================================================
// Requests and results
// ============================================================================

/// Request to create a tracker explicitly
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTrackerRequest {
    pub client_id: String,
    pub branch_id: String,
}

/// Request to assign the overall status directly
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetOverallStatusRequest {
    pub overall_status: OverallStatus,
}

/// Result of a stage upsert
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StageUpdate {
    pub stage: StageKind,
    pub data: StageRecord,
    pub progress: Progress,
    pub overall_status: OverallStatus,
}

/// Result of the branch-aware agreement upsert
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgreementUpdate {
    pub agreement: AgreementStage,
    pub branch_id: String,
    pub progress: Progress,
    pub overall_status: OverallStatus,
}
