//! Tracker event types for server-sent event notifications

use crate::tracker::{OverallStatus, Progress, StageKind};
use serde::{Deserialize, Serialize};

/// What happened to a tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerAction {
    Created,
    StageUpdated,
    StatusChanged,
    AgreementMirrored,
}

impl TrackerAction {
    /// Wire name, also used as the SSE event name
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerAction::Created => "created",
            TrackerAction::StageUpdated => "stage_updated",
            TrackerAction::StatusChanged => "status_changed",
            TrackerAction::AgreementMirrored => "agreement_mirrored",
        }
    }
}

/// A tracker event emitted after a successful write
///
/// Must be Clone for `tokio::sync::broadcast`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerEvent {
    pub action: TrackerAction,
    pub client_id: String,
    /// Stage that was written (StageUpdated / AgreementMirrored)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<StageKind>,
    pub progress: Progress,
    pub overall_status: OverallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    /// ISO 8601 timestamp
    pub timestamp: String,
}

impl TrackerEvent {
    /// Create a new TrackerEvent with the current timestamp
    pub fn new(
        action: TrackerAction,
        client_id: impl Into<String>,
        progress: Progress,
        overall_status: OverallStatus,
    ) -> Self {
        Self {
            action,
            client_id: client_id.into(),
            stage: None,
            progress,
            overall_status,
            branch_id: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_stage(mut self, stage: StageKind) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_branch_id(mut self, branch_id: impl Into<String>) -> Self {
        self.branch_id = Some(branch_id.into());
        self
    }
}

/// Sink for tracker events.
///
/// Fire-and-forget: implementations log delivery problems and never fail
/// the write that produced the event.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: TrackerEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_snake_case() {
        assert_eq!(
            serde_json::to_string(&TrackerAction::StageUpdated).unwrap(),
            "\"stage_updated\""
        );
        assert_eq!(
            serde_json::to_string(&TrackerAction::AgreementMirrored).unwrap(),
            "\"agreement_mirrored\""
        );
    }

    #[test]
    fn test_action_as_str_matches_serde() {
        for action in [
            TrackerAction::Created,
            TrackerAction::StageUpdated,
            TrackerAction::StatusChanged,
            TrackerAction::AgreementMirrored,
        ] {
            let json = serde_json::to_value(action).unwrap();
            assert_eq!(json, action.as_str());
        }
    }

    #[test]
    fn test_event_serialization() {
        let event = TrackerEvent::new(
            TrackerAction::StageUpdated,
            "client-1",
            Progress::from_completed(3),
            OverallStatus::InProgress,
        )
        .with_stage(StageKind::SupportingDocuments);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["action"], "stage_updated");
        assert_eq!(json["stage"], "supportingDocuments");
        assert_eq!(json["progress"]["percentage"], 43);
        assert_eq!(json["overall_status"], "IN_PROGRESS");
        assert!(json.get("branch_id").is_none());
    }

    #[test]
    fn test_event_roundtrip_keeps_branch() {
        let event = TrackerEvent::new(
            TrackerAction::Created,
            "client-2",
            Progress::initial(),
            OverallStatus::NotStarted,
        )
        .with_branch_id("branch-9");

        let json = serde_json::to_string(&event).unwrap();
        let back: TrackerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.action, TrackerAction::Created);
        assert_eq!(back.branch_id.as_deref(), Some("branch-9"));
        assert!(back.stage.is_none());
    }
}
