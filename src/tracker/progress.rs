//! Progress roll-up over the canonical stages

use super::models::{OverallStatus, Progress, VisaTracker};
use super::stages::StageKind;

/// Number of stages counted toward progress
pub const TOTAL_STEPS: u32 = 7;

/// Stages counted toward progress, in display order
pub fn progress_stages() -> impl Iterator<Item = StageKind> {
    StageKind::ALL
        .into_iter()
        .filter(|kind| kind.counts_toward_progress())
}

/// `round(100 * completed / total)`, halves rounded up
pub fn percentage_of(completed: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (100.0 * completed as f64 / total as f64).round() as u32
}

/// Status implied by a percentage, honouring a held tracker
pub fn derive_status(percentage: u32, current: OverallStatus) -> OverallStatus {
    match percentage {
        0 => OverallStatus::NotStarted,
        p if p >= 100 => OverallStatus::Completed,
        _ if current == OverallStatus::OnHold => OverallStatus::OnHold,
        _ => OverallStatus::InProgress,
    }
}

impl Progress {
    pub fn initial() -> Self {
        Self {
            completed_steps: 0,
            total_steps: TOTAL_STEPS,
            percentage: 0,
        }
    }

    pub fn from_completed(completed_steps: u32) -> Self {
        Self {
            completed_steps,
            total_steps: TOTAL_STEPS,
            percentage: percentage_of(completed_steps, TOTAL_STEPS),
        }
    }
}

impl VisaTracker {
    /// Recount completed stages and re-derive the overall status
    pub fn recompute_progress(&mut self) {
        let completed = progress_stages()
            .filter(|kind| self.stage_completed(*kind))
            .count() as u32;
        self.progress = Progress::from_completed(completed);
        self.overall_status = derive_status(self.progress.percentage, self.overall_status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::models::*;

    fn tracker() -> VisaTracker {
        VisaTracker::new(
            "t1".into(),
            &NewTracker {
                client_id: "c1".into(),
                branch_id: "b1".into(),
                agreement: Some(AgreementStage::draft()),
            },
        )
    }

    fn complete(tracker: &mut VisaTracker, kind: StageKind) {
        let record = match kind {
            StageKind::Agreement => StageRecord::Agreement(AgreementStage {
                completed: true,
                ..Default::default()
            }),
            StageKind::Meeting => StageRecord::Meeting(MeetingStage {
                completed: true,
                ..Default::default()
            }),
            StageKind::DocumentCollection => {
                StageRecord::DocumentCollection(DocumentCollectionStage {
                    completed: true,
                    ..Default::default()
                })
            }
            StageKind::VisaApplication => StageRecord::VisaApplication(VisaApplicationStage {
                completed: true,
                ..Default::default()
            }),
            StageKind::SupportingDocuments => {
                StageRecord::SupportingDocuments(SupportingDocumentsStage {
                    completed: true,
                    ..Default::default()
                })
            }
            StageKind::Payment => StageRecord::Payment(PaymentStage {
                completed: true,
                ..Default::default()
            }),
            StageKind::Appointment => StageRecord::Appointment(AppointmentStage {
                completed: true,
                ..Default::default()
            }),
            StageKind::VisaOutcome => StageRecord::VisaOutcome(VisaOutcomeStage {
                completed: true,
                ..Default::default()
            }),
        };
        tracker.set_stage(record);
        tracker.recompute_progress();
    }

    #[test]
    fn test_percentage_table() {
        let expected = [0, 14, 29, 43, 57, 71, 86, 100];
        for (completed, pct) in expected.into_iter().enumerate() {
            assert_eq!(percentage_of(completed as u32, TOTAL_STEPS), pct);
        }
        assert_eq!(percentage_of(1, 8), 13);
        assert_eq!(percentage_of(3, 0), 0);
    }

    #[test]
    fn test_progress_stage_set() {
        assert_eq!(progress_stages().count() as u32, TOTAL_STEPS);
        assert!(progress_stages().all(|k| k != StageKind::VisaOutcome));
    }

    #[test]
    fn test_derive_status() {
        use OverallStatus::*;
        assert_eq!(derive_status(0, InProgress), NotStarted);
        assert_eq!(derive_status(0, OnHold), NotStarted);
        assert_eq!(derive_status(43, NotStarted), InProgress);
        assert_eq!(derive_status(43, OnHold), OnHold);
        assert_eq!(derive_status(43, Completed), InProgress);
        assert_eq!(derive_status(100, OnHold), Completed);
    }

    #[test]
    fn test_new_tracker_starts_empty() {
        let t = tracker();
        assert_eq!(t.progress, Progress::initial());
        assert_eq!(t.overall_status, OverallStatus::NotStarted);
    }

    #[test]
    fn test_attended_appointment_with_two_others() {
        let mut t = tracker();
        complete(&mut t, StageKind::Agreement);
        complete(&mut t, StageKind::Payment);
        complete(&mut t, StageKind::Appointment);
        assert_eq!(t.progress.completed_steps, 3);
        assert_eq!(t.progress.total_steps, 7);
        assert_eq!(t.progress.percentage, 43);
        assert_eq!(t.overall_status, OverallStatus::InProgress);
    }

    #[test]
    fn test_all_canonical_stages_complete() {
        let mut t = tracker();
        for kind in progress_stages() {
            complete(&mut t, kind);
        }
        assert_eq!(t.progress.percentage, 100);
        assert_eq!(t.overall_status, OverallStatus::Completed);
    }

    #[test]
    fn test_outcome_does_not_move_progress() {
        let mut t = tracker();
        complete(&mut t, StageKind::Meeting);
        let before = t.progress;
        complete(&mut t, StageKind::VisaOutcome);
        assert_eq!(t.progress, before);
        assert_eq!(t.progress.percentage, 14);
    }

    #[test]
    fn test_on_hold_survives_partial_progress() {
        let mut t = tracker();
        complete(&mut t, StageKind::Meeting);
        t.overall_status = OverallStatus::OnHold;
        complete(&mut t, StageKind::Payment);
        assert_eq!(t.overall_status, OverallStatus::OnHold);
        for kind in progress_stages() {
            complete(&mut t, kind);
        }
        assert_eq!(t.overall_status, OverallStatus::Completed);
    }
}
