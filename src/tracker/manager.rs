//! Tracker operations: lazy creation, per-stage upserts and the agreement shadow

use super::error::{TrackerError, TrackerResult};
use super::models::*;
use super::progress::derive_status;
use super::stages::{self, StageKind};
use crate::blob::{BlobStore, UploadedFile};
use crate::events::{EventEmitter, TrackerAction, TrackerEvent};
use crate::mongo::TrackerStore;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Manager for visa tracker operations
pub struct TrackerManager {
    store: Arc<dyn TrackerStore>,
    blobs: Arc<dyn BlobStore>,
    event_emitter: Option<Arc<dyn EventEmitter>>,
}

impl TrackerManager {
    /// Create a new TrackerManager
    pub fn new(store: Arc<dyn TrackerStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            blobs,
            event_emitter: None,
        }
    }

    /// Create a new TrackerManager with an event emitter
    pub fn with_event_emitter(
        store: Arc<dyn TrackerStore>,
        blobs: Arc<dyn BlobStore>,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        Self {
            store,
            blobs,
            event_emitter: Some(emitter),
        }
    }

    /// Emit a tracker event (no-op if event_emitter is None)
    fn emit(&self, event: TrackerEvent) {
        if let Some(emitter) = &self.event_emitter {
            emitter.emit(event);
        }
    }

    // ========================================================================
    // Client / branch resolution
    // ========================================================================

    async fn resolve_client(&self, client_id: &str) -> TrackerResult<ClientRecord> {
        self.store
            .get_client(client_id)
            .await?
            .ok_or_else(|| TrackerError::NotFound("Client not found".into()))
    }

    /// The client's branch, assigning and persisting the default branch when
    /// the client has none
    async fn ensure_client_branch(&self, client: &mut ClientRecord) -> TrackerResult<String> {
        if let Some(branch_id) = &client.branch_id {
            return Ok(branch_id.clone());
        }

        let branch = self.store.find_default_branch().await?.ok_or_else(|| {
            TrackerError::FatalConfig(
                "No branch exists to assign to the client; create a branch first".into(),
            )
        })?;
        self.store
            .assign_client_branch(&client.id, &branch.id)
            .await?;
        info!(
            client_id = %client.id,
            branch_id = %branch.id,
            "Assigned default branch to client"
        );
        client.branch_id = Some(branch.id.clone());
        Ok(branch.id)
    }

    /// Insert a tracker, falling back to the existing one if another request
    /// created it first
    async fn insert_or_reload(&self, new: NewTracker) -> TrackerResult<VisaTracker> {
        if let Some(tracker) = self.store.insert_tracker(&new).await? {
            info!(client_id = %new.client_id, branch_id = %new.branch_id, "Created visa tracker");
            self.emit(
                TrackerEvent::new(
                    TrackerAction::Created,
                    &tracker.client_id,
                    tracker.progress,
                    tracker.overall_status,
                )
                .with_branch_id(&tracker.branch_id),
            );
            return Ok(tracker);
        }
        debug!(client_id = %new.client_id, "Tracker created concurrently, reloading");
        self.store
            .get_tracker(&new.client_id)
            .await?
            .ok_or_else(|| {
                TrackerError::Store(anyhow::anyhow!(
                    "tracker for client {} reported as duplicate but not found",
                    new.client_id
                ))
            })
    }

    /// Load the tracker of a client, creating it (with a draft agreement) if absent
    async fn load_or_create(&self, client: &mut ClientRecord) -> TrackerResult<VisaTracker> {
        let branch_id = self.ensure_client_branch(client).await?;
        if let Some(tracker) = self.store.get_tracker(&client.id).await? {
            return Ok(tracker);
        }
        self.insert_or_reload(NewTracker {
            client_id: client.id.clone(),
            branch_id,
            agreement: Some(AgreementStage::draft()),
        })
        .await
    }

    async fn populate(
        &self,
        tracker: VisaTracker,
        client: Option<ClientRecord>,
        branches: &mut HashMap<String, Option<BranchSummary>>,
    ) -> TrackerResult<TrackerDetails> {
        let client = match client {
            Some(c) => Some(c),
            None => self.store.get_client(&tracker.client_id).await?,
        };
        let branch = match branches.get(&tracker.branch_id) {
            Some(cached) => cached.clone(),
            None => {
                let summary = self
                    .store
                    .get_branch(&tracker.branch_id)
                    .await?
                    .as_ref()
                    .map(BranchSummary::from);
                branches.insert(tracker.branch_id.clone(), summary.clone());
                summary
            }
        };
        Ok(TrackerDetails {
            client: client.as_ref().map(ClientSummary::from),
            branch,
            tracker,
        })
    }

    // ========================================================================
    // Tracker lifecycle
    // ========================================================================

    /// Create a tracker explicitly. Fails with Conflict if one exists.
    pub async fn create_tracker(&self, req: CreateTrackerRequest) -> TrackerResult<VisaTracker> {
        if req.client_id.trim().is_empty() || req.branch_id.trim().is_empty() {
            return Err(TrackerError::Validation(
                "clientId and branchId are required".into(),
            ));
        }
        self.resolve_client(&req.client_id).await?;

        let new = NewTracker {
            client_id: req.client_id,
            branch_id: req.branch_id,
            agreement: None,
        };
        let tracker = self.store.insert_tracker(&new).await?.ok_or_else(|| {
            TrackerError::Conflict("Visa tracker already exists for this client".into())
        })?;

        info!(client_id = %tracker.client_id, branch_id = %tracker.branch_id, "Created visa tracker");
        self.emit(
            TrackerEvent::new(
                TrackerAction::Created,
                &tracker.client_id,
                tracker.progress,
                tracker.overall_status,
            )
            .with_branch_id(&tracker.branch_id),
        );
        Ok(tracker)
    }

    /// Read a client's tracker, creating it on first access
    pub async fn get_or_create_tracker(&self, client_id: &str) -> TrackerResult<TrackerDetails> {
        let mut client = self.resolve_client(client_id).await?;
        let tracker = self.load_or_create(&mut client).await?;
        self.populate(tracker, Some(client), &mut HashMap::new())
            .await
    }

    /// Read a client's tracker without creating it
    pub async fn get_tracker(&self, client_id: &str) -> TrackerResult<TrackerDetails> {
        let tracker = self.require_tracker(client_id).await?;
        self.populate(tracker, None, &mut HashMap::new()).await
    }

    async fn require_tracker(&self, client_id: &str) -> TrackerResult<VisaTracker> {
        self.store
            .get_tracker(client_id)
            .await?
            .ok_or_else(|| TrackerError::NotFound("Visa tracker not found".into()))
    }

    async fn populate_all(&self, trackers: Vec<VisaTracker>) -> TrackerResult<Vec<TrackerDetails>> {
        let mut branches = HashMap::new();
        let mut details = Vec::with_capacity(trackers.len());
        for tracker in trackers {
            details.push(self.populate(tracker, None, &mut branches).await?);
        }
        Ok(details)
    }

    /// All trackers, newest first
    pub async fn list_trackers(&self) -> TrackerResult<Vec<TrackerDetails>> {
        let trackers = self.store.list_trackers().await?;
        self.populate_all(trackers).await
    }

    /// Trackers of one branch, newest first
    pub async fn list_branch_trackers(&self, branch_id: &str) -> TrackerResult<Vec<TrackerDetails>> {
        let trackers = self.store.list_trackers_by_branch(branch_id).await?;
        self.populate_all(trackers).await
    }

    /// Assign the overall status directly.
    ///
    /// Only ON_HOLD, or the status the current progress implies (to release a
    /// hold), is accepted.
    pub async fn set_overall_status(
        &self,
        client_id: &str,
        status: OverallStatus,
    ) -> TrackerResult<VisaTracker> {
        let tracker = self.require_tracker(client_id).await?;
        let derived = derive_status(tracker.progress.percentage, OverallStatus::InProgress);
        if status != OverallStatus::OnHold && status != derived {
            return Err(TrackerError::Validation(format!(
                "overallStatus {} does not match progress {}% (expected {} or ON_HOLD)",
                status.as_str(),
                tracker.progress.percentage,
                derived.as_str()
            )));
        }

        // Conditional on the progress the check above saw
        let Some(updated) = self
            .store
            .set_overall_status(client_id, status, tracker.progress.percentage)
            .await?
        else {
            return match self.store.get_tracker(client_id).await? {
                Some(_) => Err(TrackerError::Conflict(
                    "Tracker progress changed while setting the status; retry".into(),
                )),
                None => Err(TrackerError::NotFound("Visa tracker not found".into())),
            };
        };

        info!(client_id = %client_id, status = status.as_str(), "Overall status set");
        self.emit(
            TrackerEvent::new(
                TrackerAction::StatusChanged,
                client_id,
                updated.progress,
                updated.overall_status,
            )
            .with_branch_id(&updated.branch_id),
        );
        Ok(updated)
    }

    // ========================================================================
    // Stage upserts
    // ========================================================================

    /// Merge a payload (and uploaded files) into one stage of a client's tracker.
    ///
    /// An agreement upsert creates the tracker when missing; every other
    /// stage requires an existing tracker.
    pub async fn upsert_stage(
        &self,
        client_id: &str,
        kind: StageKind,
        payload: Map<String, Value>,
        files: Vec<UploadedFile>,
    ) -> TrackerResult<StageUpdate> {
        let (update, _) = self
            .upsert(client_id, kind, payload, files, None)
            .await?;
        Ok(update)
    }

    async fn upsert(
        &self,
        client_id: &str,
        kind: StageKind,
        payload: Map<String, Value>,
        files: Vec<UploadedFile>,
        shadow_branch: Option<&str>,
    ) -> TrackerResult<(StageUpdate, VisaTracker)> {
        stages::check_file_count(kind, &payload, files.len())?;

        let tracker = match self.store.get_tracker(client_id).await? {
            Some(tracker) => tracker,
            None if kind == StageKind::Agreement => {
                let mut client = self.resolve_client(client_id).await?;
                self.load_or_create(&mut client).await?
            }
            None => return Err(TrackerError::NotFound("Visa tracker not found".into())),
        };
        let base = tracker.stage(kind).map(|s| s.to_json());

        // Type-check before touching the blob store
        let now = Utc::now();
        let agreement_defaults = shadow_branch.is_some();
        prepare(kind, base.clone(), payload.clone(), &[], now, agreement_defaults)?;

        let refs = self.store_files(&files).await?;
        let record = prepare(kind, base, payload, &refs, now, agreement_defaults);
        let result = match record {
            Ok(record) => self.persist(client_id, &record, shadow_branch).await,
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.discard_blobs(&refs).await;
        }
        let updated = result?;

        let data = updated
            .stage(kind)
            .ok_or_else(|| TrackerError::Store(anyhow::anyhow!("{} missing after write", kind)))?;
        info!(
            client_id = %client_id,
            stage = kind.field(),
            completed = data.is_completed(),
            percentage = updated.progress.percentage,
            files = refs.len(),
            "Stage updated"
        );
        self.emit(
            TrackerEvent::new(
                TrackerAction::StageUpdated,
                client_id,
                updated.progress,
                updated.overall_status,
            )
            .with_stage(kind)
            .with_branch_id(&updated.branch_id),
        );

        Ok((
            StageUpdate {
                stage: kind,
                data,
                progress: updated.progress,
                overall_status: updated.overall_status,
            },
            updated,
        ))
    }

    /// Write a finalized stage. With a shadow branch the agreement is
    /// mirrored first; a failed mirror writes nothing to the tracker.
    async fn persist(
        &self,
        client_id: &str,
        record: &StageRecord,
        shadow_branch: Option<&str>,
    ) -> TrackerResult<VisaTracker> {
        if let (Some(branch_id), StageRecord::Agreement(agreement)) = (shadow_branch, record) {
            let shadow = AgreementRecord {
                client_id: client_id.to_string(),
                branch_id: branch_id.to_string(),
                agreement: agreement.clone(),
            };
            self.store
                .upsert_shadow_agreement(&shadow)
                .await
                .map_err(|e| {
                    warn!(client_id = %client_id, error = %e, "Failed to mirror agreement");
                    TrackerError::Store(e)
                })?;
        }
        self.store
            .write_stage(client_id, record)
            .await?
            .ok_or_else(|| TrackerError::NotFound("Visa tracker not found".into()))
    }

    /// Store every upload; on the first failure delete what was stored
    async fn store_files(&self, files: &[UploadedFile]) -> TrackerResult<Vec<String>> {
        let mut refs = Vec::with_capacity(files.len());
        for file in files {
            match self.blobs.put(file).await {
                Ok(id) => refs.push(id),
                Err(e) => {
                    warn!(filename = %file.filename, error = %e, "Blob upload failed");
                    self.discard_blobs(&refs).await;
                    return Err(TrackerError::Upstream(e));
                }
            }
        }
        Ok(refs)
    }

    async fn discard_blobs(&self, refs: &[String]) {
        for id in refs {
            if let Err(e) = self.blobs.delete(id).await {
                warn!(file_id = %id, error = %e, "Failed to delete orphaned blob");
            }
        }
    }

    /// Read one stage of a client's tracker
    pub async fn get_stage(&self, client_id: &str, kind: StageKind) -> TrackerResult<StageRecord> {
        self.require_tracker(client_id)
            .await?
            .stage(kind)
            .ok_or_else(|| TrackerError::NotFound(format!("No {} data for this client", kind)))
    }

    // ========================================================================
    // Agreement shadow
    // ========================================================================

    /// Branch-aware agreement upsert: mirrors the finalized agreement into
    /// the shadow collection under the client's branch, then writes the tracker.
    ///
    /// A failed mirror fails the request before the tracker stage changes.
    pub async fn upsert_agreement(
        &self,
        client_id: &str,
        payload: Map<String, Value>,
        files: Vec<UploadedFile>,
    ) -> TrackerResult<AgreementUpdate> {
        let mut client = self.resolve_client(client_id).await?;
        let branch_id = self.ensure_client_branch(&mut client).await?;

        let (update, tracker) = self
            .upsert(
                client_id,
                StageKind::Agreement,
                payload,
                files,
                Some(&branch_id),
            )
            .await?;
        let StageRecord::Agreement(agreement) = update.data else {
            return Err(TrackerError::Store(anyhow::anyhow!(
                "agreement write returned a different stage"
            )));
        };

        self.emit(
            TrackerEvent::new(
                TrackerAction::AgreementMirrored,
                client_id,
                tracker.progress,
                tracker.overall_status,
            )
            .with_stage(StageKind::Agreement)
            .with_branch_id(&branch_id),
        );

        Ok(AgreementUpdate {
            agreement,
            branch_id,
            progress: update.progress,
            overall_status: update.overall_status,
        })
    }

    /// Agreement of a client: tracker first, shadow as fallback
    pub async fn get_agreement(&self, client_id: &str) -> TrackerResult<AgreementView> {
        let from_tracker = self.store.get_tracker(client_id).await?.and_then(|t| {
            let branch_id = t.branch_id;
            t.agreement.map(|a| (a, branch_id, AgreementSource::Tracker))
        });

        let (agreement, branch_id, source) = match from_tracker {
            Some(found) => found,
            None => {
                let shadow = self
                    .store
                    .get_shadow_agreement(client_id)
                    .await?
                    .ok_or_else(|| TrackerError::NotFound("Agreement not found".into()))?;
                (shadow.agreement, shadow.branch_id, AgreementSource::Shadow)
            }
        };

        let branch_name = self
            .store
            .get_branch(&branch_id)
            .await?
            .map(|b| b.branch_name);
        Ok(AgreementView {
            agreement,
            branch_name,
            source,
        })
    }

    /// Store health
    pub async fn health_check(&self) -> TrackerResult<bool> {
        Ok(self.store.health_check().await?)
    }
}

/// Splice file refs, merge over the stored stage and finalize
fn prepare(
    kind: StageKind,
    base: Option<Map<String, Value>>,
    mut payload: Map<String, Value>,
    refs: &[String],
    now: DateTime<Utc>,
    agreement_defaults: bool,
) -> TrackerResult<StageRecord> {
    stages::splice_files(kind, &mut payload, refs, now);
    let mut merged = stages::merge(kind, base, payload)?;
    if agreement_defaults {
        stages::apply_agreement_defaults(&mut merged);
    }
    stages::finalize(kind, merged, now)
}
