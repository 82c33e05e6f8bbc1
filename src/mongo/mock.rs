//! In-memory mock implementation of TrackerStore for testing.
//!
//! Collections live in `tokio::sync::RwLock<HashMap<K, V>>`. Stage writes
//! apply the stage and recompute progress under one write lock, matching the
//! atomic update pipeline of the real store.

use super::traits::TrackerStore;
use crate::tracker::{
    AgreementRecord, BranchRecord, BranchSeed, ClientRecord, NewTracker, OverallStatus,
    StageRecord, VisaTracker,
};
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;

/// In-memory mock implementation of TrackerStore for testing.
pub struct MockTrackerStore {
    pub clients: RwLock<HashMap<String, ClientRecord>>,
    /// Branches in insertion order; the first one is the default
    pub branches: RwLock<Vec<BranchRecord>>,
    /// Trackers keyed by client id
    pub trackers: RwLock<HashMap<String, VisaTracker>>,
    /// Shadow agreements keyed by client id
    pub agreements: RwLock<HashMap<String, AgreementRecord>>,
    next_id: AtomicU64,
    fail_shadow_writes: AtomicBool,
    fail_stage_writes: AtomicBool,
}

impl MockTrackerStore {
    /// Create a new empty MockTrackerStore.
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            branches: RwLock::new(Vec::new()),
            trackers: RwLock::new(HashMap::new()),
            agreements: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            fail_shadow_writes: AtomicBool::new(false),
            fail_stage_writes: AtomicBool::new(false),
        }
    }

    pub async fn with_client(self, client: ClientRecord) -> Self {
        self.clients.write().await.insert(client.id.clone(), client);
        self
    }

    pub async fn with_branch(self, branch: BranchRecord) -> Self {
        self.branches.write().await.push(branch);
        self
    }

    pub async fn with_tracker(self, tracker: VisaTracker) -> Self {
        self.trackers
            .write()
            .await
            .insert(tracker.client_id.clone(), tracker);
        self
    }

    /// Make shadow agreement writes fail
    pub fn fail_shadow_writes(&self, fail: bool) {
        self.fail_shadow_writes.store(fail, Ordering::SeqCst);
    }

    /// Make stage writes fail
    pub fn fail_stage_writes(&self, fail: bool) {
        self.fail_stage_writes.store(fail, Ordering::SeqCst);
    }

    fn next_id(&self) -> String {
        format!("{:024x}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for MockTrackerStore {
    fn default() -> Self {
        Self::new()
    }
}

fn newest_first(mut trackers: Vec<VisaTracker>) -> Vec<VisaTracker> {
    trackers.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    trackers
}

#[async_trait]
impl TrackerStore for MockTrackerStore {
    async fn get_client(&self, id: &str) -> Result<Option<ClientRecord>> {
        Ok(self.clients.read().await.get(id).cloned())
    }

    async fn assign_client_branch(&self, client_id: &str, branch_id: &str) -> Result<()> {
        if let Some(client) = self.clients.write().await.get_mut(client_id) {
            client.branch_id = Some(branch_id.to_string());
        }
        Ok(())
    }

    async fn get_branch(&self, id: &str) -> Result<Option<BranchRecord>> {
        Ok(self
            .branches
            .read()
            .await
            .iter()
            .find(|b| b.id == id)
            .cloned())
    }

    async fn find_default_branch(&self) -> Result<Option<BranchRecord>> {
        Ok(self.branches.read().await.first().cloned())
    }

    async fn ensure_branch(&self, seed: &BranchSeed) -> Result<(BranchRecord, bool)> {
        let mut branches = self.branches.write().await;
        if let Some(existing) = branches.first() {
            return Ok((existing.clone(), false));
        }
        let branch = BranchRecord {
            id: self.next_id(),
            branch_name: seed.branch_name.clone(),
            branch_location: seed.branch_location.clone(),
        };
        branches.push(branch.clone());
        Ok((branch, true))
    }

    async fn insert_tracker(&self, new: &NewTracker) -> Result<Option<VisaTracker>> {
        let mut trackers = self.trackers.write().await;
        if trackers.contains_key(&new.client_id) {
            return Ok(None);
        }
        let tracker = VisaTracker::new(self.next_id(), new);
        trackers.insert(new.client_id.clone(), tracker.clone());
        Ok(Some(tracker))
    }

    async fn get_tracker(&self, client_id: &str) -> Result<Option<VisaTracker>> {
        Ok(self.trackers.read().await.get(client_id).cloned())
    }

    async fn list_trackers(&self) -> Result<Vec<VisaTracker>> {
        let all = self.trackers.read().await.values().cloned().collect();
        Ok(newest_first(all))
    }

    async fn list_trackers_by_branch(&self, branch_id: &str) -> Result<Vec<VisaTracker>> {
        let matching = self
            .trackers
            .read()
            .await
            .values()
            .filter(|t| t.branch_id == branch_id)
            .cloned()
            .collect();
        Ok(newest_first(matching))
    }

    async fn write_stage(
        &self,
        client_id: &str,
        record: &StageRecord,
    ) -> Result<Option<VisaTracker>> {
        if self.fail_stage_writes.load(Ordering::SeqCst) {
            bail!("mock stage write failure");
        }
        let mut trackers = self.trackers.write().await;
        let Some(tracker) = trackers.get_mut(client_id) else {
            return Ok(None);
        };
        tracker.set_stage(record.clone());
        tracker.recompute_progress();
        tracker.updated_at = Utc::now();
        Ok(Some(tracker.clone()))
    }

    async fn set_overall_status(
        &self,
        client_id: &str,
        status: OverallStatus,
        expected_percentage: u32,
    ) -> Result<Option<VisaTracker>> {
        let mut trackers = self.trackers.write().await;
        let Some(tracker) = trackers.get_mut(client_id) else {
            return Ok(None);
        };
        if tracker.progress.percentage != expected_percentage {
            return Ok(None);
        }
        tracker.overall_status = status;
        tracker.updated_at = Utc::now();
        Ok(Some(tracker.clone()))
    }

    async fn upsert_shadow_agreement(&self, record: &AgreementRecord) -> Result<()> {
        if self.fail_shadow_writes.load(Ordering::SeqCst) {
            bail!("mock shadow write failure");
        }
        self.agreements
            .write()
            .await
            .insert(record.client_id.clone(), record.clone());
        Ok(())
    }

    async fn get_shadow_agreement(&self, client_id: &str) -> Result<Option<AgreementRecord>> {
        Ok(self.agreements.read().await.get(client_id).cloned())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}
