//! TrackerStore trait definition
//!
//! Abstract interface over the document store: the client and branch
//! registries, the tracker collection and the agreement shadow collection.
//! `MongoStore` is the production implementation; tests use the in-memory mock.

use crate::tracker::{
    AgreementRecord, BranchRecord, BranchSeed, ClientRecord, NewTracker, OverallStatus,
    StageRecord, VisaTracker,
};
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait TrackerStore: Send + Sync {
    // ========================================================================
    // Client registry
    // ========================================================================

    /// Get a client by ID
    async fn get_client(&self, id: &str) -> Result<Option<ClientRecord>>;

    /// Persist a branch assignment onto a client
    async fn assign_client_branch(&self, client_id: &str, branch_id: &str) -> Result<()>;

    // ========================================================================
    // Branch registry
    // ========================================================================

    /// Get a branch by ID
    async fn get_branch(&self, id: &str) -> Result<Option<BranchRecord>>;

    /// The branch used for clients without one (oldest branch)
    async fn find_default_branch(&self) -> Result<Option<BranchRecord>>;

    /// Create the seed branch unless any branch exists.
    ///
    /// Returns the default branch and whether it was created.
    async fn ensure_branch(&self, seed: &BranchSeed) -> Result<(BranchRecord, bool)>;

    // ========================================================================
    // Trackers
    // ========================================================================

    /// Insert a new tracker. Returns `None` when the client already has one.
    async fn insert_tracker(&self, tracker: &NewTracker) -> Result<Option<VisaTracker>>;

    /// Get the tracker of a client
    async fn get_tracker(&self, client_id: &str) -> Result<Option<VisaTracker>>;

    /// All trackers, newest first
    async fn list_trackers(&self) -> Result<Vec<VisaTracker>>;

    /// Trackers of one branch, newest first
    async fn list_trackers_by_branch(&self, branch_id: &str) -> Result<Vec<VisaTracker>>;

    /// Replace one stage sub-document and recompute progress and overall
    /// status in the same atomic update. Returns `None` if no tracker exists.
    async fn write_stage(
        &self,
        client_id: &str,
        record: &StageRecord,
    ) -> Result<Option<VisaTracker>>;

    /// Assign the overall status while progress still sits at
    /// `expected_percentage`. Returns `None` if no tracker exists or its
    /// progress has moved.
    async fn set_overall_status(
        &self,
        client_id: &str,
        status: OverallStatus,
        expected_percentage: u32,
    ) -> Result<Option<VisaTracker>>;

    // ========================================================================
    // Agreement shadow
    // ========================================================================

    /// Upsert the shadow agreement keyed by client
    async fn upsert_shadow_agreement(&self, record: &AgreementRecord) -> Result<()>;

    /// Get the shadow agreement of a client
    async fn get_shadow_agreement(&self, client_id: &str) -> Result<Option<AgreementRecord>>;

    // ========================================================================
    // Health
    // ========================================================================

    /// Ping the store
    async fn health_check(&self) -> Result<bool>;
}
