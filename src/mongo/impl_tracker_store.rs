//! `TrackerStore` implementation for `MongoStore`.
//!
//! Every method delegates to the corresponding inherent method.

use async_trait::async_trait;

use super::client::MongoStore;
use super::traits::TrackerStore;
use crate::tracker::{
    AgreementRecord, BranchRecord, BranchSeed, ClientRecord, NewTracker, OverallStatus,
    StageRecord, VisaTracker,
};

#[async_trait]
impl TrackerStore for MongoStore {
    async fn get_client(&self, id: &str) -> anyhow::Result<Option<ClientRecord>> {
        self.get_client(id).await
    }

    async fn assign_client_branch(&self, client_id: &str, branch_id: &str) -> anyhow::Result<()> {
        self.assign_client_branch(client_id, branch_id).await
    }

    async fn get_branch(&self, id: &str) -> anyhow::Result<Option<BranchRecord>> {
        self.get_branch(id).await
    }

    async fn find_default_branch(&self) -> anyhow::Result<Option<BranchRecord>> {
        self.find_default_branch().await
    }

    async fn ensure_branch(&self, seed: &BranchSeed) -> anyhow::Result<(BranchRecord, bool)> {
        self.ensure_branch(seed).await
    }

    async fn insert_tracker(&self, tracker: &NewTracker) -> anyhow::Result<Option<VisaTracker>> {
        self.insert_tracker(tracker).await
    }

    async fn get_tracker(&self, client_id: &str) -> anyhow::Result<Option<VisaTracker>> {
        self.get_tracker(client_id).await
    }

    async fn list_trackers(&self) -> anyhow::Result<Vec<VisaTracker>> {
        self.list_trackers().await
    }

    async fn list_trackers_by_branch(&self, branch_id: &str) -> anyhow::Result<Vec<VisaTracker>> {
        self.list_trackers_by_branch(branch_id).await
    }

    async fn write_stage(
        &self,
        client_id: &str,
        record: &StageRecord,
    ) -> anyhow::Result<Option<VisaTracker>> {
        self.write_stage(client_id, record).await
    }

    async fn set_overall_status(
        &self,
        client_id: &str,
        status: OverallStatus,
        expected_percentage: u32,
    ) -> anyhow::Result<Option<VisaTracker>> {
        self.set_overall_status(client_id, status, expected_percentage)
            .await
    }

    async fn upsert_shadow_agreement(&self, record: &AgreementRecord) -> anyhow::Result<()> {
        self.upsert_shadow_agreement(record).await
    }

    async fn get_shadow_agreement(
        &self,
        client_id: &str,
    ) -> anyhow::Result<Option<AgreementRecord>> {
        self.get_shadow_agreement(client_id).await
    }

    async fn health_check(&self) -> anyhow::Result<bool> {
        self.health_check().await
    }
}
