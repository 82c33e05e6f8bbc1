//! MongoDB client for the CRM collections the tracker touches

use super::schemas::*;
use crate::tracker::progress::{progress_stages, TOTAL_STEPS};
use crate::tracker::{
    AgreementRecord, BranchRecord, BranchSeed, ClientRecord, NewTracker, OverallStatus,
    StageRecord, VisaTracker,
};
use anyhow::{Context, Result};
use bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use futures::TryStreamExt;
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection, Database, IndexModel};
use tracing::{debug, info, warn};

/// E11000 duplicate key
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Client for MongoDB operations
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
    clients: Collection<ClientDoc>,
    branches: Collection<BranchDoc>,
    trackers: Collection<TrackerDoc>,
    agreements: Collection<VisaAgreementDoc>,
}

/// Ids are ObjectId hex strings; anything else matches no document
fn parse_oid(id: &str) -> Option<ObjectId> {
    ObjectId::parse_str(id).ok()
}

fn require_oid(id: &str, what: &str) -> Result<ObjectId> {
    parse_oid(id).with_context(|| format!("invalid {} id '{}'", what, id))
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY_CODE
    )
}

/// Append connection timeouts so an unreachable server fails fast
fn with_timeouts(uri: &str) -> String {
    let sep = if uri.contains('?') { '&' } else { '?' };
    format!(
        "{}{}serverSelectionTimeoutMS=3000&connectTimeoutMS=3000",
        uri, sep
    )
}

/// Update pipeline for a stage write.
///
/// Sets the stage subtree, then recomputes `progress` and `overallStatus`
/// from the stored document, so writes to different stages never undo each
/// other's contribution.
pub(crate) fn stage_update_pipeline(field: &str, stage: Bson) -> Vec<Document> {
    let total = TOTAL_STEPS as i32;

    let mut set_stage = Document::new();
    // $literal keeps user text such as "$100" from being read as a field path
    set_stage.insert(field, doc! { "$literal": stage });

    let counted: Vec<Bson> = progress_stages()
        .map(|kind| {
            let path = format!("${}.completed", kind.field());
            Bson::Document(doc! {
                "$cond": [{ "$eq": [{ "$ifNull": [path, false] }, true] }, 1, 0]
            })
        })
        .collect();

    vec![
        doc! { "$set": set_stage },
        doc! {
            "$set": {
                "progress": {
                    "completedSteps": { "$add": counted },
                    "totalSteps": total,
                }
            }
        },
        doc! {
            "$set": {
                "progress.percentage": {
                    "$toInt": {
                        "$floor": {
                            "$add": [
                                { "$multiply": [{ "$divide": ["$progress.completedSteps", total] }, 100] },
                                0.5
                            ]
                        }
                    }
                }
            }
        },
        doc! {
            "$set": {
                "overallStatus": {
                    "$switch": {
                        "branches": [
                            {
                                "case": { "$eq": ["$progress.percentage", 0] },
                                "then": OverallStatus::NotStarted.as_str(),
                            },
                            {
                                "case": { "$gte": ["$progress.percentage", 100] },
                                "then": OverallStatus::Completed.as_str(),
                            },
                            {
                                "case": { "$eq": ["$overallStatus", OverallStatus::OnHold.as_str()] },
                                "then": OverallStatus::OnHold.as_str(),
                            },
                        ],
                        "default": OverallStatus::InProgress.as_str(),
                    }
                },
                "updatedAt": "$$NOW",
            }
        },
    ]
}

async fn apply_indexes<T>(collection: &Collection<T>) -> Result<()>
where
    T: IntoIndexes + Send + Sync,
{
    let models: Vec<IndexModel> = T::into_indices()
        .into_iter()
        .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
        .collect();
    if models.is_empty() {
        return Ok(());
    }
    collection
        .create_indexes(models)
        .await
        .with_context(|| format!("Failed to create indexes on {}", collection.name()))?;
    Ok(())
}

impl MongoStore {
    /// Connect, verify with a ping and create indexes
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        info!("Connecting to MongoDB database '{}'", db_name);

        let client = Client::with_uri_str(with_timeouts(uri))
            .await
            .context("Failed to connect to MongoDB")?;
        let db = client.database(db_name);
        db.run_command(doc! { "ping": 1 })
            .await
            .context("MongoDB ping failed")?;

        let store = Self::from_database(db);
        store.init_indexes().await?;

        info!("Connected to MongoDB database '{}'", db_name);
        Ok(store)
    }

    pub fn from_database(db: Database) -> Self {
        Self {
            clients: db.collection(CLIENT_COLLECTION),
            branches: db.collection(BRANCH_COLLECTION),
            trackers: db.collection(TRACKER_COLLECTION),
            agreements: db.collection(AGREEMENT_COLLECTION),
            db,
        }
    }

    /// Underlying database handle (shared with the GridFS bucket)
    pub fn database(&self) -> Database {
        self.db.clone()
    }

    async fn init_indexes(&self) -> Result<()> {
        apply_indexes(&self.branches).await?;
        apply_indexes(&self.trackers).await?;
        apply_indexes(&self.agreements).await?;
        Ok(())
    }

    // ========================================================================
    // Client registry
    // ========================================================================

    pub async fn get_client(&self, id: &str) -> Result<Option<ClientRecord>> {
        let Some(oid) = parse_oid(id) else {
            return Ok(None);
        };
        let client = self
            .clients
            .find_one(doc! { "_id": oid })
            .await
            .context("Failed to load client")?;
        Ok(client.map(Into::into))
    }

    pub async fn assign_client_branch(&self, client_id: &str, branch_id: &str) -> Result<()> {
        let client_oid = require_oid(client_id, "client")?;
        let branch_oid = require_oid(branch_id, "branch")?;
        self.clients
            .update_one(
                doc! { "_id": client_oid },
                doc! { "$set": { "branchId": branch_oid } },
            )
            .await
            .context("Failed to assign branch to client")?;
        Ok(())
    }

    // ========================================================================
    // Branch registry
    // ========================================================================

    pub async fn get_branch(&self, id: &str) -> Result<Option<BranchRecord>> {
        let Some(oid) = parse_oid(id) else {
            return Ok(None);
        };
        let branch = self
            .branches
            .find_one(doc! { "_id": oid })
            .await
            .context("Failed to load branch")?;
        Ok(branch.map(BranchDoc::into_record))
    }

    pub async fn find_default_branch(&self) -> Result<Option<BranchRecord>> {
        let branch = self
            .branches
            .find_one(doc! {})
            .sort(doc! { "_id": 1 })
            .await
            .context("Failed to load default branch")?;
        Ok(branch.map(BranchDoc::into_record))
    }

    pub async fn ensure_branch(&self, seed: &BranchSeed) -> Result<(BranchRecord, bool)> {
        if let Some(existing) = self.find_default_branch().await? {
            return Ok((existing, false));
        }

        let mut branch = BranchDoc::from_seed(seed);
        match self.branches.insert_one(&branch).await {
            Ok(res) => {
                branch.id = res.inserted_id.as_object_id();
                info!(code = %seed.code, "Created default branch");
                Ok((branch.into_record(), true))
            }
            Err(e) if is_duplicate_key(&e) => {
                debug!(code = %seed.code, "Default branch created concurrently");
                let existing = self
                    .find_default_branch()
                    .await?
                    .context("branch vanished after duplicate insert")?;
                Ok((existing, false))
            }
            Err(e) => Err(e).context("Failed to create default branch"),
        }
    }

    // ========================================================================
    // Trackers
    // ========================================================================

    pub async fn insert_tracker(&self, new: &NewTracker) -> Result<Option<VisaTracker>> {
        let client_id = require_oid(&new.client_id, "client")?;
        let branch_id = require_oid(&new.branch_id, "branch")?;

        // Derive the initial progress/status the same way a recompute would
        let initial = VisaTracker::new(String::new(), new);
        let now = DateTime::now();
        let mut doc = TrackerDoc {
            id: None,
            client_id,
            branch_id,
            agreement: initial.agreement,
            meeting: None,
            document_collection: None,
            visa_application: None,
            supporting_documents: None,
            payment: None,
            appointment: None,
            visa_outcome: None,
            overall_status: initial.overall_status,
            progress: initial.progress,
            created_at: now,
            updated_at: now,
        };

        match self.trackers.insert_one(&doc).await {
            Ok(res) => {
                doc.id = res.inserted_id.as_object_id();
                Ok(Some(doc.into()))
            }
            Err(e) if is_duplicate_key(&e) => Ok(None),
            Err(e) => Err(e).context("Failed to insert visa tracker"),
        }
    }

    pub async fn get_tracker(&self, client_id: &str) -> Result<Option<VisaTracker>> {
        let Some(oid) = parse_oid(client_id) else {
            return Ok(None);
        };
        let tracker = self
            .trackers
            .find_one(doc! { "clientId": oid })
            .await
            .context("Failed to load visa tracker")?;
        Ok(tracker.map(Into::into))
    }

    async fn find_trackers(&self, filter: Document) -> Result<Vec<VisaTracker>> {
        let docs: Vec<TrackerDoc> = self
            .trackers
            .find(filter)
            .sort(doc! { "createdAt": -1 })
            .await
            .context("Failed to query visa trackers")?
            .try_collect()
            .await
            .context("Failed to read visa trackers")?;
        Ok(docs.into_iter().map(Into::into).collect())
    }

    pub async fn list_trackers(&self) -> Result<Vec<VisaTracker>> {
        self.find_trackers(doc! {}).await
    }

    pub async fn list_trackers_by_branch(&self, branch_id: &str) -> Result<Vec<VisaTracker>> {
        let Some(oid) = parse_oid(branch_id) else {
            return Ok(Vec::new());
        };
        self.find_trackers(doc! { "branchId": oid }).await
    }

    pub async fn write_stage(
        &self,
        client_id: &str,
        record: &StageRecord,
    ) -> Result<Option<VisaTracker>> {
        let Some(oid) = parse_oid(client_id) else {
            return Ok(None);
        };
        let field = record.kind().field();
        let stage = bson::to_bson(record).with_context(|| format!("Failed to encode {}", field))?;

        let updated = self
            .trackers
            .find_one_and_update(doc! { "clientId": oid }, stage_update_pipeline(field, stage))
            .return_document(ReturnDocument::After)
            .await
            .with_context(|| format!("Failed to write {} stage", field))?;

        if updated.is_none() {
            warn!(client_id = %client_id, stage = field, "Stage write matched no tracker");
        }
        Ok(updated.map(Into::into))
    }

    pub async fn set_overall_status(
        &self,
        client_id: &str,
        status: OverallStatus,
        expected_percentage: u32,
    ) -> Result<Option<VisaTracker>> {
        let Some(oid) = parse_oid(client_id) else {
            return Ok(None);
        };
        let updated = self
            .trackers
            .find_one_and_update(
                doc! { "clientId": oid, "progress.percentage": expected_percentage as i64 },
                doc! { "$set": { "overallStatus": status.as_str(), "updatedAt": DateTime::now() } },
            )
            .return_document(ReturnDocument::After)
            .await
            .context("Failed to set overall status")?;
        Ok(updated.map(Into::into))
    }

    // ========================================================================
    // Agreement shadow
    // ========================================================================

    pub async fn upsert_shadow_agreement(&self, record: &AgreementRecord) -> Result<()> {
        let client_oid = require_oid(&record.client_id, "client")?;
        let branch_oid = require_oid(&record.branch_id, "branch")?;
        let agreement = bson::to_bson(&record.agreement).context("Failed to encode agreement")?;

        self.agreements
            .update_one(
                doc! { "clientId": client_oid },
                doc! {
                    "$set": {
                        "branchId": branch_oid,
                        "agreement": agreement,
                        "updatedAt": DateTime::now(),
                    }
                },
            )
            .upsert(true)
            .await
            .context("Failed to upsert visa agreement")?;
        Ok(())
    }

    pub async fn get_shadow_agreement(&self, client_id: &str) -> Result<Option<AgreementRecord>> {
        let Some(oid) = parse_oid(client_id) else {
            return Ok(None);
        };
        let doc = self
            .agreements
            .find_one(doc! { "clientId": oid })
            .await
            .context("Failed to load visa agreement")?;
        Ok(doc.map(Into::into))
    }

    pub async fn health_check(&self) -> Result<bool> {
        Ok(self.db.run_command(doc! { "ping": 1 }).await.is_ok())
    }
}
