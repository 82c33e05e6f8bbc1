//! Visa Tracker
//!
//! Per-client visa processing tracker for a consulting CRM:
//! - Eight stage sub-documents with derived completion
//! - Progress roll-up over the seven counted stages
//! - MongoDB persistence with GridFS for uploaded documents
//! - REST API with an SSE feed of tracker changes

pub mod api;
pub mod blob;
pub mod events;
pub mod mongo;
pub mod tracker;

#[cfg(test)]
pub(crate) mod test_helpers;

use anyhow::{Context, Result};
use blob::{BlobStore, GridFsBlobStore};
use events::EventBus;
use mongo::{MongoStore, TrackerStore};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracker::{BranchRecord, BranchSeed, TrackerManager};

/// Default per-file upload limit (5 MiB)
pub const DEFAULT_UPLOAD_MAX_BYTES: usize = 5 * 1024 * 1024;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: ServerYamlConfig,
    pub mongodb: MongoYamlConfig,
    pub uploads: UploadsYamlConfig,
    /// Branch created at startup when the branch registry is empty
    pub default_branch: Option<BranchSeed>,
}

/// Server configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerYamlConfig {
    pub port: u16,
}

impl Default for ServerYamlConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// MongoDB configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MongoYamlConfig {
    pub uri: String,
    pub database: String,
}

impl Default for MongoYamlConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".into(),
            database: "visa_crm".into(),
        }
    }
}

/// Upload configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadsYamlConfig {
    /// GridFS bucket name
    pub bucket: String,
    /// Per-file size limit in bytes
    pub max_bytes: usize,
}

impl Default for UploadsYamlConfig {
    fn default() -> Self {
        Self {
            bucket: "uploads".into(),
            max_bytes: DEFAULT_UPLOAD_MAX_BYTES,
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub mongo_uri: String,
    pub mongo_database: String,
    pub upload_bucket: String,
    pub upload_max_bytes: usize,
    pub default_branch: Option<BranchSeed>,
}

impl Config {
    /// Load configuration from env vars and `config.yaml` in CWD, if present.
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        let upload_max_bytes = match std::env::var("UPLOAD_MAX_BYTES") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("UPLOAD_MAX_BYTES is not a byte count: {}", raw))?,
            Err(_) => yaml.uploads.max_bytes,
        };

        Ok(Self {
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.server.port),
            mongo_uri: std::env::var("MONGO_URI").unwrap_or(yaml.mongodb.uri),
            mongo_database: std::env::var("MONGO_DATABASE").unwrap_or(yaml.mongodb.database),
            upload_bucket: std::env::var("UPLOAD_BUCKET").unwrap_or(yaml.uploads.bucket),
            upload_max_bytes,
            default_branch: yaml.default_branch,
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = PathBuf::from("config.yaml");
        let path = yaml_path.unwrap_or(&default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TrackerStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Connect to MongoDB and open the upload bucket
    pub async fn new(config: Config) -> Result<Self> {
        let mongo = MongoStore::connect(&config.mongo_uri, &config.mongo_database).await?;
        let blobs = GridFsBlobStore::new(&mongo.database(), &config.upload_bucket);

        Ok(Self {
            store: Arc::new(mongo),
            blobs: Arc::new(blobs),
            config: Arc::new(config),
        })
    }
}

/// Make sure a branch exists, creating the configured default when the
/// registry is empty. Returns None when nothing exists and nothing is configured.
pub async fn seed_default_branch(
    store: &dyn TrackerStore,
    seed: Option<&BranchSeed>,
) -> Result<Option<BranchRecord>> {
    if let Some(existing) = store.find_default_branch().await? {
        tracing::debug!(branch_id = %existing.id, "Default branch present");
        return Ok(Some(existing));
    }
    let Some(seed) = seed else {
        tracing::warn!(
            "No branch exists and no default_branch is configured; \
             trackers for branchless clients cannot be created"
        );
        return Ok(None);
    };

    let (branch, created) = store.ensure_branch(seed).await?;
    if created {
        tracing::info!(
            branch_id = %branch.id,
            branch_name = %branch.branch_name,
            "Created default branch"
        );
    }
    Ok(Some(branch))
}

/// Start the HTTP server and serve until ctrl-c
pub async fn start_server(config: Config) -> Result<()> {
    let port = config.server_port;
    let state = AppState::new(config).await?;
    seed_default_branch(state.store.as_ref(), state.config.default_branch.as_ref()).await?;

    let event_bus = EventBus::default();
    let manager = TrackerManager::with_event_emitter(
        state.store.clone(),
        state.blobs.clone(),
        Arc::new(event_bus.clone()),
    );
    let server_state = Arc::new(api::handlers::ServerState {
        manager: Arc::new(manager),
        event_bus,
        blobs: state.blobs.clone(),
        upload_limits: api::upload::UploadLimits::new(state.config.upload_max_bytes),
    });
    let app = api::create_router(server_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Visa tracker listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for ctrl-c: {}", e);
            }
            tracing::info!("Shutting down");
        })
        .await
        .context("Server error")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod config_tests {
    use super::*;
    use crate::mongo::mock::MockTrackerStore;
    use crate::test_helpers::test_branch;
    use std::io::Write;

    fn seed() -> BranchSeed {
        serde_yaml::from_str(
            r#"
branch_name: Indore Branch
branch_location: Indore, MP
code: IND001
email: indore@example.com
contact_no: "+91-731-0000000"
head:
  name: Branch Head
  contact_no: "+91-731-0000001"
  email: head@example.com
  gender: Other
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_yaml_config_loading() {
        let yaml = r#"
server:
  port: 9090

mongodb:
  uri: mongodb://db:27017
  database: crm

uploads:
  bucket: documents
  max_bytes: 1048576

default_branch:
  branch_name: Indore Branch
  branch_location: Indore
  code: IND001
  email: indore@example.com
  contact_no: "0731"
  head:
    name: Head
    contact_no: "0731"
    email: head@example.com
    gender: Female
"#;

        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.mongodb.uri, "mongodb://db:27017");
        assert_eq!(config.mongodb.database, "crm");
        assert_eq!(config.uploads.bucket, "documents");
        assert_eq!(config.uploads.max_bytes, 1048576);
        let branch = config.default_branch.unwrap();
        assert_eq!(branch.code, "IND001");
        assert_eq!(branch.head.gender, "Female");
    }

    #[test]
    fn test_yaml_defaults() {
        let config = YamlConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.mongodb.uri, "mongodb://localhost:27017");
        assert_eq!(config.mongodb.database, "visa_crm");
        assert_eq!(config.uploads.bucket, "uploads");
        assert_eq!(config.uploads.max_bytes, 5 * 1024 * 1024);
        assert!(config.default_branch.is_none());
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let yaml = r#"
mongodb:
  database: staging
"#;
        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.mongodb.database, "staging");
        assert_eq!(config.mongodb.uri, "mongodb://localhost:27017");
        assert_eq!(config.server.port, 8080);
    }

    /// YAML loading, env overrides and fallbacks in one test to avoid
    /// parallel env var races.
    #[test]
    fn test_yaml_and_env_lifecycle() {
        fn clear_env() {
            for var in &[
                "SERVER_PORT",
                "MONGO_URI",
                "MONGO_DATABASE",
                "UPLOAD_BUCKET",
                "UPLOAD_MAX_BYTES",
            ] {
                std::env::remove_var(var);
            }
        }

        // --- Phase 1: YAML values loaded correctly ---
        let yaml = r#"
server:
  port: 9999
mongodb:
  uri: mongodb://yaml-host:27017
  database: yaml-db
uploads:
  bucket: yaml-bucket
"#;
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&file_path).unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        clear_env();

        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.server_port, 9999);
        assert_eq!(config.mongo_uri, "mongodb://yaml-host:27017");
        assert_eq!(config.mongo_database, "yaml-db");
        assert_eq!(config.upload_bucket, "yaml-bucket");
        assert_eq!(config.upload_max_bytes, DEFAULT_UPLOAD_MAX_BYTES);

        // --- Phase 2: Env vars override YAML ---
        std::env::set_var("MONGO_URI", "mongodb://env-host:27017");
        std::env::set_var("SERVER_PORT", "7777");
        std::env::set_var("UPLOAD_MAX_BYTES", "2048");

        let config = Config::from_yaml_and_env(Some(&file_path)).unwrap();
        assert_eq!(config.mongo_uri, "mongodb://env-host:27017");
        assert_eq!(config.server_port, 7777);
        assert_eq!(config.upload_max_bytes, 2048);
        assert_eq!(config.mongo_database, "yaml-db");

        // --- Phase 3: A malformed limit is an error, not a silent default ---
        std::env::set_var("UPLOAD_MAX_BYTES", "lots");
        assert!(Config::from_yaml_and_env(Some(&file_path)).is_err());

        clear_env();

        // --- Phase 4: Invalid YAML falls back to defaults ---
        let broken = dir.path().join("broken.yaml");
        std::fs::write(&broken, "server: [not, a, map").unwrap();
        let config = Config::from_yaml_and_env(Some(&broken)).unwrap();
        assert_eq!(config.server_port, 8080);

        // --- Phase 5: No YAML file means defaults ---
        let nonexistent = Path::new("/tmp/nonexistent-visa-tracker-config-12345.yaml");
        let config = Config::from_yaml_and_env(Some(nonexistent)).unwrap();
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.mongo_uri, "mongodb://localhost:27017");
        assert!(config.default_branch.is_none());
    }

    #[tokio::test]
    async fn test_seed_creates_branch_when_registry_empty() {
        let store = MockTrackerStore::new();
        let branch = seed_default_branch(&store, Some(&seed()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(branch.branch_name, "Indore Branch");
        assert_eq!(store.branches.read().await.len(), 1);

        // Seeding again is a no-op
        seed_default_branch(&store, Some(&seed())).await.unwrap();
        assert_eq!(store.branches.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_seed_keeps_existing_branch() {
        let existing = test_branch("Head Office");
        let store = MockTrackerStore::new().with_branch(existing.clone()).await;
        let branch = seed_default_branch(&store, Some(&seed()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(branch, existing);
        assert_eq!(store.branches.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_seed_without_config_is_none() {
        let store = MockTrackerStore::new();
        assert!(seed_default_branch(&store, None).await.unwrap().is_none());
    }
}
