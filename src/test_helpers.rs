//! Test helper factories and mock state builders
//!
//! Convenience functions for creating registry records and uploads with
//! sensible defaults, and for building a mock-backed `ServerState`.
#![allow(dead_code)]

use crate::api::handlers::{ServerState, TrackerState};
use crate::api::upload::UploadLimits;
use crate::blob::mock::MockBlobStore;
use crate::blob::UploadedFile;
use crate::events::EventBus;
use crate::mongo::mock::MockTrackerStore;
use crate::tracker::{BranchRecord, ClientRecord, TrackerManager};
use bson::oid::ObjectId;
use std::sync::Arc;

/// Minimal bytes that pass as a PDF
pub const PDF_BYTES: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\ntrailer\n<<>>\n%%EOF\n";

// ============================================================================
// Mock state builders
// ============================================================================

/// Mock-backed server state plus handles on its collaborators
pub struct MockServer {
    pub state: TrackerState,
    pub store: Arc<MockTrackerStore>,
    pub blobs: Arc<MockBlobStore>,
    pub bus: EventBus,
}

/// Build a `ServerState` over the given in-memory stores
pub fn mock_server_with(store: MockTrackerStore, blobs: MockBlobStore) -> MockServer {
    let store = Arc::new(store);
    let blobs = Arc::new(blobs);
    let bus = EventBus::default();
    let manager = TrackerManager::with_event_emitter(
        store.clone(),
        blobs.clone(),
        Arc::new(bus.clone()),
    );
    let state = Arc::new(ServerState {
        manager: Arc::new(manager),
        event_bus: bus.clone(),
        blobs: blobs.clone(),
        upload_limits: UploadLimits::default(),
    });
    MockServer {
        state,
        store,
        blobs,
        bus,
    }
}

/// Build a `ServerState` with empty in-memory stores
pub fn mock_server() -> MockServer {
    mock_server_with(MockTrackerStore::new(), MockBlobStore::new())
}

// ============================================================================
// Record factories
// ============================================================================

/// Fresh ObjectId hex string
pub fn test_oid() -> String {
    ObjectId::new().to_hex()
}

/// Create a test branch with the given name
pub fn test_branch(name: &str) -> BranchRecord {
    BranchRecord {
        id: test_oid(),
        branch_name: name.to_string(),
        branch_location: format!("{} Road", name),
    }
}

/// Create a test client, optionally already assigned to a branch
pub fn test_client(branch_id: Option<&str>) -> ClientRecord {
    let id = test_oid();
    ClientRecord {
        email: format!("client-{}@example.com", &id[18..]),
        id,
        first_name: "Asha".to_string(),
        last_name: "Verma".to_string(),
        phone: Some("+91-98000-00000".to_string()),
        branch_id: branch_id.map(str::to_string),
    }
}

/// A small PDF upload arriving under `field`
pub fn pdf_upload(field: &str, filename: &str) -> UploadedFile {
    UploadedFile {
        field: field.to_string(),
        filename: filename.to_string(),
        content_type: "application/pdf".to_string(),
        bytes: PDF_BYTES.to_vec(),
    }
}
