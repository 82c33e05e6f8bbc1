//! API request handlers

use super::upload::UploadLimits;
use crate::blob::BlobStore;
use crate::events::EventBus;
use crate::tracker::{
    CreateTrackerRequest, SetOverallStatusRequest, TrackerDetails, TrackerError, TrackerManager,
    VisaTracker,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bson::oid::ObjectId;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, warn};

/// Shared server state
pub struct ServerState {
    pub manager: Arc<TrackerManager>,
    /// Local broadcast bus feeding the SSE stream
    pub event_bus: EventBus,
    /// Blob store used for file downloads
    pub blobs: Arc<dyn BlobStore>,
    pub upload_limits: UploadLimits,
}

/// Shared tracker state
pub type TrackerState = Arc<ServerState>;

// ============================================================================
// Response envelope
// ============================================================================

/// Success envelope: `{success: true, data, message?}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            message: None,
        })
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            message: Some(message.into()),
        })
    }
}

/// Reject ids that can never match a stored document
pub fn validate_object_id(raw: &str, what: &str) -> Result<(), AppError> {
    ObjectId::parse_str(raw)
        .map(|_| ())
        .map_err(|_| AppError::BadRequest(format!("Invalid {}", what)))
}

// ============================================================================
// Health check
// ============================================================================

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub mongodb: String,
}

/// Health check handler.
///
/// Returns 200 + `"ok"` when MongoDB answers a ping, 503 + `"unhealthy"` otherwise.
pub async fn health(State(state): State<TrackerState>) -> (StatusCode, Json<HealthResponse>) {
    let mongo_ok = match state.manager.health_check().await {
        Ok(ok) => ok,
        Err(e) => {
            warn!(error = %e, "Health check failed");
            false
        }
    };
    let (status_code, status) = if mongo_ok {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            mongodb: if mongo_ok { "connected" } else { "disconnected" }.to_string(),
        }),
    )
}

// ============================================================================
// Trackers
// ============================================================================

/// Create a tracker explicitly (201, or 409 if the client already has one)
pub async fn create_tracker(
    State(state): State<TrackerState>,
    payload: Result<Json<CreateTrackerRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<VisaTracker>>), AppError> {
    let Json(req) = payload?;
    if !req.client_id.trim().is_empty() {
        validate_object_id(&req.client_id, "clientId")?;
    }
    if !req.branch_id.trim().is_empty() {
        validate_object_id(&req.branch_id, "branchId")?;
    }

    let tracker = state.manager.create_tracker(req).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message(tracker, "Visa tracker created"),
    ))
}

/// Get a client's tracker, creating it on first access
pub async fn get_tracker(
    State(state): State<TrackerState>,
    Path(client_id): Path<String>,
) -> Result<Json<ApiResponse<TrackerDetails>>, AppError> {
    validate_object_id(&client_id, "clientId")?;
    let details = state.manager.get_or_create_tracker(&client_id).await?;
    Ok(ApiResponse::ok(details))
}

/// Put a tracker on hold, or release the hold
pub async fn set_overall_status(
    State(state): State<TrackerState>,
    Path(client_id): Path<String>,
    payload: Result<Json<SetOverallStatusRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<VisaTracker>>, AppError> {
    validate_object_id(&client_id, "clientId")?;
    let Json(req) = payload?;
    let tracker = state
        .manager
        .set_overall_status(&client_id, req.overall_status)
        .await?;
    Ok(ApiResponse::with_message(tracker, "Overall status updated"))
}

/// List all trackers, newest first
pub async fn list_trackers(
    State(state): State<TrackerState>,
) -> Result<Json<ApiResponse<Vec<TrackerDetails>>>, AppError> {
    let trackers = state.manager.list_trackers().await?;
    Ok(ApiResponse::ok(trackers))
}

/// List the trackers of one branch, newest first
pub async fn list_branch_trackers(
    State(state): State<TrackerState>,
    Path(branch_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<TrackerDetails>>>, AppError> {
    validate_object_id(&branch_id, "branchId")?;
    let trackers = state.manager.list_branch_trackers(&branch_id).await?;
    Ok(ApiResponse::ok(trackers))
}

// ============================================================================
// Error handling
// ============================================================================

/// Application error type, rendered as `{success: false, message}`
#[derive(Debug)]
pub enum AppError {
    Internal(anyhow::Error),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    BadGateway(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::Internal(e) => {
                error!(error = %format!("{:#}", e), "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(serde_json::json!({
            "success": false,
            "message": message
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<TrackerError> for AppError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::Validation(msg) => AppError::BadRequest(msg),
            TrackerError::NotFound(msg) => AppError::NotFound(msg),
            TrackerError::Conflict(msg) => AppError::Conflict(msg),
            upstream @ TrackerError::Upstream(_) => {
                warn!(error = %upstream, "Upstream failure");
                AppError::BadGateway(upstream.to_string())
            }
            TrackerError::FatalConfig(msg) => AppError::Internal(anyhow::anyhow!(msg)),
            TrackerError::Store(e) => AppError::Internal(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}
