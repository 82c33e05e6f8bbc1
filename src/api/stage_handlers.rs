//! Stage and agreement handlers

use super::handlers::{validate_object_id, ApiResponse, AppError, TrackerState};
use super::upload::StageBody;
use crate::tracker::{AgreementUpdate, AgreementView, StageKind, StageRecord, StageUpdate};
use axum::extract::{Path, State};
use axum::Json;

fn parse_stage(raw: &str) -> Result<StageKind, AppError> {
    Ok(raw.parse::<StageKind>()?)
}

/// Upsert one stage (JSON or multipart). POST and PUT behave the same.
pub async fn upsert_stage(
    State(state): State<TrackerState>,
    Path((client_id, stage)): Path<(String, String)>,
    body: StageBody,
) -> Result<Json<ApiResponse<StageUpdate>>, AppError> {
    let kind = parse_stage(&stage)?;
    validate_object_id(&client_id, "clientId")?;
    body.check_file_parts(kind)?;

    let update = state
        .manager
        .upsert_stage(&client_id, kind, body.payload, body.files)
        .await?;
    Ok(ApiResponse::with_message(
        update,
        format!("{} updated", kind.field()),
    ))
}

/// Read one stage
pub async fn get_stage(
    State(state): State<TrackerState>,
    Path((client_id, stage)): Path<(String, String)>,
) -> Result<Json<ApiResponse<StageRecord>>, AppError> {
    let kind = parse_stage(&stage)?;
    validate_object_id(&client_id, "clientId")?;
    let record = state.manager.get_stage(&client_id, kind).await?;
    Ok(ApiResponse::ok(record))
}

/// Branch-aware agreement upsert, mirrored into the agreement collection
pub async fn upsert_agreement(
    State(state): State<TrackerState>,
    Path(client_id): Path<String>,
    body: StageBody,
) -> Result<Json<ApiResponse<AgreementUpdate>>, AppError> {
    validate_object_id(&client_id, "clientId")?;
    body.check_file_parts(StageKind::Agreement)?;

    let update = state
        .manager
        .upsert_agreement(&client_id, body.payload, body.files)
        .await?;
    Ok(ApiResponse::with_message(update, "Agreement saved"))
}

/// Agreement of a client, falling back to the agreement collection
pub async fn get_agreement(
    State(state): State<TrackerState>,
    Path(client_id): Path<String>,
) -> Result<Json<ApiResponse<AgreementView>>, AppError> {
    validate_object_id(&client_id, "clientId")?;
    let view = state.manager.get_agreement(&client_id).await?;
    Ok(ApiResponse::ok(view))
}
