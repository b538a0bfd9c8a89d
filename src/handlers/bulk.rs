use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::bulk::BulkService;
use crate::database::models::{BulkOperation, EntryStatus, User};
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::store::EntryStore;

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub entry_ids: Vec<i64>,
    pub status: EntryStatus,
}

#[derive(Debug, Deserialize)]
pub struct AssignmentRequest {
    pub entry_ids: Vec<i64>,
    pub supervisor_id: i64,
}

fn operation_payload(operation: &BulkOperation) -> Value {
    json!({
        "operation": operation.operation,
        "status": operation.status,
        "success_count": operation.success_count,
        "failure_count": operation.failure_count,
        "details": operation.details,
        "created_at": operation.created_at,
        "completed_at": operation.completed_at,
    })
}

fn validate_entry_ids(entry_ids: &[i64]) -> Result<(), ApiError> {
    if entry_ids.is_empty() {
        return Err(ApiError::bad_request("entry_ids must not be empty"));
    }
    if entry_ids.iter().any(|id| *id < 1) {
        return Err(ApiError::bad_request("entry_ids must be positive"));
    }
    Ok(())
}

/// POST /api/bulk/review - set the review status of many entries at once
pub async fn bulk_review<S: EntryStore>(
    State(state): State<AppState<S>>,
    Extension(actor): Extension<User>,
    Json(request): Json<ReviewRequest>,
) -> Result<Json<Value>, ApiError> {
    validate_entry_ids(&request.entry_ids)?;
    let service = BulkService::new(state.store.clone(), actor)?;
    let operation = service
        .review_entries(&request.entry_ids, request.status)
        .await?;
    Ok(Json(operation_payload(&operation)))
}

/// POST /api/bulk/assignment - reassign many entries to one supervisor
pub async fn bulk_assignment<S: EntryStore>(
    State(state): State<AppState<S>>,
    Extension(actor): Extension<User>,
    Json(request): Json<AssignmentRequest>,
) -> Result<Json<Value>, ApiError> {
    validate_entry_ids(&request.entry_ids)?;
    let supervisor = state
        .store
        .find_supervisor(request.supervisor_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Supervisor not found"))?;
    let service = BulkService::new(state.store.clone(), actor)?;
    let operation = service
        .assign_supervisor(&request.entry_ids, &supervisor)
        .await?;
    Ok(Json(operation_payload(&operation)))
}

/// POST /api/bulk/import - import logbook entries from an uploaded file.
/// Multipart fields: `file` (required), `dry_run` (default true),
/// `allow_partial` (default false). Responds 400 when the operation
/// finalizes as failed (strict-mode rollback).
pub async fn bulk_import<S: EntryStore>(
    State(state): State<AppState<S>>,
    Extension(actor): Extension<User>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut dry_run = true;
    let mut allow_partial = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {e}")))?;
                upload = Some((filename, bytes.to_vec()));
            }
            "dry_run" => dry_run = parse_bool_field("dry_run", field).await?,
            "allow_partial" => allow_partial = parse_bool_field("allow_partial", field).await?,
            _ => {}
        }
    }

    let (filename, bytes) =
        upload.ok_or_else(|| ApiError::bad_request("file field is required"))?;

    let service = BulkService::new(state.store.clone(), actor)?;
    let operation = service
        .import_entries(&filename, &bytes, dry_run, allow_partial)
        .await?;

    let status = if operation.is_completed() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    Ok((status, Json(operation_payload(&operation))).into_response())
}

async fn parse_bool_field(
    name: &str,
    field: axum::extract::multipart::Field<'_>,
) -> Result<bool, ApiError> {
    let text = field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read {name}: {e}")))?;
    match text.trim() {
        "true" | "True" | "1" => Ok(true),
        "false" | "False" | "0" => Ok(false),
        other => Err(ApiError::bad_request(format!(
            "{name} must be a boolean, got '{other}'"
        ))),
    }
}
