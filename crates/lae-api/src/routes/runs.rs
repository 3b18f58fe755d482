use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::dto::{CreateReplacementRequest, CreateSignupRequest, RunAccepted};
use crate::error::ApiError;
use crate::runs::{Run, RunKind};
use crate::state::AppState;

pub async fn create_signup(
    State(state): State<AppState>,
    Json(req): Json<CreateSignupRequest>,
) -> Result<(StatusCode, Json<RunAccepted>), ApiError> {
    if req.activation_key.trim().is_empty() {
        return Err(ApiError::BadRequest("activation_key must not be empty".into()));
    }

    // Catalog errors refuse the run before anything is spawned.
    let request = state.provisioner.signup_request(req.into())?;
    let run_id = state
        .runs
        .spawn(state.provisioner.clone(), RunKind::Signup, request)
        .await;

    Ok((StatusCode::ACCEPTED, Json(RunAccepted { run_id })))
}

pub async fn create_replacement(
    State(state): State<AppState>,
    Json(req): Json<CreateReplacementRequest>,
) -> Result<(StatusCode, Json<RunAccepted>), ApiError> {
    if req.secrets.bucket_name.trim().is_empty() {
        return Err(ApiError::BadRequest("secrets.bucket_name must not be empty".into()));
    }

    let request = state.provisioner.replace_request(req.into());
    let run_id = state
        .runs
        .spawn(state.provisioner.clone(), RunKind::Replacement, request)
        .await;

    Ok((StatusCode::ACCEPTED, Json(RunAccepted { run_id })))
}

pub async fn get_run(State(state): State<AppState>, Path(run_id): Path<Uuid>) -> Result<Json<Run>, ApiError> {
    state.runs.get(run_id).await.map(Json).ok_or(ApiError::NotFound)
}
