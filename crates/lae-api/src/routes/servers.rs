use axum::Json;
use axum::extract::{Path, State};
use lae_db::models::Server;
use sqlx::PgPool;

use crate::dto::ServerResponse;
use crate::error::ApiError;
use crate::state::AppState;

fn db(state: &AppState) -> Result<&PgPool, ApiError> {
    state
        .db
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("server log is not stored in a database".into()))
}

pub async fn list_servers(State(state): State<AppState>) -> Result<Json<Vec<ServerResponse>>, ApiError> {
    let servers = Server::list(db(&state)?).await?;
    Ok(Json(servers.into_iter().map(ServerResponse::from).collect()))
}

pub async fn get_server(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
) -> Result<Json<ServerResponse>, ApiError> {
    let server = Server::get_by_instance_id(db(&state)?, &instance_id).await?;
    Ok(Json(server.into()))
}
