use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use aws_api::RecordSetFilter;

use crate::dto::{RecordResponse, RecordSetsQuery, record_sets_response};
use crate::error::ApiError;
use crate::state::AppState;

pub async fn list_record_sets(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
    Query(query): Query<RecordSetsQuery>,
) -> Result<Json<BTreeMap<String, Vec<RecordResponse>>>, ApiError> {
    let filter = RecordSetFilter::from(query);
    let sets = state.dns.lookup_record_sets(&zone_id, &filter).await?;
    Ok(Json(record_sets_response(&sets)))
}
