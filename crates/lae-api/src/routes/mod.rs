pub mod dns;
pub mod runs;
pub mod servers;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};

use crate::auth::auth_middleware;
use crate::state::AppState;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Provisioning
        .route("/signups", post(runs::create_signup))
        .route("/replacements", post(runs::create_replacement))
        .route("/runs/{id}", get(runs::get_run))
        // Server log
        .route("/servers", get(servers::list_servers))
        .route("/servers/{instance_id}", get(servers::get_server))
        // DNS read path
        .route("/dns/zones/{zone_id}/rrsets", get(dns::list_record_sets))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
