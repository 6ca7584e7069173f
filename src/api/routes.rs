use crate::api::api_error::APIError;
use crate::api::model::BindingResult;
use crate::api::server::AppState;
use crate::binding_store::BindingStore;
use crate::error::Error;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_extra::extract::WithRejection;
use serde_json::json;
use std::collections::BTreeMap;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub(super) fn new(state: AppState) -> Router {
    Router::new()
        .route("/healthcheck", get(health_check))
        .route("/dyndns", get(bindings))
        .route("/dyndns/:domain", get(binding))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.api_timeout))
        .with_state(state)
}

#[allow(clippy::unused_async)]
async fn health_check() -> impl IntoResponse {
    Json(json!({"ok":"healthy"}))
}

#[allow(clippy::unused_async)]
async fn bindings(State(state): State<AppState>) -> Json<BTreeMap<String, String>> {
    Json(state.store.snapshot())
}

#[allow(clippy::unused_async)]
async fn binding(
    State(state): State<AppState>,
    WithRejection(Path(domain), _): WithRejection<Path<String>, APIError>,
) -> Result<Json<BindingResult>, APIError> {
    let domain = domain.to_ascii_lowercase();
    match state.store.get(&domain) {
        Some(address) => Ok(Json(BindingResult { domain, address })),
        None => {
            tracing::debug!("no dynamic binding for \"{domain}\"");
            Err(Error::UnknownDomain(domain).into())
        }
    }
}
