use axum::{
    body::Body,
    extract::{OriginalUri, Path, State},
    http::{Method, Request},
    routing::{get, post, put},
    Json, Router,
};
use iris_core::IrisError;
use serde_json::{json, Value};

use crate::pipeline::{self, Identity, UploadResponse};
use crate::{ApiError, IrisState};

pub fn routes(state: IrisState) -> Router<()> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/1i", post(create))
        .route("/v1/1i/{id}", put(replace).delete(remove))
        .fallback(not_found)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "message": "OK" }))
}

async fn create(
    State(state): State<IrisState>,
    request: Request<Body>,
) -> Result<Json<UploadResponse>, ApiError> {
    pipeline::upload(&state, Identity::Generate, request)
        .await
        .map(Json)
        .map_err(|e| state.api_error(e))
}

async fn replace(
    State(state): State<IrisState>,
    Path(id): Path<String>,
    request: Request<Body>,
) -> Result<Json<UploadResponse>, ApiError> {
    pipeline::upload(&state, Identity::Provided(id), request)
        .await
        .map(Json)
        .map_err(|e| state.api_error(e))
}

async fn remove(
    State(state): State<IrisState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    pipeline::delete(&state, &id)
        .await
        .map_err(|e| state.api_error(e))?;
    Ok(Json(json!({ "message": "OK" })))
}

async fn not_found(State(state): State<IrisState>, method: Method, OriginalUri(uri): OriginalUri) -> ApiError {
    state.api_error(IrisError::not_found(format!("no route for {method} {uri}")))
}
