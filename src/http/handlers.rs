//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use super::state::ServerState;
use crate::payload::{Payload, ResourceId};
use crate::response::{display_name, ApiResponse};

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.body)).into_response()
    }
}

fn unknown_resource(resource: &str) -> ApiResponse {
    ApiResponse::error(404, format!("Unknown resource '{resource}'"))
}

/// GET /{resource}/{id}
#[tracing::instrument(skip_all, fields(%resource, %id))]
pub async fn show_record(
    State(state): State<Arc<ServerState>>,
    Path((resource, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResponse {
    if let Err(response) = state.authorize(&headers) {
        return response;
    }

    let id = ResourceId::parse(&id);
    match state.store().find(&resource, &id) {
        Ok(Some(record)) => ApiResponse::ok(&record),
        Ok(None) => ApiResponse::not_found(&display_name(&resource)),
        Err(_) => unknown_resource(&resource),
    }
}

/// PUT|PATCH /{resource}/{id}
#[tracing::instrument(skip_all, fields(%resource, %id))]
pub async fn update_record(
    State(state): State<Arc<ServerState>>,
    Path((resource, id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResponse {
    if let Err(response) = state.authorize(&headers) {
        return response;
    }

    if !state.store().has_table(&resource) {
        return unknown_resource(&resource);
    }

    let payload = match body {
        Ok(Json(value)) => match Payload::from_value(value) {
            Ok(payload) => payload,
            Err(e) => return ApiResponse::error(422, e.to_string()),
        },
        Err(rejection) => {
            return ApiResponse::error(rejection.status().as_u16(), rejection.body_text());
        }
    };

    let workflow = state.workflow(&resource);
    let _writer = state.lock_writes().await;
    let response = workflow.update(payload, ResourceId::parse(&id)).await;

    tracing::info!(status = response.status, "update handled");
    response
}

/// GET /health
pub async fn health_check() -> &'static str {
    "ok"
}
