//! HTTP query API over the capture store

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::store::MailStore;

/// Build the query router. All endpoints are read-only.
pub fn router(store: Arc<MailStore>) -> Router {
    Router::new()
        .route("/", get(list_all))
        .route("/search/{field}", get(search))
        .with_state(store)
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    email: Option<String>,
}

/// GET / - every captured mail as a JSON array, in capture order
async fn list_all(State(store): State<Arc<MailStore>>) -> Response {
    let views = store.get_all_data();
    debug!(count = views.len(), "listing captured mail");
    Json(views).into_response()
}

/// GET /search/{field}?email=... - captured mail matching the given address
async fn search(
    State(store): State<Arc<MailStore>>,
    Path(field): Path<String>,
    Query(params): Query<SearchParams>,
) -> Response {
    let email = match params.email.as_deref() {
        Some(email) if !email.trim().is_empty() => email,
        _ => return error_response("missing required parameter: email"),
    };

    if !email.contains('@') {
        return error_response("invalid email format");
    }

    match store.search_by_field(&field, email) {
        Ok(views) => Json(views).into_response(),
        Err(e) => error_response(&e.to_string()),
    }
}

fn error_response(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}
