//! HTTP API for the directory service
//!
//! The wire contract in one screen:
//!
//! - `PUT /{hostname}` ingests the request body as the host's catalog,
//!   answering `204` with no body
//! - `DELETE /{hostname}` removes the host, `204`, or `404` if unknown
//! - `GET /?resource=<ref-or-type>` answers the list of declaring
//!   hostnames; adding `&parameters=1` answers the title-to-parameters
//!   mapping instead
//! - `GET /_health` liveness
//!
//! Every response that carries a body is YAML. Validation failures are
//! `400` with an `error` document; storage trouble is `500`.

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::Router;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::directory::ResourceDirectory;
use crate::error::Error;
use crate::models::{Hostname, QueryKey};

/// Content type of every body-carrying response.
pub const CONTENT_TYPE_YAML: &str = "application/x-yaml";

// ============================================================================
// Application State
// ============================================================================

/// Shared application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    /// The directory every request operates on
    pub directory: Arc<ResourceDirectory>,
    /// Server start time, for the health payload
    pub start_time: Instant,
}

// ============================================================================
// Router
// ============================================================================

/// Create the service router with all routes configured.
///
/// The liveness path starts with an underscore, which the hostname
/// grammar forbids, so it can never swallow a host's PUT/DELETE routes.
pub fn create_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", get(query))
        .route("/_health", get(health))
        .route("/{hostname}", put(ingest).delete(remove))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query-string arguments accepted by `GET /`.
#[derive(Debug, Deserialize)]
struct QueryParams {
    /// `Type[Title]` reference or bare type name
    resource: Option<String>,
    /// Any present value switches the response to parameter mappings
    parameters: Option<String>,
}

/// Error document serialized into 4xx/5xx bodies.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Liveness payload for `GET /_health`.
#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
}

// ============================================================================
// Handlers
// ============================================================================

/// `PUT /{hostname}`: ingest a catalog document.
async fn ingest(
    State(state): State<AppState>,
    Path(hostname): Path<String>,
    body: Bytes,
) -> Response {
    let host = match hostname.parse::<Hostname>() {
        Ok(host) => host,
        Err(e) => return error_response(&e),
    };
    match state.directory.ingest(&host, &body).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}

/// `DELETE /{hostname}`: remove a host from the directory.
async fn remove(State(state): State<AppState>, Path(hostname): Path<String>) -> Response {
    let host = match hostname.parse::<Hostname>() {
        Ok(host) => host,
        Err(e) => return error_response(&e),
    };
    match state.directory.delete(&host).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}

/// `GET /`: look up the hosts declaring a resource, or their parameters.
async fn query(State(state): State<AppState>, Query(params): Query<QueryParams>) -> Response {
    let key = match params.resource.unwrap_or_default().parse::<QueryKey>() {
        Ok(key) => key,
        Err(e) => return error_response(&e),
    };
    if params.parameters.is_some() {
        match state.directory.collect_parameters(&key) {
            Ok(mapping) => yaml_response(StatusCode::OK, &mapping),
            Err(e) => error_response(&e),
        }
    } else {
        match state.directory.lookup(&key) {
            Ok(hosts) => yaml_response(StatusCode::OK, &hosts),
            Err(e) => error_response(&e),
        }
    }
}

/// `GET /_health`: liveness and uptime.
async fn health(State(state): State<AppState>) -> Response {
    yaml_response(
        StatusCode::OK,
        &HealthBody {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs: state.start_time.elapsed().as_secs(),
        },
    )
}

// ============================================================================
// Response Helpers
// ============================================================================

/// Serialize `value` into a YAML response with the given status.
fn yaml_response<T: Serialize>(status: StatusCode, value: &T) -> Response {
    match serde_yaml_ng::to_string(value) {
        Ok(body) => (status, [(header::CONTENT_TYPE, CONTENT_TYPE_YAML)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "response serialization failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Map a directory error onto the HTTP contract.
fn error_response(error: &Error) -> Response {
    let status = if error.is_validation() {
        StatusCode::BAD_REQUEST
    } else if matches!(error, Error::NotFound(_)) {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    if status.is_server_error() {
        tracing::error!(error = %error, "request failed");
    } else {
        tracing::debug!(error = %error, status = status.as_u16(), "request rejected");
    }
    yaml_response(
        status,
        &ErrorBody {
            error: error.to_string(),
        },
    )
}
