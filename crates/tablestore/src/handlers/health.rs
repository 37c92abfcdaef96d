//! Liveness probe.

use axum::http::StatusCode;

/// GET /_livez - Basic liveness probe.
///
/// Returns 200 immediately. Does not touch the table store.
#[axum::debug_handler]
pub async fn livez() -> StatusCode {
    StatusCode::OK
}
