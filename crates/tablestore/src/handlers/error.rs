use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tablestore_core::storage::{repository_error_to_status_code, RepositoryError};

pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status_code(&self) -> StatusCode {
        if let Some(repo_error) = self.0.downcast_ref::<RepositoryError>() {
            let code = repository_error_to_status_code(repo_error);
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        } else if let Some(rejection) = self.0.downcast_ref::<JsonRejection>() {
            match rejection.status() {
                StatusCode::UNSUPPORTED_MEDIA_TYPE => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                _ => StatusCode::BAD_REQUEST,
            }
        } else if let Some(rejection) = self.0.downcast_ref::<PathRejection>() {
            rejection.status()
        } else if self.0.downcast_ref::<QueryRejection>().is_some() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let message = self.0.to_string();

        if status_code.is_server_error() {
            tracing::error!(status = status_code.as_u16(), error = %message, "Request failed");
        } else {
            tracing::warn!(status = status_code.as_u16(), error = %message, "Request rejected");
        }

        (
            status_code,
            Json(json!({ "error": message, "status": status_code.as_u16() })),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn render(error: AppError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_repository_error_maps_to_status_and_payload() {
        let (status, body) = render(RepositoryError::entity_not_found("u1", "p1").into()).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], 404);
        assert_eq!(body["error"], "Entity not found: u1/p1");
    }

    #[tokio::test]
    async fn test_invalid_data_is_bad_request() {
        let error = RepositoryError::InvalidData("RowKey is required".to_string());
        let (status, body) = render(error.into()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid data: RowKey is required");
    }

    #[tokio::test]
    async fn test_unknown_error_is_internal() {
        let (status, body) = render(anyhow::anyhow!("boom").into()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], 500);
    }
}
