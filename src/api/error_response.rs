//! HTTP error response handling for the API.
//!
//! Grounded on the teacher's `error_response.rs` (`IntoResponse for Error`
//! mapping through `ToHttpStatus`); the variant set tested against is the
//! new coordinator `Error` enum rather than the teacher's NZB-era one.

use crate::error::{ApiError, Error, ToHttpStatus};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let api_error: ApiError = self.into();
        (status_code, Json(api_error)).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status_code, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatabaseError;

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(Error::NotFound.status_code(), 404);
        assert_eq!(Error::NotFound.error_code(), "not_found");
    }

    #[test]
    fn shutting_down_maps_to_503() {
        let error = Error::ShuttingDown;
        assert_eq!(error.status_code(), 503);
        assert_eq!(error.error_code(), "shutting_down");
    }

    #[test]
    fn database_error_maps_to_500() {
        let error = Error::Database(DatabaseError::QueryFailed("boom".to_string()));
        assert_eq!(error.status_code(), 500);
        assert_eq!(error.error_code(), "database_error");
    }

    #[tokio::test]
    async fn error_into_response_carries_status_and_body() {
        let response = Error::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let api_error: ApiError = serde_json::from_slice(&body).unwrap();
        assert_eq!(api_error.error.code, "not_found");
    }
}
