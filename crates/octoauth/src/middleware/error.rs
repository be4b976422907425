//! Maps [`AuthError`] to an HTTP response: status from
//! [`AuthError::http_status`], body a stable `{ "result": ..., "message":
//! ... }` JSON object callers can match on without parsing prose.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::{AuthError, ErrorCategory};

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let category = self.category();
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "result": result_code(category),
            "message": self.to_string(),
        });

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if status == StatusCode::UNAUTHORIZED {
            headers.insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer realm=\"octoauth\""),
            );
        }

        (status, headers, Json(body)).into_response()
    }
}

fn result_code(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::NotFound => "not_found",
        ErrorCategory::Conflict => "conflict",
        ErrorCategory::Validation => "validation_failed",
        ErrorCategory::Forbidden => "forbidden",
        ErrorCategory::Unauthenticated => "unauthenticated",
        ErrorCategory::Unimplemented => "not_implemented",
        ErrorCategory::Internal => "internal_error",
    }
}
