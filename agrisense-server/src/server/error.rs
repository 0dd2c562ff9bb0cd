use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};

use agrisense::errors::{AuthError, CoreError, CoreErrorKind, UpstreamError};

/// Handler error rendered as `{"error": message, "success": false, ...fields}`.
#[derive(Debug)]
pub struct ApiError(pub CoreError);

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(CoreError::validation(message))
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err.into())
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        Self(err.into())
    }
}

/// Malformed or mistyped request bodies are client errors
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

pub fn error_body(err: &CoreError) -> Value {
    let mut body = Map::new();
    if let Some(fields) = err.fields() {
        for (key, value) in fields {
            body.insert(key.clone(), Value::String(value.clone()));
        }
    }
    body.insert("error".to_string(), Value::String(err.message().to_string()));
    body.insert("success".to_string(), Value::Bool(false));
    Value::Object(body)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self.0.kind() {
            CoreErrorKind::Internal => {
                tracing::error!(error = %self.0, source = ?std::error::Error::source(&self.0), "Request failed");
            }
            CoreErrorKind::Unavailable | CoreErrorKind::Timeout => {
                tracing::warn!(error = %self.0, "Upstream failure");
            }
            _ => tracing::debug!(error = %self.0, "Request rejected"),
        }
        (status, Json(error_body(&self.0))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_merges_fields_under_error() {
        let err = CoreError::not_found("Item", "7");
        let body = error_body(&err);
        assert_eq!(body["error"], "Item not found");
        assert_eq!(body["success"], false);
        assert_eq!(body["entity"], "Item");
        assert_eq!(body["id"], "7");
    }

    #[test]
    fn status_follows_error_kind() {
        assert_eq!(ApiError::bad_request("nope").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError(CoreError::conflict("Time slot already booked")).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(AuthError::InvalidToken).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError(CoreError::timeout("slow")).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn upstream_failures_keep_their_status() {
        let err = ApiError::from(UpstreamError::Timeout { service: "Notebook server" });
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);

        let err = ApiError::from(UpstreamError::Connect {
            service: "Image server",
            reason: "connection refused".into(),
        });
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);

        let err = ApiError::from(UpstreamError::Status {
            service: "Image server",
            status: 502,
            body: "bad gateway".into(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_body(&err.0)["details"], "bad gateway");
    }
}
