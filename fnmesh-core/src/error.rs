use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// The crate-wide error taxonomy. Every dispatcher-facing failure path
/// converts into one of these variants before leaving the request handler.
pub enum AppError {
    AppsNotFound(String),
    RoutesNotFound(String),
    AppsAlreadyExists(String),
    RoutesAlreadyExists(String),
    RoutesCreate(String),
    DeleteAppsWithRoutes(String),
    RunnerTimeout(String),
    OutputTooLarge(String),
    BadRequest(String),
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::AppsNotFound(_) | AppError::RoutesNotFound(_) => StatusCode::NOT_FOUND,
            AppError::AppsAlreadyExists(_) | AppError::RoutesAlreadyExists(_) => StatusCode::CONFLICT,
            AppError::RoutesCreate(_) | AppError::DeleteAppsWithRoutes(_) | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::RunnerTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::OutputTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            AppError::AppsNotFound(m)
            | AppError::RoutesNotFound(m)
            | AppError::AppsAlreadyExists(m)
            | AppError::RoutesAlreadyExists(m)
            | AppError::RoutesCreate(m)
            | AppError::DeleteAppsWithRoutes(m)
            | AppError::RunnerTimeout(m)
            | AppError::OutputTooLarge(m)
            | AppError::BadRequest(m)
            | AppError::Internal(m) => m,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({ "error": { "message": self.message() } });
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status(), self.message())
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as std::fmt::Display>::fmt(self, f)
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Render the `{request_id, error.message}` envelope of spec §4.5/§7,
/// stamping the call id onto the error body produced by [`AppError`].
pub fn envelope_with_call_id(err: AppError, call_id: &str) -> Response {
    let status = err.status();
    let message = err.message().to_string();
    let body = serde_json::json!({ "error": { "message": message, "request_id": call_id } });
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn parts(err: AppError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn apps_not_found_is_404() {
        let (status, body) = parts(AppError::AppsNotFound("myapp".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "myapp");
    }

    #[tokio::test]
    async fn routes_create_is_400() {
        let (status, _) = parts(AppError::RoutesCreate("wildcard conflict".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn runner_timeout_is_504() {
        let (status, _) = parts(AppError::RunnerTimeout("exceeded".into())).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn internal_is_500() {
        let (status, _) = parts(AppError::Internal("driver exploded".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn output_too_large_is_413() {
        let (status, _) = parts(AppError::OutputTooLarge("stdout exceeded limit".into())).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn envelope_carries_call_id() {
        let resp = envelope_with_call_id(AppError::RunnerTimeout("exceeded".into()), "call-1");
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["request_id"], "call-1");
    }
}
