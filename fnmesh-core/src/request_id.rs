use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use tower_http::request_id::RequestId as TowerRequestId;
use uuid::Uuid;

/// A request identifier for the general API surface (§6's `/v1/...` CRUD
/// routes); dispatch requests use the deterministic [`CallId`] instead.
///
/// Generation and header propagation are `tower_http::request_id`'s job —
/// `SetRequestIdLayer`/`PropagateRequestIdLayer` are wired in the binary
/// crate's router. This extractor just reads the `tower_http` extension
/// those layers leave on the request, falling back to a fresh id only if
/// a handler is ever exercised without the layer (e.g. a unit test that
/// calls it directly).
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestId {
    type Rejection = std::convert::Infallible;

    fn from_request_parts(parts: &mut Parts, _state: &S) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let id = parts
                .extensions
                .get::<TowerRequestId>()
                .and_then(|id| id.header_value().to_str().ok())
                .map(str::to_string)
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            Ok(RequestId(id))
        }
    }
}

/// The deterministic dispatch call id of spec §4.5 step 1: derived from the
/// remote address, the request URL, and the current wall-clock time, so that
/// two requests differing in any of those three inputs never collide and the
/// same triple always reproduces the same id (useful for idempotent retries
/// at the client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallId(pub String);

impl CallId {
    /// `namespace` is fixed so that `generate` is a pure function of its inputs.
    const NAMESPACE: Uuid = Uuid::from_bytes([
        0xf6, 0x1f, 0xb1, 0x36, 0x1b, 0x53, 0x4a, 0xc2, 0x9a, 0x64, 0xad, 0x35, 0xdb, 0x13, 0x3c, 0x57,
    ]);

    pub fn generate(remote_addr: &str, url: &str, wall_time_nanos: u128) -> Self {
        let name = format!("{remote_addr}|{url}|{wall_time_nanos}");
        CallId(Uuid::new_v5(&Self::NAMESPACE, name.as_bytes()).to_string())
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl IntoResponse for RequestId {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}
