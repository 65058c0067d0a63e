//! HTTP surface (spec §6): app/route CRUD, docker-login, and the
//! `/r/{app}/{path...}` dispatch endpoint, wired onto [`AppState`].

use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use fnmesh_core::{envelope_with_call_id, AppError, RequestId};
use fnmesh_dispatch::DispatchRequest;
use fnmesh_store::{App, AppFilter, Route, RouteFilter};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;

/// Run a handler body that wants `?`-propagation of [`AppError`], then fold
/// any failure into the `{error:{message, request_id}}` envelope stamped
/// with this request's id (the `tower_http::request_id` layers in `main.rs`
/// put it on every request).
async fn respond<F>(request_id: &RequestId, body: F) -> Response
where
    F: std::future::Future<Output = Result<Response, AppError>>,
{
    match body.await {
        Ok(resp) => resp,
        Err(err) => envelope_with_call_id(err, &request_id.0),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", axum::routing::get(health))
        .route("/v1/apps", axum::routing::get(list_apps).post(create_app))
        .route("/v1/apps/{app}", axum::routing::get(get_app).patch(update_app).delete(delete_app))
        .route("/v1/apps/{app}/routes", axum::routing::get(list_routes).post(create_route))
        .route(
            "/v1/apps/{app}/routes/{*path}",
            axum::routing::get(get_route).patch(update_route).delete(delete_route),
        )
        .route("/v1/docker/login", axum::routing::post(docker_login))
        .route("/r/{app}/{*path}", axum::routing::get(dispatch).post(dispatch))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

// ---- apps ------------------------------------------------------------

#[derive(Deserialize)]
struct CreateAppBody {
    app: App,
}

#[derive(Deserialize)]
struct AppFilterQuery {
    name: Option<String>,
}

async fn list_apps(
    State(state): State<AppState>,
    request_id: RequestId,
    Query(filter): Query<AppFilterQuery>,
) -> Response {
    respond(&request_id, async {
        let apps = state.datastore.get_apps(&AppFilter { name: filter.name }).await?;
        Ok(Json(apps).into_response())
    })
    .await
}

async fn create_app(State(state): State<AppState>, request_id: RequestId, Json(body): Json<CreateAppBody>) -> Response {
    respond(&request_id, async {
        state.listeners.fire_app_before_create(&body.app).await?;
        let app = state.datastore.insert_app(body.app).await?;
        state.listeners.fire_app_after_create(&app).await;
        Ok((axum::http::StatusCode::CREATED, Json(app)).into_response())
    })
    .await
}

async fn get_app(State(state): State<AppState>, request_id: RequestId, Path(app): Path<String>) -> Response {
    respond(&request_id, async {
        let app = state.datastore.get_app(&app).await?;
        Ok(Json(app).into_response())
    })
    .await
}

#[derive(Deserialize)]
struct UpdateAppBody {
    #[serde(default)]
    config: HashMap<String, String>,
}

async fn update_app(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(app): Path<String>,
    Json(body): Json<UpdateAppBody>,
) -> Response {
    respond(&request_id, async {
        state.listeners.fire_app_before_update(&app, &body.config).await?;
        let updated = state.datastore.update_app(&app, body.config).await?;
        state.listeners.fire_app_after_update(&updated).await;
        Ok(Json(updated).into_response())
    })
    .await
}

async fn delete_app(State(state): State<AppState>, request_id: RequestId, Path(app): Path<String>) -> Response {
    respond(&request_id, async {
        state.listeners.fire_app_before_delete(&app).await?;
        state.datastore.remove_app(&app).await?;
        state.listeners.fire_app_after_delete(&app).await;
        Ok(axum::http::StatusCode::NO_CONTENT.into_response())
    })
    .await
}

// ---- routes ------------------------------------------------------------

#[derive(Deserialize)]
struct RouteFilterQuery {
    image: Option<String>,
}

async fn list_routes(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(app): Path<String>,
    Query(filter): Query<RouteFilterQuery>,
) -> Response {
    respond(&request_id, async {
        let routes = state
            .datastore
            .get_routes(&RouteFilter { app_name: Some(app), path: None, image: filter.image })
            .await?;
        Ok(Json(routes).into_response())
    })
    .await
}

#[derive(Deserialize)]
struct CreateRouteBody {
    route: Route,
}

async fn create_route(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(app): Path<String>,
    Json(mut body): Json<CreateRouteBody>,
) -> Response {
    respond(&request_id, async {
        body.route.app_name = app;
        state.listeners.fire_route_before_create(&body.route).await?;
        let created = state.datastore.insert_route(body.route).await?;
        state.cache.invalidate(&created.app_name, &created.path);
        state.listeners.fire_route_after_create(&created).await;
        Ok((axum::http::StatusCode::CREATED, Json(created)).into_response())
    })
    .await
}

async fn get_route(
    State(state): State<AppState>,
    request_id: RequestId,
    Path((app, path)): Path<(String, String)>,
) -> Response {
    respond(&request_id, async {
        let route = state.datastore.get_route(&app, &with_leading_slash(&path)).await?;
        Ok(Json(route).into_response())
    })
    .await
}

#[derive(Deserialize, Default)]
struct UpdateRouteBody {
    #[serde(default)]
    config: HashMap<String, String>,
    #[serde(default)]
    headers: HashMap<String, Vec<String>>,
}

async fn update_route(
    State(state): State<AppState>,
    request_id: RequestId,
    Path((app, path)): Path<(String, String)>,
    Json(body): Json<UpdateRouteBody>,
) -> Response {
    respond(&request_id, async {
        let path = with_leading_slash(&path);
        state.listeners.fire_route_before_update(&app, &path).await?;
        let updated = state.datastore.update_route(&app, &path, body.config, body.headers).await?;
        state.cache.refresh(&app, path, fnmesh_store::ResolvedRoute { route: updated.clone(), params: Vec::new() });
        state.listeners.fire_route_after_update(&updated).await;
        Ok(Json(updated).into_response())
    })
    .await
}

async fn delete_route(
    State(state): State<AppState>,
    request_id: RequestId,
    Path((app, path)): Path<(String, String)>,
) -> Response {
    respond(&request_id, async {
        let path = with_leading_slash(&path);
        state.listeners.fire_route_before_delete(&app, &path).await?;
        state.datastore.remove_route(&app, &path).await?;
        state.cache.invalidate(&app, &path);
        state.listeners.fire_route_after_delete(&app, &path).await;
        Ok(axum::http::StatusCode::NO_CONTENT.into_response())
    })
    .await
}

fn with_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

// ---- docker login ------------------------------------------------------

const DOCKER_CREDENTIALS_KEY: &str = "docker_credentials";

#[derive(Deserialize)]
struct DockerLoginBody {
    auth: String,
}

async fn docker_login(State(state): State<AppState>, request_id: RequestId, Json(body): Json<DockerLoginBody>) -> Response {
    respond(&request_id, async {
        use base64::Engine;
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(body.auth)
            .map_err(|e| AppError::BadRequest(format!("invalid base64 auth: {e}")))?;

        let encrypted = state.credential_key.encrypt(&decoded).map_err(|e| AppError::Internal(e.to_string()))?;

        state.datastore.put(DOCKER_CREDENTIALS_KEY, encrypted).await?;
        Ok(axum::http::StatusCode::NO_CONTENT.into_response())
    })
    .await
}

// ---- dispatch ------------------------------------------------------------

async fn dispatch(
    State(state): State<AppState>,
    Path((app, path)): Path<(String, String)>,
    method: axum::http::Method,
    headers: axum::http::HeaderMap,
    uri: axum::http::Uri,
    connect_info: Result<axum::extract::ConnectInfo<SocketAddr>, axum::extract::rejection::ExtensionRejection>,
    Query(query): Query<HashMap<String, String>>,
    body: axum::body::Bytes,
) -> Response {
    let body = if method == axum::http::Method::GET {
        query.get("payload").cloned().unwrap_or_default().into_bytes().into()
    } else {
        body
    };

    let remote_addr = connect_info.map(|c| c.0.to_string()).unwrap_or_else(|_| "unknown".to_string());

    let req = DispatchRequest {
        app_name: app,
        route_path: with_leading_slash(&path),
        method,
        headers,
        request_url: uri.to_string(),
        remote_addr,
        body,
    };
    state.dispatcher.dispatch(req).await
}
