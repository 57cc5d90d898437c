//! Axum server and routes.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use portal_registry::Registry;
use portal_types::{
    AnalyticsOverview, AnalyticsQuery, DeployRequest, DeployResponse, EventListResponse,
    FiltersResponse, ListEventsQuery, ListServicesQuery, NextSteps, RegisterRequest,
    RegisterResponse, RegistryError, ServiceListResponse, StatusOverview,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub struct AppState {
    pub registry: Registry,
    /// When set, the vacuum endpoint requires a matching bearer token.
    pub admin_token: Option<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/services", get(list_services).post(register_service))
        .route("/api/services/status", get(services_status))
        .route("/api/services/:name/deploy", post(deploy_service))
        .route("/api/services/:name/next-steps", get(next_steps))
        .route("/api/services/:name/events", get(service_events))
        .route("/api/analytics/overview", get(analytics_overview))
        .route("/api/filters", get(get_filters))
        .route("/health", get(health_check))
        .route("/api/admin/vacuum", post(vacuum_database))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Maps domain errors onto HTTP statuses. Validation, conflict, and
/// not-found messages are user-facing; storage detail is logged and
/// replaced with a generic message.
pub struct ApiError(RegistryError);

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0 {
            RegistryError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            RegistryError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            RegistryError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            RegistryError::Storage(e) => {
                tracing::error!(error = %e, "storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Acting user for audit events, from the X-User-ID header.
fn actor(headers: &HeaderMap) -> String {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

async fn list_services(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListServicesQuery>,
) -> Result<Json<ServiceListResponse>, ApiError> {
    Ok(Json(state.registry.list_services(&query).await?))
}

async fn register_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let service = state.registry.register(&req, &actor(&headers)).await?;
    let view = state.registry.view(&service).await;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            service_id: service.id.clone(),
            message: format!("Service {} registered successfully", service.name),
            service: view,
        }),
    ))
}

async fn services_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusOverview>, ApiError> {
    Ok(Json(state.registry.status_overview().await?))
}

async fn deploy_service(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(req): Json<DeployRequest>,
) -> Result<Json<DeployResponse>, ApiError> {
    let service = state.registry.deploy(&name, &req, &actor(&headers)).await?;
    let version = service.deployed_version.clone().unwrap_or_default();
    let view = state.registry.view(&service).await;
    Ok(Json(DeployResponse {
        message: format!("Successfully deployed {} version {}", service.name, version),
        service: view,
    }))
}

async fn next_steps(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<NextSteps>, ApiError> {
    Ok(Json(state.registry.next_steps(&name).await?))
}

async fn service_events(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<ListEventsQuery>,
) -> Result<Json<EventListResponse>, ApiError> {
    Ok(Json(state.registry.service_events(&name, &query).await?))
}

async fn analytics_overview(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsOverview>, ApiError> {
    Ok(Json(state.registry.analytics(&query).await?))
}

async fn get_filters(State(state): State<Arc<AppState>>) -> Result<Json<FiltersResponse>, ApiError> {
    Ok(Json(state.registry.filters().await?))
}

async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let timestamp = chrono::Utc::now().to_rfc3339();
    match state.registry.health().await {
        Ok(count) => Json(serde_json::json!({
            "status": "healthy",
            "timestamp": timestamp,
            "database": "connected",
            "services_count": count,
            "version": env!("CARGO_PKG_VERSION"),
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "unhealthy",
                    "timestamp": timestamp,
                    "error": "Database connection failed",
                })),
            )
                .into_response()
        }
    }
}

async fn vacuum_database(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if let Some(ref token) = state.admin_token {
        let expected = format!("Bearer {}", token);
        let authorized = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v == expected)
            .unwrap_or(false);
        if !authorized {
            return Ok((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "Unauthorized" })),
            )
                .into_response());
        }
    }
    state.registry.compact().await?;
    Ok(Json(serde_json::json!({ "message": "Database optimized successfully" })).into_response())
}
