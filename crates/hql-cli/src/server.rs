//! HTTP server for the metastore, health and metrics endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use hql_core::health::{ComponentStatus, HealthCheck, HealthStatus};
use hql_core::metastore::{MetastoreHandler, Partition, Table};
use hql_core::metrics::PlannerMetrics;
use hql_core::MetastoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Shared state for HTTP endpoints.
pub struct ServerState {
    pub health: Arc<HealthCheck>,
    pub metrics: Arc<PlannerMetrics>,
    pub metastore: Arc<dyn MetastoreHandler>,
}

/// Health response structure.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub ready: bool,
    pub uptime_seconds: u64,
    pub components: HashMap<String, ComponentStatusResponse>,
}

/// Component status response.
#[derive(Debug, Serialize)]
pub struct ComponentStatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&ComponentStatus> for ComponentStatusResponse {
    fn from(status: &ComponentStatus) -> Self {
        match status {
            ComponentStatus::Healthy => ComponentStatusResponse {
                status: "healthy".to_string(),
                message: None,
            },
            ComponentStatus::Degraded(msg) => ComponentStatusResponse {
                status: "degraded".to_string(),
                message: Some(msg.clone()),
            },
            ComponentStatus::Unhealthy(msg) => ComponentStatusResponse {
                status: "unhealthy".to_string(),
                message: Some(msg.clone()),
            },
            ComponentStatus::Unknown => ComponentStatusResponse {
                status: "unknown".to_string(),
                message: None,
            },
        }
    }
}

/// Error body returned by the metastore routes.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A library error rendered as an HTTP response.
pub struct ApiError(hql_core::Error);

impl From<hql_core::Error> for ApiError {
    fn from(err: hql_core::Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            hql_core::Error::Metastore(err) => match err {
                MetastoreError::NoSuchObject(_)
                | MetastoreError::UnknownDb(_)
                | MetastoreError::UnknownTable(_) => StatusCode::NOT_FOUND,
                MetastoreError::AlreadyExists(_) => StatusCode::CONFLICT,
                MetastoreError::ConfigValSecurity(_) => StatusCode::FORBIDDEN,
                MetastoreError::InvalidObject(_) | MetastoreError::InvalidOperation(_) => {
                    StatusCode::BAD_REQUEST
                }
            },
            hql_core::Error::Serialization(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        debug!(status = %status, error = %self.0, "Metastore call failed");
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Routes for health, metrics and the metastore calls.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .route("/metrics", get(metrics_handler))
        .route("/databases", get(get_databases).post(create_database))
        .route(
            "/databases/:db",
            get(get_database).delete(drop_database),
        )
        .route("/databases/:db/tables", get(get_tables).post(create_table))
        .route(
            "/databases/:db/tables/:table",
            get(get_table).put(alter_table).delete(drop_table),
        )
        .route("/databases/:db/tables/:table/fields", get(get_fields))
        .route("/databases/:db/tables/:table/schema", get(get_schema))
        .route(
            "/databases/:db/tables/:table/partitions",
            get(get_partitions).post(add_partition),
        )
        .route(
            "/databases/:db/tables/:table/partition-names",
            get(get_partition_names),
        )
        .route(
            "/databases/:db/tables/:table/partitions/:name",
            get(get_partition_by_name).delete(drop_partition_by_name),
        )
        .route("/config/:name", get(get_config_value))
        .with_state(state)
}

/// Serve metastore routes on `metastore_port` and `/metrics` on
/// `metrics_port` until shutdown.
pub async fn start_server(
    state: Arc<ServerState>,
    bind_address: &str,
    metastore_port: u16,
    metrics_port: u16,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let ip: std::net::IpAddr = bind_address
        .parse()
        .map_err(|e| hql_core::Error::Config(format!("Invalid bind address {}: {}", bind_address, e)))?;

    let metastore_addr = SocketAddr::new(ip, metastore_port);
    let metastore_listener = tokio::net::TcpListener::bind(metastore_addr)
        .await
        .map_err(|e| {
            error!(error = %e, port = metastore_port, "Failed to bind metastore server");
            e
        })?;
    info!(address = %metastore_addr, "Metastore server started");

    let metrics_addr = SocketAddr::new(ip, metrics_port);
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(Arc::clone(&state));
    let metrics_listener = tokio::net::TcpListener::bind(metrics_addr)
        .await
        .map_err(|e| {
            error!(error = %e, port = metrics_port, "Failed to bind metrics server");
            e
        })?;
    info!(address = %metrics_addr, "Metrics server started");

    state.health.set_serving(true);

    let metastore_server = async {
        axum::serve(metastore_listener, router(Arc::clone(&state)))
            .await
            .map_err(|e| error!(error = %e, "Metastore server error"))
    };
    let metrics_server = async {
        axum::serve(metrics_listener, metrics_router)
            .await
            .map_err(|e| error!(error = %e, "Metrics server error"))
    };

    tokio::select! {
        _ = metastore_server => {}
        _ = metrics_server => {}
        _ = shutdown_rx.recv() => {
            info!("HTTP servers shutting down");
        }
    }
    state.health.set_serving(false);
    Ok(())
}

/// Health endpoint handler.
async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let report = state.health.report();

    let components = report
        .components
        .iter()
        .map(|(k, v)| (k.clone(), ComponentStatusResponse::from(v)))
        .collect();

    let status_str = match report.status {
        HealthStatus::Healthy => "healthy",
        HealthStatus::Degraded => "degraded",
        HealthStatus::Unhealthy => "unhealthy",
    };

    let response = HealthResponse {
        status: status_str.to_string(),
        ready: report.ready,
        uptime_seconds: report.uptime_seconds,
        components,
    };

    let status_code = match report.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

/// Kubernetes liveness probe handler.
async fn healthz_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    if state.health.is_operational() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Kubernetes readiness probe handler.
async fn readyz_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    if state.health.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Prometheus metrics endpoint handler.
async fn metrics_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    match state.metrics.export_prometheus_text() {
        Ok(output) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            output,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// === METASTORE ROUTES ===

#[derive(Debug, Deserialize)]
struct CreateDatabaseRequest {
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct PatternParams {
    #[serde(default)]
    pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DropParams {
    #[serde(default)]
    delete_data: bool,
}

#[derive(Debug, Deserialize)]
struct MaxPartsParams {
    #[serde(default = "all_parts")]
    max_parts: i16,
}

fn all_parts() -> i16 {
    -1
}

#[derive(Debug, Deserialize)]
struct ConfigParams {
    #[serde(default)]
    default: String,
}

fn record(state: &ServerState, call: &str) {
    state.metrics.record_metastore_call(call);
}

async fn get_databases(State(state): State<Arc<ServerState>>) -> ApiResult<Vec<String>> {
    record(&state, "get_databases");
    Ok(Json(state.metastore.get_databases()?))
}

async fn create_database(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<CreateDatabaseRequest>,
) -> ApiResult<bool> {
    record(&state, "create_database");
    Ok(Json(
        state
            .metastore
            .create_database(&request.name, &request.description)?,
    ))
}

async fn get_database(
    State(state): State<Arc<ServerState>>,
    Path(db): Path<String>,
) -> ApiResult<hql_core::metastore::Database> {
    record(&state, "get_database");
    Ok(Json(state.metastore.get_database(&db)?))
}

async fn drop_database(
    State(state): State<Arc<ServerState>>,
    Path(db): Path<String>,
) -> ApiResult<bool> {
    record(&state, "drop_database");
    Ok(Json(state.metastore.drop_database(&db)?))
}

async fn get_tables(
    State(state): State<Arc<ServerState>>,
    Path(db): Path<String>,
    Query(params): Query<PatternParams>,
) -> ApiResult<Vec<String>> {
    record(&state, "get_tables");
    let pattern = params.pattern.unwrap_or_else(|| "*".to_string());
    Ok(Json(state.metastore.get_tables(&db, &pattern)?))
}

async fn create_table(
    State(state): State<Arc<ServerState>>,
    Path(db): Path<String>,
    Json(mut table): Json<Table>,
) -> ApiResult<Table> {
    record(&state, "create_table");
    if table.db_name.is_empty() {
        table.db_name = db;
    }
    state.metastore.create_table(&table)?;
    Ok(Json(
        state.metastore.get_table(&table.db_name, &table.table_name)?,
    ))
}

async fn get_table(
    State(state): State<Arc<ServerState>>,
    Path((db, table)): Path<(String, String)>,
) -> ApiResult<Table> {
    record(&state, "get_table");
    Ok(Json(state.metastore.get_table(&db, &table)?))
}

async fn alter_table(
    State(state): State<Arc<ServerState>>,
    Path((db, table)): Path<(String, String)>,
    Json(new_table): Json<Table>,
) -> ApiResult<Table> {
    record(&state, "alter_table");
    state.metastore.alter_table(&db, &table, &new_table)?;
    Ok(Json(
        state
            .metastore
            .get_table(&new_table.db_name, &new_table.table_name)?,
    ))
}

async fn drop_table(
    State(state): State<Arc<ServerState>>,
    Path((db, table)): Path<(String, String)>,
    Query(params): Query<DropParams>,
) -> ApiResult<bool> {
    record(&state, "drop_table");
    state.metastore.drop_table(&db, &table, params.delete_data)?;
    Ok(Json(true))
}

async fn get_fields(
    State(state): State<Arc<ServerState>>,
    Path((db, table)): Path<(String, String)>,
) -> ApiResult<Vec<hql_core::metastore::FieldSchema>> {
    record(&state, "get_fields");
    Ok(Json(state.metastore.get_fields(&db, &table)?))
}

async fn get_schema(
    State(state): State<Arc<ServerState>>,
    Path((db, table)): Path<(String, String)>,
) -> ApiResult<Vec<hql_core::metastore::FieldSchema>> {
    record(&state, "get_schema");
    Ok(Json(state.metastore.get_schema(&db, &table)?))
}

async fn get_partitions(
    State(state): State<Arc<ServerState>>,
    Path((db, table)): Path<(String, String)>,
    Query(params): Query<MaxPartsParams>,
) -> ApiResult<Vec<Partition>> {
    record(&state, "get_partitions");
    Ok(Json(
        state
            .metastore
            .get_partitions(&db, &table, params.max_parts)?,
    ))
}

async fn add_partition(
    State(state): State<Arc<ServerState>>,
    Path((db, table)): Path<(String, String)>,
    Json(mut partition): Json<Partition>,
) -> ApiResult<Partition> {
    record(&state, "add_partition");
    if partition.db_name.is_empty() {
        partition.db_name = db;
    }
    if partition.table_name.is_empty() {
        partition.table_name = table;
    }
    Ok(Json(state.metastore.add_partition(&partition)?))
}

async fn get_partition_names(
    State(state): State<Arc<ServerState>>,
    Path((db, table)): Path<(String, String)>,
    Query(params): Query<MaxPartsParams>,
) -> ApiResult<Vec<String>> {
    record(&state, "get_partition_names");
    Ok(Json(
        state
            .metastore
            .get_partition_names(&db, &table, params.max_parts)?,
    ))
}

async fn get_partition_by_name(
    State(state): State<Arc<ServerState>>,
    Path((db, table, name)): Path<(String, String, String)>,
) -> ApiResult<Partition> {
    record(&state, "get_partition_by_name");
    Ok(Json(
        state.metastore.get_partition_by_name(&db, &table, &name)?,
    ))
}

async fn drop_partition_by_name(
    State(state): State<Arc<ServerState>>,
    Path((db, table, name)): Path<(String, String, String)>,
    Query(params): Query<DropParams>,
) -> ApiResult<bool> {
    record(&state, "drop_partition_by_name");
    Ok(Json(state.metastore.drop_partition_by_name(
        &db,
        &table,
        &name,
        params.delete_data,
    )?))
}

async fn get_config_value(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
    Query(params): Query<ConfigParams>,
) -> ApiResult<String> {
    record(&state, "get_config_value");
    Ok(Json(
        state.metastore.get_config_value(&name, &params.default)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use hql_core::metastore::{FieldSchema, InMemoryMetastore};
    use tower::ServiceExt;

    fn state() -> Arc<ServerState> {
        Arc::new(ServerState {
            health: Arc::new(HealthCheck::for_service()),
            metrics: Arc::new(PlannerMetrics::new().unwrap()),
            metastore: Arc::new(InMemoryMetastore::new("/tmp/warehouse")),
        })
    }

    async fn send(
        state: &Arc<ServerState>,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, String) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = router(Arc::clone(state)).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_component_status_conversion() {
        let response: ComponentStatusResponse = (&ComponentStatus::Healthy).into();
        assert_eq!(response.status, "healthy");
        assert!(response.message.is_none());

        let degraded = ComponentStatus::Degraded("slow".to_string());
        let response: ComponentStatusResponse = (&degraded).into();
        assert_eq!(response.status, "degraded");
        assert_eq!(response.message, Some("slow".to_string()));

        let response: ComponentStatusResponse = (&ComponentStatus::Unknown).into();
        assert_eq!(response.status, "unknown");
    }

    #[tokio::test]
    async fn test_health_routes() {
        let state = state();
        let (status, body) = send(&state, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("\"ready\":false"));

        let (status, _) = send(&state, Method::GET, "/readyz", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        state.health.set_serving(true);
        state.health.mark_healthy("metastore");
        state.health.mark_healthy("planner");
        let (status, _) = send(&state, Method::GET, "/readyz", None).await;
        assert_eq!(status, StatusCode::OK);

        state.health.mark_unhealthy("metastore", "down");
        let (status, _) = send(&state, Method::GET, "/healthz", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_table_routes() {
        let state = state();
        let table = Table::new("default", "src", vec![FieldSchema::new("key", "string")])
            .with_partition_keys(vec![FieldSchema::new("ds", "string")]);
        let (status, body) = send(
            &state,
            Method::POST,
            "/databases/default/tables",
            Some(serde_json::to_value(&table).unwrap()),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);

        let (status, body) = send(&state, Method::GET, "/databases/default/tables", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "[\"src\"]");

        let (_, body) = send(&state, Method::GET, "/databases/default/tables/src/schema", None).await;
        let fields: Vec<FieldSchema> = serde_json::from_str(&body).unwrap();
        assert_eq!(fields.len(), 2);

        let (status, body) = send(&state, Method::GET, "/databases/default/tables/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let error: ErrorResponse = serde_json::from_str(&body).unwrap();
        assert!(error.error.contains("nope"));

        let (status, _) = send(
            &state,
            Method::POST,
            "/databases/default/tables",
            Some(serde_json::to_value(&table).unwrap()),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        assert_eq!(state.metrics.metastore_calls_total("create_table"), 2);
    }

    #[tokio::test]
    async fn test_database_and_config_routes() {
        let state = state();
        let (status, body) = send(
            &state,
            Method::POST,
            "/databases",
            Some(serde_json::json!({"name": "sales"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "true");

        let (_, body) = send(&state, Method::GET, "/databases", None).await;
        let databases: Vec<String> = serde_json::from_str(&body).unwrap();
        assert!(databases.contains(&"sales".to_string()));

        let (status, body) = send(&state, Method::GET, "/config/hive.unset?default=fallback", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "\"fallback\"");

        let (status, _) = send(
            &state,
            Method::GET,
            "/config/javax.jdo.option.ConnectionPassword",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&state, Method::GET, "/metrics", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("hql_metastore_calls_total"));
    }
}
