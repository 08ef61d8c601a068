use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{Method, StatusCode, Uri},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlgate_core::identifier::{DEFAULT_TABLE, TABLE_FIELD, sanitize_table_name};
use sqlgate_core::{GenerationError, GenerationWarning};

use crate::config::RoutingTablesConfig;
use crate::error::ApiError;
use crate::forwarding::{ForwardRequest, ForwardingTables};
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn root() -> impl IntoResponse {
    let body = json!({
        "service": "SQLGate",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "generate": "POST /api/generate",
            "ddl": "POST /api/ddl",
            "routes": "GET|PUT /api/forwarding/routes",
        },
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub async fn readyz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ready" }))
}

/// Query parameters accepted by generating endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateParams {
    /// `?forward=false` returns the SQL without forwarding it.
    #[serde(default)]
    pub forward: Option<bool>,
}

pub async fn generate(
    State(state): State<AppState>,
    uri: Uri,
    params: Result<Query<GenerateParams>, QueryRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let params = query_params(params)?;
    let payload = json_body(body)?;
    generate_and_forward(&state, uri.path(), &params, payload).await
}

/// Any POST without a dedicated route generates SQL and forwards it using the
/// request path as the route key.
pub async fn forward_any(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    params: Result<Query<GenerateParams>, QueryRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    if method != Method::POST {
        return Err(ApiError::RouteNotFound {
            method: method.to_string(),
            path: uri.path().to_string(),
        });
    }
    let params = query_params(params)?;
    let payload = json_body(body)?;
    generate_and_forward(&state, uri.path(), &params, payload).await
}

/// `CREATE TABLE` from a sample record, or the first record of an array.
pub async fn ddl(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let payload = json_body(body)?;
    let sample = match &payload {
        Value::Array(items) if items.is_empty() => return Err(GenerationError::EmptyArray.into()),
        Value::Array(items) => items
            .iter()
            .find(|v| v.is_object())
            .ok_or(GenerationError::NoValidRecords)?,
        other => other,
    };

    let declared = sample
        .get(TABLE_FIELD)
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_TABLE);
    let table = sanitize_table_name(declared).name;
    let statement = state.generator.create_table(sample, &table)?;
    log_warnings(&statement.warnings);

    Ok(Json(json!({
        "success": true,
        "tableName": table,
        "createTable": statement.sql,
    })))
}

pub async fn list_routes(State(state): State<AppState>) -> Json<RoutingTablesConfig> {
    Json(state.orchestrator.tables().config().clone())
}

/// Validates the new tables in full before swapping them in.
pub async fn replace_routes(
    State(state): State<AppState>,
    body: Result<Json<RoutingTablesConfig>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(config) = body.map_err(|e| ApiError::InvalidJson(e.body_text()))?;
    let tables = ForwardingTables::from_config(&config)?;
    let (routes, transformers) = (tables.routes.len(), tables.transformers.len());
    state.orchestrator.replace_tables(tables);
    Ok(Json(json!({
        "success": true,
        "routes": routes,
        "transformers": transformers,
    })))
}

async fn generate_and_forward(
    state: &AppState,
    path: &str,
    params: &GenerateParams,
    payload: Value,
) -> Result<Json<Value>, ApiError> {
    let generation = state.generator.generate(&payload)?;
    log_warnings(&generation.warnings);
    tracing::info!(
        path,
        input_type = %generation.input_type(),
        statements = generation.sql.statements().len(),
        "SQL generated"
    );

    let mut response = generation.sql.to_response();
    if state.forwarding_enabled && params.forward != Some(false) {
        let request = ForwardRequest {
            path,
            payload: &payload,
            generation: &generation,
        };
        let result = state
            .retry
            .run(|_| state.orchestrator.forward(request))
            .await;
        if let (Value::Object(map), Ok(forwarded)) =
            (&mut response, serde_json::to_value(&result))
        {
            map.insert("forwarded".to_string(), forwarded);
        }
    }
    Ok(Json(response))
}

fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    body.map(|Json(v)| v)
        .map_err(|e| ApiError::InvalidJson(e.body_text()))
}

fn query_params(
    params: Result<Query<GenerateParams>, QueryRejection>,
) -> Result<GenerateParams, ApiError> {
    params
        .map(|Query(p)| p)
        .map_err(|e| ApiError::InvalidQuery(e.body_text()))
}

fn log_warnings(warnings: &[GenerationWarning]) {
    for warning in warnings {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
    }
}
