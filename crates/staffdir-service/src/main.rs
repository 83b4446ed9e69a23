use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde::Serialize;
use staffdir_api::{
    DirectoryApi, EmployeesRequest, FlagEmployeeRequest, LoginRequest, API_CONTRACT_VERSION,
};
use staffdir_auth::{AuthSession, Identity, TokenKey};
use staffdir_core::{
    AddEmployeeInput, DirectoryError, Employee, EmployeePage, UpdateEmployeeInput,
};
use staffdir_store::DirectoryStore;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const SERVICE_CONTRACT_VERSION: &str = "service.v1";
const OPENAPI_YAML: &str = include_str!("../../../openapi/openapi.yaml");

#[derive(Debug, Clone)]
struct ServiceState {
    api: DirectoryApi,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceEnvelope<T>
where
    T: Serialize,
{
    service_contract_version: &'static str,
    api_contract_version: &'static str,
    data: T,
}

#[derive(Debug, Clone, Serialize)]
struct ServiceError {
    service_contract_version: &'static str,
    kind: &'static str,
    error: String,
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Parser)]
#[command(name = "staffdir-service")]
#[command(about = "Employee directory HTTP service")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:4000")]
    bind: SocketAddr,
    /// HS256 secret for session tokens; falls back to STAFFDIR_TOKEN_SECRET.
    #[arg(long)]
    token_secret: Option<String>,
    /// Start with an empty collection instead of the demo roster.
    #[arg(long, default_value_t = false)]
    empty: bool,
}

struct ServiceFailure(DirectoryError);

impl From<DirectoryError> for ServiceFailure {
    fn from(err: DirectoryError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ServiceFailure {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DirectoryError::Authentication | DirectoryError::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            DirectoryError::Unauthorized => StatusCode::FORBIDDEN,
            DirectoryError::Validation(_) => StatusCode::BAD_REQUEST,
            DirectoryError::NotFound(_) => StatusCode::NOT_FOUND,
            DirectoryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ServiceError {
            service_contract_version: SERVICE_CONTRACT_VERSION,
            kind: self.0.kind(),
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn envelope<T>(data: T) -> ServiceEnvelope<T>
where
    T: Serialize,
{
    ServiceEnvelope {
        service_contract_version: SERVICE_CONTRACT_VERSION,
        api_contract_version: API_CONTRACT_VERSION,
        data,
    }
}

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers.get(http::header::AUTHORIZATION).and_then(|value| value.to_str().ok())
}

fn caller(state: &ServiceState, headers: &HeaderMap) -> Option<Identity> {
    state.api.identity(authorization(headers))
}

fn app(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/openapi", get(openapi))
        .route("/v1/auth/login", post(auth_login))
        .route("/v1/auth/me", get(auth_me))
        .route("/v1/employees/query", post(employees_query))
        .route("/v1/employees/add", post(employee_add))
        .route("/v1/employees/:id", get(employee_show))
        .route("/v1/employees/:id/update", post(employee_update))
        .route("/v1/employees/:id/delete", post(employee_delete))
        .route("/v1/employees/:id/flag", post(employee_flag))
        .with_state(state)
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let secret = args
        .token_secret
        .or_else(|| std::env::var("STAFFDIR_TOKEN_SECRET").ok())
        .filter(|secret| !secret.trim().is_empty());
    let Some(secret) = secret else {
        anyhow::bail!("token secret missing: pass --token-secret or set STAFFDIR_TOKEN_SECRET");
    };

    let store = if args.empty {
        Arc::new(DirectoryStore::new())
    } else {
        Arc::new(DirectoryStore::seeded())
    };
    info!(records = store.len(), bind = %args.bind, "starting staffdir service");
    info!("demo accounts: admin@demo.com, employee@demo.com");

    let state = ServiceState { api: DirectoryApi::demo(store, TokenKey::from_secret(&secret)) };
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn health() -> Json<ServiceEnvelope<HealthResponse>> {
    Json(envelope(HealthResponse { status: "ok" }))
}

async fn openapi() -> impl IntoResponse {
    (StatusCode::OK, [("content-type", "application/yaml; charset=utf-8")], OPENAPI_YAML)
}

async fn auth_login(
    State(state): State<ServiceState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<ServiceEnvelope<AuthSession>>, ServiceFailure> {
    let session = state.api.login(&request)?;
    info!(user_id = %session.user_id, role = session.role.as_str(), "login succeeded");
    Ok(Json(envelope(session)))
}

async fn auth_me(
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> Json<ServiceEnvelope<Option<AuthSession>>> {
    Json(envelope(state.api.current_session(authorization(&headers))))
}

async fn employees_query(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(request): Json<EmployeesRequest>,
) -> Result<Json<ServiceEnvelope<EmployeePage>>, ServiceFailure> {
    let identity = caller(&state, &headers);
    let page = state.api.employees(identity.as_ref(), &request)?;
    Ok(Json(envelope(page)))
}

async fn employee_show(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ServiceEnvelope<Option<Employee>>>, ServiceFailure> {
    let identity = caller(&state, &headers);
    let employee = state.api.employee(identity.as_ref(), &id)?;
    Ok(Json(envelope(employee)))
}

async fn employee_add(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(input): Json<AddEmployeeInput>,
) -> Result<Json<ServiceEnvelope<Employee>>, ServiceFailure> {
    let identity = caller(&state, &headers);
    let employee = state.api.add_employee(identity.as_ref(), &input)?;
    info!(id = %employee.id, "employee added");
    Ok(Json(envelope(employee)))
}

async fn employee_update(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<UpdateEmployeeInput>,
) -> Result<Json<ServiceEnvelope<Employee>>, ServiceFailure> {
    let identity = caller(&state, &headers);
    let employee = state.api.update_employee(identity.as_ref(), &id, &input)?;
    Ok(Json(envelope(employee)))
}

async fn employee_delete(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ServiceEnvelope<bool>>, ServiceFailure> {
    let identity = caller(&state, &headers);
    let removed = state.api.delete_employee(identity.as_ref(), &id)?;
    Ok(Json(envelope(removed)))
}

async fn employee_flag(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<FlagEmployeeRequest>,
) -> Result<Json<ServiceEnvelope<Employee>>, ServiceFailure> {
    let identity = caller(&state, &headers);
    let employee = state.api.flag_employee(identity.as_ref(), &id, request.flagged)?;
    Ok(Json(envelope(employee)))
}
