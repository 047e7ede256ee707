use std::{collections::BTreeMap, net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use server_api::{create_task, delete_task, list_tasks, update_task, ApiContext};
use shared::{
    domain::{Task, TaskId},
    error::{ApiError, ErrorCode},
    protocol::TaskPatch,
};
use storage::Storage;
use tracing::{error, info};

mod config;

use config::{load_settings, prepare_database_url};

#[derive(Clone)]
struct AppState {
    api: ApiContext,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    storage.health_check().await?;

    let state = AppState {
        api: ApiContext { storage },
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "todo server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/todos", get(http_list_tasks))
        .route("/todos/:id", post(http_create_task))
        .route("/todos/:id", put(http_update_task))
        .route("/todos/:id", delete(http_delete_task))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn http_list_tasks(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BTreeMap<i64, Task>>, (StatusCode, Json<ApiError>)> {
    let tasks = list_tasks(&state.api).await.map_err(error_response)?;
    let keyed: BTreeMap<i64, Task> = tasks.into_iter().map(|task| (task.id.0, task)).collect();
    Ok(Json(keyed))
}

async fn http_create_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(fields): Json<TaskPatch>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    create_task(&state.api, TaskId(id), fields)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::CREATED)
}

async fn http_update_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(patch): Json<TaskPatch>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    update_task(&state.api, TaskId(id), patch)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::OK)
}

async fn http_delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    delete_task(&state.api, TaskId(id))
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

fn error_response(err: ApiError) -> (StatusCode, Json<ApiError>) {
    let status = match err.code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
