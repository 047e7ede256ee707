use shared::{
    domain::{Task, TaskId},
    error::{ApiError, ErrorCode},
    protocol::TaskPatch,
};
use storage::Storage;
use tracing::info;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub async fn list_tasks(ctx: &ApiContext) -> Result<Vec<Task>, ApiError> {
    ctx.storage.list_tasks().await.map_err(internal)
}

/// Creates a task under a client-assigned id; the client owns the id
/// counter.
pub async fn create_task(
    ctx: &ApiContext,
    id: TaskId,
    fields: TaskPatch,
) -> Result<Task, ApiError> {
    if ctx.storage.task_exists(id).await.map_err(internal)? {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("task {} already exists", id.0),
        ));
    }

    let task = Task {
        id,
        text: fields.text.unwrap_or_default(),
        due_date: fields.due_date.unwrap_or_default(),
        completed: fields.completed.unwrap_or(false),
    };
    ctx.storage.insert_task(&task).await.map_err(internal)?;
    info!(task_id = id.0, "task created");
    Ok(task)
}

pub async fn update_task(ctx: &ApiContext, id: TaskId, patch: TaskPatch) -> Result<(), ApiError> {
    if patch.is_empty() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "no updatable fields in request body",
        ));
    }

    let found = ctx.storage.update_task(id, &patch).await.map_err(internal)?;
    if !found {
        return Err(ApiError::new(
            ErrorCode::NotFound,
            format!("task {} not found", id.0),
        ));
    }
    info!(task_id = id.0, "task updated");
    Ok(())
}

pub async fn delete_task(ctx: &ApiContext, id: TaskId) -> Result<(), ApiError> {
    let found = ctx.storage.delete_task(id).await.map_err(internal)?;
    if !found {
        return Err(ApiError::new(
            ErrorCode::NotFound,
            format!("task {} not found", id.0),
        ));
    }
    info!(task_id = id.0, "task deleted");
    Ok(())
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}
