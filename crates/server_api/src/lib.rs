use shared::{
    domain::{Label, LabelId, Todo, TodoId},
    error::{ApiError, ErrorCode},
    protocol::{NewLabelPayload, NewTodoPayload, UpdateTodoPayload},
};
use storage::Storage;
use tracing::info;

pub const MAX_TODO_TEXT_CHARS: usize = 100;
pub const MAX_LABEL_NAME_CHARS: usize = 100;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub async fn list_todos(ctx: &ApiContext) -> Result<Vec<Todo>, ApiError> {
    ctx.storage.list_todos().await.map_err(internal)
}

pub async fn find_todo(ctx: &ApiContext, todo_id: TodoId) -> Result<Todo, ApiError> {
    ctx.storage
        .find_todo(todo_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| todo_not_found(todo_id))
}

pub async fn create_todo(ctx: &ApiContext, payload: NewTodoPayload) -> Result<Todo, ApiError> {
    validate_text("todo text", &payload.text, MAX_TODO_TEXT_CHARS)?;
    ensure_labels_exist(ctx, &payload.labels).await?;
    let todo = ctx.storage.create_todo(&payload).await.map_err(internal)?;
    info!(todo_id = todo.id.0, labels = todo.labels.len(), "todo created");
    Ok(todo)
}

pub async fn update_todo(
    ctx: &ApiContext,
    todo_id: TodoId,
    payload: UpdateTodoPayload,
) -> Result<Todo, ApiError> {
    if let Some(text) = &payload.text {
        validate_text("todo text", text, MAX_TODO_TEXT_CHARS)?;
    }
    if let Some(labels) = &payload.labels {
        ensure_labels_exist(ctx, labels).await?;
    }
    let todo = ctx
        .storage
        .update_todo(todo_id, &payload)
        .await
        .map_err(internal)?
        .ok_or_else(|| todo_not_found(todo_id))?;
    info!(todo_id = todo.id.0, completed = todo.completed, "todo updated");
    Ok(todo)
}

pub async fn delete_todo(ctx: &ApiContext, todo_id: TodoId) -> Result<(), ApiError> {
    if !ctx.storage.delete_todo(todo_id).await.map_err(internal)? {
        return Err(todo_not_found(todo_id));
    }
    info!(todo_id = todo_id.0, "todo deleted");
    Ok(())
}

pub async fn list_labels(ctx: &ApiContext) -> Result<Vec<Label>, ApiError> {
    ctx.storage.list_labels().await.map_err(internal)
}

/// The UNIQUE constraint decides duplicates, so concurrent creates of one
/// name yield exactly one label and `conflict` for the rest.
pub async fn create_label(ctx: &ApiContext, payload: NewLabelPayload) -> Result<Label, ApiError> {
    validate_text("label name", &payload.name, MAX_LABEL_NAME_CHARS)?;
    let label = ctx
        .storage
        .create_label(&payload.name)
        .await
        .map_err(internal)?
        .ok_or_else(|| {
            ApiError::new(
                ErrorCode::Conflict,
                format!("label '{}' already exists", payload.name),
            )
        })?;
    info!(label_id = label.id.0, "label created");
    Ok(label)
}

pub async fn delete_label(ctx: &ApiContext, label_id: LabelId) -> Result<(), ApiError> {
    if !ctx.storage.delete_label(label_id).await.map_err(internal)? {
        return Err(ApiError::new(
            ErrorCode::NotFound,
            format!("label {label_id} not found"),
        ));
    }
    info!(label_id = label_id.0, "label deleted");
    Ok(())
}

fn validate_text(field: &str, value: &str, max_chars: usize) -> Result<(), ApiError> {
    if value.is_empty() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("{field} can not be empty"),
        ));
    }
    if value.chars().count() > max_chars {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("{field} is over {max_chars} characters"),
        ));
    }
    Ok(())
}

async fn ensure_labels_exist(ctx: &ApiContext, label_ids: &[LabelId]) -> Result<(), ApiError> {
    let missing = ctx
        .storage
        .missing_label_ids(label_ids)
        .await
        .map_err(internal)?;
    if missing.is_empty() {
        return Ok(());
    }
    let ids = missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    Err(ApiError::new(
        ErrorCode::Validation,
        format!("unknown label ids: {ids}"),
    ))
}

fn todo_not_found(todo_id: TodoId) -> ApiError {
    ApiError::new(ErrorCode::NotFound, format!("todo {todo_id} not found"))
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}
