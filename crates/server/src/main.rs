use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    routing::get,
    Json, Router,
};
use server_api::{
    create_label, create_todo, delete_label, delete_todo, find_todo, list_labels, list_todos,
    update_todo, ApiContext,
};
use shared::{
    domain::{Label, LabelId, Todo, TodoId},
    error::{ApiError, ErrorCode},
    protocol::{NewLabelPayload, NewTodoPayload, UpdateTodoPayload},
};
use storage::Storage;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;
mod extract;

use app_state::AppState;
use config::{load_settings, normalize_database_url};
use extract::{ApiJson, ApiPath};

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let state = AppState {
        api: ApiContext { storage },
    };
    let app = with_cors(build_router(Arc::new(state)), settings.cors_allowed_origin.as_deref())?;

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/todos", get(http_list_todos).post(http_create_todo))
        .route(
            "/todos/:todo_id",
            get(http_find_todo)
                .patch(http_update_todo)
                .delete(http_delete_todo),
        )
        .route("/labels", get(http_list_labels).post(http_create_label))
        .route("/labels/:label_id", axum::routing::delete(http_delete_label))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Allows the configured front-end origin, if any, to call the API.
fn with_cors(router: Router, allowed_origin: Option<&str>) -> anyhow::Result<Router> {
    let Some(origin) = allowed_origin else {
        return Ok(router);
    };
    let origin: HeaderValue = origin.parse()?;
    info!(origin = ?origin, "cors enabled");
    Ok(router.layer(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers([header::CONTENT_TYPE]),
    ))
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(err: ApiError) -> (StatusCode, Json<ApiError>) {
    if matches!(err.code, ErrorCode::Internal) {
        error!(message = %err.message, "request failed");
    }
    (status_for(err.code), Json(err))
}

async fn healthz(State(state): State<Arc<AppState>>) -> ApiResult<&'static str> {
    state.api.storage.health_check().await.map_err(|e| {
        api_error(ApiError::new(ErrorCode::Internal, e.to_string()))
    })?;
    Ok("ok")
}

async fn http_list_todos(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Todo>>> {
    let todos = list_todos(&state.api).await.map_err(api_error)?;
    Ok(Json(todos))
}

async fn http_create_todo(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<NewTodoPayload>,
) -> ApiResult<(StatusCode, Json<Todo>)> {
    let todo = create_todo(&state.api, payload).await.map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(todo)))
}

async fn http_find_todo(
    State(state): State<Arc<AppState>>,
    ApiPath(todo_id): ApiPath<i64>,
) -> ApiResult<Json<Todo>> {
    let todo = find_todo(&state.api, TodoId(todo_id))
        .await
        .map_err(api_error)?;
    Ok(Json(todo))
}

async fn http_update_todo(
    State(state): State<Arc<AppState>>,
    ApiPath(todo_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<UpdateTodoPayload>,
) -> ApiResult<Json<Todo>> {
    let todo = update_todo(&state.api, TodoId(todo_id), payload)
        .await
        .map_err(api_error)?;
    Ok(Json(todo))
}

async fn http_delete_todo(
    State(state): State<Arc<AppState>>,
    ApiPath(todo_id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    delete_todo(&state.api, TodoId(todo_id))
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn http_list_labels(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Label>>> {
    let labels = list_labels(&state.api).await.map_err(api_error)?;
    Ok(Json(labels))
}

async fn http_create_label(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<NewLabelPayload>,
) -> ApiResult<(StatusCode, Json<Label>)> {
    let label = create_label(&state.api, payload)
        .await
        .map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(label)))
}

async fn http_delete_label(
    State(state): State<Arc<AppState>>,
    ApiPath(label_id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    delete_label(&state.api, LabelId(label_id))
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
