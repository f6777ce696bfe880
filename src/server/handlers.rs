//! Request handlers and response envelopes.

use crate::auth::CurrentUser;
use crate::error::{ApiError, FieldError, TaskError};
use crate::query::ListParams;
use crate::service::TaskService;
use crate::types::{Task, TaskId, TaskStats, UserId, now};
use crate::validate::{CreateTaskRequest, UpdateTaskRequest};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, warn};

/// A task as returned to clients, with its derived overdue flag.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub is_overdue: bool,
}

impl TaskView {
    fn new(task: Task) -> Self {
        let is_overdue = task.is_overdue(now());
        Self { task, is_overdue }
    }
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskView>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub task: TaskView,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// The operation a request performs, for logging and failure messages.
#[derive(Debug, Clone, Copy)]
enum Operation {
    List,
    Stats,
    Get,
    Create,
    Update,
    ToggleStatus,
    Delete,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Operation::List => "list_tasks",
            Operation::Stats => "task_stats",
            Operation::Get => "get_task",
            Operation::Create => "create_task",
            Operation::Update => "update_task",
            Operation::ToggleStatus => "toggle_task_status",
            Operation::Delete => "delete_task",
        }
    }

    fn failure_message(self) -> &'static str {
        match self {
            Operation::List => "Server error while fetching tasks",
            Operation::Stats => "Server error while fetching task statistics",
            Operation::Get => "Server error while fetching task",
            Operation::Create => "Server error while creating task",
            Operation::Update => "Server error while updating task",
            Operation::ToggleStatus => "Server error while updating task status",
            Operation::Delete => "Server error while deleting task",
        }
    }
}

/// Log a failed operation and turn it into a client-safe error.
fn reject(op: Operation, caller: &UserId, task_id: Option<&str>, err: TaskError) -> ApiError {
    let task_id = task_id.unwrap_or("-");
    match err {
        TaskError::Validation(errors) => {
            let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
            warn!(operation = op.name(), caller = %caller, task_id, ?fields, "Validation failed");
            ApiError::validation(errors)
        }
        TaskError::InvalidIdentifier(_) => {
            warn!(operation = op.name(), caller = %caller, task_id, "Invalid task id");
            ApiError::invalid_identifier()
        }
        TaskError::NotFound(_) => {
            warn!(operation = op.name(), caller = %caller, task_id, "Task not found");
            ApiError::task_not_found()
        }
        TaskError::Store(source) => {
            error!(operation = op.name(), caller = %caller, task_id, error = %source, "Store failure");
            ApiError::internal(op.failure_message())
        }
    }
}

fn body_error(
    op: Operation,
    caller: &UserId,
    task_id: Option<&str>,
    rejection: JsonRejection,
) -> ApiError {
    let err = TaskError::Validation(vec![FieldError::new("body", rejection.body_text())]);
    reject(op, caller, task_id, err)
}

pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Task Manager API is running!",
    })
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn list_tasks(
    State(service): State<Arc<TaskService>>,
    CurrentUser(caller): CurrentUser,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<TaskListResponse>, ApiError> {
    let Query(params) = params.map_err(|rejection| {
        let err = TaskError::Validation(vec![FieldError::new("query", rejection.body_text())]);
        reject(Operation::List, &caller, None, err)
    })?;

    let tasks = service
        .list(&caller, &params)
        .map_err(|err| reject(Operation::List, &caller, None, err))?;

    let tasks: Vec<TaskView> = tasks.into_iter().map(TaskView::new).collect();
    Ok(Json(TaskListResponse {
        count: tasks.len(),
        tasks,
    }))
}

pub async fn task_stats(
    State(service): State<Arc<TaskService>>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<TaskStats>, ApiError> {
    service
        .stats(&caller)
        .map(Json)
        .map_err(|err| reject(Operation::Stats, &caller, None, err))
}

pub async fn get_task(
    State(service): State<Arc<TaskService>>,
    CurrentUser(caller): CurrentUser,
    Path(task_id): Path<String>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = service
        .get(&caller, &task_id)
        .map_err(|err| reject(Operation::Get, &caller, Some(&task_id), err))?;

    Ok(Json(TaskResponse {
        message: None,
        task: TaskView::new(task),
    }))
}

pub async fn create_task(
    State(service): State<Arc<TaskService>>,
    CurrentUser(caller): CurrentUser,
    body: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body.map_err(|r| body_error(Operation::Create, &caller, None, r))?;

    let task = service
        .create(&caller, &request)
        .map_err(|err| reject(Operation::Create, &caller, None, err))?;

    Ok((
        StatusCode::CREATED,
        Json(TaskResponse {
            message: Some("Task created successfully"),
            task: TaskView::new(task),
        }),
    ))
}

pub async fn update_task(
    State(service): State<Arc<TaskService>>,
    CurrentUser(caller): CurrentUser,
    Path(task_id): Path<String>,
    body: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> Result<Json<TaskResponse>, ApiError> {
    let request = match body {
        Ok(Json(request)) => request,
        // a malformed id outranks a malformed body
        Err(rejection) => {
            if let Err(err) = TaskId::parse(&task_id) {
                return Err(reject(Operation::Update, &caller, Some(&task_id), err.into()));
            }
            return Err(body_error(Operation::Update, &caller, Some(&task_id), rejection));
        }
    };

    let task = service
        .update(&caller, &task_id, &request)
        .map_err(|err| reject(Operation::Update, &caller, Some(&task_id), err))?;

    Ok(Json(TaskResponse {
        message: Some("Task updated successfully"),
        task: TaskView::new(task),
    }))
}

pub async fn toggle_task_status(
    State(service): State<Arc<TaskService>>,
    CurrentUser(caller): CurrentUser,
    Path(task_id): Path<String>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = service
        .toggle_status(&caller, &task_id)
        .map_err(|err| reject(Operation::ToggleStatus, &caller, Some(&task_id), err))?;

    Ok(Json(TaskResponse {
        message: Some("Task status updated successfully"),
        task: TaskView::new(task),
    }))
}

pub async fn delete_task(
    State(service): State<Arc<TaskService>>,
    CurrentUser(caller): CurrentUser,
    Path(task_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    service
        .delete(&caller, &task_id)
        .map_err(|err| reject(Operation::Delete, &caller, Some(&task_id), err))?;

    Ok(Json(MessageResponse {
        message: "Task deleted successfully",
    }))
}
