use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::{
    app_state::SharedState, error::AppError, task_controller::parse_task_id,
    task_response::TaskResponse,
};

/// Read-only JSON views. No authentication.
pub struct ApiController {}

impl ApiController {
    pub async fn overview() -> Json<Value> {
        Json(json!({
            "List": "/task-list/",
            "Detail View": "/task-details/<str:pk>/",
        }))
    }

    pub async fn task_list(
        State(state): State<SharedState>,
    ) -> Result<Json<Vec<TaskResponse>>, AppError> {
        let tasks = state.data_context.list_tasks()?;
        Ok(Json(
            tasks
                .iter()
                .map(|t| TaskResponse::new(t, &state.settings))
                .collect(),
        ))
    }

    pub async fn task_details(
        State(state): State<SharedState>,
        Path(id): Path<String>,
    ) -> Result<Json<TaskResponse>, AppError> {
        let id = parse_task_id(&id)?;
        let task = state
            .data_context
            .get_task(id)?
            .ok_or_else(|| AppError::NotFound(format!("task {id}")))?;
        Ok(Json(TaskResponse::new(&task, &state.settings)))
    }
}
