use axum::{extract::DefaultBodyLimit, routing::get, Router};

use crate::{app_state::SharedState, task_controller::TaskController};

/// Uploads larger than this are refused before they reach the handler.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn get_router(app_state: SharedState) -> Router {
    Router::new()
        .route("/", get(TaskController::list))
        .route("/task/:id", get(TaskController::detail))
        .route(
            "/task-create/",
            get(TaskController::create_form).post(TaskController::create),
        )
        .route(
            "/task-update/:id",
            get(TaskController::update_form).post(TaskController::update),
        )
        .route(
            "/task-delete/:id",
            get(TaskController::delete_form).post(TaskController::delete),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(app_state)
}
