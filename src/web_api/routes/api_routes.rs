use axum::{http::Method, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::{api_controller::ApiController, app_state::SharedState};

pub const ROUTER_PATH: &str = "/api";

pub fn get_router(app_state: SharedState) -> Router {
    Router::new()
        .route(&format!("{ROUTER_PATH}/"), get(ApiController::overview))
        .route(&format!("{ROUTER_PATH}/task-list/"), get(ApiController::task_list))
        .route(
            &format!("{ROUTER_PATH}/task-details/:id"),
            get(ApiController::task_details),
        )
        .route(
            &format!("{ROUTER_PATH}/task-details/:id/"),
            get(ApiController::task_details),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET])
                .allow_headers(Any),
        )
        .with_state(app_state)
}
