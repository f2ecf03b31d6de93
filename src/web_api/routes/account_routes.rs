use axum::{routing::get, Router};

use crate::{account_controller::AccountController, app_state::SharedState};

pub fn get_router(app_state: SharedState) -> Router {
    Router::new()
        .route(
            "/login/",
            get(AccountController::login_form).post(AccountController::login),
        )
        .route(
            "/logout/",
            get(AccountController::logout).post(AccountController::logout),
        )
        .route(
            "/register/",
            get(AccountController::register_form).post(AccountController::register),
        )
        .with_state(app_state)
}
