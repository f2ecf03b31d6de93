use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use serde_json::json;

use crate::{
    app_state::SharedState,
    auth::{self, CurrentUser},
    error::{AppError, LOGIN_PATH},
    login_request::LoginRequest,
    register_request::RegisterRequest,
    user::User,
};

pub const HOME_PATH: &str = "/";

pub struct AccountController {}

impl AccountController {
    pub async fn login_form(CurrentUser(user): CurrentUser) -> Response {
        if user.is_some() {
            return Redirect::to(HOME_PATH).into_response();
        }
        Json(json!({ "form": "login", "fields": ["username", "password", "next"] }))
            .into_response()
    }

    pub async fn login(
        State(state): State<SharedState>,
        Form(payload): Form<LoginRequest>,
    ) -> Result<Response, AppError> {
        let user = auth::authenticate(&state.data_context, &payload.username, &payload.password)?;
        tracing::info!(username = %user.username, "user logged in");
        let target = safe_next(payload.next.as_deref());
        start_session(&state, &user, target)
    }

    pub async fn logout() -> Response {
        (
            [(header::SET_COOKIE, auth::clear_session_cookie())],
            Redirect::to(LOGIN_PATH),
        )
            .into_response()
    }

    pub async fn register_form(CurrentUser(user): CurrentUser) -> Response {
        if user.is_some() {
            return Redirect::to(HOME_PATH).into_response();
        }
        Json(json!({
            "form": "register",
            "fields": ["username", "email", "password1", "password2"],
        }))
        .into_response()
    }

    pub async fn register(
        State(state): State<SharedState>,
        Form(payload): Form<RegisterRequest>,
    ) -> Result<Response, AppError> {
        payload.validate()?;
        let password_hash = auth::hash_password(&payload.password1)?;
        let user = User::new(payload.username.trim(), payload.email.trim(), password_hash);
        state.data_context.create_user(&user)?;
        tracing::info!(username = %user.username, "user registered");
        start_session(&state, &user, HOME_PATH)
    }
}

fn start_session(state: &SharedState, user: &User, target: &str) -> Result<Response, AppError> {
    let token = auth::create_token(user, &state.settings)?;
    Ok((
        [(header::SET_COOKIE, auth::session_cookie(&token, &state.settings))],
        Redirect::to(target),
    )
        .into_response())
}

/// Only same-site paths are followed after login.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if is_local_path(path) => path,
        _ => HOME_PATH,
    }
}

/// A path on this site: no `//host` or `/\host` prefix, no backslash,
/// no control characters.
fn is_local_path(path: &str) -> bool {
    let mut chars = path.chars();
    chars.next() == Some('/')
        && !matches!(chars.next(), Some('/' | '\\'))
        && !path.chars().any(|c| c == '\\' || c.is_control())
}
