use axum::{
    extract::{Multipart, Path, State},
    http::Uri,
    response::Redirect,
    Json,
};
use serde_json::{json, Value};

use crate::{
    app_state::SharedState,
    auth::CurrentUser,
    error::AppError,
    task::TaskId,
    task_form::TaskForm,
    task_response::TaskResponse,
    task_service,
    user::User,
};

/// Where create, update and delete send the browser afterwards.
pub const SUCCESS_PATH: &str = "/";

pub struct TaskController {}

impl TaskController {
    pub async fn list(
        State(state): State<SharedState>,
        CurrentUser(user): CurrentUser,
        uri: Uri,
    ) -> Result<Json<Value>, AppError> {
        let tasks = task_service::list_tasks(&state, user.as_ref())
            .map_err(|e| e.login_next(uri.path()))?;
        let tasks: Vec<TaskResponse> = tasks
            .iter()
            .map(|t| TaskResponse::new(t, &state.settings))
            .collect();
        Ok(Json(json!({ "tasks": tasks })))
    }

    pub async fn detail(
        State(state): State<SharedState>,
        CurrentUser(user): CurrentUser,
        Path(id): Path<String>,
        uri: Uri,
    ) -> Result<Json<Value>, AppError> {
        let id = parse_task_id(&id)?;
        let task = task_service::get_task(&state, user.as_ref(), id)
            .map_err(|e| e.login_next(uri.path()))?;
        Ok(Json(json!({ "task": TaskResponse::new(&task, &state.settings) })))
    }

    pub async fn create_form(
        State(state): State<SharedState>,
        CurrentUser(user): CurrentUser,
        uri: Uri,
    ) -> Result<Json<Value>, AppError> {
        let users = task_service::list_users(&state, user.as_ref())
            .map_err(|e| e.login_next(uri.path()))?;
        Ok(Json(json!({ "users": user_choices(&users) })))
    }

    pub async fn create(
        State(state): State<SharedState>,
        CurrentUser(user): CurrentUser,
        uri: Uri,
        multipart: Multipart,
    ) -> Result<Redirect, AppError> {
        // Bounce anonymous posts before reading the upload.
        if user.is_none() {
            return Err(AppError::Unauthenticated { next: None }.login_next(uri.path()));
        }
        let form = read_task_form(multipart).await?;
        task_service::create_task(&state, user.as_ref(), form).await?;
        Ok(Redirect::to(SUCCESS_PATH))
    }

    pub async fn update_form(
        State(state): State<SharedState>,
        CurrentUser(user): CurrentUser,
        Path(id): Path<String>,
        uri: Uri,
    ) -> Result<Json<Value>, AppError> {
        let id = parse_task_id(&id)?;
        let task = task_service::get_own_task(&state, user.as_ref(), id)
            .map_err(|e| e.login_next(uri.path()))?;
        let users = task_service::list_users(&state, user.as_ref())?;
        Ok(Json(json!({
            "task": TaskResponse::new(&task, &state.settings),
            "users": user_choices(&users),
        })))
    }

    pub async fn update(
        State(state): State<SharedState>,
        CurrentUser(user): CurrentUser,
        Path(id): Path<String>,
        uri: Uri,
        multipart: Multipart,
    ) -> Result<Redirect, AppError> {
        let id = parse_task_id(&id)?;
        // Check access before reading the upload.
        task_service::get_own_task(&state, user.as_ref(), id)
            .map_err(|e| e.login_next(uri.path()))?;
        let form = read_task_form(multipart).await?;
        task_service::update_task(&state, user.as_ref(), id, form).await?;
        Ok(Redirect::to(SUCCESS_PATH))
    }

    pub async fn delete_form(
        State(state): State<SharedState>,
        CurrentUser(user): CurrentUser,
        Path(id): Path<String>,
        uri: Uri,
    ) -> Result<Json<Value>, AppError> {
        let id = parse_task_id(&id)?;
        let task = task_service::get_own_task(&state, user.as_ref(), id)
            .map_err(|e| e.login_next(uri.path()))?;
        Ok(Json(json!({ "task": TaskResponse::new(&task, &state.settings) })))
    }

    pub async fn delete(
        State(state): State<SharedState>,
        CurrentUser(user): CurrentUser,
        Path(id): Path<String>,
        uri: Uri,
    ) -> Result<Redirect, AppError> {
        let id = parse_task_id(&id)?;
        task_service::delete_task(&state, user.as_ref(), id)
            .map_err(|e| e.login_next(uri.path()))?;
        Ok(Redirect::to(SUCCESS_PATH))
    }
}

/// Ids that don't parse can't exist.
pub fn parse_task_id(raw: &str) -> Result<TaskId, AppError> {
    raw.trim_end_matches('/')
        .parse()
        .map_err(|_| AppError::NotFound(format!("task {raw}")))
}

fn user_choices(users: &[User]) -> Vec<crate::user_response::UserResponse> {
    users.iter().map(User::to_response).collect()
}

/// Read a multipart task form. The `image` field is a file; an empty file
/// part means no upload.
async fn read_task_form(mut multipart: Multipart) -> Result<TaskForm, AppError> {
    let mut form = TaskForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let filename = field.file_name().map(str::to_string);
            let bytes = field.bytes().await?;
            if let Some(filename) = filename.filter(|f| !f.is_empty()) {
                if !bytes.is_empty() {
                    form.set_upload(filename, bytes.to_vec())?;
                }
            }
            continue;
        }
        let value = field.text().await?;
        form.set_text_field(&name, value)?;
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_ids_parse_or_are_not_found() {
        assert_eq!(parse_task_id("12").unwrap(), 12);
        assert_eq!(parse_task_id("12/").unwrap(), 12);
        assert!(matches!(parse_task_id("abc"), Err(AppError::NotFound(_))));
        assert!(matches!(parse_task_id("-1"), Err(AppError::NotFound(_))));
    }
}
