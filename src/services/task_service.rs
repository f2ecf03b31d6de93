//! Task operations behind the page routes.
//!
//! Each operation checks access first, then touches the data context, then
//! runs the side effects (image shrink, assignment mail). Side effects run
//! after the row is committed; their failures are logged and never undo
//! the save.

use std::collections::BTreeSet;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    access::{require_author, require_login},
    app_state::AppState,
    error::AppError,
    notification_service,
    task::{Task, TaskId},
    task_form::{ImageInput, TaskForm},
    user::User,
};

// ── Shared helpers ─────────────────────────────────────────────

/// Fetch a task or fail with NotFound.
fn fetch_task(state: &AppState, id: TaskId) -> Result<Task, AppError> {
    state
        .data_context
        .get_task(id)?
        .ok_or_else(|| AppError::NotFound(format!("task {id}")))
}

/// Every responsible id has to name an existing user.
fn check_responsible(state: &AppState, responsible: &BTreeSet<Uuid>) -> Result<(), AppError> {
    for id in responsible {
        if state.data_context.get_user(*id)?.is_none() {
            return Err(AppError::Validation(format!(
                "select a valid choice: {id} is not one of the available users"
            )));
        }
    }
    Ok(())
}

/// Store an uploaded file, if the form carries one.
fn store_upload(state: &AppState, image: &ImageInput) -> Result<Option<String>, AppError> {
    match image {
        ImageInput::Upload { filename, bytes } => Ok(Some(state.media.save_upload(filename, bytes)?)),
        ImageInput::Keep | ImageInput::Clear => Ok(None),
    }
}

fn discard_upload(state: &AppState, name: Option<&str>) {
    if let Some(name) = name {
        if let Err(e) = state.media.remove(name) {
            tracing::warn!(image = %name, error = %e, "failed to discard unused upload");
        }
    }
}

/// Post-save side effects. `previous_responsible` is the set before this
/// save (empty for a new task).
async fn after_save(state: &AppState, task: &Task, previous_responsible: &BTreeSet<Uuid>) {
    if let Some(image) = &task.image {
        match state.media.shrink_to_bounds(image).await {
            Ok(true) => tracing::info!(task_id = task.id, image = %image, "image shrunk to bounds"),
            Ok(false) => {}
            Err(e) => tracing::error!(task_id = task.id, image = %image, error = %e, "image post-processing failed"),
        }
    }

    if &task.responsible != previous_responsible {
        let result = notification_service::notify_responsible(
            &state.data_context,
            state.mailer.clone(),
            &state.settings,
            task,
        )
        .await;
        match result {
            Ok(0) => {}
            Ok(count) => tracing::info!(task_id = task.id, recipients = count, "assignment mail sent"),
            Err(e) => tracing::error!(task_id = task.id, error = %e, "assignment mail failed"),
        }
    }
}

// ── Operations ─────────────────────────────────────────────────

pub fn list_tasks(state: &AppState, user: Option<&User>) -> Result<Vec<Task>, AppError> {
    require_login(user)?;
    Ok(state.data_context.list_tasks()?)
}

pub fn get_task(state: &AppState, user: Option<&User>, id: TaskId) -> Result<Task, AppError> {
    require_login(user)?;
    fetch_task(state, id)
}

/// Users selectable as responsible on the create/update forms.
pub fn list_users(state: &AppState, user: Option<&User>) -> Result<Vec<User>, AppError> {
    require_login(user)?;
    Ok(state.data_context.list_users()?)
}

/// Task for the edit and delete forms: only its author may open them.
pub fn get_own_task(state: &AppState, user: Option<&User>, id: TaskId) -> Result<Task, AppError> {
    require_login(user)?;
    let task = fetch_task(state, id)?;
    require_author(user, &task)?;
    Ok(task)
}

pub async fn create_task(
    state: &AppState,
    user: Option<&User>,
    form: TaskForm,
) -> Result<Task, AppError> {
    let author = require_login(user)?;
    form.validate()?;
    check_responsible(state, &form.responsible)?;

    let mut task = Task::new(&form, author, Utc::now());
    task.image = store_upload(state, &form.image)?;

    if let Err(e) = state.data_context.insert_task(&mut task) {
        discard_upload(state, task.image.as_deref());
        return Err(e.into());
    }
    tracing::info!(task_id = task.id, author = %author.username, "task created");

    after_save(state, &task, &BTreeSet::new()).await;
    Ok(task)
}

pub async fn update_task(
    state: &AppState,
    user: Option<&User>,
    id: TaskId,
    form: TaskForm,
) -> Result<Task, AppError> {
    require_login(user)?;
    let mut task = fetch_task(state, id)?;
    let editor = require_author(user, &task)?;
    form.validate()?;
    check_responsible(state, &form.responsible)?;

    let previous_responsible = task.responsible.clone();
    let previous_image = task.image.clone();

    // The author is re-set to the editor, which the gate above guarantees is
    // already the author.
    task.apply(&form, editor);
    match &form.image {
        ImageInput::Keep => {}
        ImageInput::Clear => task.image = None,
        ImageInput::Upload { .. } => task.image = store_upload(state, &form.image)?,
    }

    let saved = match state.data_context.save_task(&mut task) {
        Ok(saved) => saved,
        Err(e) => {
            if task.image != previous_image {
                discard_upload(state, task.image.as_deref());
            }
            return Err(e.into());
        }
    };
    if !saved {
        if task.image != previous_image {
            discard_upload(state, task.image.as_deref());
        }
        return Err(AppError::NotFound(format!("task {id}")));
    }
    tracing::info!(task_id = task.id, editor = %editor.username, "task updated");

    if task.image != previous_image {
        discard_upload(state, previous_image.as_deref());
    }

    after_save(state, &task, &previous_responsible).await;
    Ok(task)
}

/// Remove a task and its stored image. Irreversible.
pub fn delete_task(state: &AppState, user: Option<&User>, id: TaskId) -> Result<(), AppError> {
    require_login(user)?;
    let task = fetch_task(state, id)?;
    let owner = require_author(user, &task)?;

    let removed = state
        .data_context
        .delete_task(id)?
        .ok_or_else(|| AppError::NotFound(format!("task {id}")))?;
    tracing::info!(task_id = id, author = %owner.username, "task deleted");

    if let Some(image) = &removed.image {
        if let Err(e) = state.media.remove(image) {
            tracing::error!(task_id = id, image = %image, error = %e, "failed to remove task image");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{png_bytes, test_state_with_mailer, FailingMailer, RecordingMailer};
    use std::{fs, sync::Arc};

    fn form(title: &str, responsible: &[&User]) -> TaskForm {
        TaskForm {
            title: title.to_string(),
            responsible: responsible.iter().map(|u| u.id).collect(),
            ..TaskForm::default()
        }
    }

    fn recording() -> (Arc<AppState>, tempfile::TempDir, Arc<RecordingMailer>) {
        let mailer = Arc::new(RecordingMailer::default());
        let (state, dir) = test_state_with_mailer(mailer.clone());
        (state, dir, mailer)
    }

    #[tokio::test]
    async fn anonymous_requests_are_unauthenticated() {
        let (state, _dir, _mailer) = recording();

        assert!(matches!(
            list_tasks(&state, None),
            Err(AppError::Unauthenticated { .. })
        ));
        assert!(matches!(
            get_task(&state, None, 1),
            Err(AppError::Unauthenticated { .. })
        ));
        assert!(matches!(
            create_task(&state, None, form("x", &[])).await,
            Err(AppError::Unauthenticated { .. })
        ));
        assert!(matches!(
            update_task(&state, None, 1, form("y", &[])).await,
            Err(AppError::Unauthenticated { .. })
        ));
        assert!(matches!(
            delete_task(&state, None, 1),
            Err(AppError::Unauthenticated { .. })
        ));
    }

    #[tokio::test]
    async fn anonymous_update_of_an_existing_task_changes_nothing() {
        let (state, _dir, mailer) = recording();
        let ann = state.add_user("ann");
        let bob = state.add_user("bob");
        let task = create_task(&state, Some(&ann), form("Keep me", &[])).await.unwrap();

        assert!(matches!(
            update_task(&state, None, task.id, form("Hijacked", &[&bob])).await,
            Err(AppError::Unauthenticated { .. })
        ));

        assert_eq!(state.data_context.get_task(task.id).unwrap().unwrap(), task);
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn create_sets_author_and_notifies_once() {
        let (state, _dir, mailer) = recording();
        let ann = state.add_user("ann");
        let u1 = state.add_user("u1");
        let u2 = state.add_user("u2");

        let task = create_task(&state, Some(&ann), form("Paint fence", &[&u1, &u2]))
            .await
            .unwrap();

        assert_eq!(task.author, Some(ann.id));
        assert!(!task.completed);
        assert_eq!(task.created, task.updated);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        let mut to = sent[0].to.clone();
        to.sort();
        assert_eq!(to, vec![u1.email.clone(), u2.email.clone()]);
        assert!(sent[0].body.contains(&format!("/task/{}", task.id)));
        assert!(sent[0].body.contains("ann"));
    }

    #[tokio::test]
    async fn create_without_responsible_sends_nothing() {
        let (state, _dir, mailer) = recording();
        let ann = state.add_user("ann");

        create_task(&state, Some(&ann), form("Solo", &[])).await.unwrap();
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn removing_a_member_notifies_the_remaining_set() {
        let (state, _dir, mailer) = recording();
        let ann = state.add_user("ann");
        let u1 = state.add_user("u1");
        let u2 = state.add_user("u2");

        let task = create_task(&state, Some(&ann), form("Paint fence", &[&u1, &u2]))
            .await
            .unwrap();
        update_task(&state, Some(&ann), task.id, form("Paint fence", &[&u1]))
            .await
            .unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].to, vec![u1.email.clone()]);
    }

    #[tokio::test]
    async fn unchanged_responsible_set_sends_nothing_on_update() {
        let (state, _dir, mailer) = recording();
        let ann = state.add_user("ann");
        let u1 = state.add_user("u1");

        let task = create_task(&state, Some(&ann), form("Paint", &[&u1])).await.unwrap();
        let mut edit = form("Paint twice", &[&u1]);
        edit.completed = true;
        let updated = update_task(&state, Some(&ann), task.id, edit).await.unwrap();

        assert_eq!(mailer.sent().len(), 1);
        assert!(updated.completed);
        assert_eq!(updated.created, task.created);
        assert!(updated.updated > task.updated);
    }

    #[tokio::test]
    async fn non_author_is_forbidden_and_nothing_changes() {
        let (state, _dir, _mailer) = recording();
        let ann = state.add_user("ann");
        let bob = state.add_user("bob");

        let task = create_task(&state, Some(&ann), form("Mine", &[&bob])).await.unwrap();

        let update = update_task(&state, Some(&bob), task.id, form("Yours now", &[])).await;
        assert!(matches!(update, Err(AppError::Forbidden(_))));
        let delete = delete_task(&state, Some(&bob), task.id);
        assert!(matches!(delete, Err(AppError::Forbidden(_))));
        assert!(matches!(
            get_own_task(&state, Some(&bob), task.id),
            Err(AppError::Forbidden(_))
        ));

        let stored = get_task(&state, Some(&bob), task.id).unwrap();
        assert_eq!(stored, task);
    }

    #[tokio::test]
    async fn missing_task_is_not_found() {
        let (state, _dir, _mailer) = recording();
        let ann = state.add_user("ann");

        assert!(matches!(get_task(&state, Some(&ann), 404), Err(AppError::NotFound(_))));
        assert!(matches!(
            update_task(&state, Some(&ann), 404, form("x", &[])).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(delete_task(&state, Some(&ann), 404), Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn invalid_forms_are_rejected_before_saving() {
        let (state, _dir, _mailer) = recording();
        let ann = state.add_user("ann");

        let blank = create_task(&state, Some(&ann), form("   ", &[])).await;
        assert!(matches!(blank, Err(AppError::Validation(_))));

        let mut unknown = form("Ghost helper", &[]);
        unknown.responsible.insert(Uuid::new_v4());
        let unknown = create_task(&state, Some(&ann), unknown).await;
        assert!(matches!(unknown, Err(AppError::Validation(_))));

        assert!(list_tasks(&state, Some(&ann)).unwrap().is_empty());
    }

    #[tokio::test]
    async fn large_upload_is_shrunk_after_save() {
        let (state, _dir, _mailer) = recording();
        let ann = state.add_user("ann");

        let mut with_image = form("Photo", &[]);
        with_image.image = ImageInput::Upload {
            filename: "big.png".into(),
            bytes: png_bytes(1200, 600),
        };
        let task = create_task(&state, Some(&ann), with_image).await.unwrap();

        let name = task.image.unwrap();
        let (w, h) = image::image_dimensions(state.media.path_of(&name)).unwrap();
        assert_eq!((w, h), (500, 250));
    }

    #[tokio::test]
    async fn missing_image_file_does_not_fail_the_save() {
        let (state, _dir, _mailer) = recording();
        let ann = state.add_user("ann");

        let mut with_image = form("Photo", &[]);
        with_image.image = ImageInput::Upload {
            filename: "small.png".into(),
            bytes: png_bytes(10, 10),
        };
        let task = create_task(&state, Some(&ann), with_image).await.unwrap();
        fs::remove_file(state.media.path_of(task.image.as_deref().unwrap())).unwrap();

        let updated = update_task(&state, Some(&ann), task.id, form("Photo, renamed", &[]))
            .await
            .unwrap();
        assert_eq!(updated.title, "Photo, renamed");
        assert_eq!(updated.image, task.image);
    }

    #[tokio::test]
    async fn failed_mail_does_not_fail_the_save() {
        let (state, _dir) = test_state_with_mailer(Arc::new(FailingMailer));
        let ann = state.add_user("ann");
        let u1 = state.add_user("u1");

        let task = create_task(&state, Some(&ann), form("Still saved", &[&u1]))
            .await
            .unwrap();
        assert_eq!(get_task(&state, Some(&ann), task.id).unwrap().title, "Still saved");
    }

    #[tokio::test]
    async fn replacing_and_clearing_the_image_removes_old_files() {
        let (state, _dir, _mailer) = recording();
        let ann = state.add_user("ann");

        let mut first = form("Photo", &[]);
        first.image = ImageInput::Upload {
            filename: "a.png".into(),
            bytes: png_bytes(8, 8),
        };
        let task = create_task(&state, Some(&ann), first).await.unwrap();
        let old_name = task.image.clone().unwrap();

        let mut second = form("Photo", &[]);
        second.image = ImageInput::Upload {
            filename: "b.png".into(),
            bytes: png_bytes(8, 8),
        };
        let task = update_task(&state, Some(&ann), task.id, second).await.unwrap();
        let new_name = task.image.clone().unwrap();
        assert!(!state.media.path_of(&old_name).exists());
        assert!(state.media.path_of(&new_name).exists());

        let mut cleared = form("Photo", &[]);
        cleared.image = ImageInput::Clear;
        let task = update_task(&state, Some(&ann), task.id, cleared).await.unwrap();
        assert_eq!(task.image, None);
        assert!(!state.media.path_of(&new_name).exists());
    }

    #[tokio::test]
    async fn delete_removes_task_and_image() {
        let (state, _dir, _mailer) = recording();
        let ann = state.add_user("ann");

        let mut with_image = form("Doomed", &[]);
        with_image.image = ImageInput::Upload {
            filename: "doomed.png".into(),
            bytes: png_bytes(16, 16),
        };
        let task = create_task(&state, Some(&ann), with_image).await.unwrap();
        let image = task.image.clone().unwrap();

        delete_task(&state, Some(&ann), task.id).unwrap();

        assert!(list_tasks(&state, Some(&ann)).unwrap().is_empty());
        assert!(!state.media.path_of(&image).exists());
        assert!(matches!(get_task(&state, Some(&ann), task.id), Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn listing_puts_completed_tasks_last() {
        let (state, _dir, _mailer) = recording();
        let ann = state.add_user("ann");

        let mut done = form("done", &[]);
        done.completed = true;
        create_task(&state, Some(&ann), done).await.unwrap();
        create_task(&state, Some(&ann), form("open 1", &[])).await.unwrap();
        create_task(&state, Some(&ann), form("open 2", &[])).await.unwrap();

        let titles: Vec<String> = list_tasks(&state, Some(&ann))
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["open 1", "open 2", "done"]);
    }
}
