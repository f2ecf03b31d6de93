use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{task_form::TaskForm, user::User};

/// Sequential id assigned by the data context on insert.
pub type TaskId = u64;

pub const TITLE_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    /// Cleared (not cascaded) when the author account is deleted.
    pub author: Option<Uuid>,
    pub responsible: BTreeSet<Uuid>,
    /// Path relative to the media root, e.g. `user_files/cat.png`.
    pub image: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub completed: bool,
}

impl Task {
    /// A not-yet-persisted task authored by `author`. The id is assigned by
    /// `DataContext::insert_task`.
    pub fn new(form: &TaskForm, author: &User, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            title: form.title.trim().to_string(),
            description: form.description.clone(),
            author: Some(author.id),
            responsible: form.responsible.clone(),
            image: None,
            created: now,
            updated: now,
            completed: form.completed,
        }
    }

    /// Re-apply the editable fields. The image is handled separately since it
    /// involves the media store.
    pub fn apply(&mut self, form: &TaskForm, editor: &User) {
        self.title = form.title.trim().to_string();
        self.description = form.description.clone();
        self.responsible = form.responsible.clone();
        self.completed = form.completed;
        self.author = Some(editor.id);
    }

    pub fn is_authored_by(&self, user: &User) -> bool {
        self.author == Some(user.id)
    }
}

/// Default listing order: open tasks first, then by id.
pub fn sort_for_listing(tasks: &mut [Task]) {
    tasks.sort_by_key(|t| (t.completed, t.id));
}
