use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    settings::Settings,
    task::{Task, TaskId},
};

/// Flat JSON record of a task: every persisted column, relations as ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub author: Option<Uuid>,
    pub responsible: Vec<Uuid>,
    pub image: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub completed: bool,
}

impl TaskResponse {
    pub fn new(task: &Task, settings: &Settings) -> Self {
        Self {
            id: task.id,
            title: task.title.clone(),
            description: task.description.clone(),
            author: task.author,
            responsible: task.responsible.iter().copied().collect(),
            image: task.image.as_deref().map(|name| settings.media_href(name)),
            created: task.created,
            updated: task.updated,
            completed: task.completed,
        }
    }
}
