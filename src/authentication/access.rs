//! Authorization decisions. Pure: no lookups, no side effects.

use crate::{task::Task, user::User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    Unauthenticated,
    NotAuthor,
}

/// Every task page needs a logged-in user.
pub fn require_login(user: Option<&User>) -> Result<&User, AccessDenied> {
    user.ok_or(AccessDenied::Unauthenticated)
}

/// Update and delete are reserved for the task's author.
pub fn require_author<'a>(user: Option<&'a User>, task: &Task) -> Result<&'a User, AccessDenied> {
    let user = require_login(user)?;
    if task.is_authored_by(user) {
        Ok(user)
    } else {
        Err(AccessDenied::NotAuthor)
    }
}
