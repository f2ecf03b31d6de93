use serde::Deserialize;

use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password1: String,
    pub password2: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.username.trim().is_empty() {
            return Err(AppError::Validation("username is required".to_string()));
        }
        if self.email.trim().parse::<lettre::Address>().is_err() {
            return Err(AppError::Validation("enter a valid email address".to_string()));
        }
        if self.password1.is_empty() {
            return Err(AppError::Validation("password is required".to_string()));
        }
        if self.password1 != self.password2 {
            return Err(AppError::Validation(
                "the two password fields didn't match".to_string(),
            ));
        }
        Ok(())
    }
}
