use std::collections::BTreeSet;

use uuid::Uuid;

use crate::{error::AppError, task::TITLE_MAX_CHARS};

/// What the form says about the image field.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ImageInput {
    /// No file uploaded: leave the stored image as it is.
    #[default]
    Keep,
    /// The clear checkbox was ticked.
    Clear,
    Upload { filename: String, bytes: Vec<u8> },
}

/// Editable task fields, shared by create and update.
#[derive(Debug, Clone, Default)]
pub struct TaskForm {
    pub title: String,
    pub description: Option<String>,
    pub responsible: BTreeSet<Uuid>,
    pub completed: bool,
    pub image: ImageInput,
}

impl TaskForm {
    pub fn validate(&self) -> Result<(), AppError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("title is required".to_string()));
        }
        if title.chars().count() > TITLE_MAX_CHARS {
            return Err(AppError::Validation(format!(
                "title must be at most {TITLE_MAX_CHARS} characters"
            )));
        }
        Ok(())
    }

    /// Feed one text field of a submitted form.
    pub fn set_text_field(&mut self, name: &str, value: String) -> Result<(), AppError> {
        match name {
            "title" => self.title = value,
            "description" => {
                self.description = if value.trim().is_empty() { None } else { Some(value) };
            }
            "responsible" => {
                let id = Uuid::parse_str(value.trim()).map_err(|_| {
                    AppError::Validation(format!("{value} is not a valid user id"))
                })?;
                self.responsible.insert(id);
            }
            "completed" => self.completed = is_checked(&value),
            "image-clear" => {
                if is_checked(&value) {
                    if matches!(self.image, ImageInput::Upload { .. }) {
                        return Err(upload_and_clear());
                    }
                    self.image = ImageInput::Clear;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Feed the uploaded image file.
    pub fn set_upload(&mut self, filename: String, bytes: Vec<u8>) -> Result<(), AppError> {
        if self.image == ImageInput::Clear {
            return Err(upload_and_clear());
        }
        self.image = ImageInput::Upload { filename, bytes };
        Ok(())
    }
}

fn upload_and_clear() -> AppError {
    AppError::Validation(
        "please either submit a file or check the clear checkbox, not both".to_string(),
    )
}

fn is_checked(value: &str) -> bool {
    matches!(value.trim(), "on" | "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_required_and_bounded() {
        let mut form = TaskForm::default();
        assert!(form.validate().is_err());

        form.title = "x".repeat(TITLE_MAX_CHARS);
        assert!(form.validate().is_ok());

        form.title = "x".repeat(TITLE_MAX_CHARS + 1);
        assert!(form.validate().is_err());
    }

    #[test]
    fn title_limit_counts_characters_not_bytes() {
        let form = TaskForm {
            title: "ü".repeat(TITLE_MAX_CHARS),
            ..TaskForm::default()
        };
        assert!(form.validate().is_ok());
    }

    #[test]
    fn text_fields_fill_the_form() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut form = TaskForm::default();
        form.set_text_field("title", "Buy milk".into()).unwrap();
        form.set_text_field("description", "   ".into()).unwrap();
        form.set_text_field("responsible", a.to_string()).unwrap();
        form.set_text_field("responsible", b.to_string()).unwrap();
        form.set_text_field("completed", "on".into()).unwrap();
        form.set_text_field("image-clear", "on".into()).unwrap();

        assert_eq!(form.title, "Buy milk");
        assert_eq!(form.description, None);
        assert_eq!(form.responsible, BTreeSet::from([a, b]));
        assert!(form.completed);
        assert_eq!(form.image, ImageInput::Clear);
    }

    #[test]
    fn bad_responsible_id_is_rejected() {
        let mut form = TaskForm::default();
        assert!(form.set_text_field("responsible", "42".into()).is_err());
    }

    #[test]
    fn upload_and_clear_together_are_rejected_in_either_order() {
        let mut form = TaskForm::default();
        form.set_text_field("image-clear", "on".into()).unwrap();
        assert!(matches!(
            form.set_upload("cat.png".into(), vec![1, 2, 3]),
            Err(AppError::Validation(_))
        ));

        let mut form = TaskForm::default();
        form.set_upload("cat.png".into(), vec![1, 2, 3]).unwrap();
        assert!(matches!(
            form.set_text_field("image-clear", "on".into()),
            Err(AppError::Validation(_))
        ));

        let mut form = TaskForm::default();
        form.set_upload("cat.png".into(), vec![1, 2, 3]).unwrap();
        form.set_text_field("image-clear", "".into()).unwrap();
        assert!(matches!(form.image, ImageInput::Upload { .. }));
    }
}
