//! Fixtures shared by the unit and router tests.

use std::{
    io::Cursor,
    path::PathBuf,
    sync::{Arc, Mutex, OnceLock},
};

use image::{ImageFormat, RgbImage};
use tempfile::TempDir;

use crate::{
    app_state::{AppState, SharedState},
    auth::hash_password,
    data_access::data_context::DataContext,
    media_service::MediaStore,
    notification_service::{Email, Mailer, NotifyError},
    settings::Settings,
    user::User,
};

pub const TEST_PASSWORD: &str = "correct horse";

/// Keeps every message it is asked to send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, email: &Email) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// Fails every send, like an unreachable relay.
pub struct FailingMailer;

impl Mailer for FailingMailer {
    fn send(&self, _email: &Email) -> Result<(), NotifyError> {
        Err("not an address".parse::<lettre::Address>().unwrap_err().into())
    }
}

pub fn test_settings(media_root: PathBuf) -> Settings {
    let mut settings: Settings = serde_json::from_value(serde_json::json!({
        "session_secret": "test-secret",
        "site_url": "http://testserver",
        "mail": { "from": "tasks@testserver", "subject": "A task has been assigned to you" }
    }))
    .unwrap();
    settings.media_root = media_root;
    settings
}

pub fn test_state() -> (SharedState, TempDir) {
    test_state_with_mailer(Arc::new(RecordingMailer::default()))
}

pub fn test_state_with_mailer(mailer: Arc<dyn Mailer>) -> (SharedState, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(dir.path().join("media"));
    let data_context =
        DataContext::open(&dir.path().join("test.redb").to_string_lossy()).unwrap();
    let state = Arc::new(AppState {
        data_context,
        media: MediaStore::new(settings.media_root.clone()),
        settings,
        mailer,
    });
    (state, dir)
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, image::Rgb([30, 120, 200]));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

/// argon2 is slow in debug builds; hash the shared test password once.
fn test_password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(TEST_PASSWORD).unwrap()).clone()
}

impl AppState {
    /// Register a user with `TEST_PASSWORD` and `<name>@example.com`.
    pub fn add_user(&self, name: &str) -> User {
        let user = User::new(name, &format!("{name}@example.com"), test_password_hash());
        self.data_context.create_user(&user).unwrap();
        user
    }
}
