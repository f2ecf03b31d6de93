use std::{env, fs, path::PathBuf};

use serde::Deserialize;
use thiserror::Error;

const SETTINGS_FILENAME: &str = "settings.json";
const SETTINGS_ENV: &str = "TASKTRACK_SETTINGS";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot parse settings file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_binding")]
    pub tcp_socket_binding: String,
    #[serde(default = "default_port")]
    pub tcp_socket_port: u16,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,
    #[serde(default = "default_media_url")]
    pub media_url: String,
    #[serde(default = "default_site_url")]
    pub site_url: String,
    pub session_secret: String,
    #[serde(default = "default_session_expiration")]
    pub session_expiration_in_minutes: i64,
    #[serde(default = "default_admin_username")]
    pub default_admin_username: String,
    #[serde(default)]
    pub default_admin_email: String,
    #[serde(default = "default_admin_password")]
    pub default_admin_password: String,
    #[serde(default)]
    pub mail: MailSettings,
}

/// Outgoing mail. With no `smtp_host` messages are only logged.
#[derive(Debug, Clone, Deserialize)]
pub struct MailSettings {
    #[serde(default = "default_mail_from")]
    pub from: String,
    #[serde(default = "default_mail_subject")]
    pub subject: String,
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            from: default_mail_from(),
            subject: default_mail_subject(),
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
        }
    }
}

impl Settings {
    /// Load from `$TASKTRACK_SETTINGS`, or `settings.json` in the working directory.
    pub fn load() -> Result<Settings, SettingsError> {
        let path = env::var(SETTINGS_ENV).unwrap_or_else(|_| SETTINGS_FILENAME.to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Result<Settings, SettingsError> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.tcp_socket_binding, self.tcp_socket_port)
    }

    /// Public URL of a stored media file, e.g. `/media/user_files/cat.png`.
    pub fn media_href(&self, name: &str) -> String {
        format!("{}/{}", self.media_url.trim_end_matches('/'), name)
    }
}

fn default_binding() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_database_path() -> String {
    "tasktrack.redb".to_string()
}

fn default_media_root() -> PathBuf {
    PathBuf::from("media")
}

fn default_media_url() -> String {
    "/media/".to_string()
}

fn default_site_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_session_expiration() -> i64 {
    24 * 60
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_admin_password() -> String {
    "admin".to_string()
}

fn default_mail_from() -> String {
    "tasks@localhost".to_string()
}

fn default_mail_subject() -> String {
    "A task has been assigned to you".to_string()
}

fn default_smtp_port() -> u16 {
    587
}
