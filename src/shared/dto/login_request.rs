use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// Where to go after a successful login. Only local paths are honoured.
    #[serde(default)]
    pub next: Option<String>,
}
