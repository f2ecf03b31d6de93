//! Uploaded task images: storage under the media root and the post-save
//! shrink to fit 500×500.

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use image::ImageReader;
use thiserror::Error;
use uuid::Uuid;

pub const UPLOAD_DIR: &str = "user_files";
pub const MAX_DIMENSION: u32 = 500;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("upload a valid image")]
    NotAnImage,
    #[error("media io: {0}")]
    Io(#[from] io::Error),
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
    #[error("image worker: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a stored file given its media-relative name.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Store an upload and return its media-relative name
    /// (`user_files/<file>`). Existing files are never overwritten.
    pub fn save_upload(&self, filename: &str, bytes: &[u8]) -> Result<String, MediaError> {
        image::guess_format(bytes).map_err(|_| MediaError::NotAnImage)?;

        let dir = self.root.join(UPLOAD_DIR);
        fs::create_dir_all(&dir)?;

        let clean = sanitize_filename(filename);
        let mut candidate = clean.clone();
        // `create_new` makes the name claim atomic between concurrent uploads.
        let mut file = loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(dir.join(&candidate))
            {
                Ok(file) => break file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    candidate = with_suffix(&clean, &Uuid::new_v4().simple().to_string()[..7]);
                }
                Err(e) => return Err(e.into()),
            }
        };

        if let Err(e) = file.write_all(bytes) {
            drop(file);
            let _ = fs::remove_file(dir.join(&candidate));
            return Err(e.into());
        }
        Ok(format!("{UPLOAD_DIR}/{candidate}"))
    }

    /// Delete a stored file. Already-missing files are fine.
    pub fn remove(&self, name: &str) -> Result<(), MediaError> {
        match fs::remove_file(self.path_of(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Shrink the stored image in place if it is larger than the bounds.
    /// Runs on the blocking pool; the caller still waits for it.
    pub async fn shrink_to_bounds(&self, name: &str) -> Result<bool, MediaError> {
        let path = self.path_of(name);
        tokio::task::spawn_blocking(move || fit_within_bounds(&path)).await?
    }
}

/// Downscale (aspect ratio preserved) so neither side exceeds
/// `MAX_DIMENSION`, overwriting the file in its original format.
/// Returns false and leaves the file untouched when it already fits.
pub fn fit_within_bounds(path: &Path) -> Result<bool, MediaError> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let format = reader.format().ok_or(MediaError::NotAnImage)?;
    let img = reader.decode()?;

    if img.width() <= MAX_DIMENSION && img.height() <= MAX_DIMENSION {
        return Ok(false);
    }

    let thumb = img.thumbnail(MAX_DIMENSION, MAX_DIMENSION);
    thumb.save_with_format(path, format)?;
    Ok(true)
}

/// Keep the final path component and only filesystem-safe characters.
fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let clean: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let clean = clean.trim_start_matches('.').to_string();
    if clean.is_empty() {
        "upload".to_string()
    } else {
        clean
    }
}

fn with_suffix(filename: &str, suffix: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}_{suffix}.{ext}"),
        None => format!("{filename}_{suffix}"),
    }
}
