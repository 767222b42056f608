use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid file name: {0}")]
    InvalidName(String),
}

/// Directory (relative to the storage root) holding uploaded audio.
pub const SONGS_DIR: &str = "songs";
/// Directory (relative to the storage root) holding extracted cover art.
pub const COVERS_DIR: &str = "covers";

/// Trait defining operations all storage backends must implement.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store an uploaded audio file; returns its storage-relative path.
    async fn store_file(
        &self,
        user_id: Uuid,
        filename: &str,
        data: &[u8],
    ) -> Result<String, StorageError>;

    /// Store cover art; returns the bare cover filename.
    async fn store_cover(&self, data: &[u8], extension: &str) -> Result<String, StorageError>;

    fn full_path(&self, relative_path: &str) -> PathBuf;

    /// Absolute path of a cover filename. Rejects anything that is not a plain name.
    fn cover_path(&self, filename: &str) -> Result<PathBuf, StorageError> {
        if !is_plain_filename(filename) {
            return Err(StorageError::InvalidName(filename.to_string()));
        }
        Ok(self.full_path(&format!("{COVERS_DIR}/{filename}")))
    }

    /// Remove a stored file; a file that is already gone is not an error.
    async fn delete_file(&self, relative_path: &str) -> Result<(), StorageError>;
}

// ─── Local Filesystem Backend ──────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AudioStorage {
    base_path: PathBuf,
}

impl AudioStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn from_env() -> Self {
        let base = std::env::var("AUDIO_STORAGE_PATH").unwrap_or_else(|_| "./uploads".to_string());
        Self::new(base)
    }

    pub fn base(&self) -> &Path {
        &self.base_path
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.base_path)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string()
    }
}

#[async_trait]
impl StorageBackend for AudioStorage {
    async fn store_file(
        &self,
        user_id: Uuid,
        filename: &str,
        data: &[u8],
    ) -> Result<String, StorageError> {
        let sanitized_file = sanitize_filename(filename);
        if sanitized_file.is_empty() {
            return Err(StorageError::InvalidName(filename.to_string()));
        }

        let dir = self.base_path.join(SONGS_DIR).join(user_id.to_string());
        fs::create_dir_all(&dir).await?;

        let file_path = dir.join(&sanitized_file);

        let final_path = if fs::try_exists(&file_path).await.unwrap_or(false) {
            let stem = Path::new(&sanitized_file)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("audio");
            let ext = Path::new(&sanitized_file)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("bin");
            dir.join(format!("{}_{}.{}", stem, Uuid::new_v4(), ext))
        } else {
            file_path
        };

        fs::write(&final_path, data).await?;
        tracing::debug!(path = %final_path.display(), bytes = data.len(), "stored audio file");

        Ok(self.relative(&final_path))
    }

    async fn store_cover(&self, data: &[u8], extension: &str) -> Result<String, StorageError> {
        let dir = self.base_path.join(COVERS_DIR);
        fs::create_dir_all(&dir).await?;

        let ext = sanitize_filename(extension);
        let filename = format!("{}-cover.{}", Uuid::new_v4(), ext);
        fs::write(dir.join(&filename), data).await?;

        Ok(filename)
    }

    fn full_path(&self, relative_path: &str) -> PathBuf {
        self.base_path.join(relative_path)
    }

    async fn delete_file(&self, relative_path: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.full_path(relative_path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ─── Helpers ───────────────────────────────────────────────────────

pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string();
    // SECURITY: reject path traversal sequences
    if sanitized.contains("..") {
        return sanitized.replace("..", "__");
    }
    sanitized
}

/// True for a single path component without traversal or hidden-file tricks.
pub fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && !name.contains("..")
}
