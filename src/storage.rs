use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Holds files received over HTTP until they are uploaded to the model service
#[derive(Debug, Clone)]
pub struct StorageManager {
    uploads_dir: PathBuf,
}

impl StorageManager {
    pub fn new(uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            uploads_dir: uploads_dir.into(),
        }
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.uploads_dir).context("Failed to create uploads directory")?;
        Ok(())
    }

    fn conversation_dir(&self, conversation: Uuid) -> PathBuf {
        self.uploads_dir.join(conversation.to_string())
    }

    /// Write an uploaded file under the conversation's directory and return its path.
    ///
    /// The stored name keeps the original extension so the media type can still be guessed.
    pub async fn stage_upload(&self, conversation: Uuid, original_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let dir = self.conversation_dir(conversation);
        tokio::fs::create_dir_all(&dir)
            .await
            .context("Failed to create conversation upload directory")?;

        let path = dir.join(format!("{}-{}", Uuid::new_v4().simple(), sanitize_file_name(original_name)));
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write staged upload {}", path.display()))?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "staged upload");
        Ok(path)
    }

    /// Delete one staged file once its attachment has been consumed or dropped.
    ///
    /// Paths outside the uploads directory are left alone.
    pub async fn remove_staged(&self, path: &Path) -> Result<()> {
        if !path.starts_with(self.uploads_dir()) {
            return Ok(());
        }

        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed staged upload");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove staged upload {}", path.display())),
        }
    }

    /// Delete every staged file of a conversation
    pub async fn remove_conversation(&self, conversation: Uuid) -> Result<()> {
        let dir = self.conversation_dir(conversation);
        if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&dir)
                .await
                .context("Failed to remove conversation uploads")?;
        }
        Ok(())
    }
}

/// Keep only the final path component and replace characters that are awkward on disk.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\cat.png"), "cat.png");
        assert_eq!(sanitize_file_name("a:b?.txt"), "a_b_.txt");
        assert_eq!(sanitize_file_name(".."), "upload");
        assert_eq!(sanitize_file_name(""), "upload");
        assert_eq!(sanitize_file_name("ảnh đẹp.jpg"), "ảnh đẹp.jpg");
    }

    #[tokio::test]
    async fn staged_files_keep_extension_and_are_removed_with_conversation() {
        let tmp = TempDir::new().unwrap();
        let storage = StorageManager::new(tmp.path().join("uploads"));
        storage.ensure_directories().unwrap();
        let conversation = Uuid::new_v4();

        let path = storage.stage_upload(conversation, "photo.png", b"png-bytes").await.unwrap();
        assert!(path.starts_with(storage.uploads_dir()));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
        assert_eq!(std::fs::read(&path).unwrap(), b"png-bytes");

        storage.remove_conversation(conversation).await.unwrap();
        assert!(!path.exists());
        storage.remove_conversation(conversation).await.unwrap();
    }

    #[tokio::test]
    async fn remove_staged_only_touches_the_uploads_dir() {
        let tmp = TempDir::new().unwrap();
        let storage = StorageManager::new(tmp.path().join("uploads"));
        storage.ensure_directories().unwrap();

        let staged = storage.stage_upload(Uuid::new_v4(), "a.txt", b"a").await.unwrap();
        storage.remove_staged(&staged).await.unwrap();
        assert!(!staged.exists());
        storage.remove_staged(&staged).await.unwrap();

        let outside = tmp.path().join("keep.txt");
        std::fs::write(&outside, b"mine").unwrap();
        storage.remove_staged(&outside).await.unwrap();
        assert!(outside.exists());
    }
}
