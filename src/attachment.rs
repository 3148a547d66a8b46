//! Attachment upload and readiness polling.
//!
//! A file picked by the user is uploaded to the Files API and may then spend some time in the
//! `PROCESSING` state. It can only be referenced in a message once the service reports `ACTIVE`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::UploadConfig;
use crate::error::{ChatError, ChatResult};
use crate::llm::{FileState, GenerativeBackend, RemoteFile};

/// Coarse media kind, used to pick a fallback instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaCategory {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaCategory {
    /// Guess the category from the file extension alone.
    pub fn from_path(path: &Path) -> Self {
        match mime_guess::from_path(path).first() {
            Some(mime) => match mime.type_().as_str() {
                "image" => MediaCategory::Image,
                "video" => MediaCategory::Video,
                "audio" => MediaCategory::Audio,
                _ => MediaCategory::Document,
            },
            None => MediaCategory::Document,
        }
    }
}

/// A file the user selected, waiting for the next send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAttachment {
    pub path: PathBuf,
    /// Original file name as picked by the user
    pub name: String,
}

impl PendingAttachment {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }

    /// Attachment named after the last component of its path
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }

    pub fn category(&self) -> MediaCategory {
        MediaCategory::from_path(Path::new(&self.name))
    }

    pub fn mime_type(&self) -> String {
        mime_guess::from_path(&self.name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}

/// How long to wait for a freshly uploaded file to become usable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Status observations allowed, including the one returned by the upload
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy::from(&UploadConfig::default())
    }
}

impl From<&UploadConfig> for PollPolicy {
    fn from(config: &UploadConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.max_poll_attempts.max(1),
        }
    }
}

/// Uploads attachments and waits for the remote service to finish processing them
#[derive(Clone)]
pub struct AttachmentUploader {
    backend: Arc<dyn GenerativeBackend>,
    policy: PollPolicy,
}

impl AttachmentUploader {
    pub fn new(backend: Arc<dyn GenerativeBackend>, policy: PollPolicy) -> Self {
        Self { backend, policy }
    }

    /// Upload the attachment and return its reference once it is `ACTIVE`.
    pub async fn upload(&self, attachment: &PendingAttachment) -> ChatResult<RemoteFile> {
        let mime_type = attachment.mime_type();
        tracing::info!(file = %attachment.name, %mime_type, "uploading attachment");

        let file = self
            .backend
            .upload_file(&attachment.path, &attachment.name, &mime_type)
            .await?;

        self.wait_until_ready(file).await
    }

    /// Poll the file status at a fixed interval while it is `PROCESSING`.
    ///
    /// Any other state than `ACTIVE` ends the wait with [`ChatError::FileProcessing`]; running
    /// out of attempts ends it with [`ChatError::PollTimeout`].
    pub async fn wait_until_ready(&self, mut file: RemoteFile) -> ChatResult<RemoteFile> {
        let mut checks: u32 = 1;

        loop {
            match file.state {
                FileState::Active => {
                    tracing::info!(file = %file.name, checks, "attachment is active");
                    return Ok(file);
                }
                FileState::Processing => {
                    if checks >= self.policy.max_attempts {
                        tracing::warn!(file = %file.name, checks, "gave up waiting for attachment");
                        return Err(ChatError::PollTimeout {
                            name: file.name,
                            attempts: checks,
                        });
                    }

                    tracing::debug!(file = %file.name, checks, "attachment still processing");
                    tokio::time::sleep(self.policy.interval).await;
                    file = self.backend.get_file(&file.name).await?;
                    checks += 1;
                }
                state => {
                    tracing::warn!(file = %file.name, %state, "attachment processing failed");
                    return Err(ChatError::FileProcessing { state });
                }
            }
        }
    }
}
