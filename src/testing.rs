//! Scripted stand-in for the Gemini client used across unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use crate::error::{ChatError, ChatResult};
use crate::llm::{Content, FileState, GenerativeBackend, RemoteFile};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Upload(String),
    GetFile(String),
    Generate,
}

/// Backend that replays scripted file states and replies, recording every call.
#[derive(Default)]
pub struct ScriptedBackend {
    file_states: Mutex<VecDeque<FileState>>,
    upload_error: Mutex<Option<String>>,
    status_error: Mutex<Option<String>>,
    replies: Mutex<VecDeque<ChatResult<String>>>,
    calls: Mutex<Vec<BackendCall>>,
    sent: Mutex<Vec<Vec<Content>>>,
    uploaded: Mutex<Vec<RemoteFile>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// States observed in order: the first comes back from the upload, the rest from status checks.
    /// Once the script runs out every file is `ACTIVE`.
    pub fn with_file_states(self, states: &[FileState]) -> Self {
        self.file_states.lock().unwrap().extend(states.iter().copied());
        self
    }

    pub fn failing_upload(self, message: &str) -> Self {
        *self.upload_error.lock().unwrap() = Some(message.to_string());
        self
    }

    /// Every status check fails with a 503 carrying `message`.
    pub fn failing_status_check(self, message: &str) -> Self {
        *self.status_error.lock().unwrap() = Some(message.to_string());
        self
    }

    /// Replies returned by successive generations; `"ok"` once exhausted.
    pub fn with_replies(self, replies: Vec<ChatResult<String>>) -> Self {
        self.replies.lock().unwrap().extend(replies);
        self
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn status_checks(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, BackendCall::Upload(_) | BackendCall::GetFile(_)))
            .count()
    }

    pub fn generate_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| **call == BackendCall::Generate)
            .count()
    }

    /// Contents passed to each generation call
    pub fn sent(&self) -> Vec<Vec<Content>> {
        self.sent.lock().unwrap().clone()
    }

    fn next_state(&self) -> FileState {
        self.file_states
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(FileState::Active)
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    async fn upload_file(&self, _path: &Path, display_name: &str, mime_type: &str) -> ChatResult<RemoteFile> {
        self.calls
            .lock()
            .unwrap()
            .push(BackendCall::Upload(display_name.to_string()));

        if let Some(message) = self.upload_error.lock().unwrap().clone() {
            return Err(ChatError::UploadRejected(message));
        }

        let mut uploaded = self.uploaded.lock().unwrap();
        let id = uploaded.len() + 1;
        let file = RemoteFile {
            name: format!("files/scripted-{}", id),
            display_name: Some(display_name.to_string()),
            mime_type: mime_type.to_string(),
            uri: format!("https://files.test/v1beta/files/scripted-{}", id),
            state: self.next_state(),
        };
        uploaded.push(file.clone());
        Ok(file)
    }

    async fn get_file(&self, name: &str) -> ChatResult<RemoteFile> {
        self.calls
            .lock()
            .unwrap()
            .push(BackendCall::GetFile(name.to_string()));

        if let Some(message) = self.status_error.lock().unwrap().clone() {
            return Err(ChatError::Api {
                status: 503,
                message,
            });
        }

        let known = self
            .uploaded
            .lock()
            .unwrap()
            .iter()
            .find(|file| file.name == name)
            .cloned();

        match known {
            Some(file) => Ok(RemoteFile {
                state: self.next_state(),
                ..file
            }),
            None => Err(ChatError::Api {
                status: 404,
                message: format!("NOT_FOUND: {}", name),
            }),
        }
    }

    async fn generate_content(&self, contents: &[Content]) -> ChatResult<String> {
        self.calls.lock().unwrap().push(BackendCall::Generate);
        self.sent.lock().unwrap().push(contents.to_vec());

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("ok".to_string()))
    }
}
