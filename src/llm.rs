use crate::config::Config;
use crate::error::{ChatError, ChatResult};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::time::Duration;

const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// Processing state of an uploaded file, as reported by the Files API.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    Processing,
    Active,
    Failed,
    /// Also covers states this client does not know about
    #[default]
    #[serde(other)]
    StateUnspecified,
}

/// Remote file reference returned by the Files API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub state: FileState,
}

/// One turn of the conversation as sent on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: "user".to_string(),
            parts,
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: "model".to_string(),
            parts: vec![Part::text(text)],
        }
    }
}

/// A single unit of a multimodal message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    FileData {
        #[serde(rename = "fileData")]
        file_data: FileDataPayload,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDataPayload {
    pub mime_type: String,
    pub file_uri: String,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn file(file: &RemoteFile) -> Self {
        Part::FileData {
            file_data: FileDataPayload {
                mime_type: file.mime_type.clone(),
                file_uri: file.uri.clone(),
            },
        }
    }
}

#[cfg(test)]
impl Part {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            Part::FileData { .. } => None,
        }
    }
}

/// Operations the chat front-end needs from the generative service.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Upload a local file and return the remote reference in whatever state the service reports.
    async fn upload_file(&self, path: &Path, display_name: &str, mime_type: &str) -> ChatResult<RemoteFile>;

    /// Fetch the current metadata (including state) of an uploaded file.
    async fn get_file(&self, name: &str) -> ChatResult<RemoteFile>;

    /// Run one generation over the given contents and return the reply text.
    async fn generate_content(&self, contents: &[Content]) -> ChatResult<String>;
}

/// HTTP client for the Gemini REST API
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &Config, api_key: String) -> ChatResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/v1beta/{}", self.base_url, path)
    }

    fn upload_start_url(&self) -> String {
        format!("{}/upload/v1beta/files", self.base_url)
    }

    fn generate_url(&self) -> String {
        self.api_url(&format!("models/{}:generateContent", self.model))
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn upload_file(&self, path: &Path, display_name: &str, mime_type: &str) -> ChatResult<RemoteFile> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ChatError::AttachmentIo {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::debug!(file = display_name, bytes = bytes.len(), mime_type, "starting resumable upload");

        let response = self
            .client
            .post(self.upload_start_url())
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&serde_json::json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let upload_url = session_upload_url(response.headers())?;

        let response = self
            .client
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let envelope: UploadResponse = response
            .json()
            .await
            .map_err(|e| ChatError::InvalidResponse(format!("upload response: {}", e)))?;
        Ok(envelope.file)
    }

    async fn get_file(&self, name: &str) -> ChatResult<RemoteFile> {
        let response = self
            .client
            .get(self.api_url(name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        response
            .json()
            .await
            .map_err(|e| ChatError::InvalidResponse(format!("file metadata: {}", e)))
    }

    async fn generate_content(&self, contents: &[Content]) -> ChatResult<String> {
        let response = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&GenerateContentRequest { contents })
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ChatError::InvalidResponse(format!("generateContent: {}", e)))?;

        extract_text(parsed)
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
}

#[derive(Deserialize)]
struct UploadResponse {
    file: RemoteFile,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// The resumable protocol hands out the byte destination in a response header.
fn session_upload_url(headers: &HeaderMap) -> ChatResult<String> {
    headers
        .get(UPLOAD_URL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ChatError::UploadRejected("no upload URL in the start response".to_string()))
}

async fn ensure_success(response: reqwest::Response) -> ChatResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(map_api_error(status, &body))
}

fn map_api_error(status: u16, body: &str) -> ChatError {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let msg = wrapper.error.message.unwrap_or_else(|| body.to_string());
            match wrapper.error.status {
                Some(status_text) if !status_text.is_empty() => format!("{}: {}", status_text, msg),
                _ => msg,
            }
        })
        .unwrap_or_else(|_| body.to_string());

    ChatError::Api { status, message }
}

fn extract_text(response: GenerateContentResponse) -> ChatResult<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
        .unwrap_or_default();

    if !text.is_empty() {
        return Ok(text);
    }

    match response.prompt_feedback.and_then(|feedback| feedback.block_reason) {
        Some(reason) => Err(ChatError::InvalidResponse(format!("prompt blocked: {}", reason))),
        None => Err(ChatError::EmptyResponse),
    }
}
