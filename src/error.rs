use std::path::PathBuf;

use crate::llm::FileState;

/// Errors raised while talking to the generative service or preparing a turn.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("missing API credential: set the {0} environment variable")]
    MissingApiKey(&'static str),

    #[error("failed to read attachment {}: {source}", path.display())]
    AttachmentIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upload was not accepted: {0}")]
    UploadRejected(String),

    #[error("file processing ended in state {state}")]
    FileProcessing { state: FileState },

    #[error("file {name} was still processing after {attempts} status checks")]
    PollTimeout { name: String, attempts: u32 },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("the model returned no text")]
    EmptyResponse,

    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

pub type ChatResult<T> = std::result::Result<T, ChatError>;
