use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Actions arriving from the UI boundary (browser or terminal)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A file was picked; hold it until the next submit
    AttachFile { path: PathBuf, name: String },

    /// The send button was pressed or the text box submitted
    Submit { text: String },

    /// Start over with an empty conversation
    Reset,
}

/// How turns reach the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversationMode {
    /// Turns share a session that carries the earlier exchange
    #[default]
    MultiTurn,
    /// Every turn is an independent one-shot generation
    SingleTurn,
}

impl ConversationMode {
    pub fn display_name(&self) -> &'static str {
        match self {
            ConversationMode::MultiTurn => "multi-turn",
            ConversationMode::SingleTurn => "single-turn",
        }
    }
}

/// What happened to a submitted turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// The model replied
    Replied,
    /// Neither text nor attachment was supplied
    Rejected,
    /// The attachment could not be uploaded or never became ready
    UploadFailed,
    /// The message itself could not be sent
    SendFailed,
    /// A file was attached (no turn was run)
    Attached,
    /// The conversation was reset
    Cleared,
}

impl TurnOutcome {
    /// The turn ended with an entry describing what went wrong
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            TurnOutcome::Rejected | TurnOutcome::UploadFailed | TurnOutcome::SendFailed
        )
    }
}
