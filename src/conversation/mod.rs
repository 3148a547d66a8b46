//! Conversation turn handling shared by the HTTP and terminal front-ends

pub mod commands;
pub mod composer;
pub mod history;
pub mod manager;

pub use commands::{get_help_text, parse_slash_command, SlashCommand};
pub use history::TranscriptEntry;
pub use manager::{ChatController, ChatSettings, ChatState};
