//! Display transcript of a conversation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One (user turn, model turn) pair as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// `None` for notices that did not come from the user
    pub user: Option<String>,
    pub reply: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only display log, emptied on reset
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    entries: Vec<TranscriptEntry>,
}

impl ConversationHistory {
    /// Record an exchange started by the user
    pub fn add_exchange(&mut self, user: impl Into<String>, reply: impl Into<String>) {
        self.push(Some(user.into()), reply.into());
    }

    /// Record a notice with no user turn
    pub fn add_notice(&mut self, reply: impl Into<String>) {
        self.push(None, reply.into());
    }

    fn push(&mut self, user: Option<String>, reply: String) {
        self.entries.push(TranscriptEntry {
            user,
            reply,
            timestamp: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
