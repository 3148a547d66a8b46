use std::sync::Arc;

use crate::attachment::{AttachmentUploader, PendingAttachment, PollPolicy};
use crate::config::Config;
use crate::conversation::composer::{compose_turn, ReadyAttachment};
use crate::conversation::history::ConversationHistory;
use crate::error::ChatResult;
use crate::events::{ChatEvent, ConversationMode, TurnOutcome};
use crate::llm::{Content, GenerativeBackend, Part};
use crate::prompts;
use crate::session::SessionManager;

/// Behaviour switches for the turn handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatSettings {
    pub mode: ConversationMode,
    pub poll: PollPolicy,
    /// Keep the pending attachment after an upload or processing failure so it can be retried
    pub retain_attachment_on_error: bool,
}

impl ChatSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: config.mode,
            poll: PollPolicy::from(&config.upload),
            retain_attachment_on_error: config.upload.retain_attachment_on_error,
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Per-UI conversation state: session handle, pending attachment and transcript
#[derive(Debug, Default)]
pub struct ChatState {
    pub sessions: SessionManager,
    pub pending: Option<PendingAttachment>,
    pub history: ConversationHistory,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Runs UI actions against a conversation state.
///
/// Every failure during a turn ends up as a transcript entry; nothing here returns an error.
#[derive(Clone)]
pub struct ChatController {
    backend: Arc<dyn GenerativeBackend>,
    uploader: AttachmentUploader,
    settings: ChatSettings,
}

impl ChatController {
    pub fn new(backend: Arc<dyn GenerativeBackend>, settings: ChatSettings) -> Self {
        let uploader = AttachmentUploader::new(backend.clone(), settings.poll);
        Self {
            backend,
            uploader,
            settings,
        }
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub async fn dispatch(&self, state: &mut ChatState, event: ChatEvent) -> TurnOutcome {
        match event {
            ChatEvent::AttachFile { path, name } => self.attach(state, PendingAttachment::new(path, name)),
            ChatEvent::Submit { text } => self.submit(state, &text).await,
            ChatEvent::Reset => self.reset(state),
        }
    }

    /// Hold a picked file for the next submit, replacing any earlier one.
    pub fn attach(&self, state: &mut ChatState, attachment: PendingAttachment) -> TurnOutcome {
        tracing::debug!(file = %attachment.name, category = %attachment.category(), "attachment pending");
        state.history.add_notice(prompts::attachment_notice(&attachment.name));
        state.pending = Some(attachment);
        TurnOutcome::Attached
    }

    /// Run one turn: upload the pending file if any, send the composed parts, record the reply.
    pub async fn submit(&self, state: &mut ChatState, text: &str) -> TurnOutcome {
        let text = text.trim();
        if text.is_empty() && state.pending.is_none() {
            state.history.add_notice(prompts::EMPTY_TURN_NOTICE);
            return TurnOutcome::Rejected;
        }

        let display_text = match &state.pending {
            Some(attachment) if text.is_empty() => prompts::attachment_placeholder(&attachment.name),
            _ => text.to_string(),
        };

        let uploaded = match state.pending.clone() {
            Some(attachment) => match self.uploader.upload(&attachment).await {
                Ok(file) => Some((file, attachment.category())),
                Err(err) => {
                    tracing::warn!(file = %attachment.name, error = %err, "attachment failed, turn aborted");
                    state.history.add_exchange(display_text, prompts::upload_error(&err));
                    if !self.settings.retain_attachment_on_error {
                        state.pending = None;
                    }
                    return TurnOutcome::UploadFailed;
                }
            },
            None => None,
        };

        let ready = uploaded
            .as_ref()
            .map(|(file, category)| ReadyAttachment {
                file,
                category: *category,
            });
        let parts = match compose_turn(text, ready) {
            Ok(parts) => parts,
            Err(_) => {
                state.history.add_notice(prompts::EMPTY_TURN_NOTICE);
                return TurnOutcome::Rejected;
            }
        };

        let outcome = match self.send(state, parts).await {
            Ok(reply) => {
                state.history.add_exchange(display_text, reply);
                TurnOutcome::Replied
            }
            Err(err) => {
                tracing::warn!(error = %err, "send failed");
                state.history.add_exchange(display_text, prompts::send_error(&err));
                TurnOutcome::SendFailed
            }
        };

        state.pending = None;
        outcome
    }

    /// Forget the session, the pending file and the transcript.
    pub fn reset(&self, state: &mut ChatState) -> TurnOutcome {
        state.sessions.reset();
        state.pending = None;
        state.history.clear();
        tracing::info!("conversation reset");
        TurnOutcome::Cleared
    }

    async fn send(&self, state: &mut ChatState, parts: Vec<Part>) -> ChatResult<String> {
        match self.settings.mode {
            ConversationMode::MultiTurn => {
                let session = state.sessions.ensure_active();
                session.send(self.backend.as_ref(), parts).await
            }
            ConversationMode::SingleTurn => self.backend.generate_content(&[Content::user(parts)]).await,
        }
    }
}
