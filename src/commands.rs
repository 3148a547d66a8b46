use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::attachment::PendingAttachment;
use crate::conversation::{get_help_text, parse_slash_command, ChatController, ChatState, SlashCommand, TranscriptEntry};
use crate::events::{ChatEvent, TurnOutcome};

/// Interactive chat over any line source, printing transcript entries to `out`.
pub async fn run_chat<R, W>(controller: &ChatController, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut state = ChatState::new();
    let mut lines = input.lines();

    writeln!(out, "💬 gemchat ({})", controller.settings().mode.display_name())?;
    writeln!(out, "Type a message, or /help for commands.")?;
    writeln!(out)?;

    loop {
        write!(out, "> ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await.context("Failed to read user input")? else {
            break;
        };

        let event = match parse_slash_command(&line) {
            Some(parsed) => match parsed.command {
                SlashCommand::Bye => break,
                SlashCommand::Help => {
                    writeln!(out, "{}", get_help_text())?;
                    continue;
                }
                SlashCommand::Reset => ChatEvent::Reset,
                SlashCommand::Attach => match parsed.argument() {
                    Some(path) => attach_event(Path::new(path)),
                    None => {
                        writeln!(out, "Usage: /attach <path>")?;
                        continue;
                    }
                },
            },
            None if line.trim_start().starts_with('/') => {
                let name = line.split_whitespace().next().unwrap_or("/");
                writeln!(out, "❓ Unknown command: {}. Type /help for commands.", name)?;
                continue;
            }
            None => ChatEvent::Submit { text: line },
        };

        if let ChatEvent::AttachFile { path, .. } = &event {
            if !path.is_file() {
                writeln!(out, "❌ Not a file: {}", path.display())?;
                continue;
            }
        }

        let before = state.history.entries().len();
        let outcome = controller.dispatch(&mut state, event).await;
        if outcome == TurnOutcome::Cleared {
            writeln!(out, "🧹 Conversation cleared.")?;
        }
        let entries = state.history.entries();
        for entry in &entries[before.min(entries.len())..] {
            print_entry(out, entry)?;
        }
    }

    writeln!(out, "👋 Bye!")?;
    Ok(())
}

fn attach_event(path: &Path) -> ChatEvent {
    let attachment = PendingAttachment::from_path(path);
    ChatEvent::AttachFile {
        path: attachment.path,
        name: attachment.name,
    }
}

fn print_entry<W: Write>(out: &mut W, entry: &TranscriptEntry) -> Result<()> {
    writeln!(out, "{}", entry.reply)?;
    writeln!(out)?;
    Ok(())
}

/// Run a single turn, optionally with a local file, and return its outcome and display text.
pub async fn ask_once(controller: &ChatController, text: &str, file: Option<&Path>) -> Result<(TurnOutcome, String)> {
    let mut state = ChatState::new();

    if let Some(path) = file {
        if !path.is_file() {
            anyhow::bail!("Not a file: {}", path.display());
        }
        controller.dispatch(&mut state, attach_event(path)).await;
    }

    let outcome = controller
        .dispatch(&mut state, ChatEvent::Submit { text: text.to_string() })
        .await;
    let reply = state
        .history
        .last()
        .map(|entry| entry.reply.clone())
        .unwrap_or_default();

    Ok((outcome, reply))
}
