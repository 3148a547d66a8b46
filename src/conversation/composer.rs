use crate::attachment::MediaCategory;
use crate::llm::{Part, RemoteFile};
use crate::prompts::fallback_prompt;

/// Returned when a turn has neither text nor an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("a turn needs text or an attachment")]
pub struct EmptyTurn;

/// An uploaded file ready to go into the next message
#[derive(Debug, Clone, Copy)]
pub struct ReadyAttachment<'a> {
    pub file: &'a RemoteFile,
    pub category: MediaCategory,
}

/// Build the ordered parts of one user turn.
///
/// The file reference always comes first. Without user text, a canned instruction for the
/// file's category takes the text slot.
pub fn compose_turn(text: &str, attachment: Option<ReadyAttachment<'_>>) -> Result<Vec<Part>, EmptyTurn> {
    let text = text.trim();
    let mut parts = Vec::with_capacity(2);

    if let Some(attachment) = attachment {
        parts.push(Part::file(attachment.file));
        if text.is_empty() {
            parts.push(Part::text(fallback_prompt(attachment.category)));
            return Ok(parts);
        }
    }

    if text.is_empty() {
        return Err(EmptyTurn);
    }

    parts.push(Part::text(text));
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::FileState;

    fn remote(mime_type: &str) -> RemoteFile {
        RemoteFile {
            name: "files/abc".to_string(),
            display_name: None,
            mime_type: mime_type.to_string(),
            uri: "https://files.test/v1beta/files/abc".to_string(),
            state: FileState::Active,
        }
    }

    #[test]
    fn text_only_turn_is_just_the_text() {
        let parts = compose_turn("  Summarize this  ", None).unwrap();
        assert_eq!(parts, vec![Part::text("Summarize this")]);
    }

    #[test]
    fn file_comes_before_text() {
        let file = remote("video/mp4");
        let parts = compose_turn(
            "What happens at the end?",
            Some(ReadyAttachment {
                file: &file,
                category: MediaCategory::Video,
            }),
        )
        .unwrap();
        assert_eq!(parts, vec![Part::file(&file), Part::text("What happens at the end?")]);
    }

    #[test]
    fn file_without_text_uses_category_fallback() {
        let file = remote("image/png");
        for (category, expected) in [
            (MediaCategory::Image, "Hãy mô tả nội dung trong hình ảnh này."),
            (MediaCategory::Video, "Hãy tóm tắt nội dung của video này."),
            (MediaCategory::Audio, "Hãy nghe và tóm tắt nội dung của đoạn âm thanh này."),
            (MediaCategory::Document, "Hãy tóm tắt nội dung chính của tài liệu này."),
        ] {
            let parts = compose_turn("   ", Some(ReadyAttachment { file: &file, category })).unwrap();
            assert_eq!(parts, vec![Part::file(&file), Part::text(expected)]);
        }
    }

    #[test]
    fn nothing_to_send_is_rejected() {
        assert_eq!(compose_turn("", None), Err(EmptyTurn));
        assert_eq!(compose_turn(" \n\t", None), Err(EmptyTurn));
    }
}
