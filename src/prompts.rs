use crate::attachment::MediaCategory;

/// Instruction sent in place of user text when only a file was supplied.
pub fn fallback_prompt(category: MediaCategory) -> &'static str {
    match category {
        MediaCategory::Image => IMAGE_PROMPT,
        MediaCategory::Video => VIDEO_PROMPT,
        MediaCategory::Audio => AUDIO_PROMPT,
        MediaCategory::Document => DOCUMENT_PROMPT,
    }
}

const IMAGE_PROMPT: &str = "Hãy mô tả nội dung trong hình ảnh này.";
const VIDEO_PROMPT: &str = "Hãy tóm tắt nội dung của video này.";
const AUDIO_PROMPT: &str = "Hãy nghe và tóm tắt nội dung của đoạn âm thanh này.";
const DOCUMENT_PROMPT: &str = "Hãy tóm tắt nội dung chính của tài liệu này.";

/// Shown when a turn carries neither text nor a file.
pub const EMPTY_TURN_NOTICE: &str = "Vui lòng nhập một câu hỏi hoặc tải lên một tệp.";

pub fn attachment_notice(name: &str) -> String {
    format!("📁 Đã tải lên tệp: **{}**. Bây giờ hãy đặt câu hỏi về nó.", name)
}

pub fn attachment_placeholder(name: &str) -> String {
    format!("📎 {}", name)
}

pub fn upload_error(error: &impl std::fmt::Display) -> String {
    format!("Lỗi khi xử lý tệp: {}", error)
}

pub fn send_error(error: &impl std::fmt::Display) -> String {
    format!("Rất tiếc, đã xảy ra lỗi: {}", error)
}
