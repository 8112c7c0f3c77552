use crate::helpers::client::SourceMessage;

/// Displayable snapshot derived from a source message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub text: Option<String>,
    pub image_url: Option<String>,
}

/// Derive what the aggregate post should display.
///
/// Bot authors usually carry their payload in an embed, so those are
/// preferred: embed description first, then embed image, then the raw
/// content/first attachment. Embeds on human messages are link previews
/// more often than payload, so humans contribute raw content and first
/// attachment only.
///
/// None means nothing displayable could be derived; the message is then
/// ineligible for every config regardless of reactions.
pub fn extract(message: &SourceMessage) -> Option<ExtractedContent> {
    let (text, image_url) = if message.author_is_bot {
        if message.embed_description.is_some() {
            (
                message.embed_description.clone(),
                message
                    .embed_image_url
                    .clone()
                    .or_else(|| message.attachment_url.clone()),
            )
        } else if message.embed_image_url.is_some() {
            (None, message.embed_image_url.clone())
        } else {
            (non_empty(&message.content), message.attachment_url.clone())
        }
    } else {
        (non_empty(&message.content), message.attachment_url.clone())
    };

    if text.is_none() && image_url.is_none() {
        return None;
    }
    Some(ExtractedContent { text, image_url })
}

fn non_empty(content: &str) -> Option<String> {
    let trimmed = content.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
