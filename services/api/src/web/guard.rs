//! services/api/src/web/guard.rs
//!
//! Schema and limit validation over the parsed message list, run after the
//! rate limiter and before any inference call. Any failure rejects the
//! whole request with a specific reason; no partial processing occurs.

use crate::web::protocol::IncomingMessage;
use coffee_analysis_core::domain::{Attachment, ChatMessage, Role};

/// Most messages accepted in one request.
pub const MAX_MESSAGES: usize = 50;

/// Longest message text, in characters.
pub const MAX_CONTENT_CHARS: usize = 10_000;

/// Most attachments on a single message.
pub const MAX_ATTACHMENTS: usize = 5;

/// Longest encoded attachment payload: ~10 MiB original under the ~1.33x
/// base64 expansion.
pub const MAX_ENCODED_ATTACHMENT_BYTES: usize = 15 * 1024 * 1024;

/// Required prefix of every inline attachment payload.
pub const INLINE_IMAGE_PREFIX: &str = "data:image/";

/// A schema or limit violation at the server boundary. Each variant maps
/// to a 400 with a human-readable, machine-distinguishable message.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RequestRejection {
    #[error("Message list must not be empty")]
    EmptyMessageList,

    #[error("Too many messages: {count} (max: {MAX_MESSAGES})")]
    TooManyMessages { count: usize },

    #[error("Invalid role: '{role}'")]
    InvalidRole { role: String },

    #[error("Message content must be a non-empty string")]
    EmptyContent,

    #[error("Message content too long: {chars} characters (max: {MAX_CONTENT_CHARS})")]
    ContentTooLong { chars: usize },

    #[error("Too many attachments: {count} (max: {MAX_ATTACHMENTS})")]
    TooManyAttachments { count: usize },

    #[error("Attachment content type must start with 'image/': '{content_type}'")]
    InvalidAttachmentType { content_type: String },

    #[error("Attachment data must be an inline 'data:image/...' URL")]
    InvalidAttachmentEncoding,

    #[error("Attachment too large: {len} encoded bytes (max: {MAX_ENCODED_ATTACHMENT_BYTES})")]
    AttachmentTooLarge { len: usize },
}

/// Validates the message list and converts it to domain messages.
pub fn validate_messages(
    messages: &[IncomingMessage],
) -> Result<Vec<ChatMessage>, RequestRejection> {
    if messages.is_empty() {
        return Err(RequestRejection::EmptyMessageList);
    }
    if messages.len() > MAX_MESSAGES {
        return Err(RequestRejection::TooManyMessages {
            count: messages.len(),
        });
    }

    let mut validated = Vec::with_capacity(messages.len());
    for message in messages {
        let role = Role::parse(&message.role).ok_or_else(|| RequestRejection::InvalidRole {
            role: message.role.clone(),
        })?;

        if message.content.is_empty() {
            return Err(RequestRejection::EmptyContent);
        }
        let chars = message.content.chars().count();
        if chars > MAX_CONTENT_CHARS {
            return Err(RequestRejection::ContentTooLong { chars });
        }

        if message.attachments.len() > MAX_ATTACHMENTS {
            return Err(RequestRejection::TooManyAttachments {
                count: message.attachments.len(),
            });
        }
        for attachment in &message.attachments {
            if !attachment.content_type.starts_with("image/") {
                return Err(RequestRejection::InvalidAttachmentType {
                    content_type: attachment.content_type.clone(),
                });
            }
            if !attachment.url.starts_with(INLINE_IMAGE_PREFIX) {
                return Err(RequestRejection::InvalidAttachmentEncoding);
            }
            if attachment.url.len() > MAX_ENCODED_ATTACHMENT_BYTES {
                return Err(RequestRejection::AttachmentTooLarge {
                    len: attachment.url.len(),
                });
            }
        }

        validated.push(ChatMessage {
            role,
            content: message.content.clone(),
            attachments: message
                .attachments
                .iter()
                .map(|a| Attachment {
                    name: a.name.clone(),
                    content_type: a.content_type.clone(),
                    url: a.url.clone(),
                })
                .collect(),
        });
    }

    Ok(validated)
}
