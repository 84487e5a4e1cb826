//! services/api/src/web/protocol.rs
//!
//! Wire-format types for the chat endpoint. Roles arrive as plain strings
//! so that the request guard (not the deserializer) can produce a specific
//! rejection reason for unknown values.

use serde::Deserialize;
use utoipa::ToSchema;

/// Body of `POST /api/chat`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    pub messages: Vec<IncomingMessage>,
}

/// One conversation turn as sent by the client.
#[derive(Debug, Deserialize, ToSchema)]
pub struct IncomingMessage {
    pub role: String,
    pub content: String,
    /// The legacy client sends this as `experimental_attachments`.
    #[serde(default, alias = "experimental_attachments")]
    pub attachments: Vec<IncomingAttachment>,
}

/// An inline image attachment as sent by the client.
#[derive(Debug, Deserialize, ToSchema)]
pub struct IncomingAttachment {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "contentType", alias = "content_type")]
    pub content_type: String,
    pub url: String,
}
