//! services/api/src/adapters/chat_llm.rs
//!
//! This module contains the adapter for the vision-capable chat LLM.
//! It implements the `ChatStreamService` port from the `core` crate,
//! forwarding a validated message list (with embedded image data) and
//! relaying the model's output as an incremental stream.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrlArgs,
    },
    Client,
};
use async_trait::async_trait;
use coffee_analysis_core::{
    domain::{ChatMessage, Role},
    ports::{ChatStream, ChatStreamService, PortError, PortResult},
};
use futures::StreamExt;
use tracing::error;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ChatStreamService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiChatAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiChatAdapter {
    /// Creates a new `OpenAiChatAdapter` with the fixed model identifier
    /// every request is forwarded to.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Maps one domain message onto the provider's request type. User
    /// messages become multi-part content (text plus inline images);
    /// assistant and system turns carry text only.
    fn to_request_message(message: &ChatMessage) -> PortResult<ChatCompletionRequestMessage> {
        let built = match message.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(message.content.as_str())
                .build()
                .map(ChatCompletionRequestMessage::System)
                .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?,
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(message.content.as_str())
                .build()
                .map(ChatCompletionRequestMessage::Assistant)
                .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?,
            Role::User => {
                if message.attachments.is_empty() {
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(message.content.as_str())
                        .build()
                        .map(ChatCompletionRequestMessage::User)
                        .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?
                } else {
                    let mut parts: Vec<ChatCompletionRequestUserMessageContentPart> = Vec::new();
                    parts.push(
                        ChatCompletionRequestMessageContentPartTextArgs::default()
                            .text(message.content.as_str())
                            .build()
                            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?
                            .into(),
                    );
                    for attachment in &message.attachments {
                        // The inline data prefix must agree with the declared
                        // content type before the payload is forwarded.
                        if !attachment.url_matches_content_type() {
                            return Err(PortError::Unexpected(format!(
                                "attachment '{}' data URL does not match content type '{}'",
                                attachment.name, attachment.content_type
                            )));
                        }
                        parts.push(
                            ChatCompletionRequestMessageContentPartImageArgs::default()
                                .image_url(
                                    ImageUrlArgs::default()
                                        .url(attachment.url.as_str())
                                        .detail(ImageDetail::Auto)
                                        .build()
                                        .map_err(|e: OpenAIError| {
                                            PortError::Unexpected(e.to_string())
                                        })?,
                                )
                                .build()
                                .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?
                                .into(),
                        );
                    }
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(parts)
                        .build()
                        .map(ChatCompletionRequestMessage::User)
                        .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?
                }
            }
        };
        Ok(built)
    }
}

//=========================================================================================
// `ChatStreamService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatStreamService for OpenAiChatAdapter {
    /// Forwards the messages and returns the provider's token stream as a
    /// stream of text chunks in arrival order.
    async fn stream_chat(&self, messages: Vec<ChatMessage>) -> PortResult<ChatStream> {
        let request_messages = messages
            .iter()
            .map(Self::to_request_message)
            .collect::<PortResult<Vec<_>>>()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(request_messages)
            .build()
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let mut upstream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e: OpenAIError| PortError::Upstream(e.to_string()))?;

        let stream = async_stream::stream! {
            while let Some(chunk) = upstream.next().await {
                match chunk {
                    Ok(response) => {
                        let delta = response
                            .choices
                            .first()
                            .and_then(|choice| choice.delta.content.clone());
                        if let Some(text) = delta {
                            if !text.is_empty() {
                                yield Ok(text);
                            }
                        }
                    }
                    Err(e) => {
                        error!("Upstream stream error: {e}");
                        yield Err(PortError::Upstream(e.to_string()));
                        return;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
