use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::attachments::{resolve_all, ImageRef};
use crate::config::SaverConfig;
use crate::errors::{SaverError, SaverResult};
use crate::models::chat_models;
use crate::provider::ResponsesApiRef;
use crate::session::SessionState;
use crate::types::*;

/// One user submission
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub prior_response_id: Option<ResponseId>,
    pub message: String,
    pub attachments: Vec<ImageRef>,
}

impl ConversationTurn {
    pub fn new(prior_response_id: Option<ResponseId>, message: impl Into<String>) -> Self {
        Self {
            prior_response_id,
            message: message.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<ImageRef>) -> Self {
        self.attachments = attachments;
        self
    }
}

/// Per-turn request settings
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOptions {
    pub model: String,
    pub reasoning_effort: Option<ReasoningEffort>,
    pub instructions: Option<String>,
}

impl TurnOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            reasoning_effort: None,
            instructions: None,
        }
    }

    pub fn from_config(config: &SaverConfig) -> Self {
        Self {
            model: config.model().to_string(),
            reasoning_effort: config.reasoning_effort,
            instructions: config.instructions.clone(),
        }
    }
}

/// Outcome of a successful turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub response_id: ResponseId,
    pub assistant_text: String,
    pub model: String,
    #[serde(default)]
    pub usage: Option<Usage>,
    pub timestamp: DateTime<Utc>,
}

/// A message of a remote conversation, in chronological order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: String,
    pub content: String,
}

/// Remote view of a stored conversation ending at one response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationThread {
    pub response_id: ResponseId,
    pub model: String,
    pub messages: Vec<ThreadMessage>,
    pub output: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Result of copying a response chain into a conversation container
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvertedConversation {
    pub conversation_id: ConversationId,
    pub items_added: usize,
    pub from_response_id: Option<ResponseId>,
    pub name: Option<String>,
}

/// Most items the provider accepts in one add-items call
const ITEMS_PER_REQUEST: usize = 20;

/// Sends conversation turns through a provider
#[derive(Clone)]
pub struct ConversationClient {
    api: ResponsesApiRef,
}

impl ConversationClient {
    pub fn new(api: ResponsesApiRef) -> Self {
        Self { api }
    }

    /// Sends one turn and returns the provider's reply.
    ///
    /// Attachments are resolved before anything goes on the wire, so a bad
    /// attachment never produces a partial request. Exactly one request is
    /// issued otherwise.
    pub async fn send_turn(
        &self,
        turn: &ConversationTurn,
        options: &TurnOptions,
    ) -> SaverResult<ResponseRecord> {
        let request = build_request(turn, options).await?;
        debug!(
            "Sending turn (continuing from {}, {} attachment(s))",
            turn.prior_response_id
                .as_ref()
                .map(ResponseId::as_str)
                .unwrap_or("<new>"),
            turn.attachments.len()
        );

        self.submit(&request, options).await
    }

    async fn submit(
        &self,
        request: &CreateResponseRequest,
        options: &TurnOptions,
    ) -> SaverResult<ResponseRecord> {
        let response = self.api.create_response(request).await?;

        let response_id = ResponseId::parse(response.id.as_str()).ok_or_else(|| {
            SaverError::provider(None, "Provider returned an empty response id")
        })?;
        let record = ResponseRecord {
            response_id,
            assistant_text: response.output_text(),
            model: if response.model.is_empty() {
                options.model.clone()
            } else {
                response.model.clone()
            },
            usage: response.usage,
            timestamp: Utc::now(),
        };

        if let Some(usage) = &record.usage {
            debug!(
                "Token usage: input={}, output={}, total={}",
                usage.input_tokens, usage.output_tokens, usage.total_tokens
            );
        }
        info!("Received response {}", record.response_id);
        Ok(record)
    }

    /// Sends `message` with the session's pending attachments, continuing from
    /// its current response.
    ///
    /// The session only changes on success: it then holds the new identifier
    /// and an empty attachment queue.
    pub async fn advance(
        &self,
        session: &mut SessionState,
        message: &str,
        options: &TurnOptions,
    ) -> SaverResult<ResponseRecord> {
        let turn = ConversationTurn {
            prior_response_id: session.current_response_id().cloned(),
            message: message.to_string(),
            attachments: session.pending_attachments().to_vec(),
        };

        let record = self.send_turn(&turn, options).await?;
        session.set_response_id(record.response_id.clone());
        session.clear_attachments();
        Ok(record)
    }

    /// Chat-capable models, most common first
    pub async fn list_models(&self) -> SaverResult<Vec<String>> {
        Ok(chat_models(self.api.list_models().await?))
    }

    /// Reconstructs the conversation that produced `id`
    pub async fn fetch_thread(&self, id: &ResponseId) -> SaverResult<ConversationThread> {
        let response = self.api.retrieve_response(id).await?;
        let items = self.api.list_input_items(id).await?;

        let messages = chronological_messages(&items);

        Ok(ConversationThread {
            response_id: id.clone(),
            model: if response.model.is_empty() {
                "unknown".to_string()
            } else {
                response.model.clone()
            },
            messages,
            output: response.output_text(),
            created_at: response
                .created_at
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        })
    }

    /// Creates a conversation container, optionally seeded with the history
    /// behind `from` followed by that response's own output
    pub async fn convert_to_conversation(
        &self,
        from: Option<&ResponseId>,
        name: Option<&str>,
    ) -> SaverResult<ConvertedConversation> {
        let name = name.map(str::trim).filter(|name| !name.is_empty());
        let request = CreateConversationRequest {
            metadata: name.map(|name| BTreeMap::from([("name".to_string(), name.to_string())])),
        };

        let mut seed = Vec::new();
        if let Some(id) = from {
            let response = self.api.retrieve_response(id).await?;
            let items = self.api.list_input_items(id).await?;
            for item in items.iter().rev().filter(|item| item.kind == "message") {
                let text = item.text();
                if !text.is_empty() {
                    seed.push(ConversationItem::message(
                        item.role.as_deref().unwrap_or("user"),
                        text,
                    ));
                }
            }
            let output = response.output_text();
            if !output.is_empty() {
                seed.push(ConversationItem::message("assistant", output));
            }
        }

        let conversation = self.api.create_conversation(&request).await?;
        let conversation_id = ConversationId::parse(conversation.id.as_str()).ok_or_else(|| {
            SaverError::provider(None, "Provider returned an empty conversation id")
        })?;
        for batch in seed.chunks(ITEMS_PER_REQUEST) {
            self.api.add_conversation_items(&conversation_id, batch).await?;
        }
        info!(
            "Created conversation {} with {} item(s)",
            conversation_id,
            seed.len()
        );

        Ok(ConvertedConversation {
            conversation_id,
            items_added: seed.len(),
            from_response_id: from.cloned(),
            name: name.map(str::to_string),
        })
    }

    /// Sends one text message inside a conversation container
    pub async fn continue_conversation(
        &self,
        conversation: &ConversationId,
        message: &str,
        options: &TurnOptions,
    ) -> SaverResult<ResponseRecord> {
        if message.trim().is_empty() {
            return Err(SaverError::InvalidTurn("Message is required".to_string()));
        }
        let mut request = build_request(&ConversationTurn::new(None, message), options).await?;
        request.conversation = Some(conversation.clone());
        debug!("Sending turn in conversation {}", conversation);
        self.submit(&request, options).await
    }

    /// Messages stored in a conversation container, oldest first
    pub async fn conversation_messages(
        &self,
        conversation: &ConversationId,
    ) -> SaverResult<Vec<ThreadMessage>> {
        let items = self.api.list_conversation_items(conversation).await?;
        Ok(chronological_messages(&items))
    }
}

/// Message items of a newest-first listing, in chronological order
fn chronological_messages(items: &[InputItem]) -> Vec<ThreadMessage> {
    items
        .iter()
        .rev()
        .filter(|item| item.kind == "message")
        .map(|item| ThreadMessage {
            id: item.id.clone(),
            role: item.role.clone().unwrap_or_else(|| "unknown".to_string()),
            content: item.text(),
        })
        .collect()
}

/// Builds the outbound request, resolving every attachment first
pub async fn build_request(
    turn: &ConversationTurn,
    options: &TurnOptions,
) -> SaverResult<CreateResponseRequest> {
    let message = turn.message.trim();
    if message.is_empty() && turn.attachments.is_empty() {
        return Err(SaverError::InvalidTurn(
            "Message or images required".to_string(),
        ));
    }
    if options.model.trim().is_empty() {
        return Err(SaverError::InvalidTurn("Model is required".to_string()));
    }

    let input = if turn.attachments.is_empty() {
        ResponseInput::Text(message.to_string())
    } else {
        let images = resolve_all(&turn.attachments).await?;
        let mut content = Vec::with_capacity(images.len() + 1);
        if !message.is_empty() {
            content.push(InputContent::InputText {
                text: message.to_string(),
            });
        }
        content.extend(
            images
                .into_iter()
                .map(|image_url| InputContent::InputImage { image_url }),
        );
        ResponseInput::Messages(vec![InputMessage::user(content)])
    };

    Ok(CreateResponseRequest {
        model: options.model.trim().to_string(),
        input,
        previous_response_id: turn.prior_response_id.clone(),
        conversation: None,
        reasoning: options
            .reasoning_effort
            .map(|effort| Reasoning { effort }),
        instructions: options
            .instructions
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string),
    })
}
