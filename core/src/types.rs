use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Declares an opaque, provider-issued identifier.
///
/// Values are carried verbatim and never parsed; only blank input is refused.
macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw identifier, returning `None` for blank input
            pub fn parse(raw: impl Into<String>) -> Option<Self> {
                let raw = raw.into();
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    None
                } else if trimmed.len() == raw.len() {
                    Some(Self(raw))
                } else {
                    Some(Self(trimmed.to_string()))
                }
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

opaque_id!(
    /// Provider-issued handle to one stored response and the chain behind it
    ResponseId
);

opaque_id!(
    /// Provider-issued handle to a server-side conversation container
    ConversationId
);

/// Reasoning effort hint for reasoning-capable models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for ReasoningEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasoningEffort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!(
                "unknown reasoning effort '{}' (expected low, medium or high)",
                other
            )),
        }
    }
}

/// Request body for `POST /responses`
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CreateResponseRequest {
    pub model: String,
    pub input: ResponseInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<ResponseId>,
    /// Conversation container the turn is appended to; excludes `previous_response_id`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Reasoning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Either a bare text prompt or a list of role-tagged messages
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ResponseInput {
    Text(String),
    Messages(Vec<InputMessage>),
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct InputMessage {
    pub role: String,
    pub content: Vec<InputContent>,
}

impl InputMessage {
    pub fn user(content: Vec<InputContent>) -> Self {
        Self {
            role: "user".to_string(),
            content,
        }
    }
}

/// One part of a multimodal user message
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputContent {
    InputText { text: String },
    InputImage { image_url: String },
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Reasoning {
    pub effort: ReasoningEffort,
}

/// Response object returned by create and retrieve
#[derive(Deserialize, Debug, Clone)]
pub struct ResponseObject {
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub output: Vec<OutputItem>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ResponseObject {
    /// Concatenates every `output_text` part of every message item
    pub fn output_text(&self) -> String {
        self.output
            .iter()
            .filter_map(|item| match item {
                OutputItem::Message { content, .. } => Some(content),
                OutputItem::Other => None,
            })
            .flatten()
            .filter_map(|part| match part {
                OutputContent::OutputText { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message {
        #[serde(default)]
        role: Option<String>,
        #[serde(default)]
        content: Vec<OutputContent>,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputContent {
    OutputText { text: String },
    Refusal { refusal: String },
    #[serde(other)]
    Other,
}

/// Token accounting reported alongside a response
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// Envelope for list endpoints
#[derive(Deserialize, Debug, Clone)]
pub struct ListPage<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ModelEntry {
    pub id: String,
}

/// Item from `GET /responses/{id}/input_items` or `GET /conversations/{id}/items`
#[derive(Deserialize, Debug, Clone)]
pub struct InputItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Vec<InputItemContent>,
}

impl InputItem {
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect()
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct InputItemContent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// Request body for `POST /conversations`
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct CreateConversationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

/// Conversation object returned by `POST /conversations`
#[derive(Deserialize, Debug, Clone)]
pub struct ConversationObject {
    pub id: String,
    #[serde(default)]
    pub created_at: Option<i64>,
}

/// Item written with `POST /conversations/{id}/items`
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationItem {
    Message {
        role: String,
        content: Vec<ItemContent>,
    },
}

impl ConversationItem {
    /// Text message; assistant text is stored as output, everything else as input
    pub fn message(role: &str, text: impl Into<String>) -> Self {
        let text = text.into();
        let part = if role == "assistant" {
            ItemContent::OutputText { text }
        } else {
            ItemContent::InputText { text }
        };
        Self::Message {
            role: role.to_string(),
            content: vec![part],
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemContent {
    InputText { text: String },
    OutputText { text: String },
}

/// Request body for `POST /conversations/{id}/items`
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AddItemsRequest<'a> {
    pub items: &'a [ConversationItem],
}

/// Error envelope returned on non-2xx responses
#[derive(Deserialize, Debug)]
pub(crate) struct ApiErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Deserialize, Debug)]
pub(crate) struct ApiErrorBody {
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_id_rejects_blank() {
        assert!(ResponseId::parse("").is_none());
        assert!(ResponseId::parse("   ").is_none());
        assert_eq!(ResponseId::parse(" resp_1 ").unwrap().as_str(), "resp_1");
    }

    #[test]
    fn test_request_omits_unset_fields() {
        let request = CreateResponseRequest {
            model: "gpt-4o".to_string(),
            input: ResponseInput::Text("Hello".to_string()),
            previous_response_id: None,
            conversation: None,
            reasoning: None,
            instructions: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, json!({"model": "gpt-4o", "input": "Hello"}));
    }

    #[test]
    fn test_multimodal_request_shape() {
        let request = CreateResponseRequest {
            model: "gpt-4o".to_string(),
            input: ResponseInput::Messages(vec![InputMessage::user(vec![
                InputContent::InputText {
                    text: "What is this?".to_string(),
                },
                InputContent::InputImage {
                    image_url: "https://x/y.png".to_string(),
                },
            ])]),
            previous_response_id: ResponseId::parse("resp_1"),
            conversation: None,
            reasoning: Some(Reasoning {
                effort: ReasoningEffort::High,
            }),
            instructions: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "gpt-4o",
                "previous_response_id": "resp_1",
                "reasoning": {"effort": "high"},
                "input": [{
                    "role": "user",
                    "content": [
                        {"type": "input_text", "text": "What is this?"},
                        {"type": "input_image", "image_url": "https://x/y.png"}
                    ]
                }]
            })
        );
    }

    #[test]
    fn test_conversation_item_content_type_follows_role() {
        let items = [
            ConversationItem::message("user", "Hi"),
            ConversationItem::message("assistant", "Hello"),
        ];
        let value = serde_json::to_value(AddItemsRequest { items: &items }).unwrap();
        assert_eq!(
            value,
            json!({"items": [
                {"type": "message", "role": "user", "content": [{"type": "input_text", "text": "Hi"}]},
                {"type": "message", "role": "assistant", "content": [{"type": "output_text", "text": "Hello"}]}
            ]})
        );
        assert_eq!(
            serde_json::to_value(CreateConversationRequest::default()).unwrap(),
            json!({})
        );
    }

    #[test]
    fn test_output_text_skips_non_message_items() {
        let body = json!({
            "id": "resp_2",
            "model": "o3",
            "output": [
                {"type": "reasoning", "summary": []},
                {"type": "message", "role": "assistant", "content": [
                    {"type": "output_text", "text": "Hello, "},
                    {"type": "refusal", "refusal": "no"},
                    {"type": "output_text", "text": "world"}
                ]}
            ],
            "usage": {"input_tokens": 3, "output_tokens": 2, "total_tokens": 5}
        });
        let response: ResponseObject = serde_json::from_value(body).unwrap();
        assert_eq!(response.output_text(), "Hello, world");
        assert_eq!(response.usage.unwrap().total_tokens, 5);
    }

    #[test]
    fn test_reasoning_effort_from_str() {
        assert_eq!("Medium".parse::<ReasoningEffort>(), Ok(ReasoningEffort::Medium));
        assert!("extreme".parse::<ReasoningEffort>().is_err());
    }
}
