use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

pub(crate) const CREATE_CONVERSATION_QUERY_ID: &str = "UBIjqHqsA5aixuibXTBheQ";

/// Sender id the web app uses for messages typed by the user.
const USER_SENDER: u8 = 1;

/// Server-owned identifier for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConversationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GrokModel {
    Grok2,
    #[default]
    Grok2Mini,
    /// Any other model option id, sent as-is.
    Custom(String),
}

impl GrokModel {
    pub fn as_str(&self) -> &str {
        match self {
            GrokModel::Grok2 => "grok-2",
            GrokModel::Grok2Mini => "grok-2-mini",
            GrokModel::Custom(id) => id,
        }
    }
}

impl From<&str> for GrokModel {
    fn from(id: &str) -> Self {
        match id {
            "grok-2" => GrokModel::Grok2,
            "grok-2-mini" => GrokModel::Grok2Mini,
            other => GrokModel::Custom(other.to_string()),
        }
    }
}

impl From<String> for GrokModel {
    fn from(id: String) -> Self {
        GrokModel::from(id.as_str())
    }
}

impl fmt::Display for GrokModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for GrokModel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateConversationRequest {
    pub(crate) variables: serde_json::Map<String, Value>,
    pub(crate) query_id: &'static str,
}

impl CreateConversationRequest {
    pub(crate) fn new() -> Self {
        Self {
            variables: serde_json::Map::new(),
            query_id: CREATE_CONVERSATION_QUERY_ID,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateConversationResponse {
    data: Option<CreateConversationData>,
}

#[derive(Debug, Deserialize)]
struct CreateConversationData {
    create_grok_conversation: Option<CreatedConversation>,
}

#[derive(Debug, Deserialize)]
struct CreatedConversation {
    conversation_id: Option<String>,
}

impl CreateConversationResponse {
    pub(crate) fn into_conversation_id(self) -> Option<ConversationId> {
        self.data?
            .create_grok_conversation?
            .conversation_id
            .map(ConversationId::from)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddResponseRequest<'a> {
    pub(crate) responses: Vec<ResponseMessage<'a>>,
    pub(crate) system_prompt_name: &'a str,
    pub(crate) grok_model_option_id: &'a GrokModel,
    pub(crate) conversation_id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResponseMessage<'a> {
    pub(crate) message: &'a str,
    pub(crate) sender: u8,
}

impl<'a> AddResponseRequest<'a> {
    pub(crate) fn new(
        conversation_id: &'a ConversationId,
        message: &'a str,
        system_prompt_name: &'a str,
        model: &'a GrokModel,
    ) -> Self {
        Self {
            responses: vec![ResponseMessage {
                message,
                sender: USER_SENDER,
            }],
            system_prompt_name,
            grok_model_option_id: model,
            conversation_id: conversation_id.as_str(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamLine {
    result: Option<StreamResult>,
}

/// Only which key is present matters; the shapes of the values do not.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamResult {
    message: Option<Value>,
    image_attachment: Option<Value>,
}

/// One decoded line of the `add_response` stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseChunk {
    Text(String),
    /// An image attachment. `raw` is the whole decoded line.
    Image { url: Option<String>, raw: Value },
    /// No `result`, or a `result` with neither a message nor an image.
    Unrecognized,
}

impl ResponseChunk {
    pub fn classify(value: Value) -> Self {
        let result = match StreamLine::deserialize(&value) {
            Ok(StreamLine {
                result: Some(result),
            }) => result,
            _ => return ResponseChunk::Unrecognized,
        };

        match result {
            StreamResult {
                message: Some(Value::String(text)),
                ..
            } => ResponseChunk::Text(text),
            StreamResult {
                message: Some(other),
                ..
            } => ResponseChunk::Text(other.to_string()),
            StreamResult {
                image_attachment: Some(attachment),
                ..
            } => ResponseChunk::Image {
                url: attachment
                    .get("imageUrl")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                raw: value,
            },
            StreamResult { .. } => ResponseChunk::Unrecognized,
        }
    }

    /// The string handed to callers of `generate`/`stream`.
    ///
    /// Image chunks become the whole line re-serialized as JSON so the
    /// image flow can parse them back out of the token sequence.
    pub fn into_token(self) -> Option<String> {
        match self {
            ResponseChunk::Text(text) => Some(text),
            ResponseChunk::Image { raw, .. } => Some(raw.to_string()),
            ResponseChunk::Unrecognized => None,
        }
    }
}
