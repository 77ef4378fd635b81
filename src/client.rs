use crate::decoder::{DecodeMode, TokenStream, decode_response};
use crate::error::{Error, Result};
use crate::image::{first_image_url, image_prompt};
use crate::protocol::{
    AddResponseRequest, ConversationId, CreateConversationRequest, CreateConversationResponse,
    GrokModel,
};
use crate::session::{Credentials, Session};
use bytes::Bytes;
use futures::StreamExt;
use reqwest::{Client as HttpClient, StatusCode};
use tracing::{debug, warn};

pub const CREATE_CONVERSATION_URL: &str =
    "https://x.com/i/api/graphql/UBIjqHqsA5aixuibXTBheQ/CreateGrokConversation";
pub const ADD_RESPONSE_URL: &str = "https://api.x.com/2/grok/add_response.json";

#[derive(Debug, Clone)]
pub struct Endpoints {
    pub create_conversation: String,
    pub add_response: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            create_conversation: CREATE_CONVERSATION_URL.to_string(),
            add_response: ADD_RESPONSE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub credentials: Credentials,
    pub endpoints: Endpoints,
}

impl ClientConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            endpoints: Endpoints::default(),
        }
    }
}

/// A single message to send, with optional conversation and model settings.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    message: String,
    conversation_id: Option<ConversationId>,
    system_prompt_name: String,
    model: GrokModel,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_id: None,
            system_prompt_name: String::new(),
            model: GrokModel::default(),
        }
    }

    /// Continue an existing conversation instead of creating a new one.
    pub fn conversation_id(mut self, id: impl Into<ConversationId>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    pub fn system_prompt_name(mut self, name: impl Into<String>) -> Self {
        self.system_prompt_name = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<GrokModel>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    session: Session,
    endpoints: Endpoints,
    http: HttpClient,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_http(config, HttpClient::new())
    }

    /// Build a client on top of a preconfigured HTTP client (timeouts, proxies).
    pub fn with_http(config: ClientConfig, http: HttpClient) -> Result<Self> {
        Ok(Self {
            session: Session::new(config.credentials)?,
            endpoints: config.endpoints,
            http,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Ask the server for a fresh conversation.
    ///
    /// A rejected request or an unexpected body is logged and reported as
    /// `Ok(None)`; only transport failures are errors.
    pub async fn create_conversation(&self) -> Result<Option<ConversationId>> {
        let response = self
            .http
            .post(&self.endpoints.create_conversation)
            .headers(self.session.headers().clone())
            .json(&CreateConversationRequest::new())
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Failed to create conversation");
            return Ok(None);
        }

        let body = response.text().await?;

        match serde_json::from_str::<CreateConversationResponse>(&body) {
            Ok(parsed) => {
                let id = parsed.into_conversation_id();
                match &id {
                    Some(id) => debug!(conversation_id = %id, "Created conversation"),
                    None => warn!(body = %body, "Conversation id missing from response"),
                }
                Ok(id)
            }
            Err(e) => {
                warn!(error = %e, body = %body, "Malformed create conversation response");
                Ok(None)
            }
        }
    }

    /// Return `id` unchanged, or create a new conversation when it is `None`
    /// or empty.
    pub async fn resolve_conversation_id(
        &self,
        id: Option<ConversationId>,
    ) -> Result<ConversationId> {
        if let Some(id) = id.filter(|id| !id.as_str().is_empty()) {
            return Ok(id);
        }

        self.create_conversation()
            .await?
            .ok_or(Error::ConversationCreation)
    }

    /// Send a message and return the whole reply.
    pub async fn generate(&self, request: ChatRequest) -> Result<String> {
        let mut tokens = self.stream(request).await?;
        let mut reply = String::new();

        while let Some(token) = tokens.next().await {
            reply.push_str(&token?);
        }

        Ok(reply)
    }

    /// Send a message and return the reply as it arrives.
    ///
    /// The conversation is resolved and the request sent before this
    /// returns. Dropping the stream closes the connection.
    pub async fn stream(&self, request: ChatRequest) -> Result<TokenStream> {
        let ChatRequest {
            message,
            conversation_id,
            system_prompt_name,
            model,
        } = request;

        let conversation_id = self.resolve_conversation_id(conversation_id).await?;
        self.add_response(
            &conversation_id,
            &message,
            &system_prompt_name,
            &model,
            DecodeMode::Strict,
        )
        .await
    }

    /// Generate an image in a new conversation and return its URL.
    pub async fn image_url(&self, prompt: &str) -> Result<String> {
        let conversation_id = self
            .create_conversation()
            .await?
            .ok_or(Error::ConversationCreation)?;

        let tokens = self
            .add_response(
                &conversation_id,
                &image_prompt(prompt),
                "",
                &GrokModel::Grok2Mini,
                DecodeMode::Lenient,
            )
            .await?;

        first_image_url(tokens).await
    }

    /// Generate an image and download it.
    pub async fn image(&self, prompt: &str) -> Result<Bytes> {
        let url = self.image_url(prompt).await?;
        let response = self.http.get(&url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::ImageDownload { status });
        }

        Ok(response.bytes().await?)
    }

    async fn add_response(
        &self,
        conversation_id: &ConversationId,
        message: &str,
        system_prompt_name: &str,
        model: &GrokModel,
        mode: DecodeMode,
    ) -> Result<TokenStream> {
        let request = AddResponseRequest::new(conversation_id, message, system_prompt_name, model);
        debug!(conversation_id = %conversation_id, model = %model, "Sending message");

        let response = self
            .http
            .post(&self.endpoints.add_response)
            .headers(self.session.headers().clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Error adding response");
            return Ok(Box::pin(futures::stream::empty()));
        }

        Ok(decode_response(response, mode))
    }
}
