//! Async client for the Grok chat endpoint on x.com.
//!
//! Authenticates with the `auth_token` and `ct0` browser cookies, creates
//! conversations and reads the newline-delimited JSON reply either as one
//! string ([`Client::generate`]) or token by token ([`Client::stream`]).
//!
//! ```no_run
//! use futures::StreamExt;
//! use grokit::{ChatRequest, Client, ClientConfig, Credentials};
//!
//! # async fn run() -> grokit::Result<()> {
//! let client = Client::new(ClientConfig::new(Credentials::new("auth", "ct0")))?;
//!
//! let reply = client.generate(ChatRequest::new("Hello!")).await?;
//! println!("{reply}");
//!
//! let mut tokens = client.stream(ChatRequest::new("Tell me a story")).await?;
//! while let Some(token) = tokens.next().await {
//!     print!("{}", token?);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
pub mod decoder;
mod error;
mod image;
mod protocol;
mod session;

pub use client::{
    ADD_RESPONSE_URL, CREATE_CONVERSATION_URL, ChatRequest, Client, ClientConfig, Endpoints,
};
pub use decoder::{DecodeMode, TokenStream};
pub use error::{Error, Result};
pub use image::first_image_url;
pub use protocol::{ConversationId, GrokModel, ResponseChunk};
pub use session::{Credentials, Session};
