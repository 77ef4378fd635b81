use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to create conversation")]
    ConversationCreation,

    #[error("malformed stream line {line:?}: {source}")]
    Protocol {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no image was found in the response")]
    ImageGeneration,

    #[error("failed to download the image: {status}")]
    ImageDownload { status: StatusCode },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Returns a user-friendly suggestion for how to resolve this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::Configuration(_) => {
                Some("Pass --auth-token and --csrf-token, or set X_AUTH_TOKEN and X_CSRF_TOKEN")
            }
            Error::ConversationCreation => {
                Some("Check that your auth_token and ct0 cookies are still valid")
            }
            Error::ImageGeneration => Some("Try rephrasing the prompt"),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
