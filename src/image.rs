use crate::error::{Error, Result};
use crate::protocol::ResponseChunk;
use futures::{Stream, StreamExt};
use tracing::debug;

pub(crate) fn image_prompt(prompt: &str) -> String {
    format!("Generate an image of \"{}\"", prompt)
}

/// Return the URL of the first image token, without reading past it.
///
/// Tokens that are not JSON (plain text fragments) or that carry no image
/// URL are skipped. Fails with [`Error::ImageGeneration`] once the stream
/// is exhausted.
pub async fn first_image_url<S>(tokens: S) -> Result<String>
where
    S: Stream<Item = Result<String>>,
{
    let mut tokens = std::pin::pin!(tokens);

    while let Some(token) = tokens.next().await {
        if let Some(url) = image_url_from_token(&token?) {
            debug!(url = %url, "Found image in response");
            return Ok(url);
        }
    }

    Err(Error::ImageGeneration)
}

fn image_url_from_token(token: &str) -> Option<String> {
    let value = serde_json::from_str(token).ok()?;
    match ResponseChunk::classify(value) {
        ResponseChunk::Image { url, .. } => url,
        ResponseChunk::Text(_) | ResponseChunk::Unrecognized => None,
    }
}
