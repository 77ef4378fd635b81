//! Decoding of the newline-delimited JSON stream returned by `add_response`.
//!
//! Each line is an independent JSON object:
//! ```text
//! {"result":{"sender":"ASSISTANT","message":"Hel"}}
//! {"result":{"sender":"ASSISTANT","message":"lo"}}
//! {"result":{"imageAttachment":{"imageUrl":"https://ton.x.com/..."}}}
//! ```
//! Lines are classified with [`ResponseChunk::classify`] and turned into
//! string tokens. The stream ends when the body ends.

use crate::error::{Error, Result};
use crate::protocol::ResponseChunk;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use tracing::debug;

/// Lazily decoded tokens of one response. Dropping it closes the connection.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// How a line that is not valid JSON is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Abort the stream with [`Error::Protocol`]. Used for chat responses.
    Strict,
    /// Skip the line and keep reading. Used while searching for an image.
    Lenient,
}

pub(crate) fn decode_response(response: reqwest::Response, mode: DecodeMode) -> TokenStream {
    Box::pin(decode_lines(split_lines(response.bytes_stream()), mode))
}

/// Turn a stream of raw lines into text tokens.
///
/// Text chunks yield their message, image chunks yield the whole line
/// re-serialized as JSON, anything else yields nothing.
pub fn decode_lines<S, L>(lines: S, mode: DecodeMode) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = Result<L>> + Send,
    L: AsRef<[u8]> + Send,
{
    async_stream::stream! {
        let mut lines = std::pin::pin!(lines);
        let mut emitted = 0usize;

        while let Some(line) = lines.next().await {
            let decoded = line.and_then(|line| decode_line(line.as_ref(), mode));
            let value = match decoded {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            if let Some(token) = ResponseChunk::classify(value).into_token() {
                emitted += 1;
                yield Ok(token);
            }
        }

        debug!(tokens = emitted, "Response stream finished");
    }
}

fn decode_line(line: &[u8], mode: DecodeMode) -> Result<Option<Value>> {
    if line.trim_ascii().is_empty() {
        return Ok(None);
    }

    match serde_json::from_slice(line) {
        Ok(value) => Ok(Some(value)),
        Err(source) => match mode {
            DecodeMode::Strict => Err(Error::Protocol {
                line: String::from_utf8_lossy(line).into_owned(),
                source,
            }),
            DecodeMode::Lenient => {
                debug!(
                    data = %String::from_utf8_lossy(line).chars().take(200).collect::<String>(),
                    error = %source,
                    "Skipping malformed stream line"
                );
                Ok(None)
            }
        },
    }
}

/// Split a byte stream on `\n`, buffering partial lines across chunks.
///
/// A trailing `\r` is removed. A final line without a newline is still
/// yielded when the body ends.
pub(crate) fn split_lines<S>(body: S) -> impl Stream<Item = Result<Vec<u8>>> + Send
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send,
{
    async_stream::stream! {
        let mut body = std::pin::pin!(body);
        let mut buffer: Vec<u8> = Vec::with_capacity(4096);

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(chunk) => buffer.extend_from_slice(&chunk),
                Err(e) => {
                    yield Err(Error::Http(e));
                    return;
                }
            }

            while let Some(newline_pos) = buffer.iter().position(|b| *b == b'\n') {
                let mut line: Vec<u8> = buffer.drain(..=newline_pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                yield Ok(line);
            }
        }

        if buffer.last() == Some(&b'\r') {
            buffer.pop();
        }
        if !buffer.is_empty() {
            yield Ok(buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn lines(lines: &[&str]) -> impl Stream<Item = Result<String>> + Send + use<> {
        let owned: Vec<Result<String>> = lines.iter().map(|l| Ok(l.to_string())).collect();
        stream::iter(owned)
    }

    fn body(chunks: &[&[u8]]) -> impl Stream<Item = reqwest::Result<Bytes>> + Send + use<> {
        let owned: Vec<reqwest::Result<Bytes>> = chunks
            .iter()
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        stream::iter(owned)
    }

    async fn collect(
        stream: impl Stream<Item = Result<String>> + Send,
    ) -> Vec<Result<String>> {
        stream.collect().await
    }

    fn tokens(results: Vec<Result<String>>) -> Vec<String> {
        results.into_iter().map(|r| r.unwrap()).collect()
    }

    #[tokio::test]
    async fn text_chunks_are_yielded_in_order() {
        let out = collect(decode_lines(
            lines(&[
                r#"{"result":{"message":"A"}}"#,
                r#"{"result":{"message":"B"}}"#,
            ]),
            DecodeMode::Strict,
        ))
        .await;
        assert_eq!(tokens(out), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn lines_without_result_are_ignored() {
        let out = collect(decode_lines(
            lines(&[r#"{"x":1}"#, "", r#"{"result":{"message":"C"}}"#]),
            DecodeMode::Strict,
        ))
        .await;
        assert_eq!(tokens(out), vec!["C"]);
    }

    #[tokio::test]
    async fn image_chunk_yields_whole_line_as_json() {
        let out = collect(decode_lines(
            lines(&[r#"{"result":{"imageAttachment":{"imageUrl":"http://u"}}}"#]),
            DecodeMode::Strict,
        ))
        .await;
        let out = tokens(out);
        assert_eq!(out.len(), 1);
        assert_ne!(out[0], "http://u");
        assert_eq!(
            serde_json::from_str::<Value>(&out[0]).unwrap(),
            json!({"result": {"imageAttachment": {"imageUrl": "http://u"}}})
        );
    }

    #[tokio::test]
    async fn strict_mode_aborts_on_malformed_line() {
        let out = collect(decode_lines(
            lines(&[
                r#"{"result":{"message":"A"}}"#,
                "not json",
                r#"{"result":{"message":"B"}}"#,
            ]),
            DecodeMode::Strict,
        ))
        .await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_deref().unwrap(), "A");
        match &out[1] {
            Err(Error::Protocol { line, .. }) => assert_eq!(line, "not json"),
            other => panic!("expected protocol error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn lenient_mode_skips_malformed_line() {
        let out = collect(decode_lines(
            lines(&[
                r#"{"result":{"message":"A"}}"#,
                "not json",
                r#"{"result":{"message":"B"}}"#,
            ]),
            DecodeMode::Lenient,
        ))
        .await;
        assert_eq!(tokens(out), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn invalid_utf8_is_a_protocol_error_in_strict_mode() {
        let source = stream::iter(vec![Ok::<_, Error>(vec![0xff, 0xfe])]);
        let out = collect(decode_lines(source, DecodeMode::Strict)).await;
        assert!(matches!(out.as_slice(), [Err(Error::Protocol { .. })]));
    }

    #[tokio::test]
    async fn dropping_the_stream_stops_reading() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let source = lines(&[
            r#"{"result":{"message":"A"}}"#,
            r#"{"result":{"message":"B"}}"#,
            r#"{"result":{"message":"C"}}"#,
        ])
        .inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut decoded = Box::pin(decode_lines(source, DecodeMode::Strict));
        assert_eq!(decoded.next().await.unwrap().unwrap(), "A");
        drop(decoded);

        assert_eq!(pulled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn split_lines_buffers_across_chunks() {
        let out: Vec<Vec<u8>> = split_lines(body(&[
            b"{\"a\":",
            b"1}\r\n{\"b\"",
            b":2}\n\n{\"c\":3}",
        ]))
        .map(|r| r.unwrap())
        .collect()
        .await;
        assert_eq!(
            out,
            vec![
                b"{\"a\":1}".to_vec(),
                b"{\"b\":2}".to_vec(),
                Vec::new(),
                b"{\"c\":3}".to_vec(),
            ]
        );
    }

    #[tokio::test]
    async fn split_lines_keeps_multibyte_characters_intact() {
        let line = "{\"result\":{\"message\":\"h\u{e9}llo\"}}\n".as_bytes();
        let split = line.iter().position(|b| *b == 0xc3).unwrap() + 1;
        let decoded = collect(decode_lines(
            split_lines(body(&[&line[..split], &line[split..]])),
            DecodeMode::Strict,
        ))
        .await;
        assert_eq!(tokens(decoded), vec!["h\u{e9}llo"]);
    }
}
