//! Streamed text generation
//!
//! Posts the user's prompt to an Ollama-compatible endpoint and turns the
//! newline-delimited JSON response into a stream of speakable sentence
//! fragments. Connection failures surface as a single spoken error fragment
//! rather than an error value, so the conversation loop never has a separate
//! failure path for generation.

use std::pin::Pin;
use std::time::Duration;

use futures::{Stream, StreamExt};

/// Max wait to establish the generation connection
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Max wait between consecutive body chunks
const READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Sentence-ending characters that release a fragment
const TERMINATORS: &[char] = &['.', '!', '?', ':', ';'];

#[derive(serde::Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(serde::Deserialize)]
struct GenerateChunk {
    response: Option<String>,
}

/// Accumulates generation fragments and releases whole sentences
///
/// A sentence is released as soon as the accumulated text, ignoring trailing
/// whitespace, ends with a terminator character. Released sentences are
/// trimmed; whitespace-only accumulations are discarded rather than released.
#[derive(Debug, Default)]
pub struct SentenceSplitter {
    buffer: String,
}

impl SentenceSplitter {
    /// Create an empty splitter
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    /// Append a fragment; returns a completed sentence if one is ready
    pub fn push(&mut self, fragment: &str) -> Option<String> {
        self.buffer.push_str(fragment);

        if self.buffer.trim_end().ends_with(TERMINATORS) {
            return self.take();
        }
        None
    }

    /// Release whatever remains after the stream ends
    pub fn finish(&mut self) -> Option<String> {
        self.take()
    }

    fn take(&mut self) -> Option<String> {
        let sentence = std::mem::take(&mut self.buffer);
        let sentence = sentence.trim();
        if sentence.is_empty() {
            None
        } else {
            Some(sentence.to_string())
        }
    }
}

/// Stream of speakable sentences from one generation request
pub struct ResponseStream {
    inner: Pin<Box<dyn Stream<Item = String> + Send>>,
}

impl ResponseStream {
    /// Next sentence, or `None` when the response is exhausted
    pub async fn next(&mut self) -> Option<String> {
        self.inner.next().await
    }
}

/// Client for an Ollama-compatible streaming generation endpoint
pub struct GenerateClient {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl GenerateClient {
    /// Create a client for the given endpoint and model
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed.
    pub fn new(url: String, model: String) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self { client, url, model })
    }

    /// Stream sentence fragments for a prompt
    ///
    /// Never fails: if the endpoint is unreachable, rejects the request, or
    /// stalls mid-response, the stream yields one spoken error fragment and
    /// ends. Malformed NDJSON lines are skipped.
    #[must_use]
    pub fn stream(&self, prompt: &str) -> ResponseStream {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: true,
        };

        tracing::info!(model = %self.model, prompt_len = prompt.len(), "generation request");

        let builder = self.client.post(&self.url).json(&request);

        let inner = async_stream::stream! {
            let response = match builder.send().await {
                Ok(resp) => match resp.error_for_status() {
                    Ok(resp) => resp,
                    Err(e) => {
                        tracing::error!(error = %e, "generation service rejected request");
                        yield format!("Error connecting to the generation service: {e}");
                        return;
                    }
                },
                Err(e) => {
                    tracing::error!(error = %e, "generation request failed");
                    yield format!("Error connecting to the generation service: {e}");
                    return;
                }
            };

            let mut splitter = SentenceSplitter::new();
            let mut line_buf: Vec<u8> = Vec::new();
            let mut body = response.bytes_stream();

            loop {
                let chunk = match tokio::time::timeout(READ_TIMEOUT, body.next()).await {
                    Ok(Some(Ok(chunk))) => chunk,
                    Ok(Some(Err(e))) => {
                        tracing::error!(error = %e, "generation stream broke");
                        yield format!("Error connecting to the generation service: {e}");
                        return;
                    }
                    Ok(None) => break,
                    Err(_) => {
                        tracing::error!("generation stream stalled");
                        yield "Error connecting to the generation service: read timed out"
                            .to_string();
                        return;
                    }
                };

                line_buf.extend_from_slice(&chunk);

                // NDJSON: one JSON object per line
                while let Some(newline) = line_buf.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = line_buf.drain(..=newline).collect();
                    if let Some(fragment) = parse_fragment(&line) {
                        if let Some(sentence) = splitter.push(&fragment) {
                            yield sentence;
                        }
                    }
                }
            }

            // The final object may arrive without a trailing newline
            if let Some(fragment) = parse_fragment(&line_buf) {
                if let Some(sentence) = splitter.push(&fragment) {
                    yield sentence;
                }
            }

            if let Some(sentence) = splitter.finish() {
                yield sentence;
            }

            tracing::debug!("generation stream complete");
        };

        ResponseStream {
            inner: Box::pin(inner),
        }
    }
}

/// Extract the text fragment from one NDJSON line, if it carries one
fn parse_fragment(line: &[u8]) -> Option<String> {
    let line = std::str::from_utf8(line).ok()?.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str::<GenerateChunk>(line) {
        Ok(chunk) => chunk.response.filter(|r| !r.is_empty()),
        Err(e) => {
            tracing::warn!(error = %e, "skipping malformed stream line");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed text one character at a time, collecting released sentences
    fn split_per_char(text: &str) -> Vec<String> {
        let mut splitter = SentenceSplitter::new();
        let mut out = Vec::new();
        for c in text.chars() {
            if let Some(s) = splitter.push(&c.to_string()) {
                out.push(s);
            }
        }
        if let Some(s) = splitter.finish() {
            out.push(s);
        }
        out
    }

    #[test]
    fn splits_on_terminators() {
        let sentences = split_per_char("Hello world. How are you? Fine!");
        assert_eq!(sentences, vec!["Hello world.", "How are you?", "Fine!"]);
    }

    #[test]
    fn colon_and_semicolon_terminate() {
        let sentences = split_per_char("First: second; third.");
        assert_eq!(sentences, vec!["First:", "second;", "third."]);
    }

    #[test]
    fn leftover_without_terminator_is_released_at_finish() {
        let sentences = split_per_char("Done. And one more thing");
        assert_eq!(sentences, vec!["Done.", "And one more thing"]);
    }

    #[test]
    fn trailing_whitespace_does_not_delay_release() {
        let mut splitter = SentenceSplitter::new();
        assert_eq!(splitter.push("Hi there. "), Some("Hi there.".to_string()));
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn whitespace_only_is_never_released() {
        let mut splitter = SentenceSplitter::new();
        assert_eq!(splitter.push("   "), None);
        assert_eq!(splitter.push("\n\t"), None);
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn multi_character_fragments_release_once_per_sentence() {
        let mut splitter = SentenceSplitter::new();
        assert_eq!(splitter.push("The answer"), None);
        assert_eq!(
            splitter.push(" is 42."),
            Some("The answer is 42.".to_string())
        );
    }

    #[test]
    fn parse_fragment_handles_ndjson_lines() {
        assert_eq!(
            parse_fragment(br#"{"response":"hello"}"#),
            Some("hello".to_string())
        );
        assert_eq!(parse_fragment(br#"{"response":""}"#), None);
        assert_eq!(parse_fragment(br#"{"done":true}"#), None);
        assert_eq!(parse_fragment(b"not json"), None);
        assert_eq!(parse_fragment(b"  \n"), None);
    }
}
