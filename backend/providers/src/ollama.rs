use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use chatbox_core::{GenerationRequest, ProviderError, TokenProvider, TokenStream};

use crate::decode::{token_stream, ChunkDecoder, Decoded};

const PROVIDER: &str = "ollama";

/// Ollama local LLM provider.
pub struct OllamaProvider {
    client: Client,
    base_url: String,
}

impl OllamaProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: "http://localhost:11434".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: [OllamaChatMessage<'a>; 1],
    stream: bool,
}

#[derive(Serialize)]
struct OllamaChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OllamaChunk {
    message: Option<OllamaDelta>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaDelta {
    #[serde(default)]
    content: String,
}

/// Newline-delimited JSON, one chunk object per line.
#[derive(Default)]
struct NdjsonDecoder {
    buffer: String,
}

impl NdjsonDecoder {
    fn decode_line(line: &str) -> Vec<Decoded> {
        let chunk = match serde_json::from_str::<OllamaChunk>(line) {
            Ok(chunk) => chunk,
            Err(e) => {
                debug!(error = %e, "Skipping unparsable Ollama line");
                return Vec::new();
            }
        };

        if let Some(error) = chunk.error {
            return vec![Decoded::Failed(error)];
        }
        let mut out = Vec::new();
        if let Some(delta) = chunk.message {
            out.push(Decoded::Token(delta.content));
        }
        if chunk.done {
            out.push(Decoded::End);
        }
        out
    }
}

impl ChunkDecoder for NdjsonDecoder {
    fn feed(&mut self, text: &str) -> Vec<Decoded> {
        self.buffer.push_str(text);
        let mut out = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim();
            if !line.is_empty() {
                out.extend(Self::decode_line(line));
            }
        }
        out
    }
}

#[async_trait]
impl TokenProvider for OllamaProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<TokenStream, ProviderError> {
        let body = OllamaChatRequest {
            model: &request.model,
            messages: [OllamaChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            stream: true,
        };

        debug!(model = %request.model, "Opening Ollama chat stream");

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::request(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(token_stream(
            PROVIDER,
            response.bytes_stream(),
            NdjsonDecoder::default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::tests::body;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_reads_lines_split_across_chunks() {
        let chunks: [&[u8]; 3] = [
            br#"{"message":{"role":"assistant","content":"Hel"},"done":false}
{"message":{"role":"assi"#,
            br#"stant","content":"lo"},"done":false}
"#,
            br#"{"message":{"role":"assistant","content":""},"done":true}
"#,
        ];
        let tokens: Vec<String> = token_stream(PROVIDER, body(&chunks), NdjsonDecoder::default())
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(tokens, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_error_line_fails_stream() {
        let chunks: [&[u8]; 1] = [b"{\"error\":\"model 'nope' not found\"}\n"];
        let items: Vec<_> = token_stream(PROVIDER, body(&chunks), NdjsonDecoder::default())
            .collect()
            .await;
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }
}
