use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use chatbox_core::frame::FrameEvent;
use chatbox_core::{FrameParser, GenerationRequest, ProviderError, TokenProvider, TokenStream};

use crate::decode::{token_stream, ChunkDecoder, Decoded};

const PROVIDER: &str = "openai";

/// OpenAI-compatible streaming chat completions provider.
pub struct OpenAiProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<UpstreamError>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Deserialize, Default)]
struct Delta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct UpstreamError {
    message: String,
}

/// Reads `data: {chunk json}` events and pulls out `choices[0].delta.content`.
#[derive(Default)]
struct SseChunkDecoder {
    frames: FrameParser,
}

impl ChunkDecoder for SseChunkDecoder {
    fn feed(&mut self, text: &str) -> Vec<Decoded> {
        let mut out = Vec::new();
        for frame in self.frames.push(text) {
            match frame {
                Ok(FrameEvent::Token(payload)) => {
                    match serde_json::from_str::<ChatCompletionChunk>(&payload) {
                        Ok(ChatCompletionChunk {
                            error: Some(err), ..
                        }) => out.push(Decoded::Failed(err.message)),
                        Ok(chunk) => {
                            if let Some(content) = chunk
                                .choices
                                .into_iter()
                                .next()
                                .and_then(|c| c.delta.content)
                            {
                                out.push(Decoded::Token(content));
                            }
                        }
                        Err(e) => debug!(error = %e, "Skipping unparsable OpenAI chunk"),
                    }
                }
                Ok(FrameEvent::Done) => out.push(Decoded::End),
                Ok(FrameEvent::Error(message)) => out.push(Decoded::Failed(message)),
                Ok(FrameEvent::Keepalive) => {}
                Err(e) => debug!(error = %e, "Skipping malformed OpenAI frame"),
            }
        }
        out
    }
}

#[async_trait]
impl TokenProvider for OpenAiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<TokenStream, ProviderError> {
        let body = ChatRequest {
            model: &request.model,
            messages: [ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            stream: true,
        };

        debug!(model = %request.model, "Opening OpenAI completion stream");

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
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
            SseChunkDecoder::default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::tests::body;
    use futures::StreamExt;

    fn chunk(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"index": 0, "delta": {"content": content}}]})
        )
    }

    #[tokio::test]
    async fn test_extracts_delta_content_across_chunks() {
        let role = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        let wire = format!("{role}\n\n{}{}data: [DONE]\n\n", chunk("Bon"), chunk("jour ☕"));
        let bytes = wire.as_bytes();
        let (a, b) = bytes.split_at(bytes.len() - 20);

        let tokens: Vec<String> = token_stream(PROVIDER, body(&[a, b]), SseChunkDecoder::default())
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(tokens, vec!["Bon", "jour ☕"]);
    }

    #[tokio::test]
    async fn test_error_object_fails_stream() {
        let wire = format!(
            "{}data: {{\"error\":{{\"message\":\"overloaded\"}}}}\n\n",
            chunk("partial")
        );
        let items: Vec<_> = token_stream(
            PROVIDER,
            body(&[wire.as_bytes()]),
            SseChunkDecoder::default(),
        )
        .collect()
        .await;
        assert_eq!(items[0].as_ref().unwrap(), "partial");
        assert!(items[1].as_ref().unwrap_err().to_string().contains("overloaded"));
    }
}
