use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};

use chatbox_core::{GenerationRequest, ProviderError, TokenProvider, TokenStream};

#[derive(Debug, Clone)]
enum Script {
    Fixed(Vec<String>),
    /// Stream the prompt back word by word.
    Echo,
}

/// A mock provider that streams canned tokens.
#[derive(Debug, Clone)]
pub struct MockProvider {
    name: String,
    script: Script,
    delay: Option<Duration>,
    fail_after: Option<usize>,
    fail_on_open: bool,
}

impl MockProvider {
    pub fn new<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            name: "mock".to_string(),
            script: Script::Fixed(tokens.into_iter().map(Into::into).collect()),
            delay: None,
            fail_after: None,
            fail_on_open: false,
        }
    }

    /// Streams `Echo: <prompt>` one word at a time.
    pub fn echo() -> Self {
        Self {
            script: Script::Echo,
            ..Self::new(Vec::<String>::new())
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Yield `count` tokens, then a mid-stream error.
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Refuse to open the stream at all.
    pub fn failing_on_open(mut self) -> Self {
        self.fail_on_open = true;
        self
    }

    fn tokens_for(&self, prompt: &str) -> Vec<String> {
        match &self.script {
            Script::Fixed(tokens) => tokens.clone(),
            Script::Echo => {
                let mut tokens = vec!["Echo:".to_string()];
                tokens.extend(prompt.split_whitespace().map(|w| format!(" {w}")));
                tokens
            }
        }
    }
}

#[async_trait]
impl TokenProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<TokenStream, ProviderError> {
        if self.fail_on_open {
            return Err(ProviderError::request(&self.name, "connection refused"));
        }

        let mut items: Vec<Result<String, ProviderError>> =
            self.tokens_for(&request.prompt).into_iter().map(Ok).collect();
        if let Some(count) = self.fail_after {
            items.truncate(count);
            items.push(Err(ProviderError::stream(&self.name, "mock upstream failure")));
        }

        let delay = self.delay;
        Ok(Box::pin(stream::iter(items).then(move |item| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            item
        })))
    }
}
