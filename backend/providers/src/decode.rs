//! Turning an upstream HTTP body into a token stream.
//!
//! Providers differ only in how decoded text maps to tokens, so each one
//! supplies a [`ChunkDecoder`] and shares the byte pump below.

use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use futures::{stream, Stream, StreamExt};

use chatbox_core::{ProviderError, TokenStream, Utf8Decoder};

/// What a decoder found in a piece of upstream text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Token(String),
    /// Upstream signalled normal completion.
    End,
    /// Upstream reported an error inside the stream.
    Failed(String),
}

/// Provider-specific interpretation of upstream body text.
pub trait ChunkDecoder: Send + 'static {
    /// Consume the next piece of decoded text, in order.
    fn feed(&mut self, text: &str) -> Vec<Decoded>;
}

struct PumpState<S, D> {
    bytes: Pin<Box<S>>,
    utf8: Utf8Decoder,
    decoder: D,
    queue: VecDeque<Result<String, ProviderError>>,
    finished: bool,
}

/// Adapt an upstream byte stream into tokens.
///
/// Empty tokens are dropped. The stream ends after `End`, after the first
/// error, or when the body closes.
pub fn token_stream<S, D>(provider: &'static str, bytes: S, decoder: D) -> TokenStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    D: ChunkDecoder,
{
    let state = PumpState {
        bytes: Box::pin(bytes),
        utf8: Utf8Decoder::new(),
        decoder,
        queue: VecDeque::new(),
        finished: false,
    };

    Box::pin(stream::unfold(state, move |mut st| async move {
        loop {
            if let Some(item) = st.queue.pop_front() {
                return Some((item, st));
            }
            if st.finished {
                return None;
            }

            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    let text = st.utf8.decode(&chunk);
                    for decoded in st.decoder.feed(&text) {
                        match decoded {
                            Decoded::Token(token) if token.is_empty() => {}
                            Decoded::Token(token) => st.queue.push_back(Ok(token)),
                            Decoded::End => {
                                st.finished = true;
                                break;
                            }
                            Decoded::Failed(message) => {
                                st.queue.push_back(Err(ProviderError::stream(provider, message)));
                                st.finished = true;
                                break;
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    st.queue.push_back(Err(ProviderError::stream(provider, e)));
                    st.finished = true;
                }
                None => st.finished = true,
            }
        }
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Body chunks as reqwest would yield them.
    pub(crate) fn body(chunks: &[&[u8]]) -> impl Stream<Item = Result<Bytes, reqwest::Error>> {
        let owned: Vec<Result<Bytes, reqwest::Error>> = chunks
            .iter()
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        stream::iter(owned)
    }

    /// Splits on `|` for easy scripting.
    struct PipeDecoder;

    impl ChunkDecoder for PipeDecoder {
        fn feed(&mut self, text: &str) -> Vec<Decoded> {
            text.split('|')
                .map(|part| match part {
                    "END" => Decoded::End,
                    "FAIL" => Decoded::Failed("scripted".into()),
                    other => Decoded::Token(other.to_string()),
                })
                .collect()
        }
    }

    #[tokio::test]
    async fn test_stops_at_end_marker() {
        let tokens: Vec<_> = token_stream("test", body(&[b"a|b", b"|END|c"]), PipeDecoder)
            .collect()
            .await;
        let tokens: Vec<String> = tokens.into_iter().map(Result::unwrap).collect();
        assert_eq!(tokens, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_failure_is_last_item() {
        let items: Vec<_> = token_stream("test", body(&[b"a|FAIL|b"]), PipeDecoder)
            .collect()
            .await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "a");
        assert!(matches!(items[1], Err(ProviderError::Stream { .. })));
    }
}
