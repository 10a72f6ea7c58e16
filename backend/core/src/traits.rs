use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use uuid::Uuid;

use crate::error::ProviderError;
use crate::types::Conversation;

/// Incremental tokens from an upstream generation call.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// One prompt sent to one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
}

/// An upstream service that turns a prompt into a stream of tokens.
///
/// `stream` resolves once the upstream call is established. Errors returned
/// from it happen before any token exists; errors yielded by the stream
/// happen mid-generation.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Provider name (e.g., "openai", "ollama").
    fn name(&self) -> &str;

    /// Open one generation call.
    async fn stream(&self, request: &GenerationRequest) -> Result<TokenStream, ProviderError>;
}

/// Mutable access to conversations owned by someone else.
///
/// Each call runs under the owner's lock, so an update closure is applied
/// atomically with respect to every other update.
pub trait ConversationHandle: Send + Sync {
    /// Apply `f` to the active conversation. Returns its id, or `None` if there is none.
    fn update_active(&self, f: &mut dyn FnMut(&mut Conversation)) -> Option<Uuid>;

    /// Apply `f` to conversation `id`. Returns `false` if it no longer exists.
    fn update(&self, id: Uuid, f: &mut dyn FnMut(&mut Conversation)) -> bool;

    /// Hook invoked when a generation starts and ends.
    fn checkpoint(&self) {}
}
