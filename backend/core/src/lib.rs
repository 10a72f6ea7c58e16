pub mod error;
pub mod frame;
pub mod traits;
pub mod types;
pub mod utf8;
pub mod wire;

pub use error::{ProtocolError, ProviderError, TransportError};
pub use frame::{FrameEvent, FrameParser};
pub use traits::{ConversationHandle, GenerationRequest, TokenProvider, TokenStream};
pub use types::{derive_title, Conversation, Message, MessageStatus, Role};
pub use utf8::Utf8Decoder;
pub use wire::{ChatRequest, ErrorBody, DEFAULT_MODEL};
