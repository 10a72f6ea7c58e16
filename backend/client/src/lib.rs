//! Chatbox client: reads the framed token stream and folds it into
//! conversation state.

pub mod controller;
pub mod store;
pub mod transport;
pub mod workspace;

pub use controller::{
    ChatController, ControllerOptions, Generation, GenerationEvent, GenerationOutcome,
    FAILURE_NOTICE,
};
pub use store::{AppState, JsonFileStore, MemoryStore, StateStore, StoreError, Theme};
pub use transport::{ByteStream, HttpTransport, Transport};
pub use workspace::Workspace;
