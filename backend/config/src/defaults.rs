//! Default values for every config field.

/// Default HTTP bind address.
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 5000;

pub use chatbox_core::DEFAULT_MODEL;

/// Seconds of upstream silence before a keepalive frame.
pub const DEFAULT_KEEPALIVE_SECS: u64 = 15;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Producer endpoint the consumer talks to.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/api/chat";

/// Max characters of a title derived from the first prompt.
pub const DEFAULT_TITLE_MAX_CHARS: usize = 30;

pub const DEFAULT_LOG_LEVEL: &str = "info";
