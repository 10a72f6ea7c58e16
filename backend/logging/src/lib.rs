//! Telemetry and structured logging for chatbox.
//!
//! Console output, optional rolling NDJSON files, and redaction of secrets
//! that may appear in upstream error bodies.

pub mod logger;
pub mod redact;

pub use logger::{init_logger, LoggerOptions};
pub use redact::redact_sensitive_data;
