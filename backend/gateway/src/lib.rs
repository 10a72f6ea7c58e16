//! Chatbox Gateway HTTP API Server
//!
//! Accepts a prompt, opens an upstream generation, and relays its tokens to the
//! caller as `data:` frames.

pub mod chat;
pub mod error;
pub mod health;
pub mod server;

pub use error::ApiError;
pub use server::{build_router, start_server, GatewayState};
