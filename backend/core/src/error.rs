use thiserror::Error;

/// A frame on the wire that could not be interpreted.
///
/// Consumers skip these and keep reading; they never end a stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("frame is missing the `data:` prefix: {0:?}")]
    MissingDataPrefix(String),

    #[error("frame carries an empty payload")]
    EmptyPayload,

    #[error("stream ended inside a frame ({0} bytes buffered)")]
    Truncated(usize),
}

/// Failure of the upstream token-producing service.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} request failed: {message}")]
    Request { provider: String, message: String },

    #[error("{provider} returned {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider} stream failed: {message}")]
    Stream { provider: String, message: String },

    #[error("no provider registered for model '{0}'")]
    UnknownProvider(String),
}

impl ProviderError {
    pub fn request(provider: impl Into<String>, message: impl ToString) -> Self {
        Self::Request {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    pub fn stream(provider: impl Into<String>, message: impl ToString) -> Self {
        Self::Stream {
            provider: provider.into(),
            message: message.to_string(),
        }
    }
}

/// Failure of the client-side connection to the producer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request could not be sent: {0}")]
    Connect(String),

    #[error("server responded {status}: {message}")]
    Status { status: u16, message: String },

    #[error("stream interrupted: {0}")]
    Interrupted(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::Status {
            provider: "openai".into(),
            status: 429,
            body: "rate limited".into(),
        };
        assert_eq!(err.to_string(), "openai returned 429: rate limited");
    }

    #[test]
    fn test_protocol_error_display() {
        assert_eq!(
            ProtocolError::Truncated(7).to_string(),
            "stream ended inside a frame (7 bytes buffered)"
        );
    }
}
