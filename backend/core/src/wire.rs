//! JSON bodies exchanged between the consumer and the producer.

use serde::{Deserialize, Serialize};

/// Model used when a request names none.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// `POST /api/chat` request body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            model: Some(model.into()),
        }
    }
}

/// Non-streaming error response body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_is_optional() {
        let req: ChatRequest = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert_eq!(req.model, None);
        assert_eq!(
            serde_json::to_string(&ChatRequest::new("hi", "gpt-4o")).unwrap(),
            r#"{"message":"hi","model":"gpt-4o"}"#
        );
    }
}
