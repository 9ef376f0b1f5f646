use serde::Deserialize;
use serde_json::Value;

/// The fields the proxy inspects. Everything else is forwarded untouched
/// because the raw body, not this struct, goes upstream.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub messages: Vec<Value>,
    pub stream: Option<bool>,
}

impl ChatCompletionRequest {
    pub fn is_streaming(&self) -> bool {
        self.stream.unwrap_or(false)
    }
}
