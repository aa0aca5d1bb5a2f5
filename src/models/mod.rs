pub mod http;

pub use http::{HttpChatModel, HttpModelConfig};

/// External chat-completion capability. Definition and translation resolution
/// degrade per-item when a call fails; they never propagate these errors.
pub trait ChatModel: Send + Sync {
    fn chat(&self, prompt: &str) -> anyhow::Result<String>;
}
