//! LLM 层：Messages API 类型、客户端抽象与实现（Anthropic / Mock）、嵌入

pub mod anthropic;
pub mod embedding;
pub mod mock;
pub mod traits;
pub mod types;

use std::sync::Arc;

use crate::config::LlmSection;

pub use anthropic::{AnthropicClient, ANTHROPIC_BASE_URL, ANTHROPIC_VERSION};
pub use embedding::{
    cosine_similarity, create_embedder_from_config, EmbeddingProvider, HashingEmbedder,
    OpenAiEmbedder,
};
pub use mock::MockLlmClient;
pub use traits::{LlmClient, LlmError, TokenUsage};
pub use types::{
    ContentBlock, Message, MessageRequest, MessageResponse, Role, StopReason, ToolCall,
    ToolChoice, ToolResult, ToolSchema, Usage,
};

/// 按 [llm].provider 创建客户端：mock 用于离线演示，其余走 Anthropic Messages API
pub fn create_llm_from_config(section: &LlmSection) -> Arc<dyn LlmClient> {
    match section.provider.as_str() {
        "mock" => {
            tracing::info!("using mock llm client");
            Arc::new(MockLlmClient::new())
        }
        other => {
            if other != "anthropic" {
                tracing::warn!(provider = %other, "unknown llm provider, using anthropic");
            }
            Arc::new(AnthropicClient::new(
                section.base_url.as_deref(),
                section.api_key.as_deref(),
                section.timeouts.request,
            ))
        }
    }
}
