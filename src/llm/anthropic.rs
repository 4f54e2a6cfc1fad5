//! Anthropic Messages API 客户端
//!
//! POST {base_url}/v1/messages，x-api-key + anthropic-version 头；非 2xx 映射为 LlmError，
//! 成功响应直接反序列化为 MessageResponse 并累计 token 使用。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::llm::{LlmClient, LlmError, MessageRequest, MessageResponse, TokenUsage};

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Messages API 客户端：持有 HTTP Client、端点与 API Key
pub struct AnthropicClient {
    http: Client,
    base_url: String,
    api_key: String,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl AnthropicClient {
    /// api_key 未传时读取环境变量 ANTHROPIC_API_KEY
    pub fn new(base_url: Option<&str>, api_key: Option<&str>, timeout_secs: u64) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .unwrap_or_else(|| "sk-ant-placeholder".to_string());

        let base_url = base_url
            .unwrap_or(ANTHROPIC_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url,
            api_key,
            usage: TokenUsage::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn create_message(&self, request: &MessageRequest) -> Result<MessageResponse, LlmError> {
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.has_tools(),
            "messages api request"
        );

        let response = self
            .http
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: text.chars().take(200).collect(),
            });
        }

        let parsed: MessageResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        if let Some(usage) = &parsed.usage {
            self.usage.add(usage.input_tokens, usage.output_tokens);
        }

        Ok(parsed)
    }
}
