//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序弹出预设响应；队列耗尽后回显最后一条 User 文本，便于本地跑通问答流程。
//! 每次调用都会记录请求，测试可据此断言调用次数与是否附带工具。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{ContentBlock, LlmClient, LlmError, MessageRequest, MessageResponse, Role};

/// Mock 客户端：脚本化响应 + 请求记录
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<MessageResponse, LlmError>>>,
    requests: Mutex<Vec<MessageRequest>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预设一组成功响应
    pub fn with_responses(responses: impl IntoIterator<Item = MessageResponse>) -> Self {
        let mock = Self::new();
        for r in responses {
            mock.push_response(r);
        }
        mock
    }

    pub fn push_response(&self, response: MessageResponse) {
        self.push_result(Ok(response));
    }

    pub fn push_error(&self, error: LlmError) {
        self.push_result(Err(error));
    }

    fn push_result(&self, result: Result<MessageResponse, LlmError>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(result);
        }
    }

    /// 已收到的请求（按调用顺序）
    pub fn requests(&self) -> Vec<MessageRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

fn echo_last_user(request: &MessageRequest) -> MessageResponse {
    let last_user = request
        .messages
        .iter()
        .rev()
        .filter(|m| m.role == Role::User)
        .find_map(|m| {
            m.content.iter().find_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
        })
        .unwrap_or("(no input)");
    MessageResponse::text(format!("Echo from Mock: {last_user}"))
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn create_message(&self, request: &MessageRequest) -> Result<MessageResponse, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(result) => result,
            None => Ok(echo_last_user(request)),
        }
    }
}
