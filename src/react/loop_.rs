//! 有界工具调用循环
//!
//! 每轮：调用 LLM（附工具）-> 若 stop_reason 不是 tool_use 则直接返回文本 ->
//! 否则按请求顺序逐个执行工具，把 tool_use 消息与对应的 tool_result 消息追加到对话。
//! 最多 max_rounds 轮；轮数用尽后再发一次不带工具的调用，强制模型给出总结。
//!
//! 失败处理：工具失败返回固定文案且不再调用 LLM；循环内传输失败降级为单次调用（只降级一次）。

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::config::LlmSection;
use crate::core::RagError;
use crate::llm::{
    ContentBlock, LlmClient, LlmError, Message, MessageRequest, MessageResponse, ToolCall,
    ToolChoice, ToolResult, ToolSchema,
};
use crate::react::prompt::{
    system_with_history, EMPTY_RESPONSE_APOLOGY, SYNTHESIS_FAILURE_MESSAGE, SYSTEM_PROMPT,
    TOOL_ERROR_MESSAGE,
};
use crate::react::ReactEvent;
use crate::tools::ToolDispatcher;

/// Observation 预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;

/// 每次请求共用的模型参数
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_rounds: usize,
}

impl From<&LlmSection> for GenerationParams {
    fn from(section: &LlmSection) -> Self {
        Self {
            model: section.model.clone(),
            temperature: section.temperature,
            max_tokens: section.max_tokens,
            max_rounds: section.max_rounds,
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::from(&LlmSection::default())
    }
}

/// 生成路径：带工具的多轮循环，或不带工具的单次调用。
/// 多轮循环遇到传输失败时切换到单次调用，单次调用是终态。
#[derive(Clone, Copy)]
enum GenerationPath<'a> {
    Sequential {
        tools: &'a [ToolSchema],
        dispatcher: &'a dyn ToolDispatcher,
    },
    SingleCall,
}

/// 回答生成器：持有 LLM、模型参数与系统提示词
pub struct AiGenerator {
    llm: Arc<dyn LlmClient>,
    params: GenerationParams,
    system_prompt: String,
    event_tx: Option<UnboundedSender<ReactEvent>>,
}

impl AiGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, params: GenerationParams) -> Self {
        Self {
            llm,
            params,
            system_prompt: SYSTEM_PROMPT.to_string(),
            event_tx: None,
        }
    }

    /// 设置事件推送通道
    pub fn with_event_tx(mut self, tx: UnboundedSender<ReactEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// 生成回答；任何路径都返回字符串，不向调用方抛错。
    /// 只有同时提供非空 tools 与 dispatcher 时才进入多轮工具循环。
    pub async fn generate_response(
        &self,
        query: &str,
        history: Option<&str>,
        tools: Option<&[ToolSchema]>,
        dispatcher: Option<&dyn ToolDispatcher>,
    ) -> String {
        let system = system_with_history(&self.system_prompt, history);

        let mut path = match (tools, dispatcher) {
            (Some(tools), Some(dispatcher)) if !tools.is_empty() => {
                GenerationPath::Sequential { tools, dispatcher }
            }
            _ => GenerationPath::SingleCall,
        };

        loop {
            let current = path;
            match current {
                GenerationPath::Sequential { tools, dispatcher } => {
                    match self.run_tool_rounds(query, &system, tools, dispatcher).await {
                        Ok(answer) => return self.finish(answer),
                        Err(e) => {
                            tracing::warn!(error = %e, "tool loop failed, falling back to single call");
                            self.send_event(ReactEvent::Fallback {
                                reason: e.to_string(),
                            });
                            path = GenerationPath::SingleCall;
                        }
                    }
                }
                GenerationPath::SingleCall => {
                    let answer = self.single_call(query, &system).await;
                    return self.finish(answer);
                }
            }
        }
    }

    /// 不带工具的单次调用；失败时返回致歉文案
    async fn single_call(&self, query: &str, system: &str) -> String {
        let request = self.request(system, vec![Message::user(query)], None);
        match self.llm.create_message(&request).await {
            Ok(response) => extract_text(&response),
            Err(e) => {
                tracing::warn!(error = %e, "single call failed");
                EMPTY_RESPONSE_APOLOGY.to_string()
            }
        }
    }

    /// 多轮工具循环；只有 LLM 传输失败会以 Err 返回（交由上层降级）
    async fn run_tool_rounds(
        &self,
        query: &str,
        system: &str,
        tools: &[ToolSchema],
        dispatcher: &dyn ToolDispatcher,
    ) -> Result<String, LlmError> {
        let max_rounds = self.params.max_rounds;
        let mut messages = vec![Message::user(query)];

        for round in 1..=max_rounds {
            self.send_event(ReactEvent::RoundStarted { round, max_rounds });

            let request = self.request(system, messages.clone(), Some(tools));
            let response = self.llm.create_message(&request).await?;

            if !response.is_tool_use() {
                return Ok(extract_text(&response));
            }

            let calls = response.tool_calls();
            if calls.is_empty() {
                tracing::warn!(round, "stop_reason tool_use without tool_use blocks");
                return Ok(extract_text(&response));
            }

            let results = match self.execute_round(&calls, dispatcher).await {
                Ok(results) => results,
                Err(e) => {
                    tracing::warn!(round, error = %e, "tool execution failed");
                    return Ok(TOOL_ERROR_MESSAGE.to_string());
                }
            };

            messages.push(Message::assistant(replayable_content(response.content)));
            messages.push(Message::tool_results(results));
        }

        self.send_event(ReactEvent::Synthesizing);
        let request = self.request(system, messages, None);
        match self.llm.create_message(&request).await {
            Ok(response) => Ok(extract_text(&response)),
            Err(e) => {
                tracing::warn!(error = %e, "final synthesis call failed");
                Ok(SYNTHESIS_FAILURE_MESSAGE.to_string())
            }
        }
    }

    /// 按请求顺序逐个执行；任一失败即中止本轮
    async fn execute_round(
        &self,
        calls: &[ToolCall],
        dispatcher: &dyn ToolDispatcher,
    ) -> Result<Vec<ToolResult>, RagError> {
        let mut seen_ids = HashSet::with_capacity(calls.len());
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            if !seen_ids.insert(call.id.as_str()) {
                tracing::warn!(id = %call.id, "duplicate tool_use id in one round");
            }
            self.send_event(ReactEvent::ToolCall {
                tool: call.name.clone(),
                input: call.input.clone(),
            });

            let content = match dispatcher.dispatch(&call.name, call.input.clone()).await {
                Ok(content) => content,
                Err(e) => {
                    self.send_event(ReactEvent::ToolFailure {
                        tool: call.name.clone(),
                        reason: e.to_string(),
                    });
                    return Err(e);
                }
            };

            self.send_event(ReactEvent::Observation {
                tool: call.name.clone(),
                preview: preview(&content),
            });
            results.push(ToolResult {
                tool_use_id: call.id.clone(),
                content,
            });
        }

        Ok(results)
    }

    fn request(
        &self,
        system: &str,
        messages: Vec<Message>,
        tools: Option<&[ToolSchema]>,
    ) -> MessageRequest {
        let tools = tools.filter(|t| !t.is_empty()).map(|t| t.to_vec());
        let tool_choice = tools.as_ref().map(|_| ToolChoice::Auto);
        MessageRequest {
            model: self.params.model.clone(),
            max_tokens: self.params.max_tokens,
            temperature: self.params.temperature,
            system: system.to_string(),
            messages,
            tools,
            tool_choice,
        }
    }

    fn finish(&self, answer: String) -> String {
        self.send_event(ReactEvent::Answer {
            text: answer.clone(),
        });
        answer
    }

    fn send_event(&self, ev: ReactEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(ev);
        }
    }
}

/// 取第一个文本块；内容为空时返回致歉文案
fn extract_text(response: &MessageResponse) -> String {
    response
        .first_text()
        .map(String::from)
        .unwrap_or_else(|| EMPTY_RESPONSE_APOLOGY.to_string())
}

/// 回写对话前去掉无法回放的未知块
fn replayable_content(content: Vec<ContentBlock>) -> Vec<ContentBlock> {
    content
        .into_iter()
        .filter(|b| !matches!(b, ContentBlock::Unsupported))
        .collect()
}

fn preview(content: &str) -> String {
    let p: String = content.chars().take(OBSERVATION_PREVIEW_CHARS).collect();
    if content.chars().count() > OBSERVATION_PREVIEW_CHARS {
        format!("{p}...")
    } else {
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLlmClient, Role};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    /// 记录调用顺序；名为 "explode" 的工具返回错误
    #[derive(Default)]
    struct RecordingDispatcher {
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl RecordingDispatcher {
        fn calls(&self) -> Vec<(String, Value)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ToolDispatcher for RecordingDispatcher {
        async fn dispatch(&self, name: &str, input: Value) -> Result<String, RagError> {
            self.calls.lock().unwrap().push((name.to_string(), input.clone()));
            if name == "explode" {
                return Err(RagError::ToolExecutionFailed {
                    tool: name.to_string(),
                    reason: "boom".to_string(),
                });
            }
            Ok(format!("result for {}", input["query"].as_str().unwrap_or("?")))
        }
    }

    fn tools() -> Vec<ToolSchema> {
        vec![ToolSchema {
            name: "search_course_content".to_string(),
            description: "Search course content".to_string(),
            input_schema: json!({"type": "object", "properties": {}, "required": []}),
        }]
    }

    fn search_call(id: &str, query: &str) -> MessageResponse {
        MessageResponse::tool_use([(id, "search_course_content", json!({"query": query}))])
    }

    fn generator(mock: &Arc<MockLlmClient>) -> AiGenerator {
        AiGenerator::new(mock.clone(), GenerationParams::default())
    }

    #[tokio::test]
    async fn test_without_tools_single_call_verbatim() {
        let mock = Arc::new(MockLlmClient::with_responses([MessageResponse::text(
            "This is a test response",
        )]));
        let out = generator(&mock).generate_response("What is AI?", None, None, None).await;

        assert_eq!(out, "This is a test response");
        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].tools.is_none());
        assert!(requests[0].tool_choice.is_none());
        assert_eq!(requests[0].model, "claude-sonnet-4-20250514");
        assert_eq!(requests[0].temperature, 0.0);
        assert_eq!(requests[0].max_tokens, 800);
    }

    #[tokio::test]
    async fn test_tools_without_dispatcher_is_single_call() {
        let mock = Arc::new(MockLlmClient::with_responses([MessageResponse::text("plain")]));
        let tools = tools();
        let out = generator(&mock)
            .generate_response("q", None, Some(&tools), None)
            .await;
        assert_eq!(out, "plain");
        assert!(mock.requests()[0].tools.is_none());
    }

    #[tokio::test]
    async fn test_general_question_terminates_early() {
        let mock = Arc::new(MockLlmClient::with_responses([MessageResponse::text("Paris")]));
        let dispatcher = RecordingDispatcher::default();
        let tools = tools();
        let out = generator(&mock)
            .generate_response("Capital of France?", None, Some(&tools), Some(&dispatcher))
            .await;

        assert_eq!(out, "Paris");
        assert_eq!(mock.call_count(), 1);
        assert!(dispatcher.calls().is_empty());
        let req = &mock.requests()[0];
        assert_eq!(req.tools.as_ref().map(|t| t.len()), Some(1));
        assert_eq!(req.tool_choice, Some(ToolChoice::Auto));
    }

    #[tokio::test]
    async fn test_one_round_then_answer() {
        let mock = Arc::new(MockLlmClient::with_responses([
            search_call("tool_123", "test query"),
            MessageResponse::text("Based on lesson 1, ML is..."),
        ]));
        let dispatcher = RecordingDispatcher::default();
        let tools = tools();
        let out = generator(&mock)
            .generate_response("What is ML?", None, Some(&tools), Some(&dispatcher))
            .await;

        assert_eq!(out, "Based on lesson 1, ML is...");
        assert_eq!(mock.call_count(), 2);
        assert_eq!(dispatcher.calls().len(), 1);
        assert_eq!(dispatcher.calls()[0].1, json!({"query": "test query"}));

        let second = &mock.requests()[1];
        assert_eq!(second.messages.len(), 3);
        assert_eq!(second.messages[1].role, Role::Assistant);
        assert_eq!(
            second.messages[2].content,
            vec![ContentBlock::ToolResult {
                tool_use_id: "tool_123".to_string(),
                content: "result for test query".to_string(),
            }]
        );
        assert!(second.tools.is_some());
    }

    #[tokio::test]
    async fn test_two_rounds_force_tool_free_synthesis() {
        let mock = Arc::new(MockLlmClient::with_responses([
            search_call("tool_1", "first"),
            search_call("tool_2", "second"),
            MessageResponse::text("Final synthesized answer"),
        ]));
        let dispatcher = RecordingDispatcher::default();
        let tools = tools();
        let out = generator(&mock)
            .generate_response("compare", None, Some(&tools), Some(&dispatcher))
            .await;

        assert_eq!(out, "Final synthesized answer");
        let requests = mock.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[0].tools.is_some());
        assert!(requests[1].tools.is_some());
        assert!(requests[2].tools.is_none());
        assert!(requests[2].tool_choice.is_none());
        assert_eq!(requests[2].messages.len(), 5);
        assert_eq!(dispatcher.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_multiple_calls_in_one_round_run_in_order() {
        let mock = Arc::new(MockLlmClient::with_responses([
            MessageResponse::tool_use([
                ("a", "search_course_content", json!({"query": "one"})),
                ("b", "search_course_content", json!({"query": "two"})),
            ]),
            MessageResponse::text("done"),
        ]));
        let dispatcher = RecordingDispatcher::default();
        let tools = tools();
        generator(&mock)
            .generate_response("q", None, Some(&tools), Some(&dispatcher))
            .await;

        let queries: Vec<_> = dispatcher.calls().iter().map(|(_, i)| i["query"].clone()).collect();
        assert_eq!(queries, vec![json!("one"), json!("two")]);

        let results = &mock.requests()[1].messages[2].content;
        let ids: Vec<_> = results
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_tool_error_stops_without_more_llm_calls() {
        let mock = Arc::new(MockLlmClient::with_responses([
            MessageResponse::tool_use([("t1", "explode", json!({}))]),
            MessageResponse::text("should never be requested"),
        ]));
        let dispatcher = RecordingDispatcher::default();
        let tools = tools();
        let out = generator(&mock)
            .generate_response("q", None, Some(&tools), Some(&dispatcher))
            .await;

        assert_eq!(
            out,
            "I encountered an error while searching. Please try rephrasing your question."
        );
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_tool_error_in_second_round() {
        let mock = Arc::new(MockLlmClient::with_responses([
            search_call("t1", "first"),
            MessageResponse::tool_use([("t2", "explode", json!({}))]),
        ]));
        let dispatcher = RecordingDispatcher::default();
        let tools = tools();
        let out = generator(&mock)
            .generate_response("q", None, Some(&tools), Some(&dispatcher))
            .await;
        assert_eq!(out, TOOL_ERROR_MESSAGE);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_transport_error_falls_back_to_single_call() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_error(LlmError::Network("connection reset".to_string()));
        mock.push_response(MessageResponse::text("fallback answer"));
        let dispatcher = RecordingDispatcher::default();
        let tools = tools();
        let out = generator(&mock)
            .generate_response("q", None, Some(&tools), Some(&dispatcher))
            .await;

        assert_eq!(out, "fallback answer");
        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].tools.is_none());
        assert_eq!(requests[1].messages, vec![Message::user("q")]);
    }

    #[tokio::test]
    async fn test_transport_error_mid_loop_discards_partial_rounds() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_response(search_call("t1", "first"));
        mock.push_error(LlmError::Timeout);
        mock.push_response(MessageResponse::text("fallback"));
        let dispatcher = RecordingDispatcher::default();
        let tools = tools();
        let out = generator(&mock)
            .generate_response("q", None, Some(&tools), Some(&dispatcher))
            .await;

        assert_eq!(out, "fallback");
        let requests = mock.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2].messages.len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_failure_returns_apology() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_error(LlmError::RateLimited);
        mock.push_error(LlmError::RateLimited);
        let dispatcher = RecordingDispatcher::default();
        let tools = tools();
        let out = generator(&mock)
            .generate_response("q", None, Some(&tools), Some(&dispatcher))
            .await;
        assert_eq!(out, EMPTY_RESPONSE_APOLOGY);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_synthesis_failure_message() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_response(search_call("t1", "a"));
        mock.push_response(search_call("t2", "b"));
        mock.push_error(LlmError::Api {
            status: 500,
            message: "overloaded".to_string(),
        });
        let dispatcher = RecordingDispatcher::default();
        let tools = tools();
        let out = generator(&mock)
            .generate_response("q", None, Some(&tools), Some(&dispatcher))
            .await;
        assert_eq!(out, SYNTHESIS_FAILURE_MESSAGE);
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_content_returns_apology() {
        let mock = Arc::new(MockLlmClient::with_responses([MessageResponse::default()]));
        let out = generator(&mock).generate_response("q", None, None, None).await;
        assert_eq!(out, EMPTY_RESPONSE_APOLOGY);
    }

    #[tokio::test]
    async fn test_empty_question_passes_through() {
        let mock = Arc::new(MockLlmClient::with_responses([MessageResponse::text(
            "Could you tell me what you would like to know?",
        )]));
        let dispatcher = RecordingDispatcher::default();
        let tools = tools();
        let out = generator(&mock)
            .generate_response("", None, Some(&tools), Some(&dispatcher))
            .await;

        assert_eq!(out, "Could you tell me what you would like to know?");
        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages, vec![Message::user("")]);
    }

    #[tokio::test]
    async fn test_duplicate_tool_use_ids_still_execute_each_call() {
        let mock = Arc::new(MockLlmClient::with_responses([
            MessageResponse::tool_use([
                ("dup", "search_course_content", json!({"query": "one"})),
                ("dup", "search_course_content", json!({"query": "two"})),
            ]),
            MessageResponse::text("done"),
        ]));
        let dispatcher = RecordingDispatcher::default();
        let tools = tools();
        let out = generator(&mock)
            .generate_response("q", None, Some(&tools), Some(&dispatcher))
            .await;

        assert_eq!(out, "done");
        assert_eq!(dispatcher.calls().len(), 2);
        assert_eq!(
            mock.requests()[1].messages[2].content,
            vec![
                ContentBlock::ToolResult {
                    tool_use_id: "dup".to_string(),
                    content: "result for one".to_string(),
                },
                ContentBlock::ToolResult {
                    tool_use_id: "dup".to_string(),
                    content: "result for two".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_history_goes_into_system_prompt() {
        let mock = Arc::new(MockLlmClient::with_responses([MessageResponse::text("ok")]));
        generator(&mock)
            .generate_response("q", Some("User: hi\nAssistant: hello"), None, None)
            .await;
        let system = &mock.requests()[0].system;
        assert!(system.starts_with("You are an AI assistant specialized in course materials"));
        assert!(system.ends_with("Previous conversation:\nUser: hi\nAssistant: hello"));
    }

    #[tokio::test]
    async fn test_events_trace_the_rounds() {
        let mock = Arc::new(MockLlmClient::with_responses([
            search_call("t1", "first"),
            MessageResponse::text("answer"),
        ]));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let ai = generator(&mock).with_event_tx(tx);
        let dispatcher = RecordingDispatcher::default();
        let tools = tools();
        ai.generate_response("q", None, Some(&tools), Some(&dispatcher)).await;
        drop(ai);

        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        assert_eq!(events[0], ReactEvent::RoundStarted { round: 1, max_rounds: 2 });
        assert!(matches!(events[1], ReactEvent::ToolCall { .. }));
        assert!(matches!(events[2], ReactEvent::Observation { .. }));
        assert_eq!(events[3], ReactEvent::RoundStarted { round: 2, max_rounds: 2 });
        assert_eq!(events.last(), Some(&ReactEvent::Answer { text: "answer".to_string() }));
    }
}
