//! 工具循环过程事件：用于日志 / 前端展示轮次、工具调用、观察与降级

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactEvent {
    /// 进入第几轮（从 1 开始）
    RoundStarted { round: usize, max_rounds: usize },
    /// 调用工具
    ToolCall {
        tool: String,
        input: serde_json::Value,
    },
    /// 工具返回（预览，避免过长）
    Observation { tool: String, preview: String },
    /// 工具执行失败，本次提问终止
    ToolFailure { tool: String, reason: String },
    /// 轮数用尽，发起不带工具的总结调用
    Synthesizing,
    /// 工具循环传输失败，降级为单次调用
    Fallback { reason: String },
    /// 最终回复
    Answer { text: String },
}
