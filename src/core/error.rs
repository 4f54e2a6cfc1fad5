//! 核心错误类型
//!
//! RagError 覆盖工具注册、工具执行与语料加载；LLM 传输层错误见 llm::LlmError。
//! 生成器对外永远返回字符串，工具错误只在组件之间流动，由生成器转为面向用户的文案。

use thiserror::Error;

/// 问答流程中可能出现的错误
#[derive(Error, Debug)]
pub enum RagError {
    /// 工具 schema 缺少 name
    #[error("Tool must have a 'name' in its definition")]
    MissingToolName,

    #[error("Tool execution failed: {tool}: {reason}")]
    ToolExecutionFailed { tool: String, reason: String },

    /// 语料快照读取或解析失败
    #[error("Store error: {0}")]
    Store(String),
}
