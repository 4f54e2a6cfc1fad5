//! course_rag - 课程资料检索增强问答
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、问答门面 RagSystem
//! - **llm**: Messages API 类型、LLM 客户端（Anthropic / Mock）、嵌入
//! - **memory**: 按会话的对话历史
//! - **observability**: tracing 初始化
//! - **react**: 有界工具调用循环与系统提示词
//! - **store**: 课程存储边界与内存实现
//! - **tools**: 工具注册表、内容检索与课程大纲工具

pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod store;
pub mod tools;

pub use crate::core::{QueryResponse, RagError, RagSystem};
