//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / input_schema / execute），由 ToolRegistry 按名注册与分发。
//! 检索类工具把引用来源写入共享的 SourceLedger，由调用方在每次提问前显式清空。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::RagError;
use crate::llm::ToolSchema;

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（input 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（对应 tool_use 块的 name）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认无参数
    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 完整声明，原样发送给 LLM
    fn definition(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }

    /// 执行工具；Err 表示工具本身失败（如参数不合法），业务上的“没找到”以 Ok 文本返回
    async fn execute(&self, input: Value) -> Result<String, String>;
}

/// 引用来源：展示文本 + 可选课时链接
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Source {
    pub fn new(text: impl Into<String>, link: Option<String>) -> Self {
        Self {
            text: text.into(),
            link,
        }
    }
}

/// 最近一次检索产生的来源；每次检索整体覆盖，不做合并
#[derive(Clone, Debug, Default)]
pub struct SourceLedger {
    inner: Arc<Mutex<Vec<Source>>>,
}

impl SourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, sources: Vec<Source>) {
        if let Ok(mut inner) = self.inner.lock() {
            *inner = sources;
        }
    }

    pub fn snapshot(&self) -> Vec<Source> {
        self.inner.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.clear();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().map(|s| s.is_empty()).unwrap_or(true)
    }
}

/// 生成器眼中的工具分发方：按名执行，返回喂回 LLM 的文本
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    async fn dispatch(&self, name: &str, input: Value) -> Result<String, RagError>;
}

/// 工具注册表：按注册顺序保存工具，同名后注册者覆盖先注册者（保留原位置）
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
    sources: SourceLedger,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用外部传入的来源账本（与检索工具共享同一个实例）
    pub fn with_sources(sources: SourceLedger) -> Self {
        Self {
            sources,
            ..Default::default()
        }
    }

    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), RagError> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), RagError> {
        let name = tool.definition().name;
        if name.trim().is_empty() {
            return Err(RagError::MissingToolName);
        }
        match self.index.get(&name) {
            Some(&idx) => {
                tracing::debug!(tool = %name, "tool re-registered, replacing previous");
                self.tools[idx] = tool;
            }
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&idx| self.tools[idx].clone())
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 所有工具声明，按注册顺序
    pub fn definitions(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// 按名执行；未知工具返回 `Tool '<name>' not found` 文本，工具失败转为 ToolExecutionFailed。
    /// 每次调用输出结构化审计日志（JSON）。
    pub async fn execute(&self, name: &str, input: Value) -> Result<String, RagError> {
        let Some(tool) = self.get(name) else {
            tracing::warn!(tool = %name, "unknown tool requested");
            return Ok(format!("Tool '{name}' not found"));
        };

        let start = Instant::now();
        let args_preview = args_preview(&input);
        let result = tool.execute(input).await;

        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": name,
            "ok": result.is_ok(),
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        result.map_err(|reason| RagError::ToolExecutionFailed {
            tool: name.to_string(),
            reason,
        })
    }

    pub fn sources(&self) -> &SourceLedger {
        &self.sources
    }

    /// 最近一次检索的来源
    pub fn last_sources(&self) -> Vec<Source> {
        self.sources.snapshot()
    }

    pub fn reset_sources(&self) {
        self.sources.clear();
    }
}

#[async_trait]
impl ToolDispatcher for ToolRegistry {
    async fn dispatch(&self, name: &str, input: Value) -> Result<String, RagError> {
        self.execute(name, input).await
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
