//! 问答门面：组装存储、工具注册表、回答生成器与会话历史
//!
//! 一次 query 的顺序：分配会话 -> 清空来源 -> 读历史 -> 生成回答 -> 取出并清空来源 -> 记录问答对。

use std::sync::Arc;

use serde::Serialize;

use crate::config::AppConfig;
use crate::core::RagError;
use crate::llm::{create_embedder_from_config, create_llm_from_config, LlmClient};
use crate::memory::ConversationMemory;
use crate::react::{AiGenerator, GenerationParams, ReactEvent};
use crate::store::{CourseStore, InMemoryCourseStore};
use crate::tools::{CourseOutlineTool, CourseSearchTool, Source, SourceLedger, ToolRegistry};

/// 一次问答的结果
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub session_id: String,
}

/// 课程统计
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

pub struct RagSystem {
    generator: AiGenerator,
    tools: ToolRegistry,
    store: Arc<dyn CourseStore>,
    memory: ConversationMemory,
}

impl RagSystem {
    /// 注册检索与大纲两个工具；来源账本由注册表与检索工具共享
    pub fn new(
        llm: Arc<dyn LlmClient>,
        store: Arc<dyn CourseStore>,
        config: &AppConfig,
    ) -> Result<Self, RagError> {
        let sources = SourceLedger::new();
        let mut tools = ToolRegistry::with_sources(sources.clone());
        tools.register(CourseSearchTool::new(store.clone(), sources))?;
        tools.register(CourseOutlineTool::new(store.clone()))?;

        Ok(Self {
            generator: AiGenerator::new(llm, GenerationParams::from(&config.llm)),
            tools,
            store,
            memory: ConversationMemory::new(config.app.max_history),
        })
    }

    /// 按配置构建全部组件；配置了 snapshot_path 时从快照加载语料，失败为 RagError::Store
    pub async fn from_config(config: &AppConfig) -> Result<Self, RagError> {
        let llm = create_llm_from_config(&config.llm);
        let embedder = create_embedder_from_config(&config.embedding);
        let store = match &config.store.snapshot_path {
            Some(path) => {
                InMemoryCourseStore::load_snapshot(path, embedder, config.store.max_results)
                    .await
                    .map_err(|e| RagError::Store(format!("{}: {e:#}", path.display())))?
            }
            None => InMemoryCourseStore::new(embedder, config.store.max_results),
        };
        tracing::info!(
            provider = %config.llm.provider,
            model = %config.llm.model,
            courses = store.course_count().await,
            "rag system ready"
        );
        Self::new(llm, Arc::new(store), config)
    }

    /// 过程事件推送到给定通道（轮次、工具调用、降级）
    pub fn with_event_tx(mut self, tx: tokio::sync::mpsc::UnboundedSender<ReactEvent>) -> Self {
        self.generator = self.generator.with_event_tx(tx);
        self
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn store(&self) -> &Arc<dyn CourseStore> {
        &self.store
    }

    /// 回答一个问题；session_id 为空时新建会话
    pub async fn query(&self, question: &str, session_id: Option<&str>) -> QueryResponse {
        let session_id = match session_id {
            Some(id) => id.to_string(),
            None => self.memory.create_session(),
        };

        self.tools.reset_sources();

        let prompt = format!("Answer this question about course materials: {question}");
        let history = self.memory.history(Some(&session_id));
        let definitions = self.tools.definitions();

        let answer = self
            .generator
            .generate_response(&prompt, history.as_deref(), Some(&definitions), Some(&self.tools))
            .await;

        let sources = self.tools.last_sources();
        self.tools.reset_sources();

        self.memory.add_exchange(&session_id, question, answer.clone());
        tracing::debug!(session = %session_id, sources = sources.len(), "query answered");

        QueryResponse {
            answer,
            sources,
            session_id,
        }
    }

    pub async fn course_analytics(&self) -> CourseAnalytics {
        let course_titles = self.store.course_titles().await;
        CourseAnalytics {
            total_courses: course_titles.len(),
            course_titles,
        }
    }
}
