//! 课程内容检索工具（search_course_content）
//!
//! 课程名先经向量近邻解析为完整标题，再按课程 / 课时过滤检索；
//! 每个片段加 `[课程 - Lesson N]` 头，空行分隔，并为每个片段记录一条来源（含课时链接）。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::store::{CourseStore, SearchQuery, SearchResults};
use crate::tools::schema::{input_schema_for, SearchCourseArgs};
use crate::tools::{Source, SourceLedger, Tool};

pub const SEARCH_TOOL_NAME: &str = "search_course_content";

const UNKNOWN_COURSE: &str = "unknown";

/// 检索工具：持有课程存储与共享的来源账本
pub struct CourseSearchTool {
    store: Arc<dyn CourseStore>,
    sources: SourceLedger,
}

impl CourseSearchTool {
    pub fn new(store: Arc<dyn CourseStore>, sources: SourceLedger) -> Self {
        Self { store, sources }
    }

    /// 执行检索并格式化；错误与空结果都返回给 LLM 可读的文本。
    /// 空课程名视为不过滤；超出课时编号范围的值（如负数）不会命中任何片段。
    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<i64>,
    ) -> String {
        let course_name = course_name.filter(|name| !name.is_empty());
        let lesson_filter = lesson_number.map(|n| u32::try_from(n).ok());

        let mut q = SearchQuery::new(query);
        q.course_name = course_name.map(String::from);
        q.lesson_number = lesson_filter.flatten();

        let mut results = self.store.search(&q).await;

        if let Some(error) = results.error {
            return error;
        }
        if matches!(lesson_filter, Some(None)) {
            results = SearchResults::default();
        }

        if results.is_empty() {
            let mut filter_info = String::new();
            if let Some(name) = course_name {
                filter_info.push_str(&format!(" in course '{name}'"));
            }
            if let Some(n) = lesson_number.filter(|&n| n != 0) {
                filter_info.push_str(&format!(" in lesson {n}"));
            }
            return format!("No relevant content found{filter_info}.");
        }

        self.format_results(results).await
    }

    async fn format_results(&self, results: SearchResults) -> String {
        let mut formatted = Vec::with_capacity(results.len());
        let mut sources = Vec::with_capacity(results.len());

        for (doc, meta) in results.documents.iter().zip(results.metadata.iter()) {
            let course_title = meta.course_title.as_deref().unwrap_or(UNKNOWN_COURSE);

            let label = match meta.lesson_number {
                Some(n) => format!("{course_title} - Lesson {n}"),
                None => course_title.to_string(),
            };

            let link = match meta.lesson_number {
                Some(n) if meta.course_title.is_some() => self.store.lesson_link(course_title, n).await,
                _ => None,
            };

            formatted.push(format!("[{label}]\n{doc}"));
            sources.push(Source::new(label, link));
        }

        self.sources.replace(sources);
        formatted.join("\n\n")
    }
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn name(&self) -> &str {
        SEARCH_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search course materials with smart course name matching and lesson filtering"
    }

    fn input_schema(&self) -> Value {
        input_schema_for::<SearchCourseArgs>()
    }

    async fn execute(&self, input: Value) -> Result<String, String> {
        let args: SearchCourseArgs =
            serde_json::from_value(input).map_err(|e| format!("Invalid arguments: {e}"))?;
        tracing::info!(
            query = %args.query,
            course = ?args.course_name,
            lesson = ?args.lesson_number,
            "course search"
        );
        Ok(self
            .search(&args.query, args.course_name.as_deref(), args.lesson_number)
            .await)
    }
}
