//! 课程向量存储：检索边界（trait）、检索结果与内存实现

pub mod memory;
pub mod models;

use async_trait::async_trait;

pub use memory::{CorpusSnapshot, InMemoryCourseStore};
pub use models::{Course, CourseChunk, Lesson};

/// 一次内容检索的查询条件
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchQuery {
    pub query: String,
    /// 课程名（可部分匹配，先解析为完整标题）
    pub course_name: Option<String>,
    pub lesson_number: Option<u32>,
    /// 未设置时用存储的 max_results
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn course(mut self, course_name: impl Into<String>) -> Self {
        self.course_name = Some(course_name.into());
        self
    }

    pub fn lesson(mut self, lesson_number: u32) -> Self {
        self.lesson_number = Some(lesson_number);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// 命中片段的元数据；course_title 缺失时按 "unknown" 展示
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkMetadata {
    pub course_title: Option<String>,
    pub lesson_number: Option<u32>,
}

/// 检索结果：documents / metadata / distances 三个并行数组，或一条错误
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchResults {
    pub documents: Vec<String>,
    pub metadata: Vec<ChunkMetadata>,
    pub distances: Vec<f32>,
    pub error: Option<String>,
}

impl SearchResults {
    /// 空结果并附带错误说明
    pub fn empty(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn push(&mut self, document: String, metadata: ChunkMetadata, distance: f32) {
        self.documents.push(document);
        self.metadata.push(metadata);
        self.distances.push(distance);
    }
}

/// 课程存储边界：内容检索、课程名解析、课程元数据
#[async_trait]
pub trait CourseStore: Send + Sync {
    /// 按查询检索片段；课程名无法解析时返回 `No course found matching '<name>'` 错误结果
    async fn search(&self, query: &SearchQuery) -> SearchResults;

    /// 将部分 / 模糊课程名解析为最匹配的完整标题
    async fn resolve_course_name(&self, course_name: &str) -> Option<String>;

    async fn lesson_link(&self, course_title: &str, lesson_number: u32) -> Option<String>;

    async fn course_metadata(&self, course_title: &str) -> Option<Course>;

    async fn course_titles(&self) -> Vec<String>;

    async fn course_count(&self) -> usize {
        self.course_titles().await.len()
    }
}
