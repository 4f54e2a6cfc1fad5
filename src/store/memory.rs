//! 内存课程存储
//!
//! 两个集合：课程目录（标题向量，用于课程名解析）与课程内容（片段向量，用于检索）。
//! 检索先按课程 / 课时精确过滤，再按余弦相似度排序取前 k 条；distance = 1 - cosine。
//! 语料可保存为 JSON 快照，加载时重新计算向量。

use std::cmp::Ordering;
use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::llm::{cosine_similarity, EmbeddingProvider};
use crate::store::{ChunkMetadata, Course, CourseChunk, CourseStore, SearchQuery, SearchResults};

/// 语料快照：课程元数据 + 已分块内容（不含向量）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorpusSnapshot {
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub chunks: Vec<CourseChunk>,
}

struct CatalogEntry {
    course: Course,
    embedding: Vec<f32>,
}

struct ContentEntry {
    chunk: CourseChunk,
    embedding: Vec<f32>,
}

/// 内存实现：RwLock 只在计算完向量后短暂持有，不跨 await
pub struct InMemoryCourseStore {
    embedder: Arc<dyn EmbeddingProvider>,
    catalog: RwLock<Vec<CatalogEntry>>,
    content: RwLock<Vec<ContentEntry>>,
    max_results: usize,
}

impl InMemoryCourseStore {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, max_results: usize) -> Self {
        Self {
            embedder,
            catalog: RwLock::new(Vec::new()),
            content: RwLock::new(Vec::new()),
            max_results: max_results.max(1),
        }
    }

    /// 写入课程元数据；同名课程整体替换
    pub async fn add_course(&self, course: Course) -> Result<(), String> {
        let embedding = self.embedder.embed(&course.title).await?;
        let mut catalog = self.catalog.write().map_err(|e| e.to_string())?;
        let entry = CatalogEntry { course, embedding };
        match catalog.iter_mut().find(|c| c.course.title == entry.course.title) {
            Some(existing) => *existing = entry,
            None => catalog.push(entry),
        }
        Ok(())
    }

    /// 批量写入内容片段，返回成功条数；单条向量化失败只记日志
    pub async fn add_chunks(&self, chunks: Vec<CourseChunk>) -> usize {
        let mut embedded = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            match self.embedder.embed(&chunk.content).await {
                Ok(embedding) if !embedding.is_empty() => embedded.push(ContentEntry { chunk, embedding }),
                Ok(_) => tracing::debug!(course = %chunk.course_title, "skip chunk with empty embedding"),
                Err(e) => tracing::warn!(course = %chunk.course_title, error = %e, "embed chunk failed"),
            }
        }
        let added = embedded.len();
        if let Ok(mut content) = self.content.write() {
            content.extend(embedded);
        }
        added
    }

    pub fn clear(&self) {
        if let Ok(mut c) = self.catalog.write() {
            c.clear();
        }
        if let Ok(mut c) = self.content.write() {
            c.clear();
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.content.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn snapshot(&self) -> CorpusSnapshot {
        CorpusSnapshot {
            courses: self
                .catalog
                .read()
                .map(|c| c.iter().map(|e| e.course.clone()).collect())
                .unwrap_or_default(),
            chunks: self
                .content
                .read()
                .map(|c| c.iter().map(|e| e.chunk.clone()).collect())
                .unwrap_or_default(),
        }
    }

    /// 导入快照（追加到现有语料），返回 (课程数, 片段数)
    pub async fn import(&self, snapshot: CorpusSnapshot) -> Result<(usize, usize), String> {
        let courses = snapshot.courses.len();
        for course in snapshot.courses {
            self.add_course(course).await?;
        }
        let chunks = self.add_chunks(snapshot.chunks).await;
        Ok((courses, chunks))
    }

    /// 将语料写入 JSON 文件；父目录不存在时自动创建
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&self.snapshot())?)?;
        Ok(())
    }

    /// 从 JSON 快照加载；文件不存在时返回空存储
    pub async fn load_snapshot(
        path: impl AsRef<Path>,
        embedder: Arc<dyn EmbeddingProvider>,
        max_results: usize,
    ) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let store = Self::new(embedder, max_results);
        if !path.exists() {
            tracing::warn!(path = %path.display(), "corpus snapshot not found, starting empty");
            return Ok(store);
        }
        let data = std::fs::read_to_string(path)?;
        let snapshot: CorpusSnapshot = serde_json::from_str(&data)?;
        let (courses, chunks) = store.import(snapshot).await.map_err(anyhow::Error::msg)?;
        tracing::info!(courses, chunks, path = %path.display(), "corpus snapshot loaded");
        Ok(store)
    }
}

#[async_trait]
impl CourseStore for InMemoryCourseStore {
    async fn search(&self, query: &SearchQuery) -> SearchResults {
        let course_title = match &query.course_name {
            Some(name) => match self.resolve_course_name(name).await {
                Some(title) => Some(title),
                None => return SearchResults::empty(format!("No course found matching '{name}'")),
            },
            None => None,
        };

        let query_embedding = match self.embedder.embed(&query.query).await {
            Ok(v) => v,
            Err(e) => return SearchResults::empty(format!("Search error: {e}")),
        };

        let content = match self.content.read() {
            Ok(c) => c,
            Err(e) => return SearchResults::empty(format!("Search error: {e}")),
        };

        let mut scored: Vec<(f32, &CourseChunk)> = content
            .iter()
            .filter(|e| course_title.as_ref().map_or(true, |t| &e.chunk.course_title == t))
            .filter(|e| query.lesson_number.map_or(true, |n| e.chunk.lesson_number == Some(n)))
            .map(|e| (cosine_similarity(&query_embedding, &e.embedding), &e.chunk))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let limit = query.limit.unwrap_or(self.max_results);
        let mut results = SearchResults::default();
        for (score, chunk) in scored.into_iter().take(limit) {
            results.push(
                chunk.content.clone(),
                ChunkMetadata {
                    course_title: Some(chunk.course_title.clone()),
                    lesson_number: chunk.lesson_number,
                },
                1.0 - score,
            );
        }
        results
    }

    async fn resolve_course_name(&self, course_name: &str) -> Option<String> {
        let embedding = match self.embedder.embed(course_name).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(course_name, error = %e, "course name resolution failed");
                return None;
            }
        };
        let catalog = self.catalog.read().ok()?;
        catalog
            .iter()
            .map(|e| (cosine_similarity(&embedding, &e.embedding), &e.course.title))
            .filter(|(score, _)| *score > 0.0)
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal))
            .map(|(_, title)| title.clone())
    }

    async fn lesson_link(&self, course_title: &str, lesson_number: u32) -> Option<String> {
        let catalog = self.catalog.read().ok()?;
        catalog
            .iter()
            .find(|e| e.course.title == course_title)
            .and_then(|e| e.course.lesson(lesson_number))
            .and_then(|l| l.lesson_link.clone())
    }

    async fn course_metadata(&self, course_title: &str) -> Option<Course> {
        let catalog = self.catalog.read().ok()?;
        catalog
            .iter()
            .find(|e| e.course.title == course_title)
            .map(|e| e.course.clone())
    }

    async fn course_titles(&self) -> Vec<String> {
        self.catalog
            .read()
            .map(|c| c.iter().map(|e| e.course.title.clone()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::HashingEmbedder;
    use crate::store::Lesson;

    async fn sample_store() -> InMemoryCourseStore {
        let store = InMemoryCourseStore::new(Arc::new(HashingEmbedder::new(4096)), 5);
        store
            .add_course(
                Course::new("Introduction to Machine Learning")
                    .with_instructor("Dr. Smith")
                    .with_lesson(Lesson::new(1, "What is ML?").with_link("https://example.com/lesson1"))
                    .with_lesson(Lesson::new(2, "Supervised Learning")),
            )
            .await
            .unwrap();
        store
            .add_course(Course::new("MCP: Build Rich-Context AI Apps"))
            .await
            .unwrap();
        store
            .add_chunks(vec![
                CourseChunk::new(
                    "Machine learning is a subset of artificial intelligence.",
                    "Introduction to Machine Learning",
                    Some(1),
                    0,
                ),
                CourseChunk::new(
                    "Supervised learning uses labeled data.",
                    "Introduction to Machine Learning",
                    Some(2),
                    1,
                ),
                CourseChunk::new(
                    "MCP servers expose tools and resources to clients.",
                    "MCP: Build Rich-Context AI Apps",
                    Some(1),
                    0,
                ),
            ])
            .await;
        store
    }

    #[tokio::test]
    async fn test_resolve_partial_course_name() {
        let store = sample_store().await;
        assert_eq!(
            store.resolve_course_name("MCP").await.as_deref(),
            Some("MCP: Build Rich-Context AI Apps")
        );
        assert_eq!(
            store.resolve_course_name("machine learning").await.as_deref(),
            Some("Introduction to Machine Learning")
        );
        assert!(store.resolve_course_name("Quantumbasketweaving").await.is_none());
    }

    #[tokio::test]
    async fn test_search_filters_by_course_and_lesson() {
        let store = sample_store().await;
        let results = store
            .search(&SearchQuery::new("labeled data").course("Machine Learning").lesson(2))
            .await;
        assert!(results.error.is_none());
        assert_eq!(results.len(), 1);
        assert_eq!(results.metadata[0].lesson_number, Some(2));
        assert!(results.documents[0].contains("labeled"));
    }

    #[tokio::test]
    async fn test_search_unknown_course_returns_error() {
        let store = sample_store().await;
        let results = store
            .search(&SearchQuery::new("anything").course("Quantumbasketweaving"))
            .await;
        assert!(results.is_empty());
        assert_eq!(
            results.error.as_deref(),
            Some("No course found matching 'Quantumbasketweaving'")
        );
    }

    #[tokio::test]
    async fn test_search_respects_limit_and_orders_by_distance() {
        let store = sample_store().await;
        let results = store.search(&SearchQuery::new("learning").limit(2)).await;
        assert_eq!(results.len(), 2);
        assert!(results.distances[0] <= results.distances[1]);
    }

    #[tokio::test]
    async fn test_add_course_replaces_same_title() {
        let store = sample_store().await;
        store
            .add_course(Course::new("MCP: Build Rich-Context AI Apps").with_instructor("Elie"))
            .await
            .unwrap();
        assert_eq!(store.course_count().await, 2);
        let meta = store.course_metadata("MCP: Build Rich-Context AI Apps").await.unwrap();
        assert_eq!(meta.instructor.as_deref(), Some("Elie"));
    }

    #[tokio::test]
    async fn test_lesson_link() {
        let store = sample_store().await;
        assert_eq!(
            store.lesson_link("Introduction to Machine Learning", 1).await.as_deref(),
            Some("https://example.com/lesson1")
        );
        assert!(store.lesson_link("Introduction to Machine Learning", 2).await.is_none());
        assert!(store.lesson_link("Nope", 1).await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let store = sample_store().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus/snapshot.json");
        store.save_snapshot(&path).unwrap();

        let loaded = InMemoryCourseStore::load_snapshot(&path, Arc::new(HashingEmbedder::new(4096)), 5)
            .await
            .unwrap();
        assert_eq!(loaded.course_count().await, 2);
        assert_eq!(loaded.chunk_count(), 3);
    }

    #[tokio::test]
    async fn test_load_missing_snapshot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryCourseStore::load_snapshot(
            dir.path().join("missing.json"),
            Arc::new(HashingEmbedder::default()),
            5,
        )
        .await
        .unwrap();
        assert_eq!(store.course_count().await, 0);
    }
}
