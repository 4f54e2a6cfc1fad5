//! 核心层：错误类型与问答门面

pub mod error;
pub mod rag;

pub use error::RagError;
pub use rag::{CourseAnalytics, QueryResponse, RagSystem};
