//! 记忆层：按会话保存的短期对话历史

pub mod conversation;

pub use conversation::{ConversationMemory, Exchange};
