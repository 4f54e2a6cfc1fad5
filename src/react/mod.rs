//! 生成层：有界工具调用循环、系统提示词、过程事件

pub mod events;
pub mod loop_;
pub mod prompt;

pub use events::ReactEvent;
pub use loop_::{AiGenerator, GenerationParams};
pub use prompt::{system_with_history, SYSTEM_PROMPT};
