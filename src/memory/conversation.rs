//! 短期记忆：按会话保存的对话历史
//!
//! 每个会话保留最近 K 个问答对（Exchange），超出时丢弃最旧的；
//! 格式化为按时间顺序交替的 `User:` / `Assistant:` 行，供拼入 system prompt。
//! 未知会话按空历史处理，不报错。

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// 一问一答，记录后不可变
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Exchange {
    question: String,
    answer: String,
}

impl Exchange {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }
}

#[derive(Debug, Default)]
struct Sessions {
    by_id: HashMap<String, VecDeque<Exchange>>,
    counter: u64,
}

/// 会话历史存储：由调用方持有并注入，进程内有效；锁仅在单次读写内持有
#[derive(Debug)]
pub struct ConversationMemory {
    sessions: Mutex<Sessions>,
    max_history: usize,
}

impl ConversationMemory {
    /// max_history：每个会话保留的问答对数量
    pub fn new(max_history: usize) -> Self {
        Self {
            sessions: Mutex::new(Sessions::default()),
            max_history,
        }
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// 锁中毒时沿用内部数据
    fn sessions(&self) -> MutexGuard<'_, Sessions> {
        self.sessions.lock().unwrap_or_else(|e| {
            tracing::warn!("conversation memory lock poisoned, recovering");
            e.into_inner()
        })
    }

    /// 新建空会话，返回 `session_<n>`；跳过调用方已占用的 id
    pub fn create_session(&self) -> String {
        let mut sessions = self.sessions();
        loop {
            sessions.counter += 1;
            let id = format!("session_{}", sessions.counter);
            if !sessions.by_id.contains_key(&id) {
                sessions.by_id.insert(id.clone(), VecDeque::new());
                return id;
            }
        }
    }

    /// 追加一个问答对；会话不存在时自动创建，超出窗口时剪掉最旧的
    pub fn add_exchange(&self, session_id: &str, question: impl Into<String>, answer: impl Into<String>) {
        let mut sessions = self.sessions();
        let history = sessions.by_id.entry(session_id.to_string()).or_default();
        history.push_back(Exchange::new(question, answer));
        while history.len() > self.max_history {
            history.pop_front();
        }
    }

    /// 会话内的问答对（时间顺序）；未知会话返回空
    pub fn exchanges(&self, session_id: &str) -> Vec<Exchange> {
        self.sessions()
            .by_id
            .get(session_id)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 供拼入 prompt 的历史文本；无历史时返回 None
    pub fn history(&self, session_id: Option<&str>) -> Option<String> {
        let exchanges = self.exchanges(session_id?);
        if exchanges.is_empty() {
            return None;
        }
        let lines: Vec<String> = exchanges
            .iter()
            .flat_map(|e| {
                [
                    format!("User: {}", e.question()),
                    format!("Assistant: {}", e.answer()),
                ]
            })
            .collect();
        Some(lines.join("\n"))
    }

    pub fn clear_session(&self, session_id: &str) {
        if let Some(history) = self.sessions().by_id.get_mut(session_id) {
            history.clear();
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions().by_id.len()
    }
}
