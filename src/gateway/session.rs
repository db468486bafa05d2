//! 会话管理
//!
//! 每个会话持有短期历史窗口与上一次助手回复（防复读）。
//! SessionTable 按会话 ID 懒创建会话；每个会话一把 Mutex，同一会话的轮次串行，不同会话并行。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::memory::{ConversationMemory, Message, Role};

/// 会话 ID（由传输层按连接 / 用户传入）
pub type SessionId = String;

/// 默认历史窗口：3 组 user/assistant
pub const DEFAULT_HISTORY_LIMIT: usize = 6;

/// 候选回复与上一次回复相同时的替换语
pub const REPEAT_FALLBACK: &str =
    "I want to make sure I really understand you. Could you tell me a little more about what's on your mind right now?";

/// 单个会话的状态
#[derive(Debug, Clone)]
pub struct SessionState {
    history: ConversationMemory,
    last_response: String,
}

impl SessionState {
    pub fn new(history_limit: usize) -> Self {
        Self {
            history: ConversationMemory::new(history_limit),
            last_response: String::new(),
        }
    }

    /// 追加一条消息到历史尾部；窗口满时先淘汰最旧的一条
    pub fn append_turn(&mut self, role: Role, content: impl Into<String>) {
        self.history.push(Message::new(role, content));
    }

    pub fn history(&self) -> Vec<Message> {
        self.history.messages()
    }

    pub fn last_response(&self) -> &str {
        &self.last_response
    }

    /// 直接记录上一次回复（问候轮不进历史，但仍参与防复读）
    pub fn set_last_response(&mut self, response: impl Into<String>) {
        self.last_response = response.into();
    }

    /// 重置会话：清空历史与 last_response
    pub fn clear(&mut self) {
        self.history.clear();
        self.last_response.clear();
    }

    /// 防复读：候选与上一次回复忽略大小写相同时替换为 REPEAT_FALLBACK；最终结果成为新的 last_response
    pub fn check_and_update_repeat(&mut self, candidate: &str) -> String {
        let is_repeat = !self.last_response.is_empty()
            && self.last_response.to_lowercase() == candidate.to_lowercase();
        let final_response = if is_repeat {
            tracing::debug!("repeated reply replaced with clarifying fallback");
            REPEAT_FALLBACK.to_string()
        } else {
            candidate.to_string()
        };
        self.last_response = final_response.clone();
        final_response
    }
}

/// 会话表：session_id -> 会话
pub struct SessionTable {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<SessionState>>>>,
    history_limit: usize,
}

impl SessionTable {
    pub fn new(history_limit: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            history_limit,
        }
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// 获取或创建会话；调用方锁住返回的 Mutex 即独占该会话
    pub async fn get_or_create(&self, session_id: &str) -> Arc<Mutex<SessionState>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(session_id) {
                return Arc::clone(session);
            }
        }

        let mut sessions = self.sessions.write().await;
        Arc::clone(
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(SessionState::new(self.history_limit)))),
        )
    }

    pub async fn append_turn(&self, session_id: &str, role: Role, content: &str) {
        let session = self.get_or_create(session_id).await;
        session.lock().await.append_turn(role, content);
    }

    /// 会话历史（最旧在前）；不存在的会话会被创建并返回空历史
    pub async fn history_of(&self, session_id: &str) -> Vec<Message> {
        let session = self.get_or_create(session_id).await;
        let state = session.lock().await;
        state.history()
    }

    pub async fn check_and_update_repeat(&self, session_id: &str, candidate: &str) -> String {
        let session = self.get_or_create(session_id).await;
        let mut state = session.lock().await;
        state.check_and_update_repeat(candidate)
    }

    /// 重置会话（"清空对话"）；会话不存在时返回 false，不会创建
    pub async fn clear_session(&self, session_id: &str) -> bool {
        let session = self.sessions.read().await.get(session_id).cloned();
        match session {
            Some(session) => {
                session.lock().await.clear();
                tracing::info!(session_id, "session cleared");
                true
            }
            None => false,
        }
    }

    /// 当前会话数
    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}
