//! 短期记忆：对话历史窗口
//!
//! 固定容量的 FIFO 窗口：满了之后先丢最旧的一条再追加，长度永远不超过容量，淘汰不报错。

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// 短期记忆：最近 capacity 条消息（默认 6 条，即 3 组 user/assistant）
#[derive(Clone, Debug)]
pub struct ConversationMemory {
    messages: VecDeque<Message>,
    capacity: usize,
}

impl ConversationMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, msg: Message) {
        if self.capacity == 0 {
            return;
        }
        while self.messages.len() >= self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(msg);
    }

    /// 按时间顺序（最旧在前）拷贝出当前窗口
    pub fn messages(&self) -> Vec<Message> {
        self.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_exceeds_capacity() {
        let mut mem = ConversationMemory::new(6);
        for i in 0..50 {
            mem.push(Message::user(format!("m{i}")));
            assert!(mem.len() <= 6);
        }
        assert_eq!(mem.len(), 6);
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut mem = ConversationMemory::new(3);
        for i in 0..5 {
            mem.push(Message::user(format!("m{i}")));
        }
        let contents: Vec<_> = mem.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut mem = ConversationMemory::new(0);
        mem.push(Message::assistant("hi"));
        assert!(mem.is_empty());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Message::assistant("ok")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"ok"}"#);
    }
}
