//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序返回预置回复；预置回复用完后回显最后一条 User 消息。
//! 每次调用的消息列表都会被记录，便于断言提示词内容与调用次数。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError, ReplyContent};
use crate::memory::{Message, Role};

/// 预置的一次调用结果
#[derive(Debug, Clone)]
pub enum MockReply {
    Reply(ReplyContent),
    Fail(String),
}

/// Mock 客户端
#[derive(Debug, Default)]
pub struct MockLlmClient {
    scripted: Mutex<VecDeque<MockReply>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依次返回给定回复
    pub fn with_replies<I, R>(replies: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<ReplyContent>,
    {
        let mock = Self::new();
        for r in replies {
            mock.push_reply(r);
        }
        mock
    }

    pub fn push_reply(&self, reply: impl Into<ReplyContent>) {
        self.scripted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(MockReply::Reply(reply.into()));
    }

    /// 下一次调用返回错误
    pub fn push_failure(&self, message: impl Into<String>) {
        self.scripted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(MockReply::Fail(message.into()));
    }

    /// 已发生的调用次数
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// 每次调用收到的消息列表
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<ReplyContent, LlmError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(messages.to_vec());

        let next = self
            .scripted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match next {
            Some(MockReply::Reply(r)) => Ok(r),
            Some(MockReply::Fail(e)) => Err(LlmError::Request(e)),
            None => {
                let last_user = messages
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::User)
                    .map(|m| m.content.as_str())
                    .unwrap_or("(no input)");
                Ok(ReplyContent::Text(format!("Echo from Mock: {}", last_user)))
            }
        }
    }
}
