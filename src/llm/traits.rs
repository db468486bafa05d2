//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Ollama / Mock）实现 LlmClient::complete。
//! 回复形态（纯文本 / 结构化内容 / 空）在这里收敛为 ReplyContent，并由 into_text 统一归一化为文本，
//! 之后的流程不再按形态分支。

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::memory::Message;

/// 调用回复模型失败
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// 回复模型返回的内容形态
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyContent {
    /// 纯文本
    Text(String),
    /// 结构化内容（对象 / 数组 / 其它 JSON）
    Structured(Value),
    /// 无回复
    Empty,
}

impl ReplyContent {
    /// 归一化为去除首尾空白的非空文本；无内容时返回 None
    pub fn into_text(self) -> Option<String> {
        let text = match self {
            ReplyContent::Text(s) => s,
            ReplyContent::Structured(v) => value_text(&v),
            ReplyContent::Empty => String::new(),
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// 归一化，空回复时使用 fallback
    pub fn text_or(self, fallback: &str) -> String {
        self.into_text().unwrap_or_else(|| fallback.to_string())
    }
}

impl From<String> for ReplyContent {
    fn from(s: String) -> Self {
        ReplyContent::Text(s)
    }
}

impl From<&str> for ReplyContent {
    fn from(s: &str) -> Self {
        ReplyContent::Text(s.to_string())
    }
}

impl From<Option<String>> for ReplyContent {
    fn from(s: Option<String>) -> Self {
        s.map(ReplyContent::Text).unwrap_or(ReplyContent::Empty)
    }
}

/// 从结构化内容中取文本：对象取 content/text 字段，数组逐段拼接
fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("content")
            .or_else(|| map.get("text"))
            .map(value_text)
            .unwrap_or_default(),
        Value::Array(parts) => parts
            .iter()
            .map(value_text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null => String::new(),
        Value::Bool(_) | Value::Number(_) => v.to_string(),
    }
}

/// LLM 客户端 trait：非流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<ReplyContent, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_is_trimmed() {
        assert_eq!(
            ReplyContent::Text("  hello \n".into()).into_text(),
            Some("hello".to_string())
        );
    }

    #[test]
    fn test_empty_shapes_become_none() {
        assert_eq!(ReplyContent::Empty.into_text(), None);
        assert_eq!(ReplyContent::Text("   ".into()).into_text(), None);
        assert_eq!(ReplyContent::Structured(Value::Null).into_text(), None);
        assert_eq!(ReplyContent::Structured(json!({})).into_text(), None);
        assert_eq!(ReplyContent::from(None::<String>).into_text(), None);
    }

    #[test]
    fn test_structured_object_uses_content_field() {
        let reply = ReplyContent::Structured(json!({"role": "assistant", "content": "Take a breath."}));
        assert_eq!(reply.into_text(), Some("Take a breath.".to_string()));
    }

    #[test]
    fn test_structured_list_joins_parts() {
        let reply = ReplyContent::Structured(json!([
            {"type": "text", "text": "First step."},
            "Second step.",
            {"content": [{"text": "Third step."}]}
        ]));
        assert_eq!(
            reply.into_text(),
            Some("First step.\nSecond step.\nThird step.".to_string())
        );
    }

    #[test]
    fn test_text_or_falls_back() {
        assert_eq!(ReplyContent::Empty.text_or("fallback"), "fallback");
        assert_eq!(ReplyContent::from("ok").text_or("fallback"), "ok");
    }
}
