//! 长期事实抽取
//!
//! 每轮对话结束后，让模型判断是否有值得长期记住的用户事实。
//! 这是尽力而为的旁路：抽取失败只记录日志，不影响本轮回复。

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::llm::LlmClient;
use crate::memory::Message;

const EXTRACTOR_SYSTEM_PROMPT: &str = r#"Extract long-term user facts.
Respond ONLY in valid JSON with exactly this shape:
{"save": true or false, "summary": "one short sentence about the user", "category": "preference" | "emotional" | "general"}
Set "save" to false when the conversation contains nothing worth remembering."#;

/// 抽取失败
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("extractor model failed: {0}")]
    Llm(String),

    #[error("malformed extractor output: {0}")]
    Malformed(String),
}

/// 抽取结果
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExtractedFact {
    #[serde(default)]
    pub save: bool,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub category: Option<String>,
}

impl ExtractedFact {
    /// 是否应写入长期记忆
    pub fn should_save(&self) -> bool {
        self.save && !self.summary.trim().is_empty()
    }
}

/// 事实抽取器
#[async_trait]
pub trait FactExtractor: Send + Sync {
    /// 无可抽取内容时返回 Ok(None)
    async fn extract(&self, conversation_text: &str) -> Result<Option<ExtractedFact>, ExtractionError>;
}

/// 用回复模型做抽取，要求其只输出 JSON
pub struct LlmFactExtractor {
    llm: Arc<dyn LlmClient>,
}

impl LlmFactExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

/// JSON 对象的起点：`{` 后紧跟键名或 `}`，跳过说明文字里的花括号
fn object_start() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\{\s*["}]"#).expect("static regex"))
}

/// 从模型输出中解析抽取结果（容忍 ```json 代码块与前后说明文字）
///
/// 只解析第一个 JSON 对象，其后的内容一律忽略。
pub fn parse_extraction(raw: &str) -> Result<Option<ExtractedFact>, ExtractionError> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    let start = object_start()
        .find(raw)
        .ok_or_else(|| ExtractionError::Malformed(truncate(raw)))?
        .start();
    serde_json::Deserializer::from_str(&raw[start..])
        .into_iter::<ExtractedFact>()
        .next()
        .ok_or_else(|| ExtractionError::Malformed(truncate(raw)))?
        .map(Some)
        .map_err(|e| ExtractionError::Malformed(e.to_string()))
}

fn truncate(s: &str) -> String {
    s.chars().take(120).collect()
}

#[async_trait]
impl FactExtractor for LlmFactExtractor {
    async fn extract(&self, conversation_text: &str) -> Result<Option<ExtractedFact>, ExtractionError> {
        let messages = vec![
            Message::system(EXTRACTOR_SYSTEM_PROMPT),
            Message::user(conversation_text),
        ];
        let reply = self
            .llm
            .complete(&messages)
            .await
            .map_err(|e| ExtractionError::Llm(e.to_string()))?;
        match reply.into_text() {
            Some(text) => parse_extraction(&text),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[test]
    fn test_parse_plain_json() {
        let fact = parse_extraction(r#"{"save": true, "summary": "User likes tea", "category": "preference"}"#)
            .unwrap()
            .unwrap();
        assert!(fact.should_save());
        assert_eq!(fact.category.as_deref(), Some("preference"));
    }

    #[test]
    fn test_parse_fenced_json_with_prose() {
        let raw = "Sure! Here it is:\n```json\n{\"save\": false, \"summary\": \"\"}\n```";
        let fact = parse_extraction(raw).unwrap().unwrap();
        assert!(!fact.should_save());
        assert_eq!(fact.category, None);
    }

    #[test]
    fn test_parse_null_and_empty() {
        assert_eq!(parse_extraction("null").unwrap(), None);
        assert_eq!(parse_extraction("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(
            parse_extraction("I think the user likes tea"),
            Err(ExtractionError::Malformed(_))
        ));
        assert!(matches!(
            parse_extraction("{save: yes}"),
            Err(ExtractionError::Malformed(_))
        ));
    }

    #[test]
    fn test_trailing_prose_with_braces_is_ignored() {
        let raw = r#"{"save": true, "summary": "User likes tea", "category": "preference"}
Note: I left out the {weather} talk."#;
        let fact = parse_extraction(raw).unwrap().unwrap();
        assert_eq!(fact.summary, "User likes tea");
    }

    #[test]
    fn test_leading_prose_braces_are_skipped() {
        let raw = r#"Result {as requested}: {"save": false}"#;
        let fact = parse_extraction(raw).unwrap().unwrap();
        assert!(!fact.save);
    }

    #[test]
    fn test_save_without_summary_is_ignored() {
        let fact = parse_extraction(r#"{"save": true, "summary": "  "}"#).unwrap().unwrap();
        assert!(!fact.should_save());
    }

    #[tokio::test]
    async fn test_llm_extractor_uses_json_prompt() {
        let llm = Arc::new(MockLlmClient::with_replies([
            r#"{"save": true, "summary": "User has an exam on Friday", "category": "general"}"#,
        ]));
        let extractor = LlmFactExtractor::new(llm.clone());

        let fact = extractor
            .extract("User: I have an exam on Friday\nAssistant: Good luck!")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(fact.summary, "User has an exam on Friday");
        let calls = llm.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0][0].content.contains("ONLY in valid JSON"));
    }

    #[tokio::test]
    async fn test_llm_failure_is_reported() {
        let llm = Arc::new(MockLlmClient::new());
        llm.push_failure("connection refused");
        let extractor = LlmFactExtractor::new(llm);
        assert!(matches!(
            extractor.extract("User: hi").await,
            Err(ExtractionError::Llm(_))
        ));
    }
}
