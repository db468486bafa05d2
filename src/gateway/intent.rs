//! 意图路由
//!
//! 在调用任何模型之前，对用户输入做确定性分类。规则按优先级依次匹配，先命中者生效，不打分：
//! 1. safety：包含危机关键词（子串、忽略大小写），不可被其它规则覆盖
//! 2. greeting：去空白并小写后与问候词表**完全相等**（"hi, I want a plan" 不算问候）
//! 3. planner：包含规划短语（子串）
//! 4. care：其余一切（含空输入）
//!
//! 情绪关键词只用于日志观测，不改变路由结果（care 本身就是兜底）。

use serde::{Deserialize, Serialize};

/// 路由结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// 危机表达：直接返回固定安全提示
    Safety,
    /// 纯问候
    Greeting,
    /// 需要步骤 / 计划
    Planner,
    /// 陪伴与倾听（默认）
    Care,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Safety => "safety",
            Intent::Greeting => "greeting",
            Intent::Planner => "planner",
            Intent::Care => "care",
        }
    }
}

pub const CRISIS_KEYWORDS: &[&str] = &[
    "suicide",
    "kill myself",
    "end my life",
    "harm myself",
    "hopeless",
    "give up",
];

pub const GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "hi there",
    "hello there",
    "hey there",
    "good morning",
    "good afternoon",
    "good evening",
];

pub const PLANNING_PHRASES: &[&str] = &["what should i do", "steps", "plan", "how can i"];

pub const EMOTIONAL_KEYWORDS: &[&str] = &[
    "lost",
    "grief",
    "depressed",
    "sad",
    "anxious",
    "overwhelmed",
];

/// 意图路由器：无状态，词表可替换
#[derive(Debug, Clone)]
pub struct Router {
    crisis_keywords: Vec<String>,
    greetings: Vec<String>,
    planning_phrases: Vec<String>,
    emotional_keywords: Vec<String>,
}

fn lowered(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_lowercase()).collect()
}

impl Router {
    pub fn new() -> Self {
        Self {
            crisis_keywords: lowered(CRISIS_KEYWORDS),
            greetings: lowered(GREETINGS),
            planning_phrases: lowered(PLANNING_PHRASES),
            emotional_keywords: lowered(EMOTIONAL_KEYWORDS),
        }
    }

    /// 追加危机关键词（如按部署地区补充）
    pub fn with_crisis_keywords<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.crisis_keywords
            .extend(extra.into_iter().map(|s| s.as_ref().to_lowercase()));
        self
    }

    /// 对一条消息分类；总是返回结果
    pub fn classify(&self, message: &str) -> Intent {
        let msg = message.to_lowercase();

        let intent = if contains_any(&msg, &self.crisis_keywords) {
            Intent::Safety
        } else if self.greetings.iter().any(|g| g == msg.trim()) {
            Intent::Greeting
        } else if contains_any(&msg, &self.planning_phrases) {
            Intent::Planner
        } else {
            Intent::Care
        };

        tracing::debug!(
            intent = intent.as_str(),
            emotional = self.is_emotional(&msg),
            "message routed"
        );
        intent
    }

    /// 是否含情绪关键词（仅供观测）
    pub fn is_emotional(&self, message: &str) -> bool {
        contains_any(&message.to_lowercase(), &self.emotional_keywords)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.iter().any(|n| haystack.contains(n.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenarios() {
        let router = Router::new();
        assert_eq!(router.classify("I want to end my life"), Intent::Safety);
        assert_eq!(router.classify("hello"), Intent::Greeting);
        assert_eq!(router.classify("what should i do about my exam"), Intent::Planner);
        assert_eq!(router.classify("I feel so lost"), Intent::Care);
    }

    #[test]
    fn test_safety_wins_over_everything() {
        let router = Router::new();
        for msg in [
            "hello, I want to kill myself",
            "What should I do? I feel hopeless",
            "SUICIDE",
            "give me a plan, I want to give up",
        ] {
            assert_eq!(router.classify(msg), Intent::Safety, "{msg}");
        }
    }

    #[test]
    fn test_greeting_requires_exact_match() {
        let router = Router::new();
        assert_eq!(router.classify("  Hello  "), Intent::Greeting);
        assert_eq!(router.classify("Good Morning"), Intent::Greeting);
        assert_eq!(router.classify("hi, I want a plan"), Intent::Planner);
        assert_eq!(router.classify("hi, how are you"), Intent::Care);
    }

    #[test]
    fn test_planner_is_case_insensitive() {
        let router = Router::new();
        assert_eq!(router.classify("How can I study better?"), Intent::Planner);
        assert_eq!(router.classify("give me the STEPS"), Intent::Planner);
    }

    #[test]
    fn test_empty_and_whitespace_fall_through_to_care() {
        let router = Router::new();
        assert_eq!(router.classify(""), Intent::Care);
        assert_eq!(router.classify(" \n\t "), Intent::Care);
    }

    #[test]
    fn test_emotional_keywords_do_not_change_routing() {
        let router = Router::new();
        assert!(router.is_emotional("I am so anxious"));
        assert_eq!(router.classify("I am so anxious"), Intent::Care);
        assert_eq!(router.classify("the weather is nice"), Intent::Care);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let router = Router::new();
        for msg in ["hey", "plan my week", "I miss her", "", "kill myself"] {
            assert_eq!(router.classify(msg), router.classify(msg));
        }
    }

    #[test]
    fn test_extra_crisis_keywords() {
        let router = Router::new().with_crisis_keywords(["No Reason To Live"]);
        assert_eq!(router.classify("there is no reason to live"), Intent::Safety);
    }

    #[test]
    fn test_intent_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Intent::Planner).unwrap(), "\"planner\"");
    }
}
