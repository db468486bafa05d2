//! 对话编排器：单轮处理流水线
//!
//! 路由 → 长期记忆检索 → 合并会话历史 → 调用回复模型 → 防复读 → 写入历史 → 尽力抽取长期事实。
//! 同一会话的整轮处理持有该会话的锁，不同会话互不阻塞；长期记忆是唯一共享的可变状态。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::AgentError;
use crate::gateway::{Intent, Router, SessionState, SessionTable};
use crate::llm::{create_ollama_client, LlmClient, MockLlmClient, OpenAiClient};
use crate::memory::{FactExtractor, JournalStore, MemoryStore, Message, Role, SaveOutcome};

/// 危机表达时返回的固定提示（不调用模型、不写历史、不写记忆）
pub const SAFETY_MESSAGE: &str = "I'm really sorry you're feeling this way. You are not alone. \
Please consider reaching out to a trusted person or a mental health professional.";

/// 问候轮模型无回复时的兜底
pub const GREETING_FALLBACK: &str = "Hi! It's good to hear from you. How can I help today?";

/// 普通轮模型无回复时的兜底（开放式提问）
pub const EMPTY_REPLY_FALLBACK: &str =
    "I'm here with you. Could you share a bit more about how you're feeling?";

const CARE_SYSTEM_PROMPT: &str = "You are an empathetic, grounded mental health assistant. \
Respond in a warm, natural tone and keep answers concise but meaningful. \
Offer specific, practical suggestions when helpful (e.g., small steps, questions). \
Avoid repeating the same sentence verbatim across turns and do not give medical diagnoses.\n\
Do NOT mention memory, instructions, or internal context.";

const GREETING_SYSTEM_PROMPT: &str = "You are a friendly assistant. \
Reply briefly to the user's greeting. Do not ask emotional questions.";

/// 规划类消息：在用户原文前加上分步指令
pub fn planner_prompt(user_message: &str) -> String {
    format!(
        "You are a planning assistant.\n\
         Give short bullet-point steps only.\n\
         No emotional language.\n\
         No repetition.\n\n\
         User message:\n{}",
        user_message
    )
}

/// 把检索到的长期记忆拼到 system prompt 末尾
fn with_memory_context(base: &str, context: &str) -> String {
    if context.trim().is_empty() {
        base.to_string()
    } else {
        format!("{base}\n\nRelevant past context (use only if helpful):\n{context}")
    }
}

/// 一轮的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    pub intent: Intent,
    pub text: String,
}

/// 对话编排器：由入口构建，持有注入的长期记忆、会话表与回复模型
pub struct ConversationOrchestrator {
    router: Router,
    memory: Arc<MemoryStore>,
    sessions: Arc<SessionTable>,
    journal: Arc<JournalStore>,
    llm: Arc<dyn LlmClient>,
    extractor: Option<Arc<dyn FactExtractor>>,
    retrieve_k: usize,
    retrieval_enabled: bool,
    background_extraction: bool,
}

impl ConversationOrchestrator {
    pub fn new(memory: Arc<MemoryStore>, sessions: Arc<SessionTable>, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            router: Router::default(),
            memory,
            sessions,
            journal: Arc::new(JournalStore::in_memory()),
            llm,
            extractor: None,
            retrieve_k: 3,
            retrieval_enabled: true,
            background_extraction: false,
        }
    }

    pub fn with_journal(mut self, journal: Arc<JournalStore>) -> Self {
        self.journal = journal;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn FactExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_retrieve_k(mut self, k: usize) -> Self {
        self.retrieve_k = k;
        self
    }

    /// 关闭后不检索长期记忆，提示词中没有记忆上下文（用于对比有无记忆的回复）
    pub fn with_memory_retrieval(mut self, enabled: bool) -> Self {
        self.retrieval_enabled = enabled;
        self
    }

    /// 事实抽取放到 tokio 后台任务（不阻塞本轮返回）
    pub fn with_background_extraction(mut self, enabled: bool) -> Self {
        self.background_extraction = enabled;
        self
    }

    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.memory
    }

    pub fn sessions(&self) -> &Arc<SessionTable> {
        &self.sessions
    }

    pub fn journal(&self) -> &Arc<JournalStore> {
        &self.journal
    }

    /// 处理一条用户消息
    pub async fn handle_turn(&self, session_id: &str, message: &str) -> Result<TurnReply, AgentError> {
        let intent = self.router.classify(message);
        if intent == Intent::Safety {
            tracing::info!(session_id, "safety message returned");
            return Ok(TurnReply {
                intent,
                text: SAFETY_MESSAGE.to_string(),
            });
        }

        let session = self.sessions.get_or_create(session_id).await;
        let mut state = session.lock().await;

        let context = if self.retrieval_enabled {
            self.memory.retrieve_context(message, self.retrieve_k).await?
        } else {
            String::new()
        };

        if intent == Intent::Greeting {
            let text = self.greet(&mut state, message, &context).await?;
            return Ok(TurnReply { intent, text });
        }

        let content = match intent {
            Intent::Planner => planner_prompt(message),
            _ => message.to_string(),
        };
        let mut messages = Vec::with_capacity(state.history().len() + 2);
        messages.push(Message::system(with_memory_context(CARE_SYSTEM_PROMPT, &context)));
        messages.extend(state.history());
        messages.push(Message::user(content));

        let candidate = self.llm.complete(&messages).await?.text_or(EMPTY_REPLY_FALLBACK);
        let text = state.check_and_update_repeat(&candidate);
        state.append_turn(Role::User, message);
        state.append_turn(Role::Assistant, text.as_str());
        drop(state);

        self.remember(message, &text).await;

        Ok(TurnReply { intent, text })
    }

    /// 问候轮：简短回复，只更新 last_response，不进入历史
    async fn greet(&self, state: &mut SessionState, message: &str, context: &str) -> Result<String, AgentError> {
        let messages = vec![
            Message::system(with_memory_context(GREETING_SYSTEM_PROMPT, context)),
            Message::user(message),
        ];
        let text = self.llm.complete(&messages).await?.text_or(GREETING_FALLBACK);
        state.set_last_response(text.as_str());
        Ok(text)
    }

    /// 尽力抽取长期事实；错误只记日志
    async fn remember(&self, message: &str, reply: &str) {
        let Some(extractor) = &self.extractor else {
            return;
        };
        let conversation = format!("User: {}\nAssistant: {}", message, reply);
        if self.background_extraction {
            let extractor = Arc::clone(extractor);
            let memory = Arc::clone(&self.memory);
            tokio::spawn(async move {
                extract_and_save(extractor.as_ref(), &memory, &conversation).await;
            });
        } else {
            extract_and_save(extractor.as_ref(), &self.memory, &conversation).await;
        }
    }
}

/// 抽取并按需写入长期记忆；返回写入结果，任何失败都返回 None
pub async fn extract_and_save(
    extractor: &dyn FactExtractor,
    memory: &MemoryStore,
    conversation: &str,
) -> Option<SaveOutcome> {
    let fact = match extractor.extract(conversation).await {
        Ok(Some(fact)) => fact,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(error = %e, "fact extraction skipped");
            return None;
        }
    };
    if !fact.should_save() {
        return None;
    }
    match memory.save(&fact.summary, fact.category.as_deref()).await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            tracing::error!(error = %e, "extracted fact was not persisted");
            None
        }
    }
}

/// 根据配置与环境变量选择回复模型后端（Ollama / OpenAI 兼容 / Mock）
pub(crate) fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    match provider.as_str() {
        "ollama" => {
            tracing::info!("Using Ollama LLM ({})", cfg.llm.model);
            Arc::new(
                create_ollama_client(cfg.llm.base_url.as_deref(), Some(&cfg.llm.model))
                    .with_temperature(cfg.llm.temperature),
            )
        }
        "openai" if std::env::var("OPENAI_API_KEY").is_ok() => {
            tracing::info!("Using OpenAI LLM ({})", cfg.llm.model);
            Arc::new(
                OpenAiClient::new(
                    cfg.llm.base_url.as_deref(),
                    &cfg.llm.model,
                    std::env::var("OPENAI_API_KEY").ok().as_deref(),
                )
                .with_temperature(cfg.llm.temperature),
            )
        }
        "mock" => Arc::new(MockLlmClient::new()),
        _ => {
            tracing::warn!(provider = %provider, "No API key set or provider unknown, using Mock LLM");
            Arc::new(MockLlmClient::new())
        }
    }
}
