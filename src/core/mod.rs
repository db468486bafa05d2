//! 核心层：错误类型、对话编排器与构建器

pub mod builder;
pub mod error;
pub mod orchestrator;

pub use builder::OrchestratorBuilder;
pub use error::{AgentError, MemoryError};
pub use orchestrator::{
    extract_and_save, planner_prompt, ConversationOrchestrator, TurnReply, EMPTY_REPLY_FALLBACK,
    GREETING_FALLBACK, SAFETY_MESSAGE,
};
