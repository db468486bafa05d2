//! CareBot - 对话式陪伴助手核心
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、对话编排器（单轮流水线）与构建器
//! - **gateway**: 意图路由与会话表（短期历史、防复读）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Ollama / Mock）与嵌入后端
//! - **memory**: 会话消息、向量索引、长期记忆存储与快照、事实抽取
//! - **observability**: 日志初始化

pub mod config;
pub mod core;
pub mod gateway;
pub mod llm;
pub mod memory;
pub mod observability;

pub use crate::core::{AgentError, ConversationOrchestrator, OrchestratorBuilder, TurnReply};
