//! LLM 层：回复模型客户端抽象与实现（OpenAI 兼容 / Ollama / Mock）、嵌入提供方

pub mod embedding;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod traits;

pub use embedding::{create_embedder_from_config, EmbeddingProvider, HashEmbedder, OpenAiEmbedder};
pub use mock::{MockLlmClient, MockReply};
pub use ollama::{create_ollama_client, OLLAMA_BASE_URL, OLLAMA_DEFAULT_MODEL};
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{LlmClient, LlmError, ReplyContent};
