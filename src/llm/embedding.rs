//! 嵌入提供方：供长期语义记忆使用
//!
//! - OpenAiEmbedder：调用 OpenAI 兼容的 /embeddings 端点
//! - HashEmbedder：离线、确定性的词哈希嵌入，未配置嵌入 API 时使用

use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::types::embeddings::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_openai::Client;
use async_trait::async_trait;

use crate::config::EmbeddingSection;

/// 文本 → 固定维度向量
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 向量维度 D（每个部署固定）
    fn dimension(&self) -> usize;

    /// 将文本编码为向量；失败时返回错误字符串
    async fn embed(&self, text: &str) -> Result<Vec<f32>, String>;
}

/// 使用 async-openai 调用 OpenAI 兼容的 embeddings API
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    /// 从环境变量与可选 base_url 创建（与 LLM 共用 OPENAI_API_KEY / base_url）
    pub fn new(base_url: Option<&str>, model: &str, api_key: Option<&str>, dimension: usize) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new()
                .with_api_base(url)
                .with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            dimension,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, String> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(EmbeddingInput::String(text.to_string()))
            .dimensions(self.dimension as u32)
            .build()
            .map_err(|e| e.to_string())?;
        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| e.to_string())?;
        response
            .data
            .into_iter()
            .next()
            .map(|e| e.embedding)
            .ok_or_else(|| "embedding response contained no data".to_string())
    }
}

/// 离线嵌入：按词做 FNV 哈希落桶计数，再做 L2 归一化
///
/// 不具备真实语义能力，只保证同一文本得到同一向量、共享词越多距离越近。
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hash = 1469598103934665603u64;
            for b in token.to_lowercase().as_bytes() {
                hash ^= *b as u64;
                hash = hash.wrapping_mul(1099511628211u64);
            }
            vec[(hash as usize) % self.dimension] += 1.0;
        }

        let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vec {
                *v /= norm;
            }
        }
        vec
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, String> {
        Ok(self.embed_one(text))
    }
}

/// 从 [embedding] 配置创建嵌入提供方；provider=openai 但没有 Key 时退回 HashEmbedder
pub fn create_embedder_from_config(cfg: &EmbeddingSection) -> Arc<dyn EmbeddingProvider> {
    if cfg.provider.eq_ignore_ascii_case("openai") {
        let key = std::env::var("OPENAI_API_KEY").ok();
        if key.as_deref().unwrap_or("").is_empty() {
            tracing::warn!("embedding provider openai but no OPENAI_API_KEY, using hash embedder");
        } else {
            tracing::info!("Using OpenAI embeddings ({}, dim {})", cfg.model, cfg.dimension);
            return Arc::new(OpenAiEmbedder::new(
                cfg.base_url.as_deref(),
                &cfg.model,
                key.as_deref(),
                cfg.dimension,
            ));
        }
    }
    tracing::info!("Using hash embeddings (dim {})", cfg.dimension);
    Arc::new(HashEmbedder::new(cfg.dimension))
}
