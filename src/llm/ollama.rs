//! Ollama 本地模型客户端（OpenAI 兼容格式）
//!
//! Ollama 在 /v1 下提供 OpenAI 兼容的 chat completions 接口。
//! - Base URL: http://localhost:11434/v1
//! - 默认模型: llama3

use crate::llm::OpenAiClient;

pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
pub const OLLAMA_DEFAULT_MODEL: &str = "llama3";

/// 创建 Ollama 客户端
///
/// - base_url 未指定时读取 `OLLAMA_BASE_URL` 环境变量，再退回本机默认端口
/// - Ollama 不校验 API Key，但 OpenAI 兼容层要求非空，这里固定为 "ollama"
pub fn create_ollama_client(base_url: Option<&str>, model: Option<&str>) -> OpenAiClient {
    let base = base_url
        .map(String::from)
        .or_else(|| std::env::var("OLLAMA_BASE_URL").ok())
        .unwrap_or_else(|| OLLAMA_BASE_URL.to_string());

    let model = model
        .map(String::from)
        .unwrap_or_else(|| OLLAMA_DEFAULT_MODEL.to_string());

    OpenAiClient::new(Some(&base), &model, Some("ollama"))
}
