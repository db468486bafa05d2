//! 错误类型
//!
//! - MemoryError：长期记忆（嵌入、索引、快照）相关错误
//! - AgentError：单轮对话层面的错误，传输层据此渲染与正常回复不同的错误提示

use thiserror::Error;

/// 长期记忆错误（嵌入失败、维度不符、快照读写失败）
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Embedding failed: {0}")]
    EmbeddingFailed(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// 快照写盘失败：本次 save 未持久化，内存状态已回滚
    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// 单轮对话中未恢复的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Config error: {0}")]
    ConfigError(String),
}

impl From<crate::llm::LlmError> for AgentError {
    fn from(e: crate::llm::LlmError) -> Self {
        AgentError::LlmError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts_to_memory_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: MemoryError = io.into();
        assert!(matches!(err, MemoryError::Io(_)));
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn test_memory_error_surfaces_as_agent_error() {
        let err: AgentError = MemoryError::EmbeddingFailed("offline".into()).into();
        assert!(matches!(err, AgentError::Memory(_)));
        assert!(err.to_string().contains("offline"));
    }
}
