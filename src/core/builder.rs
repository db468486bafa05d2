//! 编排器构建器：按配置组装长期记忆、日记、会话表、回复模型与事实抽取器
//!
//! CLI 与测试共用同一套初始化逻辑；回复模型可替换（测试注入 Mock）。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::orchestrator::create_llm_from_config;
use crate::core::{AgentError, ConversationOrchestrator};
use crate::gateway::SessionTable;
use crate::llm::{create_embedder_from_config, EmbeddingProvider, LlmClient};
use crate::memory::{JournalStore, LlmFactExtractor, MemoryStore, SnapshotPaths};

/// 编排器构建器
pub struct OrchestratorBuilder {
    config: AppConfig,
    llm: Option<Arc<dyn LlmClient>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl OrchestratorBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            llm: None,
            embedder: None,
        }
    }

    /// 使用给定的回复模型（默认按 [llm] 段创建）
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// 使用给定的嵌入后端（默认按 [embedding] 段创建）
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// 快照文件位置：data_dir 下的 index_file / data_file
    pub fn snapshot_paths(&self) -> SnapshotPaths {
        SnapshotPaths::in_dir(
            &self.config.app.data_dir,
            &self.config.memory.index_file,
            &self.config.memory.data_file,
        )
    }

    /// 加载长期记忆快照并组装编排器；快照损坏或维度不符时返回错误
    pub fn build(self) -> Result<ConversationOrchestrator, AgentError> {
        let paths = self.snapshot_paths();
        let cfg = self.config;

        if cfg.embedding.dimension == 0 {
            return Err(AgentError::ConfigError(
                "embedding.dimension must be greater than 0".to_string(),
            ));
        }

        let embedder = self
            .embedder
            .unwrap_or_else(|| create_embedder_from_config(&cfg.embedding));
        let memory = MemoryStore::open(paths, embedder)?
            .with_dedup_neighbors(cfg.memory.dedup_neighbors);
        let memory = Arc::new(memory);

        let journal = Arc::new(JournalStore::open(
            cfg.app.data_dir.join(&cfg.memory.journal_file),
        )?);

        let llm = self.llm.unwrap_or_else(|| create_llm_from_config(&cfg));
        let sessions = Arc::new(SessionTable::new(cfg.app.max_history_messages));

        let mut orchestrator = ConversationOrchestrator::new(memory, sessions, Arc::clone(&llm))
            .with_journal(journal)
            .with_retrieve_k(cfg.app.retrieve_k)
            .with_memory_retrieval(cfg.memory.retrieval_enabled)
            .with_background_extraction(cfg.memory.background_extraction);
        if cfg.memory.extraction_enabled {
            orchestrator = orchestrator.with_extractor(Arc::new(LlmFactExtractor::new(llm)));
        }

        tracing::info!(
            app = cfg.app.name.as_deref().unwrap_or("carebot"),
            data_dir = %cfg.app.data_dir.display(),
            "orchestrator ready"
        );
        Ok(orchestrator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{HashEmbedder, MockLlmClient};

    fn config_in(dir: &std::path::Path) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.app.data_dir = dir.to_path_buf();
        cfg.llm.provider = "mock".to_string();
        cfg.embedding.dimension = 32;
        cfg
    }

    #[tokio::test]
    async fn test_build_with_empty_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let orch = OrchestratorBuilder::new(config_in(dir.path()))
            .with_embedder(Arc::new(HashEmbedder::new(32)))
            .build()
            .unwrap();
        assert!(orch.memory().is_empty().await);
        assert_eq!(orch.sessions().history_limit(), 6);
    }

    #[tokio::test]
    async fn test_build_reloads_saved_memory() {
        let dir = tempfile::tempdir().unwrap();
        {
            let orch = OrchestratorBuilder::new(config_in(dir.path()))
                .with_embedder(Arc::new(HashEmbedder::new(32)))
                .build()
                .unwrap();
            orch.memory().save("User likes tea", None).await.unwrap();
        }
        let orch = OrchestratorBuilder::new(config_in(dir.path()))
            .with_embedder(Arc::new(HashEmbedder::new(32)))
            .with_llm(Arc::new(MockLlmClient::new()))
            .build()
            .unwrap();
        assert_eq!(orch.memory().len().await, 1);
    }

    #[tokio::test]
    async fn test_journal_lives_in_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        {
            let orch = OrchestratorBuilder::new(config_in(dir.path()))
                .with_embedder(Arc::new(HashEmbedder::new(32)))
                .build()
                .unwrap();
            orch.journal().save("s1", "First good day in a while").await.unwrap();
        }
        assert!(dir.path().join("journal.json").exists());

        let orch = OrchestratorBuilder::new(config_in(dir.path()))
            .with_embedder(Arc::new(HashEmbedder::new(32)))
            .build()
            .unwrap();
        assert_eq!(orch.journal().entries("s1").await, vec!["First good day in a while"]);
    }

    #[test]
    fn test_zero_dimension_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config_in(dir.path());
        cfg.embedding.dimension = 0;
        let err = OrchestratorBuilder::new(cfg).build().err().unwrap();
        assert!(matches!(err, AgentError::ConfigError(_)));
    }

    #[test]
    fn test_dimension_mismatch_refuses_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let orch = OrchestratorBuilder::new(config_in(dir.path()))
                .with_embedder(Arc::new(HashEmbedder::new(32)))
                .build()
                .unwrap();
            orch.memory().save("User likes tea", None).await.unwrap();
        });

        let err = OrchestratorBuilder::new(config_in(dir.path()))
            .with_embedder(Arc::new(HashEmbedder::new(16)))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, AgentError::Memory(_)));
    }
}
