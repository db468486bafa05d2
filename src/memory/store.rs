//! 长期语义记忆
//!
//! MemoryStore 持有有序记录序列与向量索引，两者是平行数组：第 i 条记录的 vector_id 恒等于
//! 它在索引中的插入位置 i。两者由同一把 RwLock 保护：
//! - save 持写锁完成「去重检查 → 写索引 → 追加记录 → 落盘」，任何一步失败都回滚到调用前
//! - retrieve 持读锁，不会看到只写了一半的状态
//!
//! 只追加、不压缩；clear_all 是唯一的删除操作（测试 / 基准隔离用）。

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::MemoryError;
use crate::llm::EmbeddingProvider;
use crate::memory::persistence::SnapshotPaths;
use crate::memory::vector_index::{FlatL2Index, VectorIndex};

pub const DEFAULT_CATEGORY: &str = "general";

/// 去重时检查的近邻数
pub const DEFAULT_DEDUP_NEIGHBORS: usize = 5;

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// 一条长期记忆
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub text: String,
    #[serde(default = "default_category")]
    pub category: String,
    /// 在向量索引中的位置；快照中不存储，加载时按下标恢复
    #[serde(skip)]
    pub vector_id: usize,
}

impl MemoryRecord {
    pub fn new(text: impl Into<String>, category: impl Into<String>, vector_id: usize) -> Self {
        Self {
            text: text.into(),
            category: category.into(),
            vector_id,
        }
    }

    /// 检索结果格式：`[CATEGORY] text`
    pub fn formatted(&self) -> String {
        format!("[{}] {}", self.category.to_uppercase(), self.text)
    }
}

/// save 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Stored { vector_id: usize },
    /// 已有 text 与 category 都相同的记录，未写入
    Duplicate,
    /// 文本为空，未写入
    Rejected,
}

struct StoreState {
    records: Vec<MemoryRecord>,
    index: Box<dyn VectorIndex>,
}

/// 嵌入维度必须与索引一致，否则检索会静默失效
fn check_dimension(index: &dyn VectorIndex, embedding: &[f32]) -> Result<(), MemoryError> {
    if embedding.len() != index.dimension() {
        return Err(MemoryError::DimensionMismatch {
            expected: index.dimension(),
            actual: embedding.len(),
        });
    }
    Ok(())
}

/// 去重候选：最近的 k 条，外加与第 k 条距离并列的全部记录
///
/// 同一文本在多个 category 下存储时向量完全相同，距离并列的记录可能超过 k 条。
fn dedup_candidates(index: &dyn VectorIndex, query: &[f32], k: usize) -> Vec<usize> {
    let k = k.max(1).min(index.len());
    let mut nearest = index.search(query, k + 1);
    let Some(&(_, cutoff)) = nearest.get(k - 1) else {
        return nearest.into_iter().map(|(id, _)| id).collect();
    };
    let tied_beyond_k = nearest.get(k).is_some_and(|&(_, d)| d <= cutoff);
    if tied_beyond_k {
        nearest = index.search(query, index.len());
    }
    nearest
        .into_iter()
        .take_while(|&(_, d)| d <= cutoff)
        .map(|(id, _)| id)
        .collect()
}

/// 进程级长期记忆，由入口创建后以 Arc 注入编排器
pub struct MemoryStore {
    state: RwLock<StoreState>,
    embedder: Arc<dyn EmbeddingProvider>,
    paths: SnapshotPaths,
    dedup_neighbors: usize,
}

impl MemoryStore {
    /// 从快照打开（任一文件缺失视为空），索引为 FlatL2Index
    pub fn open(paths: SnapshotPaths, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self, MemoryError> {
        let index = FlatL2Index::load(&paths.index, embedder.dimension())?;
        let records = paths.load_records()?;
        Ok(Self::with_index(Box::new(index), records, paths, embedder))
    }

    /// 用给定索引与记录构建；两者长度不一致时只保留公共前缀
    pub fn with_index(
        mut index: Box<dyn VectorIndex>,
        mut records: Vec<MemoryRecord>,
        paths: SnapshotPaths,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let keep = index.len().min(records.len());
        if index.len() != records.len() {
            tracing::warn!(
                index_len = index.len(),
                records_len = records.len(),
                keep,
                "memory snapshots diverged, keeping common prefix"
            );
            index.truncate(keep);
            records.truncate(keep);
        }
        tracing::info!(records = keep, "long-term memory loaded");
        Self {
            state: RwLock::new(StoreState { records, index }),
            embedder,
            paths,
            dedup_neighbors: DEFAULT_DEDUP_NEIGHBORS,
        }
    }

    pub fn with_dedup_neighbors(mut self, n: usize) -> Self {
        self.dedup_neighbors = n.max(1);
        self
    }

    pub fn paths(&self) -> &SnapshotPaths {
        &self.paths
    }

    /// 写入一条事实；category 缺省为 "general"
    ///
    /// 空文本与精确重复（text 与 category 都相同）是静默的 no-op。
    /// 落盘失败返回错误，内存状态保持与上一次快照一致。
    pub async fn save(&self, text: &str, category: Option<&str>) -> Result<SaveOutcome, MemoryError> {
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!("memory save rejected: empty text");
            return Ok(SaveOutcome::Rejected);
        }
        let category = category
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CATEGORY);

        let embedding = self
            .embedder
            .embed(text)
            .await
            .map_err(MemoryError::EmbeddingFailed)?;

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        check_dimension(state.index.as_ref(), &embedding)?;

        if !state.index.is_empty() {
            let duplicate = dedup_candidates(state.index.as_ref(), &embedding, self.dedup_neighbors)
                .into_iter()
                .filter_map(|id| state.records.get(id))
                .any(|r| r.text == text && r.category == category);
            if duplicate {
                tracing::debug!(category, "memory save skipped: duplicate");
                return Ok(SaveOutcome::Duplicate);
            }
        }

        let prev_len = state.records.len();
        let vector_id = state.index.add(embedding)?;
        state.records.push(MemoryRecord::new(text, category, vector_id));

        if let Err(e) = self.paths.write_all(state.index.as_ref(), &state.records) {
            state.index.truncate(prev_len);
            state.records.truncate(prev_len);
            return Err(e);
        }

        tracing::info!(vector_id, category, "memory saved");
        Ok(SaveOutcome::Stored { vector_id })
    }

    /// 检索最相关的至多 k 条，最近在前，格式 `[CATEGORY] text`；同一次结果内相同文本只出现一次
    ///
    /// 空库直接返回空结果，不调用嵌入。
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, MemoryError> {
        let state = self.state.read().await;
        if state.records.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(MemoryError::EmbeddingFailed)?;
        check_dimension(state.index.as_ref(), &embedding)?;

        let n = k.min(state.records.len());
        let mut seen: HashSet<&str> = HashSet::new();
        let mut results = Vec::with_capacity(n);
        for (id, _distance) in state.index.search(&embedding, n) {
            let Some(record) = state.records.get(id) else {
                continue;
            };
            if !seen.insert(record.text.as_str()) {
                continue;
            }
            results.push(record.formatted());
        }
        Ok(results)
    }

    /// retrieve 的结果按行拼接；无结果时为空串
    pub async fn retrieve_context(&self, query: &str, k: usize) -> Result<String, MemoryError> {
        Ok(self.retrieve(query, k).await?.join("\n"))
    }

    /// 清空内存中的记录与索引，并删除快照文件
    ///
    /// 先删记录快照再删索引快照：记录快照一旦删除，持久状态即为空，内存随之清空；
    /// 之后索引快照删除失败时返回错误，但内存与磁盘仍一致（重启后同样为空）。
    pub async fn clear_all(&self) -> Result<(), MemoryError> {
        let mut state = self.state.write().await;
        self.paths.remove_records()?;
        state.index.reset();
        state.records.clear();
        self.paths.remove_index()?;
        tracing::info!("long-term memory cleared");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// 当前全部记录的拷贝（按 vector_id 顺序）
    pub async fn records(&self) -> Vec<MemoryRecord> {
        self.state.read().await.records.clone()
    }
}
