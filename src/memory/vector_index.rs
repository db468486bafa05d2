//! 向量索引：最近邻检索原语
//!
//! FlatL2Index 为精确暴力检索（平方 L2 距离），id 即插入顺序，从 0 单调递增。
//! 快照为 bincode 编码的 {dimension, vectors}。

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::MemoryError;

/// 最近邻检索索引
pub trait VectorIndex: Send + Sync {
    /// 追加一条向量，返回分配的 id
    fn add(&mut self, vector: Vec<f32>) -> Result<usize, MemoryError>;

    /// 返回最近的至多 k 条 (id, 距离)，最近在前
    fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dimension(&self) -> usize;

    /// 清空全部向量
    fn reset(&mut self);

    /// 丢弃 len 之后的向量；仅用于 save 失败时回滚
    fn truncate(&mut self, len: usize);

    /// 写入二进制快照
    fn persist(&self, path: &Path) -> Result<(), MemoryError>;
}

#[derive(Serialize, Deserialize)]
struct FlatSnapshot {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

/// 精确暴力 L2 索引
#[derive(Debug, Clone)]
pub struct FlatL2Index {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatL2Index {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
        }
    }

    /// 从快照加载；文件不存在时返回空索引
    pub fn load(path: &Path, dimension: usize) -> Result<Self, MemoryError> {
        if !path.exists() {
            return Ok(Self::new(dimension));
        }
        let data = std::fs::read(path)?;
        let snapshot: FlatSnapshot =
            bincode::deserialize(&data).map_err(|e| MemoryError::Serialization(e.to_string()))?;
        if snapshot.dimension != dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: dimension,
                actual: snapshot.dimension,
            });
        }
        if let Some(bad) = snapshot.vectors.iter().find(|v| v.len() != dimension) {
            return Err(MemoryError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }
        Ok(Self {
            dimension,
            vectors: snapshot.vectors,
        })
    }
}

/// 平方 L2 距离
fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl VectorIndex for FlatL2Index {
    fn add(&mut self, vector: Vec<f32>) -> Result<usize, MemoryError> {
        if vector.len() != self.dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.vectors.push(vector);
        Ok(self.vectors.len() - 1)
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        if k == 0 || query.len() != self.dimension {
            return Vec::new();
        }
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(id, v)| (id, l2_squared(query, v)))
            .collect();
        // 距离相同时 id 小者在前，保证结果确定
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        scored
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn reset(&mut self) {
        self.vectors.clear();
    }

    fn truncate(&mut self, len: usize) {
        self.vectors.truncate(len);
    }

    fn persist(&self, path: &Path) -> Result<(), MemoryError> {
        let snapshot = FlatSnapshot {
            dimension: self.dimension,
            vectors: self.vectors.clone(),
        };
        let data =
            bincode::serialize(&snapshot).map_err(|e| MemoryError::Serialization(e.to_string()))?;
        std::fs::write(path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_follow_insertion_order() {
        let mut idx = FlatL2Index::new(2);
        assert_eq!(idx.add(vec![0.0, 0.0]).unwrap(), 0);
        assert_eq!(idx.add(vec![1.0, 0.0]).unwrap(), 1);
        assert_eq!(idx.add(vec![5.0, 5.0]).unwrap(), 2);
        assert_eq!(idx.len(), 3);
    }

    #[test]
    fn test_search_nearest_first() {
        let mut idx = FlatL2Index::new(2);
        idx.add(vec![10.0, 10.0]).unwrap();
        idx.add(vec![0.0, 0.1]).unwrap();
        idx.add(vec![3.0, 3.0]).unwrap();
        let hits: Vec<usize> = idx.search(&[0.0, 0.0], 3).into_iter().map(|(id, _)| id).collect();
        assert_eq!(hits, vec![1, 2, 0]);
        assert_eq!(idx.search(&[0.0, 0.0], 1).len(), 1);
    }

    #[test]
    fn test_rejects_wrong_dimension() {
        let mut idx = FlatL2Index::new(3);
        let err = idx.add(vec![1.0]).unwrap_err();
        assert!(matches!(err, MemoryError::DimensionMismatch { expected: 3, actual: 1 }));
        assert!(idx.is_empty());
    }

    #[test]
    fn test_persist_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.index");

        let mut idx = FlatL2Index::new(2);
        idx.add(vec![1.0, 2.0]).unwrap();
        idx.add(vec![3.0, 4.0]).unwrap();
        idx.persist(&path).unwrap();

        let loaded = FlatL2Index::load(&path, 2).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.search(&[3.0, 4.0], 1)[0].0, 1);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let idx = FlatL2Index::load(&dir.path().join("absent.index"), 4).unwrap();
        assert!(idx.is_empty());
        assert_eq!(idx.dimension(), 4);
    }

    #[test]
    fn test_truncate_and_reset() {
        let mut idx = FlatL2Index::new(1);
        for i in 0..4 {
            idx.add(vec![i as f32]).unwrap();
        }
        idx.truncate(2);
        assert_eq!(idx.len(), 2);
        idx.reset();
        assert!(idx.is_empty());
    }
}
