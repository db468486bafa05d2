//! 用户日记
//!
//! 按用户 ID 追加的自由文本条目，与长期语义记忆分开：不做嵌入、不去重、不参与检索。
//! 落盘为 JSON 对象 `{user_id: [entry, ...]}`，整文件先写 .tmp 再 rename 覆盖。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::sync::RwLock;

use crate::core::MemoryError;
use crate::memory::persistence::replace_file;

/// 写入成功后给用户的确认语
pub const JOURNAL_SAVED: &str = "Journal entry saved.";

/// 日记存储
pub struct JournalStore {
    entries: RwLock<BTreeMap<String, Vec<String>>>,
    path: Option<PathBuf>,
}

impl JournalStore {
    /// 仅在内存中保存（进程退出即丢失）
    pub fn in_memory() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            path: None,
        }
    }

    /// 从 JSON 文件打开；文件不存在时为空
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, MemoryError> {
        let path = path.into();
        let entries = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            serde_json::from_str(&data).map_err(|e| MemoryError::Serialization(e.to_string()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            entries: RwLock::new(entries),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// 追加一条日记；空文本返回 Ok(false) 且不写入。落盘失败时撤销本次追加
    pub async fn save(&self, user_id: &str, entry: &str) -> Result<bool, MemoryError> {
        let entry = entry.trim();
        if entry.is_empty() {
            return Ok(false);
        }

        let mut entries = self.entries.write().await;
        entries
            .entry(user_id.to_string())
            .or_default()
            .push(entry.to_string());

        if let Some(path) = &self.path {
            let persisted = serde_json::to_vec_pretty(&*entries)
                .map_err(|e| MemoryError::Serialization(e.to_string()))
                .and_then(|json| replace_file(path, &json));
            if let Err(e) = persisted {
                if let Some(list) = entries.get_mut(user_id) {
                    list.pop();
                    if list.is_empty() {
                        entries.remove(user_id);
                    }
                }
                return Err(e);
            }
        }

        tracing::info!(user_id, "journal entry saved");
        Ok(true)
    }

    /// 某用户的全部日记（按写入顺序）；没有记录时为空
    pub async fn entries(&self, user_id: &str) -> Vec<String> {
        self.entries
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for JournalStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
