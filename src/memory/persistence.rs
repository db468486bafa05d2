//! 长期记忆快照
//!
//! 两份文件共同构成 MemoryStore 的全部持久状态：
//! - 索引快照（二进制，由 VectorIndex::persist 写出）
//! - 记录快照（JSON 数组，每条含 text + category）
//!
//! 写入时先把两份内容写到同目录的 .tmp 文件，都成功后再依次 rename 覆盖，
//! 写失败不会破坏上一次完整的快照。

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::core::MemoryError;
use crate::memory::store::MemoryRecord;
use crate::memory::vector_index::VectorIndex;

/// 快照文件路径
#[derive(Debug, Clone)]
pub struct SnapshotPaths {
    pub index: PathBuf,
    pub records: PathBuf,
}

impl SnapshotPaths {
    pub fn new(index: impl Into<PathBuf>, records: impl Into<PathBuf>) -> Self {
        Self {
            index: index.into(),
            records: records.into(),
        }
    }

    /// data_dir 下的 index_file 与 data_file
    pub fn in_dir(data_dir: &Path, index_file: &str, data_file: &str) -> Self {
        Self::new(data_dir.join(index_file), data_dir.join(data_file))
    }

    /// 读取记录快照；文件不存在时返回空 Vec。vector_id 按数组下标重新分配
    pub fn load_records(&self) -> Result<Vec<MemoryRecord>, MemoryError> {
        if !self.records.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&self.records)?;
        let mut records: Vec<MemoryRecord> =
            serde_json::from_str(&data).map_err(|e| MemoryError::Serialization(e.to_string()))?;
        for (i, r) in records.iter_mut().enumerate() {
            r.vector_id = i;
        }
        Ok(records)
    }

    /// 同时写出索引与记录快照
    pub fn write_all(&self, index: &dyn VectorIndex, records: &[MemoryRecord]) -> Result<(), MemoryError> {
        for path in [&self.index, &self.records] {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let index_tmp = tmp_path(&self.index);
        let records_tmp = tmp_path(&self.records);

        let staged = stage(index, records, &index_tmp, &records_tmp);
        if let Err(e) = staged {
            let _ = std::fs::remove_file(&index_tmp);
            let _ = std::fs::remove_file(&records_tmp);
            return Err(e);
        }

        std::fs::rename(&index_tmp, &self.index)?;
        std::fs::rename(&records_tmp, &self.records)?;
        Ok(())
    }

    /// 删除记录快照（不存在则忽略）
    pub fn remove_records(&self) -> Result<(), MemoryError> {
        remove_if_exists(&self.records)
    }

    /// 删除索引快照（不存在则忽略）
    pub fn remove_index(&self) -> Result<(), MemoryError> {
        remove_if_exists(&self.index)
    }
}

fn remove_if_exists(path: &Path) -> Result<(), MemoryError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// 整体替换单个文件：先写同目录 .tmp，再 rename 覆盖；写失败时清理 .tmp，原文件不受影响
pub(crate) fn replace_file(path: &Path, data: &[u8]) -> Result<(), MemoryError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = tmp_path(path);
    if let Err(e) = std::fs::write(&tmp, data) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn stage(
    index: &dyn VectorIndex,
    records: &[MemoryRecord],
    index_tmp: &Path,
    records_tmp: &Path,
) -> Result<(), MemoryError> {
    index.persist(index_tmp)?;
    let json = serde_json::to_string_pretty(records)
        .map_err(|e| MemoryError::Serialization(e.to_string()))?;
    std::fs::write(records_tmp, json)?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("snapshot"));
    name.push(".tmp");
    path.with_file_name(name)
}
