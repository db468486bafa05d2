//! 记忆层：短期（对话窗口）、长期（语义记忆 + 向量索引 + 快照）、事实抽取、用户日记

pub mod conversation;
pub mod extractor;
pub mod journal;
pub mod persistence;
pub mod store;
pub mod vector_index;

pub use conversation::{ConversationMemory, Message, Role};
pub use extractor::{parse_extraction, ExtractedFact, ExtractionError, FactExtractor, LlmFactExtractor};
pub use journal::{JournalStore, JOURNAL_SAVED};
pub use persistence::SnapshotPaths;
pub use store::{MemoryRecord, MemoryStore, SaveOutcome, DEFAULT_CATEGORY, DEFAULT_DEDUP_NEIGHBORS};
pub use vector_index::{FlatL2Index, VectorIndex};
