//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `CAREBOT__*` 覆盖（双下划线表示嵌套，如 `CAREBOT__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub embedding: EmbeddingSection,
    pub memory: MemorySection,
}

/// [app] 段：应用名、数据目录、短期历史长度、检索条数
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    /// 快照所在目录，未设置时用当前目录
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// 每个会话保留的历史消息条数（短期记忆）
    #[serde(default = "default_max_history_messages")]
    pub max_history_messages: usize,
    /// 每轮从长期记忆检索的条数
    #[serde(default = "default_retrieve_k")]
    pub retrieve_k: usize,
    /// CLI 使用的会话 ID；未设置时每次启动生成新的 UUID
    pub session_id: Option<String>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            data_dir: default_data_dir(),
            max_history_messages: default_max_history_messages(),
            retrieve_k: default_retrieve_k(),
            session_id: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_history_messages() -> usize {
    6
}

fn default_retrieve_k() -> usize {
    3
}

/// [llm] 段：回复模型后端
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：ollama / openai / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            temperature: default_temperature(),
        }
    }
}

fn default_provider() -> String {
    "ollama".to_string()
}

fn default_model() -> String {
    "llama3".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

/// [embedding] 段：嵌入后端与维度
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingSection {
    /// 后端：hash / openai
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// 向量维度 D，索引快照与之不符时拒绝加载
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    pub base_url: Option<String>,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dimension: default_dimension(),
            base_url: None,
        }
    }
}

fn default_embedding_provider() -> String {
    "hash".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_dimension() -> usize {
    384
}

/// [memory] 段：快照文件名、去重近邻数、事实抽取方式
#[derive(Debug, Clone, Deserialize)]
pub struct MemorySection {
    #[serde(default = "default_index_file")]
    pub index_file: String,
    #[serde(default = "default_data_file")]
    pub data_file: String,
    #[serde(default = "default_dedup_neighbors")]
    pub dedup_neighbors: usize,
    /// 是否在每轮结束后做事实抽取
    #[serde(default = "default_true")]
    pub extraction_enabled: bool,
    /// 事实抽取放到后台任务（true）还是在本轮内等待完成（false）
    #[serde(default = "default_true")]
    pub background_extraction: bool,
    /// 是否把检索到的长期记忆注入提示词（关闭后可对比有无记忆时的回复）
    #[serde(default = "default_true")]
    pub retrieval_enabled: bool,
    /// 用户日记文件（位于 data_dir 下）
    #[serde(default = "default_journal_file")]
    pub journal_file: String,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            index_file: default_index_file(),
            data_file: default_data_file(),
            dedup_neighbors: default_dedup_neighbors(),
            extraction_enabled: true,
            background_extraction: true,
            retrieval_enabled: true,
            journal_file: default_journal_file(),
        }
    }
}

fn default_index_file() -> String {
    "memory.index".to_string()
}

fn default_data_file() -> String {
    "memory.json".to_string()
}

fn default_journal_file() -> String {
    "journal.json".to_string()
}

fn default_dedup_neighbors() -> usize {
    5
}

fn default_true() -> bool {
    true
}

/// 从 config 目录加载配置，环境变量 CAREBOT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 CAREBOT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("CAREBOT")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
