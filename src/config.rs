//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `COURSE_RAG__*` 覆盖（双下划线表示嵌套，如 `COURSE_RAG__LLM__MODEL=...`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub embedding: EmbeddingSection,
    #[serde(default)]
    pub store: StoreSection,
}

/// [app] 段：应用名、会话历史窗口
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    /// 每个会话保留的问答对数量
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            max_history: default_max_history(),
        }
    }
}

fn default_max_history() -> usize {
    2
}

/// [llm] 段：后端、模型、采样参数与工具轮数上限
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：anthropic / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// 未设置时读取 ANTHROPIC_API_KEY
    pub api_key: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// 单次提问内最多几轮工具调用
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            api_key: None,
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            max_rounds: default_max_rounds(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "anthropic".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    800
}

fn default_max_rounds() -> usize {
    2
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [embedding] 段：openai（需 OPENAI_API_KEY）或 hashing（离线）
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingSection {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// 仅 hashing 使用
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            base_url: None,
            dimensions: default_dimensions(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_dimensions() -> usize {
    512
}

/// [store] 段：检索条数与语料快照路径
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSection {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    pub snapshot_path: Option<PathBuf>,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            snapshot_path: None,
        }
    }
}

fn default_max_results() -> usize {
    5
}

/// 从 config 目录加载配置，环境变量 COURSE_RAG__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 COURSE_RAG__*（双下划线表示嵌套键）
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
        config::Environment::with_prefix("COURSE_RAG")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
