//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `NARRATORIA__*` 覆盖（双下划线表示嵌套，如 `NARRATORIA__LLM__PROVIDER=mock`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineSection,
    pub llm: LlmSection,
    pub embedding: EmbeddingSection,
    pub store: StoreSection,
    pub tools: ToolsSection,
}

/// [engine] 段：三阶段循环的检索 / 重试 / 叙述约束旋钮
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// THINK 时带入的最近 StateDelta 条数
    pub history_window: usize,
    /// 每轮 manifest 最多保留的检索查询数
    pub rag_query_limit: usize,
    /// 每条查询取回的最近邻数
    pub rag_results_per_query: usize,
    /// 余弦距离阈值，超过即丢弃（越小越相似）
    pub semantic_max_distance: f32,
    pub max_think_retries: usize,
    /// narration_directive.sentences 的上限
    pub max_directive_sentences: u32,
    /// 叙述 prompt 中工具结果 JSON 的最大字符数
    pub max_tool_result_chars: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            history_window: 5,
            rag_query_limit: 3,
            rag_results_per_query: 3,
            semantic_max_distance: 0.35,
            max_think_retries: 3,
            max_directive_sentences: 5,
            max_tool_result_chars: 4000,
        }
    }
}

/// [llm] 段：后端选择与两种调用模式的采样参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：openai / deepseek / mock；无 API Key 时自动退回 mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    /// THINK：短输出、低温度
    pub think: ThinkSampling,
    /// NARRATE：长输出、较高温度
    pub narrate: NarrateSampling,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            think: ThinkSampling::default(),
            narrate: NarrateSampling::default(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

/// [llm.think]；缺省字段各自取 THINK 默认值
#[derive(Debug, Clone, Deserialize)]
pub struct ThinkSampling {
    #[serde(default = "default_think_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_think_temperature")]
    pub temperature: f32,
}

impl Default for ThinkSampling {
    fn default() -> Self {
        Self {
            max_tokens: default_think_max_tokens(),
            temperature: default_think_temperature(),
        }
    }
}

fn default_think_max_tokens() -> u32 {
    256
}

fn default_think_temperature() -> f32 {
    0.2
}

/// [llm.narrate]；缺省字段各自取 NARRATE 默认值
#[derive(Debug, Clone, Deserialize)]
pub struct NarrateSampling {
    #[serde(default = "default_narrate_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_narrate_temperature")]
    pub temperature: f32,
}

impl Default for NarrateSampling {
    fn default() -> Self {
        Self {
            max_tokens: default_narrate_max_tokens(),
            temperature: default_narrate_temperature(),
        }
    }
}

fn default_narrate_max_tokens() -> u32 {
    512
}

fn default_narrate_temperature() -> f32 {
    0.7
}

/// [embedding] 段：openai（远端 /embeddings）或 hash（本地确定性特征哈希）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingSection {
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            provider: "hash".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 384,
        }
    }
}

/// [store] 段：sqlite（落盘）或 memory（进程内，重启即丢）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub backend: String,
    pub path: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            path: PathBuf::from("memory_prototype_db/narratoria.sqlite3"),
        }
    }
}

/// [tools] 段：单次工具调用超时（秒）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
        }
    }
}

/// 从 config 目录加载配置，环境变量 NARRATORIA__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 NARRATORIA__*（双下划线表示嵌套键）
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
        config::Environment::with_prefix("NARRATORIA")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_defaults_match_documented_knobs() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.engine.history_window, 5);
        assert_eq!(cfg.engine.rag_query_limit, 3);
        assert_eq!(cfg.engine.rag_results_per_query, 3);
        assert!((cfg.engine.semantic_max_distance - 0.35).abs() < f32::EPSILON);
        assert_eq!(cfg.engine.max_think_retries, 3);
        assert_eq!(cfg.engine.max_directive_sentences, 5);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "[engine]\nhistory_window = 8\n[llm.narrate]\ntemperature = 0.9\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.engine.history_window, 8);
        assert_eq!(cfg.engine.rag_query_limit, 3);
        assert!((cfg.llm.narrate.temperature - 0.9).abs() < f32::EPSILON);
        assert_eq!(cfg.llm.narrate.max_tokens, 512);
        assert_eq!(cfg.llm.think.max_tokens, 256);
        assert_eq!(cfg.store.backend, "sqlite");
    }

    #[test]
    fn test_partial_sampling_sections_keep_their_own_defaults() {
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(
                "[llm.narrate]\nmax_tokens = 600\n[llm.think]\ntemperature = 0.1\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.llm.narrate.max_tokens, 600);
        assert!((cfg.llm.narrate.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(cfg.llm.think.max_tokens, 256);
        assert!((cfg.llm.think.temperature - 0.1).abs() < f32::EPSILON);
    }
}
