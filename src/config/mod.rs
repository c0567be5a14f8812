//! Configuration management.

use crate::models::RankingMode;
use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration for arcana.
#[derive(Debug, Clone)]
pub struct ArcanaConfig {
    /// Path to the raw corpus text file.
    pub corpus_path: PathBuf,
    /// Retrieval parameters.
    pub retrieval: RetrievalConfig,
    /// Conversational memory parameters.
    pub memory: MemoryConfig,
    /// Agentic loop parameters.
    pub agent: AgentConfig,
    /// LLM provider configuration.
    pub llm: LlmConfig,
}

/// Retrieval and ranking parameters.
///
/// The keyword length threshold and boost exponent are empirical choices for
/// the corpus language, not derived from a principled model, so they are
/// configuration rather than constants.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Documents returned per query.
    pub top_k: usize,
    /// Boost base applied per distinct matched keyword.
    pub keyword_boost: f64,
    /// Minimum keyword length in characters.
    pub keyword_min_len: usize,
    /// Ranking strategy.
    pub mode: RankingMode,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            keyword_boost: 4.0,
            keyword_min_len: 4,
            mode: RankingMode::DiversityFirst,
        }
    }
}

/// Conversational memory parameters.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Most recent turns kept verbatim before summarization triggers.
    pub max_short_memory: usize,
    /// Token budget for the assembled prompt.
    pub max_context_tokens: usize,
    /// Assembled-prompt token count that triggers re-summarization.
    pub summarize_threshold: usize,
    /// Whether summarization runs automatically.
    pub auto_summarize: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_short_memory: 5,
            max_context_tokens: 6000,
            summarize_threshold: 4000,
            auto_summarize: true,
        }
    }
}

/// Agentic loop parameters.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Hard iteration bound for the tool loop.
    pub max_iterations: usize,
    /// Iteration at which tool calls are forbidden and an immediate answer
    /// is demanded. Must be <= `max_iterations`.
    pub force_stop_threshold: usize,
    /// Sampling temperature for agentic completions (low, for precision).
    pub temperature: f32,
    /// Maximum tokens per agentic completion.
    pub max_tokens: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            force_stop_threshold: 10,
            temperature: 0.3,
            max_tokens: 4000,
        }
    }
}

/// LLM provider configuration.
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    /// Provider name: "lmstudio" or "openai".
    pub provider: LlmProviderKind,
    /// Model name.
    pub model: Option<String>,
    /// API key (for hosted providers).
    pub api_key: Option<String>,
    /// Base URL override (for self-hosted endpoints).
    pub base_url: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
}

/// Available LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProviderKind {
    /// LM Studio (local, OpenAI-compatible).
    #[default]
    LmStudio,
    /// `OpenAI` GPT.
    OpenAi,
}

impl LlmProviderKind {
    /// Parses a provider string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "openai" => Self::OpenAi,
            _ => Self::LmStudio,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Corpus file path.
    pub corpus_path: Option<String>,
    /// Retrieval section.
    pub retrieval: Option<ConfigFileRetrieval>,
    /// Memory section.
    pub memory: Option<ConfigFileMemory>,
    /// Agent section.
    pub agent: Option<ConfigFileAgent>,
    /// LLM section.
    pub llm: Option<ConfigFileLlm>,
}

/// Retrieval section in the config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileRetrieval {
    /// Documents per query.
    pub top_k: Option<usize>,
    /// Keyword boost base.
    pub keyword_boost: Option<f64>,
    /// Minimum keyword length.
    pub keyword_min_len: Option<usize>,
    /// Ranking mode name.
    pub mode: Option<String>,
}

/// Memory section in the config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileMemory {
    /// Verbatim turn capacity.
    pub max_short_memory: Option<usize>,
    /// Prompt token budget.
    pub max_context_tokens: Option<usize>,
    /// Summarization token threshold.
    pub summarize_threshold: Option<usize>,
    /// Auto-summarize flag.
    pub auto_summarize: Option<bool>,
}

/// Agent section in the config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileAgent {
    /// Iteration bound.
    pub max_iterations: Option<usize>,
    /// Forced-answer threshold.
    pub force_stop_threshold: Option<usize>,
    /// Completion temperature.
    pub temperature: Option<f32>,
    /// Completion max tokens.
    pub max_tokens: Option<u32>,
}

/// LLM section in the config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLlm {
    /// Provider name.
    pub provider: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Base URL.
    pub base_url: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
}

impl Default for ArcanaConfig {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from("cosmic_texts.txt"),
            retrieval: RetrievalConfig::default(),
            memory: MemoryConfig::default(),
            agent: AgentConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl ArcanaConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &std::path::Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: e.to_string(),
            })?;

        let file: ConfigFile =
            toml::from_str(&contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the platform config dir first, then `~/.config/arcana/` for
    /// Unix compatibility. Returns defaults if no file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let platform_config = base_dirs.config_dir().join("arcana").join("config.toml");
        if platform_config.exists() {
            if let Ok(config) = Self::load_from_file(&platform_config) {
                return config;
            }
        }

        let xdg_config = base_dirs
            .home_dir()
            .join(".config")
            .join("arcana")
            .join("config.toml");
        if xdg_config.exists() {
            if let Ok(config) = Self::load_from_file(&xdg_config) {
                return config;
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `ArcanaConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(corpus_path) = file.corpus_path {
            config.corpus_path = PathBuf::from(corpus_path);
        }
        if let Some(retrieval) = file.retrieval {
            if let Some(v) = retrieval.top_k {
                config.retrieval.top_k = v;
            }
            if let Some(v) = retrieval.keyword_boost {
                config.retrieval.keyword_boost = v;
            }
            if let Some(v) = retrieval.keyword_min_len {
                config.retrieval.keyword_min_len = v;
            }
            if let Some(mode) = retrieval.mode {
                config.retrieval.mode = RankingMode::parse(&mode);
            }
        }
        if let Some(memory) = file.memory {
            if let Some(v) = memory.max_short_memory {
                config.memory.max_short_memory = v;
            }
            if let Some(v) = memory.max_context_tokens {
                config.memory.max_context_tokens = v;
            }
            if let Some(v) = memory.summarize_threshold {
                config.memory.summarize_threshold = v;
            }
            if let Some(v) = memory.auto_summarize {
                config.memory.auto_summarize = v;
            }
        }
        if let Some(agent) = file.agent {
            if let Some(v) = agent.max_iterations {
                config.agent.max_iterations = v;
            }
            if let Some(v) = agent.force_stop_threshold {
                config.agent.force_stop_threshold = v;
            }
            if let Some(v) = agent.temperature {
                config.agent.temperature = v;
            }
            if let Some(v) = agent.max_tokens {
                config.agent.max_tokens = v;
            }
        }
        if let Some(llm) = file.llm {
            if let Some(provider) = llm.provider {
                config.llm.provider = LlmProviderKind::parse(&provider);
            }
            config.llm.model = llm.model;
            config.llm.api_key = llm.api_key;
            config.llm.base_url = llm.base_url;
            config.llm.timeout_ms = llm.timeout_ms;
            config.llm.connect_timeout_ms = llm.connect_timeout_ms;
        }

        config
    }

    /// Sets the corpus path.
    #[must_use]
    pub fn with_corpus_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.corpus_path = path.into();
        self
    }

    /// Sets the retrieval parameters.
    #[must_use]
    pub fn with_retrieval(mut self, retrieval: RetrievalConfig) -> Self {
        self.retrieval = retrieval;
        self
    }

    /// Sets the memory parameters.
    #[must_use]
    pub fn with_memory(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }

    /// Sets the agent parameters.
    #[must_use]
    pub fn with_agent(mut self, agent: AgentConfig) -> Self {
        self.agent = agent;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ArcanaConfig::default();
        assert_eq!(config.retrieval.top_k, 10);
        assert!((config.retrieval.keyword_boost - 4.0).abs() < f64::EPSILON);
        assert_eq!(config.memory.max_short_memory, 5);
        assert_eq!(config.agent.max_iterations, 15);
        assert_eq!(config.agent.force_stop_threshold, 10);
    }

    #[test]
    fn test_parse_toml_sections() {
        let toml_str = r#"
corpus_path = "texts/corpus.txt"

[retrieval]
top_k = 20
keyword_boost = 2.5
mode = "exact"

[memory]
max_short_memory = 10
max_context_tokens = 20000
summarize_threshold = 14000

[agent]
max_iterations = 8
force_stop_threshold = 5

[llm]
provider = "openai"
model = "gpt-4o-mini"
"#;
        let file: ConfigFile = toml::from_str(toml_str).unwrap();
        let config = ArcanaConfig::from_config_file(file);

        assert_eq!(config.corpus_path, PathBuf::from("texts/corpus.txt"));
        assert_eq!(config.retrieval.top_k, 20);
        assert_eq!(config.retrieval.mode, RankingMode::ExactMatchFirst);
        assert_eq!(config.memory.max_short_memory, 10);
        assert_eq!(config.memory.summarize_threshold, 14000);
        assert_eq!(config.agent.max_iterations, 8);
        assert_eq!(config.llm.provider, LlmProviderKind::OpenAi);
        assert_eq!(config.llm.model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let file: ConfigFile = toml::from_str("[retrieval]\ntop_k = 3\n").unwrap();
        let config = ArcanaConfig::from_config_file(file);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retrieval.keyword_min_len, 4);
        assert_eq!(config.memory.max_context_tokens, 6000);
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(LlmProviderKind::parse("OpenAI"), LlmProviderKind::OpenAi);
        assert_eq!(LlmProviderKind::parse("lmstudio"), LlmProviderKind::LmStudio);
        assert_eq!(LlmProviderKind::parse("unknown"), LlmProviderKind::LmStudio);
    }
}
