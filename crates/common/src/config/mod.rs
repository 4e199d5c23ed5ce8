//! Configuration management for KBQA
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Scoring thresholds and ranking limits
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Question normalization tables
    #[serde(default)]
    pub lexicon: LexiconConfig,

    /// Root facility used by the fallback path
    #[serde(default)]
    pub root: RootEntityConfig,

    /// Graph store connection
    #[serde(default)]
    pub graph: GraphConfig,

    /// Hosted neural linker / extractor endpoints
    #[serde(default)]
    pub services: ServicesConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Minimum link score for a candidate outside list questions
    #[serde(default = "default_link_threshold")]
    pub link_threshold: f32,

    /// Minimum relation score for a relation candidate
    #[serde(default = "default_rel_threshold")]
    pub rel_threshold: f32,

    /// Added to a pattern relation confirmed by the neural extractor
    #[serde(default = "default_neural_boost")]
    pub neural_boost: f32,

    /// Added per satisfied constraint
    #[serde(default = "default_constraint_match_bonus")]
    pub constraint_match_bonus: f32,

    /// Added per violated constraint (negative)
    #[serde(default = "default_constraint_miss_penalty")]
    pub constraint_miss_penalty: f32,

    /// Subtracted from the link score when a constraint value fuzzily matches the entity name
    #[serde(default = "default_fuzzy_link_penalty")]
    pub fuzzy_link_penalty: f32,

    /// Similarity ratio (0-100) counted as a fuzzy hit
    #[serde(default = "default_fuzzy_ratio_threshold")]
    pub fuzzy_ratio_threshold: u8,

    /// Maximum ranked answers kept
    #[serde(default = "default_max_answers")]
    pub max_answers: usize,

    /// Minimum final score; `None` disables the filter
    #[serde(default)]
    pub min_final_score: Option<f32>,

    /// Keep every matched constraint instead of only the last one
    #[serde(default)]
    pub keep_all_matches: bool,

    /// Score by name similarity when the constraint matcher fails for a candidate
    #[serde(default)]
    pub fuzzy_on_match_error: bool,

    /// Sub-genres treated as leaves during taxonomy expansion
    #[serde(default)]
    pub exempt_subgenres: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LexiconConfig {
    /// Substrings deleted before tokenization
    #[serde(default = "default_drop_list")]
    pub drop_list: Vec<String>,

    /// Ordered (from, to) rewrites applied after the drop list
    #[serde(default = "default_rewrite_list")]
    pub rewrite_list: Vec<(String, String)>,

    /// Suffix character split off long tokens
    #[serde(default = "default_split_suffix")]
    pub split_suffix: char,

    /// Token inserted in place of the split suffix
    #[serde(default = "default_split_replacement")]
    pub split_replacement: String,

    /// Token treated as blank and removed
    #[serde(default = "default_blank_token")]
    pub blank_token: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RootEntityConfig {
    /// Name of the root node in the graph
    #[serde(default = "default_root_name")]
    pub name: String,

    /// Keyword in the question that activates the fallback
    #[serde(default = "default_root_trigger")]
    pub trigger_keyword: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphConfig {
    /// Backend: neo4j, memory
    #[serde(default = "default_graph_backend")]
    pub backend: String,

    /// Neo4j HTTP base URL
    #[serde(default = "default_graph_url")]
    pub url: String,

    /// Neo4j database name
    #[serde(default = "default_graph_database")]
    pub database: String,

    pub username: Option<String>,

    pub password: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_graph_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServicesConfig {
    /// Neural entity linker endpoint
    pub neural_linker_url: Option<String>,

    /// Neural relation extractor endpoint
    pub neural_extractor_url: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_service_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_link_threshold() -> f32 { 0.8 }
fn default_rel_threshold() -> f32 { 0.8 }
fn default_neural_boost() -> f32 { 0.3 }
fn default_constraint_match_bonus() -> f32 { 0.3 }
fn default_constraint_miss_penalty() -> f32 { -0.2 }
fn default_fuzzy_link_penalty() -> f32 { 0.3 }
fn default_fuzzy_ratio_threshold() -> u8 { 60 }
fn default_max_answers() -> usize { 10 }
fn default_drop_list() -> Vec<String> {
    vec!["吗".to_string(), "里面".to_string()]
}
fn default_rewrite_list() -> Vec<(String, String)> {
    [
        ("在哪儿", "的地点"),
        ("在哪里", "的地点"),
        ("在哪", "的地点"),
        ("哪里", "地点"),
        ("哪有", "地点"),
        ("属于", "在"),
        ("vip", "贵宾"),
    ]
    .into_iter()
    .map(|(from, to)| (from.to_string(), to.to_string()))
    .collect()
}
fn default_split_suffix() -> char { '费' }
fn default_split_replacement() -> String { "费用".to_string() }
fn default_blank_token() -> String { " ".to_string() }
fn default_root_name() -> String { "昆明长水国际机场".to_string() }
fn default_root_trigger() -> String { "机场".to_string() }
fn default_graph_backend() -> String { "neo4j".to_string() }
fn default_graph_url() -> String { "http://localhost:7474".to_string() }
fn default_graph_database() -> String { "neo4j".to_string() }
fn default_graph_timeout() -> u64 { 10 }
fn default_service_timeout() -> u64 { 5 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "kbqa".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__PIPELINE__LINK_THRESHOLD=0.7
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }
}

impl GraphConfig {
    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ServicesConfig {
    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            link_threshold: default_link_threshold(),
            rel_threshold: default_rel_threshold(),
            neural_boost: default_neural_boost(),
            constraint_match_bonus: default_constraint_match_bonus(),
            constraint_miss_penalty: default_constraint_miss_penalty(),
            fuzzy_link_penalty: default_fuzzy_link_penalty(),
            fuzzy_ratio_threshold: default_fuzzy_ratio_threshold(),
            max_answers: default_max_answers(),
            min_final_score: None,
            keep_all_matches: false,
            fuzzy_on_match_error: false,
            exempt_subgenres: Vec::new(),
        }
    }
}

impl Default for LexiconConfig {
    fn default() -> Self {
        Self {
            drop_list: default_drop_list(),
            rewrite_list: default_rewrite_list(),
            split_suffix: default_split_suffix(),
            split_replacement: default_split_replacement(),
            blank_token: default_blank_token(),
        }
    }
}

impl Default for RootEntityConfig {
    fn default() -> Self {
        Self {
            name: default_root_name(),
            trigger_keyword: default_root_trigger(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            backend: default_graph_backend(),
            url: default_graph_url(),
            database: default_graph_database(),
            username: None,
            password: None,
            timeout_secs: default_graph_timeout(),
        }
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            neural_linker_url: None,
            neural_extractor_url: None,
            timeout_secs: default_service_timeout(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            service_name: default_service_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.pipeline.max_answers, 10);
        assert_eq!(config.pipeline.link_threshold, 0.8);
        assert!(config.pipeline.min_final_score.is_none());
        assert!(!config.pipeline.fuzzy_on_match_error);
        assert!(config.services.neural_linker_url.is_none());
        assert_eq!(config.root.trigger_keyword, "机场");
        assert_eq!(config.lexicon.split_suffix, '费');
    }

    #[test]
    fn test_rewrite_order_is_preserved() {
        let lexicon = LexiconConfig::default();
        let froms: Vec<&str> = lexicon.rewrite_list.iter().map(|(f, _)| f.as_str()).collect();
        // longer patterns must run before their prefixes
        assert_eq!(&froms[..3], &["在哪儿", "在哪里", "在哪"]);
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config: AppConfig = Config::builder()
            .set_override("pipeline.max_answers", 5)
            .unwrap()
            .set_override("graph.backend", "memory")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.pipeline.max_answers, 5);
        assert_eq!(config.pipeline.rel_threshold, 0.8);
        assert_eq!(config.graph.backend, "memory");
        assert_eq!(config.graph.timeout(), Duration::from_secs(10));
    }
}
