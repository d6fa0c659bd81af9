//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.gramlens.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Orchestrator settings.
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Rate and output limits.
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Skip the advanced analysis engine by default.
    #[serde(default)]
    pub skip_advanced: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            skip_advanced: false,
        }
    }
}

fn default_output() -> String {
    "gramlens_report.md".to_string()
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Default model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Model API endpoint URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens in response.
    #[serde(default)]
    pub max_tokens: Option<usize>,

    /// Per-call request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Number of retries per agent call on failure.
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            api_url: default_api_url(),
            temperature: default_temperature(),
            max_tokens: None,
            timeout_seconds: default_timeout(),
            retries: default_retries(),
        }
    }
}

fn default_model() -> String {
    "llama3.1:latest".to_string()
}

fn default_api_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_timeout() -> u64 {
    120
}

fn default_retries() -> u32 {
    2
}

/// Agent orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Execution strategy: sequential, leveled, or parallel.
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Number of concurrent in-flight model calls.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Delay between calls in sequential mode, in seconds.
    #[serde(default = "default_inter_call_delay")]
    pub inter_call_delay_secs: f64,

    /// Soft overall-analysis timeout in seconds (logged, never aborts).
    #[serde(default = "default_soft_timeout")]
    pub soft_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            concurrency: default_concurrency(),
            inter_call_delay_secs: default_inter_call_delay(),
            soft_timeout_secs: default_soft_timeout(),
        }
    }
}

fn default_strategy() -> String {
    "sequential".to_string()
}

fn default_concurrency() -> usize {
    3
}

fn default_inter_call_delay() -> f64 {
    1.0
}

fn default_soft_timeout() -> u64 {
    600
}

/// Rate limiting and output caps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Remote-model requests per minute.
    #[serde(default = "default_rpm")]
    pub rpm: u32,

    /// Maximum consolidated findings in the report.
    #[serde(default = "default_max_findings")]
    pub max_findings: usize,

    /// Maximum prioritized recommendations in the report.
    #[serde(default = "default_max_recommendations")]
    pub max_recommendations: usize,

    /// Local cache entry TTL in seconds.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            rpm: default_rpm(),
            max_findings: default_max_findings(),
            max_recommendations: default_max_recommendations(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_rpm() -> u32 {
    15
}

fn default_max_findings() -> usize {
    15
}

fn default_max_recommendations() -> usize {
    10
}

fn default_cache_ttl() -> u64 {
    3600
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".gramlens.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        // Model settings - always override since they have defaults in CLI
        self.model.name = args.model.clone();
        self.model.api_url = args.api_url.clone();
        self.model.temperature = args.temperature;

        // Timeout - only override if explicitly provided via CLI
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }

        // Orchestrator settings
        if let Some(strategy) = args.strategy {
            self.orchestrator.strategy = strategy.as_str().to_string();
        }
        self.orchestrator.concurrency = args.concurrency;
        self.limits.rpm = args.rpm;

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
        if args.skip_advanced {
            self.general.skip_advanced = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.name, "llama3.1:latest");
        assert_eq!(config.limits.rpm, 15);
        assert_eq!(config.orchestrator.strategy, "sequential");
        assert_eq!(config.orchestrator.concurrency, 3);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "custom_report.md"
verbose = true

[model]
name = "qwen2.5:32b"
temperature = 0.2

[orchestrator]
strategy = "leveled"
concurrency = 5

[limits]
rpm = 30
max_findings = 20
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "custom_report.md");
        assert!(config.general.verbose);
        assert_eq!(config.model.name, "qwen2.5:32b");
        assert_eq!(config.model.temperature, 0.2);
        assert_eq!(config.orchestrator.strategy, "leveled");
        assert_eq!(config.orchestrator.concurrency, 5);
        assert_eq!(config.limits.rpm, 30);
        assert_eq!(config.limits.max_findings, 20);
    }

    #[test]
    fn test_partial_sections_fall_back_to_defaults() {
        let config: Config = toml::from_str("[model]\nname = \"custom\"\n").unwrap();
        assert_eq!(config.model.name, "custom");
        assert_eq!(config.model.timeout_seconds, 120);
        assert_eq!(config.limits.rpm, 15);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[orchestrator]"));
        assert!(toml_str.contains("[limits]"));
    }
}
