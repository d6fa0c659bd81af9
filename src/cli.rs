//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::HealthGrade;
use crate::orchestrator::ExecutionStrategy;
use clap::Parser;
use std::path::PathBuf;

/// GramLens - LLM-powered Instagram account analyzer
///
/// Analyze an account snapshot with a team of prompt-configured agents,
/// cross-check the results, and produce a detailed health report.
///
/// Examples:
///   gramlens --input account.json
///   gramlens --input account.json --strategy leveled --rpm 30
///   gramlens --input account.json --format json --output report.json
///   gramlens --input account.json --dry-run
///   gramlens --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to the account snapshot JSON to analyze
    ///
    /// Not required when using --init-config.
    #[arg(short, long, value_name = "FILE", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Model to use for the analysis agents
    ///
    /// Can also be set via GRAMLENS_MODEL env var or .gramlens.toml config.
    #[arg(short, long, default_value = "llama3.1:latest", env = "GRAMLENS_MODEL")]
    pub model: String,

    /// Output file path for the report
    #[arg(short, long, default_value = "gramlens_report.md", value_name = "FILE")]
    pub output: PathBuf,

    /// Model API endpoint URL
    #[arg(long, default_value = "http://localhost:11434", env = "GRAMLENS_API_URL")]
    pub api_url: String,

    /// Path to configuration file
    ///
    /// If not specified, looks for .gramlens.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Agent execution strategy (sequential, leveled, parallel)
    ///
    /// Overrides the config file when provided.
    #[arg(short, long, value_name = "STRATEGY")]
    pub strategy: Option<StrategyArg>,

    /// Remote-model requests per minute
    #[arg(long, default_value = "15", value_name = "RPM")]
    pub rpm: u32,

    /// Number of concurrent in-flight model calls
    #[arg(long, default_value = "3", value_name = "NUM")]
    pub concurrency: usize,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Temperature for LLM responses (0.0 - 1.0)
    ///
    /// Lower values produce more consistent/deterministic output
    #[arg(long, default_value = "0.1")]
    pub temperature: f32,

    /// Per-agent request timeout in seconds
    ///
    /// Default: from config or 120s.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Skip the advanced analysis engine
    #[arg(long)]
    pub skip_advanced: bool,

    /// Generate a content plan after the analysis (one extra model call)
    #[arg(long)]
    pub content_plan: bool,

    /// Dry run: load and validate the input, list the agents per level,
    /// and exit without any model calls
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .gramlens.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Fail if the overall health grade is below this grade
    ///
    /// Useful for scheduled checks. Exit code 2 when the grade is worse.
    /// Values: a, b, c, d
    #[arg(long, value_name = "GRADE")]
    pub fail_on_grade: Option<GradeArg>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Execution strategy flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StrategyArg {
    Sequential,
    Leveled,
    Parallel,
}

impl StrategyArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyArg::Sequential => "sequential",
            StrategyArg::Leveled => "leveled",
            StrategyArg::Parallel => "parallel",
        }
    }

    pub fn to_strategy(self) -> ExecutionStrategy {
        match self {
            StrategyArg::Sequential => ExecutionStrategy::Sequential,
            StrategyArg::Leveled => ExecutionStrategy::Leveled,
            StrategyArg::Parallel => ExecutionStrategy::Parallel,
        }
    }
}

/// Grade threshold for --fail-on-grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum GradeArg {
    A,
    B,
    C,
    D,
}

impl GradeArg {
    pub fn to_grade(self) -> HealthGrade {
        match self {
            GradeArg::A => HealthGrade::A,
            GradeArg::B => HealthGrade::B,
            GradeArg::C => HealthGrade::C,
            GradeArg::D => HealthGrade::D,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Validate input path
        if let Some(ref input) = self.input {
            if !input.exists() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
            if !input.is_file() {
                return Err(format!("Input path is not a file: {}", input.display()));
            }
        } else {
            return Err("An input file is required".to_string());
        }

        // Validate API URL format (not needed for dry-run)
        if !self.dry_run
            && !self.api_url.starts_with("http://")
            && !self.api_url.starts_with("https://")
        {
            return Err("API URL must start with 'http://' or 'https://'".to_string());
        }

        // Validate temperature range
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err("Temperature must be between 0.0 and 1.0".to_string());
        }

        // Validate concurrency
        if self.concurrency == 0 {
            return Err("Concurrency must be at least 1".to_string());
        }

        // Validate rate limit
        if self.rpm == 0 {
            return Err("RPM must be at least 1".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            input: Some(PathBuf::from("Cargo.toml")), // any existing file
            model: "test".to_string(),
            output: PathBuf::from("test.md"),
            api_url: "http://localhost:11434".to_string(),
            config: None,
            strategy: None,
            rpm: 15,
            concurrency: 3,
            format: OutputFormat::Markdown,
            temperature: 0.1,
            timeout: None,
            skip_advanced: false,
            content_plan: false,
            dry_run: false,
            init_config: false,
            fail_on_grade: None,
            verbose: false,
            quiet: false,
        }
    }

    #[test]
    fn test_validation_missing_input() {
        let mut args = make_args();
        args.input = Some(PathBuf::from("does-not-exist.json"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_api_url() {
        let mut args = make_args();
        args.api_url = "localhost:11434".to_string();
        assert!(args.validate().is_err());
        // Dry runs never call the API, so the URL is not checked.
        args.dry_run = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_bounds() {
        let mut args = make_args();
        args.temperature = 1.5;
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.rpm = 0;
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.concurrency = 0;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_strategy_arg_mapping() {
        assert_eq!(StrategyArg::Leveled.as_str(), "leveled");
        assert_eq!(
            StrategyArg::Parallel.to_strategy(),
            ExecutionStrategy::Parallel
        );
    }
}
