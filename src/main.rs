//! GramLens - LLM-powered Instagram account analyzer
//!
//! A CLI tool that dispatches a team of prompt-configured agents against
//! an account snapshot, cross-checks their outputs, and produces a
//! detailed health report.
//!
//! Exit codes:
//!   0 - Success (grade at or above threshold, or no --fail-on-grade set)
//!   1 - Runtime error (connection, config, input failure, etc.)
//!   2 - Health grade below the --fail-on-grade threshold

mod agents;
mod analysis;
mod cache;
mod cli;
mod config;
mod errors;
mod llm;
mod metrics;
mod models;
mod orchestrator;
mod report;
mod value_path;

use agents::catalog;
use analysis::advanced::AdvancedEngine;
use analysis::aggregator::{self, AggregatorConfig};
use analysis::benchmarks::default_benchmarks;
use analysis::sanity;
use anyhow::{Context, Result};
use cache::CacheManager;
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::Config;
use errors::EngineError;
use llm::{GenerationOptions, HttpModelClient};
use models::{
    AccountData, AgentResult, DataQuality, ExecutiveSummary, RecommendationBuckets, Report,
    ReportMetadata,
};
use orchestrator::{ExecutionStrategy, RetryPolicy, Scheduler, SchedulerConfig};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("GramLens v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    // Run the analysis
    match run_analysis(&args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("{}", EngineError::System(e.to_string()));
            // A run always leaves a structurally valid report behind, even
            // on total failure.
            write_failure_report(&args, &e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .gramlens.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(".gramlens.toml");

    if path.exists() {
        eprintln!("⚠️  .gramlens.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .gramlens.toml")?;

    println!("✅ Created .gramlens.toml with default settings.");
    println!("   Edit it to customize model, strategy, rate limits, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete analysis workflow. Returns exit code (0 or 2).
async fn run_analysis(args: &Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(args)?;
    config.merge_with_args(args);

    // Step 1: Load the account snapshot
    let input_path = args
        .input
        .as_ref()
        .ok_or_else(|| EngineError::Data("no input file provided".to_string()))?;
    let mut account = load_account(input_path)?;

    println!("📥 Loaded snapshot for @{}", account.username());
    info!(
        followers = account.u64_at("profile.followers", 0),
        posts = account.array_len("posts"),
        "account snapshot loaded"
    );

    // Handle --dry-run: validate input and list agents, no model calls
    if args.dry_run {
        return handle_dry_run(&account);
    }

    // Step 2: Initialize the model client and scheduler
    println!("🤖 Initializing agents...");
    println!("   Model: {}", config.model.name);
    println!("   API: {}", config.model.api_url);
    println!("   Strategy: {}", config.orchestrator.strategy);
    println!("   Rate limit: {} requests/minute", config.limits.rpm);

    let client = HttpModelClient::new(
        config.model.api_url.clone(),
        config.model.name.clone(),
        config.model.timeout_seconds,
    )?;

    let options = GenerationOptions {
        temperature: config.model.temperature,
        top_p: None,
        max_tokens: config.model.max_tokens,
    };

    // An explicit CLI strategy wins; otherwise the config string decides.
    let strategy = match args.strategy {
        Some(arg) => arg.to_strategy(),
        None => parse_strategy(&config.orchestrator.strategy)?,
    };

    let scheduler_config = SchedulerConfig {
        strategy,
        concurrency: config.orchestrator.concurrency,
        rpm: config.limits.rpm,
        inter_call_delay_secs: config.orchestrator.inter_call_delay_secs,
        soft_timeout_secs: config.orchestrator.soft_timeout_secs,
        retry: RetryPolicy {
            max_retries: config.model.retries,
            base_delay_secs: 2.0,
            multiplier: 2.0,
            timeout_seconds: config.model.timeout_seconds,
        },
        show_progress: !args.quiet,
    };

    let scheduler = Scheduler::new(&client, scheduler_config, options);

    // Step 3: Optional data-acquisition pre-step when the snapshot has no
    // post data to analyze. Cached per account to avoid repeat calls.
    if account.array_len("posts") == 0 {
        println!("🔎 Snapshot has no posts; running data acquisition...");
        let cache = CacheManager::new(Duration::from_secs(config.limits.cache_ttl_secs));
        acquire_account_data(&scheduler, &cache, &mut account).await;
    }

    // Step 4: Run the agent pipeline
    println!("\n🔬 Running {} analysis agents...\n", catalog::analysis_agents().len());
    let outcome = scheduler.run(&account).await;
    let mut results = outcome.results;

    // Step 5: Sanity gates over the full result set
    let gates = sanity::apply_sanity_gates(&mut results, &account);
    if !gates.overrides.is_empty() {
        println!("⚖️  Sanity gates reconciled {} metric(s)", gates.overrides.len());
    }

    // Step 6: Aggregate into the report skeleton
    let aggregator_config = AggregatorConfig {
        max_findings: config.limits.max_findings,
        max_recommendations: config.limits.max_recommendations,
        ..AggregatorConfig::default()
    };
    let aggregate = aggregator::aggregate(&results, &outcome.validation, &aggregator_config);

    // Step 7: Advanced deterministic analysis (unless skipped)
    let benchmarks = default_benchmarks();
    let advanced = if config.general.skip_advanced {
        info!("advanced analysis skipped");
        None
    } else {
        println!("📐 Running advanced benchmark analysis...");
        Some(AdvancedEngine::new(&benchmarks).analyze(&account, &results))
    };

    // Step 8: Optional content plan (one extra model call)
    let content_plan = if args.content_plan {
        println!("🗓️  Generating content plan...");
        generate_content_plan(&scheduler, &account, &aggregate, &gates.strategic_phase).await
    } else {
        None
    };

    // Step 9: Assemble and render the report
    println!("\n📝 Generating report...");

    let duration = start_time.elapsed().as_secs_f64();
    let (risk_assessment, monitoring_plan, data_quality, advanced_value) = match advanced {
        Some(engine_report) => (
            engine_report.risk_assessment.clone(),
            engine_report.monitoring_plan.clone(),
            engine_report.data_quality.clone(),
            Some(engine_report.as_value()),
        ),
        None => (
            Vec::new(),
            Vec::new(),
            basic_data_quality(&account, &results),
            None,
        ),
    };

    let report = Report {
        metadata: ReportMetadata {
            username: account.username(),
            analysis_date: Utc::now(),
            model_used: config.model.name.clone(),
            agents_run: results.len(),
            agents_failed: outcome.metadata.failed_agents.len(),
            duration_seconds: duration,
        },
        executive_summary: ExecutiveSummary {
            username: account.username(),
            overall_score: aggregate.overall_score,
            health_grade: aggregate.health_grade,
            strategic_phase: gates.strategic_phase.clone(),
            headline: aggregate.headline,
            key_strengths: aggregate.key_strengths,
            key_issues: aggregate.key_issues,
        },
        category_scores: aggregate.category_scores,
        recommendation_buckets: RecommendationBuckets::from_recommendations(
            &aggregate.recommendations,
        ),
        findings: aggregate.findings,
        recommendations: aggregate.recommendations,
        risk_assessment,
        monitoring_plan,
        data_quality,
        validation: outcome.validation,
        sanity_gates: gates,
        agent_details: results,
        orchestration_metadata: outcome.metadata,
        advanced: advanced_value,
        content_plan,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    std::fs::write(&args.output, &output)
        .with_context(|| format!("Failed to write report to {}", args.output.display()))?;

    // Print summary
    println!("\n📊 Analysis Summary:");
    println!(
        "   Overall score: {:.0}/100 (grade {})",
        report.executive_summary.overall_score, report.executive_summary.health_grade
    );
    println!(
        "   Agents: {} completed, {} failed",
        report.orchestration_metadata.completed_agents.len(),
        report.orchestration_metadata.failed_agents.len()
    );
    println!("   Strategic phase: {}", report.executive_summary.strategic_phase);
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Analysis complete! Report saved to: {}",
        args.output.display()
    );

    // Check --fail-on-grade threshold
    if let Some(grade_arg) = args.fail_on_grade {
        let threshold = grade_arg.to_grade();
        if report.executive_summary.health_grade < threshold {
            eprintln!(
                "\n⛔ Health grade {} is below the {} threshold. Failing (exit code 2).",
                report.executive_summary.health_grade, threshold
            );
            return Ok(2);
        }
    }

    Ok(0)
}

/// Handle --dry-run: list the agents per level, exit without model calls.
fn handle_dry_run(account: &AccountData) -> Result<i32> {
    println!("\n🔍 Dry run: no model calls will be made.\n");

    println!(
        "   Account: @{} ({} followers, {} posts)\n",
        account.username(),
        account.u64_at("profile.followers", 0),
        account.array_len("posts")
    );

    for level in catalog::execution_levels() {
        println!("   Level: {}", level.name);
        for agent in &level.agents {
            println!("     🤖 {} ({})", agent, catalog::category_of(agent));
        }
    }

    println!("\n✅ Dry run complete. Input is valid.");
    Ok(0)
}

/// Load and parse the account snapshot JSON.
fn load_account(path: &Path) -> Result<AccountData> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;

    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Input file is not valid JSON: {}", path.display()))?;

    if !value.is_object() {
        return Err(EngineError::Data(format!(
            "input file must contain a JSON object: {}",
            path.display()
        ))
        .into());
    }

    Ok(AccountData::from_value(value))
}

/// Map a config strategy string to the scheduler enum.
fn parse_strategy(name: &str) -> Result<ExecutionStrategy> {
    match name.to_lowercase().as_str() {
        "sequential" => Ok(ExecutionStrategy::Sequential),
        "leveled" => Ok(ExecutionStrategy::Leveled),
        "parallel" => Ok(ExecutionStrategy::Parallel),
        other => Err(EngineError::Data(format!(
            "unknown execution strategy: {}",
            other
        ))
        .into()),
    }
}

/// Run the data-acquisition agent and merge its output into the snapshot.
/// Failures degrade to the un-enriched snapshot; the run continues.
async fn acquire_account_data(
    scheduler: &Scheduler<'_>,
    cache: &CacheManager,
    account: &mut AccountData,
) {
    let key = format!("acquisition:{}", account.username());

    let data = match cache.get(&key).await {
        Some(cached) => cached,
        None => {
            let agent = catalog::data_acquisition_agent();
            let result = scheduler.run_single(&agent, account).await;
            if !result.is_ok() {
                warn!("data acquisition failed; continuing with the raw snapshot");
                return;
            }
            cache.set(&key, result.metrics.clone(), None).await;
            result.metrics
        }
    };

    if let Value::Object(map) = data {
        for (section, value) in map {
            account.enrich(&section, value);
        }
        info!("snapshot enriched by data acquisition");
    }
}

/// Run the content-plan agent against the finished analysis.
async fn generate_content_plan(
    scheduler: &Scheduler<'_>,
    account: &AccountData,
    aggregate: &aggregator::AggregateOutput,
    strategic_phase: &str,
) -> Option<Value> {
    let mut planning_input = account.clone();
    planning_input.enrich(
        "analysis_summary",
        json!({
            "overall_score": aggregate.overall_score,
            "key_issues": aggregate.key_issues,
            "key_strengths": aggregate.key_strengths,
            "strategic_phase": strategic_phase,
        }),
    );

    let agent = catalog::content_plan_agent();
    let result = scheduler.run_single(&agent, &planning_input).await;
    if result.is_ok() {
        Some(result.metrics)
    } else {
        warn!("content plan generation failed; omitting it from the report");
        None
    }
}

/// Input-quality assessment used when the advanced engine is skipped.
fn basic_data_quality(
    account: &AccountData,
    results: &HashMap<String, AgentResult>,
) -> DataQuality {
    const SECTIONS: &[&str] = &[
        "profile",
        "posts",
        "audience",
        "growth_history",
        "insights_timeline",
    ];

    let root = account.as_value();
    let missing: Vec<String> = SECTIONS
        .iter()
        .filter(|s| value_path::get_path(&root, s).is_none())
        .map(|s| s.to_string())
        .collect();
    let completeness = (SECTIONS.len() - missing.len()) as f64 / SECTIONS.len() as f64;

    let ok = results.values().filter(|r| r.is_ok()).count();
    let confidence = if results.is_empty() {
        completeness * 0.5
    } else {
        completeness * ok as f64 / results.len() as f64
    };

    DataQuality {
        completeness,
        confidence,
        missing_sections: missing,
        notes: Vec::new(),
    }
}

/// Write a minimal failure report so callers always get a valid document.
fn write_failure_report(args: &Args, error: &anyhow::Error) {
    let report = Report::failure("unknown_account", &args.model, &error.to_string());

    let rendered = match args.format {
        OutputFormat::Json => report::generate_json_report(&report).unwrap_or_default(),
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    if let Err(write_error) = std::fs::write(&args.output, rendered) {
        warn!("failed to write the failure report: {}", write_error);
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .gramlens.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
