//! Dependency-aware agent executor.
//!
//! Agents are grouped into static dependency levels. Level 0 runs against
//! the raw snapshot; level 1 sees the snapshot enriched with a distilled
//! summary of every level-0 output; level 2 is the single validation agent,
//! fed a bundle of everything. A level never starts until every agent in
//! all prior levels has produced a result (success or fallback) — a strict
//! barrier. Three execution strategies share this shape and produce the
//! same result structure.

use crate::agents::catalog::{self, PromptAgent};
use crate::agents::{invoke_agent, AnalysisAgent};
use crate::llm::{GenerationOptions, ModelClient};
use crate::metrics::MetricsCollector;
use crate::models::{
    AccountData, AgentResult, OrchestrationMetadata, ValidationBlock,
};
use crate::orchestrator::rate_limit::RateLimiter;
use crate::orchestrator::retry::{call_with_retry, RetryPolicy};
use crate::value_path;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How agents inside the level structure are driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// One agent at a time with an inter-call delay. The default, because
    /// the remote API enforces a low requests-per-minute ceiling.
    Sequential,
    /// Each level's agents run concurrently under the global semaphore.
    Leveled,
    /// All nine analysis agents at once, then validation. No mid-pipeline
    /// enrichment for level-1 agents.
    Parallel,
}

impl ExecutionStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionStrategy::Sequential => "sequential",
            ExecutionStrategy::Leveled => "leveled",
            ExecutionStrategy::Parallel => "parallel",
        }
    }
}

/// Scheduler knobs, resolved from config + CLI before a run starts.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub strategy: ExecutionStrategy,
    pub concurrency: usize,
    pub rpm: u32,
    pub inter_call_delay_secs: f64,
    /// Soft budget for the whole run; exceeded means logged + flagged,
    /// never a hard abort.
    pub soft_timeout_secs: u64,
    pub retry: RetryPolicy,
    pub show_progress: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            strategy: ExecutionStrategy::Sequential,
            concurrency: 3,
            rpm: 15,
            inter_call_delay_secs: 1.0,
            soft_timeout_secs: 600,
            retry: RetryPolicy::default(),
            show_progress: false,
        }
    }
}

/// Everything a run produces before aggregation.
#[derive(Debug)]
pub struct RunOutcome {
    pub results: HashMap<String, AgentResult>,
    pub validation: ValidationBlock,
    pub metadata: OrchestrationMetadata,
}

pub struct Scheduler<'a> {
    client: &'a dyn ModelClient,
    config: SchedulerConfig,
    options: GenerationOptions,
    limiter: RateLimiter,
    semaphore: Arc<Semaphore>,
    metrics: Arc<MetricsCollector>,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        client: &'a dyn ModelClient,
        config: SchedulerConfig,
        options: GenerationOptions,
    ) -> Self {
        let limiter = RateLimiter::new(config.rpm);
        let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
        Self {
            client,
            config,
            options,
            limiter,
            semaphore,
            metrics: Arc::new(MetricsCollector::new()),
        }
    }

    /// Execute the full level structure against one account snapshot.
    ///
    /// Never returns an error: every agent failure has already been
    /// converted into a fallback result by the retry wrapper.
    pub async fn run(&self, input: &AccountData) -> RunOutcome {
        let started = Instant::now();
        let mut working = input.clone();
        let levels = catalog::execution_levels();
        let analysis_agents = catalog::analysis_agents();

        let total_agents = analysis_agents.len() + 1;
        let progress = self.make_progress(total_agents as u64);

        info!(
            strategy = self.config.strategy.label(),
            agents = total_agents,
            "starting orchestrated analysis"
        );

        let mut results: HashMap<String, AgentResult> = HashMap::new();
        let mut durations: HashMap<String, u64> = HashMap::new();

        match self.config.strategy {
            ExecutionStrategy::Parallel => {
                // No leveling: all nine at once against the raw snapshot.
                let batch: Vec<&PromptAgent> = analysis_agents.iter().collect();
                self.run_batch(&batch, &working, false, &mut results, &mut durations, &progress)
                    .await;
            }
            _ => {
                let sequential = self.config.strategy == ExecutionStrategy::Sequential;

                let level0: Vec<&PromptAgent> = analysis_agents
                    .iter()
                    .filter(|a| levels[0].agents.iter().any(|n| *n == a.name()))
                    .collect();
                self.run_batch(&level0, &working, sequential, &mut results, &mut durations, &progress)
                    .await;

                // Barrier: every level-0 result (including fallbacks) feeds
                // the enrichment block level-1 agents analyze.
                let summary = build_level0_summary(&results);
                working.enrich("level0_summary", summary);

                let level1: Vec<&PromptAgent> = analysis_agents
                    .iter()
                    .filter(|a| levels[1].agents.iter().any(|n| *n == a.name()))
                    .collect();
                self.run_batch(&level1, &working, sequential, &mut results, &mut durations, &progress)
                    .await;
            }
        }

        // Level 2: validation, always sequential (there is exactly one).
        let bundle = build_validation_bundle(input, &results);
        let score_consistency = value_path::f64_at(&bundle, "stats.score_consistency", 0.0);
        working.enrich("validation_bundle", bundle);

        let validation_agent = catalog::validation_agent();
        let validation_result = self
            .run_one(&validation_agent, &working, &mut durations)
            .await;
        progress.inc(1);
        progress.finish_and_clear();

        let validation = build_validation_block(&validation_result, score_consistency);
        results.insert("validation".to_string(), validation_result);

        let elapsed = started.elapsed();
        let soft_timeout_exceeded = elapsed.as_secs() > self.config.soft_timeout_secs;
        if soft_timeout_exceeded {
            warn!(
                elapsed_secs = elapsed.as_secs(),
                budget_secs = self.config.soft_timeout_secs,
                "analysis exceeded its soft time budget"
            );
        }

        let mut completed: Vec<String> = Vec::new();
        let mut failed: Vec<String> = Vec::new();
        for (name, result) in &results {
            if result.is_ok() {
                completed.push(name.clone());
            } else {
                failed.push(name.clone());
            }
        }
        completed.sort();
        failed.sort();

        let metadata = OrchestrationMetadata {
            strategy: self.config.strategy.label().to_string(),
            completed_agents: completed,
            failed_agents: failed,
            agent_durations_ms: durations,
            total_duration_seconds: elapsed.as_secs_f64(),
            soft_timeout_exceeded,
        };

        info!(
            completed = metadata.completed_agents.len(),
            failed = metadata.failed_agents.len(),
            seconds = metadata.total_duration_seconds,
            "orchestrated analysis finished"
        );

        for (agent, stats) in self.metrics.snapshot() {
            debug!(
                agent = %agent,
                calls = stats.calls,
                failures = stats.failures,
                latency_ms = stats.total_latency_ms,
                "agent call stats"
            );
        }

        RunOutcome {
            results,
            validation,
            metadata,
        }
    }

    /// Run one out-of-pipeline agent (data acquisition, content plan)
    /// through the same rate-limit/retry machinery.
    pub async fn run_single(&self, agent: &dyn AnalysisAgent, input: &AccountData) -> AgentResult {
        let mut durations = HashMap::new();
        self.run_one(agent, input, &mut durations).await
    }

    async fn run_batch(
        &self,
        agents: &[&PromptAgent],
        input: &AccountData,
        sequential: bool,
        results: &mut HashMap<String, AgentResult>,
        durations: &mut HashMap<String, u64>,
        progress: &ProgressBar,
    ) {
        if sequential {
            for agent in agents {
                let result = self.run_one(*agent, input, durations).await;
                results.insert(agent.name().to_string(), result);
                progress.inc(1);
                if self.config.inter_call_delay_secs > 0.0 {
                    tokio::time::sleep(Duration::from_secs_f64(self.config.inter_call_delay_secs))
                        .await;
                }
            }
            return;
        }

        // Concurrent within the level; the semaphore inside the retry
        // wrapper bounds how many remote calls are actually in flight.
        let futures: Vec<_> = agents
            .iter()
            .map(|agent| async move {
                let started = Instant::now();
                let result = call_with_retry(
                    agent.name(),
                    &self.config.retry,
                    &self.limiter,
                    &self.semaphore,
                    || invoke_agent(*agent, self.client, input, self.options.clone()),
                )
                .await;
                let elapsed = started.elapsed();
                self.metrics
                    .record(agent.name(), elapsed, result.is_ok());
                progress.inc(1);
                (agent.name().to_string(), result, elapsed)
            })
            .collect();

        for (name, result, elapsed) in join_all(futures).await {
            durations.insert(name.clone(), elapsed.as_millis() as u64);
            results.insert(name, result);
        }
    }

    async fn run_one(
        &self,
        agent: &dyn AnalysisAgent,
        input: &AccountData,
        durations: &mut HashMap<String, u64>,
    ) -> AgentResult {
        let started = Instant::now();
        let result = call_with_retry(
            agent.name(),
            &self.config.retry,
            &self.limiter,
            &self.semaphore,
            || invoke_agent(agent, self.client, input, self.options.clone()),
        )
        .await;
        let elapsed = started.elapsed();
        self.metrics.record(agent.name(), elapsed, result.is_ok());
        durations.insert(agent.name().to_string(), elapsed.as_millis() as u64);
        result
    }

    fn make_progress(&self, total: u64) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} agents")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar
    }
}

/// Fixed per-agent extraction used to enrich level-1 inputs.
/// Missing paths default to neutral values so a fallback result still
/// produces a complete block.
const LEVEL0_NUMERIC_EXTRACTION: &[(&str, &[(&str, f64)])] = &[
    (
        "engagement",
        &[("engagement_rate", 0.0), ("engagement_quality", 50.0)],
    ),
    (
        "audience_quality",
        &[("bot_score", 30.0), ("authenticity_score", 70.0)],
    ),
    ("content_quality", &[("content_score", 50.0)]),
    ("growth", &[("monthly_growth_rate", 0.0)]),
    ("hashtag_strategy", &[("reach_score", 50.0)]),
    ("posting_behavior", &[("consistency_score", 50.0)]),
];

const CRITICAL_KEYWORDS: &[&str] = &[
    "critical", "urgent", "severe", "bot", "fake", "shadowban", "penalt", "risk", "declin",
];

const STRENGTH_KEYWORDS: &[&str] = &[
    "strong",
    "excellent",
    "healthy",
    "above average",
    "high quality",
    "consistent",
    "authentic",
];

/// Distill every level-0 output into the enrichment block level-1 agents
/// analyze: per-agent key fields, rollup averages, and keyword-extracted
/// critical issues and strengths.
pub fn build_level0_summary(results: &HashMap<String, AgentResult>) -> Value {
    let mut agents = Map::new();
    let mut scores: Vec<f64> = Vec::new();
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    for (agent_name, fields) in LEVEL0_NUMERIC_EXTRACTION {
        let mut block = Map::new();

        let (score, confidence) = match results.get(*agent_name) {
            Some(result) => {
                for (key, default) in *fields {
                    block.insert(key.to_string(), json!(result.metric_f64(key, *default)));
                }
                (result.score, result.confidence)
            }
            None => {
                for (key, default) in *fields {
                    block.insert(key.to_string(), json!(default));
                }
                (50.0, 0.30)
            }
        };

        // The growth trend is the one non-numeric field carried forward.
        if *agent_name == "growth" {
            let trend = results
                .get("growth")
                .map(|r| r.metric_str("growth_trend", "unknown"))
                .unwrap_or_else(|| "unknown".to_string());
            block.insert("growth_trend".to_string(), json!(trend));
        }

        block.insert("score".to_string(), json!(score));
        block.insert("confidence".to_string(), json!(confidence));
        agents.insert(agent_name.to_string(), Value::Object(block));

        scores.push(score);
        let weight = catalog::weight(agent_name);
        weighted_sum += score * weight;
        weight_total += weight;
    }

    let average_score = scores.iter().sum::<f64>() / scores.len() as f64;
    let weighted_score = if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        50.0
    };

    let mut critical_issues = extract_by_keywords(results, CRITICAL_KEYWORDS);
    critical_issues.truncate(5);
    let mut strengths = extract_by_keywords(results, STRENGTH_KEYWORDS);
    strengths.truncate(5);

    json!({
        "agents": Value::Object(agents),
        "average_score": average_score,
        "weighted_score": weighted_score,
        "critical_issues": critical_issues,
        "strengths": strengths,
    })
}

fn extract_by_keywords(results: &HashMap<String, AgentResult>, keywords: &[&str]) -> Vec<String> {
    let mut matched = Vec::new();
    let mut names: Vec<&String> = results.keys().collect();
    names.sort(); // deterministic output regardless of map order

    for name in names {
        let result = &results[name];
        if result.error_flag {
            continue;
        }
        for finding in &result.findings {
            let lower = finding.to_lowercase();
            if keywords.iter().any(|k| lower.contains(k)) {
                matched.push(finding.clone());
            }
        }
    }
    matched
}

/// The input bundle for the validation agent: every prior result plus
/// summary statistics, including a cross-agent score-consistency measure
/// based on the coefficient of variation.
pub fn build_validation_bundle(input: &AccountData, results: &HashMap<String, AgentResult>) -> Value {
    let mut agent_results = Map::new();
    let mut scores: Vec<f64> = Vec::new();
    let mut succeeded = 0usize;
    let mut failed = 0usize;

    let mut names: Vec<&String> = results.keys().collect();
    names.sort();

    for name in names {
        let result = &results[name];
        if result.is_ok() {
            succeeded += 1;
            scores.push(result.score);
        } else {
            failed += 1;
        }

        agent_results.insert(
            name.clone(),
            json!({
                "score": result.score,
                "status": if result.is_ok() { "ok" } else { "error" },
                "confidence": result.confidence,
                "findings": result.findings,
                "metrics": result.metrics,
            }),
        );
    }

    let (mean, consistency) = score_consistency(&scores);

    json!({
        "account_followers": input.u64_at("profile.followers", 0),
        "agent_results": Value::Object(agent_results),
        "stats": {
            "succeeded": succeeded,
            "failed": failed,
            "mean_score": mean,
            "score_consistency": consistency,
        }
    })
}

/// Consistency = `1 - coefficient_of_variation`, clamped to [0, 1].
/// Fewer than two successful scores count as fully consistent.
pub fn score_consistency(scores: &[f64]) -> (f64, f64) {
    if scores.is_empty() {
        return (50.0, 1.0);
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    if scores.len() < 2 || mean == 0.0 {
        return (mean, 1.0);
    }
    let variance =
        scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
    let cv = variance.sqrt() / mean;
    (mean, (1.0 - cv).clamp(0.0, 1.0))
}

fn build_validation_block(result: &AgentResult, score_consistency: f64) -> ValidationBlock {
    if !result.is_ok() {
        warn!(
            "{}",
            crate::errors::EngineError::Validation(
                "validation agent failed; continuing with degraded confidence".to_string()
            )
        );
        let mut block = ValidationBlock::default();
        block.score_consistency = score_consistency;
        return block;
    }

    let confidence = result
        .metric_f64("overall_confidence", result.confidence)
        .clamp(0.0, 1.0);
    let metric_flag = value_path::bool_at(&result.metrics, "high_severity_issue", false);
    let keyword_flag = result
        .findings
        .iter()
        .any(|f| f.to_lowercase().contains("critical"));

    ValidationBlock {
        status: "ok".to_string(),
        confidence,
        score_consistency,
        issues: result.findings.clone(),
        high_severity_issue: metric_flag || keyword_flag,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::GenerationRequest;
    use anyhow::Result;
    use futures::future::BoxFuture;

    /// Scripted model client: decides per-request success by matching a
    /// marker substring in the system prompt.
    struct ScriptedClient {
        fail_marker: Option<&'static str>,
        fail_all: bool,
    }

    impl ScriptedClient {
        fn healthy() -> Self {
            Self {
                fail_marker: None,
                fail_all: false,
            }
        }

        fn failing_all() -> Self {
            Self {
                fail_marker: None,
                fail_all: true,
            }
        }

        fn failing_when(marker: &'static str) -> Self {
            Self {
                fail_marker: Some(marker),
                fail_all: false,
            }
        }
    }

    impl ModelClient for ScriptedClient {
        fn generate(&self, request: GenerationRequest) -> BoxFuture<'_, Result<String>> {
            let should_fail = self.fail_all
                || self
                    .fail_marker
                    .map(|m| request.system_prompt.contains(m))
                    .unwrap_or(false);
            Box::pin(async move {
                if should_fail {
                    Err(anyhow::anyhow!("scripted failure"))
                } else {
                    Ok(r#"{
                        "score": 70,
                        "confidence": 0.9,
                        "findings": ["Strong engagement on carousels"],
                        "recommendations": ["Post more carousels"],
                        "metrics": {"engagement_rate": 3.1, "engagement_quality": 72}
                    }"#
                    .to_string())
                }
            })
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn fast_config(strategy: ExecutionStrategy) -> SchedulerConfig {
        SchedulerConfig {
            strategy,
            concurrency: 4,
            rpm: 6000,
            inter_call_delay_secs: 0.0,
            soft_timeout_secs: 600,
            retry: RetryPolicy {
                max_retries: 1,
                base_delay_secs: 0.01,
                multiplier: 2.0,
                timeout_seconds: 5,
            },
            show_progress: false,
        }
    }

    fn sample_input() -> AccountData {
        AccountData::from_value(serde_json::json!({
            "username": "cafeaurora",
            "profile": { "followers": 8200, "engagement_rate": 2.1 },
            "posts": [{ "likes": 310, "comments": 12 }]
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_leveled_run_produces_all_results() {
        let client = ScriptedClient::healthy();
        let scheduler = Scheduler::new(
            &client,
            fast_config(ExecutionStrategy::Leveled),
            GenerationOptions::default(),
        );

        let outcome = scheduler.run(&sample_input()).await;

        assert_eq!(outcome.results.len(), 10); // 9 analysis + validation
        assert_eq!(outcome.metadata.completed_agents.len(), 10);
        assert!(outcome.metadata.failed_agents.is_empty());
        assert_eq!(outcome.validation.status, "ok");
        assert_eq!(outcome.metadata.strategy, "leveled");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_level0_agent_still_feeds_level1() {
        // The engagement agent fails permanently; level-1 agents must still
        // run against an enrichment block built from neutral defaults.
        let client = ScriptedClient::failing_when("engagement analyst");
        let scheduler = Scheduler::new(
            &client,
            fast_config(ExecutionStrategy::Leveled),
            GenerationOptions::default(),
        );

        let outcome = scheduler.run(&sample_input()).await;

        let engagement = &outcome.results["engagement"];
        assert!(engagement.error_flag);
        assert_eq!(engagement.score, 50.0);

        let strategy = &outcome.results["strategy_synthesis"];
        assert!(strategy.is_ok());
        assert!(outcome
            .metadata
            .failed_agents
            .contains(&"engagement".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_failure_still_completes() {
        let client = ScriptedClient::failing_all();
        let scheduler = Scheduler::new(
            &client,
            fast_config(ExecutionStrategy::Sequential),
            GenerationOptions::default(),
        );

        let outcome = scheduler.run(&sample_input()).await;

        assert_eq!(outcome.results.len(), 10);
        assert!(outcome.results.values().all(|r| r.error_flag));
        assert_eq!(outcome.validation.status, "error");
        assert_eq!(outcome.validation.confidence, 0.30);
        assert_eq!(outcome.metadata.failed_agents.len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_strategy_same_result_shape() {
        let client = ScriptedClient::healthy();
        let scheduler = Scheduler::new(
            &client,
            fast_config(ExecutionStrategy::Parallel),
            GenerationOptions::default(),
        );

        let outcome = scheduler.run(&sample_input()).await;
        assert_eq!(outcome.results.len(), 10);
        assert_eq!(outcome.metadata.strategy, "parallel");
    }

    #[test]
    fn test_level0_summary_neutral_defaults_for_fallback() {
        let mut results = HashMap::new();
        results.insert(
            "engagement".to_string(),
            AgentResult::fallback("engagement", "timeout"),
        );

        let summary = build_level0_summary(&results);

        // Fallback carries no metrics, so the documented neutral defaults
        // must appear in the enrichment block.
        assert_eq!(
            value_path::f64_at(&summary, "agents.engagement.engagement_rate", -1.0),
            0.0
        );
        assert_eq!(
            value_path::f64_at(&summary, "agents.engagement.engagement_quality", -1.0),
            50.0
        );
        assert_eq!(
            value_path::f64_at(&summary, "agents.audience_quality.bot_score", -1.0),
            30.0
        );
        assert_eq!(
            value_path::str_at(&summary, "agents.growth.growth_trend", ""),
            "unknown"
        );
    }

    #[test]
    fn test_score_consistency_measure() {
        let (mean, consistency) = score_consistency(&[70.0, 70.0, 70.0]);
        assert_eq!(mean, 70.0);
        assert_eq!(consistency, 1.0);

        let (_, spread) = score_consistency(&[10.0, 90.0]);
        assert!(spread < 0.6);

        let (_, empty) = score_consistency(&[]);
        assert_eq!(empty, 1.0);
    }

    #[test]
    fn test_validation_bundle_counts() {
        let mut results = HashMap::new();
        results.insert(
            "engagement".to_string(),
            crate::agents::normalize_result("engagement", &serde_json::json!({"score": 80})),
        );
        results.insert(
            "growth".to_string(),
            AgentResult::fallback("growth", "nope"),
        );

        let bundle = build_validation_bundle(&sample_input(), &results);
        assert_eq!(value_path::u64_at(&bundle, "stats.succeeded", 99), 1);
        assert_eq!(value_path::u64_at(&bundle, "stats.failed", 99), 1);
        assert_eq!(
            value_path::str_at(&bundle, "agent_results.growth.status", ""),
            "error"
        );
    }
}
