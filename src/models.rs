//! Data models for the account analyzer.
//!
//! This module contains all the core data structures used throughout
//! the application for representing account snapshots, agent results,
//! findings, recommendations, and the final report.

use crate::value_path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Severity level of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Low severity - cosmetic issues, minor optimizations
    Low,
    /// Medium severity - measurable drag on performance
    Medium,
    /// High severity - active harm to reach or account standing
    High,
    /// Critical severity - account-threatening problems
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "Low"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
            Severity::Critical => write!(f, "Critical"),
        }
    }
}

impl Severity {
    /// Returns an emoji representation of the severity.
    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Low => "🟢",
            Severity::Medium => "🟡",
            Severity::High => "🟠",
            Severity::Critical => "🔴",
        }
    }

    /// Parse from a loosely-cased string, defaulting unknown values to Low.
    pub fn parse_lenient(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "medium" | "moderate" => Severity::Medium,
            _ => Severity::Low,
        }
    }
}

/// Letter grade summarizing overall account health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HealthGrade {
    F,
    D,
    C,
    B,
    A,
}

impl HealthGrade {
    /// Map a 0-100 score to its grade band.
    /// A: 90-100, B: 80-89, C: 70-79, D: 60-69, F: below 60.
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            HealthGrade::A
        } else if score >= 80.0 {
            HealthGrade::B
        } else if score >= 70.0 {
            HealthGrade::C
        } else if score >= 60.0 {
            HealthGrade::D
        } else {
            HealthGrade::F
        }
    }
}

impl fmt::Display for HealthGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            HealthGrade::A => "A",
            HealthGrade::B => "B",
            HealthGrade::C => "C",
            HealthGrade::D => "D",
            HealthGrade::F => "F",
        };
        write!(f, "{}", letter)
    }
}

/// The account snapshot under analysis.
///
/// Deliberately loose: a JSON object whose keys may be partially populated
/// depending on the acquisition mode (`full_access` vs `public_only`).
/// Every consumer reads through the typed accessors with a documented
/// default. Only the enrichment steps between scheduler levels mutate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountData(pub Map<String, Value>);

impl AccountData {
    /// Wrap a JSON object; non-object values yield an empty snapshot.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self(Map::new()),
        }
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Insert or replace an enrichment block under `key`.
    pub fn enrich(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    pub fn f64_at(&self, path: &str, default: f64) -> f64 {
        value_path::f64_at(&Value::Object(self.0.clone()), path, default)
    }

    pub fn u64_at(&self, path: &str, default: u64) -> u64 {
        value_path::u64_at(&Value::Object(self.0.clone()), path, default)
    }

    pub fn str_at(&self, path: &str, default: &str) -> String {
        value_path::str_at(&Value::Object(self.0.clone()), path, default).to_string()
    }

    pub fn array_len(&self, path: &str) -> usize {
        value_path::array_at(&Value::Object(self.0.clone()), path).len()
    }

    /// Username, or a placeholder when the snapshot lacks one.
    pub fn username(&self) -> String {
        self.str_at("username", "unknown_account")
    }
}

/// Outcome status of one agent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Ok,
    Error,
}

/// Structured difficulty/timeframe tags an agent attached to one
/// recommendation. Absent fields mean the agent returned free text there.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RecommendationTag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<Timeframe>,
}

/// Normalized output of one agent invocation.
///
/// Write-once per run; only the sanity-gate pass may later overwrite
/// individual `metrics` fields, and it must append an audit note when it does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_name: String,
    pub status: AgentStatus,
    /// 0-100 quality score for the agent's concern.
    pub score: f64,
    pub findings: Vec<String>,
    pub recommendations: Vec<String>,
    /// Severity tags aligned with `findings` by index; `None` entries are
    /// findings the agent returned as free text.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finding_severities: Vec<Option<Severity>>,
    /// Tags aligned with `recommendations` by index.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendation_tags: Vec<RecommendationTag>,
    /// Agent-specific metric map (loose JSON object).
    pub metrics: Value,
    /// 0-1 self-reported confidence.
    pub confidence: f64,
    pub error_flag: bool,
    /// Audit notes appended by the sanity-gate pass.
    #[serde(default)]
    pub audit_notes: Vec<String>,
}

impl AgentResult {
    /// The standard neutral result substituted for any agent call that
    /// could not complete: neutral score, low confidence, error-flagged.
    pub fn fallback(agent_name: &str, reason: &str) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            status: AgentStatus::Error,
            score: 50.0,
            findings: vec![format!(
                "Analysis unavailable for {}: {}",
                agent_name, reason
            )],
            recommendations: vec![format!(
                "Re-run the analysis to obtain {} insights.",
                agent_name
            )],
            finding_severities: Vec::new(),
            recommendation_tags: Vec::new(),
            metrics: Value::Object(Map::new()),
            confidence: 0.30,
            error_flag: true,
            audit_notes: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == AgentStatus::Ok && !self.error_flag
    }

    pub fn metric_f64(&self, path: &str, default: f64) -> f64 {
        value_path::f64_at(&self.metrics, path, default)
    }

    pub fn metric_str(&self, path: &str, default: &str) -> String {
        value_path::str_at(&self.metrics, path, default).to_string()
    }

    /// Overwrite one metric field, used exclusively by sanity gates.
    pub fn set_metric(&mut self, key: &str, value: Value) {
        if let Value::Object(map) = &mut self.metrics {
            map.insert(key.to_string(), value);
        } else {
            let mut map = Map::new();
            map.insert(key.to_string(), value);
            self.metrics = Value::Object(map);
        }
    }
}

/// One concrete problem surfaced by the deterministic analysis engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub category: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub evidence: Vec<String>,
    pub metrics: Value,
    /// 0-100 estimated impact on account performance.
    pub impact_score: f64,
    /// 0-1 confidence in the finding.
    pub confidence: f64,
    pub rationale: String,
}

/// How hard a recommendation is to implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn parse_lenient(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "easy" | "low" | "simple" => Difficulty::Easy,
            "hard" | "high" | "complex" => Difficulty::Hard,
            _ => Difficulty::Medium,
        }
    }

    /// Ease factor used in priority scoring (easier scores higher).
    pub fn ease_factor(&self) -> f64 {
        match self {
            Difficulty::Easy => 1.0,
            Difficulty::Medium => 0.6,
            Difficulty::Hard => 0.3,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        };
        write!(f, "{}", label)
    }
}

/// Expected execution window for a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "immediate")]
    Immediate,
    #[serde(rename = "1-2 weeks")]
    Weeks1to2,
    #[serde(rename = "1-3 months")]
    Months1to3,
    #[serde(rename = "3-6 months")]
    Months3to6,
}

impl Timeframe {
    pub fn parse_lenient(s: &str) -> Self {
        let lower = s.to_lowercase();
        if lower.contains("immediate") || lower.contains("now") || lower.contains("today") {
            Timeframe::Immediate
        } else if lower.contains("week") {
            Timeframe::Weeks1to2
        } else if lower.contains("3-6") || lower.contains("6 month") {
            Timeframe::Months3to6
        } else {
            Timeframe::Months1to3
        }
    }

    /// Urgency factor used in priority scoring (sooner scores higher).
    pub fn urgency_factor(&self) -> f64 {
        match self {
            Timeframe::Immediate => 1.0,
            Timeframe::Weeks1to2 => 0.8,
            Timeframe::Months1to3 => 0.5,
            Timeframe::Months3to6 => 0.3,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Timeframe::Immediate => "immediate",
            Timeframe::Weeks1to2 => "1-2 weeks",
            Timeframe::Months1to3 => "1-3 months",
            Timeframe::Months3to6 => "3-6 months",
        };
        write!(f, "{}", label)
    }
}

/// One actionable recommendation, paired to a finding when high-impact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    /// 1 = highest priority; lower numbers sort first.
    pub priority: u32,
    pub category: String,
    pub action: String,
    pub description: String,
    pub expected_impact: String,
    pub impact_score: f64,
    pub difficulty: Difficulty,
    pub timeframe: Timeframe,
    pub implementation_steps: Vec<String>,
    pub rationale: String,
    pub quick_win: bool,
}

/// A single metric override applied by the sanity-gate pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateOverride {
    pub rule: String,
    pub agent: String,
    pub metric: String,
    pub before: Value,
    pub after: Value,
    pub note: String,
}

/// Audit trail of everything the sanity-gate pass changed or flagged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SanityGateReport {
    pub overrides: Vec<GateOverride>,
    /// Coarse phase label derived from the reconciled metrics.
    pub strategic_phase: String,
}

impl SanityGateReport {
    pub fn record(
        &mut self,
        rule: &str,
        agent: &str,
        metric: &str,
        before: Value,
        after: Value,
        note: &str,
    ) {
        self.overrides.push(GateOverride {
            rule: rule.to_string(),
            agent: agent.to_string(),
            metric: metric.to_string(),
            before,
            after,
            note: note.to_string(),
        });
    }
}

/// Executive summary at the top of every report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutiveSummary {
    pub username: String,
    pub overall_score: f64,
    pub health_grade: HealthGrade,
    pub strategic_phase: String,
    pub headline: String,
    pub key_strengths: Vec<String>,
    pub key_issues: Vec<String>,
}

/// Status and confidence of the validation agent's cross-check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationBlock {
    pub status: String,
    pub confidence: f64,
    pub score_consistency: f64,
    pub issues: Vec<String>,
    pub high_severity_issue: bool,
}

impl Default for ValidationBlock {
    fn default() -> Self {
        Self {
            status: "error".to_string(),
            confidence: 0.30,
            score_consistency: 0.0,
            issues: vec!["Validation agent did not complete.".to_string()],
            high_severity_issue: false,
        }
    }
}

/// Per-agent timing and outcome bookkeeping for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestrationMetadata {
    pub strategy: String,
    pub completed_agents: Vec<String>,
    pub failed_agents: Vec<String>,
    pub agent_durations_ms: std::collections::HashMap<String, u64>,
    pub total_duration_seconds: f64,
    pub soft_timeout_exceeded: bool,
}

/// Recommendations bucketed by execution window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationBuckets {
    pub quick_wins: Vec<Recommendation>,
    pub short_term: Vec<Recommendation>,
    pub medium_term: Vec<Recommendation>,
    pub long_term: Vec<Recommendation>,
}

impl RecommendationBuckets {
    pub fn from_recommendations(recs: &[Recommendation]) -> Self {
        let mut buckets = Self::default();
        for rec in recs {
            if rec.quick_win {
                buckets.quick_wins.push(rec.clone());
                continue;
            }
            match rec.timeframe {
                Timeframe::Immediate | Timeframe::Weeks1to2 => {
                    buckets.short_term.push(rec.clone())
                }
                Timeframe::Months1to3 => buckets.medium_term.push(rec.clone()),
                Timeframe::Months3to6 => buckets.long_term.push(rec.clone()),
            }
        }
        buckets
    }
}

/// One categorized risk with its assessed level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskEntry {
    pub category: String,
    pub level: String,
    pub summary: String,
}

/// Metric to watch, with an alert threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringItem {
    pub metric: String,
    pub alert_threshold: String,
    pub cadence: String,
}

/// Confidence assessment of the input data itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataQuality {
    pub completeness: f64,
    pub confidence: f64,
    pub missing_sections: Vec<String>,
    pub notes: Vec<String>,
}

/// Metadata about the analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub username: String,
    pub analysis_date: DateTime<Utc>,
    pub model_used: String,
    pub agents_run: usize,
    pub agents_failed: usize,
    pub duration_seconds: f64,
}

/// The complete analysis report. Built once at the end of a run; immutable.
///
/// Field names and nesting are a stable contract consumed by the rendering
/// layer downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub executive_summary: ExecutiveSummary,
    pub category_scores: std::collections::HashMap<String, f64>,
    pub findings: Vec<Finding>,
    pub recommendations: Vec<Recommendation>,
    pub recommendation_buckets: RecommendationBuckets,
    pub risk_assessment: Vec<RiskEntry>,
    pub monitoring_plan: Vec<MonitoringItem>,
    pub data_quality: DataQuality,
    pub validation: ValidationBlock,
    pub sanity_gates: SanityGateReport,
    pub agent_details: std::collections::HashMap<String, AgentResult>,
    pub orchestration_metadata: OrchestrationMetadata,
    /// Present only when advanced analysis ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advanced: Option<Value>,
    /// Present only when a content plan was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_plan: Option<Value>,
}

impl Report {
    /// Minimal failure report emitted when an unexpected error escapes the
    /// orchestration entry point. The only case signalling total failure.
    pub fn failure(username: &str, model: &str, error: &str) -> Self {
        Self {
            metadata: ReportMetadata {
                username: username.to_string(),
                analysis_date: Utc::now(),
                model_used: model.to_string(),
                agents_run: 0,
                agents_failed: 0,
                duration_seconds: 0.0,
            },
            executive_summary: ExecutiveSummary {
                username: username.to_string(),
                overall_score: 0.0,
                health_grade: HealthGrade::F,
                strategic_phase: "unknown".to_string(),
                headline: "Analysis failed before any agent completed.".to_string(),
                key_strengths: Vec::new(),
                key_issues: vec![error.to_string()],
            },
            category_scores: Default::default(),
            findings: Vec::new(),
            recommendations: Vec::new(),
            recommendation_buckets: RecommendationBuckets::default(),
            risk_assessment: Vec::new(),
            monitoring_plan: Vec::new(),
            data_quality: DataQuality {
                completeness: 0.0,
                confidence: 0.0,
                missing_sections: Vec::new(),
                notes: vec!["Run aborted by a system error.".to_string()],
            },
            validation: ValidationBlock::default(),
            sanity_gates: SanityGateReport::default(),
            agent_details: Default::default(),
            orchestration_metadata: OrchestrationMetadata::default(),
            advanced: None,
            content_plan: None,
        }
    }
}
