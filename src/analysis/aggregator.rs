//! Weighted score aggregation, finding consolidation, and recommendation
//! prioritization across all agent outputs.
//!
//! Aggregation must succeed and return well-formed output even if every
//! agent failed, and is fully deterministic given identical agent outputs.

use crate::agents::catalog;
use crate::models::{
    AgentResult, Difficulty, Finding, HealthGrade, Recommendation, Severity, Timeframe,
    ValidationBlock,
};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Caps and dedup settings for consolidation.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub max_findings: usize,
    pub max_recommendations: usize,
    /// Two entries whose normalized prefixes of this length match are
    /// considered duplicates.
    pub dedupe_prefix_len: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_findings: 15,
            max_recommendations: 10,
            dedupe_prefix_len: 80,
        }
    }
}

/// Everything the aggregation pass computes for the report.
#[derive(Debug, Clone)]
pub struct AggregateOutput {
    pub overall_score: f64,
    pub health_grade: HealthGrade,
    pub category_scores: HashMap<String, f64>,
    pub findings: Vec<Finding>,
    pub recommendations: Vec<Recommendation>,
    pub key_strengths: Vec<String>,
    pub key_issues: Vec<String>,
    pub headline: String,
}

/// Weighted mean of successful agent scores, scaled by the validation
/// confidence multiplier.
///
/// Errored agents are ignored; if none succeeded the mean defaults to the
/// neutral 50. Multiplier: 1.0 above 0.85 confidence, 0.95 in [0.70, 0.85],
/// 0.90 below — capped at 0.85 whenever validation reported a
/// high-severity issue.
pub fn overall_score(results: &HashMap<String, AgentResult>, validation: &ValidationBlock) -> f64 {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    for (name, result) in results {
        let weight = catalog::weight(name);
        if weight == 0.0 || !result.is_ok() {
            continue;
        }
        weighted_sum += result.score * weight;
        weight_total += weight;
    }

    let mean = if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        50.0
    };

    let mut multiplier: f64 = if validation.confidence > 0.85 {
        1.0
    } else if validation.confidence >= 0.70 {
        0.95
    } else {
        0.90
    };
    if validation.high_severity_issue {
        multiplier = multiplier.min(0.85);
    }

    (mean * multiplier).clamp(0.0, 100.0)
}

const HIGH_TIER_KEYWORDS: &[&str] = &[
    "critical", "urgent", "severe", "high-risk", "shadowban", "bot", "fake", "penalt", "suspen",
];

const MEDIUM_TIER_KEYWORDS: &[&str] = &[
    "moderate",
    "optimiz",
    "improve",
    "inconsistent",
    "below average",
    "declin",
];

/// Keyword fallback for findings an agent returned as free text, without a
/// structured severity tag.
fn classify_importance(text: &str) -> Severity {
    let lower = text.to_lowercase();
    if HIGH_TIER_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Severity::High
    } else if MEDIUM_TIER_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Severity::Medium
    } else {
        Severity::Low
    }
}

fn severity_impact(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 90.0,
        Severity::High => 75.0,
        Severity::Medium => 50.0,
        Severity::Low => 25.0,
    }
}

/// Case-insensitive normalized prefix used for deduplication.
fn dedupe_key(text: &str, prefix_len: usize) -> String {
    let normalized: String = text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
    normalized.chars().take(prefix_len).collect()
}

/// Collect every agent's findings, categorize, tier, sort, dedupe, cap.
pub fn consolidate_findings(
    results: &HashMap<String, AgentResult>,
    config: &AggregatorConfig,
) -> Vec<Finding> {
    let mut entries: Vec<(Severity, f64, String, String)> = Vec::new();

    let mut names: Vec<&String> = results.keys().collect();
    names.sort();

    for name in names {
        let result = &results[name];
        if name == "validation" {
            continue;
        }
        let category = catalog::category_of(name);
        for (i, finding) in result.findings.iter().enumerate() {
            // Structured severity tag wins; keywords classify free text.
            let severity = result
                .finding_severities
                .get(i)
                .copied()
                .flatten()
                .unwrap_or_else(|| classify_importance(finding));
            entries.push((
                severity,
                result.confidence,
                category.to_string(),
                finding.clone(),
            ));
        }
    }

    // Severity desc, then confidence desc; stable on the sorted agent
    // order above, so output is deterministic.
    entries.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then(b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut seen = std::collections::HashSet::new();
    let mut findings = Vec::new();

    for (severity, confidence, category, text) in entries {
        let key = dedupe_key(&text, config.dedupe_prefix_len);
        if !seen.insert(key) {
            continue;
        }

        let impact = severity_impact(severity);

        findings.push(Finding {
            id: format!("agg-{}", findings.len() + 1),
            category: category.clone(),
            severity,
            title: text.clone(),
            description: text,
            evidence: Vec::new(),
            metrics: json!({}),
            impact_score: impact,
            confidence,
            rationale: format!("Reported by the {} analysis.", category.to_lowercase()),
        });

        if findings.len() >= config.max_findings {
            break;
        }
    }

    findings
}

const IMPACT_KEYWORDS: &[&str] = &[
    "engagement", "growth", "reach", "followers", "conversion", "revenue", "viral",
];

const EASY_KEYWORDS: &[&str] = &["quick", "simple", "easy", "update", "add", "switch"];
const HARD_KEYWORDS: &[&str] = &["overhaul", "redesign", "rebuild", "rebrand", "strategy"];

fn keyword_impact(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let hits = IMPACT_KEYWORDS.iter().filter(|k| lower.contains(*k)).count();
    (0.4 + 0.2 * hits as f64).min(1.0)
}

fn keyword_difficulty(text: &str) -> Difficulty {
    let lower = text.to_lowercase();
    if HARD_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Difficulty::Hard
    } else if EASY_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Difficulty::Easy
    } else {
        Difficulty::Medium
    }
}

/// Score each recommendation by a weighted composite of impact, ease,
/// urgency, and source-agent confidence; sort, dedupe, cap.
pub fn prioritize_recommendations(
    results: &HashMap<String, AgentResult>,
    config: &AggregatorConfig,
) -> Vec<Recommendation> {
    let mut scored: Vec<(f64, String, String, Difficulty, Timeframe)> = Vec::new();

    let mut names: Vec<&String> = results.keys().collect();
    names.sort();

    for name in names {
        let result = &results[name];
        if name == "validation" {
            continue;
        }
        let category = catalog::category_of(name);
        for (i, rec) in result.recommendations.iter().enumerate() {
            // Structured tags win; keyword heuristics classify free text.
            let tag = result
                .recommendation_tags
                .get(i)
                .copied()
                .unwrap_or_default();
            let difficulty = tag.difficulty.unwrap_or_else(|| keyword_difficulty(rec));
            let timeframe = tag.timeframe.unwrap_or_else(|| Timeframe::parse_lenient(rec));

            let impact = keyword_impact(rec);
            let composite = 0.40 * impact
                + 0.25 * difficulty.ease_factor()
                + 0.20 * timeframe.urgency_factor()
                + 0.15 * result.confidence;
            scored.push((
                composite,
                category.to_string(),
                rec.clone(),
                difficulty,
                timeframe,
            ));
        }
    }

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut seen = std::collections::HashSet::new();
    let mut recommendations = Vec::new();

    for (composite, category, text, difficulty, timeframe) in scored {
        let key = dedupe_key(&text, config.dedupe_prefix_len);
        if !seen.insert(key) {
            continue;
        }

        let priority = recommendations.len() as u32 + 1;

        recommendations.push(Recommendation {
            id: format!("agg-rec-{}", priority),
            priority,
            category,
            action: text.clone(),
            description: text,
            expected_impact: format!("{:.0}% priority-weighted impact", composite * 100.0),
            impact_score: composite * 100.0,
            difficulty,
            timeframe,
            implementation_steps: Vec::new(),
            rationale: "Prioritized across all agent recommendations.".to_string(),
            quick_win: difficulty == Difficulty::Easy && timeframe.urgency_factor() >= 0.8,
        });

        if recommendations.len() >= config.max_recommendations {
            break;
        }
    }

    recommendations
}

/// Run the whole aggregation pass over a finished set of agent results.
pub fn aggregate(
    results: &HashMap<String, AgentResult>,
    validation: &ValidationBlock,
    config: &AggregatorConfig,
) -> AggregateOutput {
    let score = overall_score(results, validation);
    let grade = HealthGrade::from_score(score);

    let mut category_scores: HashMap<String, f64> = HashMap::new();
    for (name, result) in results {
        if catalog::weight(name) > 0.0 {
            category_scores.insert(catalog::category_of(name).to_string(), result.score);
        }
    }

    let findings = consolidate_findings(results, config);
    let recommendations = prioritize_recommendations(results, config);

    let key_issues: Vec<String> = findings
        .iter()
        .filter(|f| f.severity >= Severity::High)
        .take(5)
        .map(|f| f.title.clone())
        .collect();

    let key_strengths: Vec<String> = {
        let mut names: Vec<&String> = results.keys().collect();
        names.sort();
        names
            .iter()
            .filter_map(|n| results.get(*n))
            .filter(|r| r.is_ok() && r.score >= 75.0)
            .map(|r| {
                format!(
                    "{} scored {:.0}/100",
                    catalog::category_of(&r.agent_name),
                    r.score
                )
            })
            .take(5)
            .collect()
    };

    let headline = format!(
        "Overall account health: {:.0}/100 (grade {}).",
        score, grade
    );

    AggregateOutput {
        overall_score: score,
        health_grade: grade,
        category_scores,
        findings,
        recommendations,
        key_strengths,
        key_issues,
        headline,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AgentStatus;
    use serde_json::Map;

    fn ok_result(name: &str, score: f64, confidence: f64) -> AgentResult {
        AgentResult {
            agent_name: name.to_string(),
            status: AgentStatus::Ok,
            score,
            findings: Vec::new(),
            recommendations: Vec::new(),
            finding_severities: Vec::new(),
            recommendation_tags: Vec::new(),
            metrics: Value::Object(Map::new()),
            confidence,
            error_flag: false,
            audit_notes: Vec::new(),
        }
    }

    fn high_confidence_validation() -> ValidationBlock {
        ValidationBlock {
            status: "ok".to_string(),
            confidence: 0.95,
            score_consistency: 1.0,
            issues: Vec::new(),
            high_severity_issue: false,
        }
    }

    fn all_nine(score: f64) -> HashMap<String, AgentResult> {
        catalog::analysis_agents()
            .iter()
            .map(|a| {
                (
                    crate::agents::AnalysisAgent::name(a).to_string(),
                    ok_result(crate::agents::AnalysisAgent::name(a), score, 0.9),
                )
            })
            .collect()
    }

    #[test]
    fn test_all_failed_defaults_to_neutral() {
        let mut results = HashMap::new();
        for agent in catalog::analysis_agents() {
            let name = crate::agents::AnalysisAgent::name(&agent).to_string();
            results.insert(name.clone(), AgentResult::fallback(&name, "down"));
        }
        // Validation also failed: confidence 0.30 puts the multiplier at 0.90.
        let validation = ValidationBlock::default();
        let score = overall_score(&results, &validation);
        assert_eq!(score, 45.0); // neutral 50 * 0.90
    }

    #[test]
    fn test_uniform_scores_with_full_confidence() {
        let results = all_nine(50.0);
        let score = overall_score(&results, &high_confidence_validation());
        assert!((score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_multiplier_bands() {
        let results = all_nine(80.0);

        let mut validation = high_confidence_validation();
        assert!((overall_score(&results, &validation) - 80.0).abs() < 1e-9);

        validation.confidence = 0.80;
        assert!((overall_score(&results, &validation) - 76.0).abs() < 1e-9);

        validation.confidence = 0.50;
        assert!((overall_score(&results, &validation) - 72.0).abs() < 1e-9);
    }

    #[test]
    fn test_high_severity_issue_caps_multiplier() {
        let results = all_nine(90.0);
        let mut validation = high_confidence_validation();
        validation.high_severity_issue = true;
        assert!((overall_score(&results, &validation) - 76.5).abs() < 1e-9);
    }

    #[test]
    fn test_errored_agents_ignored_in_mean() {
        let mut results = all_nine(90.0);
        results.insert(
            "engagement".to_string(),
            AgentResult::fallback("engagement", "down"),
        );
        // Remaining successful agents all scored 90, so the weighted mean
        // stays 90 regardless of the dropped weight.
        let score = overall_score(&results, &high_confidence_validation());
        assert!((score - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_consolidation_tiers_and_caps() {
        let mut results = HashMap::new();
        let mut engagement = ok_result("engagement", 40.0, 0.9);
        engagement.findings = vec![
            "Critical: bot activity suspected in comments".to_string(),
            "Moderate caption quality, could improve hooks".to_string(),
            "Feed colors are pleasant".to_string(),
        ];
        results.insert("engagement".to_string(), engagement);

        let findings = consolidate_findings(&results, &AggregatorConfig::default());
        assert_eq!(findings.len(), 3);
        assert_eq!(findings[0].severity, crate::models::Severity::High);
        assert_eq!(findings[1].severity, crate::models::Severity::Medium);
        assert_eq!(findings[2].severity, crate::models::Severity::Low);
    }

    #[test]
    fn test_structured_severity_beats_keyword_classification() {
        // Worded so no tier keyword matches; only the agent's own severity
        // tag can rank it correctly.
        let mut results = HashMap::new();
        let mut audience = ok_result("audience_quality", 30.0, 0.9);
        audience.findings =
            vec!["Follower base is concentrated in one distant region".to_string()];
        audience.finding_severities = vec![Some(Severity::Critical)];
        results.insert("audience_quality".to_string(), audience);

        let findings = consolidate_findings(&results, &AggregatorConfig::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);
        assert_eq!(findings[0].impact_score, 90.0);
    }

    #[test]
    fn test_untagged_findings_fall_back_to_keywords() {
        let mut results = HashMap::new();
        let mut agent = ok_result("engagement", 40.0, 0.9);
        agent.findings = vec!["Severe drop tied to suspected bot purchases".to_string()];
        // No finding_severities: the keyword path must still classify.
        results.insert("engagement".to_string(), agent);

        let findings = consolidate_findings(&results, &AggregatorConfig::default());
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn test_structured_tags_drive_recommendation_priority() {
        let mut results = HashMap::new();
        let mut agent = ok_result("posting_behavior", 60.0, 0.9);
        agent.recommendations = vec![
            "Hold the current cadence through the season".to_string(),
            "Pin the newest carousel to the profile".to_string(),
        ];
        agent.recommendation_tags = vec![
            crate::models::RecommendationTag::default(),
            crate::models::RecommendationTag {
                difficulty: Some(Difficulty::Easy),
                timeframe: Some(Timeframe::Immediate),
            },
        ];
        results.insert("posting_behavior".to_string(), agent);

        let recs = prioritize_recommendations(&results, &AggregatorConfig::default());
        assert_eq!(recs[0].action, "Pin the newest carousel to the profile");
        assert_eq!(recs[0].difficulty, Difficulty::Easy);
        assert_eq!(recs[0].timeframe, Timeframe::Immediate);
        assert!(recs[0].quick_win);
        assert_eq!(recs[1].difficulty, Difficulty::Medium);
    }

    #[test]
    fn test_dedupe_by_normalized_prefix() {
        let mut results = HashMap::new();
        let mut a = ok_result("engagement", 40.0, 0.9);
        a.findings = vec!["Engagement rate is well below the niche average".to_string()];
        let mut b = ok_result("growth", 40.0, 0.8);
        b.findings = vec!["ENGAGEMENT RATE IS WELL   BELOW the niche average".to_string()];
        results.insert("engagement".to_string(), a);
        results.insert("growth".to_string(), b);

        let findings = consolidate_findings(&results, &AggregatorConfig::default());
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_recommendations_sorted_and_capped() {
        let mut results = HashMap::new();
        let mut agent = ok_result("engagement", 60.0, 0.9);
        agent.recommendations = (0..15)
            .map(|i| format!("Recommendation number {} about growth topic {}", i, i))
            .collect();
        agent
            .recommendations
            .push("Quick easy win: update bio link now for engagement".to_string());
        results.insert("engagement".to_string(), agent);

        let recs = prioritize_recommendations(&results, &AggregatorConfig::default());
        assert_eq!(recs.len(), 10);
        // Priority numbers are dense, starting at 1.
        assert_eq!(recs[0].priority, 1);
        for window in recs.windows(2) {
            assert!(window[0].impact_score >= window[1].impact_score);
            assert!(window[0].priority < window[1].priority);
        }
        // The quick easy immediate one should have floated to the top.
        assert!(recs[0].quick_win);
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let results = all_nine(70.0);
        let validation = high_confidence_validation();
        let config = AggregatorConfig::default();

        let a = aggregate(&results, &validation, &config);
        let b = aggregate(&results, &validation, &config);
        assert_eq!(a.overall_score, b.overall_score);
        assert_eq!(a.findings.len(), b.findings.len());
        assert_eq!(a.key_strengths, b.key_strengths);
    }
}
