//! Markdown report generation.
//!
//! This module renders the analysis report as Markdown for humans or
//! pretty-printed JSON for downstream tooling. Field names and nesting in
//! the JSON output are a stable contract.

use crate::models::{
    ExecutiveSummary, Finding, MonitoringItem, Recommendation, Report, ReportMetadata, RiskEntry,
    SanityGateReport, Severity, ValidationBlock,
};
use crate::value_path;
use anyhow::Result;
use serde_json::Value;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    output.push_str("# GramLens Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.executive_summary));
    output.push_str(&generate_scores_section(&report.category_scores));
    output.push_str(&generate_findings_section(&report.findings));
    output.push_str(&generate_recommendations_section(&report.recommendations));
    output.push_str(&generate_risk_section(&report.risk_assessment));
    output.push_str(&generate_monitoring_section(&report.monitoring_plan));
    output.push_str(&generate_validation_section(
        &report.validation,
        &report.sanity_gates,
    ));

    if let Some(ref advanced) = report.advanced {
        output.push_str(&generate_advanced_section(advanced));
    }
    if let Some(ref plan) = report.content_plan {
        output.push_str(&generate_content_plan_section(plan));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Account:** @{}\n", metadata.username));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Model Used:** `{}`\n", metadata.model_used));
    section.push_str(&format!("- **Agents Run:** {}\n", metadata.agents_run));
    if metadata.agents_failed > 0 {
        section.push_str(&format!(
            "- **Agents Failed:** {}\n",
            metadata.agents_failed
        ));
    }
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the executive summary section.
fn generate_summary_section(summary: &ExecutiveSummary) -> String {
    let mut section = String::new();

    section.push_str("## Executive Summary\n\n");
    section.push_str(&format!(
        "**Overall Score:** {:.0}/100 (grade **{}**)\n\n",
        summary.overall_score, summary.health_grade
    ));
    section.push_str(&format!(
        "**Strategic Phase:** {}\n\n",
        summary.strategic_phase
    ));
    section.push_str(&format!("{}\n\n", summary.headline));

    if !summary.key_strengths.is_empty() {
        section.push_str("### Key Strengths\n\n");
        for strength in &summary.key_strengths {
            section.push_str(&format!("- ✅ {}\n", strength));
        }
        section.push('\n');
    }

    if !summary.key_issues.is_empty() {
        section.push_str("### Key Issues\n\n");
        for issue in &summary.key_issues {
            section.push_str(&format!("- ⚠️ {}\n", issue));
        }
        section.push('\n');
    }

    section
}

/// Generate the per-category score table.
fn generate_scores_section(scores: &std::collections::HashMap<String, f64>) -> String {
    if scores.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Category Scores\n\n");
    section.push_str("| Category | Score |\n");
    section.push_str("|:---|:---:|\n");

    let mut rows: Vec<_> = scores.iter().collect();
    rows.sort_by(|a, b| {
        b.1.partial_cmp(a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(b.0))
    });
    for (category, score) in rows {
        section.push_str(&format!("| {} | {:.0}/100 |\n", category, score));
    }
    section.push('\n');

    section
}

/// Generate the findings section.
fn generate_findings_section(findings: &[Finding]) -> String {
    let mut section = String::new();

    section.push_str("## Findings\n\n");

    if findings.is_empty() {
        section.push_str("No notable issues were found. 🎉\n\n");
        return section;
    }

    // Severity first, then impact.
    let mut sorted = findings.to_vec();
    sorted.sort_by(|a, b| {
        b.severity.cmp(&a.severity).then(
            b.impact_score
                .partial_cmp(&a.impact_score)
                .unwrap_or(std::cmp::Ordering::Equal),
        )
    });

    for finding in &sorted {
        section.push_str(&generate_finding_block(finding));
    }

    section
}

/// Generate a single finding block.
fn generate_finding_block(finding: &Finding) -> String {
    let mut block = String::new();

    block.push_str(&format!(
        "### {} **{}** {} - {}\n\n",
        finding.severity.emoji(),
        finding.severity.to_string().to_uppercase(),
        finding.category,
        finding.title
    ));

    if !finding.description.is_empty() {
        block.push_str(&format!("{}\n\n", finding.description));
    }

    if !finding.evidence.is_empty() {
        block.push_str("**Evidence:**\n\n");
        for item in &finding.evidence {
            block.push_str(&format!("- {}\n", item));
        }
        block.push('\n');
    }

    block.push_str(&format!(
        "*Impact: {:.0}/100 | Confidence: {:.0}%*\n\n",
        finding.impact_score,
        finding.confidence * 100.0
    ));

    block.push_str("---\n\n");

    block
}

/// Generate the prioritized recommendations section.
fn generate_recommendations_section(recommendations: &[Recommendation]) -> String {
    if recommendations.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Recommendations\n\n");

    for rec in recommendations {
        let quick = if rec.quick_win { " ⚡" } else { "" };
        section.push_str(&format!(
            "{}. **{}**{} ({}, {})\n",
            rec.priority, rec.action, quick, rec.difficulty, rec.timeframe
        ));
        if !rec.description.is_empty() {
            section.push_str(&format!("   {}\n", rec.description));
        }
        for step in &rec.implementation_steps {
            section.push_str(&format!("   - {}\n", step));
        }
    }
    section.push('\n');

    section
}

/// Generate the risk assessment table.
fn generate_risk_section(risks: &[RiskEntry]) -> String {
    if risks.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Risk Assessment\n\n");
    section.push_str("| Category | Level | Summary |\n");
    section.push_str("|:---|:---:|:---|\n");
    for risk in risks {
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            risk.category, risk.level, risk.summary
        ));
    }
    section.push('\n');

    section
}

/// Generate the monitoring plan table.
fn generate_monitoring_section(items: &[MonitoringItem]) -> String {
    if items.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Monitoring Plan\n\n");
    section.push_str("| Metric | Alert Threshold | Cadence |\n");
    section.push_str("|:---|:---|:---:|\n");
    for item in items {
        section.push_str(&format!(
            "| `{}` | {} | {} |\n",
            item.metric, item.alert_threshold, item.cadence
        ));
    }
    section.push('\n');

    section
}

/// Generate the validation and sanity-gate audit section.
fn generate_validation_section(
    validation: &ValidationBlock,
    gates: &SanityGateReport,
) -> String {
    let mut section = String::new();

    section.push_str("## Quality Assurance\n\n");
    section.push_str(&format!(
        "- **Validation status:** {} (confidence {:.0}%, score consistency {:.0}%)\n",
        validation.status,
        validation.confidence * 100.0,
        validation.score_consistency * 100.0
    ));
    for issue in &validation.issues {
        section.push_str(&format!("  - {}\n", issue));
    }

    if gates.overrides.is_empty() {
        section.push_str("- **Sanity gates:** no inconsistencies detected\n");
    } else {
        section.push_str(&format!(
            "- **Sanity gates:** {} metric(s) reconciled\n",
            gates.overrides.len()
        ));
        for gate in &gates.overrides {
            section.push_str(&format!("  - [{}] {}\n", gate.rule, gate.note));
        }
    }
    section.push('\n');

    section
}

/// Generate a condensed view of the advanced analysis output.
fn generate_advanced_section(advanced: &Value) -> String {
    let mut section = String::new();

    section.push_str("## Advanced Analysis\n\n");
    section.push_str(&format!(
        "**Benchmark Score:** {:.0}/100\n\n",
        value_path::f64_at(advanced, "overall_score", 0.0)
    ));

    let summary = value_path::str_at(advanced, "executive_summary", "");
    if !summary.is_empty() {
        section.push_str(&format!("{}\n\n", summary));
    }

    let issues = value_path::array_at(advanced, "key_issues");
    if !issues.is_empty() {
        section.push_str("**Top Issues:**\n\n");
        for issue in issues {
            if let Value::String(text) = issue {
                section.push_str(&format!("- {}\n", text));
            }
        }
        section.push('\n');
    }

    let skipped = value_path::array_at(advanced, "indeterminate_modules");
    if !skipped.is_empty() {
        let names: Vec<&str> = skipped.iter().filter_map(|v| v.as_str()).collect();
        section.push_str(&format!(
            "*Modules without enough data: {}*\n\n",
            names.join(", ")
        ));
    }

    section
}

/// Generate the content plan section from the raw agent output.
fn generate_content_plan_section(plan: &Value) -> String {
    let mut section = String::new();

    section.push_str("## Content Plan\n\n");

    let items = value_path::array_at(plan, "posts");
    if items.is_empty() {
        section.push_str("```json\n");
        section.push_str(&serde_json::to_string_pretty(plan).unwrap_or_default());
        section.push_str("\n```\n\n");
        return section;
    }

    for (i, item) in items.iter().enumerate() {
        let format = value_path::str_at(item, "format", "post");
        let idea = value_path::str_at(item, "idea", "");
        let hook = value_path::str_at(item, "hook", "");
        section.push_str(&format!("{}. **[{}]** {}\n", i + 1, format, idea));
        if !hook.is_empty() {
            section.push_str(&format!("   Hook: {}\n", hook));
        }
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by GramLens*\n");

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        DataQuality, Difficulty, HealthGrade, OrchestrationMetadata, RecommendationBuckets,
        Timeframe,
    };
    use chrono::Utc;
    use serde_json::json;

    fn create_test_report() -> Report {
        let metadata = ReportMetadata {
            username: "travelgram".to_string(),
            analysis_date: Utc::now(),
            model_used: "test-model".to_string(),
            agents_run: 10,
            agents_failed: 1,
            duration_seconds: 30.0,
        };

        let findings = vec![Finding {
            id: "agg-1".to_string(),
            category: "Engagement".to_string(),
            severity: Severity::High,
            title: "Engagement rate far below benchmark".to_string(),
            description: "Rate is 0.4% vs 2.75% expected.".to_string(),
            evidence: vec!["actual = 0.4%".to_string()],
            metrics: json!({}),
            impact_score: 75.0,
            confidence: 0.9,
            rationale: "Benchmark ratio crossed a threshold.".to_string(),
        }];

        let recommendations = vec![Recommendation {
            id: "agg-rec-1".to_string(),
            priority: 1,
            category: "Engagement".to_string(),
            action: "Reply to every comment within an hour".to_string(),
            description: "Early replies feed the ranking signals.".to_string(),
            expected_impact: "high".to_string(),
            impact_score: 80.0,
            difficulty: Difficulty::Easy,
            timeframe: Timeframe::Immediate,
            implementation_steps: vec!["Enable push notifications".to_string()],
            rationale: "r".to_string(),
            quick_win: true,
        }];

        Report {
            metadata,
            executive_summary: ExecutiveSummary {
                username: "travelgram".to_string(),
                overall_score: 62.0,
                health_grade: HealthGrade::D,
                strategic_phase: "growth".to_string(),
                headline: "Overall account health: 62/100 (grade D).".to_string(),
                key_strengths: vec!["Content scored 80/100".to_string()],
                key_issues: vec!["Engagement rate far below benchmark".to_string()],
            },
            category_scores: [("Engagement".to_string(), 40.0)].into_iter().collect(),
            recommendation_buckets: RecommendationBuckets::from_recommendations(
                &recommendations,
            ),
            findings,
            recommendations,
            risk_assessment: Vec::new(),
            monitoring_plan: Vec::new(),
            data_quality: DataQuality {
                completeness: 0.8,
                confidence: 0.7,
                missing_sections: vec!["audience".to_string()],
                notes: Vec::new(),
            },
            validation: ValidationBlock {
                status: "ok".to_string(),
                confidence: 0.9,
                score_consistency: 0.85,
                issues: Vec::new(),
                high_severity_issue: false,
            },
            sanity_gates: SanityGateReport::default(),
            agent_details: Default::default(),
            orchestration_metadata: OrchestrationMetadata::default(),
            advanced: None,
            content_plan: None,
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let report = create_test_report();
        let markdown = generate_markdown_report(&report);

        assert!(markdown.contains("# GramLens Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Executive Summary"));
        assert!(markdown.contains("@travelgram"));
        assert!(markdown.contains("Engagement rate far below benchmark"));
        assert!(markdown.contains("Reply to every comment within an hour"));
    }

    #[test]
    fn test_metadata_section_shows_failures() {
        let report = create_test_report();
        let section = generate_metadata_section(&report.metadata);

        assert!(section.contains("test-model"));
        assert!(section.contains("Agents Failed:"));
    }

    #[test]
    fn test_finding_block_severity_badge() {
        let report = create_test_report();
        let block = generate_finding_block(&report.findings[0]);

        assert!(block.contains("HIGH"));
        assert!(block.contains("Engagement"));
        assert!(block.contains("actual = 0.4%"));
    }

    #[test]
    fn test_advanced_section_rendered_when_present() {
        let mut report = create_test_report();
        report.advanced = Some(json!({
            "overall_score": 55.0,
            "executive_summary": "Benchmark summary text.",
            "key_issues": ["issue one", "issue two"],
            "indeterminate_modules": ["shadowban_risk"]
        }));

        let markdown = generate_markdown_report(&report);
        assert!(markdown.contains("## Advanced Analysis"));
        assert!(markdown.contains("Benchmark summary text."));
        assert!(markdown.contains("issue one"));
        assert!(markdown.contains("shadowban_risk"));
    }

    #[test]
    fn test_content_plan_section_renders_posts() {
        let mut report = create_test_report();
        report.content_plan = Some(json!({
            "plan_confidence": 0.8,
            "posts": [
                { "week": 1, "day": "Tuesday", "format": "reel",
                  "idea": "Hidden rooftop cafes", "hook": "You walked past this twice today" }
            ]
        }));

        let markdown = generate_markdown_report(&report);
        assert!(markdown.contains("## Content Plan"));
        assert!(markdown.contains("**[reel]** Hidden rooftop cafes"));
        assert!(markdown.contains("Hook: You walked past this twice today"));
        // Structured plans render as a list, not a raw JSON dump.
        assert!(!markdown.contains("```json"));
    }

    #[test]
    fn test_generate_json_report() {
        let report = create_test_report();
        let json = generate_json_report(&report).unwrap();

        assert!(json.contains("\"executive_summary\""));
        assert!(json.contains("\"findings\""));
        assert!(json.contains("\"validation\""));
        // Absent optional blocks are omitted, not null.
        assert!(!json.contains("\"advanced\""));
    }
}
