//! Advanced analysis engine: an independent deterministic report builder.
//!
//! Re-derives a detailed report directly from raw account data plus the
//! already-computed agent outputs. No remote calls. Each module reads
//! specific nested fields (missing fields take documented neutral values),
//! compares them against the injected benchmark tables, and emits exactly
//! one finding per crossed threshold, with a paired recommendation when the
//! finding is high-impact.

use crate::analysis::benchmarks::{AccountTier, Benchmarks};
use crate::analysis::sanity;
use crate::models::{
    AccountData, AgentResult, DataQuality, Difficulty, Finding, HealthGrade, MonitoringItem,
    Recommendation, RiskEntry, Severity, Timeframe,
};
use crate::value_path;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::debug;

/// Result of one analysis module.
///
/// `Indeterminate` is an explicit marker, never a numeric score: a module
/// that lacks the input to judge must say so rather than report a zero.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleOutcome {
    Scored(Value),
    Indeterminate { reason: String },
}

impl ModuleOutcome {
    fn to_value(&self) -> Value {
        match self {
            ModuleOutcome::Scored(metrics) => metrics.clone(),
            ModuleOutcome::Indeterminate { reason } => json!({
                "status": "indeterminate",
                "reason": reason,
            }),
        }
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, ModuleOutcome::Indeterminate { .. })
    }
}

/// Action plan phases, filled from the paired recommendations plus
/// standing template items.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActionPlan {
    pub immediate: Vec<String>,
    pub short_term: Vec<String>,
    pub medium_term: Vec<String>,
    pub long_term: Vec<String>,
}

/// The full output of the engine, attached to the report under `advanced`.
#[derive(Debug, Clone, Serialize)]
pub struct AdvancedReport {
    pub overall_score: f64,
    pub health_grade: HealthGrade,
    pub executive_summary: String,
    pub modules: Map<String, Value>,
    pub findings: Vec<Finding>,
    pub recommendations: Vec<Recommendation>,
    pub key_issues: Vec<String>,
    pub risk_assessment: Vec<RiskEntry>,
    pub monitoring_plan: Vec<MonitoringItem>,
    pub action_plan: ActionPlan,
    pub data_quality: DataQuality,
    pub indeterminate_modules: Vec<String>,
}

impl AdvancedReport {
    pub fn as_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn impact_for(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 90.0,
        Severity::High => 75.0,
        Severity::Medium => 50.0,
        Severity::Low => 25.0,
    }
}

/// One emitted finding plus its optional paired recommendation.
struct Emission {
    finding: Finding,
    paired: Option<PairedRec>,
}

struct PairedRec {
    action: String,
    description: String,
    steps: Vec<String>,
    difficulty: Difficulty,
    timeframe: Timeframe,
}

/// Accumulates module outcomes and emissions across one engine run.
#[derive(Default)]
struct RunState {
    modules: Map<String, Value>,
    emissions: Vec<Emission>,
    indeterminate: Vec<String>,
}

impl RunState {
    fn record(&mut self, module: &str, outcome: ModuleOutcome) {
        if outcome.is_indeterminate() {
            self.indeterminate.push(module.to_string());
        }
        self.modules.insert(module.to_string(), outcome.to_value());
    }

    fn emit(
        &mut self,
        category: &str,
        severity: Severity,
        title: &str,
        description: &str,
        evidence: Vec<String>,
        metrics: Value,
        rationale: &str,
        paired: Option<PairedRec>,
    ) {
        let finding = Finding {
            id: String::new(), // assigned after the impact sort
            category: category.to_string(),
            severity,
            title: title.to_string(),
            description: description.to_string(),
            evidence,
            metrics,
            impact_score: impact_for(severity),
            confidence: 0.9,
            rationale: rationale.to_string(),
        };
        self.emissions.push(Emission { finding, paired });
    }
}

pub struct AdvancedEngine<'a> {
    benchmarks: &'a Benchmarks,
}

impl<'a> AdvancedEngine<'a> {
    pub fn new(benchmarks: &'a Benchmarks) -> Self {
        Self { benchmarks }
    }

    /// Run all nine modules and assemble the detailed report.
    /// Deterministic: fixed module order, stable sorts, no clock reads.
    pub fn analyze(
        &self,
        account: &AccountData,
        results: &HashMap<String, AgentResult>,
    ) -> AdvancedReport {
        let mut state = RunState::default();
        let root = account.as_value();
        let posts = value_path::array_at(&root, "posts");

        self.bot_detection(results, &mut state);
        self.engagement_benchmark(account, results, &mut state);
        self.bio_niche_consistency(account, &mut state);
        self.hashtag_distribution(posts, &mut state);
        self.format_mix(posts, &mut state);
        self.category_distribution(posts, &mut state);
        self.shadowban_risk(account, posts, results, &mut state);
        self.viral_potential(posts, &mut state);
        let data_quality = self.data_quality(account, results, &mut state);

        // Findings ordered by impact, with module emission order breaking
        // ties, then assigned dense ids.
        let mut emissions = state.emissions;
        emissions.sort_by(|a, b| {
            b.finding
                .impact_score
                .partial_cmp(&a.finding.impact_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut findings = Vec::new();
        let mut recommendations = Vec::new();
        for emission in emissions {
            let mut finding = emission.finding;
            finding.id = format!("adv-{}", findings.len() + 1);

            if let Some(paired) = emission.paired {
                let priority = recommendations.len() as u32 + 1;
                recommendations.push(Recommendation {
                    id: format!("adv-rec-{}", priority),
                    priority,
                    category: finding.category.clone(),
                    action: paired.action,
                    description: paired.description,
                    expected_impact: format!(
                        "Addresses a {} severity finding (impact {:.0}/100).",
                        finding.severity, finding.impact_score
                    ),
                    impact_score: finding.impact_score,
                    difficulty: paired.difficulty,
                    timeframe: paired.timeframe,
                    implementation_steps: paired.steps,
                    rationale: finding.title.clone(),
                    quick_win: paired.difficulty == Difficulty::Easy
                        && paired.timeframe.urgency_factor() >= 0.8,
                });
            }
            findings.push(finding);
        }

        let score = overall_score(&findings);
        let grade = HealthGrade::from_score(score);
        let key_issues = key_issues(&findings);

        debug!(
            findings = findings.len(),
            indeterminate = state.indeterminate.len(),
            score,
            "advanced analysis complete"
        );

        let executive_summary = build_executive_summary(account, score, grade, &findings);
        let risk_assessment = build_risk_assessment(&findings);
        let monitoring_plan = self.build_monitoring_plan(account);
        let action_plan = build_action_plan(&recommendations);

        AdvancedReport {
            overall_score: score,
            health_grade: grade,
            executive_summary,
            modules: state.modules,
            findings,
            recommendations,
            key_issues,
            risk_assessment,
            monitoring_plan,
            action_plan,
            data_quality,
            indeterminate_modules: state.indeterminate,
        }
    }

    /// Bot / fake-follower detection from the audience-quality metrics.
    /// Neutral defaults: bot_score 30, authenticity_score 70.
    fn bot_detection(&self, results: &HashMap<String, AgentResult>, state: &mut RunState) {
        let bot = results
            .get("audience_quality")
            .map(|r| r.metric_f64("bot_score", 30.0))
            .unwrap_or(30.0);
        let authenticity = results
            .get("audience_quality")
            .map(|r| r.metric_f64("authenticity_score", 70.0))
            .unwrap_or(70.0);

        let high_risk = bot >= self.benchmarks.bot_score_high
            || authenticity <= self.benchmarks.authenticity_low;
        let (suspension_risk, cleanup_urgency) = if high_risk {
            ("high", "immediate")
        } else if bot >= 50.0 {
            ("moderate", "soon")
        } else {
            ("low", "none")
        };

        state.record(
            "bot_detection",
            ModuleOutcome::Scored(json!({
                "bot_score": bot,
                "authenticity_score": authenticity,
                "suspension_risk": suspension_risk,
                "cleanup_urgency": cleanup_urgency,
            })),
        );

        if high_risk {
            state.emit(
                "Audience",
                Severity::High,
                "Bot-inflated audience threatens account standing",
                &format!(
                    "Estimated bot score {:.0}/100 with authenticity {:.0}/100. \
                     Inauthentic followers suppress reach and risk enforcement action.",
                    bot, authenticity
                ),
                vec![
                    format!("bot_score = {:.0}", bot),
                    format!("authenticity_score = {:.0}", authenticity),
                ],
                json!({
                    "bot_score": bot,
                    "authenticity_score": authenticity,
                    "suspension_risk": "high",
                    "cleanup_urgency": "immediate",
                }),
                "Bot score crossed the high-risk benchmark.",
                Some(PairedRec {
                    action: "Audit and remove inauthentic followers".to_string(),
                    description: "Run a follower audit, remove obvious bot accounts, and stop \
                                  any engagement-buying services immediately."
                        .to_string(),
                    steps: vec![
                        "Export the follower list and flag accounts with no posts or profile photo"
                            .to_string(),
                        "Block or remove flagged accounts in batches".to_string(),
                        "Cancel any third-party growth services".to_string(),
                    ],
                    difficulty: Difficulty::Medium,
                    timeframe: Timeframe::Immediate,
                }),
            );
        } else if bot >= 50.0 {
            state.emit(
                "Audience",
                Severity::Medium,
                "Elevated bot share in the audience",
                &format!(
                    "Bot score {:.0}/100 sits above the comfortable range; monitor and clean up \
                     before it distorts engagement metrics.",
                    bot
                ),
                vec![format!("bot_score = {:.0}", bot)],
                json!({"bot_score": bot, "suspension_risk": "moderate"}),
                "Bot score is in the elevated band below the high-risk threshold.",
                None,
            );
        }
    }

    /// Engagement rate vs the niche- and tier-adjusted benchmark.
    fn engagement_benchmark(
        &self,
        account: &AccountData,
        results: &HashMap<String, AgentResult>,
        state: &mut RunState,
    ) {
        let followers = account.u64_at("profile.followers", 0);
        let tier = AccountTier::from_followers(followers);
        let niche = account_niche(account);
        let expected = self.benchmarks.expected_engagement(&niche, tier);
        let actual = actual_engagement_rate(account, results);
        let ratio = if expected > 0.0 { actual / expected } else { 1.0 };

        let (severity, penalty_risk) = if ratio < 0.2 {
            (Some(Severity::Critical), "critical")
        } else if ratio < 0.5 {
            (Some(Severity::High), "high")
        } else if ratio < 0.8 {
            (Some(Severity::Medium), "moderate")
        } else {
            (None, "low")
        };
        let is_critical = severity == Some(Severity::Critical);

        state.record(
            "engagement_benchmark",
            ModuleOutcome::Scored(json!({
                "tier": tier.label(),
                "niche": niche,
                "expected_engagement": expected,
                "actual_engagement": actual,
                "benchmark_ratio": ratio,
                "algorithm_penalty_risk": penalty_risk,
                "is_critical": is_critical,
            })),
        );

        let Some(severity) = severity else {
            return;
        };

        let paired = if severity >= Severity::High {
            Some(PairedRec {
                action: "Rebuild engagement with interaction-first content".to_string(),
                description: "Shift the next two weeks of posts toward formats that invite \
                              replies and saves, and respond to every comment within an hour."
                    .to_string(),
                steps: vec![
                    "Post one question-driven story per day".to_string(),
                    "Pin a comment asking a specific question on each post".to_string(),
                    "Reply to all comments within the first hour after posting".to_string(),
                ],
                difficulty: Difficulty::Medium,
                timeframe: Timeframe::Immediate,
            })
        } else {
            None
        };

        state.emit(
            "Engagement",
            severity,
            &format!(
                "Engagement rate {:.2}% is far below the {:.2}% benchmark for {} {} accounts",
                actual, expected, tier.label(), if niche.is_empty() { "general" } else { &niche }
            ),
            &format!(
                "Actual engagement is {:.0}% of the expected rate for this size tier. \
                 Sustained rates this low mark the account for reduced distribution.",
                ratio * 100.0
            ),
            vec![
                format!("actual engagement = {:.2}%", actual),
                format!("expected for tier = {:.2}%", expected),
            ],
            json!({
                "expected_engagement": expected,
                "actual_engagement": actual,
                "benchmark_ratio": ratio,
                "algorithm_penalty_risk": penalty_risk,
                "is_critical": is_critical,
            }),
            "Engagement benchmark ratio crossed a severity threshold.",
            paired,
        );
    }

    /// Does the bio actually signal the declared niche?
    fn bio_niche_consistency(&self, account: &AccountData, state: &mut RunState) {
        let bio = account.str_at("profile.bio", "");
        let niche = account_niche(account);

        if bio.is_empty() || niche.is_empty() {
            state.record(
                "bio_niche_consistency",
                ModuleOutcome::Indeterminate {
                    reason: "bio or niche missing from the snapshot".to_string(),
                },
            );
            return;
        }

        let keyword = niche
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_lowercase();
        let signals = !keyword.is_empty() && bio.to_lowercase().contains(&keyword);

        state.record(
            "bio_niche_consistency",
            ModuleOutcome::Scored(json!({
                "niche": niche,
                "bio_signals_niche": signals,
            })),
        );

        if !signals {
            state.emit(
                "Branding",
                Severity::Medium,
                "Bio does not signal the declared niche",
                &format!(
                    "The profile bio never mentions '{}'; visitors cannot tell what the \
                     account is about before deciding to follow.",
                    niche
                ),
                vec![format!("niche = {}", niche)],
                json!({"niche": niche, "bio_signals_niche": false}),
                "Bio text lacks the niche keyword.",
                None,
            );
        }
    }

    /// Hashtag volume and variety across recent posts.
    fn hashtag_distribution(&self, posts: &[Value], state: &mut RunState) {
        if posts.is_empty() {
            state.record(
                "hashtag_distribution",
                ModuleOutcome::Indeterminate {
                    reason: "no recent posts in the snapshot".to_string(),
                },
            );
            return;
        }

        let mut total = 0usize;
        let mut unique = std::collections::HashSet::new();
        for post in posts {
            for tag in value_path::array_at(post, "hashtags") {
                if let Value::String(s) = tag {
                    total += 1;
                    unique.insert(s.to_lowercase());
                }
            }
        }
        let avg = total as f64 / posts.len() as f64;
        let unique_ratio = if total > 0 {
            unique.len() as f64 / total as f64
        } else {
            1.0
        };

        state.record(
            "hashtag_distribution",
            ModuleOutcome::Scored(json!({
                "avg_hashtags_per_post": avg,
                "unique_ratio": unique_ratio,
                "total_hashtags": total,
            })),
        );

        if avg > self.benchmarks.max_hashtags_per_post {
            state.emit(
                "Hashtags",
                Severity::High,
                "Hashtag stuffing detected",
                &format!(
                    "Averaging {:.1} hashtags per post, above the {:.0} cap; this pattern is \
                     associated with reduced hashtag-surface distribution.",
                    avg, self.benchmarks.max_hashtags_per_post
                ),
                vec![format!("avg hashtags per post = {:.1}", avg)],
                json!({"avg_hashtags_per_post": avg}),
                "Average hashtag count exceeded the spam threshold.",
                Some(PairedRec {
                    action: "Cut hashtags to a focused set".to_string(),
                    description: "Use 5-10 specific, rotating hashtags per post instead of a \
                                  fixed maximal block."
                        .to_string(),
                    steps: vec![
                        "Build three hashtag sets of 5-10 tags each".to_string(),
                        "Rotate the sets across posts".to_string(),
                    ],
                    difficulty: Difficulty::Easy,
                    timeframe: Timeframe::Weeks1to2,
                }),
            );
        } else if total >= 10 && unique_ratio < 0.3 {
            state.emit(
                "Hashtags",
                Severity::Medium,
                "Repetitive hashtag set across posts",
                &format!(
                    "Only {:.0}% of used hashtags are unique; identical blocks repeated on \
                     every post read as automated behavior.",
                    unique_ratio * 100.0
                ),
                vec![format!("unique ratio = {:.2}", unique_ratio)],
                json!({"unique_ratio": unique_ratio}),
                "Hashtag variety fell below the repetition threshold.",
                None,
            );
        }
    }

    /// Share of reels in the recent format mix.
    fn format_mix(&self, posts: &[Value], state: &mut RunState) {
        if posts.is_empty() {
            state.record(
                "format_mix",
                ModuleOutcome::Indeterminate {
                    reason: "no recent posts in the snapshot".to_string(),
                },
            );
            return;
        }

        let reels = posts.iter().filter(|p| is_reel(p)).count();
        let share = reels as f64 / posts.len() as f64;

        state.record(
            "format_mix",
            ModuleOutcome::Scored(json!({
                "post_count": posts.len(),
                "reel_share": share,
            })),
        );

        if share < self.benchmarks.min_reel_share {
            state.emit(
                "Content",
                Severity::Medium,
                "Format mix under-uses reels",
                &format!(
                    "Reels make up {:.0}% of recent posts, below the {:.0}% floor; reels carry \
                     most non-follower reach.",
                    share * 100.0,
                    self.benchmarks.min_reel_share * 100.0
                ),
                vec![format!("reel share = {:.0}%", share * 100.0)],
                json!({"reel_share": share}),
                "Reel share fell below the benchmark floor.",
                None,
            );
        }
    }

    /// Spread of content categories across recent posts.
    fn category_distribution(&self, posts: &[Value], state: &mut RunState) {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for post in posts {
            let category = value_path::str_at(post, "category", "");
            if !category.is_empty() {
                *counts.entry(category.to_lowercase()).or_insert(0) += 1;
            }
        }

        if counts.is_empty() {
            state.record(
                "category_distribution",
                ModuleOutcome::Indeterminate {
                    reason: "no categorized posts in the snapshot".to_string(),
                },
            );
            return;
        }

        let labeled: usize = counts.values().sum();
        let (top_category, top_count) = counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(k, v)| (k.clone(), *v))
            .unwrap_or_default();
        let top_share = top_count as f64 / labeled as f64;

        state.record(
            "category_distribution",
            ModuleOutcome::Scored(json!({
                "distinct_categories": counts.len(),
                "top_category": top_category,
                "top_share": top_share,
            })),
        );

        if counts.len() == 1 && labeled >= 5 {
            state.emit(
                "Content",
                Severity::Low,
                "Single content category across all recent posts",
                &format!(
                    "All {} categorized posts fall under '{}'; a narrow mix limits \
                     discovery surfaces.",
                    labeled, top_category
                ),
                vec![format!("top category = {}", top_category)],
                json!({"top_category": top_category, "top_share": top_share}),
                "Category distribution collapsed to one bucket.",
                None,
            );
        }
    }

    /// Shadowban risk from reach and behavior signals. Indeterminate with
    /// zero recent posts; never a numeric score in that case.
    fn shadowban_risk(
        &self,
        account: &AccountData,
        posts: &[Value],
        results: &HashMap<String, AgentResult>,
        state: &mut RunState,
    ) {
        if posts.is_empty() {
            state.record(
                "shadowban_risk",
                ModuleOutcome::Indeterminate {
                    reason: "no recent posts to evaluate".to_string(),
                },
            );
            return;
        }

        let followers = account.u64_at("profile.followers", 0);
        let mut risk: f64 = 0.0;
        let mut signals = Vec::new();

        let tier = AccountTier::from_followers(followers);
        let expected = self
            .benchmarks
            .expected_engagement(&account_niche(account), tier);
        let actual = actual_engagement_rate(account, results);
        if expected > 0.0 && actual / expected < 0.3 {
            risk += 40.0;
            signals.push("engagement collapse vs benchmark".to_string());
        }

        let tag_total: usize = posts
            .iter()
            .map(|p| value_path::array_at(p, "hashtags").len())
            .sum();
        if tag_total as f64 / posts.len() as f64 > self.benchmarks.max_hashtags_per_post {
            risk += 30.0;
            signals.push("hashtag overload".to_string());
        }

        let reaches: Vec<f64> = posts
            .iter()
            .map(|p| value_path::f64_at(p, "reach", -1.0))
            .filter(|r| *r >= 0.0)
            .collect();
        if !reaches.is_empty() && followers > 0 {
            let mean_ratio =
                reaches.iter().sum::<f64>() / reaches.len() as f64 / followers as f64;
            if mean_ratio < 0.1 {
                risk += 30.0;
                signals.push("reach under 10% of followers".to_string());
            }
        }

        let risk = risk.min(100.0);
        state.record(
            "shadowban_risk",
            ModuleOutcome::Scored(json!({
                "shadowban_risk": risk,
                "signals": signals,
            })),
        );

        if risk >= 70.0 {
            state.emit(
                "Visibility",
                Severity::High,
                "Strong shadowban signals",
                &format!(
                    "Risk score {:.0}/100 from: {}.",
                    risk,
                    signals.join("; ")
                ),
                signals.clone(),
                json!({"shadowban_risk": risk}),
                "Multiple independent suppression signals present.",
                Some(PairedRec {
                    action: "Run a visibility reset".to_string(),
                    description: "Pause posting for 48 hours, remove flagged hashtags, then \
                                  resume with clean captions and verify hashtag-surface reach."
                        .to_string(),
                    steps: vec![
                        "Pause all posting and engagement automation for 48 hours".to_string(),
                        "Remove hashtag blocks from the last 10 posts".to_string(),
                        "Test reach with one clean post and compare against baseline".to_string(),
                    ],
                    difficulty: Difficulty::Medium,
                    timeframe: Timeframe::Immediate,
                }),
            );
        } else if risk >= 40.0 {
            state.emit(
                "Visibility",
                Severity::Medium,
                "Moderate shadowban risk",
                &format!("Risk score {:.0}/100 from: {}.", risk, signals.join("; ")),
                signals,
                json!({"shadowban_risk": risk}),
                "One suppression signal present.",
                None,
            );
        }
    }

    /// Viral potential from save/share behavior and format mix.
    fn viral_potential(&self, posts: &[Value], state: &mut RunState) {
        if posts.is_empty() {
            state.record(
                "viral_potential",
                ModuleOutcome::Indeterminate {
                    reason: "no recent posts to evaluate".to_string(),
                },
            );
            return;
        }

        let save_share_ratio: f64 = posts
            .iter()
            .map(|p| {
                let likes = value_path::f64_at(p, "likes", 0.0).max(1.0);
                (value_path::f64_at(p, "saves", 0.0) + value_path::f64_at(p, "shares", 0.0))
                    / likes
            })
            .sum::<f64>()
            / posts.len() as f64;
        let reel_share =
            posts.iter().filter(|p| is_reel(p)).count() as f64 / posts.len() as f64;

        // Save/share ratios above 0.5 saturate the behavioral component.
        let score = (save_share_ratio.min(0.5) / 0.5) * 60.0 + reel_share * 40.0;

        state.record(
            "viral_potential",
            ModuleOutcome::Scored(json!({
                "viral_potential": score,
                "save_share_ratio": save_share_ratio,
                "reel_share": reel_share,
            })),
        );

        if score < 30.0 {
            state.emit(
                "Content",
                Severity::Medium,
                "Low viral potential in recent content",
                &format!(
                    "Viral potential {:.0}/100: weak save/share behavior ({:.2} per like) and \
                     a {:.0}% reel share give content little chance to spread.",
                    score,
                    save_share_ratio,
                    reel_share * 100.0
                ),
                vec![format!("viral potential = {:.0}", score)],
                json!({"viral_potential": score}),
                "Viral potential fell below the benchmark floor.",
                None,
            );
        }
    }

    /// Completeness and confidence of the input snapshot itself.
    fn data_quality(
        &self,
        account: &AccountData,
        results: &HashMap<String, AgentResult>,
        state: &mut RunState,
    ) -> DataQuality {
        const SECTIONS: &[&str] = &[
            "profile",
            "posts",
            "audience",
            "growth_history",
            "insights_timeline",
        ];

        let root = account.as_value();
        let mut missing = Vec::new();
        for section in SECTIONS {
            if value_path::get_path(&root, section).is_none() {
                missing.push(section.to_string());
            }
        }
        let completeness = (SECTIONS.len() - missing.len()) as f64 / SECTIONS.len() as f64;

        let agent_factor = if results.is_empty() {
            0.5
        } else {
            let ok = results.values().filter(|r| r.is_ok()).count();
            ok as f64 / results.len() as f64
        };
        let confidence = completeness * agent_factor;

        let mut notes = Vec::new();
        if !missing.is_empty() {
            notes.push(format!(
                "Missing input sections: {}.",
                missing.join(", ")
            ));
        }
        if results.is_empty() {
            notes.push("No agent results available; confidence halved.".to_string());
        }

        state.record(
            "data_quality",
            ModuleOutcome::Scored(json!({
                "completeness": completeness,
                "confidence": confidence,
                "missing_sections": missing,
            })),
        );

        if completeness < 0.4 {
            state.emit(
                "Data Quality",
                Severity::Low,
                "Sparse input data limits analysis depth",
                &format!(
                    "Only {:.0}% of expected input sections are present; conclusions drawn \
                     from the remainder carry reduced confidence.",
                    completeness * 100.0
                ),
                vec![format!("completeness = {:.0}%", completeness * 100.0)],
                json!({"completeness": completeness}),
                "Snapshot completeness fell below the floor.",
                None,
            );
        }

        DataQuality {
            completeness,
            confidence,
            missing_sections: missing,
            notes,
        }
    }

    fn build_monitoring_plan(&self, account: &AccountData) -> Vec<MonitoringItem> {
        let followers = account.u64_at("profile.followers", 0);
        let tier = AccountTier::from_followers(followers);
        let expected = self
            .benchmarks
            .expected_engagement(&account_niche(account), tier);
        let (min_posts, max_posts) = self.benchmarks.posting_frequency_range(tier);

        vec![
            MonitoringItem {
                metric: "engagement_rate".to_string(),
                alert_threshold: format!("< {:.2}%", expected * 0.5),
                cadence: "weekly".to_string(),
            },
            MonitoringItem {
                metric: "posts_per_week".to_string(),
                alert_threshold: format!(
                    "outside {:.0}-{:.0} for a {} account",
                    min_posts,
                    max_posts,
                    tier.label()
                ),
                cadence: "weekly".to_string(),
            },
            MonitoringItem {
                metric: "bot_score".to_string(),
                alert_threshold: "> 50".to_string(),
                cadence: "monthly".to_string(),
            },
            MonitoringItem {
                metric: "follower_delta".to_string(),
                alert_threshold: "negative week-over-week".to_string(),
                cadence: "weekly".to_string(),
            },
            MonitoringItem {
                metric: "mean_post_reach".to_string(),
                alert_threshold: "< 10% of followers".to_string(),
                cadence: "weekly".to_string(),
            },
        ]
    }
}

/// 100 minus the scaled mean finding impact, with fixed per-severity
/// penalties, clamped to 0-100. No findings at all scores a clean 100.
fn overall_score(findings: &[Finding]) -> f64 {
    if findings.is_empty() {
        return 100.0;
    }
    let mean_impact =
        findings.iter().map(|f| f.impact_score).sum::<f64>() / findings.len() as f64;
    let mut score = 100.0 - mean_impact * 0.5;
    for finding in findings {
        score -= match finding.severity {
            Severity::Critical => 15.0,
            Severity::High => 8.0,
            _ => 0.0,
        };
    }
    score.clamp(0.0, 100.0)
}

/// Top issues by impact, capped at 5. Input is already impact-sorted.
fn key_issues(findings: &[Finding]) -> Vec<String> {
    findings.iter().take(5).map(|f| f.title.clone()).collect()
}

fn build_executive_summary(
    account: &AccountData,
    score: f64,
    grade: HealthGrade,
    findings: &[Finding],
) -> String {
    let critical = findings
        .iter()
        .filter(|f| f.severity == Severity::Critical)
        .count();
    let high = findings
        .iter()
        .filter(|f| f.severity == Severity::High)
        .count();

    let mut summary = format!(
        "@{} scores {:.0}/100 (grade {}) on the detailed benchmark analysis.",
        account.username(),
        score,
        grade
    );
    if critical > 0 {
        summary.push_str(&format!(
            " {} critical issue{} require{} immediate action.",
            critical,
            if critical == 1 { "" } else { "s" },
            if critical == 1 { "s" } else { "" }
        ));
    } else if high > 0 {
        summary.push_str(&format!(
            " {} high-severity issue{} should be addressed within two weeks.",
            high,
            if high == 1 { "" } else { "s" }
        ));
    } else if findings.is_empty() {
        summary.push_str(" No benchmark thresholds were crossed.");
    } else {
        summary.push_str(" Remaining issues are routine optimizations.");
    }
    summary
}

/// One risk entry per finding category, levelled by the worst severity seen.
fn build_risk_assessment(findings: &[Finding]) -> Vec<RiskEntry> {
    let mut worst: HashMap<&str, Severity> = HashMap::new();
    for finding in findings {
        worst
            .entry(finding.category.as_str())
            .and_modify(|s| *s = (*s).max(finding.severity))
            .or_insert(finding.severity);
    }

    const CATEGORIES: &[&str] = &[
        "Audience",
        "Engagement",
        "Visibility",
        "Content",
        "Hashtags",
        "Branding",
    ];

    CATEGORIES
        .iter()
        .map(|category| {
            let severity = worst.get(category).copied();
            let level = match severity {
                Some(Severity::Critical) => "critical",
                Some(Severity::High) => "high",
                Some(Severity::Medium) => "moderate",
                _ => "low",
            };
            let summary = match severity {
                Some(s) => format!("Worst finding in this category: {} severity.", s),
                None => "No benchmark thresholds crossed.".to_string(),
            };
            RiskEntry {
                category: category.to_string(),
                level: level.to_string(),
                summary,
            }
        })
        .collect()
}

/// Bucket the paired recommendations into phases, padding empty phases
/// with standing maintenance items.
fn build_action_plan(recommendations: &[Recommendation]) -> ActionPlan {
    let mut plan = ActionPlan::default();
    for rec in recommendations {
        let entry = format!("{} ({})", rec.action, rec.timeframe);
        match rec.timeframe {
            Timeframe::Immediate => plan.immediate.push(entry),
            Timeframe::Weeks1to2 => plan.short_term.push(entry),
            Timeframe::Months1to3 => plan.medium_term.push(entry),
            Timeframe::Months3to6 => plan.long_term.push(entry),
        }
    }

    if plan.immediate.is_empty() {
        plan.immediate
            .push("Review this report and confirm the top issues.".to_string());
    }
    if plan.short_term.is_empty() {
        plan.short_term
            .push("Hold posting cadence steady and track weekly engagement.".to_string());
    }
    if plan.medium_term.is_empty() {
        plan.medium_term
            .push("Re-run the analysis after a month of consistent posting.".to_string());
    }
    if plan.long_term.is_empty() {
        plan.long_term
            .push("Reassess niche positioning against follower growth.".to_string());
    }
    plan
}

fn account_niche(account: &AccountData) -> String {
    let niche = account.str_at("profile.niche", "");
    if niche.is_empty() {
        account.str_at("profile.category", "")
    } else {
        niche
    }
}

/// Engagement rate source order: engagement agent metric, then the profile
/// field, then the rate recomputed from raw posts.
fn actual_engagement_rate(
    account: &AccountData,
    results: &HashMap<String, AgentResult>,
) -> f64 {
    if let Some(result) = results.get("engagement") {
        if result.is_ok() {
            let rate = result.metric_f64("engagement_rate", -1.0);
            if rate >= 0.0 {
                return rate;
            }
        }
    }
    let profile = account.f64_at("profile.engagement_rate", -1.0);
    if profile >= 0.0 {
        return profile;
    }
    sanity::computed_engagement_rate(account)
}

fn is_reel(post: &Value) -> bool {
    let kind = value_path::str_at(post, "media_type", value_path::str_at(post, "type", ""));
    matches!(kind.to_lowercase().as_str(), "reel" | "reels" | "video")
}
