//! Sanity gates: deterministic consistency enforcement across agents.
//!
//! Run once after validation, over the full agent-result set plus the raw
//! account data. Each rule is a predicate over two or more metrics that
//! should agree, with a resolution action (clamp one toward the other,
//! flag with a note, or both). The pass is idempotent: clamps make their
//! own predicate false, and note rules check for the note before
//! appending, so a second pass records zero overrides.

use crate::models::{AccountData, AgentResult, SanityGateReport};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;

const POSITIVE_TRENDS: &[&str] = &["steady", "rapid", "viral"];

/// Apply every gate in order and derive the strategic phase from the
/// reconciled metrics. Overwritten metrics get an audit note on the
/// owning agent result.
pub fn apply_sanity_gates(
    results: &mut HashMap<String, AgentResult>,
    account: &AccountData,
) -> SanityGateReport {
    let mut report = SanityGateReport::default();

    gate_viral_growth_vs_engagement(results, account, &mut report);
    gate_bot_vs_engagement_quality(results, &mut report);
    gate_growth_vs_raw_delta(results, account, &mut report);
    gate_reported_vs_computed_engagement(results, account, &mut report);
    gate_authenticity_bot_sum(results, &mut report);

    report.strategic_phase = derive_strategic_phase(results, account);

    if !report.overrides.is_empty() {
        info!(
            overrides = report.overrides.len(),
            "sanity gates reconciled inconsistent metrics"
        );
    }

    report
}

fn reported_engagement_rate(
    results: &HashMap<String, AgentResult>,
    account: &AccountData,
) -> f64 {
    match results.get("engagement") {
        Some(r) if r.is_ok() => {
            r.metric_f64("engagement_rate", account.f64_at("profile.engagement_rate", 0.0))
        }
        _ => account.f64_at("profile.engagement_rate", 0.0),
    }
}

/// Engagement rate recomputed from raw posts: mean of
/// `(likes + comments) / followers * 100`. Zero when inputs are missing.
pub fn computed_engagement_rate(account: &AccountData) -> f64 {
    let followers = account.u64_at("profile.followers", 0);
    if followers == 0 {
        return 0.0;
    }

    let root = account.as_value();
    let posts = crate::value_path::array_at(&root, "posts");
    if posts.is_empty() {
        return 0.0;
    }

    let total: f64 = posts
        .iter()
        .map(|p| {
            crate::value_path::f64_at(p, "likes", 0.0)
                + crate::value_path::f64_at(p, "comments", 0.0)
        })
        .sum();

    (total / posts.len() as f64) / followers as f64 * 100.0
}

/// Rule 1: a claimed viral/rapid growth trend with near-zero engagement is
/// inflated. Override the trend; the predicate is false afterwards.
fn gate_viral_growth_vs_engagement(
    results: &mut HashMap<String, AgentResult>,
    account: &AccountData,
    report: &mut SanityGateReport,
) {
    let engagement_rate = reported_engagement_rate(results, account);

    let Some(growth) = results.get_mut("growth") else {
        return;
    };
    let trend = growth.metric_str("growth_trend", "unknown");

    if matches!(trend.as_str(), "viral" | "rapid") && engagement_rate < 0.5 {
        let note = format!(
            "Growth trend '{}' contradicts engagement rate {:.2}%; reclassified as inflated.",
            trend, engagement_rate
        );
        growth.set_metric("growth_trend", json!("inflated"));
        growth.audit_notes.push(note.clone());
        report.record(
            "viral-growth-vs-dead-engagement",
            "growth",
            "growth_trend",
            json!(trend),
            json!("inflated"),
            &note,
        );
    }
}

/// Rule 2: a high bot score bounds how good engagement quality can be.
/// Clamp engagement_quality to `100 - bot_score`.
fn gate_bot_vs_engagement_quality(
    results: &mut HashMap<String, AgentResult>,
    report: &mut SanityGateReport,
) {
    let bot_score = results
        .get("audience_quality")
        .map(|r| r.metric_f64("bot_score", 30.0))
        .unwrap_or(30.0);

    if bot_score < 60.0 {
        return;
    }

    let ceiling = 100.0 - bot_score;
    let Some(engagement) = results.get_mut("engagement") else {
        return;
    };
    let quality = engagement.metric_f64("engagement_quality", 50.0);

    if quality > ceiling {
        let note = format!(
            "Engagement quality {:.0} clamped to {:.0}: bot score {:.0} caps genuine interaction.",
            quality, ceiling, bot_score
        );
        engagement.set_metric("engagement_quality", json!(ceiling));
        engagement.audit_notes.push(note.clone());
        report.record(
            "bot-vs-engagement-quality",
            "engagement",
            "engagement_quality",
            json!(quality),
            json!(ceiling),
            &note,
        );
    }
}

/// Rule 3: a positive claimed trend against a flat-or-negative raw follower
/// delta is flagged (both values kept). The note guards re-application.
fn gate_growth_vs_raw_delta(
    results: &mut HashMap<String, AgentResult>,
    account: &AccountData,
    report: &mut SanityGateReport,
) {
    let root = account.as_value();
    let history = crate::value_path::array_at(&root, "growth_history");
    if history.len() < 2 {
        return;
    }

    let first = crate::value_path::f64_at(&history[0], "followers", 0.0);
    let last = crate::value_path::f64_at(&history[history.len() - 1], "followers", 0.0);
    let delta = last - first;

    let Some(growth) = results.get_mut("growth") else {
        return;
    };
    let trend = growth.metric_str("growth_trend", "unknown");

    if POSITIVE_TRENDS.contains(&trend.as_str()) && delta <= 0.0 {
        let note = format!(
            "Claimed trend '{}' contradicts raw follower delta {:+.0} over the history window.",
            trend, delta
        );
        if growth.audit_notes.contains(&note) {
            return;
        }
        growth.audit_notes.push(note.clone());
        report.record(
            "claimed-growth-vs-raw-delta",
            "growth",
            "growth_trend",
            json!(trend),
            json!(trend),
            &note,
        );
    }
}

/// Rule 4: an agent-reported engagement rate more than 50% off the rate
/// recomputed from raw posts is clamped to the raw value.
fn gate_reported_vs_computed_engagement(
    results: &mut HashMap<String, AgentResult>,
    account: &AccountData,
    report: &mut SanityGateReport,
) {
    let raw = computed_engagement_rate(account);
    if raw <= 0.0 {
        return; // no raw basis to reconcile against
    }

    let Some(engagement) = results.get_mut("engagement") else {
        return;
    };
    if !engagement.is_ok() {
        return;
    }
    let reported = engagement.metric_f64("engagement_rate", raw);
    let relative = (reported - raw).abs() / raw;

    if relative > 0.5 {
        let note = format!(
            "Reported engagement rate {:.2}% deviates {:.0}% from the raw {:.2}%; clamped.",
            reported,
            relative * 100.0,
            raw
        );
        engagement.set_metric("engagement_rate", json!(raw));
        engagement.audit_notes.push(note.clone());
        report.record(
            "reported-vs-computed-engagement-rate",
            "engagement",
            "engagement_rate",
            json!(reported),
            json!(raw),
            &note,
        );
    }
}

/// Rule 5: authenticity and bot score describe the same population from
/// opposite ends; their sum beyond 130 is contradictory. Clamp
/// authenticity to `100 - bot_score`.
fn gate_authenticity_bot_sum(
    results: &mut HashMap<String, AgentResult>,
    report: &mut SanityGateReport,
) {
    let Some(audience) = results.get_mut("audience_quality") else {
        return;
    };
    let bot = audience.metric_f64("bot_score", 30.0);
    let auth = audience.metric_f64("authenticity_score", 70.0);

    if auth + bot > 130.0 {
        let clamped = (100.0 - bot).max(0.0);
        let note = format!(
            "Authenticity {:.0} and bot score {:.0} are contradictory; authenticity clamped to {:.0}.",
            auth, bot, clamped
        );
        audience.set_metric("authenticity_score", json!(clamped));
        audience.audit_notes.push(note.clone());
        report.record(
            "authenticity-vs-bot-sum",
            "audience_quality",
            "authenticity_score",
            json!(auth),
            json!(clamped),
            &note,
        );
    }
}

/// Coarse phase label derived purely from thresholds on the reconciled
/// metrics: which growth tactics are currently appropriate vs blocked.
pub fn derive_strategic_phase(
    results: &HashMap<String, AgentResult>,
    account: &AccountData,
) -> String {
    let followers = account.u64_at("profile.followers", 0);
    let engagement_rate = reported_engagement_rate(results, account);

    let bot_score = results
        .get("audience_quality")
        .map(|r| r.metric_f64("bot_score", 30.0))
        .unwrap_or(30.0);
    let authenticity = results
        .get("audience_quality")
        .map(|r| r.metric_f64("authenticity_score", 70.0))
        .unwrap_or(70.0);
    let monetization = results
        .get("monetization")
        .map(|r| r.metric_f64("monetization_readiness", 40.0))
        .unwrap_or(40.0);

    // Audience problems block every growth tactic until cleaned up.
    if bot_score >= 50.0 || authenticity < 50.0 {
        return "foundation".to_string();
    }
    if engagement_rate < 1.0 || followers < 1_000 {
        return "foundation".to_string();
    }
    if followers >= 100_000 || monetization >= 70.0 {
        return "monetization".to_string();
    }
    if followers >= 10_000 && engagement_rate >= 2.0 {
        return "scaling".to_string();
    }
    "growth".to_string()
}
