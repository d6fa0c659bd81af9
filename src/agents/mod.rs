//! Agent contract and the generic invocation driver.
//!
//! An agent is a prompt template plus a response contract for one analysis
//! concern. The driver here is shared by every agent: build prompts, call
//! the remote model, parse the reply strictly as JSON (with one bounded
//! repair attempt), then normalize into an [`AgentResult`] with safe
//! defaults for missing optional fields.

pub mod catalog;

use crate::errors::EngineError;
use crate::llm::{GenerationOptions, GenerationRequest, ModelClient};
use crate::models::{
    AccountData, AgentResult, AgentStatus, Difficulty, RecommendationTag, Severity, Timeframe,
};
use anyhow::Result;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// One unit encapsulating a prompt template and response contract.
///
/// The orchestration core is generic over this trait and never inspects
/// concrete agent types.
pub trait AnalysisAgent: Send + Sync {
    fn name(&self) -> &str;

    /// Report category this agent's findings are filed under.
    fn category(&self) -> &str;

    /// Static persona and output rules.
    fn system_prompt(&self) -> String;

    /// Serialize the relevant subset of the account snapshot into a
    /// natural-language request demanding the agent's JSON schema back.
    fn task_prompt(&self, input: &AccountData) -> String;

    /// Top-level keys that must be present in the parsed response.
    /// Missing required keys fail the call (and trigger the retry path).
    fn required_keys(&self) -> &[&str] {
        &["score"]
    }
}

/// Invoke one agent against the model. Errors here mean a retryable call
/// failure (transport, timeout, non-JSON, missing required keys); the retry
/// wrapper converts exhaustion into the fallback result.
pub async fn invoke_agent(
    agent: &dyn AnalysisAgent,
    client: &dyn ModelClient,
    input: &AccountData,
    options: GenerationOptions,
) -> Result<AgentResult> {
    let request = GenerationRequest {
        system_prompt: agent.system_prompt(),
        task_prompt: agent.task_prompt(input),
        options,
    };

    let raw = client.generate(request).await?;
    debug!(agent = agent.name(), bytes = raw.len(), "model reply received");

    let parsed = parse_json_reply(&raw).ok_or_else(|| EngineError::Agent {
        agent: agent.name().to_string(),
        reason: "returned non-JSON output".to_string(),
    })?;

    for key in agent.required_keys() {
        if parsed.get(*key).is_none() {
            return Err(EngineError::Agent {
                agent: agent.name().to_string(),
                reason: format!("response missing required key '{}'", key),
            }
            .into());
        }
    }

    Ok(normalize_result(agent.name(), &parsed))
}

/// Parse model output strictly as a single JSON object, attempting one
/// bounded repair: strip markdown code fences, then slice to the outermost
/// brace pair. Anything else fails the call.
pub fn parse_json_reply(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    // Repair attempt: fences first, then the outermost braces.
    let defenced = strip_code_fences(trimmed);
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(defenced) {
        return Some(value);
    }

    let start = defenced.find('{')?;
    let end = defenced.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&defenced[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let without_open = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// Normalize a parsed response into an [`AgentResult`], clamping numeric
/// ranges and filling safe defaults for missing optional fields.
pub fn normalize_result(agent_name: &str, parsed: &Value) -> AgentResult {
    let score = crate::value_path::f64_at(parsed, "score", 50.0).clamp(0.0, 100.0);
    let confidence = crate::value_path::f64_at(parsed, "confidence", 0.7).clamp(0.0, 1.0);

    let metrics = match parsed.get("metrics") {
        Some(Value::Object(map)) => Value::Object(map.clone()),
        _ => Value::Object(Map::new()),
    };

    let (findings, finding_severities) = finding_list(parsed.get("findings"));
    let (recommendations, recommendation_tags) = recommendation_list(parsed.get("recommendations"));

    if findings.is_empty() {
        warn!(agent = agent_name, "agent returned no findings");
    }

    AgentResult {
        agent_name: agent_name.to_string(),
        status: AgentStatus::Ok,
        score,
        findings,
        recommendations,
        finding_severities,
        recommendation_tags,
        metrics,
        confidence,
        error_flag: false,
        audit_notes: Vec::new(),
    }
}

/// Display string for one list entry that may be a plain string or a
/// `{title, description, ...}` object.
fn display_text(item: &Value) -> Option<String> {
    match item {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(obj) => {
            let title = obj.get("title").and_then(Value::as_str).unwrap_or("");
            let description = obj
                .get("description")
                .or_else(|| obj.get("action"))
                .and_then(Value::as_str)
                .unwrap_or("");
            match (title.is_empty(), description.is_empty()) {
                (false, false) => Some(format!("{}: {}", title, description)),
                (false, true) => Some(title.to_string()),
                (true, false) => Some(description.to_string()),
                (true, true) => None,
            }
        }
        _ => None,
    }
}

/// Flatten the findings array into display strings, keeping any structured
/// `severity` field aligned by index. Free-text entries carry `None` and are
/// classified by keywords downstream.
fn finding_list(value: Option<&Value>) -> (Vec<String>, Vec<Option<Severity>>) {
    let Some(Value::Array(items)) = value else {
        return (Vec::new(), Vec::new());
    };

    let mut texts = Vec::new();
    let mut severities = Vec::new();
    for item in items {
        let Some(text) = display_text(item) else {
            continue;
        };
        texts.push(text);
        severities.push(
            item.get("severity")
                .and_then(Value::as_str)
                .map(Severity::parse_lenient),
        );
    }
    (texts, severities)
}

/// Same as [`finding_list`] for recommendations, keeping the structured
/// `difficulty` and `timeframe` fields.
fn recommendation_list(value: Option<&Value>) -> (Vec<String>, Vec<RecommendationTag>) {
    let Some(Value::Array(items)) = value else {
        return (Vec::new(), Vec::new());
    };

    let mut texts = Vec::new();
    let mut tags = Vec::new();
    for item in items {
        let Some(text) = display_text(item) else {
            continue;
        };
        texts.push(text);
        tags.push(RecommendationTag {
            difficulty: item
                .get("difficulty")
                .and_then(Value::as_str)
                .map(Difficulty::parse_lenient),
            timeframe: item
                .get("timeframe")
                .and_then(Value::as_str)
                .map(Timeframe::parse_lenient),
        });
    }
    (texts, tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plain_json() {
        let value = parse_json_reply(r#"{"score": 72}"#).unwrap();
        assert_eq!(value["score"], 72);
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "```json\n{\"score\": 61, \"confidence\": 0.8}\n```";
        let value = parse_json_reply(raw).unwrap();
        assert_eq!(value["score"], 61);
    }

    #[test]
    fn test_parse_json_with_preamble() {
        let raw = "Here is the analysis you asked for:\n{\"score\": 40}\nHope that helps!";
        let value = parse_json_reply(raw).unwrap();
        assert_eq!(value["score"], 40);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_json_reply("the account looks fine to me").is_none());
        assert!(parse_json_reply("[1, 2, 3]").is_none());
        assert!(parse_json_reply("{broken").is_none());
    }

    #[test]
    fn test_normalize_clamps_and_defaults() {
        let parsed = json!({"score": 250, "confidence": -0.5});
        let result = normalize_result("engagement", &parsed);
        assert_eq!(result.score, 100.0);
        assert_eq!(result.confidence, 0.0);
        assert!(result.findings.is_empty());
        assert!(result.metrics.is_object());
        assert!(!result.error_flag);
    }

    #[test]
    fn test_normalize_mixed_finding_shapes() {
        let parsed = json!({
            "score": 55,
            "findings": [
                "Plain string finding",
                {"title": "Low saves", "description": "Save rate is under 0.5%"},
                {"title": "Only title"},
                {"irrelevant": true},
                ""
            ]
        });
        let result = normalize_result("content_quality", &parsed);
        assert_eq!(
            result.findings,
            vec![
                "Plain string finding",
                "Low saves: Save rate is under 0.5%",
                "Only title",
            ]
        );
    }

    #[test]
    fn test_normalize_keeps_structured_severity_aligned() {
        let parsed = json!({
            "score": 40,
            "findings": [
                {"title": "Audience mismatch", "description": "Wrong region", "severity": "critical"},
                "Free-text observation about colors",
                {"title": "Saves dipping", "severity": "Medium"}
            ]
        });
        let result = normalize_result("audience_quality", &parsed);
        assert_eq!(result.findings.len(), 3);
        assert_eq!(result.finding_severities.len(), 3);
        assert_eq!(result.finding_severities[0], Some(Severity::Critical));
        assert_eq!(result.finding_severities[1], None);
        assert_eq!(result.finding_severities[2], Some(Severity::Medium));
    }

    #[test]
    fn test_normalize_keeps_recommendation_tags_aligned() {
        let parsed = json!({
            "score": 55,
            "recommendations": [
                {"title": "Fix bio link", "difficulty": "easy", "timeframe": "immediate"},
                "Plain advice with no tags",
                {"title": "Rework pillars", "difficulty": "hard", "timeframe": "1-3 months"}
            ]
        });
        let result = normalize_result("strategy_synthesis", &parsed);
        assert_eq!(result.recommendation_tags.len(), 3);
        assert_eq!(result.recommendation_tags[0].difficulty, Some(Difficulty::Easy));
        assert_eq!(result.recommendation_tags[0].timeframe, Some(Timeframe::Immediate));
        assert_eq!(result.recommendation_tags[1].difficulty, None);
        assert_eq!(result.recommendation_tags[1].timeframe, None);
        assert_eq!(result.recommendation_tags[2].difficulty, Some(Difficulty::Hard));
        assert_eq!(result.recommendation_tags[2].timeframe, Some(Timeframe::Months1to3));
    }
}
