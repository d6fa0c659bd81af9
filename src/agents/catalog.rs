//! The agent catalog: prompt configurations, weights, and dependency levels.
//!
//! Nine analysis agents feed the weighted overall score; the validation
//! agent cross-checks them; the data-acquisition and content-plan agents
//! run outside the scoring pipeline. Weights sum to 1.0 across the nine
//! analysis agents.

use crate::agents::AnalysisAgent;
use crate::models::AccountData;
use serde_json::Value;

/// A named, ordered group of agents with a declared dependency on the
/// union of all previous levels' outputs. Static configuration.
#[derive(Debug, Clone)]
pub struct ExecutionLevel {
    pub name: &'static str,
    pub agents: Vec<&'static str>,
}

/// One prompt-configured agent. Every agent shares the same contract;
/// only the persona, focus list, metric schema, and input subset differ.
pub struct PromptAgent {
    name: &'static str,
    category: &'static str,
    persona: &'static str,
    focus: &'static [&'static str],
    metric_keys: &'static [&'static str],
    input_sections: &'static [&'static str],
    /// Extra response-shape instructions appended to the task prompt, for
    /// agents whose metrics carry more than scalar values.
    schema_hint: Option<&'static str>,
}

impl AnalysisAgent for PromptAgent {
    fn name(&self) -> &str {
        self.name
    }

    fn category(&self) -> &str {
        self.category
    }

    fn system_prompt(&self) -> String {
        let mut prompt = String::new();
        prompt.push_str(self.persona);
        prompt.push_str("\n\nFocus areas:\n");
        for item in self.focus {
            prompt.push_str(&format!("- {}\n", item));
        }
        prompt.push_str(
            "\nRespond with a single JSON object and nothing else. \
             No markdown, no commentary outside the JSON.",
        );
        prompt
    }

    fn task_prompt(&self, input: &AccountData) -> String {
        let mut prompt = String::new();
        prompt.push_str("Analyze this Instagram account data:\n\n");

        let root = input.as_value();
        for section in self.input_sections {
            if let Some(value) = crate::value_path::get_path(&root, section) {
                prompt.push_str(&format!(
                    "### {}\n{}\n\n",
                    section,
                    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
                ));
            }
        }

        prompt.push_str("Return a JSON object with exactly this shape:\n");
        prompt.push_str("{\n");
        prompt.push_str("  \"score\": <0-100 number>,\n");
        prompt.push_str(
            "  \"findings\": [{\"title\": str, \"description\": str, \"severity\": \
             \"low|medium|high|critical\"}],\n",
        );
        prompt.push_str(
            "  \"recommendations\": [{\"title\": str, \"description\": str, \"difficulty\": \
             \"easy|medium|hard\", \"timeframe\": \"immediate|1-2 weeks|1-3 months|3-6 months\"}],\n",
        );
        prompt.push_str("  \"metrics\": {");
        prompt.push_str(
            &self
                .metric_keys
                .iter()
                .map(|k| format!("\"{}\": <value>", k))
                .collect::<Vec<_>>()
                .join(", "),
        );
        prompt.push_str("},\n");
        prompt.push_str("  \"confidence\": <0-1 number>\n");
        prompt.push_str("}\n");
        if let Some(hint) = self.schema_hint {
            prompt.push_str(hint);
        }
        prompt
    }
}

/// The nine scored analysis agents, in catalog order.
pub fn analysis_agents() -> Vec<PromptAgent> {
    vec![
        PromptAgent {
            name: "engagement",
            category: "Engagement",
            persona: "You are an Instagram engagement analyst. You evaluate how actively and \
                      genuinely an audience interacts with an account's content.",
            focus: &[
                "Engagement rate relative to follower count",
                "Like/comment/save balance across recent posts",
                "Signals of engagement pods or purchased interactions",
            ],
            metric_keys: &[
                "engagement_rate",
                "engagement_quality",
                "avg_likes",
                "avg_comments",
                "save_rate",
            ],
            input_sections: &["username", "profile", "posts"],
            schema_hint: None,
        },
        PromptAgent {
            name: "audience_quality",
            category: "Audience",
            persona: "You are an audience-quality auditor. You estimate how much of an \
                      account's following is real, active, and relevant.",
            focus: &[
                "Bot and fake-follower indicators",
                "Follower-to-following ratio anomalies",
                "Ghost-follower proportion",
            ],
            metric_keys: &["bot_score", "authenticity_score", "follower_quality"],
            input_sections: &["username", "profile", "audience"],
            schema_hint: None,
        },
        PromptAgent {
            name: "content_quality",
            category: "Content",
            persona: "You are a content strategist. You judge the craft and cohesion of an \
                      account's posts.",
            focus: &[
                "Visual consistency and feed aesthetics",
                "Caption quality and hooks",
                "Format mix (reels, carousels, static posts)",
            ],
            metric_keys: &["visual_consistency", "caption_quality", "content_score"],
            input_sections: &["username", "profile", "posts"],
            schema_hint: None,
        },
        PromptAgent {
            name: "growth",
            category: "Growth",
            persona: "You are a growth analyst. You read follower trajectories and classify \
                      the account's growth dynamics.",
            focus: &[
                "Trend classification: declining, flat, steady, rapid, viral",
                "Growth rate versus account-size tier norms",
                "Spikes suggesting purchased followers or viral posts",
            ],
            metric_keys: &["growth_trend", "monthly_growth_rate", "growth_score"],
            input_sections: &["username", "profile", "growth_history"],
            schema_hint: None,
        },
        PromptAgent {
            name: "hashtag_strategy",
            category: "Reach",
            persona: "You are a discoverability specialist focused on hashtag and SEO reach \
                      mechanics on Instagram.",
            focus: &[
                "Hashtag size distribution (broad vs niche)",
                "Banned or flagged hashtag usage risk",
                "Keyword alignment with the account's niche",
            ],
            metric_keys: &["hashtag_diversity", "banned_hashtag_risk", "reach_score"],
            input_sections: &["username", "posts"],
            schema_hint: None,
        },
        PromptAgent {
            name: "posting_behavior",
            category: "Consistency",
            persona: "You are a posting-cadence analyst. You evaluate publishing rhythm and \
                      timing discipline.",
            focus: &[
                "Posting frequency against niche norms",
                "Gaps and irregularity in the publishing schedule",
                "Alignment with audience activity windows",
            ],
            metric_keys: &[
                "posting_frequency_per_week",
                "consistency_score",
                "best_time_alignment",
            ],
            input_sections: &["username", "posts"],
            schema_hint: None,
        },
        PromptAgent {
            name: "strategy_synthesis",
            category: "Strategy",
            persona: "You are a senior Instagram strategist. Earlier specialists have already \
                      scored this account; synthesize their outputs into a coherent strategic \
                      read.",
            focus: &[
                "Biggest leverage point given the level-0 results",
                "Conflicts between specialist opinions worth resolving",
                "A single strategic priority for the next quarter",
            ],
            metric_keys: &["strategic_alignment", "focus_area"],
            input_sections: &["username", "profile", "level0_summary"],
            schema_hint: None,
        },
        PromptAgent {
            name: "competitive_position",
            category: "Positioning",
            persona: "You are a competitive-positioning analyst. Using the account data and \
                      the specialist summaries, place this account within its niche.",
            focus: &[
                "Differentiation versus typical accounts of this size and niche",
                "Niche saturation and whitespace",
                "Positioning statement clarity in the bio",
            ],
            metric_keys: &["niche_saturation", "differentiation_score"],
            input_sections: &["username", "profile", "level0_summary"],
            schema_hint: None,
        },
        PromptAgent {
            name: "monetization",
            category: "Monetization",
            persona: "You are a creator-economy analyst. Assess how ready this account is to \
                      earn, given its fundamentals and the specialist summaries.",
            focus: &[
                "Sponsor appeal given audience quality and engagement",
                "Fit of current monetization mechanics (links, shops, affiliates)",
                "Revenue streams appropriate to the account's current phase",
            ],
            metric_keys: &["monetization_readiness", "sponsor_appeal"],
            input_sections: &["username", "profile", "level0_summary"],
            schema_hint: None,
        },
    ]
}

/// The cross-checking validation agent (level 2, exactly one).
pub fn validation_agent() -> PromptAgent {
    PromptAgent {
        name: "validation",
        category: "Validation",
        persona: "You are a quality-control reviewer. Nine specialist analyses of one \
                  Instagram account are provided, with summary statistics. Judge whether \
                  their scores and claims are mutually consistent and flag contradictions.",
        focus: &[
            "Score spread: do the specialist scores tell one coherent story?",
            "Contradictory claims between specialists",
            "Any high-severity issue that should cap the overall assessment",
        ],
        metric_keys: &[
            "overall_confidence",
            "consistency_assessment",
            "high_severity_issue",
        ],
        input_sections: &["username", "profile", "validation_bundle"],
        schema_hint: None,
    }
}

/// Optional pre-step: interprets an acquisition collaborator response and
/// describes data gaps. Not part of the weighted score.
pub fn data_acquisition_agent() -> PromptAgent {
    PromptAgent {
        name: "data_acquisition",
        category: "Data",
        persona: "You are a data-intake reviewer. Given a raw acquisition payload for an \
                  Instagram account, describe what was captured, what is missing, and how \
                  much the gaps limit downstream analysis.",
        focus: &[
            "Acquisition mode (full_access vs public_only) and its limitations",
            "Sections present: profile, posts, audience, insights timeline",
            "Estimated versus measured fields",
        ],
        metric_keys: &["completeness", "reliability"],
        input_sections: &["username", "acquisition"],
        schema_hint: None,
    }
}

/// Optional post-step: turns the finished report into a 30-day posting plan.
pub fn content_plan_agent() -> PromptAgent {
    PromptAgent {
        name: "content_plan",
        category: "Planning",
        persona: "You are a content planner. Using the completed account analysis, draft a \
                  concrete 30-day posting plan that attacks the top findings.",
        focus: &[
            "Weekly themes tied to the top recommendations",
            "Format mix targets (reels/carousels/stories) per week",
            "Three concrete post ideas per week with hooks",
        ],
        metric_keys: &["plan_confidence", "posts"],
        input_sections: &["username", "profile", "analysis_summary"],
        schema_hint: Some(
            "The \"posts\" entry in metrics must be an array of planned posts, each shaped \
             {\"week\": <1-4>, \"day\": str, \"format\": \"reel|carousel|static|story\", \
             \"idea\": str, \"hook\": str}.\n",
        ),
    }
}

/// Fixed per-agent weight table. Sums to 1.0 across the nine analysis agents.
pub fn weight(agent_name: &str) -> f64 {
    match agent_name {
        "engagement" => 0.18,
        "audience_quality" => 0.15,
        "content_quality" => 0.13,
        "growth" => 0.12,
        "hashtag_strategy" => 0.08,
        "posting_behavior" => 0.09,
        "strategy_synthesis" => 0.10,
        "competitive_position" => 0.08,
        "monetization" => 0.07,
        _ => 0.0,
    }
}

/// Fixed agent -> report category table used during consolidation.
pub fn category_of(agent_name: &str) -> &'static str {
    match agent_name {
        "engagement" => "Engagement",
        "audience_quality" => "Audience",
        "content_quality" => "Content",
        "growth" => "Growth",
        "hashtag_strategy" => "Reach",
        "posting_behavior" => "Consistency",
        "strategy_synthesis" => "Strategy",
        "competitive_position" => "Positioning",
        "monetization" => "Monetization",
        "validation" => "Validation",
        _ => "General",
    }
}

/// The static dependency-level layout executed by the scheduler.
pub fn execution_levels() -> Vec<ExecutionLevel> {
    vec![
        ExecutionLevel {
            name: "level0",
            agents: vec![
                "engagement",
                "audience_quality",
                "content_quality",
                "growth",
                "hashtag_strategy",
                "posting_behavior",
            ],
        },
        ExecutionLevel {
            name: "level1",
            agents: vec!["strategy_synthesis", "competitive_position", "monetization"],
        },
        ExecutionLevel {
            name: "level2",
            agents: vec!["validation"],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountData;
    use serde_json::json;

    #[test]
    fn test_weights_sum_to_one() {
        let total: f64 = analysis_agents().iter().map(|a| weight(a.name())).sum();
        assert!((total - 1.0).abs() < 1e-9, "weights sum to {}", total);
    }

    #[test]
    fn test_catalog_matches_levels() {
        let levels = execution_levels();
        let level_agents: Vec<&str> = levels
            .iter()
            .take(2)
            .flat_map(|l| l.agents.iter().copied())
            .collect();
        let catalog: Vec<String> = analysis_agents()
            .iter()
            .map(|a| a.name().to_string())
            .collect();
        assert_eq!(level_agents.len(), catalog.len());
        for name in level_agents {
            assert!(catalog.contains(&name.to_string()), "{} not in catalog", name);
        }
        assert_eq!(levels[2].agents, vec!["validation"]);
    }

    #[test]
    fn test_task_prompt_includes_selected_sections_only() {
        let agents = analysis_agents();
        let engagement = &agents[0];
        let input = AccountData::from_value(json!({
            "username": "cafeaurora",
            "profile": { "followers": 8200 },
            "posts": [{ "likes": 310 }],
            "growth_history": [{ "month": "2026-07", "followers": 8100 }]
        }));
        let prompt = engagement.task_prompt(&input);
        assert!(prompt.contains("cafeaurora"));
        assert!(prompt.contains("followers"));
        assert!(!prompt.contains("growth_history"));
        assert!(prompt.contains("\"score\""));
        assert!(prompt.contains("severity"));
    }

    #[test]
    fn test_content_plan_prompt_requests_posts_array() {
        let agent = content_plan_agent();
        let input = AccountData::from_value(json!({ "username": "cafeaurora" }));
        let prompt = agent.task_prompt(&input);
        // The renderer consumes metrics.posts entries with these fields.
        assert!(prompt.contains("\"posts\""));
        assert!(prompt.contains("\"format\""));
        assert!(prompt.contains("\"hook\""));
    }

    #[test]
    fn test_system_prompt_demands_bare_json() {
        let agent = validation_agent();
        let prompt = agent.system_prompt();
        assert!(prompt.contains("single JSON object"));
        assert!(prompt.contains("Focus areas"));
    }
}
