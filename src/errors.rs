//! Error taxonomy for the orchestration engine.
//!
//! Every layer converts failures at its own boundary into a well-formed
//! partial result; these variants classify what happened for logging and
//! for the audit trail, not for propagation to the caller. Only
//! `EngineError::System` ever reaches the top-level boundary, where it is
//! converted into a minimal failure report.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A single agent failed; recovered locally via the fallback result.
    #[error("agent '{agent}' failed: {reason}")]
    Agent { agent: String, reason: String },

    /// Required input was missing or invalid; analysis continues with defaults.
    #[error("input data problem: {0}")]
    Data(String),

    /// A single call exceeded its budget; retried, then treated as an agent failure.
    #[error("agent '{agent}' timed out after {seconds}s")]
    Timeout { agent: String, seconds: u64 },

    /// The validation agent itself failed; the run proceeds with degraded confidence.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unexpected failure escaping the orchestration entry point.
    #[error("system error: {0}")]
    System(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = EngineError::Timeout {
            agent: "engagement".to_string(),
            seconds: 90,
        };
        assert_eq!(e.to_string(), "agent 'engagement' timed out after 90s");

        let e = EngineError::Agent {
            agent: "growth".to_string(),
            reason: "malformed JSON".to_string(),
        };
        assert!(e.to_string().contains("growth"));
    }
}
