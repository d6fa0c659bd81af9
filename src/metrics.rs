//! Lightweight per-agent call instrumentation.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct AgentStats {
    pub calls: u64,
    pub failures: u64,
    pub total_latency_ms: u64,
}

/// Collects call counts and latency per agent across one run.
/// Cheap enough to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    stats: Mutex<HashMap<String, AgentStats>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, agent: &str, latency: Duration, success: bool) {
        let mut stats = self.stats.lock().expect("metrics lock poisoned");
        let entry = stats.entry(agent.to_string()).or_default();
        entry.calls += 1;
        if !success {
            entry.failures += 1;
        }
        entry.total_latency_ms += latency.as_millis() as u64;
    }

    /// Snapshot of everything recorded so far.
    pub fn snapshot(&self) -> HashMap<String, AgentStats> {
        self.stats.lock().expect("metrics lock poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_snapshot() {
        let metrics = MetricsCollector::new();
        metrics.record("engagement", Duration::from_millis(120), true);
        metrics.record("engagement", Duration::from_millis(80), false);
        metrics.record("growth", Duration::from_millis(40), true);

        let snap = metrics.snapshot();
        let engagement = snap.get("engagement").unwrap();
        assert_eq!(engagement.calls, 2);
        assert_eq!(engagement.failures, 1);
        assert_eq!(engagement.total_latency_ms, 200);
        assert_eq!(snap.get("growth").unwrap().failures, 0);
    }
}
